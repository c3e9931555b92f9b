//! Conversion of simulation models into FLUKA machines
//!
//! # Overview
//!
//! A [BdsimConverter] reads a BDSIM model dump and the matching GDML geometry
//! as soon as it is created, then [BdsimConverter::to_fluka] places every
//! element of the model into a new [Machine](crate::fluka::Machine).
//!
//! ```rust, no_run
//! # use flubl::convert::{BdsimConverter, ConverterOptions};
//! # fn main() -> anyhow::Result<()> {
//! let options = ConverterOptions {
//!     sampler_size: 0.5,
//!     ..Default::default()
//! };
//!
//! let mut converter = BdsimConverter::new("model.json", "beamline.gdml", options)?;
//! let machine = converter.to_fluka()?;
//! machine.write("beamline")?;
//! # Ok(())
//! # }
//! ```

mod bdsim;

#[doc(inline)]
pub use crate::convert::bdsim::{BdsimConverter, ConverterOptions};
