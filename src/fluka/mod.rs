//! FLUKA input generation
//!
//! # Overview
//!
//! Everything needed to describe a machine as a FLUKA input file:
//! fixed-format control cards, name-based free-format bodies and regions,
//! material definitions, and the [Machine] that ties them together.
//!
//! ```rust, no_run
//! # use flubl::fluka::{Beam, BeamPipe, Defaults, Machine, Particle, Randomiz, Start};
//! let mut machine = Machine::new(true);
//!
//! let mut beam = Beam::new(1.0, 0.0, Particle::Electron);
//! beam.add_beam_position(0.0, 0.0, -1.0, 0.0, 0.0);
//!
//! machine
//!     .add_defaults(Defaults::Precision)
//!     .add_beam(beam)
//!     .add_drift("d1", 1.0, BeamPipe::default())
//!     .add_quadrupole("q1", 0.5, 0.2)
//!     .add_sampler_plane("s1", 1e-6, 1.0)
//!     .add_randomiz(Randomiz::default())
//!     .add_start(Start::new(1000));
//!
//! machine.write("output/quad").unwrap();
//! ```
//!
//! All lengths are stored in millimetres and only converted to centimetres
//! when cards and bodies are written.

// Split into subfiles for development, but anything important is re-exported
mod body;
pub mod card;
mod machine;
mod material;
mod physics;
mod region;
mod solids;

#[doc(inline)]
pub use crate::fluka::card::Card;

#[doc(inline)]
pub use crate::fluka::physics::{
    Beam, BeamAxes, BeamPosition, Defaults, Particle, Randomiz, Start, DEFAULT_SEED,
};

#[doc(inline)]
pub use crate::fluka::material::{FlukaKind, FlukaMaterial, MaterialTable};

#[doc(inline)]
pub use crate::fluka::body::{Body, Shape};

#[doc(inline)]
pub use crate::fluka::region::{Region, Term, Zone};

#[doc(inline)]
pub use crate::fluka::machine::{BeamPipe, Element, ElementKind, Machine};
