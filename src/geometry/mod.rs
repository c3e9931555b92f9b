//! Geometry description library
//!
//! # Overview
//!
//! Module for storing and manipulating the geometry read from GDML files. All
//! of the reader logic is re-exported to make reading files very simple.
//!
//! ```ignore
//! // Read everything in a GDML file into a registry
//! let registry = flubl::read_gdml("./data/gdml/beamline.gdml")?;
//!
//! // Look up a placed volume and resolve its full hierarchy
//! let pv = registry.physical_volume("d1_pv")?;
//! let mut volume = registry.volume_tree(&pv.logical_volume)?;
//!
//! // Inspect or modify the geometry without touching the registry
//! println!("{:?}", volume.extent());
//! volume.prepare_for_sampler();
//! ```
//!
//! Everything is stored in millimetres and radians regardless of the units
//! used in the file. Densities are in g/cm3.

// Split into subfiles for development, but anything important is re-exported
mod registry;
mod solid;
pub mod transform;
mod volume;

// inline important the geometry-related modules for a nice public API
#[doc(inline)]
pub use crate::geometry::registry::Registry;

#[doc(inline)]
pub use crate::geometry::solid::{nested_boxes, BooleanOp, Extent, Solid};

#[doc(inline)]
pub use crate::geometry::transform::Placement;

#[doc(inline)]
pub use crate::geometry::volume::{
    ChemicalElement, LogicalVolume, Material, MaterialKind, PhysicalVolume, PlacedVolume,
    VolumeTree,
};

#[doc(inline)]
pub use crate::readers::read_gdml;
