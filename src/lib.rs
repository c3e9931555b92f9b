//! # The Flubl crate
//!
//! Tools for turning particle accelerator beamlines into FLUKA input files
//!
//! ## Installation
//!
//! Direct install from the repository:
//!
//! ```shell
//! cargo install --path .
//! ```
//!
//! ## Overview
//!
//! There are two ways to get a FLUKA model of a beamline:
//!
//! | Route                  | Description                                          |
//! | ---------------------- | ---------------------------------------------------- |
//! | `bdsim2fluka`          | Convert BDSIM model data plus GDML geometry          |
//! | [Machine] builder      | Describe drifts, bends, quadrupoles, and samplers    |
//!
//! Both routes end with a [Machine], which writes a FLUKA input file
//! (`<name>.inp`) and a JSON summary of the layout (`<name>.json`).
//!
//! ### Supported GDML solids
//!
//! | GDML solid                         | FLUKA bodies                              |
//! | ---------------------------------- | ----------------------------------------- |
//! | `box`                              | BOX                                       |
//! | `tube`                             | RCC pair, PLA wedge for partial phi       |
//! | `cutTube`                          | RCC pair and two cut PLAs                 |
//! | `cone`                             | TRC pair (RCC if not tapered)             |
//! | `sphere`                           | SPH pair, bounding BOX for partial theta  |
//! | `union`, `subtraction`, `intersection` | zone algebra on both operands         |
//!
//! ## Building a machine
//!
//! The builder tracks the reference trajectory as elements are added, bends
//! turning it towards negative x.
//!
//! ```rust, no_run
//! use flubl::fluka::{Beam, BeamPipe, Defaults, Particle, Randomiz, Start};
//! use flubl::Machine;
//!
//! let mut machine = Machine::new(true);
//! machine
//!     .add_defaults(Defaults::EmCascade)
//!     .add_beam(Beam::new(1.0, 0.0, Particle::Electron))
//!     .add_drift("d1", 1.0, BeamPipe::default())
//!     .add_sbend("sb1", 2.0, 0.1)
//!     .add_sampler_plane("s1", 1e-6, 1.0)
//!     .add_randomiz(Randomiz::default())
//!     .add_start(Start::new(100));
//!
//! machine.write("bend").unwrap();
//! ```
//!
//! ## Advanced use
//!
//! The readers load any of the inputs with a one-liner, and from there the
//! geometry can be inspected or modified before it is placed.
//!
//! ```ignore
//! let registry = flubl::read_gdml("./data/gdml/beamline.gdml")?;
//! let model = flubl::read_model("./data/model/beamline.json")?;
//! ```
//!
//! As an overview:
//! - The [geometry] module holds the registry read from GDML files, solids,
//! volume hierarchies, and placements.
//! - The [model] module describes the BDSIM model data for each element.
//! - The [fluka] module contains cards, bodies, regions, materials, and the
//! [Machine] itself.
//! - The [convert] module ties everything together for BDSIM conversions.
//!
//! In the background, `quick-xml` reads GDML documents, `nom` evaluates the
//! expressions in their attributes, `nalgebra` handles every transformation,
//! and `clap` is used for the command line interface.
//!
//! Everything is stored internally in millimetres and radians, and lengths are
//! only converted to centimetres when the FLUKA input is written.

// Public facing modules
pub mod convert;
pub mod fluka;
pub mod geometry;
pub mod model;
pub mod utils;

// note that docs are hidden to prevent confusing the current simple API
pub mod readers;

// Re-exports of useful data structures
#[doc(inline)]
pub use crate::readers::{read_gdml, read_model};

#[doc(inline)]
pub use crate::fluka::Machine;

#[doc(inline)]
pub use crate::convert::BdsimConverter;
