#![doc(hidden)]
//! Library of readers and common functions for the input file formats

// internal modules
use crate::geometry::Registry;
use crate::model::Model;

// standard library
use std::path::Path;

// external crates
use anyhow::Result;

// files under the readers module
mod gdml_file;
mod model_file;
pub mod parsers;

// inline the readers for a nice API
#[doc(inline)]
pub use crate::readers::gdml_file::GdmlReader;

#[doc(inline)]
pub use crate::readers::model_file::ModelReader;

/// Read everything in a GDML file
///
/// Returns a result containing a [Registry] of every define, material, solid,
/// and volume extracted from the file at `path`.
///
/// - `path` - Path to the GDML file, can be [&str], [String], [Path], etc...
///
/// Example
/// ```ignore
/// // Read the geometry written by BDSIM for a beamline
/// let registry: Registry = flubl::read_gdml("path/to/beamline.gdml")?;
/// ```
pub fn read_gdml<P: AsRef<Path>>(path: P) -> Result<Registry> {
    let path: &Path = Path::new(path.as_ref());
    let mut reader = GdmlReader::new();
    reader.parse(path)
}

/// Read a BDSIM model tree
///
/// Returns a result of the [Model] extracted from the JSON file at `path`,
/// already checked for consistent branch lengths.
///
/// - `path` - Path to the model file, can be [&str], [String], [Path], etc...
///
/// Example
/// ```ignore
/// let model: Model = flubl::read_model("path/to/model.json")?;
/// ```
pub fn read_model<P: AsRef<Path>>(path: P) -> Result<Model> {
    let path: &Path = Path::new(path.as_ref());
    let reader = ModelReader::new();
    reader.parse(path)
}
