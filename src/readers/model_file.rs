//! Reader for BDSIM model tree dumps
//!
//! The model tree is expected as a single JSON object with one list per
//! branch, see [Model] for the layout.

// standard library
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// crate modules
use crate::model::Model;
use crate::utils::f;

// external crates
use anyhow::{Context, Result};
use log::debug;

/// A simple reader for a BDSIM model tree
#[derive(Debug, Default)]
pub struct ModelReader {}

impl ModelReader {
    /// Just calls Default::default(), nothing special to be initialised
    pub fn new() -> Self {
        Default::default()
    }

    pub fn parse(&self, path: &Path) -> Result<Model> {
        let reader = Self::init_reader(path)?;
        let model: Model = serde_json::from_reader(reader)
            .with_context(|| f!("Failed to deserialise model tree from {}", path.display()))?;
        self.check(model)
            .with_context(|| f!("Inconsistent model tree in {}", path.display()))
    }

    /// Same as [ModelReader::parse] for JSON already in memory
    pub fn parse_str(&self, json: &str) -> Result<Model> {
        let model: Model =
            serde_json::from_str(json).context("Failed to deserialise model tree")?;
        self.check(model)
    }

    fn check(&self, model: Model) -> Result<Model> {
        model.validate()?;
        debug!("Model tree with {} elements", model.n);
        Ok(model)
    }

    pub fn init_reader(path: &Path) -> Result<BufReader<File>> {
        let file = File::open(path).with_context(|| f!("Could not open {}", path.display()))?;
        Ok(BufReader::new(file))
    }
}
