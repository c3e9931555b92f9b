//! Module for BDSIM beamline model data
//!
//! BDSIM writes a `Model` tree alongside the event data, with one entry per
//! beamline element. The tree is expected here as a JSON dump using the
//! BDSIM branch names.
//!
//! ```text
//! {
//!   "n": 2,
//!   "componentName": ["d1", "q1"],
//!   "componentType": ["drift", "quadrupole"],
//!   "length": [1.0, 0.5],
//!   "midS": [0.5, 1.25],
//!   "midPos": [[0.0, 0.0, 0.5], [0.0, 0.0, 1.25]],
//!   "midRot": [[1, 0, 0, 0, 1, 0, 0, 0, 1], [1, 0, 0, 0, 1, 0, 0, 0, 1]],
//!   "pvNameWPointer": [["d1_pv_0x1"], ["q1_pv_0x2"]]
//! }
//! ```
//!
//! Positions are in metres, rotations are row-major (XX, XY, XZ, YX, ...).
//!
//! ## Reading a model file
//!
//! ```ignore
//! let model = flubl::read_model("./data/model/beamline.json")?;
//! for element in model.elements() {
//!     println!("{}", element?.name);
//! }
//! ```

// internal modules
use crate::geometry::transform::metres_to_mm;
use crate::utils::f;

// external crates
use anyhow::{anyhow, bail, Result};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Representation of the model tree for a single beamline
///
/// Fields correspond one to one with the BDSIM branches that the converter
/// needs. Anything else in the file is ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Number of beamline elements
    pub n: usize,
    /// Element names as given in the input
    pub component_name: Vec<String>,
    /// Element types, e.g. drift, sbend
    pub component_type: Vec<String>,
    /// Element lengths (m)
    #[serde(default)]
    pub length: Vec<f64>,
    /// Curvilinear S at the middle of each element (m)
    #[serde(default)]
    pub mid_s: Vec<f64>,
    /// Global position at the middle of each element (m)
    pub mid_pos: Vec<[f64; 3]>,
    /// Global rotation at the middle of each element, row-major
    pub mid_rot: Vec<[f64; 9]>,
    /// Physical volume names for each element, first is the placement
    pub pv_name_w_pointer: Vec<Vec<String>>,
}

/// Everything the converter needs for one element
#[derive(Debug, Clone, PartialEq)]
pub struct ModelElement {
    pub index: usize,
    pub name: String,
    pub component_type: String,
    /// Mid position (mm)
    pub position: Vector3<f64>,
    pub rotation: Matrix3<f64>,
    /// Physical volume name of the placement
    pub pv_name: String,
}

impl Model {
    /// Check every per-element list has exactly `n` entries
    pub fn validate(&self) -> Result<()> {
        let mut lists = vec![
            ("componentName", self.component_name.len()),
            ("componentType", self.component_type.len()),
            ("midPos", self.mid_pos.len()),
            ("midRot", self.mid_rot.len()),
            ("pvNameWPointer", self.pv_name_w_pointer.len()),
        ];

        // optional branches only checked if present
        if !self.length.is_empty() {
            lists.push(("length", self.length.len()));
        }
        if !self.mid_s.is_empty() {
            lists.push(("midS", self.mid_s.len()));
        }

        for (branch, len) in lists {
            if len != self.n {
                bail!("Expected {} entries in {branch}, found {len}", self.n);
            }
        }
        Ok(())
    }

    /// Extract element `index`, converting the position to millimetres
    ///
    /// ```rust
    /// # use flubl::model::Model;
    /// let model = Model {
    ///     n: 1,
    ///     component_name: vec!["d1".into()],
    ///     component_type: vec!["drift".into()],
    ///     mid_pos: vec![[0.0, 0.0, 0.5]],
    ///     mid_rot: vec![[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]],
    ///     pv_name_w_pointer: vec![vec!["d1_pv".into()]],
    ///     ..Default::default()
    /// };
    ///
    /// let element = model.element(0).unwrap();
    /// assert_eq!(element.position.z, 500.0);
    /// assert_eq!(element.pv_name, "d1_pv");
    /// ```
    pub fn element(&self, index: usize) -> Result<ModelElement> {
        if index >= self.n {
            bail!("Element {index} out of range for model with {} elements", self.n);
        }

        let name = self.component_name[index].clone();
        let pv_name = self.pv_name_w_pointer[index]
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("No physical volume name for element {index} ({name})"))?;

        let [x, y, z] = self.mid_pos[index];
        let r = self.mid_rot[index];

        Ok(ModelElement {
            index,
            name,
            component_type: self.component_type[index].clone(),
            position: metres_to_mm(&Vector3::new(x, y, z)),
            rotation: Matrix3::from_row_slice(&r),
            pv_name,
        })
    }

    /// Iterate over every element in order
    pub fn elements(&self) -> impl Iterator<Item = Result<ModelElement>> + '_ {
        (0..self.n).map(|i| self.element(i))
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut s = "Model {\n".to_string();
        s += &f!("    elements: {}\n", self.n);
        if !self.length.is_empty() {
            s += &f!("    length: {:.6} m\n", self.length.iter().sum::<f64>());
        }
        s += "}";
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model {
            n: 2,
            component_name: vec!["d1".into(), "sb1".into()],
            component_type: vec!["drift".into(), "sbend".into()],
            length: vec![1.0, 2.0],
            mid_s: vec![],
            mid_pos: vec![[0.0, 0.0, 0.5], [0.1, 0.0, 2.0]],
            mid_rot: vec![
                [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                [0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0],
            ],
            pv_name_w_pointer: vec![vec!["d1_pv".into()], vec![]],
        }
    }

    #[test]
    fn test_validate_lengths() {
        let mut m = model();
        assert!(m.validate().is_ok());
        m.mid_rot.pop();
        let err = m.validate().unwrap_err();
        assert!(err.to_string().contains("midRot"));
    }

    #[test]
    fn test_rotation_is_row_major() {
        let m = model();
        let r = m.element(1).map(|e| e.rotation);
        // missing pv name is an error even with valid rotation data
        assert!(r.is_err());

        let mut m = model();
        m.pv_name_w_pointer[1].push("sb1_pv".into());
        let e = m.element(1).unwrap();
        assert_eq!(e.rotation[(0, 2)], 1.0);
        assert_eq!(e.rotation[(2, 0)], -1.0);
        assert!((e.position.x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range() {
        assert!(model().element(2).is_err());
    }

    #[test]
    fn test_deserialise_camel_case() {
        let json = r#"{
            "n": 1,
            "componentName": ["d1"],
            "componentType": ["drift"],
            "midPos": [[0.0, 0.0, 0.5]],
            "midRot": [[1, 0, 0, 0, 1, 0, 0, 0, 1]],
            "pvNameWPointer": [["d1_pv"]]
        }"#;
        let m: Model = serde_json::from_str(json).unwrap();
        assert!(m.validate().is_ok());
        assert_eq!(m.element(0).unwrap().component_type, "drift");
    }
}
