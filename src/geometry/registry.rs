//! Name-keyed store of everything read from a GDML file

// standard library
use std::collections::HashMap;

// internal modules
use crate::geometry::{
    ChemicalElement, Extent, LogicalVolume, Material, PhysicalVolume, PlacedVolume, Solid,
    VolumeTree,
};

// external crates
use anyhow::{anyhow, bail, Result};
use log::trace;
use nalgebra::{Matrix3, Vector3};

/// Guard against circular volume references in broken files
const MAX_DEPTH: usize = 64;

/// Registry of defines, materials, solids, and volumes keyed by unique names
///
/// Elements and materials keep their insertion order so that output files are
/// written consistently. Everything else is only ever looked up by name.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    /// Named constants, variables, and quantities
    pub constants: HashMap<String, f64>,
    /// Named positions (mm)
    pub positions: HashMap<String, Vector3<f64>>,
    /// Named rotations, already converted to placement matrices
    pub rotations: HashMap<String, Matrix3<f64>>,
    /// Name of the world logical volume from the `setup` block
    pub world: Option<String>,
    elements: Vec<ChemicalElement>,
    element_index: HashMap<String, usize>,
    materials: Vec<Material>,
    material_index: HashMap<String, usize>,
    solids: HashMap<String, Solid>,
    logical_volumes: HashMap<String, LogicalVolume>,
    physical_volumes: HashMap<String, PhysicalVolume>,
}

/// Insertion and lookup
impl Registry {
    /// Just calls Default::default(), nothing special to be initialised
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_element(&mut self, element: ChemicalElement) -> Result<()> {
        if self.element_index.contains_key(&element.name) {
            bail!("Duplicate element \"{}\" in registry", element.name);
        }
        trace!("Registered element {}", element.name);
        self.element_index
            .insert(element.name.clone(), self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    pub fn add_material(&mut self, material: Material) -> Result<()> {
        if self.material_index.contains_key(&material.name) {
            bail!("Duplicate material \"{}\" in registry", material.name);
        }
        trace!("Registered material {}", material.name);
        self.material_index
            .insert(material.name.clone(), self.materials.len());
        self.materials.push(material);
        Ok(())
    }

    /// Register a bare NIST material by name if nothing by that name exists
    ///
    /// Only `G4_` names can be added this way, anything else has to be
    /// defined in full before it is referenced.
    pub fn ensure_nist_material(&mut self, name: &str) -> Result<()> {
        if self.material_index.contains_key(name) {
            return Ok(());
        }
        if !name.starts_with("G4_") {
            bail!("Material \"{name}\" is not defined and is not a NIST material");
        }
        self.add_material(Material::nist(name))
    }

    pub fn add_solid(&mut self, name: &str, solid: Solid) -> Result<()> {
        if self.solids.contains_key(name) {
            bail!("Duplicate solid \"{name}\" in registry");
        }
        trace!("Registered {} solid {name}", solid.kind());
        self.solids.insert(name.to_string(), solid);
        Ok(())
    }

    pub fn add_logical_volume(&mut self, volume: LogicalVolume) -> Result<()> {
        if self.logical_volumes.contains_key(&volume.name) {
            bail!("Duplicate logical volume \"{}\" in registry", volume.name);
        }
        trace!("Registered logical volume {}", volume.name);
        self.logical_volumes.insert(volume.name.clone(), volume);
        Ok(())
    }

    pub fn add_physical_volume(&mut self, volume: PhysicalVolume) -> Result<()> {
        if self.physical_volumes.contains_key(&volume.name) {
            bail!("Duplicate physical volume \"{}\" in registry", volume.name);
        }
        trace!("Registered physical volume {}", volume.name);
        self.physical_volumes.insert(volume.name.clone(), volume);
        Ok(())
    }

    pub fn element(&self, name: &str) -> Result<&ChemicalElement> {
        self.element_index
            .get(name)
            .map(|&i| &self.elements[i])
            .ok_or_else(|| anyhow!("Element \"{name}\" not found in registry"))
    }

    pub fn material(&self, name: &str) -> Result<&Material> {
        self.material_index
            .get(name)
            .map(|&i| &self.materials[i])
            .ok_or_else(|| anyhow!("Material \"{name}\" not found in registry"))
    }

    pub fn solid(&self, name: &str) -> Result<&Solid> {
        self.solids
            .get(name)
            .ok_or_else(|| anyhow!("Solid \"{name}\" not found in registry"))
    }

    pub fn logical_volume(&self, name: &str) -> Result<&LogicalVolume> {
        self.logical_volumes
            .get(name)
            .ok_or_else(|| anyhow!("Logical volume \"{name}\" not found in registry"))
    }

    pub fn physical_volume(&self, name: &str) -> Result<&PhysicalVolume> {
        self.physical_volumes
            .get(name)
            .ok_or_else(|| anyhow!("Physical volume \"{name}\" not found in registry"))
    }

    pub fn is_element(&self, name: &str) -> bool {
        self.element_index.contains_key(name)
    }

    pub fn is_material(&self, name: &str) -> bool {
        self.material_index.contains_key(name)
    }

    /// All elements in the order they were defined
    pub fn elements(&self) -> &[ChemicalElement] {
        &self.elements
    }

    /// All materials in the order they were defined
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Materials with names containing `pattern`, in definition order
    ///
    /// Mirrors the usual geometry toolkit behaviour of returning every match
    /// rather than failing, so callers decide what an empty result means.
    pub fn find_material_by_name(&self, pattern: &str) -> Vec<&Material> {
        self.materials
            .iter()
            .filter(|m| m.name.contains(pattern))
            .collect()
    }

    /// Number of (elements, materials, solids, logical, physical) entries
    pub fn summary(&self) -> [usize; 5] {
        [
            self.elements.len(),
            self.materials.len(),
            self.solids.len(),
            self.logical_volumes.len(),
            self.physical_volumes.len(),
        ]
    }
}

/// Volume hierarchy resolution
impl Registry {
    /// Resolve a logical volume and everything below it into an owned tree
    pub fn volume_tree(&self, name: &str) -> Result<VolumeTree> {
        self.resolve(name, 0)
    }

    /// Bounding extent of a logical volume including its daughters
    pub fn extent(&self, name: &str) -> Result<Extent> {
        Ok(self.volume_tree(name)?.extent())
    }

    fn resolve(&self, name: &str, depth: usize) -> Result<VolumeTree> {
        if depth > MAX_DEPTH {
            bail!("Volume hierarchy below \"{name}\" is too deep, circular reference?");
        }

        let lv = self.logical_volume(name)?;
        let solid = self.solid(&lv.solid)?.clone();

        let daughters = lv
            .daughters
            .iter()
            .map(|pv_name| {
                let pv = self.physical_volume(pv_name)?;
                Ok(PlacedVolume {
                    name: pv.name.clone(),
                    placement: pv.placement,
                    volume: self.resolve(&pv.logical_volume, depth + 1)?,
                })
            })
            .collect::<Result<Vec<PlacedVolume>>>()?;

        Ok(VolumeTree {
            name: lv.name.clone(),
            solid,
            material: lv.material.clone(),
            daughters,
        })
    }
}
