// internal modules
use crate::fluka::Machine;
use crate::geometry::{Material, Registry};
use crate::model::{Model, ModelElement};
use crate::readers::{read_gdml, read_model};
use crate::utils::*;

// standard library
use std::path::{Path, PathBuf};

// external crates
use anyhow::{anyhow, Context, Result};
use itertools::Itertools;
use kdam::{Bar, BarBuilder, BarExt};
use log::{debug, info};
use nalgebra::Vector3;

/// Settings for a conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterOptions {
    /// Add a plane sampler after every element
    pub add_samplers: bool,
    /// Sampler slab thickness (m)
    pub sampler_thickness: f64,
    /// Sampler slab transverse full width (m)
    pub sampler_size: f64,
    /// Registry material used for samplers
    pub sampler_material: String,
    /// Write bodies in global coordinates rather than inside transforms
    pub bake_transforms: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            add_samplers: true,
            sampler_thickness: 1e-6,
            sampler_size: 1.0,
            sampler_material: "G4_AIR".to_string(),
            bake_transforms: true,
        }
    }
}

/// Converts a BDSIM model and its GDML geometry into a FLUKA [Machine]
#[derive(Debug)]
pub struct BdsimConverter {
    model_path: PathBuf,
    gdml_path: PathBuf,
    options: ConverterOptions,
    model: Model,
    registry: Registry,
    sampler_region_names: Vec<String>,
    disable_progress: bool,
}

impl BdsimConverter {
    /// Read both input files, failing early if either is unusable
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        gdml_path: P,
        options: ConverterOptions,
    ) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();
        let gdml_path = gdml_path.as_ref().to_path_buf();

        info!("Reading {}", model_path.display());
        let model = read_model(&model_path)?;

        info!("Reading {}", gdml_path.display());
        let registry = read_gdml(&gdml_path)?;

        Ok(Self::from_parts(model, registry, options)
            .with_paths(model_path, gdml_path))
    }

    /// Converter for a model and registry that are already loaded
    pub fn from_parts(model: Model, registry: Registry, options: ConverterOptions) -> Self {
        Self {
            model_path: PathBuf::new(),
            gdml_path: PathBuf::new(),
            options,
            model,
            registry,
            sampler_region_names: Vec::new(),
            disable_progress: false,
        }
    }

    fn with_paths(mut self, model_path: PathBuf, gdml_path: PathBuf) -> Self {
        self.model_path = model_path;
        self.gdml_path = gdml_path;
        self
    }

    /// Do not print the progress bar
    pub fn disable_progress(&mut self) {
        debug!("Progress bar disabled");
        self.disable_progress = true;
    }

    /// Sampler region names created by the last conversion, in element order
    pub fn sampler_region_names(&self) -> &[String] {
        &self.sampler_region_names
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Place every element of the model into a new machine
    pub fn to_fluka(&mut self) -> Result<Machine> {
        let mut machine = Machine::new(self.options.bake_transforms);
        machine.add_materials(&self.registry)?;
        machine.set_sampler_dimensions(self.options.sampler_thickness, self.options.sampler_size);

        let sampler_material = self.sampler_material()?;
        self.sampler_region_names.clear();

        debug!(
            "Converting {} elements from {} and {}",
            self.model.n,
            self.model_path.display(),
            self.gdml_path.display()
        );

        let mut progress_bar = self.init_progress_bar()?;
        if !self.disable_progress {
            progress_bar.refresh()?;
        }

        let elements = self.model.elements().collect::<Result<Vec<ModelElement>>>()?;
        for element in elements {
            let index = element.index;
            self.convert_element(&mut machine, &element, &sampler_material)
                .with_context(|| f!("Failed to convert element {index} ({})", element.name))?;
            progress_bar.update(1)?;
        }

        // extra line for clean spacing after the progress bar
        if !self.disable_progress {
            eprintln!()
        };

        info!(
            "Converted {} elements with {} samplers",
            self.model.n,
            self.sampler_region_names.len()
        );
        Ok(machine)
    }

    fn convert_element(
        &mut self,
        machine: &mut Machine,
        element: &ModelElement,
        sampler_material: &Material,
    ) -> Result<()> {
        let pv = self.registry.physical_volume(&element.pv_name)?;
        let mut volume = self.registry.volume_tree(&pv.logical_volume)?;

        // box container and clipped daughters, leaving room for the sampler
        let extent = volume.prepare_for_sampler();
        let dz = extent.widths().z;

        let pos = element.position;
        let rot = element.rotation;
        let sampler_pos = pos + rot * Vector3::new(0.0, 0.0, dz / 2.0);

        info!(
            "{} {} {} [{}] [{}] [{}]",
            element.component_type,
            element.name,
            element.index,
            pos.iter().map(|v| f!("{v:.3}")).join(", "),
            rot.transpose().iter().map(|v| f!("{v:.4}")).join(", "),
            sampler_pos.iter().map(|v| f!("{v:.3}")).join(", ")
        );

        machine.place_element(pos, rot, volume);

        if self.options.add_samplers {
            let name = f!("sampler_{}", element.index);
            let region = machine.place_plane_sampler(sampler_pos, rot, &name, sampler_material);
            self.sampler_region_names.push(region);
        }
        Ok(())
    }

    /// First registry material matching the sampler material name
    fn sampler_material(&self) -> Result<Material> {
        let name = &self.options.sampler_material;
        self.registry
            .find_material_by_name(name)
            .first()
            .map(|m| (*m).clone())
            .ok_or_else(|| anyhow!("Sampler material \"{name}\" not found in the geometry"))
    }

    /// Initialise the progress bar, if wanted
    fn init_progress_bar(&self) -> Result<Bar> {
        BarBuilder::default()
            .total(self.model.n)
            .delay(0.0)
            .unit(" elements")
            .disable(self.disable_progress)
            .build()
            .map_err(|e| anyhow!(e))
    }
}
