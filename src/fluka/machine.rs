//! The FLUKA machine model and builder
//!
//! A [Machine] is an ordered sequence of beamline elements. Elements are
//! either built from simple parameters (drifts, bends, quadrupoles, sampler
//! planes) and laid out along the reference trajectory, or placed explicitly
//! from converted geometry.
//!
//! The survey is tracked as elements are added, but no FLUKA geometry exists
//! until [Machine::write] builds everything in one go. Building never mutates
//! the machine, so the same machine can be written several times.
//!
//! ```rust, no_run
//! # use flubl::fluka::{BeamPipe, Machine};
//! let mut machine = Machine::new(true);
//! machine
//!     .add_drift("d1", 1.0, BeamPipe::new("G4_STAINLESS-STEEL", 30.0, 5.0))
//!     .add_sbend("sb1", 2.0, std::f64::consts::FRAC_PI_4)
//!     .add_sampler_plane("s1", 1e-6, 1.0);
//! machine.write("output/bend").unwrap();
//! ```

// internal modules
use crate::fluka::solids::{box_shape, BodyCollector, Namer};
use crate::fluka::{card, Beam, Body, Card, Defaults, MaterialTable, Randomiz, Region, Shape, Start, Zone};
use crate::geometry::transform::{euler_xyz, rotation_y, rows, MM_PER_CM, MM_PER_M};
use crate::geometry::{Extent, Material, Placement, Registry, VolumeTree};
use crate::utils::*;

// standard library
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// external crates
use anyhow::{bail, Context, Result};
use log::{debug, info, trace};
use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

/// Transverse full width of element containers (mm)
pub const OUTER_SIZE: f64 = 1000.0;

/// Outer radius of magnet yokes (mm)
pub const YOKE_RADIUS: f64 = 200.0;

/// Material of the world and of element containers
pub const WORLD_MATERIAL: &str = "G4_Galactic";

/// Material inside beam pipes
pub const VACUUM_MATERIAL: &str = "G4_Galactic";

/// Material of magnet yokes
pub const YOKE_MATERIAL: &str = "G4_Fe";

/// Material of sampler planes added by the builder
pub const SAMPLER_MATERIAL: &str = "G4_AIR";

/// Default sampler slab thickness (mm)
pub const SAMPLER_THICKNESS: f64 = 1e-3;

/// Default sampler slab transverse size (mm)
pub const SAMPLER_SIZE: f64 = 1000.0;

/// Gap between the outermost element and the black hole (mm)
const WORLD_MARGIN: f64 = 1000.0;

/// Angles below this are treated as straight
const ANGLE_TOLERANCE: f64 = 1e-12;

/// Beam pipe parameters for straight and bent elements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeamPipe {
    /// Geant4 NIST or registry material name
    pub material: String,
    /// Inner radius (mm)
    pub radius: f64,
    /// Wall thickness (mm)
    pub thickness: f64,
}

impl BeamPipe {
    pub fn new(material: &str, radius: f64, thickness: f64) -> Self {
        Self {
            material: material.to_string(),
            radius,
            thickness,
        }
    }

    pub fn outer_radius(&self) -> f64 {
        self.radius + self.thickness
    }
}

impl Default for BeamPipe {
    fn default() -> Self {
        Self::new("G4_STAINLESS-STEEL", 30.0, 5.0)
    }
}

/// What an element is made of
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Drift(BeamPipe),
    SBend { angle: f64, pipe: BeamPipe },
    Quadrupole { k1: f64, pipe: BeamPipe },
    /// Thin slab recording crossing particles, with its region name
    SamplerPlane {
        size: f64,
        material: String,
        region: String,
    },
    /// Converted geometry placed explicitly
    Volume(Box<VolumeTree>),
}

impl ElementKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Drift(_) => "drift",
            Self::SBend { .. } => "sbend",
            Self::Quadrupole { .. } => "quadrupole",
            Self::SamplerPlane { .. } => "samplerplane",
            Self::Volume(_) => "volume",
        }
    }

    fn angle(&self) -> f64 {
        match self {
            Self::SBend { angle, .. } => *angle,
            _ => 0.0,
        }
    }
}

/// One element of the machine and where it sits
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub kind: ElementKind,
    /// Length along the reference trajectory (mm)
    pub length: f64,
    /// Straight length the geometry is built along (mm)
    pub chord: f64,
    /// Curvilinear position of the entry face (mm), if on the trajectory
    pub s_start: Option<f64>,
    pub entry: Placement,
    /// Centre of the geometry, the local frame of every body
    pub centre: Placement,
    pub exit: Placement,
}

impl Element {
    /// Full length of the container box along the chord
    fn container_length(&self, outer_size: f64) -> f64 {
        self.chord + outer_size * (self.kind.angle() / 2.0).tan().abs()
    }

    /// Bounding extent in the global frame
    fn global_extent(&self, outer_size: f64) -> Extent {
        let local = match &self.kind {
            ElementKind::Volume(tree) => tree.extent(),
            ElementKind::SamplerPlane { size, .. } => {
                Extent::from_half_lengths(size / 2.0, size / 2.0, self.chord / 2.0)
            }
            _ => Extent::from_half_lengths(
                outer_size / 2.0,
                outer_size / 2.0,
                self.container_length(outer_size) / 2.0,
            ),
        };
        local.transformed(&self.centre)
    }
}

/// Accumulates elements, beam, and run settings for a FLUKA input
#[derive(Debug, Clone)]
pub struct Machine {
    bake_transforms: bool,
    defaults: Option<Defaults>,
    beam: Option<Beam>,
    randomiz: Option<Randomiz>,
    start: Option<Start>,
    elements: Vec<Element>,
    materials: MaterialTable,
    namer: Namer,
    sampler_names: Vec<String>,
    sampler_thickness: f64,
    sampler_size: f64,
    outer_size: f64,
    yoke_radius: f64,
    /// Entry frame of the next element on the trajectory
    cursor: Placement,
    /// Curvilinear position of the cursor (mm)
    s: f64,
}

/// Builder operations
impl Machine {
    /// Empty machine, bodies written in global coordinates if `bake_transforms`
    pub fn new(bake_transforms: bool) -> Self {
        Self {
            bake_transforms,
            defaults: None,
            beam: None,
            randomiz: None,
            start: None,
            elements: Vec::new(),
            materials: MaterialTable::new(),
            namer: Namer::default(),
            sampler_names: Vec::new(),
            sampler_thickness: SAMPLER_THICKNESS,
            sampler_size: SAMPLER_SIZE,
            outer_size: OUTER_SIZE,
            yoke_radius: YOKE_RADIUS,
            cursor: Placement::default(),
            s: 0.0,
        }
    }

    pub fn add_defaults(&mut self, defaults: Defaults) -> &mut Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn add_beam(&mut self, beam: Beam) -> &mut Self {
        self.beam = Some(beam);
        self
    }

    pub fn add_randomiz(&mut self, randomiz: Randomiz) -> &mut Self {
        self.randomiz = Some(randomiz);
        self
    }

    pub fn add_start(&mut self, start: Start) -> &mut Self {
        self.start = Some(start);
        self
    }

    /// Straight beam pipe of `length` metres
    pub fn add_drift(&mut self, name: &str, length: f64, pipe: BeamPipe) -> &mut Self {
        self.append_straight(name, ElementKind::Drift(pipe), length * MM_PER_M)
    }

    /// Sector bend of arc `length` metres bending by `angle` radians
    ///
    /// Positive angles bend towards negative x. The geometry is built along
    /// the chord, with the entry and exit faces perpendicular to the
    /// trajectory.
    pub fn add_sbend(&mut self, name: &str, length: f64, angle: f64) -> &mut Self {
        let kind = ElementKind::SBend {
            angle,
            pipe: BeamPipe::default(),
        };
        let length = length * MM_PER_M;

        if angle.abs() < ANGLE_TOLERANCE {
            return self.append_straight(name, kind, length);
        }

        let chord = 2.0 * (length / angle) * (angle / 2.0).sin();
        let entry = self.cursor;
        let chord_frame = Placement::new(entry.position, entry.rotation * rotation_y(-angle / 2.0));
        let centre = Placement::new(chord_frame.along_z(chord / 2.0), chord_frame.rotation);
        let exit = Placement::new(
            chord_frame.along_z(chord),
            entry.rotation * rotation_y(-angle),
        );

        trace!("{name}: chord {chord:.4} mm for {angle:.6} rad");
        self.push(name, kind, length, chord, entry, centre, exit)
    }

    /// Quadrupole of `length` metres, `k1` is recorded but has no field
    pub fn add_quadrupole(&mut self, name: &str, length: f64, k1: f64) -> &mut Self {
        let kind = ElementKind::Quadrupole {
            k1,
            pipe: BeamPipe::default(),
        };
        self.append_straight(name, kind, length * MM_PER_M)
    }

    /// Sampler slab `length` metres thick and `size` metres wide
    pub fn add_sampler_plane(&mut self, name: &str, length: f64, size: f64) -> &mut Self {
        let region = self.namer.sampler();
        self.sampler_names.push(region.clone());
        let kind = ElementKind::SamplerPlane {
            size: size * MM_PER_M,
            material: SAMPLER_MATERIAL.to_string(),
            region,
        };
        self.append_straight(name, kind, length * MM_PER_M)
    }

    fn append_straight(&mut self, name: &str, kind: ElementKind, length: f64) -> &mut Self {
        let entry = self.cursor;
        let centre = Placement::new(entry.along_z(length / 2.0), entry.rotation);
        let exit = Placement::new(entry.along_z(length), entry.rotation);
        self.push(name, kind, length, length, entry, centre, exit)
    }

    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        name: &str,
        kind: ElementKind,
        length: f64,
        chord: f64,
        entry: Placement,
        centre: Placement,
        exit: Placement,
    ) -> &mut Self {
        debug!("Adding {} {name} at s = {:.3} m", kind.type_name(), self.s / MM_PER_M);
        self.elements.push(Element {
            name: name.to_string(),
            kind,
            length,
            chord,
            s_start: Some(self.s),
            entry,
            centre,
            exit,
        });
        self.cursor = exit;
        self.s += length;
        self
    }
}

/// Operations for placing converted geometry
impl Machine {
    /// Register every material in a registry
    pub fn add_materials(&mut self, registry: &Registry) -> Result<()> {
        self.materials.add_registry(registry)
    }

    /// Sampler slab dimensions in metres for [Machine::place_plane_sampler]
    pub fn set_sampler_dimensions(&mut self, thickness: f64, size: f64) {
        self.sampler_thickness = thickness * MM_PER_M;
        self.sampler_size = size * MM_PER_M;
    }

    /// Place a volume with its centre at `pos` (mm) and rotation `rot`
    pub fn place_element(
        &mut self,
        pos: Vector3<f64>,
        rot: Matrix3<f64>,
        volume: VolumeTree,
    ) -> &mut Self {
        let centre = Placement::new(pos, rot);
        let length = volume.extent().widths().z;
        debug!("Placing volume {} at {:?}", volume.name, pos.as_slice());

        self.elements.push(Element {
            name: volume.name.clone(),
            kind: ElementKind::Volume(Box::new(volume)),
            length,
            chord: length,
            s_start: None,
            entry: Placement::new(centre.along_z(-length / 2.0), rot),
            centre,
            exit: Placement::new(centre.along_z(length / 2.0), rot),
        });
        self
    }

    /// Place a sampler slab centred at `pos` (mm), returning its region name
    pub fn place_plane_sampler(
        &mut self,
        pos: Vector3<f64>,
        rot: Matrix3<f64>,
        name: &str,
        material: &Material,
    ) -> String {
        let region = self.namer.sampler();
        self.sampler_names.push(region.clone());

        let thickness = self.sampler_thickness;
        let centre = Placement::new(pos, rot);
        self.elements.push(Element {
            name: name.to_string(),
            kind: ElementKind::SamplerPlane {
                size: self.sampler_size,
                material: material.name.clone(),
                region: region.clone(),
            },
            length: thickness,
            chord: thickness,
            s_start: None,
            entry: Placement::new(centre.along_z(-thickness / 2.0), rot),
            centre,
            exit: Placement::new(centre.along_z(thickness / 2.0), rot),
        });

        debug!("Placed sampler {name} as region {region}");
        region
    }
}

/// Accessors
impl Machine {
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Region names of every sampler, in the order they were added
    pub fn sampler_names(&self) -> &[String] {
        &self.sampler_names
    }

    /// Frame at the end of the reference trajectory
    pub fn end_of_line(&self) -> &Placement {
        &self.cursor
    }

    /// Total length of the reference trajectory (m)
    pub fn length(&self) -> f64 {
        self.s / MM_PER_M
    }
}

/// Bodies written together, optionally inside a transform
#[derive(Debug)]
struct BodyGroup {
    transform: Option<String>,
    bodies: Vec<Body>,
}

/// Everything generated for one element
#[derive(Debug, Default)]
struct ElementGeometry {
    /// Zones covering everything the element occupies
    container: Vec<Zone>,
    /// Zones and FLUKA material of each region, with a name if fixed
    regions: Vec<(Option<String>, Vec<Zone>, String)>,
}

/// The complete FLUKA geometry, ready to be written
#[derive(Debug)]
struct Output {
    groups: Vec<BodyGroup>,
    regions: Vec<Region>,
    transforms: Vec<Card>,
    materials: MaterialTable,
    element_regions: Vec<Vec<String>>,
}

/// Serialisation
impl Machine {
    /// Write `<name>.inp` and `<name>.json`
    ///
    /// Everything is built and checked before any file is created, so a
    /// failure leaves nothing behind.
    pub fn write(&self, name: &str) -> Result<()> {
        let output = self
            .build()
            .with_context(|| f!("Failed to build machine \"{name}\""))?;

        let title = Path::new(name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());

        let inp_path = f!("{name}.inp");
        info!("Writing {inp_path}");
        let mut writer = get_writer(&inp_path)?;
        self.write_input(&mut writer, &title, &output)?;
        writer.flush()?;

        let json_path = f!("{name}.json");
        info!("Writing {json_path}");
        let mut writer = get_writer(&json_path)?;
        serde_json::to_writer_pretty(&mut writer, &self.summary(&title, &output))?;
        writer.flush()?;

        Ok(())
    }

    /// Checks that only make sense once the whole machine is known
    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for element in &self.elements {
            let name = &element.name;
            if !matches!(element.kind, ElementKind::Volume(_)) && !names.insert(name) {
                bail!("Duplicate element name \"{name}\"");
            }
            if element.length <= 0.0 {
                bail!("Element \"{name}\" has non-positive length {}", element.length);
            }

            let (pipe, yoke) = match &element.kind {
                ElementKind::Drift(pipe) => (pipe, false),
                ElementKind::SBend { pipe, .. } | ElementKind::Quadrupole { pipe, .. } => {
                    (pipe, true)
                }
                ElementKind::SamplerPlane { size, .. } => {
                    if *size <= 0.0 {
                        bail!("Sampler \"{name}\" has non-positive size {size}");
                    }
                    continue;
                }
                ElementKind::Volume(_) => continue,
            };

            if pipe.radius <= 0.0 || pipe.thickness <= 0.0 {
                bail!("Beam pipe of \"{name}\" needs a positive radius and thickness");
            }
            if pipe.outer_radius() >= self.outer_size / 2.0 {
                bail!(
                    "Beam pipe of \"{name}\" ({} mm) does not fit the {} mm container",
                    pipe.outer_radius(),
                    self.outer_size
                );
            }
            if yoke && (self.yoke_radius <= pipe.outer_radius() || self.yoke_radius > self.outer_size / 2.0) {
                bail!(
                    "Yoke of \"{name}\" ({} mm) does not fit between the beam pipe and container",
                    self.yoke_radius
                );
            }
        }
        Ok(())
    }

    /// Generate every body, region, and material
    fn build(&self) -> Result<Output> {
        self.validate()?;

        let mut namer = self.namer.clone();
        let mut materials = self.materials.clone();
        let mut groups = Vec::with_capacity(self.elements.len() + 1);
        let mut regions = Vec::new();
        let mut transforms = Vec::new();
        let mut containers = Vec::new();
        let mut element_regions = Vec::with_capacity(self.elements.len());
        let mut radius: f64 = 0.0;

        for element in &self.elements {
            let (frame, transform) = match self.bake_transforms {
                true => (element.centre, None),
                false => (Placement::default(), Some(namer.transform())),
            };

            let mut collector = BodyCollector::new(&mut namer);
            let geometry = self
                .element_geometry(element, &frame, &mut collector, &mut materials)
                .with_context(|| f!("Could not build element \"{}\"", element.name))?;
            let bodies = collector.bodies;

            let mut names = Vec::with_capacity(geometry.regions.len());
            for (fixed, zones, material) in geometry.regions {
                let name = fixed.unwrap_or_else(|| namer.region());
                regions.push(Region::new(&name, zones, &material));
                names.push(name);
            }

            if let Some(t) = &transform {
                transforms.extend(rot_defi(t, &element.centre));
            }

            trace!("{}: {} bodies, regions {:?}", element.name, bodies.len(), names);
            groups.push(BodyGroup { transform, bodies });
            containers.extend(geometry.container);
            element_regions.push(names);

            radius = element
                .global_extent(self.outer_size)
                .corners()
                .iter()
                .fold(radius, |r, c| r.max(c.norm()));
        }

        // black hole shell around a world sphere holding every element
        let world_radius = radius + WORLD_MARGIN;
        let centre = Vector3::zeros();
        groups.push(BodyGroup {
            transform: None,
            bodies: vec![
                Body::new(
                    "BLKBODY",
                    Shape::Sph {
                        centre,
                        radius: 2.0 * world_radius,
                    },
                ),
                Body::new(
                    "WORLDBDY",
                    Shape::Sph {
                        centre,
                        radius: world_radius,
                    },
                ),
            ],
        });

        let world_material = resolve(&mut materials, WORLD_MATERIAL)?;
        regions.insert(
            0,
            Region::new(
                "WORLD",
                vec![Zone::body("WORLDBDY").minus_zones(&containers)],
                &world_material,
            ),
        );
        regions.insert(
            0,
            Region::new(
                "BLKHOLE",
                vec![Zone::body("BLKBODY").minus("WORLDBDY")],
                "BLCKHOLE",
            ),
        );

        Ok(Output {
            groups,
            regions,
            transforms,
            materials,
            element_regions,
        })
    }

    /// Bodies and regions of a single element in the frame `frame`
    fn element_geometry(
        &self,
        element: &Element,
        frame: &Placement,
        collector: &mut BodyCollector,
        materials: &mut MaterialTable,
    ) -> Result<ElementGeometry> {
        let mut geometry = ElementGeometry::default();

        match &element.kind {
            ElementKind::Drift(pipe) => {
                self.lattice_geometry(element, pipe, false, frame, collector, materials, &mut geometry)?
            }
            ElementKind::SBend { pipe, .. } | ElementKind::Quadrupole { pipe, .. } => {
                self.lattice_geometry(element, pipe, true, frame, collector, materials, &mut geometry)?
            }
            ElementKind::SamplerPlane {
                size,
                material,
                region,
            } => {
                let slab = collector.add(box_shape(*size, *size, element.chord), frame);
                let zones = vec![Zone::body(&slab)];
                let material = resolve(materials, material)?;
                geometry.container = zones.clone();
                geometry.regions.push((Some(region.clone()), zones, material));
            }
            ElementKind::Volume(tree) => {
                geometry.container =
                    volume_regions(tree, frame, collector, materials, &mut geometry.regions)?;
            }
        }

        Ok(geometry)
    }

    /// Container, beam pipe, vacuum, and optional yoke between two end planes
    #[allow(clippy::too_many_arguments)]
    fn lattice_geometry(
        &self,
        element: &Element,
        pipe: &BeamPipe,
        yoke: bool,
        frame: &Placement,
        collector: &mut BodyCollector,
        materials: &mut MaterialTable,
        geometry: &mut ElementGeometry,
    ) -> Result<()> {
        let length = element.container_length(self.outer_size);

        // end planes in the element frame, inside is towards the element
        let to_local = element.centre.inverse();
        let entry = to_local.then(&element.entry);
        let exit = to_local.then(&element.exit);
        let entry_plane = collector.add(
            Shape::Pla {
                normal: -(entry.rotation * Vector3::z()),
                point: entry.position,
            },
            frame,
        );
        let exit_plane = collector.add(
            Shape::Pla {
                normal: exit.rotation * Vector3::z(),
                point: exit.position,
            },
            frame,
        );
        let between = |zone: Zone| zone.plus(&entry_plane).plus(&exit_plane);

        let container = collector.add(box_shape(self.outer_size, self.outer_size, length), frame);
        let cylinder = |radius: f64| Shape::Rcc {
            base: Vector3::new(0.0, 0.0, -length / 2.0),
            height: Vector3::new(0.0, 0.0, length),
            radius,
        };
        let inner = collector.add(cylinder(pipe.radius), frame);
        let outer = collector.add(cylinder(pipe.outer_radius()), frame);

        let vacuum = resolve(materials, VACUUM_MATERIAL)?;
        let pipe_material = resolve(materials, &pipe.material)?;
        let world_material = resolve(materials, WORLD_MATERIAL)?;

        geometry.container = vec![between(Zone::body(&container))];
        geometry
            .regions
            .push((None, vec![between(Zone::body(&inner))], vacuum));
        geometry.regions.push((
            None,
            vec![between(Zone::body(&outer).minus(&inner))],
            pipe_material,
        ));

        let outermost = match yoke {
            true => {
                let yoke_body = collector.add(cylinder(self.yoke_radius), frame);
                geometry.regions.push((
                    None,
                    vec![between(Zone::body(&yoke_body).minus(&outer))],
                    resolve(materials, YOKE_MATERIAL)?,
                ));
                yoke_body
            }
            false => outer,
        };

        geometry.regions.insert(
            0,
            (
                None,
                vec![between(Zone::body(&container).minus(&outermost))],
                world_material,
            ),
        );
        Ok(())
    }

    /// Write the complete input file
    fn write_input<W: Write>(&self, writer: &mut W, title: &str, output: &Output) -> Result<()> {
        writeln!(writer, "{}", Card::new("TITLE"))?;
        writeln!(writer, "{title}")?;

        if let Some(defaults) = &self.defaults {
            writeln!(writer, "{}", defaults.card())?;
        }
        if let Some(beam) = &self.beam {
            for c in beam.cards() {
                writeln!(writer, "{c}")?;
            }
        }

        // geometry
        writeln!(writer, "{}", Card::new("GEOBEGIN").sdum("COMBNAME"))?;
        writeln!(writer, "{:>5}{:>5}          {title}", 0, 0)?;
        writeln!(writer, "{}", card::comment("bodies"))?;
        for group in &output.groups {
            if let Some(t) = &group.transform {
                writeln!(writer, "$start_transform {t}")?;
            }
            for body in &group.bodies {
                writeln!(writer, "{body}")?;
            }
            if group.transform.is_some() {
                writeln!(writer, "$end_transform")?;
            }
        }
        writeln!(writer, "END")?;
        writeln!(writer, "{}", card::comment("regions"))?;
        for region in &output.regions {
            writeln!(writer, "{region}")?;
        }
        writeln!(writer, "END")?;
        writeln!(writer, "{}", Card::new("GEOEND"))?;

        for c in &output.transforms {
            writeln!(writer, "{c}")?;
        }

        for c in output.materials.cards() {
            writeln!(writer, "{c}")?;
        }

        for region in &output.regions {
            let c = Card::new("ASSIGNMA")
                .what_name(1, &region.material)
                .what_name(2, &region.name);
            writeln!(writer, "{c}")?;
        }

        if let Some(randomiz) = &self.randomiz {
            writeln!(writer, "{}", randomiz.card())?;
        }
        if let Some(start) = &self.start {
            writeln!(writer, "{}", start.card())?;
        }
        writeln!(writer, "{}", Card::new("STOP"))?;
        Ok(())
    }

    /// Summary of the layout for the JSON file
    fn summary<'a>(&'a self, title: &'a str, output: &'a Output) -> Summary<'a> {
        let elements = self
            .elements
            .iter()
            .zip(&output.element_regions)
            .map(|(e, regions)| ElementSummary {
                name: &e.name,
                kind: e.kind.type_name(),
                length: e.length / MM_PER_M,
                s_start: e.s_start.map(|s| s / MM_PER_M),
                s_end: e.s_start.map(|s| (s + e.length) / MM_PER_M),
                position: [e.centre.position.x, e.centre.position.y, e.centre.position.z],
                rotation: rows(&e.centre.rotation),
                regions,
                angle: match &e.kind {
                    ElementKind::SBend { angle, .. } => Some(*angle),
                    _ => None,
                },
                k1: match &e.kind {
                    ElementKind::Quadrupole { k1, .. } => Some(*k1),
                    _ => None,
                },
            })
            .collect();

        Summary {
            title,
            bake_transforms: self.bake_transforms,
            length: self.length(),
            elements,
            samplers: &self.sampler_names,
        }
    }
}

/// JSON layout summary
#[derive(Debug, Serialize)]
struct Summary<'a> {
    title: &'a str,
    bake_transforms: bool,
    /// Total trajectory length (m)
    length: f64,
    elements: Vec<ElementSummary<'a>>,
    samplers: &'a [String],
}

#[derive(Debug, Serialize)]
struct ElementSummary<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    /// (m)
    length: f64,
    s_start: Option<f64>,
    s_end: Option<f64>,
    /// Centre of the element (mm)
    position: [f64; 3],
    rotation: [[f64; 3]; 3],
    regions: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    k1: Option<f64>,
}

/// Regions of a volume and all its daughters, returning the volume zones
fn volume_regions(
    tree: &VolumeTree,
    placement: &Placement,
    collector: &mut BodyCollector,
    materials: &mut MaterialTable,
    regions: &mut Vec<(Option<String>, Vec<Zone>, String)>,
) -> Result<Vec<Zone>> {
    let zones = collector.solid_zones(&tree.solid, placement);
    let material = resolve(materials, &tree.material)
        .with_context(|| f!("No material for volume \"{}\"", tree.name))?;

    // reserve the mother region so it is written before its daughters
    let index = regions.len();
    regions.push((None, Vec::new(), material));

    let mut daughters = Vec::new();
    for daughter in &tree.daughters {
        let p = placement.then(&daughter.placement);
        daughters.extend(volume_regions(&daughter.volume, &p, collector, materials, regions)?);
    }

    regions[index].1 = zones
        .iter()
        .map(|z| z.clone().minus_zones(&daughters))
        .collect();
    Ok(zones)
}

/// FLUKA name of a registry or NIST material, adding NIST materials as needed
fn resolve(materials: &mut MaterialTable, name: &str) -> Result<String> {
    match materials.fluka_name(name) {
        Some(fluka_name) => Ok(fluka_name.to_string()),
        None => materials.add_nist(name),
    }
}

/// ROT-DEFI cards for a named transform: x, y, z rotations then translation
fn rot_defi(name: &str, placement: &Placement) -> Vec<Card> {
    let (x, y, z) = euler_xyz(&placement.rotation);

    // axis code j goes in WHAT(1) as 100 j, FLUKA rotates the frame rather than the body
    let mut cards = [(100.0, x), (200.0, y), (300.0, z)]
        .iter()
        .filter(|(_, angle)| angle.abs() > ANGLE_TOLERANCE)
        .map(|(axis, angle)| {
            Card::new("ROT-DEFI")
                .what(1, *axis)
                .what(3, -angle.to_degrees())
                .sdum(name)
        })
        .collect::<Vec<Card>>();

    let t = placement.position / MM_PER_CM;
    cards.push(
        Card::new("ROT-DEFI")
            .what(4, t.x)
            .what(5, t.y)
            .what(6, t.z)
            .sdum(name),
    );
    cards
}

/// Helper function for cleaning up file IO boilerplate
fn get_writer(path: &str) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| f!("Could not create {path}"))?;
    debug!("New bufwriter for {path}");
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::transform::{rotation_x, rotation_y, rotation_z};
    use crate::geometry::{PlacedVolume, Solid};
    use rstest::rstest;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn close(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        (a - b).norm() < 1e-6
    }

    #[test]
    fn test_straight_survey() {
        let mut m = Machine::new(true);
        m.add_drift("d1", 1.0, BeamPipe::default())
            .add_sampler_plane("s1", 1e-6, 1.0);

        let d1 = &m.elements()[0];
        assert!(close(&d1.centre.position, &Vector3::new(0.0, 0.0, 500.0)));
        assert!(close(&d1.exit.position, &Vector3::new(0.0, 0.0, 1000.0)));
        assert_eq!(m.elements()[1].s_start, Some(1000.0));
        assert!((m.length() - 1.000001).abs() < 1e-12);
        assert_eq!(m.sampler_names(), &["S0000001"]);
    }

    #[test]
    fn test_sbend_survey() {
        let mut m = Machine::new(true);
        m.add_sbend("sb1", FRAC_PI_2, FRAC_PI_2);

        // quarter circle of radius 1 m bending towards -x
        let end = m.end_of_line();
        assert!(close(&end.position, &Vector3::new(-1000.0, 0.0, 1000.0)));
        assert!(close(&(end.rotation * Vector3::z()), &Vector3::new(-1.0, 0.0, 0.0)));

        let sb1 = &m.elements()[0];
        assert!((sb1.chord - 2000.0 * (FRAC_PI_4).sin()).abs() < 1e-9);
        assert!((sb1.length - 1000.0 * FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_angle_sbend_is_straight() {
        let mut m = Machine::new(true);
        m.add_sbend("sb1", 1.0, 0.0);
        assert!(close(&m.end_of_line().position, &Vector3::new(0.0, 0.0, 1000.0)));
    }

    #[test]
    fn test_validation() {
        let mut m = Machine::new(true);
        m.add_drift("d1", 1.0, BeamPipe::default())
            .add_drift("d1", 1.0, BeamPipe::default());
        assert!(m.validate().unwrap_err().to_string().contains("Duplicate"));

        let mut m = Machine::new(true);
        m.add_drift("d1", 0.0, BeamPipe::default());
        assert!(m.validate().is_err());

        let mut m = Machine::new(true);
        m.add_drift("d1", 1.0, BeamPipe::new("G4_Fe", 600.0, 5.0));
        assert!(m.validate().unwrap_err().to_string().contains("does not fit"));

        // fits as a drift, but not inside the yoke of a quadrupole
        let mut m = Machine::new(true);
        m.add_drift("d1", 1.0, BeamPipe::new("G4_Fe", 250.0, 5.0));
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_drift_regions() {
        let mut m = Machine::new(true);
        m.add_drift("d1", 1.0, BeamPipe::default());
        let output = m.build().unwrap();

        let names: Vec<&str> = output.regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["BLKHOLE", "WORLD", "R0000001", "R0000002", "R0000003"]
        );
        assert_eq!(output.element_regions[0].len(), 3);

        let materials: Vec<&str> = output.regions.iter().map(|r| r.material.as_str()).collect();
        assert_eq!(
            materials,
            vec!["BLCKHOLE", "VACUUM", "VACUUM", "VACUUM", "STAINLES"]
        );

        // entry and exit planes bound every region of the element
        for region in &output.regions[2..] {
            assert!(region.zones[0].bodies().contains(&"B0000001"));
            assert!(region.zones[0].bodies().contains(&"B0000002"));
        }
        assert_eq!(
            output.regions[1].to_string(),
            "WORLD 5 | +WORLDBDY -( +B0000003 +B0000001 +B0000002 )"
        );
    }

    #[test]
    fn test_quadrupole_has_yoke() {
        let mut m = Machine::new(true);
        m.add_quadrupole("q1", 0.25, 0.5);
        let output = m.build().unwrap();
        assert_eq!(output.element_regions[0].len(), 4);
        assert!(output.regions.iter().any(|r| r.material == "IRON"));
    }

    #[test]
    fn test_local_transforms() {
        let mut m = Machine::new(false);
        m.add_drift("d1", 1.0, BeamPipe::default())
            .add_sbend("sb1", 1.0, PI / 8.0);
        let output = m.build().unwrap();

        assert_eq!(output.groups[0].transform.as_deref(), Some("T0000001"));
        assert_eq!(output.groups[1].transform.as_deref(), Some("T0000002"));
        assert!(output.groups[2].transform.is_none());

        // drift has no rotation, the bend is rotated about y
        let t1: Vec<String> = output
            .transforms
            .iter()
            .filter(|c| c.to_string().ends_with("T0000001"))
            .map(|c| c.to_string())
            .collect();
        assert_eq!(t1.len(), 1);
        assert!(t1[0].contains("50.0"));
        let t2: Vec<String> = output
            .transforms
            .iter()
            .filter(|c| c.to_string().ends_with("T0000002"))
            .map(|c| c.to_string())
            .collect();
        assert_eq!(t2.len(), 2);
        assert_eq!(&t2[0][10..20], "     200.0");
        assert_eq!(&t2[1][10..20], "          ");
    }

    #[rstest]
    #[case(rotation_x(0.3), "     100.0")]
    #[case(rotation_y(0.3), "     200.0")]
    #[case(rotation_z(0.3), "     300.0")]
    fn test_rot_defi_axis_codes(#[case] rotation: Matrix3<f64>, #[case] what1: &str) {
        let p = Placement::new(Vector3::zeros(), rotation);
        let cards = rot_defi("T0000001", &p);
        assert_eq!(cards.len(), 2);
        assert_eq!(&cards[0].to_string()[10..20], what1);
        let angle = cards[0].to_string()[30..40].trim().trim_start_matches('-').to_string();
        assert_eq!(angle, "17.188734");
    }

    #[test]
    fn test_placed_volume_regions() {
        let tree = VolumeTree {
            name: "mother".into(),
            solid: Solid::cuboid(100.0, 100.0, 100.0),
            material: "G4_AIR".into(),
            daughters: vec![PlacedVolume {
                name: "child_pv".into(),
                placement: Placement::default(),
                volume: VolumeTree {
                    name: "child".into(),
                    solid: Solid::cuboid(10.0, 10.0, 10.0),
                    material: "G4_Fe".into(),
                    daughters: vec![],
                },
            }],
        };

        let mut m = Machine::new(true);
        m.place_element(Vector3::new(0.0, 0.0, 50.0), Matrix3::identity(), tree);
        let region = m.place_plane_sampler(
            Vector3::new(0.0, 0.0, 100.0),
            Matrix3::identity(),
            "sampler_0",
            &Material::nist("G4_AIR"),
        );
        assert_eq!(region, "S0000001");

        let output = m.build().unwrap();
        let mother = &output.regions[2];
        assert_eq!(mother.to_string(), "R0000001 5 | +B0000001 -B0000002");
        assert_eq!(mother.material, "AIR");
        assert_eq!(output.regions[3].material, "IRON");
        assert_eq!(output.regions[4].name, "S0000001");
        assert_eq!(output.element_regions[1], vec!["S0000001"]);
    }

    #[test]
    fn test_rot_defi_translation_only() {
        let p = Placement::translation(Vector3::new(0.0, 0.0, 1000.0));
        let cards = rot_defi("T0000001", &p);
        assert_eq!(cards.len(), 1);
        assert_eq!(&cards[0].to_string()[60..70], "     100.0");
    }
}
