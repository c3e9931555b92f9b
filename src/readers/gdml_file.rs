// internal modules
use crate::geometry::transform::gdml_rotation;
use crate::geometry::{
    BooleanOp, ChemicalElement, LogicalVolume, Material, MaterialKind, PhysicalVolume,
    Placement, Registry, Solid,
};
use crate::readers::parsers;
use crate::utils::*;

// standard library
use std::io::BufRead;
use std::path::Path;

// external crates
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, trace, warn};
use nalgebra::{Matrix3, Vector3};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A reader for the subset of GDML written by BDSIM
///
/// Everything is collected into a [Registry], converting all lengths to mm,
/// angles to radians, and densities to g/cm3 on the way in.
///
/// Notes:
///     - Attributes may be expressions using previously defined constants
///     - Undefined `G4_` material references are registered as NIST materials
///     - Unsupported solids are skipped with a warning, and only fail if used
///     - Isotopes, optical properties, and auxiliary data are ignored
///
/// Example:
/// ```ignore
///     let path = Path::new(path);
///     let mut reader = GdmlReader::new();
///     let registry = reader.parse(path).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct GdmlReader {
    /// Everything extracted so far
    registry: Registry,
}

/// High level methods
impl GdmlReader {
    /// Just calls Default::default(), nothing special to be initialised
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses all GDML sections from a file
    pub fn parse(&mut self, path: &Path) -> Result<Registry> {
        let xml = std::fs::read_to_string(path)
            .with_context(|| f!("Could not open {}", path.display()))?;
        self.parse_str(&xml)
            .with_context(|| f!("Failed to read GDML from {}", path.display()))
    }

    /// Parses all GDML sections from a string
    pub fn parse_str(&mut self, xml: &str) -> Result<Registry> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        self.read_document(&mut reader)?;

        let [n_elements, n_materials, n_solids, n_lv, n_pv] = self.registry.summary();
        debug!(
            "GDML: {n_elements} elements, {n_materials} materials, {n_solids} solids, {n_lv} logical volumes, {n_pv} physical volumes"
        );

        // give the registry to the caller, no need to keep it
        Ok(std::mem::take(&mut self.registry))
    }

    /// Top level loop over the document sections
    fn read_document<R: BufRead>(&mut self, reader: &mut Reader<R>) -> Result<()> {
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"gdml" => trace!("Start of GDML document"),
                    b"define" => self.read_define(reader)?,
                    b"materials" => self.read_materials(reader)?,
                    b"solids" => self.read_solids(reader)?,
                    b"structure" => self.read_structure(reader)?,
                    b"setup" => self.read_setup(reader)?,
                    name => skip_element(reader, &name.to_vec())?,
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => bail!("XML error at position {}: {e}", reader.buffer_position()),
            }
            buf.clear();
        }

        Ok(())
    }
}

/// Definitions of constants, positions, and rotations
impl GdmlReader {
    fn read_define<R: BufRead>(&mut self, reader: &mut Reader<R>) -> Result<()> {
        for_each_child(reader, b"define", |reader, e, is_start| {
            let reg = &mut self.registry;
            match e.name().as_ref() {
                b"constant" | b"variable" => {
                    let name = attribute(e, "name")?;
                    let value = value(e, "value", reg)?;
                    reg.constants.insert(name, value);
                }
                b"quantity" => {
                    let name = attribute(e, "name")?;
                    let value = value(e, "value", reg)? * any_unit(e)?;
                    reg.constants.insert(name, value);
                }
                b"position" => {
                    let name = attribute(e, "name")?;
                    let position = read_position(e, reg)?;
                    reg.positions.insert(name, position);
                }
                b"rotation" => {
                    let name = attribute(e, "name")?;
                    let rotation = read_rotation(e, reg)?;
                    reg.rotations.insert(name, rotation);
                }
                other => debug!("Ignored define <{}>", String::from_utf8_lossy(other)),
            }
            if is_start {
                skip_element(reader, e.name().as_ref())?;
            }
            Ok(())
        })
    }
}

/// Elements and materials
impl GdmlReader {
    fn read_materials<R: BufRead>(&mut self, reader: &mut Reader<R>) -> Result<()> {
        for_each_child(reader, b"materials", |reader, e, is_start| {
            match e.name().as_ref() {
                b"element" => {
                    let element = read_element(reader, e, is_start, &self.registry)?;
                    self.registry.add_element(element)?;
                }
                b"material" => {
                    let material = read_material(reader, e, is_start, &mut self.registry)?;
                    self.registry.add_material(material)?;
                }
                other => {
                    trace!("Ignored <{}> in materials", String::from_utf8_lossy(other));
                    if is_start {
                        skip_element(reader, other)?;
                    }
                }
            }
            Ok(())
        })
    }
}

/// Solid shapes
impl GdmlReader {
    fn read_solids<R: BufRead>(&mut self, reader: &mut Reader<R>) -> Result<()> {
        for_each_child(reader, b"solids", |reader, e, is_start| {
            let tag = e.name().as_ref().to_vec();
            let name = attribute(e, "name")?;

            let solid = match tag.as_slice() {
                b"box" => Some(read_box(e, &self.registry)?),
                b"tube" => Some(read_tube(e, &self.registry)?),
                b"cutTube" => Some(read_cut_tube(e, &self.registry)?),
                b"cone" => Some(read_cone(e, &self.registry)?),
                b"sphere" => Some(read_sphere(e, &self.registry)?),
                b"union" => Some(read_boolean(reader, BooleanOp::Union, &self.registry)?),
                b"subtraction" => {
                    Some(read_boolean(reader, BooleanOp::Subtraction, &self.registry)?)
                }
                b"intersection" => {
                    Some(read_boolean(reader, BooleanOp::Intersection, &self.registry)?)
                }
                other => {
                    warn!(
                        "Unsupported solid <{}> \"{name}\", skipping",
                        String::from_utf8_lossy(other)
                    );
                    None
                }
            };

            // booleans consume their own children, anything else is skipped
            let is_boolean = matches!(
                tag.as_slice(),
                b"union" | b"subtraction" | b"intersection"
            );
            if is_start && !is_boolean {
                skip_element(reader, &tag)?;
            }

            if let Some(solid) = solid {
                self.registry.add_solid(&name, solid)?;
            }
            Ok(())
        })
    }
}

/// Volume hierarchy
impl GdmlReader {
    fn read_structure<R: BufRead>(&mut self, reader: &mut Reader<R>) -> Result<()> {
        for_each_child(reader, b"structure", |reader, e, is_start| {
            match e.name().as_ref() {
                b"volume" => self.read_volume(reader, e, is_start),
                other => {
                    warn!(
                        "Unsupported structure <{}>, skipping",
                        String::from_utf8_lossy(other)
                    );
                    if is_start {
                        skip_element(reader, other)?;
                    }
                    Ok(())
                }
            }
        })
    }

    fn read_volume<R: BufRead>(
        &mut self,
        reader: &mut Reader<R>,
        start: &BytesStart,
        is_start: bool,
    ) -> Result<()> {
        let mut volume = LogicalVolume {
            name: attribute(start, "name")?,
            solid: String::new(),
            material: String::new(),
            daughters: Vec::new(),
        };

        if is_start {
            for_each_child(reader, b"volume", |reader, e, is_start| {
                match e.name().as_ref() {
                    b"materialref" => {
                        volume.material = attribute(e, "ref")?;
                        self.registry.ensure_nist_material(&volume.material)?;
                    }
                    b"solidref" => volume.solid = attribute(e, "ref")?,
                    b"physvol" => {
                        let count = volume.daughters.len();
                        let pv = read_physvol(reader, e, is_start, &self.registry, count)?;
                        volume.daughters.push(pv.name.clone());
                        self.registry.add_physical_volume(pv)?;
                        return Ok(());
                    }
                    _ => (),
                }
                if is_start {
                    skip_element(reader, e.name().as_ref())?;
                }
                Ok(())
            })?;
        }

        if volume.solid.is_empty() || volume.material.is_empty() {
            bail!(
                "Volume \"{}\" needs both a <materialref> and a <solidref>",
                volume.name
            );
        }

        self.registry.add_logical_volume(volume)
    }
}

/// World volume definition
impl GdmlReader {
    fn read_setup<R: BufRead>(&mut self, reader: &mut Reader<R>) -> Result<()> {
        for_each_child(reader, b"setup", |reader, e, is_start| {
            if e.name().as_ref() == b"world" {
                let world = attribute(e, "ref")?;
                debug!("World volume is {world}");
                self.registry.world = Some(world);
            }
            if is_start {
                skip_element(reader, e.name().as_ref())?;
            }
            Ok(())
        })
    }
}

/// Visit every direct child of the element just opened, until its end tag
///
/// The visitor gets the child start tag and whether it has content. Children
/// with content must be consumed or skipped by the visitor.
fn for_each_child<R, F>(reader: &mut Reader<R>, end: &[u8], mut visit: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&mut Reader<R>, &BytesStart, bool) -> Result<()>,
{
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => visit(reader, e, true)?,
            Ok(Event::Empty(ref e)) => visit(reader, e, false)?,
            Ok(Event::End(ref e)) if e.name().as_ref() == end => break,
            Ok(Event::Eof) => bail!(
                "Unexpected end of file inside <{}>",
                String::from_utf8_lossy(end)
            ),
            Ok(_) => {}
            Err(e) => bail!("XML error at position {}: {e}", reader.buffer_position()),
        }
        buf.clear();
    }

    Ok(())
}

/// Skip over an element and all of its children
fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == name => depth += 1,
            Ok(Event::End(ref e)) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => bail!("XML error at position {}: {e}", reader.buffer_position()),
        }
        buf.clear();
    }

    Ok(())
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

/// Required attribute as a string
fn attribute(e: &BytesStart, name: &str) -> Result<String> {
    attribute_opt(e, name)?
        .ok_or_else(|| anyhow!("Missing attribute \"{name}\" on <{}>", tag_name(e)))
}

/// Optional attribute as a string
fn attribute_opt(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| anyhow!("Bad attribute on <{}>: {err}", tag_name(e)))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|err| anyhow!("Bad value for \"{name}\" on <{}>: {err}", tag_name(e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Required numeric attribute, evaluated as an expression
fn value(e: &BytesStart, name: &str, reg: &Registry) -> Result<f64> {
    let raw = attribute(e, name)?;
    parsers::evaluate(&raw, &reg.constants)
        .with_context(|| f!("Invalid \"{name}\" on <{}>", tag_name(e)))
}

/// Optional numeric attribute with a default
fn value_or(e: &BytesStart, name: &str, default: f64, reg: &Registry) -> Result<f64> {
    match attribute_opt(e, name)? {
        Some(raw) => parsers::evaluate(&raw, &reg.constants)
            .with_context(|| f!("Invalid \"{name}\" on <{}>", tag_name(e))),
        None => Ok(default),
    }
}

/// Length multiplier from `lunit` or `unit`, defaulting to mm
fn length_unit(e: &BytesStart) -> Result<f64> {
    match attribute_opt(e, "lunit")?.or(attribute_opt(e, "unit")?) {
        Some(unit) => parsers::length_unit(&unit),
        None => Ok(1.0),
    }
}

/// Angle multiplier from `aunit` or `unit`, defaulting to rad
fn angle_unit(e: &BytesStart) -> Result<f64> {
    match attribute_opt(e, "aunit")?.or(attribute_opt(e, "unit")?) {
        Some(unit) => parsers::angle_unit(&unit),
        None => Ok(1.0),
    }
}

/// Whatever kind of unit a quantity has
fn any_unit(e: &BytesStart) -> Result<f64> {
    match attribute_opt(e, "unit")? {
        Some(unit) => parsers::length_unit(&unit)
            .or_else(|_| parsers::angle_unit(&unit))
            .or_else(|_| parsers::density_unit(&unit)),
        None => Ok(1.0),
    }
}

fn read_position(e: &BytesStart, reg: &Registry) -> Result<Vector3<f64>> {
    let unit = length_unit(e)?;
    Ok(Vector3::new(
        value_or(e, "x", 0.0, reg)?,
        value_or(e, "y", 0.0, reg)?,
        value_or(e, "z", 0.0, reg)?,
    ) * unit)
}

fn read_rotation(e: &BytesStart, reg: &Registry) -> Result<Matrix3<f64>> {
    let unit = angle_unit(e)?;
    Ok(gdml_rotation(
        value_or(e, "x", 0.0, reg)? * unit,
        value_or(e, "y", 0.0, reg)? * unit,
        value_or(e, "z", 0.0, reg)? * unit,
    ))
}

fn read_element<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    is_start: bool,
    reg: &Registry,
) -> Result<ChemicalElement> {
    let mut element = ChemicalElement {
        name: attribute(start, "name")?,
        formula: attribute_opt(start, "formula")?.unwrap_or_default(),
        z: value_or(start, "Z", 0.0, reg)? as u32,
        a: 0.0,
    };

    if is_start {
        for_each_child(reader, b"element", |reader, e, is_start| {
            if e.name().as_ref() == b"atom" {
                element.a = value(e, "value", reg)?;
            }
            if is_start {
                skip_element(reader, e.name().as_ref())?;
            }
            Ok(())
        })?;
    }

    if element.a == 0.0 {
        debug!("Element {} has no molar mass, Z only", element.name);
    }
    Ok(element)
}

fn read_material<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    is_start: bool,
    reg: &mut Registry,
) -> Result<Material> {
    let name = attribute(start, "name")?;
    let z = attribute_opt(start, "Z")?
        .map(|raw| parsers::evaluate(&raw, &reg.constants))
        .transpose()?;

    let mut density = None;
    let mut molar_mass = None;
    let mut fractions: Vec<(String, f64)> = Vec::new();
    let mut composites: Vec<(String, u32)> = Vec::new();

    if is_start {
        for_each_child(reader, b"material", |reader, e, is_start| {
            match e.name().as_ref() {
                b"D" => {
                    let unit = match attribute_opt(e, "unit")? {
                        Some(unit) => parsers::density_unit(&unit)?,
                        None => 1.0,
                    };
                    density = Some(value(e, "value", reg)? * unit);
                }
                b"atom" => molar_mass = Some(value(e, "value", reg)?),
                b"fraction" => {
                    let component = attribute(e, "ref")?;
                    if component.starts_with("G4_") && !reg.is_element(&component) {
                        reg.ensure_nist_material(&component)?;
                    }
                    fractions.push((component, value(e, "n", reg)?));
                }
                b"composite" => {
                    composites.push((attribute(e, "ref")?, value(e, "n", reg)? as u32));
                }
                _ => (),
            }
            if is_start {
                skip_element(reader, e.name().as_ref())?;
            }
            Ok(())
        })?;
    }

    let density = density.ok_or_else(|| anyhow!("Material \"{name}\" has no density <D>"))?;

    let kind = match (z, molar_mass) {
        (Some(z), Some(a)) => MaterialKind::Simple { z, a },
        (Some(_), None) => bail!("Material \"{name}\" has Z but no <atom>"),
        _ if !fractions.is_empty() => MaterialKind::Mixture(fractions),
        _ if !composites.is_empty() => MaterialKind::Composite(composites),
        _ => bail!("Material \"{name}\" has no composition"),
    };

    trace!("Material {name}: {kind:?}");
    Ok(Material {
        name,
        density,
        kind,
    })
}

fn read_box(e: &BytesStart, reg: &Registry) -> Result<Solid> {
    let l = length_unit(e)?;
    Ok(Solid::Box {
        x: value(e, "x", reg)? * l,
        y: value(e, "y", reg)? * l,
        z: value(e, "z", reg)? * l,
    })
}

fn read_tube(e: &BytesStart, reg: &Registry) -> Result<Solid> {
    let (l, a) = (length_unit(e)?, angle_unit(e)?);
    Ok(Solid::Tube {
        rmin: value_or(e, "rmin", 0.0, reg)? * l,
        rmax: value(e, "rmax", reg)? * l,
        z: value(e, "z", reg)? * l,
        start_phi: value_or(e, "startphi", 0.0, reg)? * a,
        delta_phi: value(e, "deltaphi", reg)? * a,
    })
}

fn read_cut_tube(e: &BytesStart, reg: &Registry) -> Result<Solid> {
    let (l, a) = (length_unit(e)?, angle_unit(e)?);
    Ok(Solid::CutTube {
        rmin: value_or(e, "rmin", 0.0, reg)? * l,
        rmax: value(e, "rmax", reg)? * l,
        z: value(e, "z", reg)? * l,
        start_phi: value_or(e, "startphi", 0.0, reg)? * a,
        delta_phi: value(e, "deltaphi", reg)? * a,
        low_normal: Vector3::new(
            value_or(e, "lowX", 0.0, reg)?,
            value_or(e, "lowY", 0.0, reg)?,
            value_or(e, "lowZ", -1.0, reg)?,
        ),
        high_normal: Vector3::new(
            value_or(e, "highX", 0.0, reg)?,
            value_or(e, "highY", 0.0, reg)?,
            value_or(e, "highZ", 1.0, reg)?,
        ),
    })
}

fn read_cone(e: &BytesStart, reg: &Registry) -> Result<Solid> {
    let (l, a) = (length_unit(e)?, angle_unit(e)?);
    Ok(Solid::Cone {
        rmin1: value_or(e, "rmin1", 0.0, reg)? * l,
        rmax1: value(e, "rmax1", reg)? * l,
        rmin2: value_or(e, "rmin2", 0.0, reg)? * l,
        rmax2: value(e, "rmax2", reg)? * l,
        z: value(e, "z", reg)? * l,
        start_phi: value_or(e, "startphi", 0.0, reg)? * a,
        delta_phi: value(e, "deltaphi", reg)? * a,
    })
}

fn read_sphere(e: &BytesStart, reg: &Registry) -> Result<Solid> {
    let (l, a) = (length_unit(e)?, angle_unit(e)?);
    Ok(Solid::Sphere {
        rmin: value_or(e, "rmin", 0.0, reg)? * l,
        rmax: value(e, "rmax", reg)? * l,
        start_phi: value_or(e, "startphi", 0.0, reg)? * a,
        delta_phi: value(e, "deltaphi", reg)? * a,
        start_theta: value_or(e, "starttheta", 0.0, reg)? * a,
        delta_theta: value(e, "deltatheta", reg)? * a,
    })
}

/// Boolean solids refer to previously defined solids by name
fn read_boolean<R: BufRead>(
    reader: &mut Reader<R>,
    op: BooleanOp,
    reg: &Registry,
) -> Result<Solid> {
    let end: &[u8] = match op {
        BooleanOp::Union => b"union",
        BooleanOp::Subtraction => b"subtraction",
        BooleanOp::Intersection => b"intersection",
    };

    let mut first = None;
    let mut second = None;
    let mut placement = Placement::default();

    for_each_child(reader, end, |reader, e, is_start| {
        match e.name().as_ref() {
            b"first" => first = Some(reg.solid(&attribute(e, "ref")?)?.clone()),
            b"second" => second = Some(reg.solid(&attribute(e, "ref")?)?.clone()),
            b"position" => placement.position = read_position(e, reg)?,
            b"positionref" => placement.position = named_position(&attribute(e, "ref")?, reg)?,
            b"rotation" => placement.rotation = read_rotation(e, reg)?,
            b"rotationref" => placement.rotation = named_rotation(&attribute(e, "ref")?, reg)?,
            other => warn!(
                "Ignored <{}> in boolean solid",
                String::from_utf8_lossy(other)
            ),
        }
        if is_start {
            skip_element(reader, e.name().as_ref())?;
        }
        Ok(())
    })?;

    Ok(Solid::Boolean {
        op,
        first: Box::new(first.ok_or_else(|| anyhow!("Boolean solid without <first>"))?),
        second: Box::new(second.ok_or_else(|| anyhow!("Boolean solid without <second>"))?),
        placement,
    })
}

fn read_physvol<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    is_start: bool,
    reg: &Registry,
    count: usize,
) -> Result<PhysicalVolume> {
    let name = attribute_opt(start, "name")?;
    let mut logical_volume = None;
    let mut placement = Placement::default();

    if is_start {
        for_each_child(reader, b"physvol", |reader, e, is_start| {
            match e.name().as_ref() {
                b"volumeref" => logical_volume = Some(attribute(e, "ref")?),
                b"position" => placement.position = read_position(e, reg)?,
                b"positionref" => {
                    placement.position = named_position(&attribute(e, "ref")?, reg)?
                }
                b"rotation" => placement.rotation = read_rotation(e, reg)?,
                b"rotationref" => {
                    placement.rotation = named_rotation(&attribute(e, "ref")?, reg)?
                }
                other => warn!("Ignored <{}> in physvol", String::from_utf8_lossy(other)),
            }
            if is_start {
                skip_element(reader, e.name().as_ref())?;
            }
            Ok(())
        })?;
    }

    let logical_volume =
        logical_volume.ok_or_else(|| anyhow!("Physical volume without <volumeref>"))?;

    Ok(PhysicalVolume {
        name: name.unwrap_or_else(|| f!("{logical_volume}_PV{count}")),
        logical_volume,
        placement,
    })
}

fn named_position(name: &str, reg: &Registry) -> Result<Vector3<f64>> {
    reg.positions
        .get(name)
        .copied()
        .ok_or_else(|| anyhow!("Position \"{name}\" not defined"))
}

fn named_rotation(name: &str, reg: &Registry) -> Result<Matrix3<f64>> {
    reg.rotations
        .get(name)
        .copied()
        .ok_or_else(|| anyhow!("Rotation \"{name}\" not defined"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    const GDML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gdml xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <define>
    <constant name="HALFLEN" value="500"/>
    <quantity name="wall" value="5" unit="mm"/>
    <position name="shift" x="0" y="0" z="HALFLEN/2" unit="mm"/>
    <rotation name="turn" x="0" y="90" z="0" unit="deg"/>
  </define>
  <materials>
    <element name="Fe_el" formula="Fe" Z="26"><atom unit="g/mole" value="55.845"/></element>
    <element name="Cr_el" formula="Cr" Z="24"><atom value="51.996"/></element>
    <material name="steel" state="solid">
      <D value="8.0" unit="g/cm3"/>
      <fraction n="0.8" ref="Fe_el"/>
      <fraction n="0.2" ref="Cr_el"/>
    </material>
    <material name="copper" Z="29"><D value="8.96"/><atom value="63.546"/></material>
  </materials>
  <solids>
    <box name="world_box" x="2" y="2" z="2" lunit="m"/>
    <tube name="pipe" rmin="30" rmax="30+wall" z="2*HALFLEN" deltaphi="360" aunit="deg"/>
    <box name="cut" x="10" y="10" z="10"/>
    <subtraction name="pipe_cut">
      <first ref="pipe"/><second ref="cut"/>
      <positionref ref="shift"/>
    </subtraction>
    <polycone name="strange" startphi="0" deltaphi="1"/>
  </solids>
  <structure>
    <volume name="pipe_lv">
      <materialref ref="steel"/>
      <solidref ref="pipe_cut"/>
    </volume>
    <volume name="world_lv">
      <materialref ref="G4_AIR"/>
      <solidref ref="world_box"/>
      <physvol name="pipe_pv">
        <volumeref ref="pipe_lv"/>
        <position name="p" x="1" unit="cm"/>
        <rotationref ref="turn"/>
      </physvol>
      <physvol>
        <volumeref ref="pipe_lv"/>
      </physvol>
    </volume>
  </structure>
  <setup name="Default" version="1.0"><world ref="world_lv"/></setup>
</gdml>
"#;

    fn registry() -> Registry {
        GdmlReader::new().parse_str(GDML).unwrap()
    }

    #[test]
    fn test_defines() {
        let reg = registry();
        assert_eq!(reg.constants["HALFLEN"], 500.0);
        assert_eq!(reg.positions["shift"].z, 250.0);
        let turned = reg.rotations["turn"] * Vector3::z();
        assert!((turned - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_materials() {
        let reg = registry();
        assert_eq!(reg.element("Fe_el").unwrap().z, 26);
        assert!((reg.element("Fe_el").unwrap().a - 55.845).abs() < 1e-12);

        let steel = reg.material("steel").unwrap();
        assert_eq!(steel.density, 8.0);
        assert_eq!(
            steel.kind,
            MaterialKind::Mixture(vec![("Fe_el".into(), 0.8), ("Cr_el".into(), 0.2)])
        );

        let copper = reg.material("copper").unwrap();
        assert_eq!(copper.kind, MaterialKind::Simple { z: 29.0, a: 63.546 });

        // referenced but never defined
        assert_eq!(reg.material("G4_AIR").unwrap().kind, MaterialKind::Nist);
    }

    #[test]
    fn test_solids() {
        let reg = registry();
        assert_eq!(
            reg.solid("world_box").unwrap(),
            &Solid::cuboid(2000.0, 2000.0, 2000.0)
        );
        match reg.solid("pipe").unwrap() {
            Solid::Tube {
                rmax, z, delta_phi, ..
            } => {
                assert_eq!(*rmax, 35.0);
                assert_eq!(*z, 1000.0);
                assert!((delta_phi - TAU).abs() < 1e-12);
            }
            other => panic!("Expected a tube, found {other:?}"),
        }
        assert!(matches!(
            reg.solid("pipe_cut").unwrap(),
            Solid::Boolean {
                op: BooleanOp::Subtraction,
                ..
            }
        ));
        assert!(reg.solid("strange").is_err());
    }

    #[test]
    fn test_structure() {
        let reg = registry();
        assert_eq!(reg.world.as_deref(), Some("world_lv"));

        let world = reg.logical_volume("world_lv").unwrap();
        assert_eq!(world.daughters, vec!["pipe_pv", "pipe_lv_PV1"]);

        let pv = reg.physical_volume("pipe_pv").unwrap();
        assert_eq!(pv.logical_volume, "pipe_lv");
        assert_eq!(pv.placement.position.x, 10.0);

        let tree = reg.volume_tree("world_lv").unwrap();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.daughters.len(), 2);
    }

    #[test]
    fn test_rotation_units() {
        let xml = r#"<gdml><define><rotation name="r" z="pi/2"/></define></gdml>"#;
        let reg = GdmlReader::new().parse_str(xml).unwrap();
        let x = reg.rotations["r"] * Vector3::x();
        assert!((x + Vector3::y()).norm() < 1e-9);
    }

    #[test]
    fn test_errors() {
        let missing_density = r#"<gdml><materials>
            <material name="m"><fraction n="1" ref="X"/></material>
        </materials></gdml>"#;
        assert!(GdmlReader::new().parse_str(missing_density).is_err());

        let bad_expression = r#"<gdml><solids><box name="b" x="1+" y="1" z="1"/></solids></gdml>"#;
        let err = GdmlReader::new().parse_str(bad_expression).unwrap_err();
        assert!(f!("{err:#}").contains("\"x\""));

        let truncated = r#"<gdml><solids><box name="b" x="1" y="1" z="1"/>"#;
        assert!(GdmlReader::new().parse_str(truncated).is_err());
    }

    #[test]
    fn test_undefined_material_reference() {
        let xml = r#"<gdml><solids><box name="b" x="1" y="1" z="1"/></solids>
            <structure><volume name="lv">
                <materialref ref="unobtainium"/><solidref ref="b"/>
            </volume></structure></gdml>"#;
        let err = GdmlReader::new().parse_str(xml).unwrap_err();
        assert!(f!("{err:#}").contains("unobtainium"));

        let nist = xml.replace("unobtainium", "G4_Cu");
        let reg = GdmlReader::new().parse_str(&nist).unwrap();
        assert_eq!(reg.material("G4_Cu").unwrap().kind, MaterialKind::Nist);
    }
}
