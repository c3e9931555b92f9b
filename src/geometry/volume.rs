//! Materials, logical and physical volumes
//!
//! The registry stores volumes by name, with logical volumes referring to
//! their solid, material, and daughter physical volumes by name. For any real
//! work a [VolumeTree] is resolved from the registry, which owns everything
//! below it and can be modified without touching other placements of the
//! same logical volume.

// internal modules
use crate::geometry::{nested_boxes, BooleanOp, Extent, Placement, Solid};

// external crates
use log::{debug, trace};

/// A chemical element from the GDML `materials` block
#[derive(Debug, Clone, PartialEq)]
pub struct ChemicalElement {
    pub name: String,
    pub formula: String,
    /// Atomic number
    pub z: u32,
    /// Molar mass (g/mole)
    pub a: f64,
}

/// How a material is composed
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialKind {
    /// Referenced by a Geant4 NIST name without a definition
    Nist,
    /// Single element material from Z and molar mass (g/mole)
    Simple { z: f64, a: f64 },
    /// Mass fractions of elements or other materials
    Mixture(Vec<(String, f64)>),
    /// Atom counts of elements
    Composite(Vec<(String, u32)>),
}

/// A material from the GDML `materials` block
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Density (g/cm3)
    pub density: f64,
    pub kind: MaterialKind,
}

impl Material {
    /// A Geant4 NIST material known only by name
    pub fn nist(name: &str) -> Self {
        Self {
            name: name.to_string(),
            density: 0.0,
            kind: MaterialKind::Nist,
        }
    }
}

/// Abstract shape and material definition
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalVolume {
    pub name: String,
    /// Name of the solid in the registry
    pub solid: String,
    /// Name of the material in the registry
    pub material: String,
    /// Names of daughter physical volumes, in placement order
    pub daughters: Vec<String>,
}

/// Placed instance of a logical volume inside its mother
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalVolume {
    pub name: String,
    /// Name of the placed logical volume
    pub logical_volume: String,
    pub placement: Placement,
}

/// Daughter of a [VolumeTree] with its placement in the mother frame
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedVolume {
    /// Physical volume name
    pub name: String,
    pub placement: Placement,
    pub volume: VolumeTree,
}

/// Fully resolved logical volume hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeTree {
    /// Logical volume name
    pub name: String,
    pub solid: Solid,
    /// Material name
    pub material: String,
    pub daughters: Vec<PlacedVolume>,
}

impl VolumeTree {
    /// Bounding extent of the solid and all daughters in the local frame
    pub fn extent(&self) -> Extent {
        self.daughters
            .iter()
            .fold(self.solid.extent(), |extent, daughter| {
                extent.union(&daughter.volume.extent().transformed(&daughter.placement))
            })
    }

    /// Number of levels in the hierarchy, counting this volume
    ///
    /// A volume without daughters has a depth of 1.
    pub fn depth(&self) -> usize {
        1 + self
            .daughters
            .iter()
            .map(|d| d.volume.depth())
            .max()
            .unwrap_or(0)
    }

    /// Total number of volumes in the hierarchy, counting this volume
    pub fn count(&self) -> usize {
        1 + self
            .daughters
            .iter()
            .map(|d| d.volume.count())
            .sum::<usize>()
    }

    /// Replace the solid, leaving the daughters where they are
    pub fn replace_solid(&mut self, solid: Solid) {
        trace!("{}: replaced {} solid", self.name, self.solid.kind());
        self.solid = solid;
    }

    /// Clip every daughter to a set of nested boxes centred on this volume
    ///
    /// Daughters one level down are clipped to `clippers[0]`, the next level
    /// to `clippers[1]`, and so on. Anything entirely outside its clipping box
    /// is removed, and anything partially outside is intersected with it.
    /// Levels without a clipping box are left alone.
    pub fn clip_geometry(&mut self, clippers: &[Solid]) {
        let before = self.count();
        Self::clip_daughters(&mut self.daughters, &Placement::default(), clippers, 0);
        debug!(
            "{}: clipped hierarchy from {} to {} volumes",
            self.name,
            before,
            self.count()
        );
    }

    fn clip_daughters(
        daughters: &mut Vec<PlacedVolume>,
        frame: &Placement,
        clippers: &[Solid],
        level: usize,
    ) {
        let Some(clipper) = clippers.get(level) else {
            return;
        };
        let clip_extent = clipper.extent();

        daughters.retain_mut(|daughter| {
            // accumulated placement of the daughter in the clipping frame
            let placement = frame.then(&daughter.placement);
            let extent = daughter.volume.solid.extent().transformed(&placement);

            if clip_extent.intersection(&extent).is_none() {
                trace!("Removed {} outside clipping box", daughter.name);
                return false;
            }

            if !clip_extent.contains(&extent) {
                trace!("Intersected {} with clipping box", daughter.name);
                let solid = daughter.volume.solid.clone();
                daughter.volume.solid = Solid::Boolean {
                    op: BooleanOp::Intersection,
                    first: Box::new(solid),
                    second: Box::new(clipper.clone()),
                    placement: placement.inverse(),
                };
            }

            Self::clip_daughters(
                &mut daughter.volume.daughters,
                &placement,
                clippers,
                level + 1,
            );
            true
        });
    }

    /// Replace the solid with a box and clip the daughters to fit a sampler
    ///
    /// The new box is 10% wider than the current extent and 1 mm shorter, and
    /// the daughters are clipped to nested boxes the size of the old
    /// extent, shrinking by 5 mm per side for each level down.
    pub fn prepare_for_sampler(&mut self) -> Extent {
        let extent = self.extent();
        let [dx, dy, dz] = [extent.widths().x, extent.widths().y, extent.widths().z];

        self.replace_solid(Solid::cuboid(1.1 * dx, 1.1 * dy, dz - 1.0));
        let clippers = nested_boxes([dx, dy, dz - 1.0], [5.0, 5.0, 0.0], self.depth());
        self.clip_geometry(&clippers);

        extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn leaf(name: &str, solid: Solid) -> VolumeTree {
        VolumeTree {
            name: name.to_string(),
            solid,
            material: "G4_Fe".to_string(),
            daughters: Vec::new(),
        }
    }

    fn placed(name: &str, z: f64, volume: VolumeTree) -> PlacedVolume {
        PlacedVolume {
            name: name.to_string(),
            placement: Placement::translation(Vector3::new(0.0, 0.0, z)),
            volume,
        }
    }

    fn element() -> VolumeTree {
        let mut container = leaf("container", Solid::cuboid(200.0, 200.0, 1000.0));
        let mut magnet = leaf("magnet", Solid::cuboid(100.0, 100.0, 900.0));
        magnet
            .daughters
            .push(placed("coil_pv", 0.0, leaf("coil", Solid::cuboid(90.0, 90.0, 800.0))));
        container.daughters.push(placed("magnet_pv", 0.0, magnet));
        container
    }

    #[test]
    fn test_depth_and_count() {
        let tree = element();
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.count(), 3);
        assert_eq!(leaf("a", Solid::cuboid(1.0, 1.0, 1.0)).depth(), 1);
    }

    #[test]
    fn test_extent_includes_daughters() {
        let mut tree = leaf("mother", Solid::cuboid(10.0, 10.0, 10.0));
        tree.daughters
            .push(placed("d", 20.0, leaf("d", Solid::cuboid(2.0, 2.0, 2.0))));
        let extent = tree.extent();
        assert_eq!(extent.max.z, 21.0);
        assert_eq!(extent.min.z, -5.0);
    }

    #[test]
    fn test_clip_removes_outside_daughters() {
        let mut tree = leaf("mother", Solid::cuboid(100.0, 100.0, 100.0));
        tree.daughters
            .push(placed("inside", 0.0, leaf("inside", Solid::cuboid(10.0, 10.0, 10.0))));
        tree.daughters
            .push(placed("outside", 500.0, leaf("outside", Solid::cuboid(10.0, 10.0, 10.0))));

        tree.clip_geometry(&[Solid::cuboid(100.0, 100.0, 100.0)]);

        assert_eq!(tree.daughters.len(), 1);
        assert_eq!(tree.daughters[0].name, "inside");
        assert_eq!(tree.daughters[0].volume.solid, Solid::cuboid(10.0, 10.0, 10.0));
    }

    #[test]
    fn test_clip_intersects_partial_daughters() {
        let mut tree = leaf("mother", Solid::cuboid(100.0, 100.0, 100.0));
        tree.daughters
            .push(placed("long", 0.0, leaf("long", Solid::cuboid(10.0, 10.0, 200.0))));

        tree.clip_geometry(&[Solid::cuboid(100.0, 100.0, 100.0)]);

        let solid = &tree.daughters[0].volume.solid;
        assert!(matches!(
            solid,
            Solid::Boolean {
                op: BooleanOp::Intersection,
                ..
            }
        ));
        assert_eq!(solid.extent(), Extent::from_half_lengths(5.0, 5.0, 50.0));
    }

    #[test]
    fn test_prepare_for_sampler() {
        let mut tree = element();
        let extent = tree.prepare_for_sampler();

        assert_eq!(extent.widths(), Vector3::new(200.0, 200.0, 1000.0));
        match tree.solid {
            Solid::Box { x, y, z } => {
                assert!((x - 220.0).abs() < 1e-9);
                assert!((y - 220.0).abs() < 1e-9);
                assert_eq!(z, 999.0);
            }
            _ => panic!("Expected the solid to be replaced by a box"),
        }

        // magnet (900 long) fits in level 0 (200x200x999)
        let magnet = &tree.daughters[0].volume;
        assert_eq!(magnet.solid, Solid::cuboid(100.0, 100.0, 900.0));

        // coil fits in level 1 (180x180x999)
        assert_eq!(magnet.daughters[0].volume.solid, Solid::cuboid(90.0, 90.0, 800.0));
    }

    #[test]
    fn test_prepare_for_sampler_clips_to_level_zero() {
        let mut tree = element();
        tree.daughters.push(PlacedVolume {
            name: "edge_pv".to_string(),
            placement: Placement::translation(Vector3::new(105.0, 0.0, 300.0)),
            volume: leaf("edge", Solid::cuboid(8.0, 8.0, 8.0)),
        });

        // extent is 209 wide in x, so level 0 reaches x = 104.5 and the
        // container box x = 114.95, with the edge volume spanning 101 to 109
        tree.prepare_for_sampler();
        assert!((tree.solid.extent().max.x - 114.95).abs() < 1e-9);

        let magnet = &tree.daughters[0].volume;
        assert_eq!(magnet.solid, Solid::cuboid(100.0, 100.0, 900.0));

        let edge = &tree.daughters[1].volume.solid;
        assert!(matches!(
            edge,
            Solid::Boolean {
                op: BooleanOp::Intersection,
                ..
            }
        ));
        let extent = edge.extent();
        assert!((extent.min.x + 4.0).abs() < 1e-9);
        assert!((extent.max.x + 0.5).abs() < 1e-9);
    }
}
