//! Solid shapes and their bounding extents
//!
//! Only the shapes BDSIM commonly writes to GDML are represented. Dimensions
//! follow GDML conventions: full lengths for box sides and tube lengths, radii
//! for everything round, and angles in radians.

// standard library
use std::f64::consts::{FRAC_PI_2, PI, TAU};

// internal modules
use crate::geometry::Placement;

// external crates
use nalgebra::Vector3;

/// Axis aligned bounding box in some local frame (mm)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Extent {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    /// Extent centred on the origin from half lengths
    pub fn from_half_lengths(hx: f64, hy: f64, hz: f64) -> Self {
        Self {
            min: Vector3::new(-hx, -hy, -hz),
            max: Vector3::new(hx, hy, hz),
        }
    }

    /// Full widths in x, y, z
    pub fn widths(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn centre(&self) -> Vector3<f64> {
        0.5 * (self.max + self.min)
    }

    /// The eight corner points
    pub fn corners(&self) -> [Vector3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vector3::new(a.x, a.y, a.z),
            Vector3::new(b.x, a.y, a.z),
            Vector3::new(a.x, b.y, a.z),
            Vector3::new(b.x, b.y, a.z),
            Vector3::new(a.x, a.y, b.z),
            Vector3::new(b.x, a.y, b.z),
            Vector3::new(a.x, b.y, b.z),
            Vector3::new(b.x, b.y, b.z),
        ]
    }

    /// Smallest extent containing both
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Overlapping part of both, `None` if disjoint
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let min = self.min.sup(&other.min);
        let max = self.max.inf(&other.max);
        match (0..3).all(|i| min[i] < max[i]) {
            true => Some(Extent { min, max }),
            false => None,
        }
    }

    /// True if `other` lies entirely inside this extent
    pub fn contains(&self, other: &Extent) -> bool {
        (0..3).all(|i| other.min[i] >= self.min[i] && other.max[i] <= self.max[i])
    }

    /// Axis aligned extent of this box after a placement
    pub fn transformed(&self, placement: &Placement) -> Extent {
        let corners = self.corners().map(|c| placement.apply_point(&c));
        let mut extent = Extent::new(corners[0], corners[0]);
        for c in &corners[1..] {
            extent.min = extent.min.inf(c);
            extent.max = extent.max.sup(c);
        }
        extent
    }
}

/// Boolean operation combining two solids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Subtraction,
    Intersection,
}

/// Representation of a solid shape
///
/// Boolean solids own both operands, with the second placed in the frame of
/// the first.
#[derive(Debug, Clone, PartialEq)]
pub enum Solid {
    /// Rectangular box with full side lengths
    Box { x: f64, y: f64, z: f64 },
    /// Cylindrical section with full length `z`
    Tube {
        rmin: f64,
        rmax: f64,
        z: f64,
        start_phi: f64,
        delta_phi: f64,
    },
    /// Tube with tilted end faces given by their outward normals
    CutTube {
        rmin: f64,
        rmax: f64,
        z: f64,
        start_phi: f64,
        delta_phi: f64,
        low_normal: Vector3<f64>,
        high_normal: Vector3<f64>,
    },
    /// Conical section with full length `z`
    Cone {
        rmin1: f64,
        rmax1: f64,
        rmin2: f64,
        rmax2: f64,
        z: f64,
        start_phi: f64,
        delta_phi: f64,
    },
    /// Spherical shell, only full spheres survive conversion
    Sphere {
        rmin: f64,
        rmax: f64,
        start_phi: f64,
        delta_phi: f64,
        start_theta: f64,
        delta_theta: f64,
    },
    Boolean {
        op: BooleanOp,
        first: Box<Solid>,
        second: Box<Solid>,
        placement: Placement,
    },
}

impl Solid {
    /// Convenience constructor for a box from full side lengths
    pub fn cuboid(x: f64, y: f64, z: f64) -> Self {
        Self::Box { x, y, z }
    }

    /// Short name of the solid type for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Tube { .. } => "tube",
            Self::CutTube { .. } => "cutTube",
            Self::Cone { .. } => "cone",
            Self::Sphere { .. } => "sphere",
            Self::Boolean { op, .. } => match op {
                BooleanOp::Union => "union",
                BooleanOp::Subtraction => "subtraction",
                BooleanOp::Intersection => "intersection",
            },
        }
    }

    /// Bounding extent of the solid in its own frame
    ///
    /// ```rust
    /// # use flubl::geometry::Solid;
    /// let extent = Solid::cuboid(10.0, 20.0, 30.0).extent();
    /// assert_eq!(extent.widths().as_slice(), &[10.0, 20.0, 30.0]);
    /// ```
    pub fn extent(&self) -> Extent {
        match self {
            Self::Box { x, y, z } => Extent::from_half_lengths(x / 2.0, y / 2.0, z / 2.0),
            Self::Tube {
                rmin,
                rmax,
                z,
                start_phi,
                delta_phi,
            } => arc_extent(*rmin, *rmax, *start_phi, *delta_phi, z / 2.0),
            Self::CutTube {
                rmin,
                rmax,
                z,
                start_phi,
                delta_phi,
                low_normal,
                high_normal,
            } => {
                let mut extent = arc_extent(*rmin, *rmax, *start_phi, *delta_phi, z / 2.0);
                extent.min.z -= rmax * tilt(low_normal);
                extent.max.z += rmax * tilt(high_normal);
                extent
            }
            Self::Cone {
                rmin1,
                rmax1,
                rmin2,
                rmax2,
                z,
                start_phi,
                delta_phi,
            } => arc_extent(
                rmin1.min(*rmin2),
                rmax1.max(*rmax2),
                *start_phi,
                *delta_phi,
                z / 2.0,
            ),
            Self::Sphere { rmax, .. } => Extent::from_half_lengths(*rmax, *rmax, *rmax),
            Self::Boolean {
                op,
                first,
                second,
                placement,
            } => {
                let a = first.extent();
                let b = second.extent().transformed(placement);
                match op {
                    BooleanOp::Union => a.union(&b),
                    BooleanOp::Subtraction => a,
                    BooleanOp::Intersection => a.intersection(&b).unwrap_or(a),
                }
            }
        }
    }

    /// True for tube and cone sections missing part of the azimuth
    pub fn is_partial_phi(&self) -> bool {
        match self {
            Self::Tube { delta_phi, .. }
            | Self::CutTube { delta_phi, .. }
            | Self::Cone { delta_phi, .. } => *delta_phi < TAU - 1e-9,
            _ => false,
        }
    }
}

/// A set of concentric boxes, one per hierarchy level
///
/// Level `k` is shrunk by `2 * k` times the offsets, so that clipped daughters
/// always sit slightly inside whatever their mother was clipped to.
///
/// ```rust
/// # use flubl::geometry::{nested_boxes, Solid};
/// let boxes = nested_boxes([100.0, 100.0, 50.0], [5.0, 5.0, 0.0], 3);
/// assert_eq!(boxes.len(), 3);
/// assert_eq!(boxes[2], Solid::cuboid(80.0, 80.0, 50.0));
/// ```
pub fn nested_boxes(size: [f64; 3], offsets: [f64; 3], levels: usize) -> Vec<Solid> {
    (0..levels)
        .map(|k| {
            let shrink = 2.0 * k as f64;
            Solid::cuboid(
                size[0] - shrink * offsets[0],
                size[1] - shrink * offsets[1],
                size[2] - shrink * offsets[2],
            )
        })
        .collect()
}

/// Ratio of the transverse to longitudinal normal component of a cut face
fn tilt(normal: &Vector3<f64>) -> f64 {
    let transverse = (normal.x * normal.x + normal.y * normal.y).sqrt();
    match normal.z.abs() > 1e-12 {
        true => transverse / normal.z.abs(),
        false => 0.0,
    }
}

/// Bounding box of an annular sector extruded along z
fn arc_extent(rmin: f64, rmax: f64, start_phi: f64, delta_phi: f64, half_z: f64) -> Extent {
    if delta_phi >= TAU - 1e-9 {
        return Extent::from_half_lengths(rmax, rmax, half_z);
    }

    let end_phi = start_phi + delta_phi;
    let mut angles = vec![start_phi, end_phi];

    // any axis crossings inside the sector are extreme points
    let mut axis = (start_phi / FRAC_PI_2).ceil() * FRAC_PI_2;
    while axis < end_phi {
        angles.push(axis);
        axis += FRAC_PI_2;
    }

    let mut min = Vector3::new(f64::MAX, f64::MAX, -half_z);
    let mut max = Vector3::new(f64::MIN, f64::MIN, half_z);

    for phi in angles {
        for r in [rmin, rmax] {
            let (x, y) = (r * phi.cos(), r * phi.sin());
            min.x = min.x.min(x);
            min.y = min.y.min(y);
            max.x = max.x.max(x);
            max.y = max.y.max(y);
        }
    }

    // clean up the noise from cos(PI/2) and friends
    for v in [&mut min, &mut max] {
        v.x = snap(v.x, rmax);
        v.y = snap(v.y, rmax);
    }

    Extent::new(min, max)
}

fn snap(value: f64, scale: f64) -> f64 {
    match value.abs() < 1e-12 * scale.max(1.0) {
        true => 0.0,
        false => value,
    }
}
