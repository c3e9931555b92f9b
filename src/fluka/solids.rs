//! Conversion of geometry solids into FLUKA bodies and zones
//!
//! Every solid becomes one or more bodies placed in the global (or element
//! local) frame, and a list of zones describing its volume. Boolean solids
//! are expressed purely as zone algebra on the bodies of their operands.

// internal modules
use crate::fluka::{Body, Shape, Zone};
use crate::geometry::{BooleanOp, Placement, Solid};
use crate::utils::*;

// standard library
use std::f64::consts::PI;

// external crates
use log::{trace, warn};
use nalgebra::Vector3;

/// Tolerance on angles when deciding if a section is complete
const ANGLE_TOLERANCE: f64 = 1e-9;

/// Sequential names for bodies and regions
///
/// FLUKA names are limited to 8 characters, so everything generated gets a
/// one letter prefix and a zero padded counter.
#[derive(Debug, Default, Clone)]
pub struct Namer {
    bodies: usize,
    regions: usize,
    samplers: usize,
    transforms: usize,
}

impl Namer {
    pub fn body(&mut self) -> String {
        self.bodies += 1;
        f!("B{:07}", self.bodies)
    }

    pub fn region(&mut self) -> String {
        self.regions += 1;
        f!("R{:07}", self.regions)
    }

    pub fn sampler(&mut self) -> String {
        self.samplers += 1;
        f!("S{:07}", self.samplers)
    }

    pub fn transform(&mut self) -> String {
        self.transforms += 1;
        f!("T{:07}", self.transforms)
    }
}

/// Collects bodies for one element as solids are converted
#[derive(Debug)]
pub struct BodyCollector<'a> {
    namer: &'a mut Namer,
    pub bodies: Vec<Body>,
}

impl<'a> BodyCollector<'a> {
    pub fn new(namer: &'a mut Namer) -> Self {
        Self {
            namer,
            bodies: Vec::new(),
        }
    }

    /// Add a shape defined in a local frame, returning the body name
    pub fn add(&mut self, shape: Shape, placement: &Placement) -> String {
        let name = self.namer.body();
        self.bodies
            .push(Body::new(&name, shape.transformed(placement)));
        name
    }

    /// Zones describing `solid` placed by `placement`
    pub fn solid_zones(&mut self, solid: &Solid, placement: &Placement) -> Vec<Zone> {
        trace!("Converting {} solid", solid.kind());
        match solid {
            Solid::Box { x, y, z } => vec![Zone::body(&self.add(box_shape(*x, *y, *z), placement))],
            Solid::Tube {
                rmin,
                rmax,
                z,
                start_phi,
                delta_phi,
            } => {
                let zone = self.cylinder(*rmin, *rmax, -z / 2.0, *z, placement);
                vec![self.wedge(zone, *start_phi, *delta_phi, placement)]
            }
            Solid::CutTube {
                rmin,
                rmax,
                z,
                start_phi,
                delta_phi,
                low_normal,
                high_normal,
            } => {
                // long enough for the cut faces to lie inside the cylinder
                let extent = solid.extent();
                let length = extent.max.z - extent.min.z;
                let zone = self.cylinder(*rmin, *rmax, extent.min.z, length, placement);

                let low = self.add(
                    Shape::Pla {
                        normal: *low_normal,
                        point: Vector3::new(0.0, 0.0, -z / 2.0),
                    },
                    placement,
                );
                let high = self.add(
                    Shape::Pla {
                        normal: *high_normal,
                        point: Vector3::new(0.0, 0.0, z / 2.0),
                    },
                    placement,
                );
                let zone = zone.plus(&low).plus(&high);
                vec![self.wedge(zone, *start_phi, *delta_phi, placement)]
            }
            Solid::Cone {
                rmin1,
                rmax1,
                rmin2,
                rmax2,
                z,
                start_phi,
                delta_phi,
            } => {
                let outer = self.add(cone_shape(*rmax1, *rmax2, *z), placement);
                let mut zone = Zone::body(&outer);
                if *rmin1 > 0.0 || *rmin2 > 0.0 {
                    let inner = self.add(cone_shape(*rmin1, *rmin2, *z), placement);
                    zone = zone.minus(&inner);
                }
                vec![self.wedge(zone, *start_phi, *delta_phi, placement)]
            }
            Solid::Sphere {
                rmin,
                rmax,
                start_phi,
                delta_phi,
                start_theta,
                delta_theta,
            } => {
                if *start_theta > ANGLE_TOLERANCE || *delta_theta < PI - ANGLE_TOLERANCE {
                    warn!("Partial theta sphere sections are not supported");
                    return self.bounding_box(solid, placement);
                }
                let centre = Vector3::zeros();
                let outer = self.add(
                    Shape::Sph {
                        centre,
                        radius: *rmax,
                    },
                    placement,
                );
                let mut zone = Zone::body(&outer);
                if *rmin > 0.0 {
                    let inner = self.add(
                        Shape::Sph {
                            centre,
                            radius: *rmin,
                        },
                        placement,
                    );
                    zone = zone.minus(&inner);
                }
                vec![self.wedge(zone, *start_phi, *delta_phi, placement)]
            }
            Solid::Boolean {
                op,
                first,
                second,
                placement: relative,
            } => {
                let a = self.solid_zones(first, placement);
                let b = self.solid_zones(second, &placement.then(relative));
                match op {
                    BooleanOp::Union => a.into_iter().chain(b).collect(),
                    BooleanOp::Intersection => crate::fluka::region::intersect(&a, &b),
                    BooleanOp::Subtraction => a.into_iter().map(|z| z.minus_zones(&b)).collect(),
                }
            }
        }
    }

    /// Axis aligned box around whatever a solid occupies
    pub fn bounding_box(&mut self, solid: &Solid, placement: &Placement) -> Vec<Zone> {
        let extent = solid.extent();
        let widths = extent.widths();
        let shape = Shape::Box {
            vertex: extent.min,
            a: Vector3::new(widths.x, 0.0, 0.0),
            b: Vector3::new(0.0, widths.y, 0.0),
            c: Vector3::new(0.0, 0.0, widths.z),
        };
        vec![Zone::body(&self.add(shape, placement))]
    }

    /// Annular cylinder along z starting at `z0`
    fn cylinder(
        &mut self,
        rmin: f64,
        rmax: f64,
        z0: f64,
        length: f64,
        placement: &Placement,
    ) -> Zone {
        let base = Vector3::new(0.0, 0.0, z0);
        let height = Vector3::new(0.0, 0.0, length);
        let outer = self.add(
            Shape::Rcc {
                base,
                height,
                radius: rmax,
            },
            placement,
        );
        let zone = Zone::body(&outer);
        match rmin > 0.0 {
            true => {
                let inner = self.add(
                    Shape::Rcc {
                        base,
                        height,
                        radius: rmin,
                    },
                    placement,
                );
                zone.minus(&inner)
            }
            false => zone,
        }
    }

    /// Restrict a zone to the azimuthal section `[start, start + delta]`
    fn wedge(&mut self, zone: Zone, start: f64, delta: f64, placement: &Placement) -> Zone {
        if delta >= 2.0 * PI - ANGLE_TOLERANCE {
            return zone;
        }

        let end = start + delta;
        match delta <= PI {
            // intersection of two half-spaces through the axis
            true => {
                let p1 = self.add(phi_plane(start, true), placement);
                let p2 = self.add(phi_plane(end, false), placement);
                zone.plus(&p1).plus(&p2)
            }
            // remove the missing wedge, which is less than half a turn
            false => {
                let q1 = self.add(phi_plane(end, true), placement);
                let q2 = self.add(phi_plane(start, false), placement);
                zone.minus_zones(&[Zone::body(&q1).plus(&q2)])
            }
        }
    }
}

/// Box centred on the origin from full side lengths
pub fn box_shape(x: f64, y: f64, z: f64) -> Shape {
    Shape::Box {
        vertex: Vector3::new(-x / 2.0, -y / 2.0, -z / 2.0),
        a: Vector3::new(x, 0.0, 0.0),
        b: Vector3::new(0.0, y, 0.0),
        c: Vector3::new(0.0, 0.0, z),
    }
}

/// Cylinder or cone centred on the origin, the wider end as the base
fn cone_shape(r1: f64, r2: f64, z: f64) -> Shape {
    let bottom = Vector3::new(0.0, 0.0, -z / 2.0);
    let top = Vector3::new(0.0, 0.0, z / 2.0);

    if (r1 - r2).abs() < 1e-12 {
        return Shape::Rcc {
            base: bottom,
            height: top - bottom,
            radius: r1,
        };
    }

    match r1 > r2 {
        true => Shape::Trc {
            base: bottom,
            height: top - bottom,
            base_radius: r1,
            top_radius: r2,
        },
        false => Shape::Trc {
            base: top,
            height: bottom - top,
            base_radius: r2,
            top_radius: r1,
        },
    }
}

/// Plane through the z axis at azimuth `phi`
///
/// The inside is the half turn after `phi` when `after` is set, otherwise the
/// half turn before it.
fn phi_plane(phi: f64, after: bool) -> Shape {
    let normal = match after {
        true => Vector3::new(phi.sin(), -phi.cos(), 0.0),
        false => Vector3::new(-phi.sin(), phi.cos(), 0.0),
    };
    Shape::Pla {
        normal,
        point: Vector3::zeros(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::transform::rotation_z;
    use std::f64::consts::{FRAC_PI_2, TAU};

    /// Inside test for a single PLA, the inside is opposite the normal
    fn inside(shape: &Shape, point: &Vector3<f64>) -> bool {
        match shape {
            Shape::Pla { normal, point: p } => normal.dot(&(point - p)) < 0.0,
            _ => unreachable!(),
        }
    }

    fn tube(start_phi: f64, delta_phi: f64) -> Solid {
        Solid::Tube {
            rmin: 10.0,
            rmax: 20.0,
            z: 100.0,
            start_phi,
            delta_phi,
        }
    }

    #[test]
    fn test_names() {
        let mut namer = Namer::default();
        assert_eq!(namer.body(), "B0000001");
        assert_eq!(namer.body(), "B0000002");
        assert_eq!(namer.region(), "R0000001");
        assert_eq!(namer.sampler(), "S0000001");
        assert_eq!(namer.transform(), "T0000001");
    }

    #[test]
    fn test_full_tube() {
        let mut namer = Namer::default();
        let mut collector = BodyCollector::new(&mut namer);
        let zones = collector.solid_zones(&tube(0.0, TAU), &Placement::default());

        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].to_string(), "+B0000001 -B0000002");
        assert_eq!(collector.bodies.len(), 2);
        assert_eq!(collector.bodies[0].shape.code(), "RCC");
    }

    #[test]
    fn test_quarter_tube_planes() {
        let mut namer = Namer::default();
        let mut collector = BodyCollector::new(&mut namer);
        let zones = collector.solid_zones(&tube(0.0, FRAC_PI_2), &Placement::default());

        assert_eq!(zones[0].to_string(), "+B0000001 -B0000002 +B0000003 +B0000004");
        let p1 = &collector.bodies[2].shape;
        let p2 = &collector.bodies[3].shape;

        // 45 degrees is inside, 135 and -45 degrees are not
        let at = |deg: f64| {
            let phi = deg.to_radians();
            Vector3::new(15.0 * phi.cos(), 15.0 * phi.sin(), 0.0)
        };
        assert!(inside(p1, &at(45.0)) && inside(p2, &at(45.0)));
        assert!(!(inside(p1, &at(135.0)) && inside(p2, &at(135.0))));
        assert!(!(inside(p1, &at(-45.0)) && inside(p2, &at(-45.0))));
    }

    #[test]
    fn test_large_wedge_subtracts_the_gap() {
        let mut namer = Namer::default();
        let mut collector = BodyCollector::new(&mut namer);
        let zones = collector.solid_zones(&tube(0.0, 1.5 * PI), &Placement::default());
        assert_eq!(
            zones[0].to_string(),
            "+B0000001 -B0000002 -( +B0000003 +B0000004 )"
        );

        // the missing quarter is between 270 and 360 degrees
        let q1 = &collector.bodies[2].shape;
        let q2 = &collector.bodies[3].shape;
        let gap = Vector3::new(1.0, -1.0, 0.0);
        assert!(inside(q1, &gap) && inside(q2, &gap));
        let solid = Vector3::new(-1.0, -1.0, 0.0);
        assert!(!(inside(q1, &solid) && inside(q2, &solid)));
    }

    #[test]
    fn test_boolean_subtraction() {
        let solid = Solid::Boolean {
            op: BooleanOp::Subtraction,
            first: Box::new(Solid::cuboid(10.0, 10.0, 10.0)),
            second: Box::new(Solid::Boolean {
                op: BooleanOp::Union,
                first: Box::new(Solid::cuboid(1.0, 1.0, 1.0)),
                second: Box::new(Solid::cuboid(2.0, 2.0, 2.0)),
                placement: Placement::default(),
            }),
            placement: Placement::translation(Vector3::new(1.0, 0.0, 0.0)),
        };

        let mut namer = Namer::default();
        let mut collector = BodyCollector::new(&mut namer);
        let zones = collector.solid_zones(&solid, &Placement::default());

        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].to_string(), "+B0000001 -( +B0000002 | +B0000003 )");

        // the second operand is moved by the relative placement
        match &collector.bodies[1].shape {
            Shape::Box { vertex, .. } => assert_eq!(vertex.x, 0.5),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_intersection_of_unions() {
        let union = Solid::Boolean {
            op: BooleanOp::Union,
            first: Box::new(Solid::cuboid(1.0, 1.0, 1.0)),
            second: Box::new(Solid::cuboid(2.0, 2.0, 2.0)),
            placement: Placement::default(),
        };
        let solid = Solid::Boolean {
            op: BooleanOp::Intersection,
            first: Box::new(union),
            second: Box::new(Solid::cuboid(3.0, 3.0, 3.0)),
            placement: Placement::default(),
        };

        let mut namer = Namer::default();
        let zones = BodyCollector::new(&mut namer).solid_zones(&solid, &Placement::default());
        let zones = zones.iter().map(|z| z.to_string()).collect::<Vec<String>>();
        assert_eq!(zones, vec!["+B0000001 +B0000003", "+B0000002 +B0000003"]);
    }

    #[test]
    fn test_cone_widest_end_is_base() {
        match cone_shape(5.0, 10.0, 100.0) {
            Shape::Trc {
                base,
                height,
                base_radius,
                top_radius,
            } => {
                assert_eq!(base.z, 50.0);
                assert_eq!(height.z, -100.0);
                assert_eq!((base_radius, top_radius), (10.0, 5.0));
            }
            other => panic!("Expected TRC, found {other:?}"),
        }
        assert_eq!(cone_shape(5.0, 5.0, 1.0).code(), "RCC");
    }

    #[test]
    fn test_partial_theta_falls_back_to_box() {
        let solid = Solid::Sphere {
            rmin: 0.0,
            rmax: 10.0,
            start_phi: 0.0,
            delta_phi: TAU,
            start_theta: 0.0,
            delta_theta: FRAC_PI_2,
        };
        let mut namer = Namer::default();
        let mut collector = BodyCollector::new(&mut namer);
        collector.solid_zones(&solid, &Placement::default());
        assert_eq!(collector.bodies[0].shape.code(), "BOX");
    }

    #[test]
    fn test_placement_applied() {
        let placement = Placement::new(Vector3::new(0.0, 0.0, 100.0), rotation_z(FRAC_PI_2));
        let mut namer = Namer::default();
        let mut collector = BodyCollector::new(&mut namer);
        collector.solid_zones(&Solid::cuboid(2.0, 4.0, 6.0), &placement);

        match &collector.bodies[0].shape {
            Shape::Box { vertex, a, .. } => {
                assert!((vertex - Vector3::new(2.0, -1.0, 97.0)).norm() < 1e-9);
                assert!((a - Vector3::new(0.0, 2.0, 0.0)).norm() < 1e-9);
            }
            _ => unreachable!(),
        }
    }
}
