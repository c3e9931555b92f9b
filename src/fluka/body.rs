//! FLUKA geometry bodies
//!
//! Bodies are stored in millimetres like everything else and only converted
//! to centimetres when written. Every body is written on one logical line of
//! name-based free format input, wrapped if it gets too long.

// internal modules
use crate::geometry::transform::MM_PER_CM;
use crate::geometry::Placement;
use crate::utils::*;

// external crates
use itertools::Itertools;
use nalgebra::Vector3;
use textwrap::{Options, WordSplitter};

/// Maximum width of a free format geometry line
pub const LINE_WIDTH: usize = 120;

/// Primitive body types
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// General box from a vertex and three perpendicular edges
    Box {
        vertex: Vector3<f64>,
        a: Vector3<f64>,
        b: Vector3<f64>,
        c: Vector3<f64>,
    },
    /// Right circular cylinder from the base centre and the height vector
    Rcc {
        base: Vector3<f64>,
        height: Vector3<f64>,
        radius: f64,
    },
    /// Truncated right cone, `base_radius` at `base`
    Trc {
        base: Vector3<f64>,
        height: Vector3<f64>,
        base_radius: f64,
        top_radius: f64,
    },
    Sph {
        centre: Vector3<f64>,
        radius: f64,
    },
    /// Half-space, the inside is opposite the normal
    Pla {
        normal: Vector3<f64>,
        point: Vector3<f64>,
    },
}

impl Shape {
    /// FLUKA body code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Box { .. } => "BOX",
            Self::Rcc { .. } => "RCC",
            Self::Trc { .. } => "TRC",
            Self::Sph { .. } => "SPH",
            Self::Pla { .. } => "PLA",
        }
    }

    /// The same shape moved by a placement
    pub fn transformed(&self, p: &Placement) -> Shape {
        match self {
            Self::Box { vertex, a, b, c } => Self::Box {
                vertex: p.apply_point(vertex),
                a: p.apply_vector(a),
                b: p.apply_vector(b),
                c: p.apply_vector(c),
            },
            Self::Rcc {
                base,
                height,
                radius,
            } => Self::Rcc {
                base: p.apply_point(base),
                height: p.apply_vector(height),
                radius: *radius,
            },
            Self::Trc {
                base,
                height,
                base_radius,
                top_radius,
            } => Self::Trc {
                base: p.apply_point(base),
                height: p.apply_vector(height),
                base_radius: *base_radius,
                top_radius: *top_radius,
            },
            Self::Sph { centre, radius } => Self::Sph {
                centre: p.apply_point(centre),
                radius: *radius,
            },
            Self::Pla { normal, point } => Self::Pla {
                normal: p.apply_vector(normal),
                point: p.apply_point(point),
            },
        }
    }

    /// Parameters in millimetres, in the order FLUKA expects them
    fn parameters(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(12);
        match self {
            Self::Box { vertex, a, b, c } => {
                values.extend(vertex.iter().chain(a.iter()).chain(b.iter()).chain(c.iter()))
            }
            Self::Rcc {
                base,
                height,
                radius,
            } => {
                values.extend(base.iter().chain(height.iter()));
                values.push(*radius);
            }
            Self::Trc {
                base,
                height,
                base_radius,
                top_radius,
            } => {
                values.extend(base.iter().chain(height.iter()));
                values.extend([*base_radius, *top_radius]);
            }
            Self::Sph { centre, radius } => {
                values.extend(centre.iter());
                values.push(*radius);
            }
            Self::Pla { normal, point } => {
                values.extend(normal.normalize().iter());
                values.extend(point.iter());
            }
        }
        values
    }
}

/// A named body
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub name: String,
    pub shape: Shape,
}

impl Body {
    pub fn new(name: &str, shape: Shape) -> Self {
        Self {
            name: name.to_string(),
            shape,
        }
    }

    /// The same body moved by a placement
    pub fn transformed(&self, placement: &Placement) -> Body {
        Body {
            name: self.name.clone(),
            shape: self.shape.transformed(placement),
        }
    }
}

impl std::fmt::Display for Body {
    /// Free format line with every length in centimetres
    ///
    /// ```rust
    /// # use flubl::fluka::{Body, Shape};
    /// # use nalgebra::Vector3;
    /// let body = Body::new(
    ///     "B0000001",
    ///     Shape::Sph { centre: Vector3::new(0.0, 0.0, 10.0), radius: 5.0 },
    /// );
    /// assert_eq!(body.to_string(), "SPH B0000001 0.0 0.0 1.0 0.5");
    /// ```
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // normals are unitless, everything else is a length
        let is_pla = matches!(self.shape, Shape::Pla { .. });
        let values = self
            .shape
            .parameters()
            .into_iter()
            .enumerate()
            .map(|(i, v)| match is_pla && i < 3 {
                true => fluka_number(v),
                false => fluka_number(v / MM_PER_CM),
            })
            .join(" ");

        let line = f!("{} {} {}", self.shape.code(), self.name, values);
        write!(f, "{}", wrap(&line))
    }
}

/// Wrap a long free format line, continuation lines indented
pub fn wrap(line: &str) -> String {
    let options = Options::new(LINE_WIDTH)
        .subsequent_indent("    ")
        .break_words(false)
        .word_splitter(WordSplitter::NoHyphenation);
    textwrap::fill(line, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::transform::rotation_y;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rcc_in_cm() {
        let body = Body::new(
            "B1",
            Shape::Rcc {
                base: Vector3::new(0.0, 0.0, -500.0),
                height: Vector3::new(0.0, 0.0, 1000.0),
                radius: 35.0,
            },
        );
        assert_eq!(body.to_string(), "RCC B1 0.0 0.0 -50.0 0.0 0.0 100.0 3.5");
    }

    #[test]
    fn test_pla_normal_is_unitless() {
        let body = Body::new(
            "P1",
            Shape::Pla {
                normal: Vector3::new(0.0, 0.0, 2.0),
                point: Vector3::new(0.0, 0.0, 100.0),
            },
        );
        assert_eq!(body.to_string(), "PLA P1 0.0 0.0 1.0 0.0 0.0 10.0");
    }

    #[test]
    fn test_transformed() {
        let p = Placement::new(Vector3::new(100.0, 0.0, 0.0), rotation_y(FRAC_PI_2));
        let shape = Shape::Rcc {
            base: Vector3::zeros(),
            height: Vector3::new(0.0, 0.0, 10.0),
            radius: 1.0,
        }
        .transformed(&p);

        match shape {
            Shape::Rcc { base, height, .. } => {
                assert!((base - Vector3::new(100.0, 0.0, 0.0)).norm() < 1e-9);
                assert!((height - Vector3::new(10.0, 0.0, 0.0)).norm() < 1e-9);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_long_lines_wrap() {
        let body = Body::new(
            "B0000001",
            Shape::Box {
                vertex: Vector3::new(-1234.56789, -2345.67891, -3456.78912),
                a: Vector3::new(2469.13578, 1.23456789, 1.23456789),
                b: Vector3::new(1.23456789, 4691.35782, 1.23456789),
                c: Vector3::new(1.23456789, 1.23456789, 6913.57824),
            },
        );

        // every value takes a full 10 character field
        let unwrapped = body.shape.parameters().len() * (FIELD_WIDTH + 1) + "BOX B0000001".len();
        assert!(unwrapped > LINE_WIDTH);

        let s = body.to_string();
        assert!(s.lines().count() > 1);
        assert_eq!(s.split_whitespace().count(), 14);
        assert!(s.split_whitespace().skip(2).all(|v| v.len() == FIELD_WIDTH));
        assert!(s.lines().all(|l| l.len() <= LINE_WIDTH));
        assert!(s.lines().skip(1).all(|l| l.starts_with("    ")));
    }
}
