//! Placements, rotations, and unit conversions
//!
//! Everything internal to the crate is in millimetres and radians. Model data
//! from BDSIM is in metres and is converted on the way in.

// external crates
use nalgebra::{Matrix3, Rotation3, Vector3};

/// Millimetres per metre
pub const MM_PER_M: f64 = 1000.0;

/// Millimetres per centimetre, FLUKA geometry is in cm
pub const MM_PER_CM: f64 = 10.0;

/// A rigid placement: rotation followed by translation
///
/// Maps a point in the local frame of a volume into the frame of its mother
/// as `rotation * point + position`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Translation of the local origin (mm)
    pub position: Vector3<f64>,
    /// Columns are the local x, y, z axes in the mother frame
    pub rotation: Matrix3<f64>,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Matrix3::identity(),
        }
    }
}

impl Placement {
    /// Placement from a position and rotation matrix
    pub fn new(position: Vector3<f64>, rotation: Matrix3<f64>) -> Self {
        Self { position, rotation }
    }

    /// Pure translation
    pub fn translation(position: Vector3<f64>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Apply this placement to a point
    pub fn apply_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.position
    }

    /// Apply only the rotation, for directions and edge vectors
    pub fn apply_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    /// Compose with a placement defined in the local frame of this one
    ///
    /// ```rust
    /// # use flubl::geometry::Placement;
    /// # use nalgebra::Vector3;
    /// let outer = Placement::translation(Vector3::new(1.0, 0.0, 0.0));
    /// let inner = Placement::translation(Vector3::new(0.0, 2.0, 0.0));
    /// let p = outer.then(&inner).apply_point(&Vector3::zeros());
    /// assert_eq!(p, Vector3::new(1.0, 2.0, 0.0));
    /// ```
    pub fn then(&self, inner: &Placement) -> Placement {
        Placement {
            position: self.rotation * inner.position + self.position,
            rotation: self.rotation * inner.rotation,
        }
    }

    /// The inverse placement, mother frame back to local
    pub fn inverse(&self) -> Placement {
        let rotation = self.rotation.transpose();
        Placement {
            position: -(rotation * self.position),
            rotation,
        }
    }

    /// Point a given distance along the local z axis
    ///
    /// Used for the sampler plane offset from the middle of an element.
    pub fn along_z(&self, distance: f64) -> Vector3<f64> {
        self.apply_point(&Vector3::new(0.0, 0.0, distance))
    }
}

/// Convert a position in metres to millimetres
pub fn metres_to_mm(position: &Vector3<f64>) -> Vector3<f64> {
    position * MM_PER_M
}

/// Active rotation about the x axis
pub fn rotation_x(angle: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), angle).into_inner()
}

/// Active rotation about the y axis
pub fn rotation_y(angle: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::y_axis(), angle).into_inner()
}

/// Active rotation about the z axis
pub fn rotation_z(angle: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), angle).into_inner()
}

/// Rotation matrix for a GDML `rotation` element
///
/// GDML angles describe the frame rotation applied in x, y, z order. The
/// placement of the daughter is the inverse of that.
pub fn gdml_rotation(x: f64, y: f64, z: f64) -> Matrix3<f64> {
    (rotation_z(z) * rotation_y(y) * rotation_x(x)).transpose()
}

/// Euler angles `(x, y, z)` such that `R = Rz(z) * Ry(y) * Rx(x)`
pub fn euler_xyz(rotation: &Matrix3<f64>) -> (f64, f64, f64) {
    Rotation3::from_matrix_unchecked(*rotation).euler_angles()
}

/// Row-major nested arrays, handy for printing and serialising
pub fn rows(matrix: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [matrix[(0, 0)], matrix[(0, 1)], matrix[(0, 2)]],
        [matrix[(1, 0)], matrix[(1, 1)], matrix[(1, 2)]],
        [matrix[(2, 0)], matrix[(2, 1)], matrix[(2, 2)]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn close(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        (a - b).norm() < 1e-9
    }

    /// Orthonormal with a determinant of +1
    fn is_rotation(matrix: &Matrix3<f64>) -> bool {
        let orthonormal = (matrix * matrix.transpose() - Matrix3::identity()).abs().max() < 1e-6;
        orthonormal && (matrix.determinant() - 1.0).abs() < 1e-6
    }

    #[test]
    fn test_rotation_y_bends_z_towards_x() {
        let z = rotation_y(FRAC_PI_2) * Vector3::z();
        assert!(close(&z, &Vector3::x()));
    }

    #[test]
    fn test_inverse_round_trip() {
        let p = Placement::new(Vector3::new(1.0, 2.0, 3.0), rotation_z(0.3) * rotation_x(1.1));
        let point = Vector3::new(-4.0, 0.5, 7.0);
        let back = p.inverse().apply_point(&p.apply_point(&point));
        assert!(close(&back, &point));
    }

    #[test]
    fn test_along_z() {
        let p = Placement::new(Vector3::new(0.0, 0.0, 100.0), rotation_y(FRAC_PI_2));
        assert!(close(&p.along_z(10.0), &Vector3::new(10.0, 0.0, 100.0)));
    }

    #[test]
    fn test_euler_decomposition() {
        let r = rotation_z(0.4) * rotation_y(-0.2) * rotation_x(0.9);
        let (x, y, z) = euler_xyz(&r);
        assert!((x - 0.9).abs() < 1e-9);
        assert!((y + 0.2).abs() < 1e-9);
        assert!((z - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_gdml_rotation_is_inverse() {
        let r = gdml_rotation(0.0, 0.0, FRAC_PI_2);
        // frame rotated +90 about z places the daughter x axis along -y
        assert!(close(&(r * Vector3::x()), &-Vector3::y()));
        assert!(is_rotation(&r));
    }
}
