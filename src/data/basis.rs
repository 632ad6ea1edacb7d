use anyhow::Result;
use cgmath::{InnerSpace, SquareMatrix};

use crate::data::transform::{normalize_quaternion, Transform};
use crate::error::{Error, ErrorKind};

/// Change of coordinates from glTF space (right-handed, Y-up, meters) into the host space.
///
/// Points are rotated and scaled, directions are only rotated, and rigid transforms are
/// conjugated (`B · M · B^-1`) with their translation scaled first.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Basis {
    matrix: cgmath::Matrix3<f32>,
    inverse: cgmath::Matrix3<f32>,
    scale: f32,
}

impl Basis {
    pub fn new(matrix: cgmath::Matrix3<f32>, scale: f32) -> Result<Self> {
        let inverse = match matrix.invert() {
            Some(inverse) => inverse,
            None => {
                return Err(Error::new(
                    ErrorKind::MalformedJson,
                    format!("The given basis matrix is not invertible: {matrix:?}"),
                )
                .into())
            }
        };

        if !scale.is_finite() || scale == 0.0 {
            return Err(Error::new(
                ErrorKind::MalformedJson,
                format!("The given scene scale is not usable: {scale}"),
            )
            .into());
        }

        Ok(Self {
            matrix,
            inverse,
            scale,
        })
    }

    /// Left-handed Z-up basis: glTF `(x, y, z)` becomes `(-z, x, y)`.
    pub fn z_up(scale: f32) -> Self {
        let matrix = cgmath::Matrix3::from_cols(
            cgmath::Vector3::new(0.0, 1.0, 0.0),
            cgmath::Vector3::new(0.0, 0.0, 1.0),
            cgmath::Vector3::new(-1.0, 0.0, 0.0),
        );
        Self::from_orthonormal(matrix, scale)
    }

    /// Swaps Y and Z: glTF `(x, y, z)` becomes `(x, z, y)`.
    pub fn y_forward(scale: f32) -> Self {
        let matrix = cgmath::Matrix3::from_cols(
            cgmath::Vector3::new(1.0, 0.0, 0.0),
            cgmath::Vector3::new(0.0, 0.0, 1.0),
            cgmath::Vector3::new(0.0, 1.0, 0.0),
        );
        Self::from_orthonormal(matrix, scale)
    }

    pub fn identity(scale: f32) -> Self {
        Self::from_orthonormal(cgmath::Matrix3::identity(), scale)
    }

    fn from_orthonormal(matrix: cgmath::Matrix3<f32>, scale: f32) -> Self {
        use cgmath::Matrix;

        Self {
            matrix,
            inverse: matrix.transpose(),
            scale,
        }
    }

    pub fn matrix(&self) -> cgmath::Matrix3<f32> {
        self.matrix
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// True when the basis flips handedness, so triangle winding appears reversed.
    pub fn is_mirrored(&self) -> bool {
        self.matrix.determinant() < 0.0
    }

    pub fn point(&self, point: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        self.matrix * point * self.scale
    }

    pub fn inverse_point(&self, point: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        self.inverse * (point / self.scale)
    }

    pub fn direction(&self, direction: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        self.matrix * direction
    }

    /// Rebases a unit direction and keeps it unit length.
    pub fn normal(&self, normal: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        let rebased = self.matrix * normal;
        let magnitude = rebased.magnitude();
        if magnitude <= f32::EPSILON {
            return rebased;
        }
        rebased / magnitude
    }

    /// The xyz part is a direction; `w` carries the bitangent sign and is left alone.
    pub fn tangent(&self, tangent: cgmath::Vector4<f32>) -> cgmath::Vector4<f32> {
        self.normal(tangent.truncate()).extend(tangent.w)
    }

    pub fn rotation(&self, rotation: cgmath::Quaternion<f32>) -> cgmath::Quaternion<f32> {
        let rotation_matrix = cgmath::Matrix3::from(normalize_quaternion(rotation));
        let rebased = self.matrix * rotation_matrix * self.inverse;
        normalize_quaternion(cgmath::Quaternion::from(rebased))
    }

    /// Extracts the axis-aligned scale of `B · scale(v) · B^-1`.
    pub fn scale_vector(&self, scale: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        let scale_matrix = cgmath::Matrix3::from_diagonal(scale);
        let rebased = self.matrix * scale_matrix * self.inverse;
        cgmath::Vector3::new(rebased.x.x, rebased.y.y, rebased.z.z)
    }

    pub fn transform(&self, transform: &Transform) -> Transform {
        Transform {
            translation: self.point(transform.translation),
            rotation: self.rotation(transform.rotation),
            scale: self.scale_vector(transform.scale),
        }
    }

    pub fn matrix4(&self, matrix: &cgmath::Matrix4<f32>) -> cgmath::Matrix4<f32> {
        let mut scaled = *matrix;
        scaled.w.x *= self.scale;
        scaled.w.y *= self.scale;
        scaled.w.z *= self.scale;

        cgmath::Matrix4::from(self.matrix) * scaled * cgmath::Matrix4::from(self.inverse)
    }
}

impl Default for Basis {
    fn default() -> Self {
        Self::z_up(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Rotation3;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn default_maps_y_up_to_z_up() {
        let basis = Basis::z_up(1.0);

        let up = basis.direction(cgmath::Vector3::new(0.0, 1.0, 0.0));
        assert!((up - cgmath::Vector3::new(0.0, 0.0, 1.0)).magnitude() < EPSILON);

        let forward = basis.direction(cgmath::Vector3::new(0.0, 0.0, 1.0));
        assert!((forward - cgmath::Vector3::new(-1.0, 0.0, 0.0)).magnitude() < EPSILON);

        assert!(basis.is_mirrored());
    }

    #[test]
    fn points_are_scaled_and_recovered() {
        let basis = Basis::default();
        let point = cgmath::Vector3::new(0.25, -3.0, 7.5);

        let converted = basis.point(point);
        assert!((converted.magnitude() - point.magnitude() * 100.0).abs() < 1e-3);

        let recovered = basis.inverse_point(converted);
        assert!((recovered - point).magnitude() <= EPSILON * point.magnitude());
    }

    #[test]
    fn tangent_keeps_handedness() {
        let basis = Basis::z_up(1.0);
        let tangent = basis.tangent(cgmath::Vector4::new(1.0, 0.0, 0.0, -1.0));

        assert_eq!(tangent.w, -1.0);
        assert!((tangent.truncate() - cgmath::Vector3::new(0.0, 1.0, 0.0)).magnitude() < EPSILON);
    }

    #[test]
    fn rotation_matches_matrix_conjugation() {
        let basis = Basis::z_up(1.0);
        let rotation = cgmath::Quaternion::from_angle_y(cgmath::Deg(90.0));
        let point = cgmath::Vector3::new(1.0, 0.0, 0.0);

        let expected = basis.direction(rotation * point);
        let actual = basis.rotation(rotation) * basis.direction(point);

        assert!((expected - actual).magnitude() < EPSILON);
    }

    #[test]
    fn scale_is_permuted() {
        let basis = Basis::z_up(1.0);
        let scale = basis.scale_vector(cgmath::Vector3::new(1.0, 2.0, 3.0));

        assert!((scale - cgmath::Vector3::new(3.0, 1.0, 2.0)).magnitude() < EPSILON);
    }

    #[test]
    fn matrix4_agrees_with_transform() {
        let basis = Basis::default();
        let transform = Transform {
            translation: cgmath::Vector3::new(1.0, 2.0, 3.0),
            rotation: cgmath::Quaternion::from_angle_x(cgmath::Deg(45.0)),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        };

        let from_matrix = Transform::from(basis.matrix4(&transform.to_matrix()));
        let from_transform = basis.transform(&transform);

        assert!((from_matrix.translation - from_transform.translation).magnitude() < 1e-3);
        assert!(from_matrix.rotation.dot(from_transform.rotation).abs() > 1.0 - EPSILON);
    }

    #[test]
    fn rejects_singular_matrix() {
        let singular = cgmath::Matrix3::from_cols(
            cgmath::Vector3::new(1.0, 0.0, 0.0),
            cgmath::Vector3::new(1.0, 0.0, 0.0),
            cgmath::Vector3::new(0.0, 0.0, 1.0),
        );

        assert!(Basis::new(singular, 1.0).is_err());
    }
}
