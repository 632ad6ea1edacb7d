use cgmath::{InnerSpace, SquareMatrix, VectorSpace, Zero};

#[derive(Copy, Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(from = "RawTransform")]
pub struct Transform {
    pub translation: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: cgmath::Vector3::zero(),
            rotation: cgmath::Quaternion::from_sv(1.0, cgmath::Vector3::zero()),
            scale: cgmath::Vector3 {
                x: 1.0,
                y: 1.0,
                z: 1.0,
            },
        }
    }
}

impl Transform {
    pub fn from_translation(translation: cgmath::Vector3<f32>) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from(*self)
    }

    /// Composes `self` as a child of `parent`, giving the child's transform in the parent's space.
    pub fn compose(&self, parent: &Transform) -> Transform {
        Transform::from(parent.to_matrix() * self.to_matrix())
    }

    pub fn inverse(&self) -> Transform {
        match self.to_matrix().invert() {
            Some(inverted) => Transform::from(inverted),
            None => Transform::default(),
        }
    }

    /// Expresses `self` (a world transform) relative to the `parent` world transform.
    pub fn relative_to(&self, parent: &Transform) -> Transform {
        match parent.to_matrix().invert() {
            Some(parent_inverse) => Transform::from(parent_inverse * self.to_matrix()),
            None => *self,
        }
    }

    pub fn transform_point(&self, point: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        let scaled = cgmath::Vector3::new(
            point.x * self.scale.x,
            point.y * self.scale.y,
            point.z * self.scale.z,
        );
        self.rotation * scaled + self.translation
    }

    pub fn interpolate(&self, other: &Transform, alpha: f32) -> Transform {
        Transform {
            translation: self.translation.lerp(other.translation, alpha),
            rotation: slerp_shortest(self.rotation, other.rotation, alpha),
            scale: self.scale.lerp(other.scale, alpha),
        }
    }

    pub fn is_nearly_identity(&self, epsilon: f32) -> bool {
        let identity = Transform::default();
        (self.translation - identity.translation).magnitude() < epsilon
            && (self.scale - identity.scale).magnitude() < epsilon
            && self.rotation.dot(identity.rotation).abs() > 1.0 - epsilon
    }
}

/// Spherical interpolation that normalizes both ends and takes the shortest arc.
pub fn slerp_shortest(
    from: cgmath::Quaternion<f32>,
    to: cgmath::Quaternion<f32>,
    alpha: f32,
) -> cgmath::Quaternion<f32> {
    let from = normalize_quaternion(from);
    let mut to = normalize_quaternion(to);
    if from.dot(to) < 0.0 {
        to = -to;
    }

    // nlerp is both stable and accurate enough when the ends are nearly parallel
    if from.dot(to) > 0.9995 {
        return normalize_quaternion(from * (1.0 - alpha) + to * alpha);
    }

    normalize_quaternion(from.slerp(to, alpha))
}

pub fn normalize_quaternion(quaternion: cgmath::Quaternion<f32>) -> cgmath::Quaternion<f32> {
    let magnitude = quaternion.magnitude();
    if magnitude <= f32::EPSILON {
        return cgmath::Quaternion::from_sv(1.0, cgmath::Vector3::zero());
    }
    quaternion / magnitude
}

impl From<Transform> for cgmath::Matrix4<f32> {
    fn from(value: Transform) -> Self {
        cgmath::Matrix4::from_translation(value.translation)
            * cgmath::Matrix4::from(value.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(value.scale.x, value.scale.y, value.scale.z)
    }
}

impl From<cgmath::Matrix4<f32>> for Transform {
    fn from(value: cgmath::Matrix4<f32>) -> Self {
        let translation = cgmath::Vector3::<f32>::new(value.w.x, value.w.y, value.w.z);

        let mut rotation_matrix = cgmath::Matrix3::<f32>::new(
            value.x.x, value.x.y, value.x.z, value.y.x, value.y.y, value.y.z, value.z.x, value.z.y,
            value.z.z,
        );

        let mut scale_x = rotation_matrix.x.magnitude();
        let scale_y = rotation_matrix.y.magnitude();
        let scale_z = rotation_matrix.z.magnitude();

        // a mirrored basis is folded into the first scale axis
        if rotation_matrix.determinant() < 0.0 {
            scale_x = -scale_x;
        }

        let scale = cgmath::Vector3::<f32>::new(scale_x, scale_y, scale_z);

        if scale_x.abs() > f32::EPSILON {
            rotation_matrix.x *= 1.0 / scale_x;
        }
        if scale_y > f32::EPSILON {
            rotation_matrix.y *= 1.0 / scale_y;
        }
        if scale_z > f32::EPSILON {
            rotation_matrix.z *= 1.0 / scale_z;
        }

        let rotation = normalize_quaternion(cgmath::Quaternion::from(rotation_matrix));

        Self {
            translation,
            rotation,
            scale,
        }
    }
}

/// Builds a matrix from 16 column-major floats, as stored in glTF.
pub fn matrix_from_column_major(values: &[f32]) -> Option<cgmath::Matrix4<f32>> {
    if values.len() < 16 {
        return None;
    }
    let matrix = cgmath::Matrix4::new(
        values[0], values[1], values[2], values[3], values[4], values[5], values[6], values[7],
        values[8], values[9], values[10], values[11], values[12], values[13], values[14],
        values[15],
    );
    Some(matrix)
}

pub fn matrix_is_finite(matrix: &cgmath::Matrix4<f32>) -> bool {
    let columns: &[f32; 16] = matrix.as_ref();
    columns.iter().all(|value| value.is_finite())
}

#[derive(serde::Deserialize)]
#[serde(default)]
struct RawTransform {
    translation: [f32; 3],
    rotation: [f32; 4],
    scale: [f32; 3],
}

impl Default for RawTransform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

impl From<RawTransform> for Transform {
    fn from(value: RawTransform) -> Self {
        let [x, y, z, w] = value.rotation;
        Self {
            translation: value.translation.into(),
            rotation: normalize_quaternion(cgmath::Quaternion::new(w, x, y, z)),
            scale: value.scale.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Rotation3;

    const EPSILON: f32 = 1e-5;

    fn assert_vector_eq(a: cgmath::Vector3<f32>, b: cgmath::Vector3<f32>) {
        assert!((a - b).magnitude() < EPSILON, "{a:?} != {b:?}");
    }

    #[test]
    fn default_is_identity() {
        let matrix = Transform::default().to_matrix();
        assert_eq!(matrix, cgmath::Matrix4::identity());
    }

    #[test]
    fn matrix_round_trip() {
        let transform = Transform {
            translation: cgmath::Vector3::new(1.0, 2.0, 3.0),
            rotation: cgmath::Quaternion::from_angle_y(cgmath::Deg(30.0)),
            scale: cgmath::Vector3::new(2.0, 2.0, 0.5),
        };

        let decomposed = Transform::from(transform.to_matrix());

        assert_vector_eq(decomposed.translation, transform.translation);
        assert_vector_eq(decomposed.scale, transform.scale);
        assert!(decomposed.rotation.dot(transform.rotation).abs() > 1.0 - EPSILON);
    }

    #[test]
    fn compose_then_relative_recovers_local() {
        let parent = Transform {
            translation: cgmath::Vector3::new(0.0, 5.0, 0.0),
            rotation: cgmath::Quaternion::from_angle_z(cgmath::Deg(90.0)),
            ..Default::default()
        };
        let local = Transform::from_translation(cgmath::Vector3::new(1.0, 0.0, 0.0));

        let world = local.compose(&parent);
        assert_vector_eq(world.translation, cgmath::Vector3::new(0.0, 6.0, 0.0));

        let back = world.relative_to(&parent);
        assert_vector_eq(back.translation, local.translation);
    }

    #[test]
    fn slerp_takes_shortest_arc() {
        let from = cgmath::Quaternion::from_angle_y(cgmath::Deg(10.0));
        let to = -cgmath::Quaternion::from_angle_y(cgmath::Deg(30.0));

        let halfway = slerp_shortest(from, to, 0.5);
        let expected = cgmath::Quaternion::from_angle_y(cgmath::Deg(20.0));

        assert!(halfway.dot(expected).abs() > 1.0 - EPSILON);
        assert!((halfway.magnitude() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn deserializes_with_defaults() {
        let transform: Transform =
            serde_json::from_str(r#"{"translation": [1.0, 0.0, 0.0]}"#).unwrap();

        assert_vector_eq(transform.translation, cgmath::Vector3::new(1.0, 0.0, 0.0));
        assert_vector_eq(transform.scale, cgmath::Vector3::new(1.0, 1.0, 1.0));
        assert!(transform.rotation.s > 1.0 - EPSILON);
    }
}
