use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Spatial placement: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Placement rotated about +Y by `yaw` radians.
    pub fn from_yaw(position: Vec3, yaw: f32, scale: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::from_rotation_y(yaw),
            scale,
        }
    }

    /// Model matrix `T · S · R`.
    ///
    /// A point is rotated first, then scaled, then translated. This is the
    /// order the terrain placement has always used; it only differs from
    /// `T · R · S` when the scale is not uniform in XZ.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_scale(self.scale)
            * Mat4::from_quat(self.rotation)
    }
}
