use glam::Vec3;
use relief_common::Transform;
use serde::{Deserialize, Serialize};

/// Where the terrain sits in the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainPlacement {
    pub position: Vec3,
    pub scale: Vec3,
    /// Rotation about +Y, in radians.
    pub rotation_y: f32,
}

impl Default for TerrainPlacement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation_y: 0.0,
        }
    }
}

impl TerrainPlacement {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn transform(&self) -> Transform {
        Transform::from_yaw(self.position, self.rotation_y, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_placement_deserializes() {
        let p: TerrainPlacement =
            serde_json::from_str(r#"{ "position": [0.0, -25.0, 0.0] }"#).unwrap();
        assert_eq!(p.position, Vec3::new(0.0, -25.0, 0.0));
        assert_eq!(p.scale, Vec3::ONE);
        assert_eq!(p.rotation_y, 0.0);
    }

    #[test]
    fn transform_carries_yaw() {
        let t = TerrainPlacement {
            rotation_y: 1.0,
            ..Default::default()
        }
        .transform();
        let expected = glam::Quat::from_rotation_y(1.0);
        assert!(t.rotation.abs_diff_eq(expected, 1e-6));
    }
}
