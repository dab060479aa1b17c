use std::fmt;
use std::str::FromStr;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Terrain shading mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shading {
    /// Shared vertices with interpolated normals and a tangent frame.
    #[default]
    Diffuse,
    /// Three unique vertices per triangle, one normal per face.
    Flat,
}

impl fmt::Display for Shading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shading::Diffuse => f.write_str("diffuse"),
            Shading::Flat => f.write_str("flat"),
        }
    }
}

impl FromStr for Shading {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "diffuse" | "smooth" => Ok(Shading::Diffuse),
            "flat" => Ok(Shading::Flat),
            other => Err(format!("unknown shading '{other}' (expected 'diffuse' or 'flat')")),
        }
    }
}

/// Mesh generation options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    pub shading: Shading,
    /// Per-axis scale. X/Z scale one grid step, Y scales a normalized height of 1.0.
    pub scale: Vec3,
    /// UV multiplier applied to grid coordinates.
    pub texture_scale: Vec2,
    /// UV offset added after `texture_scale`.
    pub texture_offset: Vec2,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            shading: Shading::Diffuse,
            scale: Vec3::ONE,
            texture_scale: Vec2::ONE,
            texture_offset: Vec2::ZERO,
        }
    }
}

impl MeshOptions {
    pub fn with_shading(mut self, shading: Shading) -> Self {
        self.shading = shading;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub(crate) fn uv(&self, x: usize, z: usize) -> Vec2 {
        Vec2::new(x as f32, z as f32) * self.texture_scale + self.texture_offset
    }
}
