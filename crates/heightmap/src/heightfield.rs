use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::HeightSource;

/// Static collision heightfield handed to the physics collaborator.
///
/// Samples are copied verbatim (row-major, normalized); `scale` maps one grid
/// step to world units on X/Z and a normalized height of 1.0 to world units
/// on Y. No triangulation happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heightfield {
    pub heights: Vec<f32>,
    pub columns: usize,
    pub rows: usize,
    pub scale: Vec3,
}

impl Heightfield {
    pub fn from_source(source: &impl HeightSource, scale: Vec3) -> Self {
        let columns = source.width();
        let rows = source.height();
        let mut heights = Vec::with_capacity(columns * rows);
        for z in 0..rows {
            for x in 0..columns {
                heights.push(source.sample(x, z));
            }
        }
        Self {
            heights,
            columns,
            rows,
            scale,
        }
    }

    /// World-space size of the field: grid span on X/Z, full height range on Y.
    pub fn extent(&self) -> Vec3 {
        Vec3::new(
            self.columns.saturating_sub(1) as f32 * self.scale.x,
            self.scale.y,
            self.rows.saturating_sub(1) as f32 * self.scale.z,
        )
    }

    /// World-space height at a grid node.
    pub fn height_at(&self, column: usize, row: usize) -> Option<f32> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        Some(self.heights[row * self.columns + column] * self.scale.y)
    }
}
