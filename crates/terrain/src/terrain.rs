use glam::{Mat4, Vec3};
use relief_common::bilinear;
use relief_heightmap::{HeightSource, Heightfield};
use relief_mesh::{Mesh, MeshMeta};

use crate::{TerrainError, TerrainPlacement};

/// Slack for world points that land on the grid border after the inverse
/// transform.
const EDGE_EPSILON: f32 = 1e-4;

#[derive(Debug)]
enum State {
    Uninitialized,
    MeshReady {
        mesh: Option<Mesh>,
        meta: MeshMeta,
        field: Heightfield,
    },
}

/// A placed terrain patch built from a generated heightmap mesh.
///
/// Starts uninitialized; `init_from_heightmap_mesh` moves it to the ready
/// state exactly once. Height queries keep working after the mesh has been
/// taken for upload.
#[derive(Debug)]
pub struct Terrain {
    placement: TerrainPlacement,
    state: State,
}

impl Default for Terrain {
    fn default() -> Self {
        Self::new(TerrainPlacement::default())
    }
}

impl Terrain {
    pub fn new(placement: TerrainPlacement) -> Self {
        Self {
            placement,
            state: State::Uninitialized,
        }
    }

    pub fn placement(&self) -> &TerrainPlacement {
        &self.placement
    }

    pub fn set_placement(&mut self, placement: TerrainPlacement) {
        self.placement = placement;
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::MeshReady { .. })
    }

    /// Adopt a generated mesh. `source` and `scale` must be the ones the mesh
    /// was generated from; they back the height queries and physics export.
    pub fn init_from_heightmap_mesh(
        &mut self,
        mesh: Mesh,
        source: &impl HeightSource,
        scale: Vec3,
    ) -> Result<(), TerrainError> {
        if self.is_ready() {
            return Err(TerrainError::AlreadyInitialized);
        }
        if source.width() == 0 || source.height() == 0 {
            return Err(TerrainError::EmptySource);
        }
        mesh.validate()?;

        let field = Heightfield::from_source(source, scale);
        let extent = field.extent();
        let meta = mesh.meta;
        if !close(meta.terrain_width, extent.x) || !close(meta.terrain_length, extent.z) {
            return Err(TerrainError::ExtentMismatch {
                mesh: (meta.terrain_width, meta.terrain_length),
                grid: (extent.x, extent.z),
            });
        }

        tracing::info!(
            columns = field.columns,
            rows = field.rows,
            vertices = mesh.vertex_count(),
            width = meta.terrain_width,
            length = meta.terrain_length,
            "terrain initialized"
        );
        self.state = State::MeshReady {
            mesh: Some(mesh),
            meta,
            field,
        };
        Ok(())
    }

    /// Local offset that centres the grid on the origin.
    pub fn center(&self) -> Vec3 {
        match &self.state {
            State::Uninitialized => Vec3::ZERO,
            State::MeshReady { meta, .. } => Vec3::new(
                -meta.terrain_width / 2.0 + meta.nudge_x,
                0.0,
                -meta.terrain_length / 2.0 + meta.nudge_z,
            ),
        }
    }

    /// `T(position) · S(scale) · R_y · T(center)`.
    pub fn model_matrix(&self) -> Mat4 {
        self.placement.transform().to_matrix() * Mat4::from_translation(self.center())
    }

    /// World-space terrain height below (or above) `(world_x, world_z)`.
    ///
    /// `None` when uninitialized or when the point falls outside the grid.
    pub fn sample_height(&self, world_x: f32, world_z: f32) -> Option<f32> {
        let State::MeshReady { field, .. } = &self.state else {
            return None;
        };
        let model = self.model_matrix();
        if model.determinant().abs() <= f32::EPSILON {
            return None;
        }
        let local = model
            .inverse()
            .transform_point3(Vec3::new(world_x, 0.0, world_z));

        let scale = field.scale;
        if scale.x <= 0.0 || scale.z <= 0.0 {
            return None;
        }
        let gx = grid_coord(local.x / scale.x, field.columns)?;
        let gz = grid_coord(local.z / scale.z, field.rows)?;

        let x0 = (gx.floor() as usize).min(field.columns - 1);
        let z0 = (gz.floor() as usize).min(field.rows - 1);
        let x1 = (x0 + 1).min(field.columns - 1);
        let z1 = (z0 + 1).min(field.rows - 1);
        let h = |x, z| field.heights[z * field.columns + x];
        let local_y =
            bilinear(h(x0, z0), h(x1, z0), h(x0, z1), h(x1, z1), gx - x0 as f32, gz - z0 as f32)
                * scale.y;

        Some(
            model
                .transform_point3(Vec3::new(local.x, local_y, local.z))
                .y,
        )
    }

    /// Physics export of the source grid.
    pub fn heightfield(&self) -> Option<&Heightfield> {
        match &self.state {
            State::MeshReady { field, .. } => Some(field),
            State::Uninitialized => None,
        }
    }

    pub fn meta(&self) -> Option<&MeshMeta> {
        match &self.state {
            State::MeshReady { meta, .. } => Some(meta),
            State::Uninitialized => None,
        }
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.state {
            State::MeshReady { mesh, .. } => mesh.as_ref(),
            State::Uninitialized => None,
        }
    }

    /// Hand the mesh over (typically to an uploader). Returns `None` once taken.
    pub fn take_mesh(&mut self) -> Option<Mesh> {
        match &mut self.state {
            State::MeshReady { mesh, .. } => mesh.take(),
            State::Uninitialized => None,
        }
    }
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-3 * a.abs().max(b.abs()).max(1.0)
}

/// Clamp a grid coordinate that is within `EDGE_EPSILON` of the border.
fn grid_coord(g: f32, samples: usize) -> Option<f32> {
    let max = samples.saturating_sub(1) as f32;
    if !g.is_finite() || g < -EDGE_EPSILON || g > max + EDGE_EPSILON {
        return None;
    }
    Some(g.clamp(0.0, max))
}
