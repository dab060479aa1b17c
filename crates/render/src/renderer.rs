use glam::Vec3;
use relief_terrain::Terrain;

use crate::layout::IndexFormat;

/// Camera/view configuration for rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Field of view in degrees.
    pub fov_degrees: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 60.0, 120.0),
            target: Vec3::ZERO,
            fov_degrees: 60.0,
        }
    }
}

/// Renderer-agnostic interface.
///
/// A renderer reads the terrain and a view, then produces output.
pub trait Renderer {
    type Output;

    fn render(&self, terrain: &Terrain, view: &RenderView) -> Self::Output;
}

/// Human-readable terrain summary, in place of a GPU frame.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, terrain: &Terrain, view: &RenderView) -> String {
        let mut out = String::new();
        let p = terrain.placement();
        out.push_str(&format!(
            "=== Terrain ({}) ===\n",
            if terrain.is_ready() { "ready" } else { "uninitialized" }
        ));
        out.push_str(&format!(
            "Placement: pos=({:.2}, {:.2}, {:.2}) scale=({:.2}, {:.2}, {:.2}) yaw={:.3}\n",
            p.position.x, p.position.y, p.position.z, p.scale.x, p.scale.y, p.scale.z, p.rotation_y
        ));
        out.push_str(&format!(
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}\n",
            view.eye.x, view.eye.y, view.eye.z, view.target.x, view.target.y, view.target.z, view.fov_degrees
        ));

        if let Some(meta) = terrain.meta() {
            let c = terrain.center();
            out.push_str(&format!(
                "Extent: {:.2} x {:.2}  center=({:.2}, {:.2})\n",
                meta.terrain_width, meta.terrain_length, c.x, c.z
            ));
        }
        if let Some(field) = terrain.heightfield() {
            let extent = field.extent();
            out.push_str(&format!(
                "Heightfield: {}x{} samples, extent=({:.2}, {:.2}, {:.2})\n",
                field.columns, field.rows, extent.x, extent.y, extent.z
            ));
        }
        match terrain.mesh() {
            Some(mesh) => {
                out.push_str(&format!(
                    "Mesh: {} vertices, {} triangles, stride={} indices={:?}\n",
                    mesh.vertex_count(),
                    mesh.triangle_count(),
                    mesh.vertex_stride,
                    IndexFormat::of(&mesh.indices)
                ));
            }
            None if terrain.is_ready() => out.push_str("Mesh: uploaded\n"),
            None => {}
        }
        if let Some(h) = terrain.sample_height(p.position.x, p.position.z) {
            out.push_str(&format!("Height at origin: {h:.3}\n"));
        }

        out
    }
}
