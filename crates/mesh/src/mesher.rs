use glam::Vec3;
use relief_common::{UP, normalize_or};
use relief_heightmap::HeightSource;

use crate::cancel::CancelToken;
use crate::mesh::{IndexBuffer, Mesh, MeshMeta};
use crate::options::{MeshOptions, Shading};
use crate::vertex::{FlatVertex, SmoothVertex};
use crate::MeshError;

/// Turns a height grid into a triangle mesh.
///
/// The mesher only reads its source and reports progress; the returned mesh
/// belongs to the caller.
#[derive(Debug, Clone, Default)]
pub struct GridMesher {
    options: MeshOptions,
    cancel: Option<CancelToken>,
}

impl GridMesher {
    pub fn new(options: MeshOptions) -> Self {
        Self {
            options,
            cancel: None,
        }
    }

    /// Stop between rows once `token` is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn options(&self) -> &MeshOptions {
        &self.options
    }

    /// Build the mesh. `on_progress` receives non-decreasing fractions and
    /// always ends with exactly `1.0` on success.
    pub fn generate<S>(&self, source: &S, mut on_progress: impl FnMut(f32)) -> Result<Mesh, MeshError>
    where
        S: HeightSource + ?Sized,
    {
        let (width, height) = (source.width(), source.height());
        if width == 0 || height == 0 {
            return Err(MeshError::EmptySource { width, height });
        }

        let mesh = match self.options.shading {
            Shading::Diffuse => self.smooth(source, &mut on_progress)?,
            Shading::Flat => self.flat(source, &mut on_progress)?,
        };

        tracing::debug!(
            shading = %self.options.shading,
            width,
            height,
            vertices = mesh.vertex_count(),
            indices = mesh.indices.len(),
            u32_indices = mesh.indices.is_u32(),
            "terrain mesh generated"
        );
        Ok(mesh)
    }

    fn check_cancelled(&self) -> Result<(), MeshError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(MeshError::Cancelled),
            _ => Ok(()),
        }
    }

    fn meta(&self, width: usize, height: usize) -> MeshMeta {
        MeshMeta {
            terrain_width: (width - 1) as f32 * self.options.scale.x,
            terrain_length: (height - 1) as f32 * self.options.scale.z,
            nudge_x: 0.0,
            nudge_z: 0.0,
        }
    }

    fn grid_point<S: HeightSource + ?Sized>(&self, source: &S, x: usize, z: usize) -> Vec3 {
        Vec3::new(x as f32, source.sample(x, z), z as f32) * self.options.scale
    }

    fn smooth<S: HeightSource + ?Sized>(
        &self,
        source: &S,
        on_progress: &mut dyn FnMut(f32),
    ) -> Result<Mesh, MeshError> {
        let (width, height) = (source.width(), source.height());
        let _span = tracing::info_span!("smooth_mesh", width, height).entered();

        let vertex_count = width * height;
        let index_count = (width - 1) * (height - 1) * 6;
        let mut vertices = vec![0.0f32; vertex_count * SmoothVertex::FLOATS];
        let mut indices = IndexBuffer::with_capacity(vertex_count, index_count);

        let verts: &mut [SmoothVertex] = bytemuck::cast_slice_mut(&mut vertices);
        let pos = |verts: &[SmoothVertex], i: usize| Vec3::from_array(verts[i].position);

        // Positions and uvs; the tangent frame is filled in below.
        for z in 0..height {
            self.check_cancelled()?;
            for x in 0..width {
                let v = &mut verts[x + z * width];
                v.position = self.grid_point(source, x, z).to_array();
                v.uv = self.options.uv(x, z).to_array();
            }
            on_progress(row_fraction(z, height) * 0.5);
        }

        // Two triangles per cell. Only the cell's top-left vertex gets a
        // tangent, so the last row and column keep a zero tangent.
        for z in 0..height - 1 {
            self.check_cancelled()?;
            for x in 0..width - 1 {
                let i0 = x + z * width;
                let i1 = i0 + 1;
                let i2 = i0 + width;
                let i3 = i2 + 1;

                let tangent = normalize_or(pos(verts, i0) - pos(verts, i2), Vec3::ZERO);
                verts[i0].tangent = tangent.to_array();

                indices.push_triangle(i0 as u32, i2 as u32, i1 as u32);
                indices.push_triangle(i1 as u32, i2 as u32, i3 as u32);
            }
        }

        // Finite-difference normals, neighbours clamped at the border.
        for z in 0..height {
            self.check_cancelled()?;
            for x in 0..width {
                let id = x + z * width;
                let left = if x > 0 { id - 1 } else { id };
                let right = if x + 1 < width { id + 1 } else { id };
                let up = if z > 0 { id - width } else { id };
                let down = if z + 1 < height { id + width } else { id };

                let across = pos(verts, right) - pos(verts, left);
                let along = pos(verts, down) - pos(verts, up);
                let normal = normalize_or(along.cross(across), UP);
                let tangent = Vec3::from_array(verts[id].tangent);

                verts[id].normal = normal.to_array();
                verts[id].bitangent = normal.cross(tangent).to_array();
            }
            on_progress(0.5 + row_fraction(z, height) * 0.5);
        }

        on_progress(1.0);

        Ok(Mesh {
            vertices,
            indices,
            vertex_stride: SmoothVertex::STRIDE,
            meta: self.meta(width, height),
        })
    }

    fn flat<S: HeightSource + ?Sized>(
        &self,
        source: &S,
        on_progress: &mut dyn FnMut(f32),
    ) -> Result<Mesh, MeshError> {
        let (width, height) = (source.width(), source.height());
        let _span = tracing::info_span!("flat_mesh", width, height).entered();

        let (cells_x, cells_z) = (width - 1, height - 1);
        let vertex_count = cells_x * cells_z * 6;
        let mut vertices = vec![0.0f32; vertex_count * FlatVertex::FLOATS];
        let mut indices = IndexBuffer::with_capacity(vertex_count, vertex_count);

        let verts: &mut [FlatVertex] = bytemuck::cast_slice_mut(&mut vertices);
        let mut next = 0usize;

        for z in 0..cells_z {
            self.check_cancelled()?;
            for x in 0..cells_x {
                let corners = [(x, z), (x + 1, z), (x, z + 1), (x + 1, z + 1)];
                let p = corners.map(|(cx, cz)| self.grid_point(source, cx, cz));
                let uv = corners.map(|(cx, cz)| self.options.uv(cx, cz));

                for tri in [[0, 2, 3], [1, 0, 3]] {
                    let [a, b, c] = tri.map(|k| p[k]);
                    let normal = normalize_or((b - a).cross(c - a), UP);
                    for k in tri {
                        verts[next] = FlatVertex {
                            position: p[k].to_array(),
                            normal: normal.to_array(),
                            uv: uv[k].to_array(),
                        };
                        indices.push(next as u32);
                        next += 1;
                    }
                }
            }
            on_progress(row_fraction(z, cells_z));
        }

        on_progress(1.0);

        Ok(Mesh {
            vertices,
            indices,
            vertex_stride: FlatVertex::STRIDE,
            meta: self.meta(width, height),
        })
    }
}

/// Fraction of rows finished after row `z`.
fn row_fraction(z: usize, rows: usize) -> f32 {
    (z + 1) as f32 / rows as f32
}

/// One-shot convenience wrapper around [`GridMesher::generate`].
pub fn generate<S>(
    source: &S,
    options: &MeshOptions,
    on_progress: impl FnMut(f32),
) -> Result<Mesh, MeshError>
where
    S: HeightSource + ?Sized,
{
    GridMesher::new(*options).generate(source, on_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_heightmap::Heightmap;

    const EPS: f32 = 1e-5;

    fn flat_map(width: usize, height: usize, value: f32) -> Heightmap {
        Heightmap::from_raw(vec![value; width * height], width, height).unwrap()
    }

    fn bumpy_map(width: usize, height: usize) -> Heightmap {
        Heightmap::from_fn(width, height, |x, z| {
            ((x as f32 * 0.7).sin() * (z as f32 * 0.3).cos() + 1.0) * 0.5
        })
        .unwrap()
    }

    fn smooth_vertices(mesh: &Mesh) -> &[SmoothVertex] {
        assert_eq!(mesh.vertex_stride, SmoothVertex::STRIDE);
        bytemuck::cast_slice(&mesh.vertices)
    }

    fn triangle_area_sum(mesh: &Mesh) -> f32 {
        let idx: Vec<u32> = mesh.indices.iter().collect();
        idx.chunks_exact(3)
            .map(|t| {
                let a = mesh.position(t[0] as usize);
                let b = mesh.position(t[1] as usize);
                let c = mesh.position(t[2] as usize);
                (b - a).cross(c - a).length() * 0.5
            })
            .sum()
    }

    #[test]
    fn two_by_two_smooth_example() {
        let hm = flat_map(2, 2, 0.0);
        let mesh = generate(&hm, &MeshOptions::default(), |_| {}).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        let positions: Vec<Vec3> = mesh.positions().collect();
        assert_eq!(
            positions,
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
            ]
        );
        assert_eq!(mesh.indices.iter().collect::<Vec<_>>(), vec![0, 2, 1, 1, 2, 3]);
        for i in 0..4 {
            assert!(mesh.normal(i).abs_diff_eq(Vec3::Y, EPS));
        }
    }

    #[test]
    fn smooth_counts() {
        let hm = bumpy_map(7, 5);
        let mesh = generate(&hm, &MeshOptions::default(), |_| {}).unwrap();
        assert_eq!(mesh.vertex_count(), 7 * 5);
        assert_eq!(mesh.indices.len(), 6 * 4 * 6);
        assert_eq!(mesh.vertex_stride, 56);
        mesh.validate().unwrap();
    }

    #[test]
    fn flat_counts_and_no_sharing() {
        let hm = bumpy_map(6, 4);
        let opts = MeshOptions::default().with_shading(Shading::Flat);
        let mesh = generate(&hm, &opts, |_| {}).unwrap();

        let expected = 5 * 3 * 6;
        assert_eq!(mesh.vertex_count(), expected);
        assert_eq!(mesh.indices.len(), expected);
        assert_eq!(mesh.vertex_stride, 32);
        mesh.validate().unwrap();

        // Every vertex is referenced exactly once.
        let mut seen = vec![false; expected];
        for i in mesh.indices.iter() {
            assert!(!seen[i as usize], "vertex {i} shared between triangles");
            seen[i as usize] = true;
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn flat_normals_are_constant_per_triangle() {
        let hm = bumpy_map(5, 5);
        let opts = MeshOptions::default()
            .with_shading(Shading::Flat)
            .with_scale(Vec3::new(1.0, 3.0, 1.0));
        let mesh = generate(&hm, &opts, |_| {}).unwrap();
        let idx: Vec<u32> = mesh.indices.iter().collect();
        for tri in idx.chunks_exact(3) {
            let n0 = mesh.normal(tri[0] as usize);
            assert!((n0.length() - 1.0).abs() < EPS);
            assert!(n0.y > 0.0, "flat normal should face up: {n0}");
            assert_eq!(n0, mesh.normal(tri[1] as usize));
            assert_eq!(n0, mesh.normal(tri[2] as usize));

            let a = mesh.position(tri[0] as usize);
            let b = mesh.position(tri[1] as usize);
            let c = mesh.position(tri[2] as usize);
            let face = (b - a).cross(c - a).normalize();
            assert!(face.abs_diff_eq(n0, 1e-4));
        }
    }

    #[test]
    fn uniform_heights_point_up_and_cover_the_grid() {
        let hm = flat_map(9, 6, 0.4);
        let scale = Vec3::new(2.0, 10.0, 3.0);
        let mesh = generate(&hm, &MeshOptions::default().with_scale(scale), |_| {}).unwrap();

        for i in 0..mesh.vertex_count() {
            assert!(mesh.normal(i).abs_diff_eq(Vec3::Y, EPS), "vertex {i}");
        }
        let expected_area = (8 * 5) as f32 * scale.x * scale.z;
        assert!((triangle_area_sum(&mesh) - expected_area).abs() < 1e-2);
    }

    #[test]
    fn constant_height_times_vertical_scale() {
        let hm = flat_map(4, 4, 0.25);
        let scale = Vec3::new(1.0, 8.0, 1.0);
        for shading in [Shading::Diffuse, Shading::Flat] {
            let opts = MeshOptions::default().with_shading(shading).with_scale(scale);
            let mesh = generate(&hm, &opts, |_| {}).unwrap();
            assert!(mesh.positions().all(|p| (p.y - 2.0).abs() < EPS), "{shading}");
        }
    }

    #[test]
    fn winding_faces_up() {
        let hm = bumpy_map(6, 6);
        let mesh = generate(&hm, &MeshOptions::default(), |_| {}).unwrap();
        let idx: Vec<u32> = mesh.indices.iter().collect();
        for tri in idx.chunks_exact(3) {
            let a = mesh.position(tri[0] as usize);
            let b = mesh.position(tri[1] as usize);
            let c = mesh.position(tri[2] as usize);
            assert!((b - a).cross(c - a).y > 0.0);
        }
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_one() {
        let hm = bumpy_map(10, 7);
        for shading in [Shading::Diffuse, Shading::Flat] {
            let mut reports = Vec::new();
            let opts = MeshOptions::default().with_shading(shading);
            generate(&hm, &opts, |p| reports.push(p)).unwrap();

            assert!(!reports.is_empty());
            assert!(reports.windows(2).all(|w| w[0] <= w[1]), "{reports:?}");
            assert_eq!(*reports.last().unwrap(), 1.0);
            assert!(reports.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn smooth_progress_splits_into_two_phases() {
        let hm = bumpy_map(3, 4);
        let mut reports = Vec::new();
        generate(&hm, &MeshOptions::default(), |p| reports.push(p)).unwrap();
        // 4 rows of positions, 4 rows of normals, final 1.0
        assert_eq!(reports.len(), 9);
        assert_eq!(reports[3], 0.5);
        assert!(reports[..4].iter().all(|&p| p <= 0.5));
        assert!(reports[4..].iter().all(|&p| p > 0.5));
    }

    #[test]
    fn index_width_switches_above_u16_range() {
        // 256 * 256 = 65536 vertices: still 16-bit
        let at_limit = flat_map(256, 256, 0.0);
        let mesh = generate(&at_limit, &MeshOptions::default(), |_| {}).unwrap();
        assert!(!mesh.indices.is_u32());
        mesh.validate().unwrap();

        let over = flat_map(257, 256, 0.0);
        let mesh = generate(&over, &MeshOptions::default(), |_| {}).unwrap();
        assert!(mesh.indices.is_u32());
        mesh.validate().unwrap();
    }

    #[test]
    fn tangents_cover_only_top_left_corners() {
        let hm = bumpy_map(4, 3);
        let mesh = generate(&hm, &MeshOptions::default(), |_| {}).unwrap();
        let verts = smooth_vertices(&mesh);
        for z in 0..3 {
            for x in 0..4 {
                let v = &verts[x + z * 4];
                let t = Vec3::from_array(v.tangent);
                if x < 3 && z < 2 {
                    assert!((t.length() - 1.0).abs() < EPS, "({x},{z})");
                    // points from the next row back to this one
                    assert!(t.z < 0.0);
                    let b = Vec3::from_array(v.bitangent);
                    let n = Vec3::from_array(v.normal);
                    assert!(b.abs_diff_eq(n.cross(t), EPS));
                } else {
                    assert_eq!(t, Vec3::ZERO, "({x},{z})");
                    assert_eq!(v.bitangent, [0.0; 3]);
                }
            }
        }
    }

    #[test]
    fn slope_tilts_normals_downhill() {
        // height rises along +X
        let hm = Heightmap::from_fn(5, 5, |x, _| x as f32 * 0.25).unwrap();
        let mesh = generate(&hm, &MeshOptions::default(), |_| {}).unwrap();
        let n = mesh.normal(2 + 2 * 5);
        assert!(n.x < 0.0 && n.y > 0.0);
        assert!(n.z.abs() < EPS);
        let expected = Vec3::new(-0.25, 1.0, 0.0).normalize();
        assert!(n.abs_diff_eq(expected, 1e-4), "{n}");
    }

    #[test]
    fn degenerate_scale_falls_back_to_up() {
        let hm = bumpy_map(3, 3);
        let opts = MeshOptions::default().with_scale(Vec3::ZERO);
        for shading in [Shading::Diffuse, Shading::Flat] {
            let mesh = generate(&hm, &opts.with_shading(shading), |_| {}).unwrap();
            for i in 0..mesh.vertex_count() {
                let n = mesh.normal(i);
                assert!(n.is_finite());
                assert_eq!(n, Vec3::Y);
            }
        }
    }

    #[test]
    fn single_row_source_has_no_triangles() {
        let hm = flat_map(5, 1, 0.5);
        let mesh = generate(&hm, &MeshOptions::default(), |_| {}).unwrap();
        assert_eq!(mesh.vertex_count(), 5);
        assert!(mesh.indices.is_empty());

        let flat = generate(&hm, &MeshOptions::default().with_shading(Shading::Flat), |_| {})
            .unwrap();
        assert_eq!(flat.vertex_count(), 0);
    }

    #[test]
    fn meta_reports_scaled_extent() {
        let hm = flat_map(11, 21, 0.0);
        let opts = MeshOptions::default().with_scale(Vec3::new(2.0, 1.0, 0.5));
        let mesh = generate(&hm, &opts, |_| {}).unwrap();
        assert_eq!(mesh.meta.terrain_width, 20.0);
        assert_eq!(mesh.meta.terrain_length, 10.0);
        assert_eq!(mesh.meta.nudge_x, 0.0);
    }

    struct EmptySource;

    impl HeightSource for EmptySource {
        fn width(&self) -> usize {
            0
        }
        fn height(&self) -> usize {
            3
        }
        fn sample(&self, _x: usize, _z: usize) -> f32 {
            unreachable!("empty source must never be sampled")
        }
    }

    #[test]
    fn empty_source_fails_fast() {
        let err = generate(&EmptySource, &MeshOptions::default(), |_| {}).unwrap_err();
        assert!(matches!(err, MeshError::EmptySource { width: 0, height: 3 }));
    }

    #[test]
    fn cancelled_token_stops_generation() {
        let hm = bumpy_map(16, 16);
        let token = CancelToken::new();
        token.cancel();
        let mut calls = 0;
        let err = GridMesher::new(MeshOptions::default())
            .with_cancel(token)
            .generate(&hm, |_| calls += 1)
            .unwrap_err();
        assert!(matches!(err, MeshError::Cancelled));
        assert_eq!(calls, 0);
    }

    #[test]
    fn cancel_mid_generation() {
        let hm = bumpy_map(8, 8);
        let token = CancelToken::new();
        let trigger = token.clone();
        let mut last = 0.0;
        let result = GridMesher::new(MeshOptions::default())
            .with_cancel(token)
            .generate(&hm, |p| {
                last = p;
                if p >= 0.25 {
                    trigger.cancel();
                }
            });
        assert!(matches!(result, Err(MeshError::Cancelled)));
        assert!(last < 1.0);
    }

    #[test]
    fn works_through_dyn_source() {
        let hm = bumpy_map(4, 4);
        let dyn_source: &dyn HeightSource = &hm;
        let mesh = generate(dyn_source, &MeshOptions::default(), |_| {}).unwrap();
        assert_eq!(mesh.vertex_count(), 16);
    }
}
