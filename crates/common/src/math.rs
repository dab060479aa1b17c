use glam::Vec3;

/// World up axis. Terrain heights grow along +Y.
pub const UP: Vec3 = Vec3::Y;

/// Normalize `v`, or return `fallback` when `v` has zero (or non-finite) length.
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(fallback)
}

/// Bilinear blend of four corner samples.
///
/// `h00` is at (0,0), `h10` at (1,0), `h01` at (0,1), `h11` at (1,1);
/// `tx`/`tz` are the fractional offsets inside the cell.
pub fn bilinear(h00: f32, h10: f32, h01: f32, h11: f32, tx: f32, tz: f32) -> f32 {
    let h0 = h00 + (h10 - h00) * tx;
    let h1 = h01 + (h11 - h01) * tx;
    h0 + (h1 - h0) * tz
}
