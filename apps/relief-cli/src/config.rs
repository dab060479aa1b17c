use std::path::Path;

use anyhow::Context;
use glam::Vec3;
use relief_dispatch::DispatcherConfig;
use relief_mesh::MeshOptions;
use relief_runtime::LoopConfig;
use relief_terrain::TerrainPlacement;
use serde::{Deserialize, Serialize};

/// Everything the CLI can read from `--config`. Missing sections keep their
/// defaults; command-line flags override what the file sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub mesh: MeshOptions,
    pub dispatcher: DispatcherConfig,
    pub game_loop: LoopConfig,
    pub placement: TerrainPlacement,
}

impl DemoConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening config {}", path.display()))?;
        serde_json::from_reader(file).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Parse `WxH`, e.g. `257x129`.
pub fn parse_size(s: &str) -> Result<(usize, usize), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got `{s}`"))?;
    let w: usize = w.trim().parse().map_err(|e| format!("bad width `{w}`: {e}"))?;
    let h: usize = h.trim().parse().map_err(|e| format!("bad height `{h}`: {e}"))?;
    if w == 0 || h == 0 {
        return Err(format!("size must be non-zero, got {w}x{h}"));
    }
    Ok((w, h))
}

/// Parse `x,y,z`.
pub fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z, got `{s}`"));
    };
    let component = |c: &str| {
        c.trim()
            .parse::<f32>()
            .map_err(|e| format!("bad component `{c}`: {e}"))
    };
    Ok(Vec3::new(component(x)?, component(y)?, component(z)?))
}
