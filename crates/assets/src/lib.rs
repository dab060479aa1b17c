//! Asset database: a JSON manifest of named assets, decoded once and cached
//! by name.
//!
//! Consumers ask for assets by name, never by file path. Paths in a manifest
//! are resolved against the manifest's own directory.
//!
//! # Invariants
//! - Names are unique; registering a name twice is an error.
//! - A single asset failing to load never aborts the rest of the manifest.

use image::RgbaImage;
use relief_heightmap::{Heightmap, HeightmapError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Asset kinds a manifest may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub path: PathBuf,
}

impl AssetEntry {
    pub fn image(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: AssetKind::Image,
            path: path.into(),
        }
    }
}

/// The list of assets to load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub assets: Vec<AssetEntry>,
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// A decoded asset.
#[derive(Debug, Clone)]
pub enum Asset {
    /// RGBA8 pixels.
    Image(RgbaImage),
}

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to decode `{name}`: {error}")]
    Decode {
        name: String,
        #[source]
        error: image::ImageError,
    },
    #[error("duplicate asset name: {0}")]
    Duplicate(String),
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Heightmap(#[from] HeightmapError),
}

/// Outcome of loading a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    /// `(name, reason)` for every asset that failed and was skipped.
    pub skipped: Vec<(String, String)>,
}

/// Name-keyed cache of decoded assets.
#[derive(Debug, Clone, Default)]
pub struct AssetDatabase {
    base_dir: PathBuf,
    assets: BTreeMap<String, Asset>,
}

impl AssetDatabase {
    /// Empty database resolving relative paths against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            assets: BTreeMap::new(),
        }
    }

    /// Read a manifest file and load everything it lists.
    pub fn open(manifest_path: impl AsRef<Path>) -> Result<(Self, LoadReport), AssetError> {
        let manifest_path = manifest_path.as_ref();
        let manifest = Manifest::load(manifest_path)?;
        let base_dir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut db = Self::new(base_dir);
        let report = db.load_manifest(&manifest)?;
        Ok((db, report))
    }

    /// Load every entry of `manifest`.
    ///
    /// Duplicate names (within the manifest or against already cached assets)
    /// fail the whole call before anything is loaded. Individual decode or IO
    /// failures are logged and reported as skipped.
    pub fn load_manifest(&mut self, manifest: &Manifest) -> Result<LoadReport, AssetError> {
        let _span = tracing::info_span!("load_manifest", assets = manifest.assets.len()).entered();

        let mut seen = std::collections::BTreeSet::new();
        for entry in &manifest.assets {
            if self.assets.contains_key(&entry.name) || !seen.insert(entry.name.as_str()) {
                return Err(AssetError::Duplicate(entry.name.clone()));
            }
        }

        let mut report = LoadReport::default();
        for entry in &manifest.assets {
            match self.load_entry(entry) {
                Ok(asset) => {
                    tracing::debug!(name = %entry.name, "asset loaded");
                    self.assets.insert(entry.name.clone(), asset);
                    report.loaded.push(entry.name.clone());
                }
                Err(err) => {
                    tracing::warn!(name = %entry.name, path = %entry.path.display(), error = %err, "skipping asset");
                    report.skipped.push((entry.name.clone(), err.to_string()));
                }
            }
        }
        tracing::info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "manifest loaded"
        );
        Ok(report)
    }

    fn load_entry(&self, entry: &AssetEntry) -> Result<Asset, AssetError> {
        match entry.kind {
            AssetKind::Image => {
                let path = self.base_dir.join(&entry.path);
                let image = image::open(&path).map_err(|error| AssetError::Decode {
                    name: entry.name.clone(),
                    error,
                })?;
                Ok(Asset::Image(image.to_rgba8()))
            }
        }
    }

    /// Register an already decoded image under `name`.
    pub fn insert_image(&mut self, name: impl Into<String>, image: RgbaImage) -> Result<(), AssetError> {
        let name = name.into();
        if self.assets.contains_key(&name) {
            return Err(AssetError::Duplicate(name));
        }
        self.assets.insert(name, Asset::Image(image));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn image(&self, name: &str) -> Option<&RgbaImage> {
        match self.assets.get(name) {
            Some(Asset::Image(image)) => Some(image),
            None => None,
        }
    }

    /// Height samples of the image cached as `name`.
    pub fn heightmap(&self, name: &str) -> Result<Heightmap, AssetError> {
        match self.assets.get(name) {
            Some(Asset::Image(image)) => Ok(Heightmap::from_image(image)?),
            None => Err(AssetError::NotFound(name.to_string())),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

pub fn crate_info() -> &'static str {
    concat!("relief-assets v", env!("CARGO_PKG_VERSION"))
}
