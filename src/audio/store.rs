use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::audio::source::AssetSource;
use crate::error::StoreError;

/// File extensions loaded from the track directory
pub const TRACK_EXTENSIONS: &[&str] = &["ogg", "oga"];

/// One ambient track held fully in memory
#[derive(Debug)]
pub struct AudioAsset {
    name: String,
    data: Arc<[u8]>,
    position: Arc<AtomicUsize>,
}

impl AudioAsset {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data: Arc::from(data),
            position: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Current read cursor
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }

    /// A byte source sharing this asset's buffer and cursor
    pub fn source(&self) -> AssetSource {
        AssetSource::new(Arc::clone(&self.data), Arc::clone(&self.position))
    }

    pub fn rewind(&self) {
        self.position.store(0, Ordering::Relaxed);
    }
}

/// Catalog of ambient tracks
#[derive(Debug, Default)]
pub struct TrackStore {
    assets: Vec<AudioAsset>,
}

impl TrackStore {
    pub fn new(assets: Vec<AudioAsset>) -> Self {
        Self { assets }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every track file in `dir`, sorted by file name
    ///
    /// A missing directory is an empty catalog. Files that cannot be read are skipped.
    pub fn load_directory(dir: &Path) -> Result<Self, StoreError> {
        if !dir.exists() {
            warn!("Track directory {} does not exist", dir.display());
            return Ok(Self::empty());
        }
        if !dir.is_dir() {
            return Err(StoreError::NotADirectory {
                path: dir.display().to_string(),
            });
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && Self::is_track_file(path))
            .collect();
        paths.sort();

        let mut assets = Vec::with_capacity(paths.len());
        for path in paths {
            match std::fs::read(&path) {
                Ok(data) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    debug!("Loaded {} ({} bytes)", name, data.len());
                    assets.push(AudioAsset::new(name, data));
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        info!("Loaded {} ambient tracks from {}", assets.len(), dir.display());
        Ok(Self::new(assets))
    }

    fn is_track_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| TRACK_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AudioAsset> {
        self.assets.get(index)
    }

    /// Reset a track's cursor so a new decode session starts clean
    pub fn rewind(&self, index: usize) {
        if let Some(asset) = self.assets.get(index) {
            asset.rewind();
        }
    }

    pub fn source(&self, index: usize) -> Option<AssetSource> {
        self.assets.get(index).map(AudioAsset::source)
    }
}
