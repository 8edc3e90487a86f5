//! Asset stores resolve an [`AssetRef`] to a decoded frame.
//!
//! The compositor only sees the [`AssetStore`] trait. A real video decoder
//! would implement it too; the stores here cover registered in-memory frames
//! and still images on disk.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use montage_core::memory_budget::ASSET_CACHE_ENTRIES;
use montage_core::{FrameBuffer, FrameRate, MontageError, RationalTime, Result, SharedFrameBuffer};
use montage_timeline::{AssetRef, MediaKind};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

/// Source of decoded frames.
pub trait AssetStore: Send + Sync {
    /// Frame of `asset` at `time`, measured from the start of the source media.
    fn frame(&self, asset: &AssetRef, time: RationalTime) -> Result<SharedFrameBuffer>;
}

#[derive(Debug, Clone)]
enum MemoryAsset {
    Still(SharedFrameBuffer),
    Sequence {
        rate: FrameRate,
        frames: Vec<SharedFrameBuffer>,
    },
}

/// Frames registered by url. Sequences hold on their last frame.
#[derive(Debug, Default)]
pub struct MemoryAssets {
    assets: RwLock<HashMap<String, MemoryAsset>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a still image, replacing anything under the same url.
    pub fn insert_still(&self, url: impl Into<String>, frame: FrameBuffer) {
        self.assets
            .write()
            .insert(url.into(), MemoryAsset::Still(Arc::new(frame)));
    }

    /// Register a frame sequence played back at `rate`.
    pub fn insert_sequence(&self, url: impl Into<String>, rate: FrameRate, frames: Vec<FrameBuffer>) {
        let frames = frames.into_iter().map(Arc::new).collect();
        self.assets
            .write()
            .insert(url.into(), MemoryAsset::Sequence { rate, frames });
    }

    pub fn remove(&self, url: &str) -> bool {
        self.assets.write().remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

impl AssetStore for MemoryAssets {
    fn frame(&self, asset: &AssetRef, time: RationalTime) -> Result<SharedFrameBuffer> {
        let assets = self.assets.read();
        match assets.get(&asset.url) {
            Some(MemoryAsset::Still(frame)) => Ok(Arc::clone(frame)),
            Some(MemoryAsset::Sequence { rate, frames }) => {
                let last = frames
                    .len()
                    .checked_sub(1)
                    .ok_or_else(|| MontageError::resource(&asset.url, "sequence has no frames"))?;
                let index = time.to_frames(*rate).clamp(0, last as i64) as usize;
                Ok(Arc::clone(&frames[index]))
            }
            None => Err(MontageError::resource(&asset.url, "not registered")),
        }
    }
}

/// Still images decoded from disk with the `image` crate.
///
/// Relative urls resolve against `root`. Decoded images are cached; the
/// oldest entry is evicted once the cache is full.
#[derive(Debug)]
pub struct FileAssets {
    root: PathBuf,
    capacity: usize,
    cache: Mutex<ImageCache>,
}

#[derive(Debug, Default)]
struct ImageCache {
    frames: HashMap<PathBuf, SharedFrameBuffer>,
    order: VecDeque<PathBuf>,
}

impl FileAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(root, ASSET_CACHE_ENTRIES)
    }

    pub fn with_capacity(root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            root: root.into(),
            capacity: capacity.max(1),
            cache: Mutex::new(ImageCache::default()),
        }
    }

    /// Number of decoded images currently cached.
    pub fn cached(&self) -> usize {
        self.cache.lock().frames.len()
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn decode(path: &Path, url: &str) -> Result<FrameBuffer> {
        let rgba = image::open(path)
            .map_err(|e| MontageError::resource(url, e.to_string()))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();
        FrameBuffer::from_rgba(width, height, rgba.into_raw())
            .ok_or_else(|| MontageError::resource(url, "decoded image has unexpected size"))
    }
}

impl AssetStore for FileAssets {
    fn frame(&self, asset: &AssetRef, _time: RationalTime) -> Result<SharedFrameBuffer> {
        match asset.kind {
            MediaKind::Image => {}
            MediaKind::Video => {
                return Err(MontageError::resource(&asset.url, "video decoding is not available"))
            }
            MediaKind::Text | MediaKind::Audio => {
                return Err(MontageError::resource(&asset.url, "asset has no picture"))
            }
        }

        let path = self.resolve(&asset.url);
        if let Some(frame) = self.cache.lock().frames.get(&path) {
            return Ok(Arc::clone(frame));
        }

        // Decode outside the lock so parallel renders are not serialised.
        let frame = Arc::new(Self::decode(&path, &asset.url)?);
        debug!(path = %path.display(), width = frame.width, height = frame.height, "Decoded image asset");

        let mut cache = self.cache.lock();
        if !cache.frames.contains_key(&path) {
            while cache.order.len() >= self.capacity {
                if let Some(oldest) = cache.order.pop_front() {
                    cache.frames.remove(&oldest);
                }
            }
            cache.order.push_back(path.clone());
            cache.frames.insert(path, Arc::clone(&frame));
        }
        Ok(frame)
    }
}
