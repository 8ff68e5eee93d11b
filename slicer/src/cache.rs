use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use mesh_format::ImportError;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::mesh::{load_mesh, Mesh};

/// Cache entries are keyed by path and modification time, so editing a
/// file invalidates its entry.
pub type CacheKey = (PathBuf, SystemTime);

/// Decoded meshes shared between jobs. Lookups only take the read lock;
/// the total size is bounded and the least recently used meshes are
/// evicted first.
pub struct MeshCache {
    max_bytes: usize,
    clock: AtomicU64,
    inner: RwLock<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Entry>,
    bytes: usize,
}

struct Entry {
    mesh: Mesh,
    bytes: usize,
    last_used: AtomicU64,
}

impl MeshCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            clock: AtomicU64::new(0),
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Gets the mesh of a file from the cache, decoding and inserting it on
    /// a miss.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Mesh, ImportError> {
        let path = path.as_ref();
        let modified = fs::metadata(path)?.modified()?;
        let key = (path.to_path_buf(), modified);

        if let Some(mesh) = self.get(&key) {
            trace!(path = %path.display(), "Mesh cache hit");
            return Ok(mesh);
        }

        let mesh = load_mesh(path)?;
        self.insert(key, mesh.clone());
        Ok(mesh)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Mesh> {
        let inner = self.inner.read();
        let entry = inner.entries.get(key)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.mesh.clone())
    }

    /// Inserts a mesh, evicting the least recently used entries until it
    /// fits. Meshes larger than the whole cache are not kept.
    pub fn insert(&self, key: CacheKey, mesh: Mesh) {
        let bytes = mesh.byte_size();
        if bytes > self.max_bytes {
            debug!(bytes, max = self.max_bytes, "Mesh too large to cache");
            return;
        }

        let mut inner = self.inner.write();
        if let Some(old) = inner.entries.remove(&key) {
            inner.bytes -= old.bytes;
        }

        while inner.bytes + bytes > self.max_bytes {
            let Some(oldest) = (inner.entries.iter())
                .min_by_key(|(_, x)| x.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| key.clone())
            else {
                break;
            };

            if let Some(entry) = inner.entries.remove(&oldest) {
                inner.bytes -= entry.bytes;
                debug!(path = %oldest.0.display(), bytes = entry.bytes, "Evicted mesh");
            }
        }

        inner.bytes += bytes;
        inner.entries.insert(
            key,
            Entry {
                mesh,
                bytes,
                last_used: AtomicU64::new(self.tick()),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of the cached meshes.
    pub fn bytes(&self) -> usize {
        self.inner.read().bytes
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }
}
