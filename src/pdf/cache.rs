//! Rendered page cache

use crate::pdf::RenderedPage;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Identifies one rendered frame: document, page and zoom factor.
///
/// The scale is stored in thousandths so the key stays hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub document_id: String,
    pub page: u32,
    scale_milli: u32,
}

impl FrameKey {
    pub fn new(document_id: impl Into<String>, page: u32, scale: f32) -> Self {
        Self {
            document_id: document_id.into(),
            page,
            scale_milli: (scale * 1000.0).round() as u32,
        }
    }
}

struct CacheInner {
    lru: LruCache<FrameKey, Arc<RenderedPage>>,
    total_bytes: usize,
}

/// Cache for rendered pages with entry count and byte budget limits.
///
/// Rendering is deterministic for a given key, so a hit is always
/// interchangeable with a fresh render.
pub struct FrameCache {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl FrameCache {
    /// Create a new cache with the specified entry capacity and byte budget
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store a frame.
    /// Frames larger than the whole budget are not cached.
    /// Evicts LRU entries until the byte budget is satisfied.
    pub fn put(&self, key: FrameKey, frame: Arc<RenderedPage>) {
        let new_size = frame.byte_len();
        if new_size > self.max_bytes {
            tracing::debug!(
                page = key.page,
                bytes = new_size,
                "frame exceeds cache budget, not cached"
            );
            return;
        }

        let mut inner = self.inner.lock();

        if let Some(old) = inner.lru.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.byte_len());
        }

        while inner.total_bytes + new_size > self.max_bytes {
            match inner.lru.pop_lru() {
                Some((_, evicted)) => {
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.byte_len());
                }
                None => break,
            }
        }

        // A full LRU evicts on push without going through the loop above.
        if let Some((_, evicted)) = inner.lru.push(key, frame) {
            inner.total_bytes = inner.total_bytes.saturating_sub(evicted.byte_len());
        }
        inner.total_bytes += new_size;
    }

    pub fn get(&self, key: &FrameKey) -> Option<Arc<RenderedPage>> {
        self.inner.lock().lru.get(key).cloned()
    }

    pub fn contains(&self, key: &FrameKey) -> bool {
        self.inner.lock().lru.contains(key)
    }

    /// Drop every frame that belongs to a document
    pub fn remove_document(&self, document_id: &str) {
        let mut inner = self.inner.lock();
        let keys: Vec<FrameKey> = inner
            .lru
            .iter()
            .filter(|(key, _)| key.document_id == document_id)
            .map(|(key, _)| key.clone())
            .collect();

        for key in keys {
            if let Some(frame) = inner.lru.pop(&key) {
                inner.total_bytes = inner.total_bytes.saturating_sub(frame.byte_len());
            }
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lru.clear();
        inner.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Total pixel bytes currently held
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }
}
