//! Latest rendered frame, shared by all readers.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

/// A rendered screen together with the operation count that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub session_id: String,
    pub frame_counter: u64,
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major.
    pub pixels: Arc<[u8]>,
    pub rendered_at: DateTime<Utc>,
}

impl Frame {
    /// Whether two frames show the same picture, regardless of when or by
    /// which operation they were produced.
    pub fn same_pixels(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.pixels == other.pixels
    }
}

#[derive(Default)]
struct Slot {
    session_id: Option<String>,
    frame: Option<Arc<Frame>>,
}

/// Single-writer, many-reader cache of the latest frame.
///
/// Replacement swaps an `Arc` under a short write lock, so readers either see
/// the previous frame or the new one in full. The cache is bound to one
/// session at a time; frames tagged with another session id are dropped.
#[derive(Default)]
pub struct FrameCache {
    slot: RwLock<Slot>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<Frame>> {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .frame
            .clone()
    }

    /// Stores `frame` if it belongs to the bound session and is newer than
    /// the cached one. Returns whether the frame was stored.
    pub fn set(&self, frame: Arc<Frame>) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if slot.session_id.as_deref() != Some(frame.session_id.as_str()) {
            tracing::warn!(
                session_id = %frame.session_id,
                frame_counter = frame.frame_counter,
                "dropping frame from unbound session"
            );
            return false;
        }
        if let Some(current) = &slot.frame
            && current.frame_counter >= frame.frame_counter
        {
            return false;
        }
        slot.frame = Some(frame);
        true
    }

    /// Clears the frame and binds the cache to `session_id`.
    pub fn bind(&self, session_id: &str) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.session_id = Some(session_id.to_string());
        slot.frame = None;
    }

    /// Clears the frame and unbinds; `get` returns `None` until a new session
    /// is bound and renders.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.session_id = None;
        slot.frame = None;
    }

    pub fn frame_counter(&self) -> Option<u64> {
        self.get().map(|f| f.frame_counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(session: &str, counter: u64, fill: u8) -> Arc<Frame> {
        Arc::new(Frame {
            session_id: session.to_string(),
            frame_counter: counter,
            width: 2,
            height: 1,
            pixels: Arc::from(vec![fill; 8]),
            rendered_at: Utc::now(),
        })
    }

    #[test]
    fn test_empty_until_bound_and_set() {
        let cache = FrameCache::new();
        assert!(cache.get().is_none());
        assert!(!cache.set(frame("s1", 0, 1)));

        cache.bind("s1");
        assert!(cache.set(frame("s1", 0, 1)));
        assert_eq!(cache.frame_counter(), Some(0));
    }

    #[test]
    fn test_rejects_stale_and_foreign_frames() {
        let cache = FrameCache::new();
        cache.bind("s1");
        assert!(cache.set(frame("s1", 2, 2)));
        assert!(!cache.set(frame("s1", 1, 1)));
        assert!(!cache.set(frame("s1", 2, 9)));
        assert!(!cache.set(frame("s0", 3, 3)));
        assert_eq!(cache.get().unwrap().pixels[0], 2);
    }

    #[test]
    fn test_repeated_reads_return_same_frame() {
        let cache = FrameCache::new();
        cache.bind("s1");
        cache.set(frame("s1", 1, 7));
        let a = cache.get().unwrap();
        let b = cache.get().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_invalidate_clears_and_unbinds() {
        let cache = FrameCache::new();
        cache.bind("s1");
        cache.set(frame("s1", 1, 7));
        cache.invalidate();
        assert!(cache.get().is_none());
        assert!(!cache.set(frame("s1", 2, 7)));
    }
}
