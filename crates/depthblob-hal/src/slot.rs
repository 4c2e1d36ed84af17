//! Single-frame hand-off between a capture thread and its consumer.
//!
//! The producer overwrites whatever is in the slot; a frame the consumer
//! never took is counted as dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use depthblob_types::DepthFrame;

#[derive(Debug, Default)]
struct Inner {
    frame: Option<DepthFrame>,
    published: u64,
    dropped: u64,
}

/// Lock-protected "latest frame" slot.  Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct LatestFrameSlot {
    inner: Arc<Mutex<Inner>>,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking holder cannot leave `Inner` half-written, so poisoning is
    // ignored.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `frame`, replacing any unconsumed one.  Returns `true` when a
    /// previous frame was overwritten.
    pub fn publish(&self, frame: DepthFrame) -> bool {
        let mut inner = self.lock();
        inner.published += 1;
        let overwritten = inner.frame.replace(frame).is_some();
        if overwritten {
            inner.dropped += 1;
        }
        overwritten
    }

    /// Take the latest frame, leaving the slot empty.
    pub fn take(&self) -> Option<DepthFrame> {
        self.lock().frame.take()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frame.is_none()
    }

    /// Frames published so far.
    pub fn published(&self) -> u64 {
        self.lock().published
    }

    /// Frames overwritten before the consumer took them.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}
