//! Frame scheduling
//!
//! The lifecycle engine never loops on its own; it asks a scheduler for the
//! next frame callback and the host dispatches due frames back to it.

use std::time::Instant;

/// Opaque handle of a requested frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(pub u64);

/// Source of frame callbacks
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    /// Cancel a pending frame; unknown or already dispatched handles are ignored
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Scheduler driven explicitly by the host loop (or by tests)
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_handle: u64,
    pending: Vec<FrameHandle>,
    requested: u64,
    cancelled: u64,
    last_dispatch: Option<Instant>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every pending frame in request order
    pub fn take_due(&mut self, now: Instant) -> Vec<FrameHandle> {
        self.last_dispatch = Some(now);
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[FrameHandle] {
        &self.pending
    }

    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        self.pending.contains(&handle)
    }

    /// Total frames requested
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Cancellations that removed a pending frame
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    pub fn last_dispatch(&self) -> Option<Instant> {
        self.last_dispatch
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_handle += 1;
        self.requested += 1;
        let handle = FrameHandle(self.next_handle);
        self.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Some(index) = self.pending.iter().position(|h| *h == handle) {
            self.pending.remove(index);
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_and_take() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.request_frame();
        let b = scheduler.request_frame();
        assert_ne!(a, b);
        assert_eq!(scheduler.take_due(Instant::now()), vec![a, b]);
        assert!(scheduler.pending().is_empty());
        assert_eq!(scheduler.requested(), 2);
    }

    #[test]
    fn test_cancel_counts_only_pending() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.request_frame();
        scheduler.cancel_frame(a);
        scheduler.cancel_frame(a);
        scheduler.cancel_frame(FrameHandle(99));
        assert_eq!(scheduler.cancelled(), 1);
        assert!(!scheduler.is_pending(a));
    }
}
