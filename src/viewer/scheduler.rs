//! Animation frame scheduling seam
//!
//! The controller never waits on real time. It asks the scheduler for a frame
//! and the host calls back into [`super::CanvasController::on_frame`] when the
//! frame fires (a `requestAnimationFrame` callback, a GUI tick, or a test
//! stepping frames by hand).

/// Handle for one requested animation frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

pub trait FrameScheduler {
    /// Ask for a callback on the next frame
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraw a frame request that has not fired yet
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Scheduler that only records requests; frames fire when the owner says so
#[derive(Debug, Default)]
pub struct ManualFrames {
    next_id: u64,
    pending: Vec<FrameHandle>,
    requested_total: usize,
}

impl ManualFrames {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the oldest outstanding frame
    pub fn take_next(&mut self) -> Option<FrameHandle> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of frames ever requested
    #[must_use]
    pub fn requested_total(&self) -> usize {
        self.requested_total
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        self.requested_total += 1;
        let handle = FrameHandle(self.next_id);
        self.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending.retain(|h| *h != handle);
    }
}
