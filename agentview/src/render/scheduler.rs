//! Frame-bound, cancellable, single-shot callbacks.
//!
//! Work scheduled here runs at the next paint opportunity (`drain`, called
//! from the window's `on_frame`). A scheduled entry can be cancelled until
//! then; cancelled entries never run.

/// Handle of a scheduled entry. Handles increase monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(u64);

#[derive(Debug)]
pub struct FrameScheduler<T> {
    next: u64,
    queue: Vec<(FrameHandle, T)>,
}

impl<T> Default for FrameScheduler<T> {
    fn default() -> Self {
        Self {
            next: 0,
            queue: Vec::new(),
        }
    }
}

impl<T> FrameScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, work: T) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.queue.push((handle, work));
        handle
    }

    /// Returns whether the entry was still pending.
    pub fn cancel(&mut self, handle: FrameHandle) -> bool {
        let before = self.queue.len();
        self.queue.retain(|(h, _)| *h != handle);
        self.queue.len() != before
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.queue.len();
        self.queue.clear();
        cancelled
    }

    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        self.queue.iter().any(|(h, _)| *h == handle)
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Take every pending entry, in scheduling order.
    pub fn drain(&mut self) -> Vec<T> {
        self.queue.drain(..).map(|(_, work)| work).collect()
    }
}
