//! Frame scheduler - one-shot callbacks run once per UI frame
//!
//! Callbacks requested while a frame is running are queued for the next
//! frame, so a callback can re-request itself without looping forever.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

type FrameCallback = Box<dyn FnOnce() + Send>;

/// Handle for cancelling a pending frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

#[derive(Default)]
pub struct FrameScheduler {
    next_id: AtomicU64,
    pending: Mutex<BTreeMap<u64, FrameCallback>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` on the next frame
    pub fn request<F>(&self, callback: F) -> FrameHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(id, Box::new(callback));
        FrameHandle(id)
    }

    /// Drop a pending callback; false if it already ran or was cancelled
    pub fn cancel(&self, handle: FrameHandle) -> bool {
        self.pending.lock().remove(&handle.0).is_some()
    }

    /// Run every callback pending right now, in request order
    pub fn run_frame(&self) -> usize {
        let due = std::mem::take(&mut *self.pending.lock());
        let count = due.len();
        for (_, callback) in due {
            callback();
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_callbacks_run_once_in_order() {
        let scheduler = FrameScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = Arc::clone(&log);
            scheduler.request(move || log.lock().push(i));
        }

        assert_eq!(scheduler.run_frame(), 3);
        assert_eq!(scheduler.run_frame(), 0);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_cancel() {
        let scheduler = FrameScheduler::new();
        let handle = scheduler.request(|| panic!("cancelled callback ran"));

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert_eq!(scheduler.run_frame(), 0);
    }

    #[test]
    fn test_rerequest_runs_next_frame() {
        let scheduler = Arc::new(FrameScheduler::new());
        let ticks = Arc::new(AtomicUsize::new(0));

        fn tick(scheduler: Arc<FrameScheduler>, ticks: Arc<AtomicUsize>) {
            if ticks.fetch_add(1, Ordering::SeqCst) < 4 {
                let next = Arc::clone(&scheduler);
                scheduler.request(move || tick(next, ticks));
            }
        }

        let (s, t) = (Arc::clone(&scheduler), Arc::clone(&ticks));
        scheduler.request(move || tick(s, t));

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 1);

        while scheduler.run_frame() > 0 {}
        assert_eq!(ticks.load(Ordering::SeqCst), 5);
    }
}
