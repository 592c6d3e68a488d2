//! Playback coordinator - one active loop at a time
//!
//! Every mounted player registers a stop callback here. Asking to become
//! the active loop stops whichever loop was active before through its
//! callback. The coordinator also holds the process-wide peak cache so a
//! track's waveform is analysed once no matter how many views show it.

use jam_analysis::Peaks;
use jam_library::LoopId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Stops a loop's playback without touching the coordinator
pub type StopCallback = Arc<dyn Fn() + Send + Sync>;

/// Peak envelopes keyed by source URL
#[derive(Default)]
pub struct PeakCache {
    entries: RwLock<HashMap<String, Arc<Peaks>>>,
}

impl PeakCache {
    pub fn get(&self, url: &str) -> Option<Arc<Peaks>> {
        self.entries.read().get(url).cloned()
    }

    pub fn insert(&self, url: impl Into<String>, peaks: Arc<Peaks>) {
        self.entries.write().insert(url.into(), peaks);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct Registry {
    active: Option<LoopId>,
    stop_callbacks: HashMap<LoopId, StopCallback>,
}

#[derive(Default)]
pub struct PlaybackCoordinator {
    registry: Mutex<Registry>,
    peaks: PeakCache,
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_stop_callback(&self, loop_id: LoopId, callback: StopCallback) {
        tracing::debug!(loop_id = %loop_id, "Registering loop");
        self.registry.lock().stop_callbacks.insert(loop_id, callback);
    }

    pub fn unregister_stop_callback(&self, loop_id: &LoopId) {
        tracing::debug!(loop_id = %loop_id, "Unregistering loop");
        self.registry.lock().stop_callbacks.remove(loop_id);
    }

    /// Make `loop_id` the active loop, stopping the previous one first
    ///
    /// The previous loop's callback runs before this returns, without the
    /// registry lock held.
    pub fn request_active(&self, loop_id: &LoopId) {
        let previous = {
            let mut registry = self.registry.lock();
            match registry.active.take() {
                Some(active) if active == *loop_id => {
                    registry.active = Some(active);
                    return;
                }
                Some(active) => {
                    let callback = registry.stop_callbacks.get(&active).cloned();
                    Some((active, callback))
                }
                None => None,
            }
        };

        if let Some((previous_id, callback)) = previous {
            match callback {
                Some(stop) => {
                    tracing::debug!(from = %previous_id, to = %loop_id, "Stopping previous loop");
                    stop();
                }
                None => {
                    tracing::debug!(loop_id = %previous_id, "Previous loop no longer registered");
                }
            }
        }

        self.registry.lock().active = Some(loop_id.clone());
    }

    /// Clear the active slot if `loop_id` holds it
    pub fn release_active(&self, loop_id: &LoopId) -> bool {
        let mut registry = self.registry.lock();
        if registry.active.as_ref() == Some(loop_id) {
            registry.active = None;
            true
        } else {
            false
        }
    }

    /// Stop the active loop, if any, and clear the slot
    pub fn stop_all(&self) {
        let callback = {
            let mut registry = self.registry.lock();
            let active = registry.active.take();
            active.and_then(|id| registry.stop_callbacks.get(&id).cloned())
        };
        if let Some(stop) = callback {
            stop();
        }
    }

    pub fn active_loop(&self) -> Option<LoopId> {
        self.registry.lock().active.clone()
    }

    pub fn is_registered(&self, loop_id: &LoopId) -> bool {
        self.registry.lock().stop_callbacks.contains_key(loop_id)
    }

    pub fn registered_count(&self) -> usize {
        self.registry.lock().stop_callbacks.len()
    }

    pub fn get_peaks(&self, url: &str) -> Option<Arc<Peaks>> {
        self.peaks.get(url)
    }

    pub fn set_peaks(&self, url: &str, peaks: Arc<Peaks>) {
        self.peaks.insert(url, peaks);
    }

    pub fn peak_cache(&self) -> &PeakCache {
        &self.peaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback() -> (StopCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let callback: StopCallback = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    #[test]
    fn test_request_active_stops_previous() {
        let coordinator = PlaybackCoordinator::new();
        let (stop_a, a_stops) = counting_callback();
        let (stop_b, b_stops) = counting_callback();
        let a = LoopId::from("a");
        let b = LoopId::from("b");
        coordinator.register_stop_callback(a.clone(), stop_a);
        coordinator.register_stop_callback(b.clone(), stop_b);

        coordinator.request_active(&a);
        assert_eq!(coordinator.active_loop(), Some(a.clone()));
        assert_eq!(a_stops.load(Ordering::SeqCst), 0);

        coordinator.request_active(&a);
        assert_eq!(a_stops.load(Ordering::SeqCst), 0);

        coordinator.request_active(&b);
        assert_eq!(coordinator.active_loop(), Some(b.clone()));
        assert_eq!(a_stops.load(Ordering::SeqCst), 1);
        assert_eq!(b_stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_may_reenter_coordinator() {
        let coordinator = Arc::new(PlaybackCoordinator::new());
        let a = LoopId::from("a");
        let weak = Arc::downgrade(&coordinator);
        let inner_id = a.clone();
        coordinator.register_stop_callback(
            a.clone(),
            Arc::new(move || {
                if let Some(c) = weak.upgrade() {
                    // Already cleared before the callback runs
                    assert!(!c.release_active(&inner_id));
                }
            }),
        );

        coordinator.request_active(&a);
        coordinator.request_active(&LoopId::from("b"));
        assert_eq!(coordinator.active_loop(), Some(LoopId::from("b")));
    }

    #[test]
    fn test_unregistered_active_is_noop() {
        let coordinator = PlaybackCoordinator::new();
        let (stop_a, a_stops) = counting_callback();
        let a = LoopId::from("a");
        coordinator.register_stop_callback(a.clone(), stop_a);
        coordinator.request_active(&a);
        coordinator.unregister_stop_callback(&a);

        coordinator.request_active(&LoopId::from("b"));
        assert_eq!(a_stops.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.registered_count(), 0);
    }

    #[test]
    fn test_stale_release_ignored() {
        let coordinator = PlaybackCoordinator::new();
        let a = LoopId::from("a");
        let b = LoopId::from("b");
        coordinator.request_active(&b);

        assert!(!coordinator.release_active(&a));
        assert_eq!(coordinator.active_loop(), Some(b.clone()));
        assert!(coordinator.release_active(&b));
        assert_eq!(coordinator.active_loop(), None);
    }

    #[test]
    fn test_stop_all() {
        let coordinator = PlaybackCoordinator::new();
        let (stop_a, a_stops) = counting_callback();
        let a = LoopId::from("a");
        coordinator.register_stop_callback(a.clone(), stop_a);

        coordinator.stop_all();
        assert_eq!(a_stops.load(Ordering::SeqCst), 0);

        coordinator.request_active(&a);
        coordinator.stop_all();
        assert_eq!(a_stops.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.active_loop(), None);
        assert!(coordinator.is_registered(&a));
    }

    #[test]
    fn test_peak_cache_roundtrip_and_overwrite() {
        let coordinator = PlaybackCoordinator::new();
        assert!(coordinator.get_peaks("u").is_none());

        let first = Arc::new(Peaks::empty(10, 2));
        coordinator.set_peaks("u", Arc::clone(&first));
        assert_eq!(coordinator.get_peaks("u").unwrap().len(), 10);

        coordinator.set_peaks("u", Arc::new(Peaks::empty(20, 2)));
        assert_eq!(coordinator.get_peaks("u").unwrap().len(), 20);
        assert_eq!(coordinator.peak_cache().len(), 1);
    }
}
