//! Parallel fetch-and-decode of a loop's tracks
//!
//! Each loop player owns one loader. A load fetches and decodes every
//! playable track on its own thread; tracks that fail are logged and left
//! out so the rest of the loop can still play.

use crate::decoder::{DecodedBuffer, LoadError, TrackDecoder};
use crate::fetch::ByteFetcher;
use crate::track::{TrackDescriptor, TrackId};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;

/// Decoded buffers keyed by track
pub type BufferMap = HashMap<TrackId, Arc<DecodedBuffer>>;

/// Cached buffers plus an epoch bumped on every invalidation
///
/// A load only writes back if the epoch it started under is still current.
#[derive(Default)]
struct BufferCache {
    buffers: BufferMap,
    epoch: u64,
}

impl BufferCache {
    fn invalidate(&mut self) {
        self.buffers.clear();
        self.epoch += 1;
    }
}

/// Fetches, decodes and caches the buffers of one loop
pub struct TrackBufferLoader {
    fetcher: Arc<dyn ByteFetcher>,
    cache: Mutex<BufferCache>,
    loading: Mutex<bool>,
    idle: Condvar,
    track_set: Mutex<BTreeSet<TrackId>>,
}

/// Clears the in-flight flag on every exit path of `load`
struct LoadingGuard<'a>(&'a TrackBufferLoader);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        *self.0.loading.lock() = false;
        self.0.idle.notify_all();
    }
}

impl TrackBufferLoader {
    pub fn new(fetcher: Arc<dyn ByteFetcher>) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(BufferCache::default()),
            loading: Mutex::new(false),
            idle: Condvar::new(),
            track_set: Mutex::new(BTreeSet::new()),
        }
    }

    /// Fetch and decode every playable track at `sample_rate`
    ///
    /// Returns `None` without doing anything if a load is already running.
    /// Otherwise the cache is cleared, all tracks are loaded in parallel and
    /// the buffers that decoded are returned. If the cache is invalidated
    /// while the load runs, the results are returned but not cached.
    pub fn load(&self, tracks: &[TrackDescriptor], sample_rate: u32) -> Option<BufferMap> {
        {
            let mut loading = self.loading.lock();
            if *loading {
                tracing::debug!("Track load already in flight, ignoring");
                return None;
            }
            *loading = true;
        }
        let _guard = LoadingGuard(self);

        let epoch = {
            let mut cache = self.cache.lock();
            cache.buffers.clear();
            cache.epoch
        };

        let decoder = TrackDecoder::with_sample_rate(sample_rate);
        let decoder = &decoder;
        let fetcher = self.fetcher.as_ref();

        let results: Vec<(TrackId, &str, Result<DecodedBuffer, LoadError>)> =
            thread::scope(|s| {
                let handles: Vec<_> = tracks
                    .iter()
                    .filter_map(|t| t.source_url.as_deref().map(|url| (t.id.clone(), url)))
                    .map(|(id, url)| {
                        let handle = s.spawn(move || {
                            let bytes = fetcher.fetch(url)?;
                            decoder.decode(bytes, TrackDecoder::extension_hint(url))
                        });
                        (id, url, handle)
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|(id, url, handle)| {
                        let result = handle.join().unwrap_or_else(|_| {
                            Err(LoadError::Decode("decoder thread panicked".into()))
                        });
                        (id, url, result)
                    })
                    .collect()
            });

        let mut loaded = BufferMap::new();
        let mut failed = 0usize;
        for (id, url, result) in results {
            match result {
                Ok(buffer) => {
                    loaded.insert(id, Arc::new(buffer));
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(track=%id, url, error=%e, "Track failed to load, omitting");
                }
            }
        }

        tracing::debug!(loaded = loaded.len(), failed, "Track load finished");

        let mut cache = self.cache.lock();
        if cache.epoch == epoch {
            let fresh = loaded.iter().map(|(id, buf)| (id.clone(), Arc::clone(buf)));
            cache.buffers.extend(fresh);
        } else {
            tracing::debug!("Cache invalidated during load, results not cached");
        }
        Some(loaded)
    }

    /// Block until no load is in flight
    pub fn wait_until_idle(&self) {
        let mut loading = self.loading.lock();
        while *loading {
            self.idle.wait(&mut loading);
        }
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.lock()
    }

    /// Snapshot of all cached buffers
    pub fn buffers(&self) -> BufferMap {
        self.cache.lock().buffers.clone()
    }

    pub fn buffer(&self, id: &TrackId) -> Option<Arc<DecodedBuffer>> {
        self.cache.lock().buffers.get(id).cloned()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().buffers.len()
    }

    /// Whether every playable track has a decoded buffer
    pub fn is_complete(&self, tracks: &[TrackDescriptor]) -> bool {
        let cache = self.cache.lock();
        tracks
            .iter()
            .filter(|t| t.is_playable())
            .all(|t| cache.buffers.contains_key(&t.id))
    }

    /// Remember the loop's track ids, dropping the cache if they changed
    ///
    /// Returns true when the set differed from the previous one.
    pub fn retain_track_set(&self, tracks: &[TrackDescriptor]) -> bool {
        let ids: BTreeSet<TrackId> = tracks.iter().map(|t| t.id.clone()).collect();
        let mut current = self.track_set.lock();
        if *current == ids {
            return false;
        }
        *current = ids;
        self.cache.lock().invalidate();
        true
    }

    /// Drop every cached buffer
    pub fn clear(&self) {
        self.cache.lock().invalidate();
    }

    /// Drop one track's buffer, e.g. after its source changed
    ///
    /// A load in flight is invalidated too, since it may still be fetching
    /// the old source.
    pub fn forget(&self, id: &TrackId) {
        let mut cache = self.cache.lock();
        cache.buffers.remove(id);
        cache.epoch += 1;
    }
}
