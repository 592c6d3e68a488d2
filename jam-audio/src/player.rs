//! Loop player - plays every track of a loop in sync
//!
//! One player is mounted per loop. Each playable track gets its own gain
//! stage feeding the loop's master gain; playing starts one looping source
//! per decoded track, all at the same device frame. Only one player plays
//! at a time: starting a loop asks the coordinator to stop the previous
//! one first.
//!
//! Lock order is player state, then device graph. The player's own lock is
//! never held while asking the coordinator for the active slot, because
//! that runs the previous loop's stop callback.

use crate::coordinator::{PlaybackCoordinator, StopCallback};
use crate::device::{DeviceError, DeviceHandle, DeviceState};
use crate::graph::{NodeId, Output};
use crate::mix::{MixState, TrackMix};
use crate::scheduler::{FrameHandle, FrameScheduler};
use crate::session::AudioDeviceSession;
use crate::waveform::WaveformView;
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use jam_analysis::Peaks;
use jam_library::{
    BufferMap, ByteFetcher, LoopDescriptor, LoopId, TrackBufferLoader, TrackDescriptor, TrackId,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::thread;
use thiserror::Error;

/// Errors from player operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),
    #[error("Cannot {action} while {state:?}")]
    InvalidTransition {
        state: PlayerState,
        action: &'static str,
    },
    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),
    #[error("Player is unmounted")]
    Unmounted,
    #[error("Failed to start loader: {0}")]
    Loader(String),
}

/// Playback state of a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    /// Waiting for track buffers
    Loading,
    Playing,
}

/// Everything a player shares with the rest of the process
#[derive(Clone)]
pub struct PlayerContext {
    pub session: Arc<AudioDeviceSession>,
    pub coordinator: Arc<PlaybackCoordinator>,
    pub scheduler: Arc<FrameScheduler>,
    pub fetcher: Arc<dyn ByteFetcher>,
    /// Points per waveform envelope
    pub peak_points: usize,
}

/// Render-ready view of one track
#[derive(Debug, Clone)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub label: String,
    pub playable: bool,
    /// A decoded buffer is cached for this track
    pub loaded: bool,
    pub mix: TrackMix,
    /// Playback position (0.0-1.0)
    pub cursor: f64,
    pub peaks: Option<Arc<Peaks>>,
}

/// Render-ready view of a loop player
#[derive(Debug, Clone)]
pub struct LoopSnapshot {
    pub loop_id: LoopId,
    pub name: Option<String>,
    pub state: PlayerState,
    pub master_muted: bool,
    pub tracks: Vec<TrackSnapshot>,
}

struct PendingLoad {
    generation: u64,
    results: Receiver<BufferMap>,
}

struct PlayerInner {
    state: PlayerState,
    tracks: Vec<TrackDescriptor>,
    views: Vec<WaveformView>,
    mix: MixState,
    device: Option<DeviceHandle>,
    master_gain: Option<NodeId>,
    track_gains: Vec<(TrackId, NodeId)>,
    sources: Vec<NodeId>,
    /// Bumped on every load and stop; older load results are ignored
    generation: u64,
    playback_start: Option<u64>,
    frame_request: Option<FrameHandle>,
    pending_load: Option<PendingLoad>,
    mounted: bool,
}

struct Shared {
    loop_id: LoopId,
    name: Option<String>,
    ctx: PlayerContext,
    loader: Arc<TrackBufferLoader>,
    inner: Mutex<PlayerInner>,
}

/// Player for one loop
pub struct LoopPlayer {
    shared: Arc<Shared>,
}

fn playable_ids(tracks: &[TrackDescriptor]) -> Vec<&TrackId> {
    tracks.iter().filter(|t| t.is_playable()).map(|t| &t.id).collect()
}

fn make_views(tracks: &[TrackDescriptor], coordinator: &PlaybackCoordinator) -> Vec<WaveformView> {
    tracks
        .iter()
        .map(|t| WaveformView::render(t.source_url.as_deref(), coordinator))
        .collect()
}

impl LoopPlayer {
    /// Mount a player and register it with the coordinator
    ///
    /// The device is not opened until the first `play`.
    pub fn mount(descriptor: LoopDescriptor, ctx: PlayerContext) -> Self {
        let LoopDescriptor { id, name, tracks } = descriptor;

        let loader = Arc::new(TrackBufferLoader::new(Arc::clone(&ctx.fetcher)));
        loader.retain_track_set(&tracks);

        let inner = PlayerInner {
            state: PlayerState::Idle,
            views: make_views(&tracks, &ctx.coordinator),
            mix: MixState::new(playable_ids(&tracks)),
            tracks,
            device: None,
            master_gain: None,
            track_gains: Vec::new(),
            sources: Vec::new(),
            generation: 0,
            playback_start: None,
            frame_request: None,
            pending_load: None,
            mounted: true,
        };

        let shared = Arc::new(Shared {
            loop_id: id,
            name,
            ctx,
            loader,
            inner: Mutex::new(inner),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let stop: StopCallback = Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                Shared::halt(&shared, false);
            }
        });
        shared
            .ctx
            .coordinator
            .register_stop_callback(shared.loop_id.clone(), stop);

        tracing::debug!(loop_id = %shared.loop_id, "Loop player mounted");
        Self { shared }
    }

    pub fn loop_id(&self) -> &LoopId {
        &self.shared.loop_id
    }

    pub fn state(&self) -> PlayerState {
        self.shared.inner.lock().state
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.inner.lock().mounted
    }

    /// Start playing every decoded track from the top
    ///
    /// Opens and resumes the device if needed, stops whichever loop was
    /// active, then either starts at once or enters `Loading` while the
    /// tracks are fetched.
    pub fn play(&self) -> Result<(), PlayerError> {
        let shared = &self.shared;
        shared.check_idle("play")?;

        let device = shared.ctx.session.get()?;
        if device.state() != DeviceState::Running {
            device.resume()?;
        }

        {
            let mut inner = shared.inner.lock();
            shared.check_idle_locked(&inner, "play")?;
            shared.ensure_graph(&mut inner, &device);
        }

        shared.ctx.coordinator.request_active(&shared.loop_id);

        let mut inner = shared.inner.lock();
        if let Err(e) = shared.check_idle_locked(&inner, "play") {
            // Unmounted meanwhile; a concurrent play that got ahead keeps the slot
            if inner.state == PlayerState::Idle {
                drop(inner);
                shared.ctx.coordinator.release_active(&shared.loop_id);
            }
            return Err(e);
        }

        if shared.loader.is_complete(&inner.tracks) {
            let buffers = shared.loader.buffers();
            Shared::start_playback(shared, &mut inner, buffers);
            Ok(())
        } else {
            Shared::begin_loading(shared, &mut inner, device.sample_rate())
        }
    }

    /// Stop playback or a pending load and give up the active slot
    pub fn stop(&self) {
        Shared::halt(&self.shared, true);
    }

    /// Play when idle, stop otherwise
    pub fn toggle_play(&self) -> Result<(), PlayerError> {
        match self.state() {
            PlayerState::Idle => self.play(),
            PlayerState::Loading | PlayerState::Playing => {
                self.stop();
                Ok(())
            }
        }
    }

    pub fn set_track_muted(&self, id: &TrackId, muted: bool) -> Result<(), PlayerError> {
        self.update_mix(id, |mix| mix.set_muted(id, muted))
    }

    pub fn toggle_track_mute(&self, id: &TrackId) -> Result<(), PlayerError> {
        self.update_mix(id, |mix| mix.toggle_muted(id))
    }

    pub fn set_track_soloed(&self, id: &TrackId, soloed: bool) -> Result<(), PlayerError> {
        self.update_mix(id, |mix| mix.set_soloed(id, soloed))
    }

    pub fn toggle_track_solo(&self, id: &TrackId) -> Result<(), PlayerError> {
        self.update_mix(id, |mix| mix.toggle_soloed(id))
    }

    pub fn set_track_volume(&self, id: &TrackId, volume: f32) -> Result<(), PlayerError> {
        self.update_mix(id, |mix| mix.set_volume(id, volume))
    }

    /// Nudge a track's volume by `delta`
    pub fn adjust_track_volume(&self, id: &TrackId, delta: f32) -> Result<(), PlayerError> {
        self.update_mix(id, |mix| match mix.track(id) {
            Some(track) => mix.set_volume(id, track.volume + delta),
            None => false,
        })
    }

    fn update_mix(
        &self,
        id: &TrackId,
        f: impl FnOnce(&mut MixState) -> bool,
    ) -> Result<(), PlayerError> {
        let mut inner = self.shared.inner.lock();
        if !inner.mounted {
            return Err(PlayerError::Unmounted);
        }
        if !f(&mut inner.mix) {
            return Err(PlayerError::UnknownTrack(id.clone()));
        }
        Shared::apply_gains(&inner);
        Ok(())
    }

    pub fn set_master_muted(&self, muted: bool) -> Result<(), PlayerError> {
        let mut inner = self.shared.inner.lock();
        if !inner.mounted {
            return Err(PlayerError::Unmounted);
        }
        inner.mix.set_master_muted(muted);
        Shared::apply_gains(&inner);
        Ok(())
    }

    pub fn toggle_master_mute(&self) -> Result<(), PlayerError> {
        let muted = self.shared.inner.lock().mix.master_muted();
        self.set_master_muted(!muted)
    }

    /// Forget decoded buffers so the next play fetches every track again
    ///
    /// A load in progress is started over.
    pub fn reload(&self) {
        let shared = &self.shared;
        tracing::debug!(loop_id = %shared.loop_id, "Dropping decoded buffers");
        shared.loader.clear();
        let mut inner = shared.inner.lock();
        Shared::restart_loading(shared, &mut inner);
    }

    /// Swap in a new track list
    ///
    /// When the set of track ids changes the player stops and starts over
    /// with fresh gain stages, mix settings and views. Returns whether it
    /// did.
    pub fn replace_tracks(&self, tracks: Vec<TrackDescriptor>) -> bool {
        let shared = &self.shared;
        let playable_changed = {
            let inner = shared.inner.lock();
            let old: BTreeSet<&TrackId> = playable_ids(&inner.tracks).into_iter().collect();
            let new: BTreeSet<&TrackId> = playable_ids(&tracks).into_iter().collect();
            old != new
        };
        let ids_changed = shared.loader.retain_track_set(&tracks);

        if !ids_changed && !playable_changed {
            // Same tracks, possibly with new labels or refreshed URLs
            let mut inner = shared.inner.lock();
            let moved: Vec<TrackId> = tracks
                .iter()
                .filter(|track| {
                    inner
                        .tracks
                        .iter()
                        .any(|old| old.id == track.id && old.source_url != track.source_url)
                })
                .map(|track| track.id.clone())
                .collect();
            for id in &moved {
                shared.loader.forget(id);
            }

            let views: Vec<WaveformView> = tracks
                .iter()
                .map(|track| {
                    inner
                        .tracks
                        .iter()
                        .position(|old| old.id == track.id && old.source_url == track.source_url)
                        .map(|i| inner.views[i].clone())
                        .unwrap_or_else(|| {
                            WaveformView::render(track.source_url.as_deref(), &shared.ctx.coordinator)
                        })
                })
                .collect();
            inner.views = views;
            inner.tracks = tracks;
            if !moved.is_empty() {
                tracing::debug!(loop_id = %shared.loop_id, moved = moved.len(), "Track sources changed");
                Shared::restart_loading(shared, &mut inner);
            }
            return false;
        }

        Shared::halt(shared, true);

        let mut inner = shared.inner.lock();
        Shared::remove_track_gains(&mut inner);
        inner.views = make_views(&tracks, &shared.ctx.coordinator);
        let master_muted = inner.mix.master_muted();
        inner.mix = MixState::new(playable_ids(&tracks));
        inner.mix.set_master_muted(master_muted);
        inner.tracks = tracks;
        if let Some(device) = inner.device.clone() {
            Shared::create_track_gains(&mut inner, &device);
        }

        tracing::debug!(
            loop_id = %shared.loop_id,
            tracks = inner.tracks.len(),
            "Track list replaced"
        );
        true
    }

    /// Current state for rendering
    pub fn snapshot(&self) -> LoopSnapshot {
        let shared = &self.shared;
        let inner = shared.inner.lock();

        let tracks = inner
            .tracks
            .iter()
            .zip(&inner.views)
            .enumerate()
            .map(|(i, (track, view))| TrackSnapshot {
                id: track.id.clone(),
                label: track.label(i),
                playable: track.is_playable(),
                loaded: shared.loader.buffer(&track.id).is_some(),
                mix: inner.mix.track(&track.id).unwrap_or_default(),
                cursor: view.cursor(),
                peaks: view.peaks().cloned(),
            })
            .collect();

        LoopSnapshot {
            loop_id: shared.loop_id.clone(),
            name: shared.name.clone(),
            state: inner.state,
            master_muted: inner.mix.master_muted(),
            tracks,
        }
    }

    /// Number of this loop's sources in the graph
    pub fn active_source_count(&self) -> usize {
        self.shared.inner.lock().sources.len()
    }

    /// Gain value currently set on a track's gain stage
    pub fn applied_gain(&self, id: &TrackId) -> Option<f32> {
        let inner = self.shared.inner.lock();
        let device = inner.device.as_ref()?;
        let node = inner.track_gains.iter().find(|(t, _)| t == id)?.1;
        let gain = device.graph().gain(node);
        gain
    }

    /// Gain value currently set on the master stage
    pub fn applied_master_gain(&self) -> Option<f32> {
        let inner = self.shared.inner.lock();
        let device = inner.device.as_ref()?;
        let node = inner.master_gain?;
        let gain = device.graph().gain(node);
        gain
    }

    /// Cursor position of a track (0.0-1.0)
    pub fn cursor(&self, id: &TrackId) -> Option<f64> {
        let inner = self.shared.inner.lock();
        let idx = inner.tracks.iter().position(|t| t.id == *id)?;
        Some(inner.views[idx].cursor())
    }

    /// Stop, tear down graph nodes and unregister; safe to call twice
    pub fn unmount(&self) {
        let shared = &self.shared;
        if !shared.inner.lock().mounted {
            return;
        }

        Shared::halt(shared, true);

        {
            let mut inner = shared.inner.lock();
            inner.mounted = false;
            Shared::remove_track_gains(&mut inner);
            if let (Some(device), Some(master)) = (inner.device.clone(), inner.master_gain.take()) {
                let mut graph = device.graph();
                let _ = graph.disconnect(master);
                graph.remove_gain(master);
            }
            if let Some(handle) = inner.frame_request.take() {
                shared.ctx.scheduler.cancel(handle);
            }
        }

        shared.ctx.coordinator.release_active(&shared.loop_id);
        shared
            .ctx
            .coordinator
            .unregister_stop_callback(&shared.loop_id);
        tracing::debug!(loop_id = %shared.loop_id, "Loop player unmounted");
    }
}

impl Drop for LoopPlayer {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl Shared {
    fn check_idle(&self, action: &'static str) -> Result<(), PlayerError> {
        let inner = self.inner.lock();
        self.check_idle_locked(&inner, action)
    }

    fn check_idle_locked(&self, inner: &PlayerInner, action: &'static str) -> Result<(), PlayerError> {
        if !inner.mounted {
            return Err(PlayerError::Unmounted);
        }
        if inner.state != PlayerState::Idle {
            return Err(PlayerError::InvalidTransition {
                state: inner.state,
                action,
            });
        }
        Ok(())
    }

    /// Build master and track gain stages on first use
    fn ensure_graph(&self, inner: &mut PlayerInner, device: &DeviceHandle) {
        if inner.device.is_some() {
            return;
        }
        {
            let mut graph = device.graph();
            let master = graph.create_gain(inner.mix.master_gain());
            if let Err(e) = graph.connect_gain(master, Output::Destination) {
                tracing::warn!(error = %e, "Failed to connect master gain");
            }
            inner.master_gain = Some(master);
        }
        inner.device = Some(DeviceHandle::clone(device));
        Self::create_track_gains(inner, device);
    }

    fn create_track_gains(inner: &mut PlayerInner, device: &DeviceHandle) {
        let Some(master) = inner.master_gain else {
            return;
        };
        let mut graph = device.graph();
        let gains: Vec<(TrackId, NodeId)> = inner
            .tracks
            .iter()
            .filter(|t| t.is_playable())
            .map(|t| {
                let node = graph.create_gain(inner.mix.effective_gain(&t.id));
                if let Err(e) = graph.connect_gain(node, Output::Gain(master)) {
                    tracing::warn!(track = %t.id, error = %e, "Failed to connect track gain");
                }
                (t.id.clone(), node)
            })
            .collect();
        inner.track_gains = gains;
    }

    fn remove_track_gains(inner: &mut PlayerInner) {
        let gains = std::mem::take(&mut inner.track_gains);
        if let Some(device) = inner.device.as_ref() {
            let mut graph = device.graph();
            for (_, node) in gains {
                let _ = graph.disconnect(node);
                graph.remove_gain(node);
            }
        }
    }

    /// Push mix state into the gain stages
    fn apply_gains(inner: &PlayerInner) {
        let Some(device) = inner.device.as_ref() else {
            return;
        };
        let mut graph = device.graph();
        for (id, node) in &inner.track_gains {
            if let Err(e) = graph.set_gain(*node, inner.mix.effective_gain(id)) {
                tracing::warn!(track = %id, error = %e, "Failed to set track gain");
            }
        }
        if let Some(master) = inner.master_gain {
            let _ = graph.set_gain(master, inner.mix.master_gain());
        }
    }

    fn schedule_frame(shared: &Arc<Shared>) -> FrameHandle {
        let weak = Arc::downgrade(shared);
        shared.ctx.scheduler.request(move || {
            if let Some(shared) = weak.upgrade() {
                Shared::on_frame(&shared);
            }
        })
    }

    fn begin_loading(
        shared: &Arc<Shared>,
        inner: &mut PlayerInner,
        sample_rate: u32,
    ) -> Result<(), PlayerError> {
        inner.generation += 1;
        let generation = inner.generation;

        let (tx, rx) = bounded(1);
        let loader = Arc::clone(&shared.loader);
        let tracks = inner.tracks.clone();

        let spawned = thread::Builder::new()
            .name("jam-loader".into())
            .spawn(move || {
                // Join a load that is already running; if its results were
                // invalidated meanwhile, load again
                let buffers = loop {
                    if let Some(buffers) = loader.load(&tracks, sample_rate) {
                        break buffers;
                    }
                    loader.wait_until_idle();
                    if loader.is_complete(&tracks) {
                        break loader.buffers();
                    }
                };
                let _ = tx.send(buffers);
            });

        if let Err(e) = spawned {
            tracing::error!(loop_id = %shared.loop_id, error = %e, "Failed to spawn loader thread");
            shared.ctx.coordinator.release_active(&shared.loop_id);
            return Err(PlayerError::Loader(e.to_string()));
        }

        tracing::debug!(loop_id = %shared.loop_id, generation, "Loading tracks");
        inner.pending_load = Some(PendingLoad {
            generation,
            results: rx,
        });
        inner.state = PlayerState::Loading;
        inner.frame_request = Some(Self::schedule_frame(shared));
        Ok(())
    }

    /// Throw away the pending load and start another for the current tracks
    fn restart_loading(shared: &Arc<Shared>, inner: &mut PlayerInner) {
        if inner.state != PlayerState::Loading {
            return;
        }
        let Some(sample_rate) = inner.device.as_ref().map(|d| d.sample_rate()) else {
            return;
        };
        if let Some(handle) = inner.frame_request.take() {
            shared.ctx.scheduler.cancel(handle);
        }
        inner.pending_load = None;
        if Self::begin_loading(shared, inner, sample_rate).is_err() {
            inner.state = PlayerState::Idle;
        }
    }

    /// Start one looping source per decoded track at the current frame
    fn start_playback(shared: &Arc<Shared>, inner: &mut PlayerInner, buffers: BufferMap) {
        let Some(device) = inner.device.clone() else {
            return;
        };

        let scheduled: Vec<(usize, &TrackId, NodeId)> = inner
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| buffers.contains_key(&t.id))
            .filter_map(|(i, t)| {
                let gain = inner.track_gains.iter().find(|(id, _)| *id == t.id)?.1;
                Some((i, &t.id, gain))
            })
            .collect();

        if scheduled.is_empty() {
            tracing::warn!(loop_id = %shared.loop_id, "No tracks could be loaded");
            inner.state = PlayerState::Idle;
            shared.ctx.coordinator.release_active(&shared.loop_id);
            return;
        }

        Self::apply_gains(inner);

        let mut sources = Vec::with_capacity(scheduled.len());
        let start_frame = {
            let mut graph = device.graph();
            for (_, id, gain) in &scheduled {
                let buffer = Arc::clone(&buffers[*id]);
                let source = graph.create_buffer_source(buffer, true);
                match graph.connect_source(source, *gain) {
                    Ok(()) => sources.push(source),
                    Err(e) => {
                        graph.stop_source(source);
                        tracing::warn!(track = %id, error = %e, "Failed to connect source");
                    }
                }
            }
            let start_frame = device.current_frame();
            if let Err(e) = graph.start_sources(&sources, start_frame) {
                tracing::error!(loop_id = %shared.loop_id, error = %e, "Failed to start sources");
            }
            start_frame
        };

        let coordinator = &shared.ctx.coordinator;
        let points = shared.ctx.peak_points;
        let attach: Vec<usize> = scheduled.iter().map(|(i, _, _)| *i).collect();
        for i in attach {
            let id = &inner.tracks[i].id;
            let buffer = Arc::clone(&buffers[id]);
            let view = &mut inner.views[i];
            view.attach_buffer(&buffer, coordinator, points);
            view.seek_to(0.0);
        }

        tracing::info!(
            loop_id = %shared.loop_id,
            tracks = sources.len(),
            start_frame,
            "Loop playing"
        );

        inner.sources = sources;
        inner.playback_start = Some(start_frame);
        inner.state = PlayerState::Playing;
        inner.frame_request = Some(Self::schedule_frame(shared));
    }

    fn on_frame(shared: &Arc<Shared>) {
        let mut guard = shared.inner.lock();
        let inner = &mut *guard;
        inner.frame_request = None;

        match inner.state {
            PlayerState::Idle => {}
            PlayerState::Playing => {
                Self::update_cursors(inner);
                inner.frame_request = Some(Self::schedule_frame(shared));
            }
            PlayerState::Loading => {
                let Some(pending) = inner.pending_load.as_ref() else {
                    return;
                };
                let received = pending.results.try_recv();
                let current = pending.generation == inner.generation;
                match received {
                    Ok(buffers) if current => {
                        inner.pending_load = None;
                        Self::start_playback(shared, inner, buffers);
                    }
                    Ok(_) => {
                        tracing::debug!(loop_id = %shared.loop_id, "Discarding stale load");
                        inner.pending_load = None;
                    }
                    Err(TryRecvError::Empty) => {
                        inner.frame_request = Some(Self::schedule_frame(shared));
                    }
                    Err(TryRecvError::Disconnected) => {
                        inner.pending_load = None;
                        if current {
                            let buffers = shared.loader.buffers();
                            Self::start_playback(shared, inner, buffers);
                        }
                    }
                }
            }
        }
    }

    fn update_cursors(inner: &mut PlayerInner) {
        let (Some(device), Some(start)) = (inner.device.as_ref(), inner.playback_start) else {
            return;
        };
        let elapsed =
            device.current_frame().saturating_sub(start) as f64 / device.sample_rate() as f64;

        for view in inner.views.iter_mut() {
            if let Some(duration) = view.duration().filter(|d| *d > 0.0) {
                view.seek_to((elapsed % duration) / duration);
            }
        }
    }

    /// Stop sources and any pending load; `release` also frees the active slot
    fn halt(shared: &Arc<Shared>, release: bool) {
        {
            let mut guard = shared.inner.lock();
            let inner = &mut *guard;
            if inner.state == PlayerState::Idle {
                return;
            }

            if let Some(device) = inner.device.as_ref() {
                let mut graph = device.graph();
                for source in inner.sources.drain(..) {
                    graph.stop_source(source);
                }
            }
            inner.sources.clear();

            if let Some(handle) = inner.frame_request.take() {
                shared.ctx.scheduler.cancel(handle);
            }
            inner.pending_load = None;
            inner.generation += 1;
            inner.playback_start = None;
            for view in inner.views.iter_mut() {
                view.seek_to(0.0);
            }
            inner.state = PlayerState::Idle;
        }

        if release {
            shared.ctx.coordinator.release_active(&shared.loop_id);
        }
        tracing::debug!(loop_id = %shared.loop_id, release, "Loop stopped");
    }
}
