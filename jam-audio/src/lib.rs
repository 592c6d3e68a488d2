//! Audio engine for jam - device, graph, and loop players
//!
//! This module provides the playback pipeline:
//! - Graph: gain and looping buffer-source nodes mixed to the device
//! - Device: output clock and backends (cpal, offline)
//! - Session: lazily opened process-wide device handle
//! - Coordinator: one active loop at a time, shared peak cache
//! - Player: per-loop state machine with mute/solo/volume
//! - Waveform: per-track peak view with a playback cursor

mod backend;
mod coordinator;
mod device;
mod graph;
mod mix;
mod player;
mod scheduler;
mod session;
mod waveform;

pub use backend::{offline, open_default_device, OfflineRenderer, OutputConfig};
pub use coordinator::{PeakCache, PlaybackCoordinator, StopCallback};
pub use device::{AudioDevice, DeviceClock, DeviceError, DeviceHandle, DeviceState, OutputBackend};
pub use graph::{AudioGraph, GraphError, NodeId, Output};
pub use mix::{MixState, TrackMix};
pub use player::{LoopPlayer, LoopSnapshot, PlayerContext, PlayerError, PlayerState, TrackSnapshot};
pub use scheduler::{FrameHandle, FrameScheduler};
pub use session::AudioDeviceSession;
pub use waveform::WaveformView;
