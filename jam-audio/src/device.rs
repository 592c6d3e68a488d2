//! Output device - graph, clock and backend
//!
//! The device owns the graph all players render into and the clock they
//! schedule against. Backends only decide when frames get pulled.

use crate::graph::AudioGraph;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors from opening or controlling the output device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("No audio output device found")]
    NoDevice,
    #[error("No output device matching '{0}'")]
    NotFound(String),
    #[error("Failed to get audio config: {0}")]
    Config(String),
    #[error("Audio stream error: {0}")]
    Stream(String),
    #[error("Device refused to start: {0}")]
    ResumeRejected(String),
    #[error("Device is closed")]
    Closed,
}

/// Lifecycle of the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// Created but not producing sound
    #[default]
    Suspended,
    Running,
    Closed,
}

/// Frames rendered by the device, the time base for all scheduling
#[derive(Debug)]
pub struct DeviceClock {
    frames: AtomicU64,
    sample_rate: u32,
    running: AtomicBool,
}

impl DeviceClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: AtomicU64::new(0),
            sample_rate: sample_rate.max(1),
            running: AtomicBool::new(false),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }
}

/// What a backend's audio callback renders from
#[derive(Clone)]
pub(crate) struct RenderTarget {
    graph: Arc<Mutex<AudioGraph>>,
    clock: Arc<DeviceClock>,
}

impl RenderTarget {
    pub(crate) fn new(sample_rate: u32) -> Self {
        Self {
            graph: Arc::new(Mutex::new(AudioGraph::new())),
            clock: Arc::new(DeviceClock::new(sample_rate)),
        }
    }

    pub(crate) fn clock(&self) -> &DeviceClock {
        &self.clock
    }

    /// Fill one callback buffer without blocking
    ///
    /// Silent while suspended. On lock contention the block is silent but
    /// the clock still moves, so scheduled sources stay in sync.
    pub(crate) fn render(&self, out: &mut [f32], channels: usize) {
        if !self.clock.is_running() {
            out.fill(0.0);
            return;
        }
        let frames = out.len() / channels.max(1);
        let start = self.clock.frames();
        match self.graph.try_lock() {
            Some(mut graph) => graph.render(out, channels, start),
            None => out.fill(0.0),
        }
        self.clock.advance(frames as u64);
    }

    /// Same as `render` but waits for the graph, for offline use
    pub(crate) fn render_blocking(&self, out: &mut [f32], channels: usize) {
        if !self.clock.is_running() {
            out.fill(0.0);
            return;
        }
        let frames = out.len() / channels.max(1);
        let start = self.clock.frames();
        self.graph.lock().render(out, channels, start);
        self.clock.advance(frames as u64);
    }
}

/// Drives a device's render target
pub trait OutputBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start pulling frames
    fn resume(&self) -> Result<(), DeviceError>;

    /// Stop pulling frames
    fn suspend(&self) -> Result<(), DeviceError>;
}

/// The audio output shared by every loop player
pub struct AudioDevice {
    target: RenderTarget,
    channels: u16,
    backend: Box<dyn OutputBackend>,
    state: Mutex<DeviceState>,
}

/// Shared handle to the output device
pub type DeviceHandle = Arc<AudioDevice>;

impl AudioDevice {
    pub(crate) fn new(target: RenderTarget, channels: u16, backend: Box<dyn OutputBackend>) -> Self {
        Self {
            target,
            channels,
            backend,
            state: Mutex::new(DeviceState::Suspended),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn sample_rate(&self) -> u32 {
        self.target.clock.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Device time in seconds
    pub fn current_time(&self) -> f64 {
        self.target.clock.seconds()
    }

    /// Device time in frames
    pub fn current_frame(&self) -> u64 {
        self.target.clock.frames()
    }

    pub fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    /// Start output; the clock advances from here on
    pub fn resume(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        match *state {
            DeviceState::Running => return Ok(()),
            DeviceState::Closed => return Err(DeviceError::Closed),
            DeviceState::Suspended => {}
        }

        self.backend.resume()?;
        self.target.clock.set_running(true);
        *state = DeviceState::Running;
        tracing::info!(backend = self.backend.name(), "Audio device resumed");
        Ok(())
    }

    /// Pause output; the clock holds still
    pub fn suspend(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        match *state {
            DeviceState::Suspended => return Ok(()),
            DeviceState::Closed => return Err(DeviceError::Closed),
            DeviceState::Running => {}
        }

        self.target.clock.set_running(false);
        self.backend.suspend()?;
        *state = DeviceState::Suspended;
        tracing::info!(backend = self.backend.name(), "Audio device suspended");
        Ok(())
    }

    /// Stop output for good
    pub fn close(&self) {
        let mut state = self.state.lock();
        if *state == DeviceState::Closed {
            return;
        }
        self.target.clock.set_running(false);
        if let Err(e) = self.backend.suspend() {
            tracing::warn!(error = %e, "Failed to stop output while closing");
        }
        *state = DeviceState::Closed;
    }

    /// Lock the graph for a batch of changes
    ///
    /// Keep the guard short; the audio callback skips a block while it is
    /// held.
    pub fn graph(&self) -> MutexGuard<'_, AudioGraph> {
        self.target.graph.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_only_advances_while_running() {
        let target = RenderTarget::new(48000);
        let mut out = vec![0.5; 256];

        target.render(&mut out, 2);
        assert_eq!(target.clock().frames(), 0);
        assert!(out.iter().all(|&s| s == 0.0));

        target.clock.set_running(true);
        target.render(&mut out, 2);
        target.render_blocking(&mut out, 2);
        assert_eq!(target.clock().frames(), 256);
        assert!((target.clock().seconds() - 256.0 / 48000.0).abs() < 1e-12);
    }

    #[test]
    fn test_contention_renders_silence_but_advances() {
        let target = RenderTarget::new(48000);
        target.clock.set_running(true);
        let _held = target.graph.lock();

        let mut out = vec![0.5; 64];
        target.render(&mut out, 2);

        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(target.clock().frames(), 32);
    }
}
