//! Offline backend - a device whose clock moves only when asked
//!
//! Renders the graph on demand instead of from a hardware callback. Used
//! for headless rendering and for driving the engine deterministically.

use crate::device::{AudioDevice, DeviceClock, DeviceError, DeviceHandle, OutputBackend, RenderTarget};
use parking_lot::Mutex;
use std::sync::Arc;

/// Frames rendered per block when advancing time
const BLOCK_FRAMES: usize = 512;

type ResumeFailure = Arc<Mutex<Option<String>>>;

struct OfflineBackend {
    resume_failure: ResumeFailure,
}

impl OutputBackend for OfflineBackend {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn resume(&self) -> Result<(), DeviceError> {
        match self.resume_failure.lock().clone() {
            Some(reason) => Err(DeviceError::ResumeRejected(reason)),
            None => Ok(()),
        }
    }

    fn suspend(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Pulls frames out of an offline device
pub struct OfflineRenderer {
    target: RenderTarget,
    channels: usize,
    resume_failure: ResumeFailure,
}

impl OfflineRenderer {
    pub fn clock(&self) -> &DeviceClock {
        self.target.clock()
    }

    /// Render `frames` interleaved stereo frames
    ///
    /// While the device is suspended this returns silence and time stands
    /// still.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * self.channels];
        for block in out.chunks_mut(BLOCK_FRAMES * self.channels) {
            self.target.render_blocking(block, self.channels);
        }
        out
    }

    /// Render and discard `secs` seconds of output
    pub fn advance_secs(&self, secs: f64) {
        let total = (secs.max(0.0) * self.clock().sample_rate() as f64).round() as usize;
        let mut block = vec![0.0; BLOCK_FRAMES * self.channels];
        let mut remaining = total;
        while remaining > 0 {
            let frames = remaining.min(BLOCK_FRAMES);
            self.target
                .render_blocking(&mut block[..frames * self.channels], self.channels);
            remaining -= frames;
        }
    }

    /// Make the next `resume` calls fail with `reason`, or succeed again
    pub fn fail_resume(&self, reason: Option<&str>) {
        *self.resume_failure.lock() = reason.map(str::to_string);
    }
}

/// Open a stereo offline device at `sample_rate`
pub fn open(sample_rate: u32) -> (DeviceHandle, OfflineRenderer) {
    let target = RenderTarget::new(sample_rate);
    let resume_failure: ResumeFailure = Arc::new(Mutex::new(None));

    let backend = OfflineBackend {
        resume_failure: Arc::clone(&resume_failure),
    };
    let device = Arc::new(AudioDevice::new(target.clone(), 2, Box::new(backend)));

    let renderer = OfflineRenderer {
        target,
        channels: 2,
        resume_failure,
    };
    (device, renderer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::graph::Output;
    use jam_library::DecodedBuffer;

    #[test]
    fn test_offline_clock_follows_rendering() {
        let (device, renderer) = open(48000);
        assert_eq!(device.state(), DeviceState::Suspended);

        renderer.advance_secs(1.0);
        assert_eq!(device.current_frame(), 0);

        device.resume().unwrap();
        renderer.advance_secs(0.5);
        assert_eq!(device.current_frame(), 24000);
        assert!((device.current_time() - 0.5).abs() < 1e-9);

        device.suspend().unwrap();
        renderer.advance_secs(0.5);
        assert_eq!(device.current_frame(), 24000);
    }

    #[test]
    fn test_rejected_resume_stays_suspended() {
        let (device, renderer) = open(44100);
        renderer.fail_resume(Some("not allowed"));

        assert_eq!(
            device.resume(),
            Err(DeviceError::ResumeRejected("not allowed".into()))
        );
        assert_eq!(device.state(), DeviceState::Suspended);

        renderer.fail_resume(None);
        device.resume().unwrap();
        assert_eq!(device.state(), DeviceState::Running);
    }

    #[test]
    fn test_closed_device_refuses_resume() {
        let (device, _renderer) = open(48000);
        device.resume().unwrap();
        device.close();
        assert_eq!(device.state(), DeviceState::Closed);
        assert_eq!(device.resume(), Err(DeviceError::Closed));
    }

    #[test]
    fn test_renders_graph_output() {
        let (device, renderer) = open(48000);
        {
            let mut graph = device.graph();
            let gain = graph.create_gain(0.5);
            graph.connect_gain(gain, Output::Destination).unwrap();
            let buffer = Arc::new(DecodedBuffer::from_interleaved(vec![0.4; 2000], 48000));
            let source = graph.create_buffer_source(buffer, true);
            graph.connect_source(source, gain).unwrap();
            graph.start_sources(&[source], 0).unwrap();
        }
        device.resume().unwrap();

        let out = renderer.render_frames(1500);
        assert_eq!(out.len(), 3000);
        assert!(out.iter().all(|&s| (s - 0.2).abs() < 1e-6));
    }
}
