//! cpal output backend
//!
//! cpal streams are not `Send`, so the stream lives on its own thread and
//! is paused and played through a command channel.

use crate::device::{AudioDevice, DeviceError, DeviceHandle, OutputBackend, RenderTarget};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long control calls wait for the audio thread
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Output device selection
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Substring of the device name, default output device if `None`
    pub device_name: Option<String>,
    /// Fixed buffer size in frames, driver default if `None`
    pub buffer_size: Option<u32>,
}

type Reply = Sender<Result<(), DeviceError>>;

enum StreamCommand {
    Play(Reply),
    Pause(Reply),
    Shutdown,
}

struct CpalBackend {
    commands: Sender<StreamCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalBackend {
    fn round_trip(&self, make: impl FnOnce(Reply) -> StreamCommand) -> Result<(), DeviceError> {
        let (tx, rx) = bounded(1);
        self.commands.send(make(tx)).map_err(|_| DeviceError::Closed)?;
        rx.recv_timeout(COMMAND_TIMEOUT)
            .map_err(|_| DeviceError::Stream("audio thread not responding".into()))?
    }
}

impl OutputBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn resume(&self) -> Result<(), DeviceError> {
        self.round_trip(StreamCommand::Play)
    }

    fn suspend(&self) -> Result<(), DeviceError> {
        self.round_trip(StreamCommand::Pause)
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        let _ = self.commands.send(StreamCommand::Shutdown);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

fn find_output_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    match name {
        Some(search) => {
            let search_lower = search.to_lowercase();
            let devices = host
                .output_devices()
                .map_err(|e| DeviceError::Config(e.to_string()))?;

            for device in devices {
                if let Ok(dev_name) = device.name() {
                    if dev_name.to_lowercase().contains(&search_lower) {
                        return Ok(device);
                    }
                }
            }
            Err(DeviceError::NotFound(search.to_string()))
        }
        None => host.default_output_device().ok_or(DeviceError::NoDevice),
    }
}

/// Open an output device through cpal, initially suspended
pub fn open_default_device(config: &OutputConfig) -> Result<DeviceHandle, DeviceError> {
    let host = cpal::default_host();
    let device = find_output_device(&host, config.device_name.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".into());

    let supported = device
        .default_output_config()
        .map_err(|e| DeviceError::Config(e.to_string()))?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();

    let mut stream_config: cpal::StreamConfig = supported.into();
    if let Some(size) = config.buffer_size {
        stream_config.buffer_size = cpal::BufferSize::Fixed(size);
    }

    let target = RenderTarget::new(sample_rate);
    let callback_target = target.clone();

    let (cmd_tx, cmd_rx) = unbounded();
    let (ready_tx, ready_rx) = bounded(1);

    let handle = thread::Builder::new()
        .name("jam-audio".into())
        .spawn(move || run_stream_thread(device, stream_config, callback_target, cmd_rx, ready_tx))
        .map_err(|e| DeviceError::Stream(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let _ = handle.join();
            return Err(e);
        }
        Err(_) => {
            let _ = handle.join();
            return Err(DeviceError::Stream("audio thread exited".into()));
        }
    }

    tracing::info!(
        host = host.id().name(),
        device = %device_name,
        sample_rate,
        channels,
        "Output device opened"
    );

    let backend = CpalBackend {
        commands: cmd_tx,
        thread: Mutex::new(Some(handle)),
    };
    Ok(Arc::new(AudioDevice::new(target, channels, Box::new(backend))))
}

fn run_stream_thread(
    device: cpal::Device,
    config: cpal::StreamConfig,
    target: RenderTarget,
    commands: Receiver<StreamCommand>,
    ready: Sender<Result<(), DeviceError>>,
) {
    let channels = config.channels as usize;

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            target.render(data, channels);
        },
        |err| {
            tracing::error!(error = %err, "Audio stream error");
        },
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(DeviceError::Stream(e.to_string())));
            return;
        }
    };

    // Some hosts start streams on creation
    let _ = stream.pause();
    let _ = ready.send(Ok(()));

    for command in commands.iter() {
        match command {
            StreamCommand::Play(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| DeviceError::ResumeRejected(e.to_string()));
                let _ = reply.send(result);
            }
            StreamCommand::Pause(reply) => {
                let result = stream.pause().map_err(|e| DeviceError::Stream(e.to_string()));
                let _ = reply.send(result);
            }
            StreamCommand::Shutdown => break,
        }
    }

    tracing::debug!("Audio thread exiting");
}
