//! Lazily opened, process-wide output device

use crate::device::{DeviceError, DeviceHandle};
use parking_lot::Mutex;

type DeviceFactory = Box<dyn Fn() -> Result<DeviceHandle, DeviceError> + Send + Sync>;

/// Opens the output device on first use and hands out the same handle
///
/// Opening is deferred to the first `get`, which should come from a user
/// action. A failed open is not remembered, so the next action retries.
pub struct AudioDeviceSession {
    factory: DeviceFactory,
    handle: Mutex<Option<DeviceHandle>>,
}

impl AudioDeviceSession {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<DeviceHandle, DeviceError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            handle: Mutex::new(None),
        }
    }

    /// Session around an already opened device
    pub fn with_device(device: DeviceHandle) -> Self {
        let session = Self::new(move || Err(DeviceError::Closed));
        *session.handle.lock() = Some(device);
        session
    }

    /// The device, opening it if needed
    pub fn get(&self) -> Result<DeviceHandle, DeviceError> {
        let mut handle = self.handle.lock();
        if let Some(device) = handle.as_ref() {
            return Ok(DeviceHandle::clone(device));
        }

        let device = (self.factory)().map_err(|e| {
            tracing::warn!(error = %e, "Failed to open audio device");
            e
        })?;
        *handle = Some(DeviceHandle::clone(&device));
        Ok(device)
    }

    /// The device if it has been opened
    pub fn current(&self) -> Option<DeviceHandle> {
        self.handle.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::offline;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_device_opened_once() {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let session = AudioDeviceSession::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(offline::open(48000).0)
        });

        assert!(session.current().is_none());
        let a = session.get().unwrap();
        let b = session.get().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert!(session.current().is_some());
    }

    #[test]
    fn test_failed_open_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let session = AudioDeviceSession::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DeviceError::NoDevice)
            } else {
                Ok(offline::open(48000).0)
            }
        });

        assert_eq!(session.get().err(), Some(DeviceError::NoDevice));
        assert!(session.current().is_none());
        assert!(session.get().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
