//! Output backends - what pulls frames out of the device graph

mod cpal_backend;
pub mod offline;

pub use cpal_backend::{open_default_device, OutputConfig};
pub use offline::OfflineRenderer;
