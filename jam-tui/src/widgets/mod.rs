//! UI widgets for jam

mod loop_panel;
mod status_bar;
mod waveform;

pub use loop_panel::{LoopListWidget, LoopPanelWidget};
pub use status_bar::{HelpWidget, StatusBarWidget};
pub use waveform::WaveformWidget;
