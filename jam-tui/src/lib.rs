//! Terminal UI for jam - widgets, themes, and layout

mod app;
mod theme;
pub mod widgets;

pub use app::{App, AppState, MessageType};
pub use theme::{Theme, AMBER, STUDIO};
pub use widgets::{HelpWidget, LoopListWidget, LoopPanelWidget, StatusBarWidget, WaveformWidget};
