//! Command definitions for jam

use std::path::PathBuf;

/// Volume step for a single key press
pub const VOLUME_STEP: f32 = 0.05;

/// Actions produced by the input handler
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Navigation
    SelectNextLoop,
    SelectPrevLoop,
    SelectNextTrack,
    SelectPrevTrack,

    // Transport
    TogglePlay,
    StopAll,

    // Mixing (selected track / selected loop)
    ToggleTrackMute,
    ToggleTrackSolo,
    AdjustVolume(f32),
    ToggleMasterMute,

    // Sources
    Reload,
    OpenManifest(PathBuf),

    // Modes
    EnterCommandMode,
    EnterNormalMode,
    ExecuteCommand(String),
    ToggleHelp,
    SetTheme(String),

    Quit,
}
