//! Application state for the terminal front end

use crate::theme::Theme;
use jam_audio::{LoopSnapshot, TrackSnapshot};
use jam_input::Mode;
use jam_library::TrackId;

/// Severity of the status bar message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// Everything the UI draws, refreshed from the players once per frame
#[derive(Debug, Default)]
pub struct AppState {
    /// Jam title from the manifest
    pub title: Option<String>,
    pub loops: Vec<LoopSnapshot>,
    pub selected_loop: usize,
    pub selected_track: usize,

    pub mode: Mode,
    pub command_buffer: String,
    pub message: Option<String>,
    pub message_type: MessageType,
    pub show_help: bool,
    pub help_scroll: u16,

    pub theme: Theme,
    pub frame_count: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the loop snapshots, keeping the selection in range
    pub fn set_loops(&mut self, loops: Vec<LoopSnapshot>) {
        self.loops = loops;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        self.selected_loop = self.selected_loop.min(self.loops.len().saturating_sub(1));
        let tracks = self.selected().map_or(0, |l| l.tracks.len());
        self.selected_track = self.selected_track.min(tracks.saturating_sub(1));
    }

    pub fn selected(&self) -> Option<&LoopSnapshot> {
        self.loops.get(self.selected_loop)
    }

    pub fn selected_track(&self) -> Option<&TrackSnapshot> {
        self.selected()
            .and_then(|l| l.tracks.get(self.selected_track))
    }

    pub fn selected_track_id(&self) -> Option<&TrackId> {
        self.selected_track().map(|t| &t.id)
    }

    pub fn select_next_loop(&mut self) {
        if self.selected_loop + 1 < self.loops.len() {
            self.selected_loop += 1;
            self.selected_track = 0;
        }
    }

    pub fn select_prev_loop(&mut self) {
        if self.selected_loop > 0 {
            self.selected_loop -= 1;
            self.selected_track = 0;
        }
    }

    pub fn select_next_track(&mut self) {
        let tracks = self.selected().map_or(0, |l| l.tracks.len());
        if self.selected_track + 1 < tracks {
            self.selected_track += 1;
        }
    }

    pub fn select_prev_track(&mut self) {
        self.selected_track = self.selected_track.saturating_sub(1);
    }

    /// Set current mode
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        if mode != Mode::Command {
            self.command_buffer.clear();
        }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
        if self.show_help {
            self.help_scroll = 0;
        }
    }

    pub fn help_scroll_up(&mut self) {
        self.help_scroll = self.help_scroll.saturating_sub(3);
    }

    pub fn help_scroll_down(&mut self) {
        self.help_scroll = self.help_scroll.saturating_add(3);
    }

    /// Set theme by name
    pub fn set_theme(&mut self, name: &str) {
        match Theme::by_name(name) {
            Some(theme) => {
                self.theme = theme;
                self.set_success(format!("Theme set to: {}", self.theme.name));
            }
            None => self.set_error(format!("Unknown theme: {}. Use studio/amber", name)),
        }
    }

    pub fn clear_message(&mut self) {
        self.message = None;
        self.message_type = MessageType::Info;
    }

    pub fn set_message(&mut self, msg: impl Into<String>) {
        self.message = Some(msg.into());
        self.message_type = MessageType::Info;
    }

    pub fn set_success(&mut self, msg: impl Into<String>) {
        self.message = Some(msg.into());
        self.message_type = MessageType::Success;
    }

    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.message = Some(msg.into());
        self.message_type = MessageType::Warning;
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.message = Some(msg.into());
        self.message_type = MessageType::Error;
    }
}

/// Main application wrapper
#[derive(Debug, Default)]
pub struct App {
    pub state: AppState,
    pub should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jam_audio::{PlayerState, TrackMix};
    use jam_library::LoopId;

    pub(crate) fn track(id: &str) -> TrackSnapshot {
        TrackSnapshot {
            id: TrackId::from(id),
            label: id.to_string(),
            playable: true,
            loaded: false,
            mix: TrackMix::default(),
            cursor: 0.0,
            peaks: None,
        }
    }

    pub(crate) fn snapshot(id: &str, tracks: &[&str]) -> LoopSnapshot {
        LoopSnapshot {
            loop_id: LoopId::from(id),
            name: None,
            state: PlayerState::Idle,
            master_muted: false,
            tracks: tracks.iter().map(|t| track(t)).collect(),
        }
    }

    #[test]
    fn test_loop_and_track_navigation() {
        let mut state = AppState::new();
        state.set_loops(vec![snapshot("a", &["a1", "a2", "a3"]), snapshot("b", &["b1"])]);

        state.select_next_track();
        state.select_next_track();
        state.select_next_track();
        assert_eq!(state.selected_track_id(), Some(&TrackId::from("a3")));

        state.select_next_loop();
        assert_eq!(state.selected_track_id(), Some(&TrackId::from("b1")));
        state.select_next_loop();
        assert_eq!(state.selected_loop, 1);

        state.select_prev_loop();
        state.select_prev_loop();
        state.select_prev_track();
        assert_eq!(state.selected_track_id(), Some(&TrackId::from("a1")));
    }

    #[test]
    fn test_set_loops_clamps_selection() {
        let mut state = AppState::new();
        state.set_loops(vec![snapshot("a", &["a1"]), snapshot("b", &["b1", "b2"])]);
        state.select_next_loop();
        state.select_next_track();

        state.set_loops(vec![snapshot("a", &["a1"])]);
        assert_eq!(state.selected_loop, 0);
        assert_eq!(state.selected_track, 0);

        state.set_loops(Vec::new());
        assert!(state.selected().is_none());
        assert!(state.selected_track_id().is_none());
    }

    #[test]
    fn test_set_theme() {
        let mut state = AppState::new();
        state.set_theme("amber");
        assert_eq!(state.theme.name, "amber");
        assert_eq!(state.message_type, MessageType::Success);

        state.set_theme("plaid");
        assert_eq!(state.theme.name, "amber");
        assert_eq!(state.message_type, MessageType::Error);
    }

    #[test]
    fn test_set_mode_clears_command_buffer() {
        let mut state = AppState::new();
        state.set_mode(Mode::Command);
        state.command_buffer.push_str("open");
        state.set_mode(Mode::Normal);
        assert!(state.command_buffer.is_empty());
    }
}
