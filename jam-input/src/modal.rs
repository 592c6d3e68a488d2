//! Modal state machine for vim-style input handling

use crate::commands::{Command, VOLUME_STEP};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Input modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Command,
    Help,
}

impl Mode {
    /// Get display name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Command => "COMMAND",
            Mode::Help => "HELP",
        }
    }
}

/// Handles keyboard input and converts to commands
pub struct InputHandler {
    mode: Mode,
    command_buffer: String,
}

impl InputHandler {
    pub fn new() -> Self {
        Self {
            mode: Mode::Normal,
            command_buffer: String::new(),
        }
    }

    /// Get current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Get current command buffer (for display)
    pub fn command_buffer(&self) -> &str {
        &self.command_buffer
    }

    /// Handle a key event and return a command if applicable
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        match self.mode {
            Mode::Normal => self.handle_normal_mode(key),
            Mode::Command => self.handle_command_mode(key),
            Mode::Help => self.handle_help_mode(key),
        }
    }

    fn handle_normal_mode(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            // Mode switching
            KeyCode::Char(':') => {
                self.mode = Mode::Command;
                self.command_buffer.clear();
                Some(Command::EnterCommandMode)
            }
            KeyCode::Char('?') => {
                self.mode = Mode::Help;
                Some(Command::ToggleHelp)
            }

            // Loop / track selection
            KeyCode::Char('j') | KeyCode::Down => Some(Command::SelectNextLoop),
            KeyCode::Char('k') | KeyCode::Up => Some(Command::SelectPrevLoop),
            KeyCode::Char('l') | KeyCode::Right => Some(Command::SelectNextTrack),
            KeyCode::Char('h') | KeyCode::Left => Some(Command::SelectPrevTrack),

            // Transport
            KeyCode::Char(' ') | KeyCode::Enter => Some(Command::TogglePlay),
            KeyCode::Char('x') => Some(Command::StopAll),

            // Mixing
            KeyCode::Char('m') => Some(Command::ToggleTrackMute),
            KeyCode::Char('s') => Some(Command::ToggleTrackSolo),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Command::AdjustVolume(VOLUME_STEP)),
            KeyCode::Char('-') | KeyCode::Char('_') => Some(Command::AdjustVolume(-VOLUME_STEP)),
            KeyCode::Char('M') => Some(Command::ToggleMasterMute),

            KeyCode::Char('r') => Some(Command::Reload),

            // Quit
            KeyCode::Char('q') => Some(Command::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Command::Quit)
            }

            _ => None,
        }
    }

    fn handle_command_mode(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Enter => {
                let cmd = self.parse_command();
                self.mode = Mode::Normal;
                let buffer = std::mem::take(&mut self.command_buffer);
                cmd.or(Some(Command::ExecuteCommand(buffer)))
            }
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.command_buffer.clear();
                Some(Command::EnterNormalMode)
            }
            KeyCode::Backspace => {
                self.command_buffer.pop();
                if self.command_buffer.is_empty() {
                    self.mode = Mode::Normal;
                    Some(Command::EnterNormalMode)
                } else {
                    None
                }
            }
            KeyCode::Char(c) => {
                self.command_buffer.push(c);
                None
            }
            _ => None,
        }
    }

    fn parse_command(&self) -> Option<Command> {
        let input = self.command_buffer.trim();

        match input {
            "q" | "quit" => return Some(Command::Quit),
            "stop" => return Some(Command::StopAll),
            "reload" => return Some(Command::Reload),
            "help" => return Some(Command::ToggleHelp),
            _ => {}
        }

        if let Some(name) = input.strip_prefix("theme ") {
            let name = name.trim();
            if !name.is_empty() {
                return Some(Command::SetTheme(name.to_string()));
            }
        }

        if let Some(path) = input.strip_prefix("open ") {
            let path = path.trim();
            let path = if (path.starts_with('\'') && path.ends_with('\'') && path.len() >= 2)
                || (path.starts_with('"') && path.ends_with('"') && path.len() >= 2)
            {
                &path[1..path.len() - 1]
            } else {
                path
            };

            if !path.is_empty() {
                return Some(Command::OpenManifest(path.into()));
            }
        }

        None
    }

    fn handle_help_mode(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
                self.mode = Mode::Normal;
                Some(Command::ToggleHelp)
            }
            _ => None,
        }
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}
