//! Status bar widget - mode indicator and command line

use crate::app::MessageType;
use crate::theme::Theme;
use jam_input::Mode;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget},
};

/// Widget for displaying the status bar with mode and command input
pub struct StatusBarWidget<'a> {
    mode: Mode,
    command_buffer: &'a str,
    message: Option<&'a str>,
    message_type: MessageType,
    theme: &'a Theme,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(mode: Mode, command_buffer: &'a str, theme: &'a Theme) -> Self {
        Self {
            mode,
            command_buffer,
            message: None,
            message_type: MessageType::Info,
            theme,
        }
    }

    pub fn message(mut self, msg: Option<&'a str>, msg_type: MessageType) -> Self {
        self.message = msg;
        self.message_type = msg_type;
        self
    }

    fn mode_style(&self) -> Style {
        match self.mode {
            Mode::Normal | Mode::Help => self.theme.highlight(),
            Mode::Command => Style::from(self.theme.accent),
        }
    }
}

impl Widget for StatusBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 {
            return;
        }

        let [mode_area, content_area, hint_area] = Layout::horizontal([
            Constraint::Length(10),
            Constraint::Min(20),
            Constraint::Length(24),
        ])
        .areas(area);

        let mode_line = Line::from(vec![
            Span::raw("["),
            Span::styled(self.mode.display_name(), self.mode_style()),
            Span::raw("]"),
        ]);
        Paragraph::new(mode_line).render(mode_area, buf);

        let content = if self.mode == Mode::Command {
            Line::from(vec![
                Span::styled(":", Style::from(self.theme.accent)),
                Span::styled(self.command_buffer, self.theme.normal()),
                Span::styled("█", self.theme.highlight()),
            ])
        } else if let Some(msg) = self.message {
            let msg_style = match self.message_type {
                MessageType::Info => self.theme.dim(),
                MessageType::Success => Style::from(self.theme.accent),
                MessageType::Warning => Style::default().fg(self.theme.warning),
                MessageType::Error => Style::default().fg(self.theme.danger),
            };
            Line::from(Span::styled(msg, msg_style))
        } else {
            Line::from(Span::styled(
                "Ready. Press ? for help, : for commands",
                self.theme.dim(),
            ))
        };
        Paragraph::new(content).render(content_area, buf);

        let hint = match self.mode {
            Mode::Normal => "space:play  x:stop  ?:help",
            Mode::Command => "Enter:run  Esc:cancel",
            Mode::Help => "Esc:close help",
        };
        Paragraph::new(Line::from(Span::styled(hint, self.theme.dim()))).render(hint_area, buf);
    }
}

/// Key bindings shown in the help overlay; an empty key starts a section
const HELP_ENTRIES: &[(&str, &str)] = &[
    ("", "NAVIGATION"),
    ("j / k  ↓ / ↑", "Select next / previous loop"),
    ("l / h  → / ←", "Select next / previous track"),
    ("", "TRANSPORT"),
    ("space / Enter", "Play or stop the selected loop"),
    ("x", "Stop every loop"),
    ("r", "Re-read the jam and refetch audio"),
    ("", "MIXING"),
    ("m", "Mute selected track"),
    ("s", "Solo selected track"),
    ("+ / -", "Track volume up / down"),
    ("M", "Master mute for the loop"),
    ("", "COMMANDS"),
    (":open <path>", "Open a jam manifest"),
    (":theme <name>", "studio / amber"),
    (":reload", "Same as r"),
    (":stop", "Same as x"),
    (":q", "Quit"),
];

/// Help overlay widget with scrolling support
pub struct HelpWidget<'a> {
    theme: &'a Theme,
    scroll: u16,
}

impl<'a> HelpWidget<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self { theme, scroll: 0 }
    }

    pub fn scroll(mut self, scroll: u16) -> Self {
        self.scroll = scroll;
        self
    }

    fn lines(&self) -> Vec<Line<'static>> {
        HELP_ENTRIES
            .iter()
            .map(|(key, text)| {
                if key.is_empty() {
                    Line::from(Span::styled(*text, self.theme.title()))
                } else {
                    Line::from(vec![
                        Span::styled(format!("  {:<16}", key), Style::from(self.theme.accent)),
                        Span::styled(*text, self.theme.normal()),
                    ])
                }
            })
            .collect()
    }
}

impl Widget for HelpWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered()
            .title(" HELP ")
            .title_style(self.theme.title())
            .title_bottom(Line::from(" Esc or ? to close ").right_aligned())
            .border_style(self.theme.border_active())
            .style(self.theme.normal());
        let inner = block.inner(area);

        let lines = self.lines();
        let max_scroll = (lines.len() as u16).saturating_sub(inner.height);
        let scroll = self.scroll.min(max_scroll);

        Paragraph::new(lines)
            .block(block)
            .scroll((scroll, 0))
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    #[test]
    fn test_command_mode_shows_buffer() {
        let theme = Theme::default();
        let area = Rect::new(0, 0, 80, 1);
        let mut buf = Buffer::empty(area);
        StatusBarWidget::new(Mode::Command, "open jam.json", &theme)
            .message(Some("ignored"), MessageType::Info)
            .render(area, &mut buf);

        let text = row_text(&buf, 0);
        assert!(text.contains("[COMMAND]"));
        assert!(text.contains(":open jam.json"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn test_error_message_style() {
        let theme = Theme::default();
        let area = Rect::new(0, 0, 80, 1);
        let mut buf = Buffer::empty(area);
        StatusBarWidget::new(Mode::Normal, "", &theme)
            .message(Some("Device unavailable"), MessageType::Error)
            .render(area, &mut buf);

        assert!(row_text(&buf, 0).contains("Device unavailable"));
        assert_eq!(buf[(10, 0)].fg, theme.danger);
    }

    #[test]
    fn test_help_scroll_is_clamped() {
        let theme = Theme::default();
        let area = Rect::new(0, 0, 60, 6);
        let mut buf = Buffer::empty(area);
        HelpWidget::new(&theme).scroll(500).render(area, &mut buf);

        // Four inner rows show the last four entries
        assert!(row_text(&buf, 4).contains(":q"));
        assert!(row_text(&buf, 1).contains(":theme"));
        assert!(row_text(&buf, 5).contains("Esc or ? to close"));
    }
}
