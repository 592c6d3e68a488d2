//! Loop widgets - the loop list and the selected loop's track panel

use crate::theme::Theme;
use crate::widgets::WaveformWidget;
use jam_audio::{LoopSnapshot, PlayerState, TrackSnapshot};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Width of the track info column (label, badges, volume)
const INFO_WIDTH: u16 = 28;

/// Maximum rows given to one track's waveform
const MAX_TRACK_ROWS: u16 = 3;

fn state_label(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Idle => "STOPPED",
        PlayerState::Loading => "LOADING",
        PlayerState::Playing => "PLAYING",
    }
}

fn state_style(theme: &Theme, state: PlayerState) -> Style {
    match state {
        PlayerState::Idle => theme.dim(),
        PlayerState::Loading => Style::default().fg(theme.warning),
        PlayerState::Playing => Style::default().fg(theme.accent),
    }
}

fn loop_title(snapshot: &LoopSnapshot) -> String {
    snapshot
        .name
        .clone()
        .unwrap_or_else(|| snapshot.loop_id.to_string())
}

/// Format a linear volume as a percentage
pub(crate) fn format_volume(volume: f32) -> String {
    format!("{:>3}%", (volume.clamp(0.0, 1.0) * 100.0).round() as u32)
}

/// Truncate to `width` characters, marking the cut with an ellipsis
pub(crate) fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        format!("{:<width$}", text)
    } else if width == 0 {
        String::new()
    } else {
        let cut: String = text.chars().take(width - 1).collect();
        format!("{}…", cut)
    }
}

/// List of every loop in the jam with its playback state
pub struct LoopListWidget<'a> {
    loops: &'a [LoopSnapshot],
    selected: usize,
    theme: &'a Theme,
    title: Option<&'a str>,
}

impl<'a> LoopListWidget<'a> {
    pub fn new(loops: &'a [LoopSnapshot], selected: usize, theme: &'a Theme) -> Self {
        Self {
            loops,
            selected,
            theme,
            title: None,
        }
    }

    pub fn title(mut self, title: Option<&'a str>) -> Self {
        self.title = title;
        self
    }
}

impl Widget for LoopListWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(format!(" {} ", self.title.unwrap_or("LOOPS")))
            .title_style(self.theme.title())
            .borders(Borders::ALL)
            .border_style(self.theme.border())
            .style(self.theme.normal());
        let inner = block.inner(area);
        block.render(area, buf);

        if self.loops.is_empty() {
            Paragraph::new(Span::styled("No loops", self.theme.dim())).render(inner, buf);
            return;
        }

        // Keep the selection visible
        let visible = inner.height as usize;
        let offset = (self.selected + 1).saturating_sub(visible);
        let name_width = (inner.width as usize).saturating_sub(3);

        let lines: Vec<Line> = self
            .loops
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .map(|(i, snapshot)| {
                let marker = match snapshot.state {
                    PlayerState::Playing => "▶ ",
                    PlayerState::Loading => "… ",
                    PlayerState::Idle => "  ",
                };
                let name = fit(&loop_title(snapshot), name_width);
                if i == self.selected {
                    Line::from(Span::styled(format!("{}{}", marker, name), self.theme.highlight()))
                } else {
                    Line::from(vec![
                        Span::styled(marker, state_style(self.theme, snapshot.state)),
                        Span::styled(name, self.theme.normal()),
                    ])
                }
            })
            .collect();

        Paragraph::new(lines).render(inner, buf);
    }
}

/// Tracks of one loop: label, mute/solo badges, volume and waveform
pub struct LoopPanelWidget<'a> {
    snapshot: &'a LoopSnapshot,
    theme: &'a Theme,
    selected_track: Option<usize>,
    focused: bool,
}

impl<'a> LoopPanelWidget<'a> {
    pub fn new(snapshot: &'a LoopSnapshot, theme: &'a Theme) -> Self {
        Self {
            snapshot,
            theme,
            selected_track: None,
            focused: false,
        }
    }

    pub fn selected_track(mut self, index: Option<usize>) -> Self {
        self.selected_track = index;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    fn title_line(&self) -> Line<'a> {
        let state = self.snapshot.state;
        let mut spans = vec![
            Span::styled(format!(" {} ", loop_title(self.snapshot)), self.theme.title()),
            Span::styled(format!("[{}]", state_label(state)), state_style(self.theme, state)),
        ];
        if self.snapshot.master_muted {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(" MASTER MUTED ", self.theme.badge_on(self.theme.danger)));
        }
        spans.push(Span::raw(" "));
        Line::from(spans)
    }

    fn info_line(&self, track: &TrackSnapshot, selected: bool) -> Line<'a> {
        let theme = self.theme;
        let label_style = if selected {
            theme.highlight()
        } else if track.playable {
            theme.normal()
        } else {
            theme.dim()
        };
        let label_width = INFO_WIDTH as usize - 12;
        let mut spans = vec![Span::styled(fit(&track.label, label_width), label_style)];

        if !track.playable {
            spans.push(Span::styled(" no audio", theme.dim()));
            return Line::from(spans);
        }

        let badge = |on: bool, text: &'static str, color| {
            if on {
                Span::styled(text, theme.badge_on(color))
            } else {
                Span::styled(text, theme.dim())
            }
        };
        spans.push(Span::raw(" "));
        spans.push(badge(track.mix.muted, "M", theme.danger));
        spans.push(badge(track.mix.soloed, "S", theme.warning));
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format_volume(track.mix.volume), theme.normal()));
        Line::from(spans)
    }
}

impl Widget for LoopPanelWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.focused {
            self.theme.border_active()
        } else {
            self.theme.border()
        };
        let block = Block::default()
            .title(self.title_line())
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(self.theme.normal());
        let inner = block.inner(area);
        block.render(area, buf);

        let tracks = &self.snapshot.tracks;
        if tracks.is_empty() || inner.height == 0 {
            Paragraph::new(Span::styled("No tracks", self.theme.dim())).render(inner, buf);
            return;
        }

        let rows = (inner.height / tracks.len() as u16).clamp(1, MAX_TRACK_ROWS);
        let any_soloed = tracks.iter().any(|t| t.mix.soloed);
        let show_cursor = self.snapshot.state == PlayerState::Playing;

        for (i, track) in tracks.iter().enumerate() {
            let y = inner.y + i as u16 * rows;
            if y >= inner.y + inner.height {
                break;
            }
            let height = rows.min(inner.y + inner.height - y);
            let row = Rect::new(inner.x, y, inner.width, height);
            let [info_area, wave_area] =
                Layout::horizontal([Constraint::Length(INFO_WIDTH), Constraint::Min(1)]).areas(row);

            let selected = self.selected_track == Some(i);
            Paragraph::new(self.info_line(track, selected)).render(info_area, buf);

            if !track.playable {
                continue;
            }
            if track.peaks.is_none() && self.snapshot.state == PlayerState::Loading {
                Paragraph::new(Span::styled("loading…", self.theme.dim())).render(wave_area, buf);
                continue;
            }

            let silent = track.mix.muted || (any_soloed && !track.mix.soloed);
            let mut waveform = WaveformWidget::new(self.theme, track.peaks.as_deref())
                .muted(silent || self.snapshot.master_muted);
            if show_cursor {
                waveform = waveform.cursor(track.cursor);
            }
            waveform.render(wave_area, buf);
        }
    }
}
