//! Waveform widget - band-coloured peak bars with a playback cursor

use crate::theme::Theme;
use jam_analysis::Peaks;
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

/// Characters for vertical bar rendering (8 levels + empty)
const BAR_CHARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One track's waveform
///
/// Bars grow from the bottom row upward; columns left of the cursor are
/// coloured by their dominant frequency band, the rest are dimmed.
pub struct WaveformWidget<'a> {
    theme: &'a Theme,
    peaks: Option<&'a Peaks>,
    cursor: f64,
    show_cursor: bool,
    muted: bool,
}

impl<'a> WaveformWidget<'a> {
    pub fn new(theme: &'a Theme, peaks: Option<&'a Peaks>) -> Self {
        Self {
            theme,
            peaks,
            cursor: 0.0,
            show_cursor: false,
            muted: false,
        }
    }

    /// Cursor position (0.0-1.0); drawn only when set
    pub fn cursor(mut self, cursor: f64) -> Self {
        self.cursor = cursor.clamp(0.0, 1.0);
        self.show_cursor = true;
        self
    }

    /// Draw every column dimmed
    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    fn cursor_column(&self, width: u16) -> Option<u16> {
        if !self.show_cursor || width == 0 {
            return None;
        }
        Some(((self.cursor * width as f64) as u16).min(width - 1))
    }

    /// Block character for `row` (0 = bottom) of a bar of `amplitude`
    fn bar_char(amplitude: f32, row: u16, height: u16) -> char {
        let eighths = (amplitude.clamp(0.0, 1.0) * height as f32 * 8.0) as i32;
        let filled = eighths - row as i32 * 8;
        BAR_CHARS[filled.clamp(0, 8) as usize]
    }
}

impl Widget for WaveformWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let Some(peaks) = self.peaks.filter(|p| !p.is_empty()) else {
            // No data yet: flat line through the middle
            let y = area.y + area.height / 2;
            for x in area.x..area.x + area.width {
                buf[(x, y)].set_char('─').set_style(self.theme.dim());
            }
            return;
        };

        let cursor_col = self.cursor_column(area.width);

        for col in 0..area.width {
            let x = area.x + col;

            if Some(col) == cursor_col {
                for y in area.y..area.y + area.height {
                    buf[(x, y)].set_char('│').set_style(self.theme.highlight());
                }
                continue;
            }

            let position = col as f64 / area.width as f64;
            let amplitude = peaks.amplitude_at(position);
            let played = cursor_col.is_some_and(|c| col < c);
            let style = if played && !self.muted {
                self.theme.band_style(peaks.band_at(position))
            } else {
                self.theme.dim()
            };

            for row in 0..area.height {
                let y = area.y + area.height - 1 - row;
                let ch = Self::bar_char(amplitude, row, area.height);
                buf[(x, y)].set_char(ch).set_style(style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jam_analysis::FrequencyBand;

    fn peaks(values: Vec<f32>) -> Peaks {
        let bands = vec![FrequencyBand::Bass; values.len()];
        Peaks::new(vec![values], bands, 1.0)
    }

    fn render(widget: WaveformWidget, width: u16, height: u16) -> Buffer {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        buf
    }

    #[test]
    fn test_bar_char_levels() {
        assert_eq!(WaveformWidget::bar_char(0.0, 0, 1), ' ');
        assert_eq!(WaveformWidget::bar_char(1.0, 0, 1), '█');
        assert_eq!(WaveformWidget::bar_char(0.5, 0, 1), '▄');
        // Two rows: half amplitude fills the bottom row only
        assert_eq!(WaveformWidget::bar_char(0.5, 0, 2), '█');
        assert_eq!(WaveformWidget::bar_char(0.5, 1, 2), ' ');
    }

    #[test]
    fn test_without_peaks_draws_flat_line() {
        let theme = Theme::default();
        let buf = render(WaveformWidget::new(&theme, None), 6, 3);
        assert_eq!(buf[(0, 1)].symbol(), "─");
        assert_eq!(buf[(5, 1)].symbol(), "─");
        assert_eq!(buf[(0, 0)].symbol(), " ");
    }

    #[test]
    fn test_cursor_column() {
        let theme = Theme::default();
        let data = peaks(vec![1.0; 10]);
        let buf = render(WaveformWidget::new(&theme, Some(&data)).cursor(0.5), 10, 2);

        assert_eq!(buf[(5, 0)].symbol(), "│");
        assert_eq!(buf[(5, 1)].symbol(), "│");
        assert_eq!(buf[(4, 1)].symbol(), "█");
        // Played columns take the band colour
        assert_eq!(buf[(4, 1)].fg, theme.low);
        assert_eq!(buf[(6, 1)].fg, theme.fg_dim);
    }

    #[test]
    fn test_cursor_at_end_stays_inside() {
        let theme = Theme::default();
        let data = peaks(vec![0.2; 10]);
        let buf = render(WaveformWidget::new(&theme, Some(&data)).cursor(1.0), 8, 1);
        assert_eq!(buf[(7, 0)].symbol(), "│");
    }

    #[test]
    fn test_muted_is_dimmed() {
        let theme = Theme::default();
        let data = peaks(vec![1.0; 10]);
        let buf = render(
            WaveformWidget::new(&theme, Some(&data)).cursor(0.9).muted(true),
            10,
            1,
        );
        assert_eq!(buf[(0, 0)].fg, theme.fg_dim);
    }
}
