//! Colour themes

use jam_analysis::FrequencyBand;
use ratatui::style::{Color, Modifier, Style};

/// Theme configuration for the UI
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,
    /// Text and borders
    pub fg: Color,
    /// Secondary text, unplayed waveform
    pub fg_dim: Color,
    pub bg: Color,
    /// Selection, playhead
    pub highlight: Color,
    /// Playing state, mid band
    pub accent: Color,
    pub warning: Color,
    pub danger: Color,
    /// Bass band colour
    pub low: Color,
    /// High band colour
    pub high: Color,
}

impl Theme {
    /// Look up a built-in theme by name
    pub fn by_name(name: &str) -> Option<Theme> {
        match name.to_lowercase().as_str() {
            "studio" | "default" => Some(STUDIO),
            "amber" => Some(AMBER),
            _ => None,
        }
    }

    pub fn normal(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.fg_dim).bg(self.bg)
    }

    /// Selected rows and the waveform playhead
    pub fn highlight(&self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.highlight)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.fg_dim)
    }

    pub fn border_active(&self) -> Style {
        Style::default().fg(self.highlight)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.highlight)
            .add_modifier(Modifier::BOLD)
    }

    /// Colour of a played waveform column
    pub fn band_style(&self, band: FrequencyBand) -> Style {
        let color = match band {
            FrequencyBand::Bass => self.low,
            FrequencyBand::Mid => self.accent,
            FrequencyBand::High => self.high,
        };
        Style::default().fg(color)
    }

    /// Badge for an enabled toggle (mute, solo)
    pub fn badge_on(&self, color: Color) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(color)
            .add_modifier(Modifier::BOLD)
    }
}

/// Neutral dark theme
pub const STUDIO: Theme = Theme {
    name: "studio",
    fg: Color::Rgb(220, 220, 210),
    fg_dim: Color::Rgb(110, 110, 105),
    bg: Color::Rgb(14, 14, 18),
    highlight: Color::Rgb(255, 214, 90),
    accent: Color::Rgb(120, 220, 140),
    warning: Color::Rgb(255, 170, 60),
    danger: Color::Rgb(240, 90, 90),
    low: Color::Rgb(230, 120, 90),
    high: Color::Rgb(110, 190, 255),
};

/// Monochrome amber terminal
pub const AMBER: Theme = Theme {
    name: "amber",
    fg: Color::Rgb(255, 176, 0),
    fg_dim: Color::Rgb(128, 88, 0),
    bg: Color::Rgb(10, 5, 0),
    highlight: Color::Rgb(255, 220, 128),
    accent: Color::Rgb(255, 200, 64),
    warning: Color::Rgb(255, 255, 100),
    danger: Color::Rgb(255, 100, 100),
    low: Color::Rgb(255, 150, 40),
    high: Color::Rgb(255, 230, 150),
};

impl Default for Theme {
    fn default() -> Self {
        STUDIO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_lookup() {
        assert_eq!(Theme::by_name("Amber").map(|t| t.name), Some("amber"));
        assert_eq!(Theme::by_name("default").map(|t| t.name), Some("studio"));
        assert!(Theme::by_name("neon").is_none());
    }
}
