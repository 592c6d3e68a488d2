//! Simple configuration persistence for jam
//!
//! Stores user preferences like the last opened manifest and audio settings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Last jam manifest that was opened
    pub last_manifest: Option<PathBuf>,
    /// HTTP timeout for track downloads
    pub fetch_timeout_secs: u64,
    /// Points per waveform envelope
    pub peak_points: usize,
    /// Preferred output device name, default device if unset
    pub output_device: Option<String>,
    /// Fixed audio buffer size in frames, driver default if unset
    pub buffer_size: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_manifest: None,
            fetch_timeout_secs: 30,
            peak_points: 1000,
            output_device: None,
            buffer_size: None,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jam")
            .join("config.txt")
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key.trim() {
                "last_manifest" => config.last_manifest = Some(PathBuf::from(value)),
                "fetch_timeout_secs" => {
                    if let Ok(secs) = value.parse::<u64>() {
                        config.fetch_timeout_secs = secs.max(1);
                    }
                }
                "peak_points" => {
                    if let Ok(points) = value.parse::<usize>() {
                        if points > 0 {
                            config.peak_points = points;
                        }
                    }
                }
                "output_device" => config.output_device = Some(value.to_string()),
                "buffer_size" => config.buffer_size = value.parse().ok(),
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec!["# jam configuration".to_string()];

        if let Some(ref manifest) = self.last_manifest {
            lines.push(format!("last_manifest={}", manifest.display()));
        }
        lines.push(format!("fetch_timeout_secs={}", self.fetch_timeout_secs));
        lines.push(format!("peak_points={}", self.peak_points));
        if let Some(ref device) = self.output_device {
            lines.push(format!("output_device={}", device));
        }
        if let Some(size) = self.buffer_size {
            lines.push(format!("buffer_size={}", size));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_all_keys() {
        let content = "# Comment\n\
                       last_manifest=/home/user/jams/friday.json\n\
                       fetch_timeout_secs=10\n\
                       peak_points=400\n\
                       output_device=USB Audio\n\
                       buffer_size=256\n\
                       theme=dark";
        let config = Config::parse(content);

        assert_eq!(
            config.last_manifest,
            Some(PathBuf::from("/home/user/jams/friday.json"))
        );
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.peak_points, 400);
        assert_eq!(config.output_device.as_deref(), Some("USB Audio"));
        assert_eq!(config.buffer_size, Some(256));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = Config::parse("fetch_timeout_secs=soon\npeak_points=0\nbuffer_size=big");
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.peak_points, 1000);
        assert_eq!(config.buffer_size, None);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            last_manifest: Some(PathBuf::from("/test/jam.json")),
            output_device: Some("pulse".into()),
            buffer_size: Some(512),
            ..Config::default()
        };

        let parsed = Config::parse(&config.serialize());
        assert_eq!(parsed, config);
    }
}
