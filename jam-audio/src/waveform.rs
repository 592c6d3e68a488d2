//! Waveform view state for one track

use crate::coordinator::PlaybackCoordinator;
use jam_analysis::{PeakAnalyzer, Peaks};
use jam_library::DecodedBuffer;
use std::sync::Arc;

/// Peaks and playback cursor of one track's waveform
///
/// Peaks are computed once per source URL and shared through the
/// coordinator's cache; moving the cursor never allocates.
#[derive(Debug, Clone, Default)]
pub struct WaveformView {
    source_url: Option<String>,
    peaks: Option<Arc<Peaks>>,
    cursor: f64,
}

impl WaveformView {
    /// View for a source URL, ready at once if its peaks are cached
    pub fn render(source_url: Option<&str>, coordinator: &PlaybackCoordinator) -> Self {
        let peaks = source_url.and_then(|url| coordinator.get_peaks(url));
        Self {
            source_url: source_url.map(str::to_string),
            peaks,
            cursor: 0.0,
        }
    }

    /// Show a decoded buffer, analysing it unless its peaks are cached
    pub fn attach_buffer(
        &mut self,
        buffer: &DecodedBuffer,
        coordinator: &PlaybackCoordinator,
        points: usize,
    ) {
        if self.peaks.is_some() {
            return;
        }
        if let Some(url) = self.source_url.as_deref() {
            if let Some(cached) = coordinator.get_peaks(url) {
                self.peaks = Some(cached);
                return;
            }
        }

        let mut analyzer = PeakAnalyzer::new(buffer.sample_rate());
        let peaks = Arc::new(analyzer.analyze(buffer.samples(), buffer.channels(), points));
        if let Some(url) = self.source_url.as_deref() {
            coordinator.set_peaks(url, Arc::clone(&peaks));
        }
        self.peaks = Some(peaks);
    }

    pub fn is_ready(&self) -> bool {
        self.peaks.is_some()
    }

    /// Track duration in seconds once peaks are known
    pub fn duration(&self) -> Option<f64> {
        self.peaks.as_ref().map(|p| p.duration_secs)
    }

    /// Move the cursor to a fraction of the track (clamped to 0.0-1.0)
    pub fn seek_to(&mut self, fraction: f64) {
        self.cursor = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn peaks(&self) -> Option<&Arc<Peaks>> {
        self.peaks.as_ref()
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(secs: f64) -> DecodedBuffer {
        let frames = (secs * 48000.0) as usize;
        let samples = (0..frames).flat_map(|i| {
            let s = (i as f32 * 0.01).sin() * 0.5;
            [s, s]
        });
        DecodedBuffer::from_interleaved(samples.collect(), 48000)
    }

    #[test]
    fn test_attach_computes_and_caches() {
        let coordinator = PlaybackCoordinator::new();
        let mut view = WaveformView::render(Some("a.wav"), &coordinator);
        assert!(!view.is_ready());

        view.attach_buffer(&buffer(0.5), &coordinator, 100);

        assert!(view.is_ready());
        assert_eq!(view.peaks().unwrap().len(), 100);
        assert!((view.duration().unwrap() - 0.5).abs() < 1e-9);
        assert!(coordinator.get_peaks("a.wav").is_some());
    }

    #[test]
    fn test_render_uses_cached_peaks() {
        let coordinator = PlaybackCoordinator::new();
        let cached = Arc::new(Peaks::new(vec![vec![0.5; 4]], Vec::new(), 2.0));
        coordinator.set_peaks("a.wav", Arc::clone(&cached));

        let mut view = WaveformView::render(Some("a.wav"), &coordinator);
        assert!(view.is_ready());
        assert_eq!(view.duration(), Some(2.0));

        // Cached peaks win over a fresh buffer
        view.attach_buffer(&buffer(0.5), &coordinator, 100);
        assert!(Arc::ptr_eq(view.peaks().unwrap(), &cached));
    }

    #[test]
    fn test_seek_is_clamped() {
        let coordinator = PlaybackCoordinator::new();
        let mut view = WaveformView::render(None, &coordinator);

        view.seek_to(0.25);
        assert_eq!(view.cursor(), 0.25);
        view.seek_to(1.5);
        assert_eq!(view.cursor(), 1.0);
        view.seek_to(-1.0);
        assert_eq!(view.cursor(), 0.0);
        view.seek_to(f64::NAN);
        assert_eq!(view.cursor(), 0.0);
    }
}
