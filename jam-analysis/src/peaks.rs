//! Peak envelopes with frequency band analysis

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Default number of points in a peak envelope
pub const DEFAULT_PEAK_POINTS: usize = 1000;

/// Dominant frequency band for a peak point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyBand {
    /// Bass frequencies (<250Hz) - kicks, bass
    Bass,
    /// Mid frequencies (250Hz-4kHz) - vocals, instruments
    #[default]
    Mid,
    /// High frequencies (>4kHz) - hi-hats, cymbals, air
    High,
}

/// Downsampled amplitude envelope of one track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Peaks {
    /// One envelope per channel, absolute peak per point (0.0-1.0)
    pub channels: Vec<Vec<f32>>,
    /// Dominant band of the mono mixdown at each point
    pub bands: Vec<FrequencyBand>,
    /// Duration of the analysed audio in seconds
    pub duration_secs: f64,
}

impl Peaks {
    pub fn new(channels: Vec<Vec<f32>>, bands: Vec<FrequencyBand>, duration_secs: f64) -> Self {
        Self {
            channels,
            bands,
            duration_secs,
        }
    }

    /// Silent envelope with the given shape
    pub fn empty(num_points: usize, channel_count: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_points]; channel_count],
            bands: vec![FrequencyBand::default(); num_points],
            duration_secs: 0.0,
        }
    }

    /// Number of points per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn index_at(&self, position: f64) -> Option<usize> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let idx = (position.clamp(0.0, 1.0) * len as f64) as usize;
        Some(idx.min(len - 1))
    }

    /// Loudest channel at a normalized position (0.0-1.0)
    pub fn amplitude_at(&self, position: f64) -> f32 {
        match self.index_at(position) {
            Some(idx) => self
                .channels
                .iter()
                .map(|ch| ch[idx])
                .fold(0.0f32, f32::max),
            None => 0.0,
        }
    }

    /// Dominant band at a normalized position (0.0-1.0)
    pub fn band_at(&self, position: f64) -> FrequencyBand {
        self.index_at(position)
            .and_then(|idx| self.bands.get(idx).copied())
            .unwrap_or_default()
    }
}

/// Computes peak envelopes from decoded audio
pub struct PeakAnalyzer {
    sample_rate: u32,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
}

impl PeakAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        let fft_size = 512; // Small FFT for time resolution
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
            .collect();

        Self {
            sample_rate,
            fft_size,
            fft,
            window,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Dominant band of a mono chunk
    fn classify_chunk(&mut self, samples: &[f32]) -> FrequencyBand {
        let sample_count = samples.len().min(self.fft_size);
        for (i, slot) in self.fft_buffer.iter_mut().enumerate() {
            *slot = if i < sample_count {
                Complex::new(samples[i] * self.window[i], 0.0)
            } else {
                Complex::new(0.0, 0.0)
            };
        }

        self.fft.process(&mut self.fft_buffer);

        let bin_width = self.sample_rate as f32 / self.fft_size as f32;
        let nyquist_bin = self.fft_size / 2;
        let bass_end = ((250.0 / bin_width) as usize).clamp(1, nyquist_bin);
        let mid_end = ((4000.0 / bin_width) as usize).clamp(bass_end, nyquist_bin);

        let band_avg = |lo: usize, hi: usize| -> f32 {
            if hi <= lo {
                return 0.0;
            }
            let energy: f32 = self.fft_buffer[lo..hi].iter().map(|c| c.norm_sqr()).sum();
            energy / (hi - lo) as f32
        };

        let bass_avg = band_avg(1, bass_end);
        let mid_avg = band_avg(bass_end, mid_end);
        let high_avg = band_avg(mid_end, nyquist_bin);

        if bass_avg >= mid_avg && bass_avg >= high_avg {
            FrequencyBand::Bass
        } else if high_avg >= mid_avg {
            FrequencyBand::High
        } else {
            FrequencyBand::Mid
        }
    }

    /// Build a peak envelope from interleaved samples
    pub fn analyze(&mut self, samples: &[f32], channels: usize, target_points: usize) -> Peaks {
        let channels = channels.max(1);
        if samples.is_empty() || target_points == 0 {
            return Peaks::empty(target_points, channels);
        }

        let total_frames = samples.len() / channels;
        let duration_secs = total_frames as f64 / self.sample_rate.max(1) as f64;
        let frames_per_point = total_frames.div_ceil(target_points).max(1);

        let mut envelopes = vec![Vec::with_capacity(target_points); channels];
        let mut bands = Vec::with_capacity(target_points);
        let mut mono = Vec::with_capacity(frames_per_point);

        for point_idx in 0..target_points {
            let start_frame = point_idx * frames_per_point;
            let end_frame = ((point_idx + 1) * frames_per_point).min(total_frames);

            if start_frame >= total_frames {
                for env in envelopes.iter_mut() {
                    env.push(0.0);
                }
                bands.push(FrequencyBand::default());
                continue;
            }

            mono.clear();
            let mut maxima = vec![0.0f32; channels];
            for frame in samples[start_frame * channels..end_frame * channels].chunks_exact(channels) {
                let mut sum = 0.0;
                for (ch, &s) in frame.iter().enumerate() {
                    maxima[ch] = maxima[ch].max(s.abs());
                    sum += s;
                }
                mono.push(sum / channels as f32);
            }

            for (env, peak) in envelopes.iter_mut().zip(maxima) {
                env.push(peak.min(1.0));
            }

            let band = if mono.len() >= self.fft_size / 4 {
                self.classify_chunk(&mono)
            } else {
                FrequencyBand::Mid
            };
            bands.push(band);
        }

        Peaks::new(envelopes, bands, duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.8)
            .collect()
    }

    #[test]
    fn test_empty_peaks() {
        let peaks = Peaks::empty(100, 2);
        assert_eq!(peaks.len(), 100);
        assert_eq!(peaks.channel_count(), 2);
        assert_eq!(peaks.amplitude_at(0.5), 0.0);
        assert_eq!(peaks.band_at(0.5), FrequencyBand::Mid);
    }

    #[test]
    fn test_peak_access() {
        let peaks = Peaks::new(
            vec![vec![0.5, 0.8, 0.3], vec![0.6, 0.1, 0.2]],
            vec![FrequencyBand::Bass, FrequencyBand::Mid, FrequencyBand::High],
            3.0,
        );

        assert_eq!(peaks.amplitude_at(0.0), 0.6);
        assert_eq!(peaks.band_at(0.0), FrequencyBand::Bass);
        assert_eq!(peaks.amplitude_at(0.5), 0.8);
        assert_eq!(peaks.band_at(0.99), FrequencyBand::High);
        assert_eq!(peaks.band_at(1.5), FrequencyBand::High);
    }

    #[test]
    fn test_analyze_per_channel_peaks() {
        let mut analyzer = PeakAnalyzer::new(48000);
        let samples: Vec<f32> = (0..4800).flat_map(|_| [0.5, -0.8]).collect();

        let peaks = analyzer.analyze(&samples, 2, 10);

        assert_eq!(peaks.channel_count(), 2);
        assert_eq!(peaks.len(), 10);
        assert!(peaks.channels[0].iter().all(|&p| (p - 0.5).abs() < 1e-6));
        assert!(peaks.channels[1].iter().all(|&p| (p - 0.8).abs() < 1e-6));
        assert!((peaks.duration_secs - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_short_audio_pads_with_silence() {
        let mut analyzer = PeakAnalyzer::new(48000);
        let samples = vec![0.25f32; 4];

        let peaks = analyzer.analyze(&samples, 1, 8);

        assert_eq!(peaks.len(), 8);
        assert_eq!(peaks.channels[0][0], 0.25);
        assert_eq!(peaks.channels[0][7], 0.0);
    }

    #[test]
    fn test_band_classification() {
        let mut analyzer = PeakAnalyzer::new(48000);

        let low = analyzer.analyze(&sine(60.0, 48000, 1.0), 1, 20);
        let bass_points = low.bands.iter().filter(|b| **b == FrequencyBand::Bass).count();
        assert!(bass_points > 15, "bass points: {}", bass_points);

        let high = analyzer.analyze(&sine(9000.0, 48000, 1.0), 1, 20);
        let high_points = high.bands.iter().filter(|b| **b == FrequencyBand::High).count();
        assert!(high_points > 15, "high points: {}", high_points);
    }

    #[test]
    fn test_analyze_empty_input() {
        let mut analyzer = PeakAnalyzer::new(44100);
        let peaks = analyzer.analyze(&[], 2, 50);
        assert_eq!(peaks.len(), 50);
        assert_eq!(peaks.duration_secs, 0.0);
    }
}
