//! Audio analysis for jam
//!
//! Provides the peak envelopes used to draw track waveforms, with a
//! dominant frequency band per point for colouring.

mod peaks;

pub use peaks::{FrequencyBand, PeakAnalyzer, Peaks, DEFAULT_PEAK_POINTS};
