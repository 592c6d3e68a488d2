//! Decoding fetched track bytes into playable stereo buffers

use crate::fetch::FetchError;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Decoded audio shorter than this is treated as broken
pub const MIN_DURATION_SECS: f64 = 0.1;

/// Errors that can occur while loading a track
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("No audio track found in stream")]
    NoAudioTrack,
    #[error("Unsupported format")]
    UnsupportedFormat,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Audio too short or corrupted ({0:.3}s)")]
    TooShort(f64),
}

/// A fully decoded track, ready to be scheduled on the device
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    /// Interleaved stereo samples (f32, -1.0 to 1.0)
    samples: Vec<f32>,
    /// Sample rate in Hz, equal to the device rate
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Wrap interleaved stereo samples
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        2
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }

    /// Left/right pair at a frame index, silence past the end
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let i = index * 2;
        match self.samples.get(i..i + 2) {
            Some(pair) => (pair[0], pair[1]),
            None => (0.0, 0.0),
        }
    }
}

/// Track decoder using Symphonia
pub struct TrackDecoder {
    target_sample_rate: u32,
}

impl Default for TrackDecoder {
    fn default() -> Self {
        Self::with_sample_rate(48000)
    }
}

impl TrackDecoder {
    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Format hint taken from the last path segment of a URL
    pub fn extension_hint(url: &str) -> Option<&str> {
        let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
        let name = path.rsplit('/').next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            None
        } else {
            Some(ext)
        }
    }

    /// Decode encoded bytes into a stereo buffer at the target rate
    pub fn decode(&self, bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedBuffer, LoadError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| match e {
                SymphoniaError::Unsupported(_) => LoadError::UnsupportedFormat,
                e => LoadError::Decode(e.to_string()),
            })?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(_) => LoadError::UnsupportedFormat,
                e => LoadError::Decode(e.to_string()),
            })?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(_) => break,
            };

            let spec = *decoded.spec();
            channels = spec.channels.count();

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        let channels = channels.max(1);
        let frames = samples.len() / channels;
        let duration = frames as f64 / source_sample_rate.max(1) as f64;
        if duration < MIN_DURATION_SECS {
            return Err(LoadError::TooShort(duration));
        }

        let stereo = to_stereo(&samples, channels);

        let stereo = if source_sample_rate != self.target_sample_rate {
            self.resample(&stereo, source_sample_rate)?
        } else {
            stereo
        };

        Ok(DecodedBuffer::from_interleaved(stereo, self.target_sample_rate))
    }

    /// Resample interleaved stereo audio to the target rate
    fn resample(&self, samples: &[f32], source_rate: u32) -> Result<Vec<f32>, LoadError> {
        use rubato::{FftFixedInOut, Resampler};

        const CHANNELS: usize = 2;
        let frames = samples.len() / CHANNELS;

        let mut resampler = FftFixedInOut::<f32>::new(
            source_rate as usize,
            self.target_sample_rate as usize,
            1024,
            CHANNELS,
        )
        .map_err(|e| LoadError::Decode(e.to_string()))?;

        let planar: [Vec<f32>; CHANNELS] = [
            samples.iter().step_by(2).copied().collect(),
            samples.iter().skip(1).step_by(2).copied().collect(),
        ];

        let chunk_size = resampler.input_frames_next();
        let mut output: [Vec<f32>; CHANNELS] = [Vec::new(), Vec::new()];

        let mut pos = 0;
        while pos + chunk_size <= frames {
            let input: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..pos + chunk_size]).collect();
            let resampled = resampler
                .process(&input, None)
                .map_err(|e| LoadError::Decode(e.to_string()))?;

            for (out, data) in output.iter_mut().zip(resampled) {
                out.extend(data);
            }
            pos += chunk_size;
        }

        // Zero-pad the tail and keep only its share of the output
        if pos < frames {
            let remaining = frames - pos;
            let padded: Vec<Vec<f32>> = planar
                .iter()
                .map(|ch| {
                    let mut v = ch[pos..].to_vec();
                    v.resize(chunk_size, 0.0);
                    v
                })
                .collect();
            let input: Vec<&[f32]> = padded.iter().map(Vec::as_slice).collect();

            let resampled = resampler
                .process(&input, None)
                .map_err(|e| LoadError::Decode(e.to_string()))?;
            let tail_frames =
                remaining * self.target_sample_rate as usize / source_rate as usize;
            for (out, data) in output.iter_mut().zip(resampled) {
                out.extend(&data[..tail_frames.min(data.len())]);
            }
        }

        let [left, right] = output;
        Ok(left
            .into_iter()
            .zip(right)
            .flat_map(|(l, r)| [l, r])
            .collect())
    }
}

/// Duplicate mono, keep the first two channels of anything wider
fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// 16-bit PCM WAV bytes holding a sine at 440 Hz
#[cfg(test)]
pub(crate) fn test_wav(channels: u16, sample_rate: u32, frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            for _ in 0..channels {
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_hint() {
        assert_eq!(
            TrackDecoder::extension_hint("https://cdn.example/u/abc/drums.WAV?token=x.mp3"),
            Some("WAV")
        );
        assert_eq!(TrackDecoder::extension_hint("/music/loop.flac"), Some("flac"));
        assert_eq!(TrackDecoder::extension_hint("https://cdn.example/stream"), None);
        assert_eq!(TrackDecoder::extension_hint("x.wav#frag"), Some("wav"));
    }

    #[test]
    fn test_decode_mono_to_stereo() {
        let decoder = TrackDecoder::with_sample_rate(48000);
        let buffer = decoder.decode(test_wav(1, 48000, 9600), Some("wav")).unwrap();

        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.frames(), 9600);
        assert!((buffer.duration_secs() - 0.2).abs() < 1e-9);
        for i in [10, 100, 5000] {
            let (l, r) = buffer.frame(i);
            assert_eq!(l, r);
        }
        assert!(buffer.samples().iter().any(|s| s.abs() > 0.4));
    }

    #[test]
    fn test_decode_stereo_keeps_frames() {
        let decoder = TrackDecoder::with_sample_rate(44100);
        let buffer = decoder.decode(test_wav(2, 44100, 22050), None).unwrap();
        assert_eq!(buffer.frames(), 22050);
        assert_eq!(buffer.frame(1_000_000), (0.0, 0.0));
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let decoder = TrackDecoder::with_sample_rate(48000);
        let buffer = decoder.decode(test_wav(2, 44100, 44100), Some("wav")).unwrap();

        assert_eq!(buffer.sample_rate(), 48000);
        let frames = buffer.frames() as f64;
        assert!((frames - 48000.0).abs() < 480.0, "frames: {}", frames);
    }

    #[test]
    fn test_decode_rejects_short_audio() {
        let decoder = TrackDecoder::with_sample_rate(48000);
        let result = decoder.decode(test_wav(2, 48000, 2400), Some("wav"));
        assert!(matches!(result, Err(LoadError::TooShort(d)) if d < MIN_DURATION_SECS));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let decoder = TrackDecoder::default();
        let garbage: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
        assert!(decoder.decode(garbage, Some("wav")).is_err());
    }

    #[test]
    fn test_to_stereo_drops_extra_channels() {
        let quad = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
        assert_eq!(to_stereo(&quad, 4), vec![0.1, 0.2, 0.5, 0.6]);
    }
}
