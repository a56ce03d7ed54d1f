//! Reference audio processing
//!
//! - WAV decoding to mono `f32` with `hound`
//! - Sample rate conversion with `rubato` (sinc interpolation)
//! - Peak limiting
//! - Linear magnitude spectrogram with `realfft`

use std::io::Cursor;
use std::sync::Arc;

use ndarray::Array2;
use realfft::{RealFftPlanner, RealToComplex};
use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use voice_synth_config::AudioConfig;
use voice_synth_core::{peak, AudioSegment, Error, Result};

/// Input frames per resampler call
const CHUNK_SIZE: usize = 1024;
const SINC_LEN: usize = 256;

/// Added under the square root so silent bins stay differentiable
const MAGNITUDE_EPS: f32 = 1e-6;

/// Peaks above full scale are divided by at most this much
const MAX_PEAK_DIVISOR: f32 = 2.0;

fn audio_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Audio(format!("{}: {}", context, e))
}

/// Decode a WAV file to mono float samples at its native rate
pub fn decode_wav(bytes: &[u8]) -> Result<AudioSegment> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::InputValidation(format!("reference audio is not a readable WAV file: {}", e)))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(Error::InputValidation("reference audio has no channels".into()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| audio_err("failed to read samples", e))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| audio_err("failed to read samples", e))?
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    tracing::debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        samples = samples.len(),
        "Decoded reference audio"
    );
    Ok(AudioSegment::new(samples, spec.sample_rate))
}

/// Resample mono audio; output length is `round(len * to / from)`
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(Error::Audio("sample rate must be positive".into()));
    }

    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: calculate_cutoff(SINC_LEN, window),
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window,
    };
    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.1, params, CHUNK_SIZE, 1)
        .map_err(|e| audio_err("failed to create resampler", e))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = ((SINC_LEN / 2) as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    for chunk in samples.chunks(CHUNK_SIZE) {
        let frames = if chunk.len() == CHUNK_SIZE {
            resampler.process(&[chunk], None)
        } else {
            resampler.process_partial(Some(&[chunk][..]), None)
        }
        .map_err(|e| audio_err("resampling failed", e))?;
        output.extend(frames.into_iter().next().unwrap_or_default());
    }

    // Drain the filter so the tail of the clip is not lost
    let mut flushes = 0;
    while output.len() < expected + delay && flushes < 8 {
        let frames = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| audio_err("resampling failed", e))?;
        output.extend(frames.into_iter().next().unwrap_or_default());
        flushes += 1;
    }

    let start = delay.min(output.len());
    let mut resampled = output.split_off(start);
    resampled.resize(expected, 0.0);
    Ok(resampled)
}

/// Scale down a waveform whose peak exceeds full scale
pub fn limit_peak(samples: &mut [f32]) {
    let max = peak(samples);
    if max > 1.0 {
        let divisor = max.min(MAX_PEAK_DIVISOR);
        samples.iter_mut().for_each(|s| *s /= divisor);
    }
}

/// Decode and convert a reference clip to `rate`
pub fn load_reference(bytes: &[u8], rate: u32) -> Result<Vec<f32>> {
    let decoded = decode_wav(bytes)?;
    if decoded.is_empty() {
        return Err(Error::InputValidation("reference audio is empty".into()));
    }
    resample(&decoded.samples, decoded.sample_rate, rate)
}

/// Framing of the linear spectrogram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrogramConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub win_length: usize,
}

impl From<&AudioConfig> for SpectrogramConfig {
    fn from(config: &AudioConfig) -> Self {
        Self {
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            win_length: config.win_length,
        }
    }
}

/// Short-time magnitude spectrum without edge padding
pub struct SpectrogramExtractor {
    config: SpectrogramConfig,
    fft: Arc<dyn RealToComplex<f32>>,
    /// Periodic Hann window of `win_length`, centered in `n_fft`
    window: Vec<f32>,
}

impl SpectrogramExtractor {
    pub fn new(config: SpectrogramConfig) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.n_fft);

        let mut window = vec![0.0f32; config.n_fft];
        let offset = (config.n_fft - config.win_length.min(config.n_fft)) / 2;
        let len = config.win_length.min(config.n_fft);
        for i in 0..len {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / len as f32;
            window[offset + i] = 0.5 - 0.5 * phase.cos();
        }

        Self { config, fft, window }
    }

    pub fn bins(&self) -> usize {
        self.config.n_fft / 2 + 1
    }

    /// Number of frames for a waveform of `len` samples
    pub fn frames(&self, len: usize) -> usize {
        if len < self.config.n_fft {
            0
        } else {
            (len - self.config.n_fft) / self.config.hop_length + 1
        }
    }

    /// Shape `[n_fft / 2 + 1, frames]`
    pub fn compute(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let frames = self.frames(samples.len());
        if frames == 0 {
            return Err(Error::InputValidation(format!(
                "reference audio is too short: {} samples, need at least {}",
                samples.len(),
                self.config.n_fft
            )));
        }

        let mut spectrogram = Array2::zeros((self.bins(), frames));
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();

        for frame in 0..frames {
            let start = frame * self.config.hop_length;
            let segment = &samples[start..start + self.config.n_fft];
            for ((slot, sample), w) in input.iter_mut().zip(segment).zip(&self.window) {
                *slot = sample * w;
            }
            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|e| audio_err("fft failed", e))?;
            for (bin, value) in spectrum.iter().enumerate() {
                spectrogram[[bin, frame]] = (value.re * value.re + value.im * value.im + MAGNITUDE_EPS).sqrt();
            }
        }
        Ok(spectrogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, secs: f32) -> Vec<f32> {
        let n = (rate as f32 * secs) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    fn wav_bytes(samples: &[f32], rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                for _ in 0..channels {
                    writer.write_sample((s * 32767.0) as i16).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mixes_down_to_mono() {
        let samples = sine(440.0, 16000, 0.1);
        let decoded = decode_wav(&wav_bytes(&samples, 16000, 2)).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.len(), samples.len());
        assert!((decoded.samples[10] - samples[10]).abs() < 1e-3);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_wav(b"not a wav"), Err(Error::InputValidation(_))));
    }

    #[test]
    fn test_resample_length() {
        let samples = sine(220.0, 48000, 0.5);
        let out = resample(&samples, 48000, 16000).unwrap();
        assert_eq!(out.len(), 8000);
        let out = resample(&samples, 48000, 32000).unwrap();
        assert_eq!(out.len(), 16000);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000).unwrap(), samples);
    }

    #[test]
    fn test_limit_peak() {
        let mut loud = vec![4.0, -2.0, 1.0];
        limit_peak(&mut loud);
        assert_eq!(loud, vec![2.0, -1.0, 0.5]);

        let mut quiet = vec![0.5, -0.9];
        limit_peak(&mut quiet);
        assert_eq!(quiet, vec![0.5, -0.9]);
    }

    #[test]
    fn test_spectrogram_shape() {
        let extractor = SpectrogramExtractor::new(SpectrogramConfig {
            n_fft: 2048,
            hop_length: 640,
            win_length: 2048,
        });
        let samples = sine(1000.0, 32000, 1.0);
        let spec = extractor.compute(&samples).unwrap();
        assert_eq!(spec.nrows(), 1025);
        assert_eq!(spec.ncols(), (32000 - 2048) / 640 + 1);
        assert!(spec.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn test_spectrogram_peaks_at_tone() {
        let extractor = SpectrogramExtractor::new(SpectrogramConfig {
            n_fft: 512,
            hop_length: 128,
            win_length: 512,
        });
        // 1 kHz at 32 kHz lands exactly on bin 16
        let spec = extractor.compute(&sine(1000.0, 32000, 0.1)).unwrap();
        let column = spec.column(0);
        let loudest = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, 16);
    }

    #[test]
    fn test_spectrogram_rejects_short_clip() {
        let extractor = SpectrogramExtractor::new(SpectrogramConfig {
            n_fft: 2048,
            hop_length: 640,
            win_length: 2048,
        });
        assert!(extractor.compute(&[0.0; 100]).is_err());
    }
}
