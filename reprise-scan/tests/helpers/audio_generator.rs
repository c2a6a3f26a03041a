//! Audio Test Fixture Generator
//!
//! In-memory WAV clips with known spectral character

use std::io::Cursor;

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 3.0,
            sample_rate: 22_050,
            channels: 1,
        }
    }
}

fn encode_wav(config: &AudioConfig, mut sample_at: impl FnMut(usize) -> f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;
        for i in 0..total_samples {
            let sample = (sample_at(i).clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            for _ in 0..config.channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Sine tone at `freq` Hz, 30% amplitude
pub fn tone_wav_bytes(freq: f32, config: &AudioConfig) -> Vec<u8> {
    let sr = config.sample_rate as f32;
    encode_wav(config, |i| {
        0.3 * (2.0 * std::f32::consts::PI * freq * i as f32 / sr).sin()
    })
}

/// Uniform white noise from a fixed-seed LCG
pub fn noise_wav_bytes(seed: u32, config: &AudioConfig) -> Vec<u8> {
    let mut state = seed.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    encode_wav(config, move |_| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * 0.5
    })
}

/// Digital silence
pub fn silence_wav_bytes(config: &AudioConfig) -> Vec<u8> {
    encode_wav(config, |_| 0.0)
}
