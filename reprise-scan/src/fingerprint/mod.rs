//! Acoustic fingerprint extraction
//!
//! Reduces a waveform to a fixed-length [`Fingerprint`]: time-averaged MFCC,
//! chroma, mel, spectral contrast and tonnetz profiles plus a global tempo
//! estimate, all computed from one shared STFT.
//!
//! Flattened layout (194 values):
//!
//! | block    | length |
//! |----------|--------|
//! | mfcc     | 40     |
//! | chroma   | 12     |
//! | mel      | 128    |
//! | contrast | 7      |
//! | tonnetz  | 6      |
//! | tempo    | 1      |

pub mod chroma;
pub mod contrast;
pub mod hpss;
pub mod mel;
pub mod mfcc;
pub mod stft;
pub mod tempo;
pub mod tonnetz;

use tracing::{debug, warn};

use crate::audio::{SilenceTrimmer, Waveform};
use chroma::{ChromaNorm, N_CHROMA};
use contrast::N_CONTRAST;
use mel::{MelFilterbank, N_MELS};
use mfcc::N_MFCC;
use stft::Spectrogram;
use tonnetz::N_TONNETZ;

/// Named blocks of the flattened vector, in order
pub const LAYOUT: [(&str, usize); 6] = [
    ("mfcc", N_MFCC),
    ("chroma", N_CHROMA),
    ("mel", N_MELS),
    ("contrast", N_CONTRAST),
    ("tonnetz", N_TONNETZ),
    ("tempo", 1),
];

/// Total fingerprint dimension
pub const FINGERPRINT_DIM: usize = N_MFCC + N_CHROMA + N_MELS + N_CONTRAST + N_TONNETZ + 1;

/// Bumped whenever the block layout or any feature definition changes
pub const LAYOUT_VERSION: u32 = 1;

/// Fixed-layout acoustic fingerprint
///
/// The all-zero fingerprint is the "extraction failed" sentinel and never a
/// legitimate result.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub mfcc: [f32; N_MFCC],
    pub chroma: [f32; N_CHROMA],
    pub mel: [f32; N_MELS],
    pub contrast: [f32; N_CONTRAST],
    pub tonnetz: [f32; N_TONNETZ],
    /// Global tempo in BPM (0 when no onsets were found)
    pub tempo: f32,
}

impl Fingerprint {
    /// The "extraction failed" sentinel
    pub fn sentinel() -> Self {
        Self {
            mfcc: [0.0; N_MFCC],
            chroma: [0.0; N_CHROMA],
            mel: [0.0; N_MELS],
            contrast: [0.0; N_CONTRAST],
            tonnetz: [0.0; N_TONNETZ],
            tempo: 0.0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.to_vector().iter().all(|&v| v == 0.0)
    }

    /// Flatten in layout order (mfcc, chroma, mel, contrast, tonnetz, tempo)
    pub fn to_vector(&self) -> Vec<f32> {
        let mut v = Vec::with_capacity(FINGERPRINT_DIM);
        v.extend_from_slice(&self.mfcc);
        v.extend_from_slice(&self.chroma);
        v.extend_from_slice(&self.mel);
        v.extend_from_slice(&self.contrast);
        v.extend_from_slice(&self.tonnetz);
        v.push(self.tempo);
        v
    }

    /// Rebuild from a flattened vector; None unless exactly `FINGERPRINT_DIM` long
    pub fn from_vector(values: &[f32]) -> Option<Self> {
        if values.len() != FINGERPRINT_DIM {
            return None;
        }
        let (mfcc, rest) = values.split_at(N_MFCC);
        let (chroma, rest) = rest.split_at(N_CHROMA);
        let (mel, rest) = rest.split_at(N_MELS);
        let (contrast, rest) = rest.split_at(N_CONTRAST);
        let (tonnetz, rest) = rest.split_at(N_TONNETZ);

        Some(Self {
            mfcc: mfcc.try_into().ok()?,
            chroma: chroma.try_into().ok()?,
            mel: mel.try_into().ok()?,
            contrast: contrast.try_into().ok()?,
            tonnetz: tonnetz.try_into().ok()?,
            tempo: *rest.first()?,
        })
    }

    /// Values of one named block
    pub fn block(&self, name: &str) -> Option<&[f32]> {
        match name {
            "mfcc" => Some(&self.mfcc[..]),
            "chroma" => Some(&self.chroma[..]),
            "mel" => Some(&self.mel[..]),
            "contrast" => Some(&self.contrast[..]),
            "tonnetz" => Some(&self.tonnetz[..]),
            "tempo" => Some(std::slice::from_ref(&self.tempo)),
            _ => None,
        }
    }
}

/// Mean over time of frame-major features (`[t][dim]` -> `[dim]`)
fn time_average<const N: usize>(frames: &[Vec<f32>]) -> [f32; N] {
    let mut mean = [0.0f64; N];
    for frame in frames {
        for (acc, &v) in mean.iter_mut().zip(frame) {
            *acc += v as f64;
        }
    }
    let count = frames.len().max(1) as f64;
    mean.map(|v| (v / count) as f32)
}

/// Waveform to fingerprint reduction
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    /// Maximum seconds of each waveform analyzed
    segment_duration_secs: f64,
    trimmer: SilenceTrimmer,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

impl FeatureExtractor {
    pub fn new(segment_duration_secs: f64) -> Self {
        Self {
            segment_duration_secs,
            trimmer: SilenceTrimmer::new(),
        }
    }

    pub fn segment_duration_secs(&self) -> f64 {
        self.segment_duration_secs
    }

    /// Extract the fingerprint of the leading segment of `waveform`
    ///
    /// Empty or silent input yields [`Fingerprint::sentinel`], never an error.
    pub fn extract(&self, waveform: &Waveform) -> Fingerprint {
        if waveform.is_empty() || waveform.sample_rate == 0 {
            return Fingerprint::sentinel();
        }

        let segment = self.trimmer.trim(waveform.head(self.segment_duration_secs));
        if segment.is_empty() {
            debug!("Segment is silent after trimming");
            return Fingerprint::sentinel();
        }

        let sample_rate = waveform.sample_rate;
        let spectrogram = Spectrogram::magnitude(segment, sample_rate);
        let power = spectrogram.power();

        let mel_bank = MelFilterbank::new(sample_rate, N_MELS);
        let mel_power = mel_bank.spectrogram(&power);
        let mel_db = mel::power_to_db(&mel_power);

        let mfcc_frames = mfcc::mfcc(&mel_db, N_MFCC);
        let chroma_frames = chroma::chromagram(&power, sample_rate, ChromaNorm::Max);
        let contrast_frames = contrast::spectral_contrast(spectrogram.frames(), sample_rate);

        let harmonic = Spectrogram::from_frames(hpss::harmonic(spectrogram.frames()), sample_rate);
        let harmonic_chroma = chroma::chromagram(&harmonic.power(), sample_rate, ChromaNorm::L1);
        let tonnetz_frames = tonnetz::tonnetz(&harmonic_chroma);

        let onsets = tempo::onset_strength(&mel_db);
        let bpm = tempo::estimate_tempo(&onsets, sample_rate);

        let fingerprint = Fingerprint {
            mfcc: time_average(&mfcc_frames),
            chroma: time_average(&chroma_frames),
            mel: time_average(&mel_power),
            contrast: time_average(&contrast_frames),
            tonnetz: time_average(&tonnetz_frames),
            tempo: bpm,
        };

        if fingerprint.to_vector().iter().any(|v| !v.is_finite()) {
            warn!("Non-finite feature values, discarding fingerprint");
            return Fingerprint::sentinel();
        }

        debug!(
            frames = spectrogram.n_frames(),
            seconds = segment.len() as f64 / sample_rate as f64,
            tempo = bpm,
            "Fingerprint extracted"
        );

        fingerprint
    }
}
