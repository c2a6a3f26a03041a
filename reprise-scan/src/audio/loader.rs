//! Audio decoding to canonical mono waveforms
//!
//! Uses symphonia for format-agnostic decoding (MP3, AAC/M4A, FLAC, WAV,
//! OGG/Vorbis, ...). Sources acquired from video platforms have usually been
//! re-encoded several times, so individual corrupt packets are skipped
//! rather than failing the whole source.

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use thiserror::Error;
use tracing::{debug, warn};

use super::resample::resample_mono;
use super::silence::SilenceTrimmer;
use super::Waveform;

/// Reasons no waveform could be obtained from a source
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Container format not recognized
    #[error("Failed to probe audio stream: {0}")]
    Probe(String),

    /// Container has no decodable audio track
    #[error("No audio track found")]
    NoAudioTrack,

    /// Decoder could not be created or failed unrecoverably
    #[error("Codec error: {0}")]
    Codec(String),

    /// Not a single packet decoded
    #[error("No decodable audio: {0}")]
    Empty(String),

    /// Sample rate conversion failed
    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Waveform normalization options
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Maximum seconds decoded from the source
    pub fragment_duration_secs: f64,
    /// Target analysis rate (None keeps the native rate)
    pub target_sample_rate: Option<u32>,
    /// Frames this many dB below the loudest frame count as silence
    pub trim_top_db: f32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            fragment_duration_secs: 1000.0,
            target_sample_rate: Some(22_050),
            trim_top_db: 60.0,
        }
    }
}

/// Decode an in-memory byte stream
///
/// `hint` is an optional file extension ("mp3", "m4a", ...) that speeds up
/// probing; the container is still detected from content.
pub fn load_waveform_from_bytes(
    bytes: Vec<u8>,
    hint: Option<&str>,
    options: &LoadOptions,
) -> Result<Waveform, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty("zero-length byte stream".to_string()));
    }

    let mut probe_hint = Hint::new();
    if let Some(extension) = hint {
        probe_hint.with_extension(extension);
    }

    decode_source(Box::new(Cursor::new(bytes)), probe_hint, options)
}

/// Decode an audio file
pub fn load_waveform_from_file(path: &Path, options: &LoadOptions) -> Result<Waveform, DecodeError> {
    debug!(path = %path.display(), "Decoding audio file");

    let file = std::fs::File::open(path)?;

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    decode_source(Box::new(file), hint, options)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    hint: Hint,
    options: &LoadOptions,
) -> Result<Waveform, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut decoded_packets = 0usize;
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) if decoded_packets > 0 => {
                // Truncated or damaged tail: keep what decoded so far
                warn!(error = %e, "Stopped reading packets early");
                break;
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                skipped_packets += 1;
                debug!(reason = msg, "Skipping corrupt packet");
                continue;
            }
            Err(SymphoniaError::IoError(e)) => {
                skipped_packets += 1;
                debug!(error = %e, "Skipping unreadable packet");
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };

        decoded_packets += 1;
        let rate = *sample_rate.get_or_insert(decoded.spec().rate);
        samples.extend(mix_to_mono(&decoded));

        let max_samples = (options.fragment_duration_secs * rate as f64) as usize;
        if samples.len() >= max_samples {
            samples.truncate(max_samples);
            break;
        }
    }

    let sample_rate = match sample_rate {
        Some(rate) if decoded_packets > 0 && rate > 0 => rate,
        _ => {
            return Err(DecodeError::Empty(format!(
                "{} packets skipped, none decoded",
                skipped_packets
            )))
        }
    };

    if skipped_packets > 0 {
        warn!(
            decoded = decoded_packets,
            skipped = skipped_packets,
            "Corrupt packets skipped while decoding"
        );
    }

    let (samples, sample_rate) = match options.target_sample_rate {
        Some(target) if target != sample_rate => (resample_mono(&samples, sample_rate, target)?, target),
        _ => (samples, sample_rate),
    };

    let trimmed = SilenceTrimmer::new()
        .with_top_db(options.trim_top_db)
        .trim(&samples)
        .to_vec();

    debug!(
        sample_rate,
        decoded_samples = samples.len(),
        trimmed_samples = trimmed.len(),
        "Audio decoding complete"
    );

    Ok(Waveform::new(trimmed, sample_rate))
}

/// Average all channels of a decoded buffer into mono f32
fn mix_to_mono(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::U8(buf) => average_channels(&**buf),
        AudioBufferRef::U16(buf) => average_channels(&**buf),
        AudioBufferRef::U24(buf) => average_channels(&**buf),
        AudioBufferRef::U32(buf) => average_channels(&**buf),
        AudioBufferRef::S8(buf) => average_channels(&**buf),
        AudioBufferRef::S16(buf) => average_channels(&**buf),
        AudioBufferRef::S24(buf) => average_channels(&**buf),
        AudioBufferRef::S32(buf) => average_channels(&**buf),
        AudioBufferRef::F32(buf) => average_channels(&**buf),
        AudioBufferRef::F64(buf) => average_channels(&**buf),
    }
}

fn average_channels<S: Sample>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count().max(1);
    let num_frames = buf.frames();
    let mut mono = vec![0.0f32; num_frames];

    for ch in 0..buf.spec().channels.count() {
        for (acc, &sample) in mono.iter_mut().zip(buf.chan(ch)) {
            *acc += f32::from_sample(sample);
        }
    }

    let scale = 1.0 / num_channels as f32;
    mono.iter_mut().for_each(|s| *s *= scale);
    mono
}
