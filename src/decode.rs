use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported or corrupt container: {0}")]
    Probe(SymphoniaError),
    #[error("no decodable audio track in {0}")]
    NoAudioTrack(String),
    #[error("codec error: {0}")]
    Codec(SymphoniaError),
    #[error("stream parameters carry no sample rate")]
    MissingSampleRate,
}

/// Decoded PCM ready for the fingerprint pipeline: mono samples plus the
/// rate they were decoded at.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file to mono PCM via symphonia.
///
/// Container and codec handling is entirely symphonia's; this only probes,
/// drains packets, and downmixes. Malformed packets are skipped, matching
/// symphonia's own recommendation for recoverable decode errors.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(DecodeError::Probe)?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| DecodeError::NoAudioTrack(path.display().to_string()))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or(DecodeError::MissingSampleRate)?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(DecodeError::Codec)?;

    let mut interleaved = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Codec(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("skipping malformed packet in {}: {e}", path.display());
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e)),
        };

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(buffer.samples());
    }

    Ok(DecodedAudio {
        samples: downmix_to_mono(&interleaved, channels),
        sample_rate,
    })
}

/// Average interleaved channels down to one.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
