//! Pure PCM transforms: base64 payload decoding, interleaved PCM16 framing,
//! and RIFF/WAVE container assembly.
//!
//! Everything here is deterministic and side-effect free. The WAVE header
//! layout is a compatibility contract: standard audio players must accept the
//! produced container unmodified.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Sample rate of synthesized speech.
pub const SAMPLE_RATE: u32 = 24_000;

/// Channel count of synthesized speech.
pub const CHANNELS: u16 = 1;

/// A corrupt or truncated binary payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Decode a base64 payload into raw bytes.
///
/// Fatal to the calling operation on malformed input; never retried.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(text)?)
}

/// Re-encode raw bytes as base64 (round-trip counterpart of
/// [`decode_base64`]).
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Interpret bytes as interleaved signed 16-bit little-endian samples and
/// split them into per-channel frames, normalized to [-1.0, 1.0).
///
/// A trailing odd byte and trailing samples that do not fill a whole frame
/// are truncated, never padded.
pub fn bytes_to_channel_frames(bytes: &[u8], channels: u16) -> Vec<Vec<f32>> {
    let channels = channels.max(1) as usize;
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let frame_count = samples.len() / channels;
    (0..channels)
        .map(|channel| {
            (0..frame_count)
                .map(|frame| f32::from(samples[frame * channels + channel]) / 32768.0)
                .collect()
        })
        .collect()
}

/// Build the canonical 44-byte RIFF/WAVE header for a PCM16 payload.
///
/// Multi-byte numeric fields are little-endian; the four-character tags are
/// plain ASCII.
pub fn wav_header(pcm_len: u32, sample_rate: u32, channels: u16) -> [u8; 44] {
    let byte_rate = sample_rate * u32::from(channels) * 2;
    let block_align = channels * 2;

    let mut header = [0u8; 44];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36 + pcm_len).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&16u16.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&pcm_len.to_le_bytes());
    header
}

/// Concatenate header and payload into the downloadable container.
pub fn assemble_wav(header: [u8; 44], pcm: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(pcm);
    out
}

/// Convenience: full container bytes for a PCM16 payload.
pub fn wav_bytes(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    assemble_wav(wav_header(pcm.len() as u32, sample_rate, channels), pcm)
}
