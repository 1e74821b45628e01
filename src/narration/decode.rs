//! Speech payload decoding
//!
//! The speech service returns base64 text wrapping raw little-endian signed
//! 16-bit PCM without any container header.

use crate::config::NarrationConfig;
use crate::runtime::AudioBuffer;
use crate::{AudioError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Decode standard-alphabet base64 text
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| AudioError::DecodeError(format!("invalid base64 payload: {e}")))
}

/// Convert interleaved 16-bit PCM into a planar buffer
///
/// Samples are scaled by 1/32768. A trailing odd byte and an incomplete last
/// frame are ignored.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
    if channels == 0 {
        return Err(AudioError::DecodeError("PCM channel count must be positive".into()));
    }
    if sample_rate == 0 {
        return Err(AudioError::DecodeError("PCM sample rate must be positive".into()));
    }

    let channel_count = channels as usize;
    let frames = bytes.len() / 2 / channel_count;
    let mut planar = vec![Vec::with_capacity(frames); channel_count];

    for (i, pair) in bytes.chunks_exact(2).take(frames * channel_count).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        planar[i % channel_count].push(sample as f32 / 32768.0);
    }

    AudioBuffer::from_channels(planar, sample_rate)
}

/// Decode a base64 speech payload with the narration format settings
pub fn decode_speech(payload: &str, config: &NarrationConfig) -> Result<AudioBuffer> {
    let bytes = decode_base64(payload)?;
    decode_pcm16(&bytes, config.sample_rate, config.channels)
}
