//! Decoded sample buffers
//!
//! Planar f32 storage shared by buffer source nodes. Buffers are immutable once
//! handed to the graph (they travel as `Arc<AudioBuffer>`).

use crate::{AudioError, Result};

/// Planar multi-channel sample buffer
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a silent buffer with `channels` channels of `length` frames
    pub fn new(channels: u16, length: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(AudioError::InvalidNodeState(
                "buffer needs at least one channel".into(),
            ));
        }
        if sample_rate == 0 {
            return Err(AudioError::InvalidNodeState(
                "buffer sample rate must be positive".into(),
            ));
        }
        Ok(AudioBuffer {
            sample_rate,
            channels: vec![vec![0.0; length]; channels as usize],
        })
    }

    /// Build a buffer from planar channel data
    ///
    /// All channels must have the same length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let Some(first) = channels.first() else {
            return Err(AudioError::InvalidNodeState(
                "buffer needs at least one channel".into(),
            ));
        };
        let length = first.len();
        if channels.iter().any(|c| c.len() != length) {
            return Err(AudioError::InvalidNodeState(
                "buffer channels differ in length".into(),
            ));
        }
        if sample_rate == 0 {
            return Err(AudioError::InvalidNodeState(
                "buffer sample rate must be positive".into(),
            ));
        }
        Ok(AudioBuffer {
            sample_rate,
            channels,
        })
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels
    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames
    pub fn length(&self) -> usize {
        self.channels[0].len()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.length() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    pub fn channel_data(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Mutable samples of one channel
    pub fn channel_data_mut(&mut self, channel: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(channel).map(Vec::as_mut_slice)
    }

    /// Down-mixed sample of one frame (channel average)
    pub(crate) fn mono_frame(&self, frame: usize) -> f32 {
        let sum: f32 = self.channels.iter().map(|c| c[frame]).sum();
        sum / self.channels.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_silent() {
        let buffer = AudioBuffer::new(2, 100, 8_000).unwrap();
        assert_eq!(buffer.number_of_channels(), 2);
        assert_eq!(buffer.length(), 100);
        assert!(buffer.channel_data(1).unwrap().iter().all(|&s| s == 0.0));
        assert!((buffer.duration() - 0.0125).abs() < 1e-9);
    }

    #[test]
    fn test_mismatched_channels_rejected() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 8_000);
        assert!(result.is_err());
        assert!(AudioBuffer::from_channels(Vec::new(), 8_000).is_err());
    }

    #[test]
    fn test_mono_frame_averages_channels() {
        let buffer = AudioBuffer::from_channels(vec![vec![1.0], vec![0.0]], 8_000).unwrap();
        assert_eq!(buffer.mono_frame(0), 0.5);
    }
}
