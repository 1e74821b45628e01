//! White-noise source material
//!
//! Every filtered-noise voice loops the same 2 second buffer; it depends only
//! on the runtime sample rate, so one buffer per runtime is enough.

use crate::runtime::AudioBuffer;
use crate::Result;
use rand::Rng;

/// Length of the looped noise buffer
pub const NOISE_BUFFER_SECONDS: u32 = 2;

/// Fresh mono white-noise buffer using the thread-local generator
pub fn create_noise_buffer(sample_rate: u32) -> Result<AudioBuffer> {
    create_noise_buffer_with(&mut rand::rng(), sample_rate)
}

/// Mono white noise, uniform in [-1, 1], drawn from `rng`
pub fn create_noise_buffer_with<R: Rng>(rng: &mut R, sample_rate: u32) -> Result<AudioBuffer> {
    let length = sample_rate as usize * NOISE_BUFFER_SECONDS as usize;
    let mut buffer = AudioBuffer::new(1, length, sample_rate)?;
    if let Some(data) = buffer.channel_data_mut(0) {
        for sample in data.iter_mut() {
            *sample = rng.random_range(-1.0f32..=1.0);
        }
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_two_seconds_mono() {
        let buffer = create_noise_buffer(8_000).unwrap();
        assert_eq!(buffer.number_of_channels(), 1);
        assert_eq!(buffer.length(), 16_000);
        assert_eq!(buffer.sample_rate(), 8_000);
    }

    #[test]
    fn test_samples_in_range_and_roughly_centered() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let buffer = create_noise_buffer_with(&mut rng, 8_000).unwrap();
        let data = buffer.channel_data(0).unwrap();
        assert!(data.iter().all(|s| (-1.0..=1.0).contains(s)));
        let mean = data.iter().sum::<f32>() / data.len() as f32;
        assert!(mean.abs() < 0.05);
        assert!(data.iter().any(|&s| s > 0.9) && data.iter().any(|&s| s < -0.9));
    }

    #[test]
    fn test_seeded_generation_is_repeatable() {
        let a = create_noise_buffer_with(&mut StdRng::seed_from_u64(1), 1_000).unwrap();
        let b = create_noise_buffer_with(&mut StdRng::seed_from_u64(1), 1_000).unwrap();
        assert_eq!(a, b);
    }
}
