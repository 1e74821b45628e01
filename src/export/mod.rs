//! Offline audio export
//!
//! Renders a runtime (or a whole ambiance engine, so that its deferred
//! teardowns run on schedule) for a fixed duration and writes the result as
//! 16-bit PCM WAV.
//!
//! # Examples
//!
//! ```no_run
//! use tale_audio::export::{render_engine_to_wav, ExportConfig};
//! use tale_audio::{AmbianceEngine, AmbianceTag, EngineConfig, WeatherTag};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = AmbianceEngine::offline(EngineConfig::default());
//! engine.set_ambiance(AmbianceTag::Nature, WeatherTag::Rain);
//! render_engine_to_wav(&mut engine, 10.0, ExportConfig::stereo(), "forest.wav")?;
//! # Ok(())
//! # }
//! ```

mod wav;
pub use wav::*;

/// Frames rendered per block
const BLOCK_FRAMES: usize = 1024;

/// Rendering options for a soundscape export
///
/// The sample rate is not configured here: it always follows the rendered
/// runtime.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Output channels; every channel carries the same mono mix
    pub channels: u16,
    /// Scale the whole render down to 0.95 peak if it would clip
    ///
    /// Off by default: the master gain already keeps soundscapes well below
    /// full scale, and normalizing would change their level between renders.
    pub normalize: bool,
    /// Linear fade applied to the last seconds of the render (0 = none)
    pub fade_out_duration: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            normalize: false,
            fade_out_duration: 0.0,
        }
    }
}

impl ExportConfig {
    /// Two-channel export with the default options
    pub fn stereo() -> Self {
        Self {
            channels: 2,
            ..Default::default()
        }
    }

    /// Turn peak normalization on or off
    pub fn normalize(mut self, enable: bool) -> Self {
        self.normalize = enable;
        self
    }

    /// Fade the last `duration_seconds` of the render to silence
    pub fn fade_out(mut self, duration_seconds: f32) -> Self {
        self.fade_out_duration = duration_seconds;
        self
    }
}

/// Pull `frames` interleaved frames from `render` in fixed-size blocks
fn render_blocks<F>(frames: usize, channels: u16, mut render: F) -> Vec<f32>
where
    F: FnMut(&mut [f32], u16),
{
    let channels = channels.max(1);
    let mut samples = vec![0.0f32; frames * channels as usize];
    for block in samples.chunks_mut(BLOCK_FRAMES * channels as usize) {
        render(block, channels);
    }
    samples
}

/// Apply normalization to audio samples
fn normalize_samples(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));

    // Leave some headroom
    if peak > 0.95 {
        let scale = 0.95 / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}

/// Apply a linear fade out to the last `fade_duration` seconds
fn apply_fade_out(samples: &mut [f32], fade_duration: f32, sample_rate: u32, channels: u16) {
    if fade_duration <= 0.0 || samples.is_empty() {
        return;
    }

    let channels = channels.max(1) as usize;
    let frames = samples.len() / channels;
    let fade_frames = ((fade_duration * sample_rate as f32) as usize).min(frames);
    if fade_frames == 0 {
        return;
    }
    let start_fade = frames - fade_frames;

    for (i, frame) in samples.chunks_exact_mut(channels).enumerate().skip(start_fade) {
        let progress = (i - start_fade) as f32 / fade_frames as f32;
        for sample in frame {
            *sample *= 1.0 - progress;
        }
    }
}
