//! WAV file export functionality

use super::{apply_fade_out, normalize_samples, render_blocks, ExportConfig};
use crate::ambiance::AmbianceEngine;
use crate::runtime::AudioRuntime;
use crate::{AudioError, Result};
use log::info;
use std::path::Path;

/// Render `seconds` of `runtime` output to a 16-bit WAV file
///
/// Returns the number of frames written.
pub fn render_to_wav<P: AsRef<Path>>(
    runtime: &AudioRuntime,
    seconds: f64,
    channels: u16,
    output_path: P,
) -> Result<usize> {
    let config = ExportConfig {
        channels,
        ..ExportConfig::default()
    };
    let sample_rate = runtime.sample_rate();
    let frames = frame_count(seconds, sample_rate)?;
    let samples = render_blocks(frames, channels, |block, channels| {
        runtime.render(block, channels);
    });
    finish_export(samples, sample_rate, &config, output_path.as_ref())?;
    Ok(frames)
}

/// Render `seconds` of an ambiance engine to a WAV file
///
/// The engine is processed between blocks, so cross-fade teardowns and
/// one-shot cleanup happen while rendering. Renders silence when the engine
/// has no runtime.
pub fn render_engine_to_wav<P: AsRef<Path>>(
    engine: &mut AmbianceEngine,
    seconds: f64,
    config: ExportConfig,
    output_path: P,
) -> Result<usize> {
    render_engine_with(engine, seconds, config, output_path, |_, _| {})
}

/// Like [`render_engine_to_wav`], calling `before_block` with the engine and
/// the elapsed render time before every block
///
/// Lets a caller script scene changes on the engine clock.
pub fn render_engine_with<P, F>(
    engine: &mut AmbianceEngine,
    seconds: f64,
    config: ExportConfig,
    output_path: P,
    mut before_block: F,
) -> Result<usize>
where
    P: AsRef<Path>,
    F: FnMut(&mut AmbianceEngine, f64),
{
    let sample_rate = engine
        .runtime()
        .map_or(engine.config().sample_rate, |runtime| runtime.sample_rate());
    let frames = frame_count(seconds, sample_rate)?;
    let mut rendered = 0usize;
    let samples = render_blocks(frames, config.channels, |block, channels| {
        before_block(engine, rendered as f64 / sample_rate as f64);
        rendered += engine.render(block, channels);
    });
    finish_export(samples, sample_rate, &config, output_path.as_ref())?;
    Ok(frames)
}

fn frame_count(seconds: f64, sample_rate: u32) -> Result<usize> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(AudioError::ConfigError(format!(
            "export duration must be a non-negative number of seconds, got {seconds}"
        )));
    }
    Ok((seconds * sample_rate as f64).round() as usize)
}

fn finish_export(
    mut samples: Vec<f32>,
    sample_rate: u32,
    config: &ExportConfig,
    path: &Path,
) -> Result<()> {
    if config.normalize {
        normalize_samples(&mut samples);
    }
    apply_fade_out(
        &mut samples,
        config.fade_out_duration,
        sample_rate,
        config.channels,
    );
    info!(
        "writing {} frames at {} Hz to {}",
        samples.len() / config.channels.max(1) as usize,
        sample_rate,
        path.display()
    );
    write_wav_file(path, &samples, sample_rate, config.channels.max(1))
}

/// Write interleaved samples to a 16-bit PCM WAV file
pub fn write_wav_file(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("Failed to create WAV file: {}", e))?;

    for &sample in samples {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(sample_i16)
            .map_err(|e| format!("Failed to write sample: {}", e))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV file: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiance::{AmbianceTag, WeatherTag};
    use crate::config::EngineConfig;
    use crate::runtime::Waveform;

    #[test]
    fn test_runtime_to_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let runtime = AudioRuntime::new(8_000).unwrap();
        let osc = runtime.create_oscillator(Waveform::Sine, 440.0).unwrap();
        runtime.connect(osc, runtime.destination()).unwrap();
        runtime.start(osc, 0.0).unwrap();

        let frames = render_to_wav(&runtime, 0.5, 2, &path).unwrap();
        assert_eq!(frames, 4_000);

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 8_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 8_000);
    }

    #[test]
    fn test_engine_to_wav_runs_teardowns() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = AmbianceEngine::offline(EngineConfig {
            sample_rate: 8_000,
            ..EngineConfig::default()
        });
        engine.set_ambiance(AmbianceTag::Dungeon, WeatherTag::Clear);
        engine.set_ambiance(AmbianceTag::Dungeon, WeatherTag::Fog);
        assert_eq!(engine.pending_teardowns(), 1);

        let path = dir.path().join("dungeon.wav");
        render_engine_to_wav(&mut engine, 4.0, ExportConfig::default(), &path).unwrap();
        assert_eq!(engine.pending_teardowns(), 0);

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 32_000);
        assert!(samples.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_scripted_scene_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = AmbianceEngine::offline(EngineConfig {
            sample_rate: 8_000,
            ..EngineConfig::default()
        });
        engine.set_ambiance(AmbianceTag::Town, WeatherTag::Clear);
        let path = dir.path().join("switch.wav");
        render_engine_with(&mut engine, 2.0, ExportConfig::default(), &path, |engine, t| {
            if t >= 1.0 {
                engine.set_ambiance(AmbianceTag::Battle, WeatherTag::Clear);
            }
        })
        .unwrap();
        assert_eq!(engine.soundscape_builds(), 2);
        assert_eq!(engine.pending_teardowns(), 1);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let runtime = AudioRuntime::new(8_000).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(render_to_wav(&runtime, -1.0, 1, dir.path().join("x.wav")).is_err());
    }
}
