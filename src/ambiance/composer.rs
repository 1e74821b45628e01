//! Soundscape Composition
//!
//! Fixed mapping from (ambiance, weather) to voice layers. The tables are pure
//! data; [`compose_soundscape`] realizes them on a runtime.

use super::voices::{LayerSpec, Voice, VoiceBuilder};
use super::{AmbianceTag, WeatherTag};
use crate::runtime::{AudioBuffer, AudioRuntime, FilterKind, NodeId, Waveform};
use crate::Result;
use log::debug;
use std::sync::Arc;

const fn noise(filter: FilterKind, frequency: f32, q: f32, volume: f32) -> LayerSpec {
    LayerSpec::Noise {
        filter,
        frequency,
        q,
        volume,
    }
}

const fn drone(frequency: f32, waveform: Waveform, volume: f32) -> LayerSpec {
    LayerSpec::Drone {
        frequency,
        waveform,
        volume,
    }
}

const DUNGEON: &[LayerSpec] = &[
    noise(FilterKind::Lowpass, 150.0, 0.0, 0.8),
    drone(55.0, Waveform::Sine, 0.1),
];

const NATURE: &[LayerSpec] = &[
    noise(FilterKind::Bandpass, 400.0, 0.5, 0.3),
    noise(FilterKind::Highpass, 800.0, 0.0, 0.1),
];

const BATTLE: &[LayerSpec] = &[
    drone(50.0, Waveform::Sawtooth, 0.15),
    noise(FilterKind::Lowpass, 200.0, 1.0, 0.5),
];

const TOWN: &[LayerSpec] = &[
    noise(FilterKind::Bandpass, 500.0, 0.5, 0.3),
    noise(FilterKind::Lowpass, 1200.0, 0.0, 0.2),
];

// 150 and 152 Hz beat against each other
const MYSTICAL: &[LayerSpec] = &[
    drone(150.0, Waveform::Sine, 0.2),
    drone(220.0, Waveform::Sine, 0.15),
    drone(152.0, Waveform::Sine, 0.2),
];

const FALLBACK: &[LayerSpec] = &[noise(FilterKind::Lowpass, 100.0, 0.0, 0.1)];

const RAIN: &[LayerSpec] = &[
    noise(FilterKind::Lowpass, 800.0, 0.0, 0.4),
    noise(FilterKind::Highpass, 2000.0, 0.0, 0.1),
];

const STORM: &[LayerSpec] = &[
    noise(FilterKind::Lowpass, 700.0, 0.0, 0.6),
    noise(FilterKind::Highpass, 1500.0, 0.0, 0.2),
    noise(FilterKind::Bandpass, 200.0, 2.0, 0.3),
    drone(40.0, Waveform::Triangle, 0.1),
];

const WINDY: &[LayerSpec] = &[
    noise(FilterKind::Bandpass, 300.0, 1.0, 0.5),
    noise(FilterKind::Lowpass, 200.0, 0.0, 0.3),
];

const FOG: &[LayerSpec] = &[noise(FilterKind::Lowpass, 300.0, 0.0, 0.2)];

/// Environment layers for an ambiance tag
pub fn ambiance_layers(ambiance: AmbianceTag) -> &'static [LayerSpec] {
    match ambiance {
        AmbianceTag::Dungeon => DUNGEON,
        AmbianceTag::Nature => NATURE,
        AmbianceTag::Battle => BATTLE,
        AmbianceTag::Town => TOWN,
        AmbianceTag::Mystical => MYSTICAL,
        AmbianceTag::Unknown => FALLBACK,
    }
}

/// Overlay layers for a weather tag
pub fn weather_layers(weather: WeatherTag) -> &'static [LayerSpec] {
    match weather {
        WeatherTag::Rain => RAIN,
        WeatherTag::Storm => STORM,
        WeatherTag::Windy => WINDY,
        WeatherTag::Fog => FOG,
        WeatherTag::Clear | WeatherTag::Unknown => &[],
    }
}

/// Every layer of a soundscape, environment first then weather
pub fn soundscape_layers(ambiance: AmbianceTag, weather: WeatherTag) -> Vec<LayerSpec> {
    ambiance_layers(ambiance)
        .iter()
        .chain(weather_layers(weather))
        .copied()
        .collect()
}

/// Build and start every voice of (`ambiance`, `weather`) into `destination`
///
/// On failure every voice built so far is torn down again before the error
/// is returned.
pub fn compose_soundscape(
    runtime: &AudioRuntime,
    noise: &Arc<AudioBuffer>,
    ambiance: AmbianceTag,
    weather: WeatherTag,
    destination: NodeId,
) -> Result<Vec<Voice>> {
    let mut builder = VoiceBuilder::new(runtime, noise, destination);
    for spec in soundscape_layers(ambiance, weather) {
        if let Err(err) = builder.layer(spec) {
            builder.abandon();
            return Err(err);
        }
    }
    let voices = builder.into_voices();
    debug!(
        "composed {}/{}: {} voices into {}",
        ambiance,
        weather,
        voices.len(),
        destination
    );
    Ok(voices)
}

/// All voices of one tag pair, routed through a dedicated scene gain
#[derive(Debug, Clone)]
pub struct Soundscape {
    ambiance: AmbianceTag,
    weather: WeatherTag,
    scene_gain: NodeId,
    voices: Vec<Voice>,
}

impl Soundscape {
    pub(crate) fn new(
        ambiance: AmbianceTag,
        weather: WeatherTag,
        scene_gain: NodeId,
        voices: Vec<Voice>,
    ) -> Self {
        Soundscape {
            ambiance,
            weather,
            scene_gain,
            voices,
        }
    }

    /// Environment tag
    pub fn ambiance(&self) -> AmbianceTag {
        self.ambiance
    }

    /// Weather tag
    pub fn weather(&self) -> WeatherTag {
        self.weather
    }

    /// Gain node all voices feed into
    pub fn scene_gain(&self) -> NodeId {
        self.scene_gain
    }

    /// Voices in build order
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Stop every voice and disconnect every node, scene gain last
    pub fn teardown(&self, runtime: &AudioRuntime) {
        for voice in &self.voices {
            voice.teardown(runtime);
        }
        if let Err(err) = runtime.disconnect(self.scene_gain) {
            debug!("scene gain {} release ignored: {}", self.scene_gain, err);
        }
    }
}
