//! Procedural Ambiance
//!
//! Two-layer soundscapes (environment base + weather overlay) synthesized from
//! filtered noise and drones, cross-faded whenever the story changes either
//! tag, plus short one-shot UI effects.
//!
//! ## Layering
//! - [`noise`]: shared 2 second white-noise loop
//! - [`voices`]: noise and drone voice builders
//! - [`composer`]: fixed tag → layer tables and soundscape assembly
//! - [`sfx`]: one-shot effect synthesis
//! - [`engine`]: cross-fade, teardown and lifecycle

pub mod composer;
pub mod engine;
pub mod noise;
pub mod sfx;
pub mod voices;

pub use composer::{compose_soundscape, soundscape_layers, Soundscape};
pub use engine::AmbianceEngine;
pub use sfx::SfxKind;
pub use voices::{LayerSpec, Voice};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base environment of a scene, chosen by the story generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmbianceTag {
    /// Low rumble and a deep sine drone
    #[default]
    Dungeon,
    /// Gentle wind and rustling leaves
    Nature,
    /// Harsh sawtooth drone over low noise
    Battle,
    /// Crowd murmur
    Town,
    /// Beating sine drones
    Mystical,
    /// Any value the generator invents; composes a faint default bed
    #[serde(other)]
    Unknown,
}

impl AmbianceTag {
    /// Wire name used by the story generator
    pub fn as_str(&self) -> &'static str {
        match self {
            AmbianceTag::Dungeon => "DUNGEON",
            AmbianceTag::Nature => "NATURE",
            AmbianceTag::Battle => "BATTLE",
            AmbianceTag::Town => "TOWN",
            AmbianceTag::Mystical => "MYSTICAL",
            AmbianceTag::Unknown => "UNKNOWN",
        }
    }
}

impl From<&str> for AmbianceTag {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DUNGEON" => AmbianceTag::Dungeon,
            "NATURE" => AmbianceTag::Nature,
            "BATTLE" => AmbianceTag::Battle,
            "TOWN" => AmbianceTag::Town,
            "MYSTICAL" => AmbianceTag::Mystical,
            _ => AmbianceTag::Unknown,
        }
    }
}

impl fmt::Display for AmbianceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weather overlay of a scene, chosen by the story generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherTag {
    /// No overlay
    #[default]
    Clear,
    /// Rain bed plus hiss
    Rain,
    /// Heavy rain, howling wind and a low rumble
    Storm,
    /// Sweeping wind
    Windy,
    /// Muted low bed
    Fog,
    /// Any value the generator invents; adds nothing
    #[serde(other)]
    Unknown,
}

impl WeatherTag {
    /// Wire name used by the story generator
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherTag::Clear => "CLEAR",
            WeatherTag::Rain => "RAIN",
            WeatherTag::Storm => "STORM",
            WeatherTag::Windy => "WINDY",
            WeatherTag::Fog => "FOG",
            WeatherTag::Unknown => "UNKNOWN",
        }
    }
}

impl From<&str> for WeatherTag {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "CLEAR" => WeatherTag::Clear,
            "RAIN" => WeatherTag::Rain,
            "STORM" => WeatherTag::Storm,
            "WINDY" => WeatherTag::Windy,
            "FOG" => WeatherTag::Fog,
            _ => WeatherTag::Unknown,
        }
    }
}

impl fmt::Display for WeatherTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
