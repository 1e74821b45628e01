//! Procedural Ambiance & Narration Audio Core
//!
//! A small software audio graph plus the two subsystems an interactive-fiction
//! client layers on top of it: a procedural ambiance engine that synthesizes and
//! cross-fades two-layer soundscapes (environment + weather), and a narration
//! transport that plays decoded speech through play/pause/resume/stop controls.
//!
//! # Features
//! - Audio graph with gain, oscillator, biquad filter and buffer source nodes
//! - Sample-accurate parameter automation (linear/exponential ramps, targets)
//! - Deterministic soundscape tables for 5 environments and 5 weather overlays
//! - 3 second cross-fades with deferred, cancellable teardown
//! - One-shot UI sound effects independent of the ambiance
//! - Narration transport over its own runtime, independently suspendable
//! - Adventure session wiring a story generation service to both subsystems
//!
//! # Crate feature flags
//! - `export` (default): WAV rendering of a runtime (enables `hound`)
//! - `streaming` (opt-in): Real-time audio output (enables optional `rodio` dep)
//!
//! # Quick start
//! ```no_run
//! use tale_audio::{AmbianceEngine, AmbianceTag, EngineConfig, WeatherTag};
//!
//! let mut engine = AmbianceEngine::offline(EngineConfig::default());
//! engine.set_ambiance(AmbianceTag::Dungeon, WeatherTag::Rain);
//!
//! let mut block = vec![0.0f32; 1024];
//! engine.render(&mut block, 1);
//! ```

#![warn(missing_docs)]

pub mod ambiance; // Soundscapes, cross-fades and SFX
pub mod config; // Engine configuration
#[cfg(feature = "export")]
pub mod export; // Offline WAV rendering
pub mod narration; // Speech playback transport
pub mod runtime; // Audio graph runtime
pub mod session; // Adventure orchestration and persistence
#[cfg(feature = "streaming")]
pub mod streaming; // Audio Output & Streaming

/// Error types for audio graph and subsystem operations
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    /// A node id that is not (or no longer) part of the graph
    #[error("Unknown audio node: {0}")]
    UnknownNode(runtime::NodeId),

    /// Operation not valid for the node's kind or playback state
    #[error("Invalid node state: {0}")]
    InvalidNodeState(String),

    /// Connecting the nodes would create a feedback loop
    #[error("Connection {0} -> {1} would create a cycle")]
    GraphCycle(runtime::NodeId, runtime::NodeId),

    /// The runtime has been closed
    #[error("Audio runtime is closed")]
    RuntimeClosed,

    /// Error while decoding a speech payload
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for AudioError {
    /// Converts a String into `AudioError::Other`.
    ///
    /// Prefer a specific variant where one fits; this is a convenience for
    /// messages produced by third-party error types.
    fn from(msg: String) -> Self {
        AudioError::Other(msg)
    }
}

impl From<&str> for AudioError {
    /// Converts a string slice into `AudioError::Other`.
    fn from(msg: &str) -> Self {
        AudioError::Other(msg.to_string())
    }
}

/// Result type for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

// Public API exports
pub use ambiance::{AmbianceEngine, AmbianceTag, SfxKind, WeatherTag};
pub use config::{AudioConfig, EngineConfig, NarrationConfig};
pub use narration::{NarrationTransport, TransportState};
pub use runtime::{AudioBuffer, AudioRuntime, NodeId, OfflineFactory, RuntimeFactory};
pub use session::{Adventure, GameState, GameStatus, StoryResponse, StoryService};
#[cfg(feature = "streaming")]
pub use streaming::{AudioDevice, StreamingFactory};
