//! Narration Transport
//!
//! Play/pause/resume/stop over one decoded speech buffer. The transport owns
//! its own runtime so that pausing narration (which suspends that runtime's
//! clock) never freezes the ambiance.
//!
//! ```text
//!            load            play
//!   ┌──────────────► IDLE ─────────► PLAYING ◄──┐
//!   │                 ▲   stop / end    │       │ play
//!   │                 └─────────────────┤       │
//!   │                                   ▼ pause │
//!   └───────────────────────────────── PAUSED ──┘
//! ```
//!
//! At most one source node is connected to the narration destination.

pub mod decode;

pub use decode::{decode_base64, decode_pcm16, decode_speech};

use crate::config::NarrationConfig;
use crate::runtime::{AudioBuffer, AudioRuntime, NodeId, OfflineFactory, RuntimeFactory, RuntimeState};
use crate::Result;
use log::{debug, info, warn};
use std::sync::Arc;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Nothing playing; a loaded buffer starts from the beginning on `play`
    #[default]
    Idle,
    /// Source running
    Playing,
    /// Runtime clock suspended mid-playback
    Paused,
}

/// Speech playback over a dedicated runtime
pub struct NarrationTransport {
    config: NarrationConfig,
    factory: Box<dyn RuntimeFactory>,
    runtime: Option<AudioRuntime>,
    unavailable: bool,
    buffer: Option<Arc<AudioBuffer>>,
    source: Option<NodeId>,
    state: TransportState,
}

impl NarrationTransport {
    /// Create a transport that obtains its runtime from `factory` on first use
    pub fn new(config: NarrationConfig, factory: impl RuntimeFactory + 'static) -> Self {
        NarrationTransport {
            config,
            factory: Box::new(factory),
            runtime: None,
            unavailable: false,
            buffer: None,
            source: None,
            state: TransportState::Idle,
        }
    }

    /// Create a transport on a headless runtime driven by [`render`](Self::render)
    pub fn offline(config: NarrationConfig) -> Self {
        Self::new(config, OfflineFactory)
    }

    /// Transport configuration
    pub fn config(&self) -> &NarrationConfig {
        &self.config
    }

    /// Replace the loaded buffer; any live playback is stopped first
    pub fn load(&mut self, buffer: Arc<AudioBuffer>) {
        self.release_source();
        debug!(
            "narration loaded: {:.2}s at {} Hz",
            buffer.duration(),
            buffer.sample_rate()
        );
        self.buffer = Some(buffer);
        self.state = TransportState::Idle;
    }

    /// Start the loaded buffer from the beginning, or resume after a pause
    pub fn play(&mut self) {
        match self.state {
            TransportState::Playing => {}
            TransportState::Paused => {
                let Some(runtime) = self.ready_runtime() else {
                    return;
                };
                if let Err(err) = runtime.resume() {
                    warn!("narration resume failed: {}", err);
                    return;
                }
                self.state = TransportState::Playing;
                debug!("narration resumed");
            }
            TransportState::Idle => {
                let Some(buffer) = self.buffer.clone() else {
                    debug!("narration play ignored: nothing loaded");
                    return;
                };
                let Some(runtime) = self.ready_runtime() else {
                    return;
                };
                if runtime.state() == RuntimeState::Suspended {
                    if let Err(err) = runtime.resume() {
                        debug!("narration runtime resume ignored: {}", err);
                    }
                }
                match start_source(&runtime, buffer) {
                    Ok(source) => {
                        self.source = Some(source);
                        self.state = TransportState::Playing;
                        info!("narration playing");
                    }
                    Err(err) => warn!("narration playback failed: {}", err),
                }
            }
        }
    }

    /// Suspend the runtime clock while playing
    pub fn pause(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        let Some(runtime) = &self.runtime else {
            return;
        };
        match runtime.suspend() {
            Ok(()) => {
                self.state = TransportState::Paused;
                debug!("narration paused");
            }
            Err(err) => warn!("narration pause failed: {}", err),
        }
    }

    /// Stop playback; the loaded buffer is kept
    pub fn stop(&mut self) {
        if self.state == TransportState::Idle && self.source.is_none() {
            return;
        }
        self.release_source();
        self.state = TransportState::Idle;
        debug!("narration stopped");
    }

    /// Handle end-of-playback; true when the current source finished
    pub fn poll(&mut self) -> bool {
        let Some(runtime) = &self.runtime else {
            return false;
        };
        let ended = runtime.take_ended();
        match self.source {
            Some(source) if ended.contains(&source) => {
                if let Err(err) = runtime.disconnect(source) {
                    debug!("narration source release ignored: {}", err);
                }
                self.source = None;
                self.state = TransportState::Idle;
                info!("narration finished");
                true
            }
            _ => false,
        }
    }

    /// Render interleaved frames from the transport's runtime, then [`poll`](Self::poll)
    pub fn render(&mut self, out: &mut [f32], channels: u16) -> usize {
        let frames = match &self.runtime {
            Some(runtime) => runtime.render(out, channels),
            None => {
                out.fill(0.0);
                out.len() / channels.max(1) as usize
            }
        };
        self.poll();
        frames
    }

    /// Stop playback and close the runtime
    pub fn shutdown(&mut self) {
        self.release_source();
        self.state = TransportState::Idle;
        if let Some(runtime) = self.runtime.take() {
            runtime.close();
        }
    }

    /// Current state
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Source node of the current playback
    pub fn current_source(&self) -> Option<NodeId> {
        self.source
    }

    /// Loaded buffer
    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    /// Narration runtime, once created
    pub fn runtime(&self) -> Option<&AudioRuntime> {
        self.runtime.as_ref()
    }

    fn ready_runtime(&mut self) -> Option<AudioRuntime> {
        if self.unavailable {
            return None;
        }
        if let Some(runtime) = &self.runtime {
            return Some(runtime.clone());
        }
        match self.factory.create_runtime(self.config.sample_rate) {
            Ok(runtime) => {
                info!("narration runtime ready at {} Hz", runtime.sample_rate());
                self.runtime = Some(runtime.clone());
                Some(runtime)
            }
            Err(err) => {
                warn!("narration audio unavailable: {}", err);
                self.unavailable = true;
                None
            }
        }
    }

    fn release_source(&mut self) {
        let (Some(source), Some(runtime)) = (self.source.take(), &self.runtime) else {
            return;
        };
        if let Err(err) = runtime.stop(source, runtime.current_time()) {
            debug!("narration source stop ignored: {}", err);
        }
        if let Err(err) = runtime.disconnect(source) {
            debug!("narration source release ignored: {}", err);
        }
    }
}

impl Drop for NarrationTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn start_source(runtime: &AudioRuntime, buffer: Arc<AudioBuffer>) -> Result<NodeId> {
    let source = runtime.create_buffer_source(buffer, false)?;
    let started = runtime
        .connect(source, runtime.destination())
        .and_then(|_| runtime.start(source, runtime.current_time()));
    if let Err(err) = started {
        if let Err(release) = runtime.disconnect(source) {
            debug!("narration source release ignored: {}", release);
        }
        return Err(err);
    }
    Ok(source)
}
