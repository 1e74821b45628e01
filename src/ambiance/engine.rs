//! Ambiance Engine
//!
//! Owns the ambiance runtime, its master gain and the live soundscape.
//!
//! Tag changes build a fresh soundscape and cross-fade to it: the outgoing
//! scene gain ramps to silence while the incoming one ramps to unity over the
//! same window, and the outgoing voices are torn down by a deferred task once
//! the fade has finished. Deferred tasks and finished one-shots are handled by
//! [`AmbianceEngine::process`], which the host calls from its control loop
//! (or implicitly through [`AmbianceEngine::render`] when driving offline).
//!
//! If the runtime cannot be created the engine logs a warning once and every
//! later call is a silent no-op.

use super::composer::{compose_soundscape, Soundscape};
use super::noise::create_noise_buffer;
use super::sfx::{play_one_shot, OneShot, SfxKind};
use super::{AmbianceTag, WeatherTag};
use crate::config::EngineConfig;
use crate::runtime::{
    AudioBuffer, AudioRuntime, NodeId, OfflineFactory, ParamKind, RuntimeFactory, RuntimeState,
    TaskScheduler,
};
use crate::Result;
use log::{debug, info, warn};
use std::sync::Arc;

/// Runtime resources created on first use
struct Output {
    runtime: AudioRuntime,
    master: NodeId,
    noise: Arc<AudioBuffer>,
}

/// Procedural ambiance with cross-faded soundscapes and one-shot effects
pub struct AmbianceEngine {
    config: EngineConfig,
    factory: Box<dyn RuntimeFactory>,
    output: Option<Output>,
    unavailable: bool,
    current: Option<Soundscape>,
    teardowns: TaskScheduler<Soundscape>,
    one_shots: Vec<OneShot>,
    builds: usize,
}

impl AmbianceEngine {
    /// Create an engine that obtains its runtime from `factory` on first use
    pub fn new(config: EngineConfig, factory: impl RuntimeFactory + 'static) -> Self {
        AmbianceEngine {
            config,
            factory: Box::new(factory),
            output: None,
            unavailable: false,
            current: None,
            teardowns: TaskScheduler::new(),
            one_shots: Vec::new(),
            builds: 0,
        }
    }

    /// Create an engine on a headless runtime driven by [`render`](Self::render)
    pub fn offline(config: EngineConfig) -> Self {
        Self::new(config, OfflineFactory)
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create the runtime and master gain if needed and resume a suspended runtime
    ///
    /// Returns false when audio is unavailable.
    pub fn ensure_ready(&mut self) -> bool {
        self.ready_runtime().is_some()
    }

    /// Switch to the soundscape for (`ambiance`, `weather`)
    ///
    /// Does nothing when both tags match the current soundscape.
    pub fn set_ambiance(&mut self, ambiance: AmbianceTag, weather: WeatherTag) {
        let Some(runtime) = self.ready_runtime() else {
            return;
        };
        if self.current_tags() == Some((ambiance, weather)) {
            return;
        }

        let now = runtime.current_time();
        let fade = self.config.crossfade_secs;

        if let Some(outgoing) = self.current.take() {
            fade_to(&runtime, outgoing.scene_gain(), 0.0, now, now + fade);
            let due = now + fade + self.config.teardown_grace_secs;
            self.teardowns.schedule(due, outgoing);
            debug!("scheduled soundscape teardown at {:.3}s", due);
        }

        match self.build_soundscape(&runtime, ambiance, weather) {
            Ok(incoming) => {
                fade_to(&runtime, incoming.scene_gain(), 1.0, now, now + fade);
                info!(
                    "ambiance -> {}/{} ({} voices)",
                    ambiance,
                    weather,
                    incoming.voices().len()
                );
                self.builds += 1;
                self.current = Some(incoming);
            }
            Err(err) => warn!("failed to build {}/{} soundscape: {}", ambiance, weather, err),
        }
    }

    /// Fire a one-shot effect through its own gain into the master bus
    ///
    /// The live soundscape is not touched.
    pub fn play_sfx(&mut self, kind: SfxKind) {
        let Some(runtime) = self.ready_runtime() else {
            return;
        };
        let Some(master) = self.output.as_ref().map(|o| o.master) else {
            return;
        };
        match play_one_shot(&runtime, kind, master, self.config.sfx_gain) {
            Ok(shot) => {
                debug!("one-shot {} started", kind);
                self.one_shots.push(shot);
            }
            Err(err) => warn!("failed to play {}: {}", kind, err),
        }
    }

    /// Fade the current soundscape out and forget the current tags
    ///
    /// Does nothing before the runtime exists.
    pub fn stop_all(&mut self) {
        if self.output.is_none() {
            return;
        }
        let Some(runtime) = self.ready_runtime() else {
            return;
        };
        if let Some(outgoing) = self.current.take() {
            let now = runtime.current_time();
            fade_to(
                &runtime,
                outgoing.scene_gain(),
                0.0,
                now,
                now + self.config.stop_fade_secs,
            );
            self.teardowns.schedule(now + self.config.stop_grace_secs, outgoing);
            info!("ambiance stopped");
        }
    }

    /// Run due teardowns and release finished one-shots
    pub fn process(&mut self) {
        let Some(runtime) = self.output.as_ref().map(|o| o.runtime.clone()) else {
            return;
        };

        for soundscape in self.teardowns.take_due(runtime.current_time()) {
            debug!(
                "tearing down {}/{} soundscape",
                soundscape.ambiance(),
                soundscape.weather()
            );
            soundscape.teardown(&runtime);
        }

        let ended = runtime.take_ended();
        if ended.is_empty() {
            return;
        }
        for source in ended {
            for shot in self
                .one_shots
                .iter_mut()
                .filter(|s| s.pending_sources().contains(&source))
            {
                shot.source_ended(source);
            }
        }
        self.one_shots.retain(|shot| {
            if shot.is_finished() {
                shot.release(&runtime);
                false
            } else {
                true
            }
        });
    }

    /// Render interleaved frames from the engine's runtime, then [`process`](Self::process)
    ///
    /// Renders silence before the runtime exists.
    pub fn render(&mut self, out: &mut [f32], channels: u16) -> usize {
        let frames = match &self.output {
            Some(output) => output.runtime.render(out, channels),
            None => {
                out.fill(0.0);
                out.len() / channels.max(1) as usize
            }
        };
        self.process();
        frames
    }

    /// Tear everything down now and close the runtime
    ///
    /// Pending teardowns are cancelled and executed immediately. A later call
    /// to any operation creates a fresh runtime.
    pub fn shutdown(&mut self) {
        let Some(output) = self.output.take() else {
            return;
        };
        let runtime = &output.runtime;
        for soundscape in self.teardowns.drain_all() {
            soundscape.teardown(runtime);
        }
        if let Some(current) = self.current.take() {
            current.teardown(runtime);
        }
        for shot in self.one_shots.drain(..) {
            shot.release(runtime);
        }
        if let Err(err) = runtime.disconnect(output.master) {
            debug!("master gain release ignored: {}", err);
        }
        runtime.close();
        info!("ambiance engine shut down");
    }

    /// Tags of the live soundscape
    pub fn current_tags(&self) -> Option<(AmbianceTag, WeatherTag)> {
        self.current.as_ref().map(|s| (s.ambiance(), s.weather()))
    }

    /// Live soundscape
    pub fn soundscape(&self) -> Option<&Soundscape> {
        self.current.as_ref()
    }

    /// Scene gain of the live soundscape
    pub fn scene_gain(&self) -> Option<NodeId> {
        self.current.as_ref().map(|s| s.scene_gain())
    }

    /// Voices of the live soundscape
    pub fn active_voice_count(&self) -> usize {
        self.current.as_ref().map_or(0, |s| s.voices().len())
    }

    /// Number of soundscapes built since creation
    pub fn soundscape_builds(&self) -> usize {
        self.builds
    }

    /// Outgoing soundscapes still waiting for their teardown
    pub fn pending_teardowns(&self) -> usize {
        self.teardowns.len()
    }

    /// One-shot effects still sounding
    pub fn one_shot_count(&self) -> usize {
        self.one_shots.len()
    }

    /// Ambiance runtime, once created
    pub fn runtime(&self) -> Option<&AudioRuntime> {
        self.output.as_ref().map(|o| &o.runtime)
    }

    /// Master gain node, once created
    pub fn master_gain(&self) -> Option<NodeId> {
        self.output.as_ref().map(|o| o.master)
    }

    /// False once runtime creation has failed
    pub fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn ready_runtime(&mut self) -> Option<AudioRuntime> {
        if self.unavailable {
            return None;
        }
        if let Some(output) = &self.output {
            if output.runtime.state() == RuntimeState::Suspended {
                if let Err(err) = output.runtime.resume() {
                    debug!("ambiance resume ignored: {}", err);
                }
            }
            return Some(output.runtime.clone());
        }
        match self.initialize() {
            Ok(output) => {
                let runtime = output.runtime.clone();
                self.output = Some(output);
                Some(runtime)
            }
            Err(err) => {
                warn!("ambiance audio unavailable: {}", err);
                self.unavailable = true;
                None
            }
        }
    }

    fn initialize(&mut self) -> Result<Output> {
        let runtime = self.factory.create_runtime(self.config.sample_rate)?;
        let master = runtime.create_gain(self.config.master_gain)?;
        runtime.connect(master, runtime.destination())?;
        let noise = Arc::new(create_noise_buffer(runtime.sample_rate())?);
        info!(
            "ambiance runtime ready at {} Hz, master {:.2}",
            runtime.sample_rate(),
            self.config.master_gain
        );
        Ok(Output {
            runtime,
            master,
            noise,
        })
    }

    /// New scene gain at 0 on the master bus with every voice started
    fn build_soundscape(
        &self,
        runtime: &AudioRuntime,
        ambiance: AmbianceTag,
        weather: WeatherTag,
    ) -> Result<Soundscape> {
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| crate::AudioError::from("ambiance runtime not initialized"))?;
        let scene = runtime.create_gain(0.0)?;
        let voices = runtime
            .connect(scene, output.master)
            .and_then(|_| compose_soundscape(runtime, &output.noise, ambiance, weather, scene));
        match voices {
            Ok(voices) => Ok(Soundscape::new(ambiance, weather, scene, voices)),
            Err(err) => {
                if let Err(release) = runtime.disconnect(scene) {
                    debug!("scene gain release ignored: {}", release);
                }
                Err(err)
            }
        }
    }
}

impl Drop for AmbianceEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Cancel automation on a gain, pin its current value and ramp linearly to `target`
fn fade_to(runtime: &AudioRuntime, gain: NodeId, target: f32, start: f64, end: f64) {
    let result = runtime
        .param_value(gain, ParamKind::Gain)
        .and_then(|value| {
            runtime.cancel_scheduled_values(gain, ParamKind::Gain, start)?;
            runtime.set_value_at_time(gain, ParamKind::Gain, value, start)?;
            runtime.linear_ramp_to_value_at_time(gain, ParamKind::Gain, target, end)
        });
    if let Err(err) = result {
        debug!("fade of {} ignored: {}", gain, err);
    }
}
