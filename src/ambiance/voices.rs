//! Voice Builders
//!
//! A voice is one sound-producing chain feeding a soundscape's scene gain:
//! - noise voice: looping noise buffer → biquad filter → gain → destination
//! - drone voice: oscillator → gain → destination
//!
//! Every node a builder creates is recorded in the [`Voice`], which is the only
//! way it can later be stopped and disconnected.

use crate::runtime::{AudioBuffer, AudioRuntime, FilterKind, NodeId, Waveform};
use crate::Result;
use log::debug;
use std::sync::Arc;

/// Specification of one soundscape layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerSpec {
    /// Filtered white noise
    Noise {
        /// Filter response
        filter: FilterKind,
        /// Cutoff or center frequency in Hz
        frequency: f32,
        /// Resonance
        q: f32,
        /// Relative level
        volume: f32,
    },
    /// Continuous oscillator
    Drone {
        /// Pitch in Hz
        frequency: f32,
        /// Oscillator shape
        waveform: Waveform,
        /// Relative level
        volume: f32,
    },
}

impl LayerSpec {
    /// Relative level of the layer
    pub fn volume(&self) -> f32 {
        match *self {
            LayerSpec::Noise { volume, .. } | LayerSpec::Drone { volume, .. } => volume,
        }
    }
}

/// A live, tracked voice
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    spec: LayerSpec,
    source: NodeId,
    filter: Option<NodeId>,
    gain: NodeId,
}

impl Voice {
    /// The layer this voice realizes
    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    /// Oscillator or noise source node
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Every node of the chain, source first
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = vec![self.source];
        nodes.extend(self.filter);
        nodes.push(self.gain);
        nodes
    }

    /// Stop the source and disconnect every node of the chain
    ///
    /// Node errors (already stopped, already gone) are logged and swallowed.
    pub fn teardown(&self, runtime: &AudioRuntime) {
        let now = runtime.current_time();
        if let Err(err) = runtime.stop(self.source, now) {
            debug!("voice {} stop ignored: {}", self.source, err);
        }
        release_nodes(runtime, &self.nodes());
    }
}

/// Disconnect `nodes`, swallowing per-node errors
pub(crate) fn release_nodes(runtime: &AudioRuntime, nodes: &[NodeId]) {
    for &node in nodes {
        if let Err(err) = runtime.disconnect(node) {
            debug!("disconnect of {} ignored: {}", node, err);
        }
    }
}

/// Builds voices into one destination and keeps track of them
pub struct VoiceBuilder<'a> {
    runtime: &'a AudioRuntime,
    noise: &'a Arc<AudioBuffer>,
    destination: NodeId,
    voices: Vec<Voice>,
}

impl<'a> VoiceBuilder<'a> {
    /// Start building voices that feed `destination`
    pub fn new(runtime: &'a AudioRuntime, noise: &'a Arc<AudioBuffer>, destination: NodeId) -> Self {
        VoiceBuilder {
            runtime,
            noise,
            destination,
            voices: Vec::new(),
        }
    }

    /// Build the voice described by `spec`
    pub fn layer(&mut self, spec: LayerSpec) -> Result<&mut Self> {
        match spec {
            LayerSpec::Noise {
                filter,
                frequency,
                q,
                volume,
            } => self.noise_voice(filter, frequency, q, volume),
            LayerSpec::Drone {
                frequency,
                waveform,
                volume,
            } => self.drone_voice(frequency, waveform, volume),
        }
    }

    /// Looping shared noise through one filter and a gain stage, started now
    pub fn noise_voice(
        &mut self,
        filter: FilterKind,
        frequency: f32,
        q: f32,
        volume: f32,
    ) -> Result<&mut Self> {
        let spec = LayerSpec::Noise {
            filter,
            frequency,
            q,
            volume,
        };
        let runtime = self.runtime;
        let mut created = Vec::with_capacity(3);
        let result = (|| -> Result<Voice> {
            let source = runtime.create_buffer_source(Arc::clone(self.noise), true)?;
            created.push(source);
            let filter_node = runtime.create_biquad_filter(filter, frequency, q)?;
            created.push(filter_node);
            let gain = runtime.create_gain(volume)?;
            created.push(gain);

            runtime.connect(source, filter_node)?;
            runtime.connect(filter_node, gain)?;
            runtime.connect(gain, self.destination)?;
            runtime.start(source, runtime.current_time())?;
            Ok(Voice {
                spec,
                source,
                filter: Some(filter_node),
                gain,
            })
        })();
        self.finish(result, &created)
    }

    /// Continuous oscillator through a gain stage, started now
    pub fn drone_voice(&mut self, frequency: f32, waveform: Waveform, volume: f32) -> Result<&mut Self> {
        let spec = LayerSpec::Drone {
            frequency,
            waveform,
            volume,
        };
        let runtime = self.runtime;
        let mut created = Vec::with_capacity(2);
        let result = (|| -> Result<Voice> {
            let source = runtime.create_oscillator(waveform, frequency)?;
            created.push(source);
            let gain = runtime.create_gain(volume)?;
            created.push(gain);

            runtime.connect(source, gain)?;
            runtime.connect(gain, self.destination)?;
            runtime.start(source, runtime.current_time())?;
            Ok(Voice {
                spec,
                source,
                filter: None,
                gain,
            })
        })();
        self.finish(result, &created)
    }

    /// Voices built so far
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Hand over the tracked voices
    pub fn into_voices(self) -> Vec<Voice> {
        self.voices
    }

    /// Tear down everything built so far (used when composition fails midway)
    pub fn abandon(self) {
        for voice in &self.voices {
            voice.teardown(self.runtime);
        }
    }

    fn finish(&mut self, result: Result<Voice>, created: &[NodeId]) -> Result<&mut Self> {
        match result {
            Ok(voice) => {
                self.voices.push(voice);
                Ok(self)
            }
            Err(err) => {
                // Partially built chain: nothing else references these nodes
                release_nodes(self.runtime, created);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ambiance::noise::create_noise_buffer;

    fn setup() -> (AudioRuntime, Arc<AudioBuffer>, NodeId) {
        let runtime = AudioRuntime::new(8_000).unwrap();
        let noise = Arc::new(create_noise_buffer(8_000).unwrap());
        let dest = runtime.create_gain(1.0).unwrap();
        runtime.connect(dest, runtime.destination()).unwrap();
        (runtime, noise, dest)
    }

    #[test]
    fn test_noise_voice_tracks_three_nodes() {
        let (runtime, noise, dest) = setup();
        let mut builder = VoiceBuilder::new(&runtime, &noise, dest);
        builder.noise_voice(FilterKind::Lowpass, 150.0, 0.0, 0.8).unwrap();
        let voices = builder.into_voices();
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].nodes().len(), 3);
        assert!(voices[0].nodes().iter().all(|&n| runtime.contains(n)));
        assert_eq!(
            runtime.source_state(voices[0].source()).unwrap(),
            crate::runtime::SourceState::Scheduled
        );
        assert_eq!(runtime.inputs(dest).unwrap().len(), 1);
    }

    #[test]
    fn test_drone_voice_tracks_two_nodes() {
        let (runtime, noise, dest) = setup();
        let mut builder = VoiceBuilder::new(&runtime, &noise, dest);
        builder
            .drone_voice(55.0, Waveform::Sine, 0.1)
            .unwrap()
            .drone_voice(110.0, Waveform::Triangle, 0.1)
            .unwrap();
        let voices = builder.into_voices();
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].nodes().len(), 2);
        assert_eq!(runtime.inputs(dest).unwrap().len(), 2);
    }

    #[test]
    fn test_teardown_releases_every_node() {
        let (runtime, noise, dest) = setup();
        let before = runtime.node_count();
        let mut builder = VoiceBuilder::new(&runtime, &noise, dest);
        builder.noise_voice(FilterKind::Bandpass, 400.0, 0.5, 0.3).unwrap();
        let voices = builder.into_voices();
        runtime.render_seconds(0.01);
        voices[0].teardown(&runtime);
        assert_eq!(runtime.node_count(), before);
        // A second teardown only logs
        voices[0].teardown(&runtime);
        assert_eq!(runtime.node_count(), before);
    }

    #[test]
    fn test_failed_build_leaves_nothing_behind() {
        let (runtime, noise, _dest) = setup();
        let before = runtime.node_count();
        let missing = {
            let gain = runtime.create_gain(1.0).unwrap();
            runtime.disconnect(gain).unwrap();
            gain
        };
        let mut builder = VoiceBuilder::new(&runtime, &noise, missing);
        assert!(builder.noise_voice(FilterKind::Lowpass, 100.0, 0.0, 0.1).is_err());
        assert!(builder.drone_voice(40.0, Waveform::Triangle, 0.1).is_err());
        assert!(builder.voices().is_empty());
        assert_eq!(runtime.node_count(), before);
    }
}
