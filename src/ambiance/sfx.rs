//! One-Shot Sound Effects
//!
//! Short UI cues synthesized on demand. Each cue owns its own output gain and
//! envelope nodes, stops its sources itself, and is released once every one of
//! its sources has reported the end of playback.

use super::voices::release_nodes;
use crate::runtime::{AudioRuntime, NodeId, ParamKind, Waveform};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog of one-shot effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SfxKind {
    /// Rising two-tone chime for choice selection
    Select,
}

impl fmt::Display for SfxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SfxKind::Select => f.write_str("SELECT"),
        }
    }
}

/// A cue in flight
#[derive(Debug, Clone)]
pub struct OneShot {
    kind: SfxKind,
    output: NodeId,
    pending: Vec<NodeId>,
    nodes: Vec<NodeId>,
}

impl OneShot {
    /// Effect being played
    pub fn kind(&self) -> SfxKind {
        self.kind
    }

    /// Gain node the cue feeds into the master bus
    pub fn output(&self) -> NodeId {
        self.output
    }

    /// Sources that have not ended yet
    pub fn pending_sources(&self) -> &[NodeId] {
        &self.pending
    }

    /// Every node owned by the cue
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Record the end of `source`; true once all sources have ended
    pub fn source_ended(&mut self, source: NodeId) -> bool {
        self.pending.retain(|&id| id != source);
        self.pending.is_empty()
    }

    /// True once all sources have ended
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stop any remaining source and disconnect every node
    pub fn release(&self, runtime: &AudioRuntime) {
        let now = runtime.current_time();
        for &source in &self.pending {
            if let Err(err) = runtime.stop(source, now) {
                log::debug!("one-shot source {} stop ignored: {}", source, err);
            }
        }
        release_nodes(runtime, &self.nodes);
    }
}

/// Start `kind` into `destination` through a gain of `level`
pub fn play_one_shot(
    runtime: &AudioRuntime,
    kind: SfxKind,
    destination: NodeId,
    level: f32,
) -> Result<OneShot> {
    let mut nodes = Vec::with_capacity(5);
    let mut sources = Vec::with_capacity(2);
    let result = match kind {
        SfxKind::Select => select_chime(runtime, destination, level, &mut nodes, &mut sources),
    };
    match result {
        Ok(output) => Ok(OneShot {
            kind,
            output,
            pending: sources,
            nodes,
        }),
        Err(err) => {
            release_nodes(runtime, &nodes);
            Err(err)
        }
    }
}

/// Sine sweep 440 → 659.25 Hz over a short triangle click
fn select_chime(
    runtime: &AudioRuntime,
    destination: NodeId,
    level: f32,
    nodes: &mut Vec<NodeId>,
    sources: &mut Vec<NodeId>,
) -> Result<NodeId> {
    let t = runtime.current_time();

    let output = runtime.create_gain(level)?;
    nodes.push(output);
    runtime.connect(output, destination)?;

    // Tone
    let tone = runtime.create_oscillator(Waveform::Sine, 440.0)?;
    nodes.push(tone);
    let tone_env = runtime.create_gain(0.0)?;
    nodes.push(tone_env);
    runtime.set_value_at_time(tone, ParamKind::Frequency, 440.0, t)?;
    runtime.exponential_ramp_to_value_at_time(tone, ParamKind::Frequency, 659.25, t + 0.1)?;
    runtime.set_value_at_time(tone_env, ParamKind::Gain, 0.0, t)?;
    runtime.linear_ramp_to_value_at_time(tone_env, ParamKind::Gain, 0.5, t + 0.02)?;
    runtime.exponential_ramp_to_value_at_time(tone_env, ParamKind::Gain, 0.001, t + 0.4)?;
    runtime.connect(tone, tone_env)?;
    runtime.connect(tone_env, output)?;

    // Click
    let click = runtime.create_oscillator(Waveform::Triangle, 1200.0)?;
    nodes.push(click);
    let click_env = runtime.create_gain(0.0)?;
    nodes.push(click_env);
    runtime.set_value_at_time(click_env, ParamKind::Gain, 0.0, t)?;
    runtime.linear_ramp_to_value_at_time(click_env, ParamKind::Gain, 0.3, t + 0.01)?;
    runtime.exponential_ramp_to_value_at_time(click_env, ParamKind::Gain, 0.001, t + 0.1)?;
    runtime.connect(click, click_env)?;
    runtime.connect(click_env, output)?;

    runtime.start(tone, t)?;
    sources.push(tone);
    runtime.stop(tone, t + 0.5)?;
    runtime.start(click, t)?;
    sources.push(click);
    runtime.stop(click, t + 0.2)?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SourceState;
    use approx::assert_relative_eq;

    fn runtime() -> AudioRuntime {
        AudioRuntime::new(8_000).unwrap()
    }

    #[test]
    fn test_select_builds_two_sources() {
        let runtime = runtime();
        let dest = runtime.destination();
        let shot = play_one_shot(&runtime, SfxKind::Select, dest, 0.4).unwrap();
        assert_eq!(shot.pending_sources().len(), 2);
        assert_eq!(shot.nodes().len(), 5);
        assert_relative_eq!(runtime.param_value(shot.output(), ParamKind::Gain).unwrap(), 0.4);
    }

    #[test]
    fn test_select_envelope_shape() {
        let runtime = runtime();
        let shot = play_one_shot(&runtime, SfxKind::Select, runtime.destination(), 0.4).unwrap();
        let tone = shot.nodes()[1];
        let tone_env = shot.nodes()[2];
        let click_env = shot.nodes()[4];

        let peak = runtime.param_value_at(tone_env, ParamKind::Gain, 0.02).unwrap();
        assert_relative_eq!(peak, 0.5, epsilon = 1e-4);
        let tail = runtime.param_value_at(tone_env, ParamKind::Gain, 0.4).unwrap();
        assert_relative_eq!(tail, 0.001, epsilon = 1e-5);
        let click_peak = runtime.param_value_at(click_env, ParamKind::Gain, 0.01).unwrap();
        assert_relative_eq!(click_peak, 0.3, epsilon = 1e-4);
        let swept = runtime.param_value_at(tone, ParamKind::Frequency, 0.1).unwrap();
        assert_relative_eq!(swept, 659.25, epsilon = 1e-2);
    }

    #[test]
    fn test_sources_end_by_half_second() {
        let runtime = runtime();
        let mut shot = play_one_shot(&runtime, SfxKind::Select, runtime.destination(), 0.4).unwrap();
        let out = runtime.render_seconds(0.25);
        assert!(out.iter().any(|s| s.abs() > 0.01));

        let ended = runtime.take_ended();
        assert_eq!(ended, vec![shot.nodes()[3]]);
        assert!(!shot.source_ended(ended[0]));

        runtime.render_seconds(0.3);
        let ended = runtime.take_ended();
        assert_eq!(ended, vec![shot.nodes()[1]]);
        assert!(shot.source_ended(ended[0]));
        assert_eq!(runtime.source_state(shot.nodes()[1]).unwrap(), SourceState::Ended);

        shot.release(&runtime);
        assert_eq!(runtime.node_count(), 1);
    }

    #[test]
    fn test_failed_cue_releases_nodes() {
        let runtime = runtime();
        let gone = runtime.create_gain(1.0).unwrap();
        runtime.disconnect(gone).unwrap();
        assert!(play_one_shot(&runtime, SfxKind::Select, gone, 0.4).is_err());
        assert_eq!(runtime.node_count(), 1);
    }
}
