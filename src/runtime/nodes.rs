//! Graph node processors
//!
//! Per-sample processing for every node kind. Nodes are mono: each one sums
//! its inputs into a single sample and produces a single sample.

use super::buffer::AudioBuffer;
use super::param::AudioParam;
use crate::{AudioError, Result};
use std::f32::consts::PI;
use std::sync::Arc;

/// Periodic oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    /// Pure sine
    Sine,
    /// Naive square (50% duty)
    Square,
    /// Rising sawtooth
    Sawtooth,
    /// Symmetric triangle
    Triangle,
}

/// Biquad filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Resonant low-pass, Q in dB
    Lowpass,
    /// Resonant high-pass, Q in dB
    Highpass,
    /// Band-pass with 0 dB peak, Q linear
    Bandpass,
}

/// Addressable automatable parameter of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Gain node level
    Gain,
    /// Oscillator or filter frequency in Hz
    Frequency,
    /// Filter resonance
    Q,
}

/// Lifecycle of a scheduled source node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Created, `start` not called yet
    Unscheduled,
    /// Start time set but not reached
    Scheduled,
    /// Producing sound
    Playing,
    /// Stopped or ran out of data
    Ended,
}

/// Start/stop bookkeeping shared by the source node kinds
#[derive(Debug, Clone)]
pub(crate) struct SourceSchedule {
    start: f64,
    stop: Option<f64>,
    state: SourceState,
    notify: bool,
}

impl SourceSchedule {
    fn new() -> Self {
        SourceSchedule {
            start: 0.0,
            stop: None,
            state: SourceState::Unscheduled,
            notify: false,
        }
    }

    fn start(&mut self, when: f64) -> Result<()> {
        if self.state != SourceState::Unscheduled {
            return Err(AudioError::InvalidNodeState(
                "source node can only be started once".into(),
            ));
        }
        self.start = when;
        self.state = SourceState::Scheduled;
        Ok(())
    }

    fn stop(&mut self, when: f64) -> Result<()> {
        match self.state {
            SourceState::Unscheduled => Err(AudioError::InvalidNodeState(
                "cannot stop a source that was never started".into(),
            )),
            SourceState::Ended => Ok(()),
            SourceState::Scheduled | SourceState::Playing => {
                self.stop = Some(when);
                Ok(())
            }
        }
    }

    /// Advance to time `t`; true while the source should produce output
    fn tick(&mut self, t: f64) -> bool {
        match self.state {
            SourceState::Unscheduled | SourceState::Ended => false,
            SourceState::Scheduled | SourceState::Playing => {
                if self.stop.is_some_and(|stop| t >= stop) {
                    self.finish();
                    return false;
                }
                if t >= self.start {
                    self.state = SourceState::Playing;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn finish(&mut self) {
        if self.state != SourceState::Ended {
            self.state = SourceState::Ended;
            self.notify = true;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GainNode {
    gain: AudioParam,
}

#[derive(Debug, Clone)]
pub(crate) struct OscillatorNode {
    waveform: Waveform,
    frequency: AudioParam,
    phase: f32,
    schedule: SourceSchedule,
}

impl OscillatorNode {
    fn process(&mut self, t: f64, sample_rate: f32) -> f32 {
        if !self.schedule.tick(t) {
            return 0.0;
        }
        let phase = self.phase;
        let out = match self.waveform {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        };
        let freq = self.frequency.value_at(t).max(0.0);
        self.phase = (phase + freq / sample_rate).fract();
        out
    }
}

/// RBJ cookbook biquad, direct form I
#[derive(Debug, Clone)]
pub(crate) struct BiquadFilterNode {
    kind: FilterKind,
    frequency: AudioParam,
    q: AudioParam,
    coeffs_for: Option<(f32, f32)>,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadFilterNode {
    fn update_coefficients(&mut self, cutoff: f32, q: f32, sample_rate: f32) {
        if self.coeffs_for == Some((cutoff, q)) {
            return;
        }
        self.coeffs_for = Some((cutoff, q));

        let nyquist = sample_rate * 0.5;
        let freq = cutoff.clamp(1.0, nyquist * 0.999);
        let w0 = 2.0 * PI * (freq / sample_rate);
        let (sin_w0, cos_w0) = w0.sin_cos();

        let (b0, b1, b2, alpha) = match self.kind {
            FilterKind::Lowpass => {
                let alpha = sin_w0 / (2.0 * 10f32.powf(q / 20.0));
                let b1 = 1.0 - cos_w0;
                (b1 * 0.5, b1, b1 * 0.5, alpha)
            }
            FilterKind::Highpass => {
                let alpha = sin_w0 / (2.0 * 10f32.powf(q / 20.0));
                let b1 = -(1.0 + cos_w0);
                (-b1 * 0.5, b1, -b1 * 0.5, alpha)
            }
            FilterKind::Bandpass => {
                let alpha = sin_w0 / (2.0 * q.max(1e-4));
                (alpha, 0.0, -alpha, alpha)
            }
        };
        let a0 = 1.0 + alpha;
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = (-2.0 * cos_w0) / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    fn process(&mut self, x: f32, t: f64, sample_rate: f32) -> f32 {
        let cutoff = self.frequency.value_at(t);
        let q = self.q.value_at(t);
        self.update_coefficients(cutoff, q, sample_rate);
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BufferSourceNode {
    buffer: Arc<AudioBuffer>,
    looping: bool,
    /// Read position in buffer frames
    position: f64,
    schedule: SourceSchedule,
}

impl BufferSourceNode {
    fn process(&mut self, t: f64, sample_rate: f32) -> f32 {
        if !self.schedule.tick(t) {
            return 0.0;
        }
        let length = self.buffer.length();
        if length == 0 {
            self.schedule.finish();
            return 0.0;
        }
        if self.position >= length as f64 {
            if self.looping {
                self.position %= length as f64;
            } else {
                self.schedule.finish();
                return 0.0;
            }
        }

        let index = self.position as usize;
        let frac = (self.position - index as f64) as f32;
        let next = if index + 1 < length {
            index + 1
        } else if self.looping {
            0
        } else {
            index
        };
        let a = self.buffer.mono_frame(index);
        let b = self.buffer.mono_frame(next);
        self.position += self.buffer.sample_rate() as f64 / sample_rate as f64;
        a + (b - a) * frac
    }
}

/// Node processor variants
#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Destination,
    Gain(GainNode),
    Oscillator(OscillatorNode),
    Filter(BiquadFilterNode),
    BufferSource(BufferSourceNode),
}

impl NodeKind {
    pub(crate) fn gain(value: f32) -> Self {
        NodeKind::Gain(GainNode {
            gain: AudioParam::new(value),
        })
    }

    pub(crate) fn oscillator(waveform: Waveform, frequency: f32) -> Self {
        NodeKind::Oscillator(OscillatorNode {
            waveform,
            frequency: AudioParam::new(frequency),
            phase: 0.0,
            schedule: SourceSchedule::new(),
        })
    }

    pub(crate) fn biquad(kind: FilterKind, frequency: f32, q: f32) -> Self {
        NodeKind::Filter(BiquadFilterNode {
            kind,
            frequency: AudioParam::new(frequency),
            q: AudioParam::new(q),
            coeffs_for: None,
            b0: 0.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        })
    }

    pub(crate) fn buffer_source(buffer: Arc<AudioBuffer>, looping: bool) -> Self {
        NodeKind::BufferSource(BufferSourceNode {
            buffer,
            looping,
            position: 0.0,
            schedule: SourceSchedule::new(),
        })
    }

    /// Source nodes generate sound and accept no inputs
    pub(crate) fn is_source(&self) -> bool {
        matches!(self, NodeKind::Oscillator(_) | NodeKind::BufferSource(_))
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            NodeKind::Destination => "destination",
            NodeKind::Gain(_) => "gain",
            NodeKind::Oscillator(_) => "oscillator",
            NodeKind::Filter(_) => "biquad",
            NodeKind::BufferSource(_) => "buffer source",
        }
    }

    pub(crate) fn process(&mut self, input: f32, t: f64, sample_rate: f32) -> f32 {
        match self {
            NodeKind::Destination => input,
            NodeKind::Gain(node) => input * node.gain.value_at(t),
            NodeKind::Oscillator(node) => node.process(t, sample_rate),
            NodeKind::Filter(node) => node.process(input, t, sample_rate),
            NodeKind::BufferSource(node) => node.process(t, sample_rate),
        }
    }

    fn schedule_mut(&mut self) -> Option<&mut SourceSchedule> {
        match self {
            NodeKind::Oscillator(node) => Some(&mut node.schedule),
            NodeKind::BufferSource(node) => Some(&mut node.schedule),
            _ => None,
        }
    }

    fn schedule(&self) -> Option<&SourceSchedule> {
        match self {
            NodeKind::Oscillator(node) => Some(&node.schedule),
            NodeKind::BufferSource(node) => Some(&node.schedule),
            _ => None,
        }
    }

    pub(crate) fn start(&mut self, when: f64) -> Result<()> {
        let name = self.name();
        self.schedule_mut()
            .ok_or_else(|| AudioError::InvalidNodeState(format!("{name} node cannot be started")))?
            .start(when)
    }

    pub(crate) fn stop(&mut self, when: f64) -> Result<()> {
        let name = self.name();
        self.schedule_mut()
            .ok_or_else(|| AudioError::InvalidNodeState(format!("{name} node cannot be stopped")))?
            .stop(when)
    }

    pub(crate) fn source_state(&self) -> Option<SourceState> {
        self.schedule().map(|s| s.state)
    }

    /// True exactly once after the source ended
    pub(crate) fn take_ended(&mut self) -> bool {
        match self.schedule_mut() {
            Some(schedule) if schedule.notify => {
                schedule.notify = false;
                true
            }
            _ => false,
        }
    }

    /// Playback position of a buffer source in seconds of buffer time
    pub(crate) fn buffer_position(&self) -> Option<f64> {
        match self {
            NodeKind::BufferSource(node) => {
                Some(node.position / node.buffer.sample_rate() as f64)
            }
            _ => None,
        }
    }

    pub(crate) fn param(&self, kind: ParamKind) -> Option<&AudioParam> {
        match (self, kind) {
            (NodeKind::Gain(node), ParamKind::Gain) => Some(&node.gain),
            (NodeKind::Oscillator(node), ParamKind::Frequency) => Some(&node.frequency),
            (NodeKind::Filter(node), ParamKind::Frequency) => Some(&node.frequency),
            (NodeKind::Filter(node), ParamKind::Q) => Some(&node.q),
            _ => None,
        }
    }

    pub(crate) fn param_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
        match (self, kind) {
            (NodeKind::Gain(node), ParamKind::Gain) => Some(&mut node.gain),
            (NodeKind::Oscillator(node), ParamKind::Frequency) => Some(&mut node.frequency),
            (NodeKind::Filter(node), ParamKind::Frequency) => Some(&mut node.frequency),
            (NodeKind::Filter(node), ParamKind::Q) => Some(&mut node.q),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f32 = 8_000.0;

    #[test]
    fn test_oscillator_silent_until_started() {
        let mut osc = NodeKind::oscillator(Waveform::Square, 100.0);
        assert_eq!(osc.process(0.0, 0.0, SR), 0.0);
        osc.start(0.0).unwrap();
        assert_eq!(osc.process(0.0, 0.0, SR), 1.0);
        assert_eq!(osc.source_state(), Some(SourceState::Playing));
    }

    #[test]
    fn test_start_twice_is_an_error() {
        let mut osc = NodeKind::oscillator(Waveform::Sine, 100.0);
        osc.start(0.0).unwrap();
        assert!(osc.start(0.0).is_err());
    }

    #[test]
    fn test_stop_before_start_is_an_error() {
        let mut osc = NodeKind::oscillator(Waveform::Sine, 100.0);
        assert!(osc.stop(0.0).is_err());
    }

    #[test]
    fn test_stop_after_end_is_noop() {
        let mut osc = NodeKind::oscillator(Waveform::Sine, 100.0);
        osc.start(0.0).unwrap();
        osc.stop(0.01).unwrap();
        osc.process(0.0, 0.02, SR);
        assert_eq!(osc.source_state(), Some(SourceState::Ended));
        assert!(osc.take_ended());
        assert!(!osc.take_ended());
        assert!(osc.stop(0.03).is_ok());
        assert!(!osc.take_ended());
    }

    #[test]
    fn test_gain_scales_input() {
        let mut gain = NodeKind::gain(0.5);
        assert_relative_eq!(gain.process(0.8, 0.0, SR), 0.4);
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = NodeKind::biquad(FilterKind::Lowpass, 200.0, 0.0);
        let mut out = 0.0;
        for i in 0..4_000 {
            out = filter.process(1.0, i as f64 / SR as f64, SR);
        }
        assert_relative_eq!(out, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = NodeKind::biquad(FilterKind::Highpass, 800.0, 0.0);
        let mut out = 1.0;
        for i in 0..4_000 {
            out = filter.process(1.0, i as f64 / SR as f64, SR);
        }
        assert!(out.abs() < 1e-3);
    }

    #[test]
    fn test_buffer_source_ends_without_loop() {
        let buffer = Arc::new(AudioBuffer::from_channels(vec![vec![0.5; 4]], 8_000).unwrap());
        let mut source = NodeKind::buffer_source(buffer, false);
        source.start(0.0).unwrap();
        for i in 0..4 {
            assert_relative_eq!(source.process(0.0, i as f64 / SR as f64, SR), 0.5);
        }
        assert_eq!(source.process(0.0, 4.0 / SR as f64, SR), 0.0);
        assert!(source.take_ended());
    }

    #[test]
    fn test_buffer_source_loops() {
        let buffer = Arc::new(AudioBuffer::from_channels(vec![vec![0.25; 2]], 8_000).unwrap());
        let mut source = NodeKind::buffer_source(buffer, true);
        source.start(0.0).unwrap();
        for i in 0..10 {
            assert_relative_eq!(source.process(0.0, i as f64 / SR as f64, SR), 0.25);
        }
        assert!(!source.take_ended());
    }
}
