//! Audio Runtime
//!
//! Shared handle to an audio processing graph with a real-time sample clock.
//! Control code mutates the graph through [`AudioRuntime`] methods while the
//! renderer (an output device thread or an offline caller) pulls interleaved
//! blocks through [`AudioRuntime::render`]; both sides go through one mutex.
//!
//! The clock only advances while rendering in the running state, so
//! suspending a runtime freezes every source at its current position.

mod buffer;
mod graph;
mod nodes;
pub mod param;
pub mod scheduler;

pub use buffer::AudioBuffer;
pub use nodes::{FilterKind, ParamKind, SourceState, Waveform};
pub use scheduler::{TaskId, TaskScheduler};

use crate::{AudioError, Result};
use graph::AudioGraph;
use nodes::NodeKind;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Identity of a node within one runtime; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Clock advances while rendering
    Running,
    /// Renders silence, clock frozen
    Suspended,
    /// Torn down; renders silence, no new nodes
    Closed,
}

/// Cloneable handle to a shared audio graph
#[derive(Clone)]
pub struct AudioRuntime {
    graph: Arc<Mutex<AudioGraph>>,
}

impl fmt::Debug for AudioRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph.lock();
        f.debug_struct("AudioRuntime")
            .field("sample_rate", &graph.sample_rate())
            .field("current_time", &graph.current_time())
            .field("state", &graph.state())
            .field("nodes", &graph.node_count())
            .finish()
    }
}

impl AudioRuntime {
    /// Create a running runtime at `sample_rate`
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AudioError::ConfigError(
                "runtime sample rate must be positive".into(),
            ));
        }
        Ok(AudioRuntime {
            graph: Arc::new(Mutex::new(AudioGraph::new(sample_rate))),
        })
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.graph.lock().sample_rate()
    }

    /// Clock position in seconds
    pub fn current_time(&self) -> f64 {
        self.graph.lock().current_time()
    }

    /// Lifecycle state
    pub fn state(&self) -> RuntimeState {
        self.graph.lock().state()
    }

    /// The output node every audible chain ends in
    pub fn destination(&self) -> NodeId {
        AudioGraph::DESTINATION
    }

    /// Freeze the clock; rendering yields silence
    pub fn suspend(&self) -> Result<()> {
        self.graph.lock().set_state(RuntimeState::Suspended)
    }

    /// Restart the clock after [`suspend`](Self::suspend)
    pub fn resume(&self) -> Result<()> {
        self.graph.lock().set_state(RuntimeState::Running)
    }

    /// Tear down; subsequent node creation fails with `RuntimeClosed`
    pub fn close(&self) {
        // Closing an already closed runtime is fine
        let _ = self.graph.lock().set_state(RuntimeState::Closed);
    }

    /// Number of live nodes, destination included
    pub fn node_count(&self) -> usize {
        self.graph.lock().node_count()
    }

    /// True while `node` is part of the graph
    pub fn contains(&self, node: NodeId) -> bool {
        self.graph.lock().contains(node)
    }

    /// Nodes currently feeding `node`
    pub fn inputs(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.graph.lock().inputs(node)
    }

    /// Create a gain node
    pub fn create_gain(&self, gain: f32) -> Result<NodeId> {
        self.graph.lock().add_node(NodeKind::gain(gain))
    }

    /// Create an (unstarted) oscillator
    pub fn create_oscillator(&self, waveform: Waveform, frequency: f32) -> Result<NodeId> {
        self.graph
            .lock()
            .add_node(NodeKind::oscillator(waveform, frequency))
    }

    /// Create a biquad filter
    pub fn create_biquad_filter(&self, kind: FilterKind, frequency: f32, q: f32) -> Result<NodeId> {
        self.graph
            .lock()
            .add_node(NodeKind::biquad(kind, frequency, q))
    }

    /// Create an (unstarted) buffer source
    pub fn create_buffer_source(&self, buffer: Arc<AudioBuffer>, looping: bool) -> Result<NodeId> {
        self.graph
            .lock()
            .add_node(NodeKind::buffer_source(buffer, looping))
    }

    /// Route the output of `src` into `dst`
    pub fn connect(&self, src: NodeId, dst: NodeId) -> Result<()> {
        self.graph.lock().connect(src, dst)
    }

    /// Remove `node` and all of its connections
    ///
    /// A node can only be disconnected once; the second call reports
    /// `UnknownNode`.
    pub fn disconnect(&self, node: NodeId) -> Result<()> {
        self.graph.lock().disconnect(node)
    }

    /// Schedule a source to start at runtime time `when`
    pub fn start(&self, node: NodeId, when: f64) -> Result<()> {
        self.graph.lock().start(node, when)
    }

    /// Schedule a source to stop at runtime time `when`
    ///
    /// Stopping a source that has already ended is a no-op.
    pub fn stop(&self, node: NodeId, when: f64) -> Result<()> {
        self.graph.lock().stop(node, when)
    }

    /// Playback state of a source node
    pub fn source_state(&self, node: NodeId) -> Result<SourceState> {
        self.graph.lock().source_state(node)
    }

    /// Read position of a buffer source, in seconds of buffer time
    pub fn buffer_position(&self, node: NodeId) -> Result<f64> {
        self.graph.lock().buffer_position(node)
    }

    /// Sources that ended since the last call
    pub fn take_ended(&self) -> Vec<NodeId> {
        self.graph.lock().take_ended()
    }

    /// Parameter value at the current clock position
    pub fn param_value(&self, node: NodeId, param: ParamKind) -> Result<f32> {
        let graph = self.graph.lock();
        let now = graph.current_time();
        Ok(graph.param(node, param)?.value_at(now))
    }

    /// Parameter value at an arbitrary time, following scheduled automation
    pub fn param_value_at(&self, node: NodeId, param: ParamKind, time: f64) -> Result<f32> {
        Ok(self.graph.lock().param(node, param)?.value_at(time))
    }

    /// Assign a parameter value now
    pub fn set_param(&self, node: NodeId, param: ParamKind, value: f32) -> Result<()> {
        let mut graph = self.graph.lock();
        let now = graph.current_time();
        graph.param_mut(node, param)?.set_value(value, now);
        Ok(())
    }

    /// Jump a parameter to `value` at `time`
    pub fn set_value_at_time(&self, node: NodeId, param: ParamKind, value: f32, time: f64) -> Result<()> {
        self.graph
            .lock()
            .param_mut(node, param)?
            .set_value_at_time(value, time);
        Ok(())
    }

    /// Linear ramp of a parameter to `value` at `end_time`
    pub fn linear_ramp_to_value_at_time(
        &self,
        node: NodeId,
        param: ParamKind,
        value: f32,
        end_time: f64,
    ) -> Result<()> {
        let mut graph = self.graph.lock();
        let now = graph.current_time();
        graph
            .param_mut(node, param)?
            .linear_ramp_to_value_at_time(value, end_time, now);
        Ok(())
    }

    /// Exponential ramp of a parameter to `value` at `end_time`
    pub fn exponential_ramp_to_value_at_time(
        &self,
        node: NodeId,
        param: ParamKind,
        value: f32,
        end_time: f64,
    ) -> Result<()> {
        let mut graph = self.graph.lock();
        let now = graph.current_time();
        graph
            .param_mut(node, param)?
            .exponential_ramp_to_value_at_time(value, end_time, now);
        Ok(())
    }

    /// Exponential approach of a parameter to `target` from `start_time`
    pub fn set_target_at_time(
        &self,
        node: NodeId,
        param: ParamKind,
        target: f32,
        start_time: f64,
        time_constant: f64,
    ) -> Result<()> {
        self.graph
            .lock()
            .param_mut(node, param)?
            .set_target_at_time(target, start_time, time_constant);
        Ok(())
    }

    /// Drop a parameter's automation at or after `time`
    pub fn cancel_scheduled_values(&self, node: NodeId, param: ParamKind, time: f64) -> Result<()> {
        self.graph
            .lock()
            .param_mut(node, param)?
            .cancel_scheduled_values(time);
        Ok(())
    }

    /// Render interleaved frames into `out`, returning the frame count
    pub fn render(&self, out: &mut [f32], channels: u16) -> usize {
        self.graph.lock().render(out, channels)
    }

    /// Render `seconds` of mono output
    pub fn render_seconds(&self, seconds: f64) -> Vec<f32> {
        let frames = (seconds * self.sample_rate() as f64).round().max(0.0) as usize;
        let mut out = vec![0.0; frames];
        self.render(&mut out, 1);
        out
    }
}

/// Creates runtimes for the audio subsystems on first use
///
/// A failing factory models a host without audio support; subsystems log the
/// failure and degrade to silent no-ops.
pub trait RuntimeFactory {
    /// Build a runtime running at `sample_rate`
    fn create_runtime(&mut self, sample_rate: u32) -> Result<AudioRuntime>;
}

/// Factory for headless runtimes driven by explicit `render` calls
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFactory;

impl RuntimeFactory for OfflineFactory {
    fn create_runtime(&mut self, sample_rate: u32) -> Result<AudioRuntime> {
        AudioRuntime::new(sample_rate)
    }
}
