//! Audio processing graph
//!
//! Owns the nodes, their connections and the sample clock. Rendering walks
//! the nodes in dependency order once per frame, so a node feeding several
//! destinations is still processed exactly once.

use super::nodes::{NodeKind, ParamKind, SourceState};
use super::param::AudioParam;
use super::{NodeId, RuntimeState};
use crate::{AudioError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug)]
struct GraphNode {
    kind: NodeKind,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
}

/// Processing order plus input indices into the per-frame output table
#[derive(Debug)]
struct RenderPlan {
    order: Vec<NodeId>,
    inputs: Vec<Vec<usize>>,
    destination: usize,
}

/// Node graph with a sample clock
#[derive(Debug)]
pub(crate) struct AudioGraph {
    sample_rate: u32,
    frame: u64,
    state: RuntimeState,
    next_id: u64,
    nodes: BTreeMap<NodeId, GraphNode>,
    plan: Option<RenderPlan>,
    ended: Vec<NodeId>,
    scratch: Vec<f32>,
}

impl AudioGraph {
    pub(crate) const DESTINATION: NodeId = NodeId(0);

    pub(crate) fn new(sample_rate: u32) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            Self::DESTINATION,
            GraphNode {
                kind: NodeKind::Destination,
                inputs: Vec::new(),
                outputs: Vec::new(),
            },
        );
        AudioGraph {
            sample_rate,
            frame: 0,
            state: RuntimeState::Running,
            next_id: 1,
            nodes,
            plan: None,
            ended: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    pub(crate) fn state(&self) -> RuntimeState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: RuntimeState) -> Result<()> {
        if self.state == RuntimeState::Closed && state != RuntimeState::Closed {
            return Err(AudioError::RuntimeClosed);
        }
        self.state = state;
        Ok(())
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub(crate) fn add_node(&mut self, kind: NodeKind) -> Result<NodeId> {
        if self.state == RuntimeState::Closed {
            return Err(AudioError::RuntimeClosed);
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            GraphNode {
                kind,
                inputs: Vec::new(),
                outputs: Vec::new(),
            },
        );
        self.plan = None;
        Ok(id)
    }

    pub(crate) fn connect(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        let src_node = self.nodes.get(&src).ok_or(AudioError::UnknownNode(src))?;
        if matches!(src_node.kind, NodeKind::Destination) {
            return Err(AudioError::InvalidNodeState(
                "destination has no output".into(),
            ));
        }
        let dst_node = self.nodes.get(&dst).ok_or(AudioError::UnknownNode(dst))?;
        if dst_node.kind.is_source() {
            return Err(AudioError::InvalidNodeState(format!(
                "{} node accepts no input",
                dst_node.kind.name()
            )));
        }
        if src_node.outputs.contains(&dst) {
            return Ok(());
        }
        if src == dst || self.reaches(dst, src) {
            return Err(AudioError::GraphCycle(src, dst));
        }

        if let Some(node) = self.nodes.get_mut(&src) {
            node.outputs.push(dst);
        }
        if let Some(node) = self.nodes.get_mut(&dst) {
            node.inputs.push(src);
        }
        self.plan = None;
        Ok(())
    }

    /// Remove a node and every edge touching it
    pub(crate) fn disconnect(&mut self, id: NodeId) -> Result<()> {
        if id == Self::DESTINATION {
            return Err(AudioError::InvalidNodeState(
                "destination cannot be disconnected".into(),
            ));
        }
        let node = self.nodes.remove(&id).ok_or(AudioError::UnknownNode(id))?;
        for input in node.inputs {
            if let Some(upstream) = self.nodes.get_mut(&input) {
                upstream.outputs.retain(|&o| o != id);
            }
        }
        for output in node.outputs {
            if let Some(downstream) = self.nodes.get_mut(&output) {
                downstream.inputs.retain(|&i| i != id);
            }
        }
        self.ended.retain(|&e| e != id);
        self.plan = None;
        Ok(())
    }

    pub(crate) fn start(&mut self, id: NodeId, when: f64) -> Result<()> {
        self.node_mut(id)?.kind.start(when)
    }

    pub(crate) fn stop(&mut self, id: NodeId, when: f64) -> Result<()> {
        self.node_mut(id)?.kind.stop(when)
    }

    pub(crate) fn source_state(&self, id: NodeId) -> Result<SourceState> {
        let node = self.nodes.get(&id).ok_or(AudioError::UnknownNode(id))?;
        node.kind.source_state().ok_or_else(|| {
            AudioError::InvalidNodeState(format!("{} node is not a source", node.kind.name()))
        })
    }

    pub(crate) fn buffer_position(&self, id: NodeId) -> Result<f64> {
        let node = self.nodes.get(&id).ok_or(AudioError::UnknownNode(id))?;
        node.kind.buffer_position().ok_or_else(|| {
            AudioError::InvalidNodeState(format!("{} node has no buffer", node.kind.name()))
        })
    }

    pub(crate) fn inputs(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self
            .nodes
            .get(&id)
            .ok_or(AudioError::UnknownNode(id))?
            .inputs
            .clone())
    }

    pub(crate) fn param(&self, id: NodeId, kind: ParamKind) -> Result<&AudioParam> {
        let node = self.nodes.get(&id).ok_or(AudioError::UnknownNode(id))?;
        node.kind.param(kind).ok_or_else(|| {
            AudioError::InvalidNodeState(format!(
                "{} node has no {kind:?} parameter",
                node.kind.name()
            ))
        })
    }

    pub(crate) fn param_mut(&mut self, id: NodeId, kind: ParamKind) -> Result<&mut AudioParam> {
        let node = self.nodes.get_mut(&id).ok_or(AudioError::UnknownNode(id))?;
        let name = node.kind.name();
        node.kind.param_mut(kind).ok_or_else(|| {
            AudioError::InvalidNodeState(format!("{name} node has no {kind:?} parameter"))
        })
    }

    pub(crate) fn take_ended(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.ended)
    }

    /// Render interleaved frames; silence without advancing the clock unless running
    pub(crate) fn render(&mut self, out: &mut [f32], channels: u16) -> usize {
        let channels = channels.max(1) as usize;
        let frames = out.len() / channels;
        if self.state != RuntimeState::Running {
            out.fill(0.0);
            return frames;
        }

        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => self.build_plan(),
        };
        let sample_rate = self.sample_rate as f32;
        let mut outputs = std::mem::take(&mut self.scratch);
        outputs.clear();
        outputs.resize(plan.order.len(), 0.0);

        for frame in out.chunks_exact_mut(channels) {
            let t = self.current_time();
            for (slot, id) in plan.order.iter().enumerate() {
                let input: f32 = plan.inputs[slot].iter().map(|&i| outputs[i]).sum();
                if let Some(node) = self.nodes.get_mut(id) {
                    outputs[slot] = node.kind.process(input, t, sample_rate);
                    if node.kind.take_ended() {
                        self.ended.push(*id);
                    }
                }
            }
            frame.fill(outputs[plan.destination]);
            self.frame += 1;
        }

        self.scratch = outputs;
        self.plan = Some(plan);
        frames
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut GraphNode> {
        self.nodes.get_mut(&id).ok_or(AudioError::UnknownNode(id))
    }

    /// True when `to` is reachable from `from` following outputs
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.outputs.iter().copied());
            }
        }
        false
    }

    /// Depth-first post-order over inputs: every node after all of its inputs
    fn build_plan(&self) -> RenderPlan {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::with_capacity(self.nodes.len());

        for &root in self.nodes.keys() {
            if visited.contains(&root) {
                continue;
            }
            // (node, inputs expanded)
            let mut stack = vec![(root, false)];
            while let Some((id, expanded)) = stack.pop() {
                if expanded {
                    order.push(id);
                    continue;
                }
                if !visited.insert(id) {
                    continue;
                }
                stack.push((id, true));
                if let Some(node) = self.nodes.get(&id) {
                    for &input in node.inputs.iter().rev() {
                        if !visited.contains(&input) {
                            stack.push((input, false));
                        }
                    }
                }
            }
        }

        let slots: HashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let inputs = order
            .iter()
            .map(|id| {
                self.nodes
                    .get(id)
                    .map(|node| node.inputs.iter().filter_map(|i| slots.get(i).copied()).collect())
                    .unwrap_or_default()
            })
            .collect();
        let destination = slots[&Self::DESTINATION];

        RenderPlan {
            order,
            inputs,
            destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::nodes::Waveform;
    use approx::assert_relative_eq;

    #[test]
    fn test_destination_exists() {
        let graph = AudioGraph::new(8_000);
        assert_eq!(graph.node_count(), 1);
        assert!(graph.contains(AudioGraph::DESTINATION));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut graph = AudioGraph::new(8_000);
        let a = graph.add_node(NodeKind::gain(1.0)).unwrap();
        let b = graph.add_node(NodeKind::gain(1.0)).unwrap();
        graph.connect(a, b).unwrap();
        assert!(matches!(graph.connect(b, a), Err(AudioError::GraphCycle(_, _))));
        assert!(graph.connect(a, a).is_err());
    }

    #[test]
    fn test_source_accepts_no_input() {
        let mut graph = AudioGraph::new(8_000);
        let gain = graph.add_node(NodeKind::gain(1.0)).unwrap();
        let osc = graph.add_node(NodeKind::oscillator(Waveform::Sine, 1.0)).unwrap();
        assert!(graph.connect(gain, osc).is_err());
    }

    #[test]
    fn test_disconnect_exactly_once() {
        let mut graph = AudioGraph::new(8_000);
        let gain = graph.add_node(NodeKind::gain(1.0)).unwrap();
        graph.connect(gain, AudioGraph::DESTINATION).unwrap();
        graph.disconnect(gain).unwrap();
        assert!(graph.inputs(AudioGraph::DESTINATION).unwrap().is_empty());
        assert!(matches!(graph.disconnect(gain), Err(AudioError::UnknownNode(_))));
    }

    #[test]
    fn test_fan_out_processes_source_once() {
        let mut graph = AudioGraph::new(8_000);
        let osc = graph.add_node(NodeKind::oscillator(Waveform::Sawtooth, 1_000.0)).unwrap();
        let g1 = graph.add_node(NodeKind::gain(0.5)).unwrap();
        let g2 = graph.add_node(NodeKind::gain(0.5)).unwrap();
        graph.connect(osc, g1).unwrap();
        graph.connect(osc, g2).unwrap();
        graph.connect(g1, AudioGraph::DESTINATION).unwrap();
        graph.connect(g2, AudioGraph::DESTINATION).unwrap();
        graph.start(osc, 0.0).unwrap();

        let mut out = [0.0f32; 3];
        graph.render(&mut out, 1);
        // Saw at 1/8 of the sample rate: -1.0, -0.75, -0.5
        assert_relative_eq!(out[0], -1.0);
        assert_relative_eq!(out[1], -0.75);
        assert_relative_eq!(out[2], -0.5);
    }

    #[test]
    fn test_suspended_graph_freezes_clock() {
        let mut graph = AudioGraph::new(8_000);
        let mut out = [1.0f32; 80];
        graph.set_state(RuntimeState::Suspended).unwrap();
        graph.render(&mut out, 2);
        assert_eq!(graph.current_time(), 0.0);
        assert!(out.iter().all(|&s| s == 0.0));
        graph.set_state(RuntimeState::Running).unwrap();
        graph.render(&mut out, 2);
        assert_relative_eq!(graph.current_time(), 40.0 / 8_000.0);
    }

    #[test]
    fn test_closed_graph_cannot_reopen() {
        let mut graph = AudioGraph::new(8_000);
        graph.set_state(RuntimeState::Closed).unwrap();
        assert!(graph.set_state(RuntimeState::Running).is_err());
        assert!(graph.add_node(NodeKind::gain(1.0)).is_err());
    }

    #[test]
    fn test_ended_events_reported() {
        let mut graph = AudioGraph::new(8_000);
        let osc = graph.add_node(NodeKind::oscillator(Waveform::Sine, 100.0)).unwrap();
        graph.connect(osc, AudioGraph::DESTINATION).unwrap();
        graph.start(osc, 0.0).unwrap();
        graph.stop(osc, 0.001).unwrap();
        let mut out = [0.0f32; 16];
        graph.render(&mut out, 1);
        assert_eq!(graph.take_ended(), vec![osc]);
        assert!(graph.take_ended().is_empty());
    }
}
