//! Audio graph - gain stages and looping buffer sources
//!
//! Sources feed a gain node, gain nodes feed either another gain node or
//! the device destination. Rendering walks each running source's path to
//! the destination and multiplies the gains along the way; a source whose
//! path is broken is silent.

use jam_library::DecodedBuffer;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Longest gain chain followed before a path is treated as broken
const MAX_PATH_HOPS: usize = 16;

/// Soft clip threshold - transparent below this level
const SOFT_CLIP_THRESHOLD: f32 = 0.75;
/// Soft clip ceiling - bus output never exceeds this
const SOFT_CLIP_CEILING: f32 = 0.89;

/// Errors from graph operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("Source {0:?} already started")]
    AlreadyStarted(NodeId),
}

/// Handle to a node in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Where a gain node sends its signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// The device output
    Destination,
    /// Another gain node
    Gain(NodeId),
}

struct GainNode {
    gain: f32,
    output: Option<Output>,
}

struct SourceNode {
    buffer: Arc<DecodedBuffer>,
    looping: bool,
    start_frame: Option<u64>,
    output: Option<NodeId>,
}

/// Node graph rendered by the output device
#[derive(Default)]
pub struct AudioGraph {
    next_id: u64,
    gains: HashMap<NodeId, GainNode>,
    sources: HashMap<NodeId, SourceNode>,
}

impl AudioGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    /// Create an unconnected gain node
    pub fn create_gain(&mut self, gain: f32) -> NodeId {
        let id = self.allocate_id();
        self.gains.insert(
            id,
            GainNode {
                gain: gain.max(0.0),
                output: None,
            },
        );
        id
    }

    pub fn set_gain(&mut self, id: NodeId, gain: f32) -> Result<(), GraphError> {
        let node = self.gains.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        node.gain = gain.max(0.0);
        Ok(())
    }

    pub fn gain(&self, id: NodeId) -> Option<f32> {
        self.gains.get(&id).map(|n| n.gain)
    }

    /// Route a gain node to the destination or to another gain node
    pub fn connect_gain(&mut self, id: NodeId, output: Output) -> Result<(), GraphError> {
        if let Output::Gain(target) = output {
            if !self.gains.contains_key(&target) {
                return Err(GraphError::UnknownNode(target));
            }
        }
        let node = self.gains.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        node.output = Some(output);
        Ok(())
    }

    /// Detach a node's output, leaving the node in place
    pub fn disconnect(&mut self, id: NodeId) -> Result<(), GraphError> {
        if let Some(node) = self.gains.get_mut(&id) {
            node.output = None;
            return Ok(());
        }
        if let Some(node) = self.sources.get_mut(&id) {
            node.output = None;
            return Ok(());
        }
        Err(GraphError::UnknownNode(id))
    }

    /// Remove a gain node; anything routed through it goes silent
    pub fn remove_gain(&mut self, id: NodeId) -> bool {
        self.gains.remove(&id).is_some()
    }

    pub fn gain_count(&self) -> usize {
        self.gains.len()
    }

    /// Create a buffer source that has not been started
    pub fn create_buffer_source(&mut self, buffer: Arc<DecodedBuffer>, looping: bool) -> NodeId {
        let id = self.allocate_id();
        self.sources.insert(
            id,
            SourceNode {
                buffer,
                looping,
                start_frame: None,
                output: None,
            },
        );
        id
    }

    pub fn connect_source(&mut self, id: NodeId, gain: NodeId) -> Result<(), GraphError> {
        if !self.gains.contains_key(&gain) {
            return Err(GraphError::UnknownNode(gain));
        }
        let node = self.sources.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        node.output = Some(gain);
        Ok(())
    }

    /// Start a batch of sources at the same device frame
    ///
    /// Either every source starts or none does.
    pub fn start_sources(&mut self, ids: &[NodeId], at_frame: u64) -> Result<(), GraphError> {
        for id in ids {
            let node = self.sources.get(id).ok_or(GraphError::UnknownNode(*id))?;
            if node.start_frame.is_some() {
                return Err(GraphError::AlreadyStarted(*id));
            }
        }
        for id in ids {
            if let Some(node) = self.sources.get_mut(id) {
                node.start_frame = Some(at_frame);
            }
        }
        Ok(())
    }

    /// Stop, disconnect and drop a source
    pub fn stop_source(&mut self, id: NodeId) -> bool {
        self.sources.remove(&id).is_some()
    }

    /// Number of started sources
    pub fn active_source_count(&self) -> usize {
        self.sources.values().filter(|s| s.start_frame.is_some()).count()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn is_source_running(&self, id: NodeId) -> bool {
        self.sources
            .get(&id)
            .is_some_and(|s| s.start_frame.is_some())
    }

    /// Product of gains from a gain node to the destination
    fn path_gain(&self, mut id: NodeId) -> Option<f32> {
        let mut gain = 1.0;
        for _ in 0..MAX_PATH_HOPS {
            let node = self.gains.get(&id)?;
            gain *= node.gain;
            match node.output? {
                Output::Destination => return Some(gain),
                Output::Gain(next) => id = next,
            }
        }
        None
    }

    /// Render one block of interleaved output starting at `start_frame`
    ///
    /// Mono output gets the average of left and right; channels past the
    /// second stay silent.
    pub fn render(&mut self, out: &mut [f32], channels: usize, start_frame: u64) {
        out.fill(0.0);
        let channels = channels.max(1);
        let frames = out.len() / channels;
        let block_end = start_frame + frames as u64;

        for source in self.sources.values() {
            let Some(started) = source.start_frame else {
                continue;
            };
            let Some(gain) = source.output.and_then(|g| self.path_gain(g)) else {
                continue;
            };
            let len = source.buffer.frames() as u64;
            if gain == 0.0 || len == 0 || started >= block_end {
                continue;
            }

            let first = started.saturating_sub(start_frame) as usize;
            for (i, frame) in out.chunks_exact_mut(channels).enumerate().skip(first) {
                let pos = start_frame + i as u64 - started;
                let idx = if source.looping {
                    pos % len
                } else if pos < len {
                    pos
                } else {
                    break;
                };
                let (l, r) = source.buffer.frame(idx as usize);
                if channels == 1 {
                    frame[0] += (l + r) * 0.5 * gain;
                } else {
                    frame[0] += l * gain;
                    frame[1] += r * gain;
                }
            }
        }

        for sample in out.iter_mut() {
            *sample = soft_clip(*sample);
        }

        // One-shot sources that ran out are finished
        self.sources.retain(|_, s| match s.start_frame {
            Some(started) if !s.looping => started + (s.buffer.frames() as u64) > block_end,
            _ => true,
        });
    }
}

/// Gentle soft clipper for the output bus
///
/// Transparent below the threshold, approaches the ceiling asymptotically
/// above it.
#[inline(always)]
fn soft_clip(x: f32) -> f32 {
    let abs_x = x.abs();
    if abs_x <= SOFT_CLIP_THRESHOLD {
        return x;
    }

    let knee_width = SOFT_CLIP_CEILING - SOFT_CLIP_THRESHOLD;
    let ratio = (abs_x - SOFT_CLIP_THRESHOLD) / knee_width;
    let compressed = SOFT_CLIP_THRESHOLD + knee_width * (1.0 - (-ratio * 3.0).exp());
    x.signum() * compressed.min(SOFT_CLIP_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Arc<DecodedBuffer> {
        let samples = (0..frames)
            .flat_map(|i| {
                let v = 0.1 * (i + 1) as f32 / frames as f32;
                [v, -v]
            })
            .collect();
        Arc::new(DecodedBuffer::from_interleaved(samples, 48000))
    }

    fn constant(frames: usize, value: f32) -> Arc<DecodedBuffer> {
        Arc::new(DecodedBuffer::from_interleaved(vec![value; frames * 2], 48000))
    }

    /// master -> destination, track -> master, source -> track
    fn chain(graph: &mut AudioGraph, buffer: Arc<DecodedBuffer>) -> (NodeId, NodeId, NodeId) {
        let master = graph.create_gain(1.0);
        graph.connect_gain(master, Output::Destination).unwrap();
        let track = graph.create_gain(1.0);
        graph.connect_gain(track, Output::Gain(master)).unwrap();
        let source = graph.create_buffer_source(buffer, true);
        graph.connect_source(source, track).unwrap();
        (master, track, source)
    }

    #[test]
    fn test_unknown_nodes_rejected() {
        let mut graph = AudioGraph::new();
        let gain = graph.create_gain(1.0);
        graph.remove_gain(gain);

        assert_eq!(graph.set_gain(gain, 0.5), Err(GraphError::UnknownNode(gain)));
        assert_eq!(
            graph.connect_gain(gain, Output::Destination),
            Err(GraphError::UnknownNode(gain))
        );
        assert!(graph.disconnect(gain).is_err());
    }

    #[test]
    fn test_unstarted_source_is_silent() {
        let mut graph = AudioGraph::new();
        chain(&mut graph, constant(64, 0.5));

        let mut out = vec![1.0; 32];
        graph.render(&mut out, 2, 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(graph.active_source_count(), 0);
    }

    #[test]
    fn test_gains_multiply_along_path() {
        let mut graph = AudioGraph::new();
        let (master, track, source) = chain(&mut graph, constant(64, 0.5));
        graph.set_gain(track, 0.5).unwrap();
        graph.set_gain(master, 0.8).unwrap();
        graph.start_sources(&[source], 0).unwrap();

        let mut out = vec![0.0; 16];
        graph.render(&mut out, 2, 0);
        assert!(out.iter().all(|&s| (s - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_disconnected_path_is_silent() {
        let mut graph = AudioGraph::new();
        let (master, _, source) = chain(&mut graph, constant(64, 0.5));
        graph.start_sources(&[source], 0).unwrap();
        graph.disconnect(master).unwrap();

        let mut out = vec![0.0; 16];
        graph.render(&mut out, 2, 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(graph.is_source_running(source));
    }

    #[test]
    fn test_looping_wraps_around() {
        let mut graph = AudioGraph::new();
        let buffer = ramp(4);
        let (_, _, source) = chain(&mut graph, buffer.clone());
        graph.start_sources(&[source], 100).unwrap();

        let mut out = vec![0.0; 2 * 6];
        graph.render(&mut out, 2, 102);

        let lefts: Vec<f32> = out.chunks(2).map(|f| f[0]).collect();
        let expected: Vec<f32> = [2, 3, 0, 1, 2, 3].iter().map(|&i| buffer.frame(i).0).collect();
        assert_eq!(lefts, expected);
    }

    #[test]
    fn test_source_starts_mid_block() {
        let mut graph = AudioGraph::new();
        let (_, _, source) = chain(&mut graph, constant(64, 0.25));
        graph.start_sources(&[source], 10).unwrap();

        let mut out = vec![0.0; 16];
        graph.render(&mut out, 1, 4);
        assert!(out[..6].iter().all(|&s| s == 0.0));
        assert!(out[6..].iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_one_shot_source_removed_at_end() {
        let mut graph = AudioGraph::new();
        let master = graph.create_gain(1.0);
        graph.connect_gain(master, Output::Destination).unwrap();
        let source = graph.create_buffer_source(constant(8, 0.5), false);
        graph.connect_source(source, master).unwrap();
        graph.start_sources(&[source], 0).unwrap();

        let mut out = vec![0.0; 2 * 16];
        graph.render(&mut out, 2, 0);

        assert!(out[..16].iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert!(out[16..].iter().all(|&s| s == 0.0));
        assert_eq!(graph.source_count(), 0);
    }

    #[test]
    fn test_start_is_all_or_nothing() {
        let mut graph = AudioGraph::new();
        let (_, track, a) = chain(&mut graph, constant(8, 0.1));
        let b = graph.create_buffer_source(constant(8, 0.1), true);
        graph.connect_source(b, track).unwrap();
        graph.start_sources(&[a], 0).unwrap();

        assert_eq!(graph.start_sources(&[b, a], 0), Err(GraphError::AlreadyStarted(a)));
        assert!(!graph.is_source_running(b));

        graph.stop_source(a);
        assert_eq!(graph.active_source_count(), 0);
    }

    #[test]
    fn test_sources_sum_and_clip() {
        let mut graph = AudioGraph::new();
        let (_, track, a) = chain(&mut graph, constant(8, 0.3));
        let b = graph.create_buffer_source(constant(8, 0.3), true);
        graph.connect_source(b, track).unwrap();
        graph.start_sources(&[a, b], 0).unwrap();

        let mut out = vec![0.0; 4];
        graph.render(&mut out, 2, 0);
        assert!((out[0] - 0.6).abs() < 1e-6);

        let c = graph.create_buffer_source(constant(8, 0.9), true);
        graph.connect_source(c, track).unwrap();
        graph.start_sources(&[c], 0).unwrap();
        graph.render(&mut out, 2, 0);
        assert!(out[0] > SOFT_CLIP_THRESHOLD && out[0] <= SOFT_CLIP_CEILING);
    }

    #[test]
    fn test_gain_cycle_is_silent() {
        let mut graph = AudioGraph::new();
        let a = graph.create_gain(1.0);
        let b = graph.create_gain(1.0);
        graph.connect_gain(a, Output::Gain(b)).unwrap();
        graph.connect_gain(b, Output::Gain(a)).unwrap();
        let source = graph.create_buffer_source(constant(8, 0.5), true);
        graph.connect_source(source, a).unwrap();
        graph.start_sources(&[source], 0).unwrap();

        let mut out = vec![0.0; 8];
        graph.render(&mut out, 2, 0);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
