use std::{collections::HashMap, f32::consts::TAU};

use serde::{Deserialize, Serialize};

use super::param::AudioParam;

/// Identifier of a node inside an [`AudioGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Where a node sends its signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    None,
    Destination,
    Node(NodeId),
}

/// Generator shapes supported by oscillator nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

#[derive(Debug, Clone)]
struct GainNode {
    gain: AudioParam,
    output: Output,
}

#[derive(Debug, Clone)]
struct Oscillator {
    waveform: Waveform,
    frequency: f32,
    phase: f32,
    output: Output,
}

impl Oscillator {
    fn next_sample(&mut self, sample_rate: f32) -> f32 {
        let phase = self.phase;
        let value = match self.waveform {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 4.0 * (phase - 0.5).abs() - 1.0,
        };
        self.phase = (phase + self.frequency / sample_rate).fract();
        value
    }
}

/// Software mono mixing graph. The clock only moves while audio is rendered,
/// so every scheduled ramp is evaluated against sample-accurate graph time.
#[derive(Debug)]
pub struct AudioGraph {
    sample_rate: u32,
    frames: u64,
    next_id: u64,
    gains: HashMap<NodeId, GainNode>,
    oscillators: HashMap<NodeId, Oscillator>,
}

impl AudioGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frames: 0,
            next_id: 0,
            gains: HashMap::new(),
            oscillators: HashMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Graph time in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn node_count(&self) -> usize {
        self.gains.len() + self.oscillators.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.gains.contains_key(&id) || self.oscillators.contains_key(&id)
    }

    pub fn create_gain(&mut self, value: f32) -> NodeId {
        let id = self.allocate();
        let mut gain = AudioParam::new(value);
        gain.set_value(value, self.current_time());
        self.gains.insert(
            id,
            GainNode {
                gain,
                output: Output::None,
            },
        );
        id
    }

    pub fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> NodeId {
        let id = self.allocate();
        self.oscillators.insert(
            id,
            Oscillator {
                waveform,
                frequency,
                phase: 0.0,
                output: Output::None,
            },
        );
        id
    }

    /// Routes `from` into `to`. Fails when either end is missing, when the
    /// target is not a gain node or when the link would close a cycle.
    pub fn connect(&mut self, from: NodeId, to: Output) -> bool {
        if let Output::Node(target) = to {
            if !self.gains.contains_key(&target) || self.reaches(target, from) {
                return false;
            }
        }

        if let Some(node) = self.gains.get_mut(&from) {
            node.output = to;
            true
        } else if let Some(node) = self.oscillators.get_mut(&from) {
            node.output = to;
            true
        } else {
            false
        }
    }

    /// Removes `id` and reclaims every node that was feeding into it.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let removed = self.gains.remove(&id).is_some() || self.oscillators.remove(&id).is_some();
        if removed {
            self.reclaim_orphans();
        }
        removed
    }

    pub fn gain(&self, id: NodeId) -> Option<&AudioParam> {
        self.gains.get(&id).map(|node| &node.gain)
    }

    pub fn gain_mut(&mut self, id: NodeId) -> Option<&mut AudioParam> {
        self.gains.get_mut(&id).map(|node| &mut node.gain)
    }

    pub fn set_frequency(&mut self, id: NodeId, frequency: f32) -> bool {
        match self.oscillators.get_mut(&id) {
            Some(osc) => {
                osc.frequency = frequency.max(0.0);
                true
            }
            None => false,
        }
    }

    pub fn frequency(&self, id: NodeId) -> Option<f32> {
        self.oscillators.get(&id).map(|osc| osc.frequency)
    }

    /// Whether the node currently has a path to the output.
    pub fn is_audible_path(&self, id: NodeId) -> bool {
        self.route(id).is_some()
    }

    /// Mixes one block into `out` and advances the graph clock by its length.
    pub fn render(&mut self, out: &mut [f32]) {
        let routes: Vec<(NodeId, Vec<NodeId>)> = self
            .oscillators
            .keys()
            .filter_map(|id| self.route(*id).map(|path| (*id, path)))
            .collect();

        let sample_rate = self.sample_rate as f32;
        for (index, sample) in out.iter_mut().enumerate() {
            let time = (self.frames + index as u64) as f64 / self.sample_rate as f64;
            let mut mix = 0.0;
            for (osc_id, path) in &routes {
                let Some(osc) = self.oscillators.get_mut(osc_id) else {
                    continue;
                };
                let mut value = osc.next_sample(sample_rate);
                for gain_id in path {
                    if let Some(node) = self.gains.get(gain_id) {
                        value *= node.gain.value_at(time);
                    }
                }
                mix += value;
            }
            *sample = mix;
        }

        self.frames += out.len() as u64;
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn output_of(&self, id: NodeId) -> Option<Output> {
        self.gains
            .get(&id)
            .map(|node| node.output)
            .or_else(|| self.oscillators.get(&id).map(|node| node.output))
    }

    /// Gain stages between `id` and the destination, or `None` if the chain
    /// is broken.
    fn route(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let mut path = Vec::new();
        let mut current = id;
        for _ in 0..=self.node_count() {
            if self.gains.contains_key(&current) {
                path.push(current);
            }
            match self.output_of(current)? {
                Output::None => return None,
                Output::Destination => return Some(path),
                Output::Node(next) => current = next,
            }
        }
        None
    }

    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut current = from;
        for _ in 0..=self.node_count() {
            if current == target {
                return true;
            }
            match self.output_of(current) {
                Some(Output::Node(next)) => current = next,
                _ => return false,
            }
        }
        false
    }

    fn reclaim_orphans(&mut self) {
        loop {
            let orphans: Vec<NodeId> = self
                .gains
                .iter()
                .map(|(id, node)| (*id, node.output))
                .chain(self.oscillators.iter().map(|(id, node)| (*id, node.output)))
                .filter_map(|(id, output)| match output {
                    Output::Node(target) if !self.gains.contains_key(&target) => Some(id),
                    _ => None,
                })
                .collect();

            if orphans.is_empty() {
                break;
            }

            for id in orphans {
                self.gains.remove(&id);
                self.oscillators.remove(&id);
            }
        }
    }
}
