use super::{Hierarchy, HierarchyLevel, Specialization};
use crate::error::{EngineError, EngineResult};
use crate::math::Vector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

pub const MIN_MESSAGE_CAPACITY: usize = 5;
pub const CONTROL_PRIORITY: f64 = 1.0;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    Broadcast,
    Flood,
    Selective,
    Direct,
    Adaptive,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Union,
    Intersection,
    WeightedSum,
    Average,
}

impl Aggregation {
    /// Elementwise fold of message contents. Union/intersection are max/min.
    pub fn apply(&self, messages: &[&Message]) -> Option<Vector> {
        let first = messages.first()?;
        let dim = first.content.len();
        let contents = messages.iter().filter(|m| m.content.len() == dim);
        let folded = match self {
            Aggregation::Union => contents.fold(vec![f64::NEG_INFINITY; dim], |acc, m| {
                acc.iter().zip(&m.content).map(|(a, b)| a.max(*b)).collect()
            }),
            Aggregation::Intersection => contents.fold(vec![f64::INFINITY; dim], |acc, m| {
                acc.iter().zip(&m.content).map(|(a, b)| a.min(*b)).collect()
            }),
            Aggregation::WeightedSum => contents.fold(vec![0.0; dim], |acc, m| {
                acc.iter()
                    .zip(&m.content)
                    .map(|(a, b)| a + m.priority * b)
                    .collect()
            }),
            Aggregation::Average => {
                let mut count = 0usize;
                let sum = contents.fold(vec![0.0; dim], |acc, m| {
                    count += 1;
                    acc.iter().zip(&m.content).map(|(a, b)| a + b).collect()
                });
                sum.into_iter().map(|x| x / count as f64).collect()
            }
        };
        Some(folded)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessagePassingConfig {
    pub message_capacity: usize,
    pub routing_strategy: RoutingStrategy,
    pub aggregation_function: Aggregation,
    pub filtering_threshold: f64,
}

impl MessagePassingConfig {
    pub fn for_level(level: usize, tier: &HierarchyLevel) -> Self {
        Self {
            message_capacity: tier
                .capacity
                .max(MIN_MESSAGE_CAPACITY)
                .min(tier.exploration_width * 3),
            routing_strategy: routing_strategy(level, tier.specialization),
            aggregation_function: aggregation_for(tier.specialization),
            filtering_threshold: (0.1 + level as f64 * 0.05).min(0.8),
        }
    }

    /// The global control channel is not tied to a level.
    pub fn control() -> Self {
        Self {
            message_capacity: MIN_MESSAGE_CAPACITY,
            routing_strategy: RoutingStrategy::Adaptive,
            aggregation_function: Aggregation::Average,
            filtering_threshold: 0.0,
        }
    }
}

pub fn routing_strategy(level: usize, specialization: Specialization) -> RoutingStrategy {
    if level == 0 {
        return RoutingStrategy::Broadcast;
    }
    match specialization {
        Specialization::Exploration => RoutingStrategy::Flood,
        Specialization::Analysis => RoutingStrategy::Selective,
        Specialization::Synthesis => RoutingStrategy::Direct,
    }
}

pub fn aggregation_for(specialization: Specialization) -> Aggregation {
    match specialization {
        Specialization::Exploration => Aggregation::Union,
        Specialization::Analysis => Aggregation::Intersection,
        Specialization::Synthesis => Aggregation::WeightedSum,
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Upward,
    Downward,
    Lateral,
    Control,
}

/// A (level, stream) address. The control plane lives at `Endpoint::CONTROL`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub level: usize,
    pub stream: usize,
}

impl Endpoint {
    pub const CONTROL: Endpoint = Endpoint {
        level: usize::MAX,
        stream: 0,
    };

    pub fn new(level: usize, stream: usize) -> Self {
        Self { level, stream }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Channel {
    pub kind: ChannelKind,
    pub from: Endpoint,
    pub to: Endpoint,
    pub priority: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub sender: Endpoint,
    pub receiver: Endpoint,
    pub content: Vector,
    pub message_type: ChannelKind,
    pub timestamp: u64,
    pub priority: f64,
}

pub fn upward_priority(level: usize) -> f64 {
    0.3 + level as f64 * 0.1
}

pub fn downward_priority(level: usize) -> f64 {
    (0.8 - level as f64 * 0.1).max(0.1)
}

/// Every channel the hierarchy defines, in a stable order.
pub fn build_channels(hierarchy: &Hierarchy) -> Vec<Channel> {
    let mut channels = Vec::new();
    let max_level = match hierarchy.max_level() {
        Some(max_level) => max_level,
        None => return channels,
    };
    for (&level, tier) in &hierarchy.levels {
        if level > 0 {
            channels.push(Channel {
                kind: ChannelKind::Upward,
                from: Endpoint::new(level, 0),
                to: Endpoint::new(level - 1, 0),
                priority: upward_priority(level),
            });
        }
        if level < max_level {
            channels.push(Channel {
                kind: ChannelKind::Downward,
                from: Endpoint::new(level, 0),
                to: Endpoint::new(level + 1, 0),
                priority: downward_priority(level),
            });
        }
        if tier.parallel_streams > 1 {
            for i in 0..tier.parallel_streams {
                for j in 0..tier.parallel_streams {
                    if i != j {
                        channels.push(Channel {
                            kind: ChannelKind::Lateral,
                            from: Endpoint::new(level, i),
                            to: Endpoint::new(level, j),
                            priority: 0.5,
                        });
                    }
                }
            }
        }
    }
    channels.push(Channel {
        kind: ChannelKind::Control,
        from: Endpoint::CONTROL,
        to: Endpoint::CONTROL,
        priority: CONTROL_PRIORITY,
    });
    channels
}

pub fn build_message_configs(hierarchy: &Hierarchy) -> BTreeMap<usize, MessagePassingConfig> {
    hierarchy
        .levels
        .iter()
        .map(|(&level, tier)| (level, MessagePassingConfig::for_level(level, tier)))
        .collect()
}

/// Bounded per-level inboxes over the channels of one hierarchy.
pub struct MessageRouter {
    channels: HashMap<(Endpoint, Endpoint), Channel>,
    configs: BTreeMap<usize, MessagePassingConfig>,
    control: MessagePassingConfig,
    inboxes: HashMap<usize, VecDeque<Message>>,
    clock: u64,
}

impl MessageRouter {
    pub fn new(hierarchy: &Hierarchy) -> Self {
        let channels = build_channels(hierarchy)
            .into_iter()
            .map(|c| ((c.from, c.to), c))
            .collect();
        Self {
            channels,
            configs: build_message_configs(hierarchy),
            control: MessagePassingConfig::control(),
            inboxes: HashMap::new(),
            clock: 0,
        }
    }

    pub fn config(&self, level: usize) -> Option<&MessagePassingConfig> {
        if level == Endpoint::CONTROL.level {
            return Some(&self.control);
        }
        self.configs.get(&level)
    }

    /// Returns whether the message was queued. A message below the receiver's
    /// filtering threshold is dropped; a full inbox evicts its oldest message.
    pub fn send(&mut self, from: Endpoint, to: Endpoint, content: Vector) -> EngineResult<bool> {
        let channel = self
            .channels
            .get(&(from, to))
            .ok_or(EngineError::UnknownChannel { from, to })?;
        let (kind, priority) = (channel.kind, channel.priority);
        let config = self
            .config(to.level)
            .ok_or(EngineError::UnknownChannel { from, to })?;
        if priority < config.filtering_threshold {
            return Ok(false);
        }
        let capacity = config.message_capacity.max(1);

        self.clock += 1;
        let inbox = self.inboxes.entry(to.level).or_default();
        if inbox.len() >= capacity {
            inbox.pop_front();
        }
        inbox.push_back(Message {
            sender: from,
            receiver: to,
            content,
            message_type: kind,
            timestamp: self.clock,
            priority,
        });
        Ok(true)
    }

    pub fn pending(&self, level: usize) -> usize {
        self.inboxes.get(&level).map_or(0, |inbox| inbox.len())
    }

    /// Folds the pending messages of `level` with its aggregation function.
    pub fn aggregate(&self, level: usize) -> Option<Vector> {
        let inbox = self.inboxes.get(&level)?;
        let messages: Vec<&Message> = inbox.iter().collect();
        self.config(level)?.aggregation_function.apply(&messages)
    }

    pub fn drain(&mut self, level: usize) -> Vec<Message> {
        self.inboxes
            .get_mut(&level)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }
}
