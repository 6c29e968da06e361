mod messaging;
pub use messaging::*;
mod recursive;
pub use recursive::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Specialization {
    Exploration,
    Analysis,
    Synthesis,
}

impl Specialization {
    /// Role of a level sitting at `ratio` (0 = top, 1 = bottom) of the hierarchy.
    pub fn from_depth_ratio(ratio: f64) -> Self {
        if ratio < 0.3 {
            Specialization::Exploration
        } else if ratio < 0.7 {
            Specialization::Analysis
        } else {
            Specialization::Synthesis
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    #[default]
    Linear,
    Exponential,
    Adaptive,
}

impl std::str::FromStr for ScalingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(ScalingMode::Linear),
            "exponential" => Ok(ScalingMode::Exponential),
            "adaptive" => Ok(ScalingMode::Adaptive),
            _ => Err(format!("Unknown scaling mode '{}'", s)),
        }
    }
}

/// Which construction actually produced a hierarchy. `Adaptive` resolves to one of
/// the other three depending on the thought count.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyShape {
    Linear,
    Exponential,
    BalancedTree { fan_out: usize },
    Deep { depth: usize },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HierarchyLevel {
    pub capacity: usize,
    pub exploration_width: usize,
    pub specialization: Specialization,
    pub priority: f64,
    pub parallel_streams: usize,
    /// Inclusive range of thought indices owned by the level, for partitioning shapes.
    pub thoughts: Option<(usize, usize)>,
    pub certainty_threshold: Option<f64>,
    pub pruning_rate: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Hierarchy {
    pub num_thoughts: usize,
    pub mode: ScalingMode,
    pub shape: HierarchyShape,
    pub levels: BTreeMap<usize, HierarchyLevel>,
    pub compression_ratio: f64,
}

/// Upper bound on streams per level. Lateral channels are all-to-all within a
/// level, so a level never carries more than `MAX_PARALLEL_STREAMS²` of them.
pub const MAX_PARALLEL_STREAMS: usize = 8;

fn parallel_streams_for(capacity: usize, exploration_width: usize) -> usize {
    ((capacity + 3) / 4)
        .min(exploration_width)
        .min(MAX_PARALLEL_STREAMS)
        .max(1)
}

fn level_ratio(level: usize, num_levels: usize) -> f64 {
    if num_levels <= 1 {
        0.0
    } else {
        level as f64 / (num_levels - 1) as f64
    }
}

impl Hierarchy {
    pub fn build(num_thoughts: usize, mode: ScalingMode) -> Self {
        let (shape, levels) = match mode {
            ScalingMode::Linear => (HierarchyShape::Linear, linear_levels(num_thoughts)),
            ScalingMode::Exponential => (
                HierarchyShape::Exponential,
                exponential_levels(num_thoughts),
            ),
            ScalingMode::Adaptive => adaptive_levels(num_thoughts),
        };
        Self {
            num_thoughts,
            mode,
            shape,
            levels,
            compression_ratio: compression_ratio(num_thoughts, mode),
        }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn max_level(&self) -> Option<usize> {
        self.levels.keys().next_back().copied()
    }

    /// Level owning `thought` (1-based). Non-partitioning shapes fall back to the
    /// shallowest level whose capacity reaches the thought index.
    pub fn level_for(&self, thought: usize) -> Option<usize> {
        let owner = self.levels.iter().find(|(_, level)| {
            matches!(level.thoughts, Some((lo, hi)) if lo <= thought && thought <= hi)
        });
        if let Some((&index, _)) = owner {
            return Some(index);
        }
        self.levels
            .iter()
            .find(|(_, level)| level.thoughts.is_none() && level.capacity >= thought)
            .or_else(|| self.levels.iter().next_back())
            .map(|(&index, _)| index)
    }
}

fn linear_levels(n: usize) -> BTreeMap<usize, HierarchyLevel> {
    let mut levels = BTreeMap::new();
    if n == 0 {
        return levels;
    }
    let chunk = (n / 10).max(1);
    let num_levels = (n + chunk - 1) / chunk;
    for level in 0..num_levels {
        let lo = level * chunk + 1;
        let hi = ((level + 1) * chunk).min(n);
        let capacity = hi - lo + 1;
        levels.insert(
            level,
            HierarchyLevel {
                capacity,
                exploration_width: capacity,
                specialization: Specialization::from_depth_ratio(level_ratio(level, num_levels)),
                priority: 1.0 - level as f64 * 0.1,
                parallel_streams: parallel_streams_for(capacity, capacity),
                thoughts: Some((lo, hi)),
                certainty_threshold: None,
                pruning_rate: None,
            },
        );
    }
    levels
}

fn exponential_levels(n: usize) -> BTreeMap<usize, HierarchyLevel> {
    let mut levels = BTreeMap::new();
    if n == 0 {
        return levels;
    }
    let num_levels = ((n as f64).log2().ceil() as usize).max(3);
    let base = (n as f64).powf(1.0 / num_levels as f64);
    for level in 0..num_levels {
        let capacity = (base.powi(level as i32).round() as usize).min(n);
        levels.insert(
            level,
            HierarchyLevel {
                capacity,
                exploration_width: capacity,
                specialization: Specialization::from_depth_ratio(level_ratio(level, num_levels)),
                priority: 1.0 - level as f64 / num_levels as f64,
                parallel_streams: parallel_streams_for(capacity, capacity),
                thoughts: None,
                certainty_threshold: Some(0.1 + level as f64 * 0.15),
                pruning_rate: Some(0.05 + level as f64 * 0.05),
            },
        );
    }
    levels
}

fn adaptive_levels(n: usize) -> (HierarchyShape, BTreeMap<usize, HierarchyLevel>) {
    if n <= 16 {
        return (HierarchyShape::Linear, linear_levels(n));
    }
    if n <= 256 {
        let fan_out = ((n as f64).sqrt().round() as usize).max(2);
        return (
            HierarchyShape::BalancedTree { fan_out },
            balanced_tree_levels(n, fan_out),
        );
    }
    let depth = ((n as f64).log10().round() as usize) + 2;
    (HierarchyShape::Deep { depth }, deep_levels(n, depth))
}

fn balanced_tree_levels(n: usize, fan_out: usize) -> BTreeMap<usize, HierarchyLevel> {
    let mut levels = BTreeMap::new();
    let mut capacity = 1usize;
    let mut shapes = Vec::new();
    loop {
        shapes.push(capacity.min(n));
        if capacity >= n {
            break;
        }
        capacity = capacity.saturating_mul(fan_out);
    }
    let num_levels = shapes.len();
    for (level, capacity) in shapes.into_iter().enumerate() {
        levels.insert(
            level,
            HierarchyLevel {
                capacity,
                exploration_width: fan_out,
                specialization: Specialization::from_depth_ratio(level_ratio(level, num_levels)),
                priority: 1.0 - level as f64 / num_levels as f64,
                parallel_streams: parallel_streams_for(capacity, fan_out),
                thoughts: None,
                certainty_threshold: None,
                pruning_rate: None,
            },
        );
    }
    levels
}

fn deep_levels(n: usize, depth: usize) -> BTreeMap<usize, HierarchyLevel> {
    let mut levels = BTreeMap::new();
    let per_level = n / depth;
    for level in 0..depth {
        let lo = level * per_level + 1;
        let hi = if level + 1 == depth {
            n
        } else {
            (level + 1) * per_level
        };
        let capacity = hi - lo + 1;
        let exploration_width = (per_level / (level + 1)).max(1);
        levels.insert(
            level,
            HierarchyLevel {
                capacity,
                exploration_width,
                specialization: Specialization::from_depth_ratio(level as f64 / depth as f64),
                priority: 1.0 - level as f64 / depth as f64,
                parallel_streams: parallel_streams_for(capacity, exploration_width),
                thoughts: Some((lo, hi)),
                certainty_threshold: None,
                pruning_rate: None,
            },
        );
    }
    levels
}

pub fn compression_ratio(n: usize, mode: ScalingMode) -> f64 {
    match mode {
        ScalingMode::Linear => 1.0,
        ScalingMode::Exponential => (0.9 - (n.max(10) as f64).log10() / 4.0).max(0.1),
        ScalingMode::Adaptive => match n {
            0..=64 => 1.0,
            65..=256 => 0.8,
            257..=1024 => 0.6,
            _ => 0.4,
        },
    }
}
