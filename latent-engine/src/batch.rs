use crate::config::ModelConfig;
use crate::error::{EngineError, EngineResult};
use crate::forward::{latent_forward_step, SelectedPath};
use crate::hierarchy::{routing_strategy, Hierarchy, RoutingStrategy, ScalingMode, Specialization};
use crate::math::{self, Vector};
use crate::reasoning::ReasoningOptions;
use logging_timer::time;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// One annotated thought of a batch. `position` is 1-based.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LatentState {
    pub position: usize,
    pub hidden: Vector,
    pub norm: f64,
    pub selected_path: SelectedPath,
    pub level: usize,
    pub specialization: Specialization,
    pub routing_strategy: RoutingStrategy,
}

/// Transformer-style sinusoidal encoding of `position` over `dim` components.
pub fn sinusoidal_position(position: usize, dim: usize) -> Vector {
    (0..dim)
        .map(|i| {
            let exponent = (2 * (i / 2)) as f64 / dim as f64;
            let angle = position as f64 / 10000f64.powf(exponent);
            if i % 2 == 0 {
                angle.sin()
            } else {
                angle.cos()
            }
        })
        .collect()
}

fn annotate(
    config: &ModelConfig,
    hierarchy: &Hierarchy,
    initial: &[f64],
    position: usize,
    opts: &ReasoningOptions,
) -> EngineResult<LatentState> {
    let seeded = math::add(initial, &sinusoidal_position(position, initial.len()))?;
    let (hidden, decision) = latent_forward_step(config, &seeded, opts)?;
    let (level, specialization) = hierarchy
        .level_for(position)
        .and_then(|level| hierarchy.levels.get(&level).map(|l| (level, l.specialization)))
        .ok_or_else(|| EngineError::ComputationFailed {
            message: format!("no hierarchy level owns thought {}", position),
        })?;
    Ok(LatentState {
        position,
        norm: math::norm(&hidden),
        hidden,
        selected_path: decision.selected_path,
        level,
        specialization,
        routing_strategy: routing_strategy(level, specialization),
    })
}

/// Computes one independent `LatentState` per thought index. Does not run the
/// iterative loop.
#[time]
pub fn annotate_batch(
    config: &ModelConfig,
    initial: &[f64],
    num_thoughts: usize,
    scaling_mode: ScalingMode,
    opts: &ReasoningOptions,
) -> EngineResult<Vec<LatentState>> {
    opts.validate()?;
    if initial.len() != config.model_dim() {
        return Err(EngineError::DimensionMismatch {
            operation: "annotate_batch",
            expected: config.model_dim(),
            actual: initial.len(),
        });
    }
    if num_thoughts == 0 {
        return Ok(Vec::new());
    }

    let hierarchy = Hierarchy::build(num_thoughts, scaling_mode);
    let workers = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let chunk_size = (num_thoughts + workers - 1) / workers;
    log::debug!(
        "Annotating {} thoughts across {} levels in chunks of {}",
        num_thoughts,
        hierarchy.num_levels(),
        chunk_size
    );

    let positions: Vec<usize> = (1..=num_thoughts).collect();
    let chunks: Vec<Vec<LatentState>> = positions
        .par_chunks(chunk_size)
        .map(|chunk| {
            chunk
                .iter()
                .map(|&position| annotate(config, &hierarchy, initial, position, opts))
                .collect::<EngineResult<Vec<_>>>()
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let mut states: Vec<LatentState> = chunks.into_iter().flatten().collect();
    states.sort_by_key(|s| s.position);
    log::info!(
        "Annotated {} thoughts ({:?} scaling, {} levels)",
        states.len(),
        scaling_mode,
        hierarchy.num_levels()
    );
    Ok(states)
}
