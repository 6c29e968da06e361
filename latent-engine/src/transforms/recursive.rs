use crate::config::{ModelConfig, META_REASONING_DEPTHS};
use crate::error::EngineResult;
use crate::math::{self, Vector};

pub const MAX_TRANSFORM_RECURSION: usize = META_REASONING_DEPTHS;

/// Applies the meta-reasoning projection of each depth from `depth` up to
/// `min(max_recursion, 2)`. Returns `hidden` unchanged once the cap is reached.
pub fn recursive_transform(
    config: &ModelConfig,
    hidden: &[f64],
    depth: usize,
    max_recursion: usize,
) -> EngineResult<Vector> {
    let cap = max_recursion
        .min(MAX_TRANSFORM_RECURSION)
        .min(config.meta_reasoning_weights.len());
    if depth >= cap {
        return Ok(hidden.to_vec());
    }
    let projected = math::matvec(&config.meta_reasoning_weights[depth], hidden)?;
    recursive_transform(config, &projected, depth + 1, max_recursion)
}
