use crate::config::ModelConfig;
use crate::error::EngineResult;
use crate::forward::first_layer;
use crate::hierarchy::Specialization;
use crate::math::{self, Vector};

/// Picks the reasoning role of a step from how peaked its routing distribution is.
pub fn classify_step(routing_probs: &[f64]) -> Specialization {
    let peak = routing_probs.iter().cloned().fold(0.0, f64::max);
    if peak > 0.7 {
        Specialization::Synthesis
    } else if peak > 0.4 {
        Specialization::Analysis
    } else {
        Specialization::Exploration
    }
}

pub fn hierarchical_transform(
    config: &ModelConfig,
    hidden: &[f64],
    routing_probs: &[f64],
) -> EngineResult<Vector> {
    let weights = &config.strategy_weights;
    match classify_step(routing_probs) {
        Specialization::Exploration => math::matvec(&weights.exploration, hidden),
        Specialization::Analysis => math::matvec(&weights.analysis, hidden),
        Specialization::Synthesis => {
            // compression
            let projected = math::matvec(&weights.synthesis, hidden)?;
            first_layer(config)?.norm2.apply(&projected)
        }
    }
}
