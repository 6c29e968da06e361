use crate::config::ModelConfig;
use crate::error::{EngineError, EngineResult};
use crate::math::{self, Vector};
use crate::reasoning::ReasoningOptions;
use crate::transforms::dispatch_transform;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct SelectedPath {
    pub probability: f64,
    pub index: usize,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct ActivationStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Fraction of components that are exactly zero after activation.
    pub sparsity: f64,
}

impl ActivationStats {
    pub fn from_values(values: &[f64]) -> Self {
        use statrs::statistics::Statistics;

        if values.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                sparsity: 0.0,
            };
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        let zeros = values.iter().filter(|x| **x == 0.0).count();
        Self {
            mean: values.iter().mean(),
            std_dev: values.iter().population_std_dev(),
            min,
            max,
            sparsity: zeros as f64 / values.len() as f64,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub routing_probabilities: Vector,
    pub selected_path: SelectedPath,
    pub latent_norm: f64,
    pub activation_stats: ActivationStats,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AttentionPattern {
    pub attention_score: f64,
    pub attention_probability: f64,
    pub attended_value: Vector,
    pub query_norm: f64,
    pub key_norm: f64,
    pub value_norm: f64,
}

/// One refinement of `hidden`: route, project, activate, residual, normalize, transform.
pub fn latent_forward_step(
    config: &ModelConfig,
    hidden: &[f64],
    opts: &ReasoningOptions,
) -> EngineResult<(Vector, RoutingDecision)> {
    let layer = first_layer(config)?;

    let routing_logits = math::matvec(&config.latent_routing_weights, hidden)?;
    let routing_probabilities = math::softmax(&routing_logits);
    let latent_projection = math::matvec(&config.continuous_thought_weights, hidden)?;
    let activated = opts.activation.apply_vec(&latent_projection);
    let residual = math::add(hidden, &activated)?;
    let normalized = layer.norm1.apply(&residual)?;

    let final_state = dispatch_transform(
        opts.transform_type,
        config,
        &normalized,
        &routing_probabilities,
        opts,
    )?;

    let (probability, index) = math::argmax(&routing_probabilities).unwrap_or((0.0, 0));
    let decision = RoutingDecision {
        selected_path: SelectedPath { probability, index },
        latent_norm: math::norm(&latent_projection),
        activation_stats: ActivationStats::from_values(&activated),
        routing_probabilities,
    };
    Ok((final_state, decision))
}

/// Attention of `current` over `previous` through layer 0, head 0.
///
/// The probability is a logistic gate on the scaled score rather than a softmax:
/// there is a single key, so a softmax would always be 1.
pub fn attention_pattern(
    config: &ModelConfig,
    previous: &[f64],
    current: &[f64],
) -> EngineResult<AttentionPattern> {
    let head = first_layer(config)?
        .heads
        .first()
        .ok_or_else(|| EngineError::ComputationFailed {
            message: "layer 0 has no attention heads".to_string(),
        })?;

    let query = math::matvec(&head.w_q, current)?;
    let key = math::matvec(&head.w_k, previous)?;
    let value = math::matvec(&head.w_v, previous)?;

    let attention_score = math::dot(&query, &key)? / (config.model_dim() as f64).sqrt();
    let attention_probability = math::sigmoid(attention_score);
    let attended_value = math::matvec(&head.w_o, &math::scale(&value, attention_probability))?;

    Ok(AttentionPattern {
        attention_score,
        attention_probability,
        attended_value,
        query_norm: math::norm(&query),
        key_norm: math::norm(&key),
        value_norm: math::norm(&value),
    })
}

pub(crate) fn first_layer(config: &ModelConfig) -> EngineResult<&crate::config::TransformerLayer> {
    config
        .layers
        .first()
        .ok_or_else(|| EngineError::ComputationFailed {
            message: "model config has no layers".to_string(),
        })
}
