use anyhow::{anyhow, Result};
use latent_engine::hierarchy::{
    build_channels, build_message_configs, Channel, Hierarchy, MessagePassingConfig,
    RecursiveStructure, ScalingMode,
};
use latent_engine::*;
use latent_utils::u8s_from_str;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub model: ModelOptions,
    pub reasoning: ReasoningOptions,
}

#[derive(Serialize, Debug)]
pub struct LogitsOutput {
    pub hidden_state: Vec<f64>,
    pub logits: Vec<f64>,
    pub top_tokens: Vec<(usize, f64)>,
}

#[derive(Serialize, Debug)]
pub struct BatchSummary {
    pub num_thoughts: usize,
    pub scaling_mode: ScalingMode,
    pub num_levels: usize,
    pub compression_ratio: f64,
    pub mean_norm: f64,
    pub paths_per_level: BTreeMap<usize, BTreeMap<usize, usize>>,
}

#[derive(Serialize, Debug)]
pub struct HierarchyReport {
    pub hierarchy: Hierarchy,
    pub message_passing: BTreeMap<usize, MessagePassingConfig>,
    pub channels: Vec<Channel>,
    pub recursive_structure: RecursiveStructure,
}

pub const TOP_TOKENS: usize = 5;

/// Builds the model with its seed derived from `seed`.
pub fn build_model(settings: &Settings, seed: &str) -> Result<ModelConfig> {
    let mut options = settings.model.clone();
    options.seed = u8s_from_str(seed);
    build_config(&options).map_err(|e| anyhow!("Failed to build model: {}", e))
}

pub fn initial_state(config: &ModelConfig, tokens: &[i64]) -> Result<Vec<f64>> {
    Ok(tokens_to_hidden_state(config, tokens)?)
}

/// Runs the loop on a blocking thread. When `timeout_ms` elapses the loop is
/// cancelled at its next iteration and the call returns `TimeoutExceeded`.
pub async fn run_reasoning(
    config: Arc<ModelConfig>,
    initial: Vec<f64>,
    num_thoughts: usize,
    opts: ReasoningOptions,
) -> Result<ReasoningResult> {
    let timeout = opts.timeout();
    let cancel = CancelToken::with_timeout(timeout);
    let handle = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            ContinuousThoughtLoop::new(&config, &opts)
                .with_cancel(cancel)
                .run(&initial, num_thoughts)
        })
    };

    match tokio::time::timeout(timeout, handle).await {
        Ok(joined) => Ok(joined??),
        Err(_) => {
            log::warn!("Reasoning timed out after {:?}, cancelling", timeout);
            cancel.cancel();
            Err(EngineError::TimeoutExceeded {
                timeout_ms: timeout.as_millis() as u64,
            }
            .into())
        }
    }
}

pub fn compute_logits(config: &ModelConfig, tokens: &[i64]) -> Result<LogitsOutput> {
    let hidden_state = tokens_to_hidden_state(config, tokens)?;
    let logits = hidden_state_to_logits(config, &hidden_state)?;
    Ok(LogitsOutput {
        top_tokens: top_k(&logits, TOP_TOKENS),
        hidden_state,
        logits,
    })
}

/// Highest `k` (token id, logit) pairs, best first.
pub fn top_k(logits: &[f64], k: usize) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = logits.iter().cloned().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

pub fn summarize_batch(
    states: &[LatentState],
    num_thoughts: usize,
    scaling_mode: ScalingMode,
) -> BatchSummary {
    let hierarchy = Hierarchy::build(num_thoughts, scaling_mode);
    let mut paths_per_level: BTreeMap<usize, BTreeMap<usize, usize>> = BTreeMap::new();
    for state in states {
        *paths_per_level
            .entry(state.level)
            .or_default()
            .entry(state.selected_path.index)
            .or_default() += 1;
    }
    let mean_norm = if states.is_empty() {
        0.0
    } else {
        states.iter().map(|s| s.norm).sum::<f64>() / states.len() as f64
    };
    BatchSummary {
        num_thoughts,
        scaling_mode,
        num_levels: hierarchy.num_levels(),
        compression_ratio: hierarchy.compression_ratio,
        mean_norm,
        paths_per_level,
    }
}

pub fn describe_hierarchy(
    num_thoughts: usize,
    scaling_mode: ScalingMode,
    max_depth: usize,
    branching_factor: usize,
) -> Result<HierarchyReport> {
    let recursive_structure = RecursiveStructure::build(max_depth, branching_factor)?;
    let hierarchy = Hierarchy::build(num_thoughts, scaling_mode);
    Ok(HierarchyReport {
        message_passing: build_message_configs(&hierarchy),
        channels: build_channels(&hierarchy),
        recursive_structure,
        hierarchy,
    })
}
