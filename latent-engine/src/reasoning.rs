use crate::config::ModelConfig;
use crate::error::{invalid_config, EngineError, EngineResult};
use crate::forward::{attention_pattern, latent_forward_step, AttentionPattern, RoutingDecision};
use crate::math::{self, Activation, Vector};
use crate::transforms::{CollapseStrategy, TransformType, DEFAULT_SUPERPOSITION_COMPONENTS};
use logging_timer::time;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

pub const DEFAULT_MAX_COMPUTATION_STEPS: usize = 1000;
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 0.01;
pub const DEFAULT_TIMEOUT_MS: u64 = 5 * 60 * 1000;
/// Parallel-stream bookkeeping only runs for the first steps of a request.
pub const PARALLEL_STREAM_STEP_LIMIT: usize = 50;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReasoningOptions {
    pub parallel_processing: bool,
    pub transform_type: TransformType,
    pub convergence_threshold: f64,
    pub superposition_components: usize,
    pub collapse_strategy: CollapseStrategy,
    pub max_recursion: usize,
    pub activation: Activation,
    pub max_computation_steps: usize,
    /// Enforced by the caller, see `CancelToken::with_timeout`.
    pub timeout_ms: u64,
}

impl Default for ReasoningOptions {
    fn default() -> Self {
        Self {
            parallel_processing: false,
            transform_type: TransformType::Standard,
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            superposition_components: DEFAULT_SUPERPOSITION_COMPONENTS,
            collapse_strategy: CollapseStrategy::MaxAmplitude,
            max_recursion: 2,
            activation: Activation::Gelu,
            max_computation_steps: DEFAULT_MAX_COMPUTATION_STEPS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ReasoningOptions {
    pub fn validate(&self) -> EngineResult<()> {
        if self.superposition_components == 0 {
            return Err(invalid_config("superposition_components must be at least 1"));
        }
        if self.convergence_threshold.is_nan() {
            return Err(invalid_config("convergence_threshold must be a number"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Checked once per loop iteration. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<(Instant, u64)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some((Instant::now() + timeout, timeout.as_millis() as u64)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if let Some((deadline, timeout_ms)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::TimeoutExceeded { timeout_ms });
            }
        }
        Ok(())
    }
}

/// Hook for auxiliary parallel-stream work. Does nothing unless overridden.
pub trait ThoughtObserver: Sync {
    fn on_parallel_step(&self, _step: usize, _hidden: &[f64]) {}
}

pub struct NoopObserver;

impl ThoughtObserver for NoopObserver {}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Termination {
    BudgetExhausted,
    Converged { step: usize },
    /// Not an error: the safety valve on `max_computation_steps` fired.
    StepLimitReached,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConvergenceMetrics {
    pub trajectory_length: usize,
    pub final_norm: f64,
    pub attention_entropy: f64,
    pub routing_diversity: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReasoningTrace {
    pub steps_taken: usize,
    pub termination: Termination,
    pub transform_type: TransformType,
    pub dominant_path: Option<usize>,
    pub path_switches: usize,
    pub norm_trajectory: Vec<f64>,
}

impl ReasoningTrace {
    pub fn summary(&self) -> String {
        let ending = match self.termination {
            Termination::BudgetExhausted => "thought budget exhausted".to_string(),
            Termination::Converged { step } => format!("converged at step {}", step),
            Termination::StepLimitReached => "step limit reached".to_string(),
        };
        format!(
            "{} steps of {} reasoning, {}, {} path switches",
            self.steps_taken, self.transform_type, ending, self.path_switches
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReasoningResult {
    pub final_state: Vector,
    pub thought_trajectory: Vec<Vector>,
    pub attention_patterns: Vec<AttentionPattern>,
    pub routing_decisions: Vec<RoutingDecision>,
    pub convergence_metrics: ConvergenceMetrics,
    pub reasoning_trace: ReasoningTrace,
}

#[derive(Default)]
struct Accumulator {
    thought_trajectory: Vec<Vector>,
    attention_patterns: Vec<AttentionPattern>,
    routing_decisions: Vec<RoutingDecision>,
}

/// Drives repeated `latent_forward_step`s over one hidden vector.
pub struct ContinuousThoughtLoop<'a> {
    config: &'a ModelConfig,
    opts: &'a ReasoningOptions,
    cancel: CancelToken,
    observer: &'a dyn ThoughtObserver,
}

impl<'a> ContinuousThoughtLoop<'a> {
    pub fn new(config: &'a ModelConfig, opts: &'a ReasoningOptions) -> Self {
        Self {
            config,
            opts,
            cancel: CancelToken::new(),
            observer: &NoopObserver,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ThoughtObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn run(&self, initial: &[f64], num_thoughts: usize) -> EngineResult<ReasoningResult> {
        self.opts.validate()?;
        if initial.len() != self.config.model_dim() {
            return Err(EngineError::DimensionMismatch {
                operation: "continuous_thought_forward",
                expected: self.config.model_dim(),
                actual: initial.len(),
            });
        }

        let mut acc = Accumulator::default();
        let mut current = initial.to_vec();
        let termination = match self.iterate(&mut acc, &mut current, num_thoughts) {
            Ok(termination) => termination,
            Err(e @ (EngineError::Cancelled | EngineError::TimeoutExceeded { .. })) => {
                return Err(e)
            }
            Err(EngineError::ComputationFailed { message }) => {
                return Err(EngineError::ComputationFailed { message })
            }
            Err(e) => {
                return Err(EngineError::ComputationFailed {
                    message: e.to_string(),
                })
            }
        };

        let result = self.finish(acc, current, termination);
        log::info!("{}", result.reasoning_trace.summary());
        Ok(result)
    }

    fn iterate(
        &self,
        acc: &mut Accumulator,
        current: &mut Vector,
        num_thoughts: usize,
    ) -> EngineResult<Termination> {
        let mut remaining = num_thoughts;
        loop {
            if remaining == 0 {
                return Ok(Termination::BudgetExhausted);
            }
            if acc.thought_trajectory.len() >= self.opts.max_computation_steps {
                log::warn!(
                    "Continuous thought loop hit the step limit of {} with {} thoughts remaining",
                    self.opts.max_computation_steps,
                    remaining
                );
                return Ok(Termination::StepLimitReached);
            }
            self.cancel.check()?;

            let step = acc.thought_trajectory.len();
            let (new_hidden, decision) = latent_forward_step(self.config, current, self.opts)?;
            if !math::is_finite(&new_hidden) {
                return Err(EngineError::ComputationFailed {
                    message: format!("non-finite hidden state at step {}", step),
                });
            }
            let pattern = attention_pattern(self.config, current, &new_hidden)?;
            let delta = math::norm(&math::sub(&new_hidden, current)?);
            log::debug!(
                "step {}: path {} (p={:.4}), delta {:.6}",
                step,
                decision.selected_path.index,
                decision.selected_path.probability,
                delta
            );

            acc.thought_trajectory.push(new_hidden.clone());
            acc.attention_patterns.push(pattern);
            acc.routing_decisions.push(decision);

            if self.opts.parallel_processing && step < PARALLEL_STREAM_STEP_LIMIT {
                self.observer.on_parallel_step(step, &new_hidden);
            }

            *current = new_hidden;
            if delta < self.opts.convergence_threshold {
                return Ok(Termination::Converged { step });
            }
            remaining -= 1;
        }
    }

    fn finish(&self, acc: Accumulator, final_state: Vector, termination: Termination) -> ReasoningResult {
        let steps = acc.thought_trajectory.len();
        let probabilities: Vec<f64> = acc
            .attention_patterns
            .iter()
            .map(|p| p.attention_probability)
            .collect();
        let paths: Vec<usize> = acc
            .routing_decisions
            .iter()
            .map(|d| d.selected_path.index)
            .collect();
        let distinct = paths.iter().collect::<HashSet<_>>().len();
        let routing_diversity = if steps == 0 {
            0.0
        } else {
            distinct as f64 / steps as f64
        };

        let convergence_metrics = ConvergenceMetrics {
            trajectory_length: steps,
            final_norm: math::norm(&final_state),
            attention_entropy: math::entropy(&probabilities),
            routing_diversity,
        };
        let reasoning_trace = ReasoningTrace {
            steps_taken: steps,
            termination,
            transform_type: self.opts.transform_type,
            dominant_path: dominant_path(&paths),
            path_switches: paths.windows(2).filter(|w| w[0] != w[1]).count(),
            norm_trajectory: acc.thought_trajectory.iter().map(|h| math::norm(h)).collect(),
        };

        ReasoningResult {
            final_state,
            thought_trajectory: acc.thought_trajectory,
            attention_patterns: acc.attention_patterns,
            routing_decisions: acc.routing_decisions,
            convergence_metrics,
            reasoning_trace,
        }
    }
}

fn dominant_path(paths: &[usize]) -> Option<usize> {
    let mut counts = std::collections::BTreeMap::new();
    for &p in paths {
        *counts.entry(p).or_insert(0usize) += 1;
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(usize, usize)>, (path, count)| match best {
            Some((_, c)) if c >= count => best,
            _ => Some((path, count)),
        })
        .map(|(path, _)| path)
}

#[time]
pub fn continuous_thought_forward(
    config: &ModelConfig,
    initial: &[f64],
    num_thoughts: usize,
    opts: &ReasoningOptions,
) -> EngineResult<ReasoningResult> {
    ContinuousThoughtLoop::new(config, opts).run(initial, num_thoughts)
}
