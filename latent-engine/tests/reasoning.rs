use latent_engine::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn small_config() -> ModelConfig {
    build_config(&ModelOptions {
        model_dim: 8,
        num_heads: 2,
        num_layers: 1,
        intermediate_dim: 16,
        vocab_size: 16,
        ..Default::default()
    })
    .unwrap()
}

fn never_converge(transform_type: TransformType) -> ReasoningOptions {
    ReasoningOptions {
        transform_type,
        convergence_threshold: -1.0,
        ..Default::default()
    }
}

#[test]
fn test_zero_thoughts_is_identity() {
    let config = small_config();
    let initial = tokens_to_hidden_state(&config, &[2, 3]).unwrap();
    let result =
        continuous_thought_forward(&config, &initial, 0, &ReasoningOptions::default()).unwrap();
    assert_eq!(result.final_state, initial);
    assert!(result.thought_trajectory.is_empty());
    assert!(result.attention_patterns.is_empty());
    assert_eq!(result.reasoning_trace.termination, Termination::BudgetExhausted);
    assert_eq!(result.convergence_metrics.routing_diversity, 0.0);
}

#[test]
fn test_end_to_end_recursive() {
    let config = build_config(&ModelOptions {
        model_dim: 8,
        num_heads: 2,
        num_layers: 1,
        vocab_size: 16,
        ..Default::default()
    })
    .unwrap();
    let initial = tokens_to_hidden_state(&config, &[]).unwrap();
    assert_eq!(initial, vec![0.0; 8]);

    let opts = ReasoningOptions {
        max_recursion: 2,
        ..never_converge(TransformType::Recursive)
    };
    let result = continuous_thought_forward(&config, &initial, 5, &opts).unwrap();
    assert_eq!(result.thought_trajectory.len(), 5);
    assert!(result.thought_trajectory.iter().all(|h| h.len() == 8));
    assert_eq!(result.routing_decisions.len(), 5);
    assert_eq!(result.attention_patterns.len(), 5);
    assert_eq!(result.final_state, result.thought_trajectory[4]);
    assert_eq!(result.reasoning_trace.termination, Termination::BudgetExhausted);
    assert_eq!(result.convergence_metrics.trajectory_length, 5);
    assert_eq!(hidden_state_to_logits(&config, &result.final_state).unwrap().len(), 16);
}

#[test]
fn test_final_state_moves_for_every_transform() {
    let config = small_config();
    let initial = tokens_to_hidden_state(&config, &[1, 7, 11]).unwrap();
    for transform_type in [
        TransformType::Standard,
        TransformType::Hierarchical,
        TransformType::Superposition,
        TransformType::Recursive,
    ] {
        let result =
            continuous_thought_forward(&config, &initial, 3, &never_converge(transform_type))
                .unwrap();
        assert_eq!(result.final_state.len(), 8);
        assert_ne!(result.final_state, initial, "{}", transform_type);
        assert_eq!(result.reasoning_trace.norm_trajectory.len(), 3);
    }
}

#[test]
fn test_step_limit() {
    let config = small_config();
    let initial = tokens_to_hidden_state(&config, &[5]).unwrap();
    let opts = ReasoningOptions {
        max_computation_steps: 7,
        ..never_converge(TransformType::Standard)
    };
    let result = continuous_thought_forward(&config, &initial, 20, &opts).unwrap();
    assert_eq!(result.thought_trajectory.len(), 7);
    assert_eq!(result.reasoning_trace.termination, Termination::StepLimitReached);
}

#[test]
fn test_early_convergence() {
    let config = small_config();
    let initial = tokens_to_hidden_state(&config, &[5]).unwrap();
    let opts = ReasoningOptions {
        convergence_threshold: f64::INFINITY,
        ..Default::default()
    };
    let result = continuous_thought_forward(&config, &initial, 10, &opts).unwrap();
    assert_eq!(result.thought_trajectory.len(), 1);
    assert_eq!(
        result.reasoning_trace.termination,
        Termination::Converged { step: 0 }
    );
}

#[test]
fn test_wrong_initial_length() {
    let config = small_config();
    assert!(matches!(
        continuous_thought_forward(&config, &[0.0; 3], 2, &ReasoningOptions::default()),
        Err(EngineError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_invalid_options() {
    let config = small_config();
    let opts = ReasoningOptions {
        superposition_components: 0,
        ..Default::default()
    };
    assert!(matches!(
        continuous_thought_forward(&config, &[0.0; 8], 2, &opts),
        Err(EngineError::InvalidSchemaConfig { .. })
    ));
}

#[test]
fn test_cancelled_before_first_step() {
    let config = small_config();
    let opts = ReasoningOptions::default();
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = ContinuousThoughtLoop::new(&config, &opts)
        .with_cancel(cancel.clone())
        .run(&[0.1; 8], 3);
    assert_eq!(result, Err(EngineError::Cancelled));
    assert!(cancel.is_cancelled());
}

#[test]
fn test_expired_deadline() {
    let config = small_config();
    let opts = ReasoningOptions::default();
    let cancel = CancelToken::with_timeout(Duration::from_millis(0));
    let result = ContinuousThoughtLoop::new(&config, &opts)
        .with_cancel(cancel)
        .run(&[0.1; 8], 3);
    assert_eq!(result, Err(EngineError::TimeoutExceeded { timeout_ms: 0 }));
}

#[test]
fn test_non_finite_state_fails() {
    let config = small_config();
    let mut initial = vec![0.1; 8];
    initial[2] = f64::NAN;
    let result = continuous_thought_forward(&config, &initial, 2, &ReasoningOptions::default());
    match result {
        Err(EngineError::ComputationFailed { message }) => {
            assert!(message.contains("non-finite"))
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

struct CountingObserver(AtomicUsize);

impl ThoughtObserver for CountingObserver {
    fn on_parallel_step(&self, _step: usize, hidden: &[f64]) {
        assert_eq!(hidden.len(), 8);
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_observer_only_for_parallel_processing() {
    let config = small_config();
    let observer = CountingObserver(AtomicUsize::new(0));

    let sequential = never_converge(TransformType::Standard);
    ContinuousThoughtLoop::new(&config, &sequential)
        .with_observer(&observer)
        .run(&[0.1; 8], 4)
        .unwrap();
    assert_eq!(observer.0.load(Ordering::SeqCst), 0);

    let parallel = ReasoningOptions {
        parallel_processing: true,
        max_computation_steps: 60,
        ..never_converge(TransformType::Standard)
    };
    ContinuousThoughtLoop::new(&config, &parallel)
        .with_observer(&observer)
        .run(&[0.1; 8], 60)
        .unwrap();
    assert_eq!(observer.0.load(Ordering::SeqCst), PARALLEL_STREAM_STEP_LIMIT);
}

#[test]
fn test_trace_summary() {
    let config = small_config();
    let initial = tokens_to_hidden_state(&config, &[4]).unwrap();
    let result = continuous_thought_forward(
        &config,
        &initial,
        3,
        &never_converge(TransformType::Hierarchical),
    )
    .unwrap();
    let summary = result.reasoning_trace.summary();
    assert!(summary.starts_with("3 steps of hierarchical reasoning"));
    assert!(result.reasoning_trace.dominant_path.is_some());
    assert!(result.convergence_metrics.routing_diversity > 0.0);
}
