use latent_engine::*;

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

fn sample_hidden(config: &ModelConfig) -> Vec<f64> {
    tokens_to_hidden_state(config, &[1, 4, 9]).unwrap()
}

#[test]
fn test_forward_step_shapes() {
    let config = small_config();
    let hidden = sample_hidden(&config);
    for transform_type in [
        TransformType::Standard,
        TransformType::Hierarchical,
        TransformType::Superposition,
        TransformType::Recursive,
    ] {
        let opts = ReasoningOptions {
            transform_type,
            ..Default::default()
        };
        let (next, decision) = latent_forward_step(&config, &hidden, &opts).unwrap();
        assert_eq!(next.len(), 8, "{}", transform_type);
        assert_eq!(decision.routing_probabilities.len(), 8);
        let total: f64 = decision.routing_probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_selected_path_is_argmax() {
    let config = small_config();
    let (_, decision) =
        latent_forward_step(&config, &sample_hidden(&config), &ReasoningOptions::default())
            .unwrap();
    let best = decision
        .routing_probabilities
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(decision.selected_path.probability, best);
    assert_eq!(
        decision.routing_probabilities[decision.selected_path.index],
        best
    );
    assert!(decision.latent_norm > 0.0);
    assert!(decision.activation_stats.min <= decision.activation_stats.mean);
    assert!(decision.activation_stats.mean <= decision.activation_stats.max);
}

#[test]
fn test_forward_step_rejects_wrong_length() {
    let config = small_config();
    assert!(matches!(
        latent_forward_step(&config, &[0.5; 7], &ReasoningOptions::default()),
        Err(EngineError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_relu_activation_sparsity() {
    let config = small_config();
    let opts = ReasoningOptions {
        activation: math::Activation::Relu,
        ..Default::default()
    };
    let (_, decision) = latent_forward_step(&config, &sample_hidden(&config), &opts).unwrap();
    assert!(decision.activation_stats.min >= 0.0);
    assert!((0.0..=1.0).contains(&decision.activation_stats.sparsity));
}

#[test]
fn test_attention_pattern() {
    let config = small_config();
    let previous = sample_hidden(&config);
    let (current, _) =
        latent_forward_step(&config, &previous, &ReasoningOptions::default()).unwrap();
    let pattern = attention_pattern(&config, &previous, &current).unwrap();
    assert_eq!(pattern.attended_value.len(), 8);
    assert!(pattern.attention_probability > 0.0 && pattern.attention_probability < 1.0);
    assert!((pattern.attention_probability - math::sigmoid(pattern.attention_score)).abs() < 1e-12);
    assert!(pattern.query_norm > 0.0);

    let silent = attention_pattern(&config, &vec![0.0; 8], &current).unwrap();
    assert_eq!(silent.attention_score, 0.0);
    assert_eq!(silent.attention_probability, 0.5);
    assert_eq!(silent.value_norm, 0.0);
}
