use latent_engine::*;

fn small_options() -> ModelOptions {
    ModelOptions {
        model_dim: 8,
        num_heads: 2,
        num_layers: 1,
        intermediate_dim: 16,
        vocab_size: 16,
        ..Default::default()
    }
}

#[test]
fn test_default_options() {
    let options = ModelOptions::default();
    assert_eq!(options.model_dim, 768);
    assert_eq!(options.num_heads, 12);
    assert_eq!(options.num_layers, 12);
    assert_eq!(options.intermediate_dim, 3072);
    assert_eq!(options.vocab_size, 50257);
    assert_eq!(options.head_dim(), 64);
    assert!(options.validate().is_ok());
}

#[test]
fn test_options_from_partial_json() {
    let options: ModelOptions =
        serde_json::from_str(r#"{"model_dim": 8, "num_heads": 2, "precision": "float32"}"#)
            .unwrap();
    assert_eq!(options.model_dim, 8);
    assert_eq!(options.num_layers, 12);
    assert_eq!(options.precision, Precision::Float32);
}

#[test]
fn test_invalid_options() {
    let mut options = small_options();
    options.num_heads = 3;
    assert!(matches!(
        build_config(&options),
        Err(EngineError::InvalidSchemaConfig { .. })
    ));

    let mut options = small_options();
    options.vocab_size = 0;
    assert!(build_config(&options).is_err());

    let mut options = small_options();
    options.device = "cuda".to_string();
    assert!(build_config(&options).is_err());
}

#[test]
fn test_weight_shapes() {
    let config = build_config(&small_options()).unwrap();
    assert_eq!(config.embedding_matrix.dim(), (16, 8));
    assert_eq!(config.output_projection.dim(), (8, 16));
    assert_eq!(config.latent_routing_weights.dim(), (8, 8));
    assert_eq!(config.continuous_thought_weights.dim(), (8, 8));
    assert_eq!(config.meta_reasoning_weights.len(), META_REASONING_DEPTHS);
    assert_eq!(config.layers.len(), 1);

    let layer = &config.layers[0];
    assert_eq!(layer.heads.len(), 2);
    assert_eq!(layer.heads[0].w_q.dim(), (4, 8));
    assert_eq!(layer.heads[0].w_o.dim(), (8, 4));
    assert_eq!(layer.feed_forward.w1.dim(), (16, 8));
    assert_eq!(layer.feed_forward.w2.dim(), (8, 16));
    assert!(layer.feed_forward.b1.iter().all(|b| *b == 0.0));
    assert!(layer.norm1.weight.iter().all(|w| *w == 1.0));
    assert!(layer.norm2.bias.iter().all(|b| *b == 0.0));
}

#[test]
fn test_xavier_limit() {
    let config = build_config(&small_options()).unwrap();
    let limit = (6.0f64 / 16.0).sqrt();
    assert!(config
        .latent_routing_weights
        .iter()
        .all(|w| w.abs() <= limit));
    assert!(config.latent_routing_weights.iter().any(|w| *w != 0.0));
}

#[test]
fn test_deterministic_seed() {
    let a = build_config(&small_options()).unwrap();
    let b = build_config(&small_options()).unwrap();
    assert_eq!(a.embedding_matrix, b.embedding_matrix);
    assert_eq!(a.continuous_thought_weights, b.continuous_thought_weights);

    let mut options = small_options();
    options.seed = latent_utils::u8s_from_str("another seed");
    let c = build_config(&options).unwrap();
    assert_ne!(a.embedding_matrix, c.embedding_matrix);
}

#[test]
fn test_float32_precision() {
    let mut options = small_options();
    options.precision = Precision::Float32;
    let config = build_config(&options).unwrap();
    assert!(config
        .embedding_matrix
        .iter()
        .all(|w| (*w as f32) as f64 == *w));
}

#[test]
fn test_tokens_to_hidden_state() {
    let config = build_config(&small_options()).unwrap();
    assert_eq!(tokens_to_hidden_state(&config, &[]).unwrap(), vec![0.0; 8]);

    let hidden = tokens_to_hidden_state(&config, &[3]).unwrap();
    assert_eq!(hidden, config.embedding_matrix.row(3).to_vec());

    let averaged = tokens_to_hidden_state(&config, &[3, 5]).unwrap();
    for i in 0..8 {
        let expected = (config.embedding_matrix[[3, i]] + config.embedding_matrix[[5, i]]) / 2.0;
        assert!((averaged[i] - expected).abs() < 1e-12);
    }

    // unknown ids count as zero rows
    let degraded = tokens_to_hidden_state(&config, &[3, 999, -1]).unwrap();
    assert_eq!(degraded.len(), 8);
    for i in 0..8 {
        assert!((degraded[i] - config.embedding_matrix[[3, i]] / 3.0).abs() < 1e-12);
    }
}

#[test]
fn test_hidden_state_to_logits() {
    let config = build_config(&small_options()).unwrap();
    let hidden = tokens_to_hidden_state(&config, &[1, 2, 3]).unwrap();
    assert_eq!(hidden_state_to_logits(&config, &hidden).unwrap().len(), 16);
    assert!(matches!(
        hidden_state_to_logits(&config, &[1.0; 5]),
        Err(EngineError::DimensionMismatch { .. })
    ));
}
