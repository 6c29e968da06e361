use crate::error::{invalid_config, EngineResult};
use crate::math::{self, Vector};
use logging_timer::time;
use ndarray::Array2;
use rand::{
    distributions::{Distribution, Uniform},
    rngs::StdRng,
    Rng, SeedableRng,
};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

pub const EMBEDDING_STD: f64 = 0.02;
/// Depths at which the recursive transform owns a projection.
pub const META_REASONING_DEPTHS: usize = 2;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Float32,
    #[default]
    Float64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelOptions {
    pub model_dim: usize,
    pub num_heads: usize,
    pub num_layers: usize,
    pub intermediate_dim: usize,
    pub vocab_size: usize,
    pub device: String,
    pub precision: Precision,
    pub seed: [u8; 32],
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            model_dim: 768,
            num_heads: 12,
            num_layers: 12,
            intermediate_dim: 3072,
            vocab_size: 50257,
            device: "cpu".to_string(),
            precision: Precision::Float64,
            seed: [0u8; 32],
        }
    }
}

impl ModelOptions {
    pub fn validate(&self) -> EngineResult<()> {
        if self.model_dim == 0 {
            return Err(invalid_config("model_dim must be non-zero"));
        }
        if self.num_heads == 0 || self.model_dim % self.num_heads != 0 {
            return Err(invalid_config(format!(
                "model_dim ({}) must be divisible by num_heads ({})",
                self.model_dim, self.num_heads
            )));
        }
        if self.num_layers == 0 {
            return Err(invalid_config("num_layers must be at least 1"));
        }
        if self.intermediate_dim == 0 {
            return Err(invalid_config("intermediate_dim must be non-zero"));
        }
        if self.vocab_size == 0 {
            return Err(invalid_config("vocab_size must be non-zero"));
        }
        if self.device != "cpu" {
            return Err(invalid_config(format!(
                "device '{}' is not supported, only 'cpu'",
                self.device
            )));
        }
        Ok(())
    }

    pub fn head_dim(&self) -> usize {
        self.model_dim / self.num_heads
    }
}

/// Initialization schemes. Matrices are (fan_out, fan_in).
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum WeightInit {
    Normal { std: f64 },
    XavierUniform,
    Zeros,
    Ones,
}

impl WeightInit {
    pub fn matrix<R: Rng>(&self, rows: usize, cols: usize, rng: &mut R) -> EngineResult<Array2<f64>> {
        let values = self.sample(cols, rows, rows * cols, rng)?;
        Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| invalid_config(format!("weight shape: {}", e)))
    }

    pub fn vector<R: Rng>(&self, len: usize, rng: &mut R) -> EngineResult<Vector> {
        self.sample(len, 1, len, rng)
    }

    fn sample<R: Rng>(
        &self,
        fan_in: usize,
        fan_out: usize,
        count: usize,
        rng: &mut R,
    ) -> EngineResult<Vector> {
        Ok(match *self {
            WeightInit::Normal { std } => {
                let normal = Normal::new(0.0, std)
                    .map_err(|e| invalid_config(format!("normal init: {}", e)))?;
                (0..count).map(|_| normal.sample(rng)).collect()
            }
            WeightInit::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
                let uniform = Uniform::new_inclusive(-limit, limit);
                (0..count).map(|_| uniform.sample(rng)).collect()
            }
            WeightInit::Zeros => vec![0.0; count],
            WeightInit::Ones => vec![1.0; count],
        })
    }
}

#[derive(Debug, Clone)]
pub struct LayerNorm {
    pub weight: Vector,
    pub bias: Vector,
}

impl LayerNorm {
    pub fn apply(&self, v: &[f64]) -> EngineResult<Vector> {
        math::layer_normalize(v, &self.weight, &self.bias)
    }
}

#[derive(Debug, Clone)]
pub struct AttentionHead {
    pub w_q: Array2<f64>,
    pub w_k: Array2<f64>,
    pub w_v: Array2<f64>,
    pub w_o: Array2<f64>,
}

#[derive(Debug, Clone)]
pub struct FeedForward {
    pub w1: Array2<f64>,
    pub b1: Vector,
    pub w2: Array2<f64>,
    pub b2: Vector,
}

#[derive(Debug, Clone)]
pub struct TransformerLayer {
    pub heads: Vec<AttentionHead>,
    pub output_projection: Array2<f64>,
    pub feed_forward: FeedForward,
    pub norm1: LayerNorm,
    pub norm2: LayerNorm,
}

#[derive(Debug, Clone)]
pub struct StrategyWeights {
    pub exploration: Array2<f64>,
    pub analysis: Array2<f64>,
    pub synthesis: Array2<f64>,
}

/// Built once, never mutated. Share it freely (`&ModelConfig` or `Arc<ModelConfig>`).
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub options: ModelOptions,
    pub embedding_matrix: Array2<f64>,
    pub layers: Vec<TransformerLayer>,
    /// (model_dim, vocab_size)
    pub output_projection: Array2<f64>,
    pub latent_routing_weights: Array2<f64>,
    pub continuous_thought_weights: Array2<f64>,
    pub strategy_weights: StrategyWeights,
    pub meta_reasoning_weights: Vec<Array2<f64>>,
}

impl ModelConfig {
    pub fn model_dim(&self) -> usize {
        self.options.model_dim
    }

    pub fn vocab_size(&self) -> usize {
        self.options.vocab_size
    }

    pub fn head_dim(&self) -> usize {
        self.options.head_dim()
    }
}

#[time]
pub fn build_config(options: &ModelOptions) -> EngineResult<ModelConfig> {
    options.validate()?;
    let mut rng = StdRng::from_seed(options.seed);
    let d = options.model_dim;
    let head_dim = options.head_dim();
    let xavier = WeightInit::XavierUniform;
    let normal = WeightInit::Normal { std: EMBEDDING_STD };

    let embedding_matrix = normal.matrix(options.vocab_size, d, &mut rng)?;

    let mut layers = Vec::with_capacity(options.num_layers);
    for _ in 0..options.num_layers {
        let mut heads = Vec::with_capacity(options.num_heads);
        for _ in 0..options.num_heads {
            heads.push(AttentionHead {
                w_q: xavier.matrix(head_dim, d, &mut rng)?,
                w_k: xavier.matrix(head_dim, d, &mut rng)?,
                w_v: xavier.matrix(head_dim, d, &mut rng)?,
                w_o: xavier.matrix(d, head_dim, &mut rng)?,
            });
        }
        let output_projection = xavier.matrix(d, d, &mut rng)?;
        let feed_forward = FeedForward {
            w1: xavier.matrix(options.intermediate_dim, d, &mut rng)?,
            b1: WeightInit::Zeros.vector(options.intermediate_dim, &mut rng)?,
            w2: xavier.matrix(d, options.intermediate_dim, &mut rng)?,
            b2: WeightInit::Zeros.vector(d, &mut rng)?,
        };
        let norm1 = LayerNorm {
            weight: WeightInit::Ones.vector(d, &mut rng)?,
            bias: WeightInit::Zeros.vector(d, &mut rng)?,
        };
        let norm2 = LayerNorm {
            weight: WeightInit::Ones.vector(d, &mut rng)?,
            bias: WeightInit::Zeros.vector(d, &mut rng)?,
        };
        layers.push(TransformerLayer {
            heads,
            output_projection,
            feed_forward,
            norm1,
            norm2,
        });
    }

    let output_projection = normal.matrix(d, options.vocab_size, &mut rng)?;
    let latent_routing_weights = xavier.matrix(d, d, &mut rng)?;
    let continuous_thought_weights = xavier.matrix(d, d, &mut rng)?;
    let strategy_weights = StrategyWeights {
        exploration: xavier.matrix(d, d, &mut rng)?,
        analysis: xavier.matrix(d, d, &mut rng)?,
        synthesis: xavier.matrix(d, d, &mut rng)?,
    };
    let meta_reasoning_weights = (0..META_REASONING_DEPTHS)
        .map(|_| xavier.matrix(d, d, &mut rng))
        .collect::<EngineResult<Vec<_>>>()?;

    let mut config = ModelConfig {
        options: options.clone(),
        embedding_matrix,
        layers,
        output_projection,
        latent_routing_weights,
        continuous_thought_weights,
        strategy_weights,
        meta_reasoning_weights,
    };
    if options.precision == Precision::Float32 {
        round_to_f32(&mut config);
    }
    log::info!(
        "Built model config (model_dim: {}, layers: {}, heads: {}, vocab: {})",
        d,
        options.num_layers,
        options.num_heads,
        options.vocab_size
    );
    Ok(config)
}

fn round_to_f32(config: &mut ModelConfig) {
    fn round(m: &mut Array2<f64>) {
        m.mapv_inplace(|x| x as f32 as f64);
    }
    round(&mut config.embedding_matrix);
    round(&mut config.output_projection);
    round(&mut config.latent_routing_weights);
    round(&mut config.continuous_thought_weights);
    round(&mut config.strategy_weights.exploration);
    round(&mut config.strategy_weights.analysis);
    round(&mut config.strategy_weights.synthesis);
    config.meta_reasoning_weights.iter_mut().for_each(round);
    for layer in &mut config.layers {
        for head in &mut layer.heads {
            round(&mut head.w_q);
            round(&mut head.w_k);
            round(&mut head.w_v);
            round(&mut head.w_o);
        }
        round(&mut layer.output_projection);
        round(&mut layer.feed_forward.w1);
        round(&mut layer.feed_forward.w2);
    }
}

/// Mean of the embedding rows. Ids outside the vocabulary contribute a zero row.
pub fn tokens_to_hidden_state(config: &ModelConfig, tokens: &[i64]) -> EngineResult<Vector> {
    let d = config.model_dim();
    let mut hidden = vec![0.0; d];
    if tokens.is_empty() {
        return Ok(hidden);
    }
    for &token in tokens {
        if token < 0 || token as usize >= config.vocab_size() {
            log::debug!("Token id {} is outside the vocabulary, using a zero row", token);
            continue;
        }
        let row = config.embedding_matrix.row(token as usize);
        hidden
            .iter_mut()
            .zip(row.iter())
            .for_each(|(h, e)| *h += e);
    }
    let count = tokens.len() as f64;
    Ok(hidden.into_iter().map(|h| h / count).collect())
}

pub fn hidden_state_to_logits(config: &ModelConfig, hidden: &[f64]) -> EngineResult<Vector> {
    math::vecmat(hidden, &config.output_projection)
}
