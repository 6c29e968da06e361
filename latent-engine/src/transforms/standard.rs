use crate::config::{FeedForward, ModelConfig, TransformerLayer};
use crate::error::EngineResult;
use crate::math::{self, gelu, Vector};

/// Runs `hidden` through every transformer layer as a sequence of length one.
pub fn standard_transform(config: &ModelConfig, hidden: &[f64]) -> EngineResult<Vector> {
    let mut x = hidden.to_vec();
    for layer in &config.layers {
        let attended = self_attention(layer, &x)?;
        let h = math::add(&x, &attended)?;
        let ff = feed_forward(&layer.feed_forward, &layer.norm2.apply(&h)?)?;
        x = math::add(&h, &ff)?;
    }
    Ok(x)
}

/// With a single position every head's softmax weight is 1, so each head
/// contributes its value projection unchanged.
pub fn self_attention(layer: &TransformerLayer, x: &[f64]) -> EngineResult<Vector> {
    let mut concat = Vec::with_capacity(x.len());
    for head in &layer.heads {
        concat.extend(math::matvec(&head.w_v, x)?);
    }
    math::matvec(&layer.output_projection, &concat)
}

pub fn feed_forward(ff: &FeedForward, x: &[f64]) -> EngineResult<Vector> {
    let inner = math::add(&math::matvec(&ff.w1, x)?, &ff.b1)?;
    let activated: Vector = inner.into_iter().map(gelu).collect();
    math::add(&math::matvec(&ff.w2, &activated)?, &ff.b2)
}
