use crate::error::{invalid_config, EngineResult};
use crate::math::{self, Vector};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SUPERPOSITION_COMPONENTS: usize = 5;

/// A contiguous chunk of a hidden vector with its amplitude/phase bookkeeping.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SuperpositionComponent {
    pub component_id: usize,
    /// Position of the chunk's first element in the source vector.
    pub offset: usize,
    pub state_vector: Vector,
    /// Raw `‖chunk‖ / 10`; the normalized value lives in `SuperpositionState::amplitudes`.
    pub probability_amplitude: f64,
    #[serde(rename = "quantum_phase")]
    pub phase: f64,
    pub collapse_probability: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SuperpositionState {
    pub source_dim: usize,
    pub components: Vec<SuperpositionComponent>,
    /// Unit L2 norm.
    pub amplitudes: Vec<f64>,
    pub coherence_level: f64,
    /// (i, j, cosine similarity) for every pair of equal-length chunks.
    pub entanglement_map: Vec<(usize, usize, f64)>,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollapseStrategy {
    #[default]
    MaxAmplitude,
    Weighted,
}

pub fn decompose(hidden: &[f64], num_components: usize) -> EngineResult<SuperpositionState> {
    if num_components == 0 {
        return Err(invalid_config("superposition_components must be at least 1"));
    }
    if hidden.is_empty() {
        return Err(invalid_config("cannot decompose an empty hidden state"));
    }
    let components: Vec<SuperpositionComponent> = chunk_bounds(hidden.len(), num_components)
        .into_iter()
        .enumerate()
        .map(|(component_id, (offset, len))| {
            let chunk = &hidden[offset..offset + len];
            let magnitude = math::norm(chunk);
            SuperpositionComponent {
                component_id,
                offset,
                state_vector: chunk.to_vec(),
                probability_amplitude: magnitude / 10.0,
                phase: chunk.iter().sum::<f64>().atan2(chunk.len() as f64),
                collapse_probability: (magnitude * 0.1).min(1.0),
            }
        })
        .collect();

    let raw: Vec<f64> = components.iter().map(|c| c.probability_amplitude).collect();
    let amplitudes = normalize_amplitudes(&raw);

    let weights: Vec<f64> = amplitudes.iter().map(|a| a * a).collect();
    let coherence_level = if amplitudes.len() > 1 {
        1.0 - math::entropy(&weights) / (amplitudes.len() as f64).ln()
    } else {
        0.0
    };

    let mut entanglement_map = Vec::new();
    for i in 0..components.len() {
        for j in (i + 1)..components.len() {
            let (a, b) = (&components[i].state_vector, &components[j].state_vector);
            if a.len() != b.len() {
                continue;
            }
            let denom = math::norm(a) * math::norm(b);
            let similarity = if denom > 0.0 { math::dot(a, b)? / denom } else { 0.0 };
            entanglement_map.push((i, j, similarity));
        }
    }

    Ok(SuperpositionState {
        source_dim: hidden.len(),
        components,
        amplitudes,
        coherence_level,
        entanglement_map,
    })
}

/// `(offset, len)` of `min(k, len)` contiguous chunks. The first `len % k` chunks
/// take one extra element.
pub fn chunk_bounds(len: usize, num_components: usize) -> Vec<(usize, usize)> {
    let k = num_components.min(len);
    if k == 0 {
        return Vec::new();
    }
    let (base, extra) = (len / k, len % k);
    let mut offset = 0;
    (0..k)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let bounds = (offset, size);
            offset += size;
            bounds
        })
        .collect()
}

/// Scales to unit L2 norm; an all-zero input becomes uniform.
pub fn normalize_amplitudes(raw: &[f64]) -> Vec<f64> {
    let total = math::norm(raw);
    if total > 0.0 {
        raw.iter().map(|a| a / total).collect()
    } else if raw.is_empty() {
        Vec::new()
    } else {
        vec![1.0 / (raw.len() as f64).sqrt(); raw.len()]
    }
}

/// Collapses back to a vector of the original length.
pub fn collapse(state: &SuperpositionState, strategy: CollapseStrategy) -> Vector {
    let mut out = vec![0.0; state.source_dim];
    match strategy {
        CollapseStrategy::MaxAmplitude => {
            let dominant = state.components.iter().zip(&state.amplitudes).fold(
                None,
                |best: Option<(&SuperpositionComponent, f64)>, (c, &a)| match best {
                    Some((b, best_a)) if best_a >= a => Some((b, best_a)),
                    _ => Some((c, a)),
                },
            );
            if let Some((c, _)) = dominant {
                out[c.offset..c.offset + c.state_vector.len()].copy_from_slice(&c.state_vector);
            }
        }
        CollapseStrategy::Weighted => {
            let k = state.components.len() as f64;
            for (c, a) in state.components.iter().zip(&state.amplitudes) {
                let weight = k * a * a;
                for (o, x) in out[c.offset..].iter_mut().zip(&c.state_vector) {
                    *o = x * weight;
                }
            }
        }
    }
    out
}

pub fn superposition_transform(
    hidden: &[f64],
    num_components: usize,
    strategy: CollapseStrategy,
) -> EngineResult<Vector> {
    let state = decompose(hidden, num_components)?;
    Ok(collapse(&state, strategy))
}
