mod hierarchical;
pub use hierarchical::*;
mod recursive;
pub use recursive::*;
mod standard;
pub use standard::*;
mod superposition;
pub use superposition::*;

use crate::config::ModelConfig;
use crate::error::EngineResult;
use crate::math::Vector;
use crate::reasoning::ReasoningOptions;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransformType {
    #[default]
    Standard,
    Hierarchical,
    Superposition,
    Recursive,
}

impl std::fmt::Display for TransformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransformType::Standard => "standard",
            TransformType::Hierarchical => "hierarchical",
            TransformType::Superposition => "superposition",
            TransformType::Recursive => "recursive",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TransformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(TransformType::Standard),
            "hierarchical" => Ok(TransformType::Hierarchical),
            "superposition" => Ok(TransformType::Superposition),
            "recursive" => Ok(TransformType::Recursive),
            _ => Err(format!("Unknown transform type '{}'", s)),
        }
    }
}

pub fn dispatch_transform(
    transform_type: TransformType,
    config: &ModelConfig,
    hidden: &[f64],
    routing_probs: &[f64],
    opts: &ReasoningOptions,
) -> EngineResult<Vector> {
    match transform_type {
        TransformType::Standard => standard_transform(config, hidden),
        TransformType::Hierarchical => hierarchical_transform(config, hidden, routing_probs),
        TransformType::Superposition => superposition_transform(
            hidden,
            opts.superposition_components,
            opts.collapse_strategy,
        ),
        TransformType::Recursive => recursive_transform(config, hidden, 0, opts.max_recursion),
    }
}
