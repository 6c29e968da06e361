use crate::error::{invalid_config, EngineResult};
use serde::{Deserialize, Serialize};

/// Deepest meta-reasoning level a `RecursiveStructure` will hold.
pub const MAX_RECURSIVE_DEPTH: usize = 5;
/// Largest node count `RecursiveStructure::build` accepts, root included.
pub const MAX_RECURSIVE_NODES: usize = 1 << 16;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningTask {
    BaseReasoning,
    MetaReasoning,
    MetaMetaReasoning,
    SystemReasoning,
    TranscendentReasoning,
    UltimateReasoning,
}

impl ReasoningTask {
    pub fn for_depth(depth: usize) -> Self {
        match depth {
            0 => ReasoningTask::BaseReasoning,
            1 => ReasoningTask::MetaReasoning,
            2 => ReasoningTask::MetaMetaReasoning,
            3 => ReasoningTask::SystemReasoning,
            4 => ReasoningTask::TranscendentReasoning,
            _ => ReasoningTask::UltimateReasoning,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct MetaLevel {
    pub abstraction_level: f64,
    pub recursive_power: u32,
    pub complexity_tolerance: f64,
}

impl MetaLevel {
    pub fn for_depth(depth: usize) -> Self {
        Self {
            abstraction_level: depth as f64 / MAX_RECURSIVE_DEPTH as f64,
            recursive_power: 1u32 << depth.min(MAX_RECURSIVE_DEPTH),
            complexity_tolerance: 1.0 + depth as f64 * 0.5,
        }
    }
}

/// Deeper nodes get a smaller budget.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct TerminationConditions {
    pub max_iterations: usize,
    pub resource_limit: usize,
}

impl TerminationConditions {
    pub fn for_depth(depth: usize) -> Self {
        Self {
            max_iterations: 20usize.saturating_sub(depth * 3).max(5),
            resource_limit: 1000usize.saturating_sub(depth * 150).max(100),
        }
    }
}

/// Nodes in a full tree of `max_depth` (capped) levels below the root, or `None`
/// on overflow.
pub fn recursive_node_count(max_depth: usize, branching_factor: usize) -> Option<usize> {
    let mut total = 1usize;
    let mut width = 1usize;
    for _ in 0..max_depth.min(MAX_RECURSIVE_DEPTH) {
        width = width.checked_mul(branching_factor)?;
        if width == 0 {
            break;
        }
        total = total.checked_add(width)?;
    }
    Some(total)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecursiveNode {
    pub id: usize,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub specialized_task: ReasoningTask,
    pub meta_level: MetaLevel,
    pub termination: TerminationConditions,
}

/// Arena of meta-reasoning nodes. Node ids are indices into `nodes`, parents
/// always precede their children.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecursiveStructure {
    pub nodes: Vec<RecursiveNode>,
    pub by_depth: [Vec<usize>; MAX_RECURSIVE_DEPTH + 1],
}

impl RecursiveStructure {
    /// `max_depth` is capped at `MAX_RECURSIVE_DEPTH`. Each node below the cap
    /// gets `branching_factor` children. Trees over `MAX_RECURSIVE_NODES` nodes
    /// are rejected.
    pub fn build(max_depth: usize, branching_factor: usize) -> EngineResult<Self> {
        let max_depth = max_depth.min(MAX_RECURSIVE_DEPTH);
        match recursive_node_count(max_depth, branching_factor) {
            Some(count) if count <= MAX_RECURSIVE_NODES => {}
            _ => {
                return Err(invalid_config(format!(
                    "recursive structure of depth {} with branching factor {} exceeds {} nodes",
                    max_depth, branching_factor, MAX_RECURSIVE_NODES
                )))
            }
        }
        let mut structure = Self {
            nodes: Vec::new(),
            by_depth: Default::default(),
        };
        let root = structure.push(0, None);
        let mut frontier = vec![root];
        for depth in 1..=max_depth {
            let mut next = Vec::with_capacity(frontier.len() * branching_factor);
            for &parent in &frontier {
                for _ in 0..branching_factor {
                    next.push(structure.push(depth, Some(parent)));
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        log::debug!(
            "Built recursive structure with {} nodes over {} levels",
            structure.nodes.len(),
            structure.depth() + 1
        );
        Ok(structure)
    }

    fn push(&mut self, depth: usize, parent: Option<usize>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(RecursiveNode {
            id,
            depth,
            parent,
            children: Vec::new(),
            specialized_task: ReasoningTask::for_depth(depth),
            meta_level: MetaLevel::for_depth(depth),
            termination: TerminationConditions::for_depth(depth),
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        self.by_depth[depth].push(id);
        id
    }

    pub fn root(&self) -> Option<&RecursiveNode> {
        self.nodes.first()
    }

    pub fn get(&self, id: usize) -> Option<&RecursiveNode> {
        self.nodes.get(id)
    }

    pub fn at_depth(&self, depth: usize) -> &[usize] {
        self.by_depth.get(depth).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Deepest populated level.
    pub fn depth(&self) -> usize {
        self.by_depth
            .iter()
            .rposition(|ids| !ids.is_empty())
            .unwrap_or(0)
    }

    /// Ids from `id` up to the root, inclusive.
    pub fn ancestry(&self, id: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut cursor = self.nodes.get(id).map(|n| n.id);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.nodes[current].parent;
        }
        path
    }
}
