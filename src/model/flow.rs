//! Closed sets used by flow control: block markers and action types.

use serde::{Deserialize, Serialize};

/// Structural marker delimiting a loop- or replicate-controlled region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowBlock {
    #[default]
    None,
    Start,
    End,
}

impl FlowBlock {
    pub fn is_none(&self) -> bool {
        matches!(self, FlowBlock::None)
    }
}

impl std::fmt::Display for FlowBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowBlock::None => write!(f, "none"),
            FlowBlock::Start => write!(f, "start"),
            FlowBlock::End => write!(f, "end"),
        }
    }
}

/// The control action a flow script performs once its task finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowActionType {
    Continue,
    If,
    Replicate,
    Loop,
}

impl std::fmt::Display for FlowActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowActionType::Continue => write!(f, "continue"),
            FlowActionType::If => write!(f, "if"),
            FlowActionType::Replicate => write!(f, "replicate"),
            FlowActionType::Loop => write!(f, "loop"),
        }
    }
}
