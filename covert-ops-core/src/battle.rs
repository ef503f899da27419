//! Hand-off records exchanged with the external tactical battle subsystem.
use serde::{Deserialize, Serialize};

/// Posted when an operation resolves into a tactical deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRequest {
    pub base: String,
    pub operation: u32,
    pub operation_name: String,
    pub deployment: String,
    /// Soldiers the battle should field.
    pub soldiers: Vec<u32>,
}

/// Posted back by the battle subsystem once the battle ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    pub operation: u32,
    pub success: bool,
}

/// Rejections when a battle report cannot be matched to an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BattleError {
    #[error("no covert operation #{0} is waiting for a battle")]
    NotAwaitingBattle(u32),
    #[error("covert operation #{0} does not exist")]
    UnknownOperation(u32),
}
