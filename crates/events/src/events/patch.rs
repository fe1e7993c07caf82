use serde::{Deserialize, Serialize};

/// Patch plan execution events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PatchEvent {
    /// Plan built and about to execute
    PlanReady {
        operations: usize,
        categories: Vec<String>,
    },

    OperationStarted {
        index: usize,
        total: usize,
        description: String,
    },

    OperationCompleted {
        index: usize,
        total: usize,
        description: String,
    },

    /// A delete found nothing to remove
    OperationSkipped { description: String, reason: String },

    Completed { operations: usize },
}
