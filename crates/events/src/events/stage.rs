use serde::{Deserialize, Serialize};

/// Workflow stage transitions, rendered by the CLI as progress headers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StageEvent {
    Entered { stage: String },

    Completed { stage: String },
}
