use serde::{Deserialize, Serialize};

/// Security gate evaluation events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GateEvent {
    EvaluationStarted,

    /// One blocker found. The gate keeps evaluating, so several of these can
    /// precede a single `Blocked`.
    BlockerFound {
        description: String,
        remediation: String,
    },

    Passed,

    Blocked { count: usize },
}
