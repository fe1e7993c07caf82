//! Security gate error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GateError {
    #[error("root patching blocked by {count} security check(s)")]
    Blocked { count: usize },
}

impl crate::UserFacingError for GateError {
    fn user_message(&self) -> std::borrow::Cow<'_, str> {
        std::borrow::Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        Some("Remediate every reported blocker, then run rootpatch again.")
    }

    fn user_code(&self) -> Option<&'static str> {
        Some("gate.blocked")
    }
}
