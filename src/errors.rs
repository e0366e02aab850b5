//! Typed error hierarchy for the civic issue service.
//!
//! `CivicError` is the single taxonomy every core operation returns. Storage
//! and identity-provider failures arrive as `anyhow::Error` and are folded
//! into `CivicError::Upstream`.

use thiserror::Error;

/// Errors surfaced by the issue lifecycle, authorization policy and comment
/// subsystem.
#[derive(Debug, Error)]
pub enum CivicError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Actor {actor_id} is not allowed to {action} issue {issue_id}")]
    Forbidden {
        actor_id: String,
        issue_id: String,
        action: &'static str,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid status '{0}'. Valid values: pending, in_progress, resolved")]
    InvalidStatus(String),

    #[error("Issue {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        id: String,
        expected: i64,
        actual: i64,
    },

    #[error("Upstream failure: {0}")]
    Upstream(#[from] anyhow::Error),
}

impl CivicError {
    pub fn issue_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Issue",
            id: id.into(),
        }
    }

    /// Stable snake_case name of the variant, carried in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::InvalidStatus(_) => "invalid_status",
            Self::Conflict { .. } => "conflict",
            Self::Upstream(_) => "upstream_failure",
        }
    }
}

pub type CivicResult<T> = Result<T, CivicError>;
