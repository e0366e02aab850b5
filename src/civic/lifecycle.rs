//! Issue status lifecycle.
//!
//! `pending` is the initial state. The owner may move an issue to any of
//! the three statuses in any order, including its current one; there is no
//! transition graph and no status history. Values outside the closed set
//! fail with `InvalidStatus`.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::models::{Actor, Issue, IssueChanges, UpdateOutcome, now};
use super::policy::{Operation, authorize_issue};
use super::registry::IssueStatus;
use super::repository::IssueRepository;
use crate::errors::{CivicError, CivicResult};

/// Requested status change, as received from a client. `status` stays
/// untyped until the caller has been authorized against the stored issue.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    /// Optimistic-concurrency guard; omitted means last write wins.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl TransitionRequest {
    pub fn to_status(status: IssueStatus) -> Self {
        Self {
            status: Some(Value::from(status.as_str())),
            description: None,
            expected_version: None,
        }
    }
}

pub fn parse_status(value: &str) -> CivicResult<IssueStatus> {
    IssueStatus::from_str(value).map_err(|_| CivicError::InvalidStatus(value.to_string()))
}

fn requested_status(status: Option<&Value>) -> CivicResult<IssueStatus> {
    match status {
        Some(Value::String(s)) => parse_status(s),
        Some(other) => Err(CivicError::InvalidStatus(other.to_string())),
        None => Err(CivicError::InvalidStatus("missing status".into())),
    }
}

/// Set an issue's status (and optionally its description) on behalf of its
/// owner. Refreshes `updated_at` even when the status does not change.
pub async fn transition(
    repo: &dyn IssueRepository,
    actor: Option<&Actor>,
    issue_id: &str,
    request: TransitionRequest,
) -> CivicResult<Issue> {
    let current = authorize_issue(repo, actor, issue_id, Operation::Update).await?;
    let status = requested_status(request.status.as_ref())?;

    let description = match request.description {
        Some(d) if d.trim().is_empty() => {
            return Err(CivicError::Validation(
                "description must not be empty".into(),
            ));
        }
        other => other,
    };

    let changes = IssueChanges {
        status,
        description,
        updated_at: now(),
        expected_version: request.expected_version,
    };
    match repo.update_issue(issue_id, changes).await? {
        UpdateOutcome::Updated(issue) => {
            info!(
                issue = %issue.id,
                from = current.issue.status.as_str(),
                to = issue.status.as_str(),
                version = issue.version,
                "issue status updated"
            );
            Ok(issue)
        }
        // Deleted between the ownership check and the update.
        UpdateOutcome::Missing => Err(CivicError::issue_not_found(issue_id)),
        UpdateOutcome::VersionMismatch { actual } => Err(CivicError::Conflict {
            id: issue_id.to_string(),
            expected: request.expected_version.unwrap_or(actual),
            actual,
        }),
    }
}
