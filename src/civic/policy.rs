//! Authorization policy for issue operations.
//!
//! Reads are public. Commenting needs any authenticated actor. Updating and
//! deleting are reserved to the issue's creator; the actor's role is never
//! consulted. Checks run in a fixed order: authentication, existence,
//! ownership.

use tracing::warn;

use super::models::{Actor, Issue, IssueWithReporter};
use super::repository::IssueRepository;
use crate::errors::{CivicError, CivicResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Comment,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Comment => "comment on",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn requires_actor(&self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// Fail with `Unauthenticated` when no actor is present.
pub fn require_actor(actor: Option<&Actor>) -> CivicResult<&Actor> {
    actor.ok_or(CivicError::Unauthenticated)
}

pub fn can_read(_actor: Option<&Actor>, _issue: &Issue) -> bool {
    true
}

pub fn can_create_comment(actor: Option<&Actor>, _issue: &Issue) -> bool {
    actor.is_some()
}

pub fn can_update(actor: Option<&Actor>, issue: &Issue) -> bool {
    actor.is_some_and(|a| a.id == issue.creator_id)
}

pub fn can_delete(actor: Option<&Actor>, issue: &Issue) -> bool {
    actor.is_some_and(|a| a.id == issue.creator_id)
}

/// Decide `operation` for an already-loaded issue.
pub fn authorize(actor: Option<&Actor>, issue: &Issue, operation: Operation) -> CivicResult<()> {
    if operation.requires_actor() && actor.is_none() {
        return Err(CivicError::Unauthenticated);
    }
    let allowed = match operation {
        Operation::Read => can_read(actor, issue),
        Operation::Comment => can_create_comment(actor, issue),
        Operation::Update => can_update(actor, issue),
        Operation::Delete => can_delete(actor, issue),
    };
    if allowed {
        return Ok(());
    }
    let actor_id = actor.map(|a| a.id.clone()).unwrap_or_default();
    warn!(
        actor = %actor_id,
        issue = %issue.id,
        operation = operation.as_str(),
        "authorization denied"
    );
    Err(CivicError::Forbidden {
        actor_id,
        issue_id: issue.id.clone(),
        action: operation.as_str(),
    })
}

/// Load the current stored issue and decide `operation` against it.
///
/// Ownership always comes from the store at decision time, never from the
/// request payload.
pub async fn authorize_issue(
    repo: &dyn IssueRepository,
    actor: Option<&Actor>,
    issue_id: &str,
    operation: Operation,
) -> CivicResult<IssueWithReporter> {
    if operation.requires_actor() {
        require_actor(actor)?;
    }
    let found = repo
        .find_issue(issue_id)
        .await?
        .ok_or_else(|| CivicError::issue_not_found(issue_id))?;
    authorize(actor, &found.issue, operation)?;
    Ok(found)
}
