//! Append-only discussion thread attached to an issue.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::models::{Actor, Comment, CommentWithAuthor, now};
use super::policy::{Operation, authorize, require_actor};
use super::repository::IssueRepository;
use crate::errors::{CivicError, CivicResult};

#[derive(Debug, Clone, Deserialize)]
pub struct PostCommentRequest {
    pub issue_id: String,
    pub content: String,
}

/// Append a comment to an existing issue. Any authenticated actor may post.
pub async fn post_comment(
    repo: &dyn IssueRepository,
    actor: Option<&Actor>,
    issue_id: &str,
    content: &str,
) -> CivicResult<CommentWithAuthor> {
    let author = require_actor(actor)?;
    if content.trim().is_empty() {
        return Err(CivicError::Validation(
            "comment content must not be empty".into(),
        ));
    }
    let found = repo
        .find_issue(issue_id)
        .await?
        .ok_or_else(|| CivicError::issue_not_found(issue_id))?;
    authorize(actor, &found.issue, Operation::Comment)?;

    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        issue_id: issue_id.to_string(),
        author_id: author.id.clone(),
        content: content.to_string(),
        created_at: now(),
    };
    let stored = repo
        .insert_comment(comment)
        .await?
        // Deleted between the lookup and the insert.
        .ok_or_else(|| CivicError::issue_not_found(issue_id))?;
    info!(issue = %issue_id, comment = %stored.comment.id, author = %author.id, "comment posted");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civic::db::tests::{actor, sample_issue};
    use crate::civic::registry::IssueStatus;
    use crate::civic::repository::testing::{CountingRepository, StaleLookupRepository};

    async fn seeded() -> CountingRepository {
        let repo = CountingRepository::new();
        repo.inner
            .call(|db| {
                db.create_profile(&actor("owner", "Owner"))?;
                db.create_profile(&actor("neighbour", "Neha"))?;
                Ok(())
            })
            .await
            .unwrap();
        repo.inner
            .insert_issue(sample_issue("i-1", "owner", IssueStatus::Pending))
            .await
            .unwrap();
        repo
    }

    #[tokio::test]
    async fn test_any_actor_can_comment() {
        let repo = seeded().await;
        let neighbour = actor("neighbour", "Neha");
        let posted = post_comment(&repo, Some(&neighbour), "i-1", "Still there today")
            .await
            .unwrap();
        assert_eq!(posted.comment.issue_id, "i-1");
        assert_eq!(posted.comment.author_id, "neighbour");
        assert_eq!(posted.comment.content, "Still there today");
        assert_eq!(posted.author_name.as_deref(), Some("Neha"));
        assert!(!posted.comment.id.is_empty());
    }

    #[tokio::test]
    async fn test_unauthenticated_comment_rejected_before_write() {
        let repo = seeded().await;
        let result = post_comment(&repo, None, "i-1", "hello").await;
        assert!(matches!(result, Err(CivicError::Unauthenticated)));
        assert_eq!(repo.mutations(), 0);
    }

    #[tokio::test]
    async fn test_blank_comment_rejected() {
        let repo = seeded().await;
        let neighbour = actor("neighbour", "Neha");
        for content in ["", "   ", "\n\t"] {
            let result = post_comment(&repo, Some(&neighbour), "i-1", content).await;
            assert!(matches!(result, Err(CivicError::Validation(_))));
        }
        assert_eq!(repo.mutations(), 0);
    }

    #[tokio::test]
    async fn test_comment_on_missing_issue_not_found() {
        let repo = seeded().await;
        let neighbour = actor("neighbour", "Neha");
        let result = post_comment(&repo, Some(&neighbour), "ghost", "hello").await;
        assert!(matches!(result, Err(CivicError::NotFound { .. })));
        assert_eq!(repo.mutations(), 0);
    }

    #[tokio::test]
    async fn test_comments_accumulate_in_order() {
        let repo = seeded().await;
        let owner = actor("owner", "Owner");
        let neighbour = actor("neighbour", "Neha");
        post_comment(&repo, Some(&owner), "i-1", "Reported to ward office")
            .await
            .unwrap();
        post_comment(&repo, Some(&neighbour), "i-1", "Thanks!")
            .await
            .unwrap();
        let thread = repo.inner.list_comments("i-1").await.unwrap();
        let contents: Vec<&str> = thread.iter().map(|c| c.comment.content.as_str()).collect();
        assert_eq!(contents, vec!["Reported to ward office", "Thanks!"]);
    }

    #[tokio::test]
    async fn test_comment_racing_delete_is_not_found() {
        let repo = seeded().await;
        let snapshot = repo.inner.find_issue("i-1").await.unwrap().unwrap();
        assert!(repo.inner.delete_issue("i-1").await.unwrap());
        let stale = StaleLookupRepository {
            inner: repo.inner.clone(),
            snapshot,
        };

        let neighbour = actor("neighbour", "Neha");
        let result = post_comment(&stale, Some(&neighbour), "i-1", "Still there?").await;
        assert!(matches!(result, Err(CivicError::NotFound { .. })));
        assert!(repo.inner.list_comments("i-1").await.unwrap().is_empty());
    }
}
