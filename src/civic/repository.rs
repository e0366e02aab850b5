//! Persistence contract for issues and comments.
//!
//! The repository stores rows and answers queries; it enforces no business
//! rules. Authorization and lifecycle checks live in `policy` and
//! `lifecycle`. `DbHandle` is the SQLite-backed implementation.

use anyhow::Result;
use async_trait::async_trait;

use super::db::DbHandle;
use super::models::*;

/// Abstraction over issue/comment storage for testability.
/// Real implementation: `DbHandle`.
#[async_trait]
pub trait IssueRepository: Send + Sync {
    async fn insert_issue(&self, issue: Issue) -> Result<Issue>;

    async fn find_issue(&self, id: &str) -> Result<Option<IssueWithReporter>>;

    /// Status/category/reporter filtered listing, newest first.
    async fn list_issues(&self, filter: IssueFilter) -> Result<Vec<IssueWithReporter>>;

    async fn update_issue(&self, id: &str, changes: IssueChanges) -> Result<UpdateOutcome>;

    /// Returns `false` when no row matched.
    async fn delete_issue(&self, id: &str) -> Result<bool>;

    /// `None` when the issue no longer exists at insert time.
    async fn insert_comment(&self, comment: Comment) -> Result<Option<CommentWithAuthor>>;

    /// Comments on an issue, oldest first.
    async fn list_comments(&self, issue_id: &str) -> Result<Vec<CommentWithAuthor>>;

    async fn issue_stats(&self) -> Result<IssueStats>;
}

#[async_trait]
impl IssueRepository for DbHandle {
    async fn insert_issue(&self, issue: Issue) -> Result<Issue> {
        self.call(move |db| db.insert_issue(&issue)).await
    }

    async fn find_issue(&self, id: &str) -> Result<Option<IssueWithReporter>> {
        let id = id.to_string();
        self.call(move |db| db.get_issue_with_reporter(&id)).await
    }

    async fn list_issues(&self, filter: IssueFilter) -> Result<Vec<IssueWithReporter>> {
        self.call(move |db| db.list_issues(&filter)).await
    }

    async fn update_issue(&self, id: &str, changes: IssueChanges) -> Result<UpdateOutcome> {
        let id = id.to_string();
        self.call(move |db| db.update_issue(&id, &changes)).await
    }

    async fn delete_issue(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.call(move |db| db.delete_issue(&id)).await
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Option<CommentWithAuthor>> {
        self.call(move |db| db.insert_comment(&comment)).await
    }

    async fn list_comments(&self, issue_id: &str) -> Result<Vec<CommentWithAuthor>> {
        let issue_id = issue_id.to_string();
        self.call(move |db| db.list_comments(&issue_id)).await
    }

    async fn issue_stats(&self) -> Result<IssueStats> {
        self.call(|db| db.issue_stats()).await
    }
}
