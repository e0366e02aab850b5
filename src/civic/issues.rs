//! Issue submission, deletion and public queries.

use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::geo::{Coordinates, Proximity};
use super::models::*;
use super::policy::{Operation, authorize_issue, require_actor};
use super::registry::{Category, IssueStatus};
use super::repository::IssueRepository;
use crate::errors::{CivicError, CivicResult};

/// Listing query parameters, all optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub reporter: Option<String>,
    pub near_lat: Option<f64>,
    pub near_lng: Option<f64>,
    pub radius_km: Option<f64>,
}

impl IssueQuery {
    /// Resolve string parameters into a typed filter. Unknown enum values
    /// are rejected rather than matching nothing.
    pub fn into_filter(self) -> CivicResult<IssueFilter> {
        let status = self
            .status
            .filter(|s| !s.is_empty())
            .map(|s| IssueStatus::from_str(&s).map_err(CivicError::Validation))
            .transpose()?;
        let category = self
            .category
            .filter(|c| !c.is_empty())
            .map(|c| Category::from_str(&c).map_err(CivicError::Validation))
            .transpose()?;
        let near = match (self.near_lat, self.near_lng, self.radius_km) {
            (None, None, None) => None,
            (Some(lat), Some(lng), Some(radius)) => Some(
                Proximity::new(Coordinates::new(lat, lng), radius)
                    .map_err(CivicError::Validation)?,
            ),
            _ => {
                return Err(CivicError::Validation(
                    "near_lat, near_lng and radius_km must be given together".into(),
                ));
            }
        };
        Ok(IssueFilter {
            status,
            category,
            reporter: self.reporter.filter(|r| !r.is_empty()),
            near,
        })
    }
}

fn required(field: &str, value: &str) -> CivicResult<()> {
    if value.trim().is_empty() {
        return Err(CivicError::Validation(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

/// Validate a submission and build the initial `pending` record for `creator_id`.
pub fn validate_submission(submission: IssueSubmission, creator_id: &str) -> CivicResult<Issue> {
    required("title", &submission.title)?;
    required("description", &submission.description)?;
    required("address", &submission.address)?;
    let category = Category::from_str(&submission.category).map_err(CivicError::Validation)?;
    Coordinates::new(submission.latitude, submission.longitude)
        .validate()
        .map_err(CivicError::Validation)?;

    let created_at = now();
    Ok(Issue {
        id: Uuid::new_v4().to_string(),
        title: submission.title,
        description: submission.description,
        category,
        status: IssueStatus::Pending,
        latitude: submission.latitude,
        longitude: submission.longitude,
        address: submission.address,
        image_url: submission.image_url.filter(|u| !u.trim().is_empty()),
        creator_id: creator_id.to_string(),
        created_at,
        updated_at: created_at,
        version: 1,
    })
}

pub async fn create_issue(
    repo: &dyn IssueRepository,
    actor: Option<&Actor>,
    submission: IssueSubmission,
) -> CivicResult<Issue> {
    let creator = require_actor(actor)?;
    let issue = validate_submission(submission, &creator.id)?;
    let stored = repo.insert_issue(issue).await?;
    info!(
        issue = %stored.id,
        creator = %stored.creator_id,
        category = stored.category.as_str(),
        "issue created"
    );
    Ok(stored)
}

/// Public listing, newest first.
pub async fn list_issues(
    repo: &dyn IssueRepository,
    filter: IssueFilter,
) -> CivicResult<Vec<IssueWithReporter>> {
    let near = filter.near;
    let mut issues = repo.list_issues(filter).await?;
    if let Some(area) = near {
        issues.retain(|i| area.contains(&i.issue.coordinates()));
    }
    debug!(count = issues.len(), "issues listed");
    Ok(issues)
}

/// Issue with reporter and comments (oldest first).
pub async fn get_issue(repo: &dyn IssueRepository, id: &str) -> CivicResult<IssueDetail> {
    let found = authorize_issue(repo, None, id, Operation::Read).await?;
    let comments = repo.list_comments(id).await?;
    Ok(IssueDetail {
        issue: found.issue,
        reporter: found.reporter,
        comments,
    })
}

/// Permanently delete an issue on behalf of its owner. Its comments go with it.
pub async fn delete_issue(
    repo: &dyn IssueRepository,
    actor: Option<&Actor>,
    id: &str,
) -> CivicResult<()> {
    authorize_issue(repo, actor, id, Operation::Delete).await?;
    if !repo.delete_issue(id).await? {
        return Err(CivicError::issue_not_found(id));
    }
    info!(issue = %id, "issue deleted");
    Ok(())
}

pub async fn issue_stats(repo: &dyn IssueRepository) -> CivicResult<IssueStats> {
    Ok(repo.issue_stats().await?)
}
