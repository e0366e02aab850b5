use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::geo::{Coordinates, Proximity};
use super::registry::{Category, IssueStatus};

/// Current time truncated to the precision the store keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 rendering; lexicographic order equals time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| anyhow::anyhow!("Invalid timestamp '{}': {}", s, e))?
        .with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Citizen,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "citizen" => Ok(Self::Citizen),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// An authenticated identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

/// Public display information about an issue's reporter or a comment's author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: IssueStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub image_url: Option<String>,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Issue {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Issue joined with its reporter's profile, as returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueWithReporter {
    #[serde(flatten)]
    pub issue: Issue,
    pub reporter: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub issue_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_name: Option<String>,
}

/// Full issue view: record, reporter, and comments oldest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueDetail {
    #[serde(flatten)]
    pub issue: Issue,
    pub reporter: Option<Profile>,
    pub comments: Vec<CommentWithAuthor>,
}

/// Raw issue submission as received from a client, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueSubmission {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Status/description change applied by the repository in one statement.
#[derive(Debug, Clone)]
pub struct IssueChanges {
    pub status: IssueStatus,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// When set, the update only applies if the stored version matches.
    pub expected_version: Option<i64>,
}

/// Outcome of a conditional update.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Updated(Issue),
    Missing,
    VersionMismatch { actual: i64 },
}

#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<IssueStatus>,
    pub category: Option<Category>,
    pub reporter: Option<String>,
    pub near: Option<Proximity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueStats {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub resolved: i64,
}
