use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::models::*;
use super::registry::{Category, IssueStatus};

/// Async-safe handle to the civic database.
///
/// Wraps `CivicDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<CivicDb>>,
}

impl DbHandle {
    pub fn new(db: CivicDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&CivicDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct CivicDb {
    conn: Connection,
}

const ISSUE_SELECT: &str = "SELECT i.id, i.title, i.description, i.category, i.status, i.latitude, i.longitude,
        i.address, i.image_url, i.creator_id, i.created_at, i.updated_at, i.version,
        p.full_name, p.email
 FROM issues i LEFT JOIN profiles p ON p.id = i.creator_id";

impl CivicDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS profiles (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    full_name TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'citizen',
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS auth_codes (
                    code_hash TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    used_at TEXT
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    token_hash TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS issues (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    category TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    latitude REAL NOT NULL,
                    longitude REAL NOT NULL,
                    address TEXT NOT NULL,
                    image_url TEXT,
                    creator_id TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    version INTEGER NOT NULL DEFAULT 1
                );

                CREATE TABLE IF NOT EXISTS comments (
                    id TEXT PRIMARY KEY,
                    issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
                    author_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_issues_created ON issues(created_at);
                CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
                CREATE INDEX IF NOT EXISTS idx_issues_creator ON issues(creator_id);
                CREATE INDEX IF NOT EXISTS idx_comments_issue ON comments(issue_id, created_at);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Profiles ──────────────────────────────────────────────────────

    pub fn create_profile(&self, actor: &Actor) -> Result<Actor> {
        self.conn
            .execute(
                "INSERT INTO profiles (id, email, full_name, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    actor.id,
                    actor.email,
                    actor.full_name,
                    actor.role.as_str(),
                    format_timestamp(&now())
                ],
            )
            .with_context(|| format!("Failed to insert profile for {}", actor.email))?;
        self.get_profile(&actor.id)?
            .context("Profile not found after insert")
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<Actor>> {
        self.conn
            .query_row(
                "SELECT id, email, full_name, role FROM profiles WHERE id = ?1",
                params![id],
                actor_from_row,
            )
            .optional()
            .context("Failed to query profile")?
            .map(ActorRow::into_actor)
            .transpose()
    }

    pub fn get_profile_by_email(&self, email: &str) -> Result<Option<Actor>> {
        self.conn
            .query_row(
                "SELECT id, email, full_name, role FROM profiles WHERE email = ?1",
                params![email],
                actor_from_row,
            )
            .optional()
            .context("Failed to query profile by email")?
            .map(ActorRow::into_actor)
            .transpose()
    }

    // ── Auth codes & sessions ─────────────────────────────────────────

    pub fn store_auth_code(&self, code_hash: &str, user_id: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO auth_codes (code_hash, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![code_hash, user_id, format_timestamp(&now())],
            )
            .context("Failed to store auth code")?;
        Ok(())
    }

    /// Mark an unused auth code as used and return its owner.
    /// Returns `None` for unknown or already-consumed codes.
    pub fn consume_auth_code(&self, code_hash: &str) -> Result<Option<String>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let user_id: Option<String> = tx
            .query_row(
                "SELECT user_id FROM auth_codes WHERE code_hash = ?1 AND used_at IS NULL",
                params![code_hash],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query auth code")?;
        if user_id.is_some() {
            tx.execute(
                "UPDATE auth_codes SET used_at = ?1 WHERE code_hash = ?2",
                params![format_timestamp(&now()), code_hash],
            )
            .context("Failed to mark auth code used")?;
        }
        tx.commit().context("Failed to commit auth code exchange")?;
        Ok(user_id)
    }

    pub fn create_session(&self, token_hash: &str, user_id: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sessions (token_hash, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![token_hash, user_id, format_timestamp(&now())],
            )
            .context("Failed to create session")?;
        Ok(())
    }

    pub fn actor_for_session(&self, token_hash: &str) -> Result<Option<Actor>> {
        self.conn
            .query_row(
                "SELECT p.id, p.email, p.full_name, p.role
                 FROM sessions s JOIN profiles p ON p.id = s.user_id
                 WHERE s.token_hash = ?1",
                params![token_hash],
                actor_from_row,
            )
            .optional()
            .context("Failed to query session")?
            .map(ActorRow::into_actor)
            .transpose()
    }

    // ── Issue CRUD ────────────────────────────────────────────────────

    pub fn insert_issue(&self, issue: &Issue) -> Result<Issue> {
        self.conn
            .execute(
                "INSERT INTO issues (id, title, description, category, status, latitude, longitude, address, image_url, creator_id, created_at, updated_at, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    issue.id,
                    issue.title,
                    issue.description,
                    issue.category.as_str(),
                    issue.status.as_str(),
                    issue.latitude,
                    issue.longitude,
                    issue.address,
                    issue.image_url,
                    issue.creator_id,
                    format_timestamp(&issue.created_at),
                    format_timestamp(&issue.updated_at),
                    issue.version,
                ],
            )
            .context("Failed to insert issue")?;
        self.get_issue(&issue.id)?
            .context("Issue not found after insert")
    }

    pub fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        Ok(self.get_issue_with_reporter(id)?.map(|r| r.issue))
    }

    pub fn get_issue_with_reporter(&self, id: &str) -> Result<Option<IssueWithReporter>> {
        let sql = format!("{} WHERE i.id = ?1", ISSUE_SELECT);
        self.conn
            .query_row(&sql, params![id], issue_from_row)
            .optional()
            .context("Failed to query issue")?
            .map(IssueRow::into_issue_with_reporter)
            .transpose()
    }

    /// List issues matching the status/category/reporter filter, newest first.
    /// Proximity is not evaluated here.
    pub fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueWithReporter>> {
        let sql = format!(
            "{} WHERE (?1 IS NULL OR i.status = ?1)
                 AND (?2 IS NULL OR i.category = ?2)
                 AND (?3 IS NULL OR i.creator_id = ?3)
             ORDER BY i.created_at DESC, i.rowid DESC",
            ISSUE_SELECT
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_issues")?;
        let rows = stmt
            .query_map(
                params![
                    filter.status.map(|s| s.as_str()),
                    filter.category.map(|c| c.as_str()),
                    filter.reporter.as_deref(),
                ],
                issue_from_row,
            )
            .context("Failed to query issues")?;
        let mut issues = Vec::new();
        for row in rows {
            let r = row.context("Failed to read issue row")?;
            issues.push(r.into_issue_with_reporter()?);
        }
        Ok(issues)
    }

    /// Apply a status/description change as a single conditional statement.
    pub fn update_issue(&self, id: &str, changes: &IssueChanges) -> Result<UpdateOutcome> {
        let count = self
            .conn
            .execute(
                "UPDATE issues
                 SET status = ?1,
                     description = COALESCE(?2, description),
                     updated_at = ?3,
                     version = version + 1
                 WHERE id = ?4 AND (?5 IS NULL OR version = ?5)",
                params![
                    changes.status.as_str(),
                    changes.description,
                    format_timestamp(&changes.updated_at),
                    id,
                    changes.expected_version,
                ],
            )
            .context("Failed to update issue")?;
        if count > 0 {
            let issue = self
                .get_issue(id)?
                .context("Issue not found after update")?;
            return Ok(UpdateOutcome::Updated(issue));
        }
        match self.get_issue(id)? {
            Some(issue) => Ok(UpdateOutcome::VersionMismatch {
                actual: issue.version,
            }),
            None => Ok(UpdateOutcome::Missing),
        }
    }

    pub fn delete_issue(&self, id: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM issues WHERE id = ?1", params![id])
            .context("Failed to delete issue")?;
        Ok(count > 0)
    }

    pub fn issue_stats(&self) -> Result<IssueStats> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'pending'), 0),
                        COALESCE(SUM(status = 'in_progress'), 0),
                        COALESCE(SUM(status = 'resolved'), 0)
                 FROM issues",
                [],
                |row| {
                    Ok(IssueStats {
                        total: row.get(0)?,
                        pending: row.get(1)?,
                        in_progress: row.get(2)?,
                        resolved: row.get(3)?,
                    })
                },
            )
            .context("Failed to compute issue stats")
    }

    // ── Comments ──────────────────────────────────────────────────────

    /// Insert a comment if its issue still exists. `None` when the issue is gone.
    pub fn insert_comment(&self, comment: &Comment) -> Result<Option<CommentWithAuthor>> {
        let inserted = self
            .conn
            .execute(
                "INSERT INTO comments (id, issue_id, author_id, content, created_at)
                 SELECT ?1, ?2, ?3, ?4, ?5
                 WHERE EXISTS (SELECT 1 FROM issues WHERE id = ?2)",
                params![
                    comment.id,
                    comment.issue_id,
                    comment.author_id,
                    comment.content,
                    format_timestamp(&comment.created_at),
                ],
            )
            .context("Failed to insert comment")?;
        if inserted == 0 {
            return Ok(None);
        }
        self.get_comment(&comment.id)?
            .context("Comment not found after insert")
            .map(Some)
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentWithAuthor>> {
        self.conn
            .query_row(
                "SELECT c.id, c.issue_id, c.author_id, c.content, c.created_at, p.full_name
                 FROM comments c LEFT JOIN profiles p ON p.id = c.author_id
                 WHERE c.id = ?1",
                params![id],
                comment_from_row,
            )
            .optional()
            .context("Failed to query comment")?
            .map(CommentRow::into_comment)
            .transpose()
    }

    /// Comments on an issue, oldest first.
    pub fn list_comments(&self, issue_id: &str) -> Result<Vec<CommentWithAuthor>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT c.id, c.issue_id, c.author_id, c.content, c.created_at, p.full_name
                 FROM comments c LEFT JOIN profiles p ON p.id = c.author_id
                 WHERE c.issue_id = ?1
                 ORDER BY c.created_at ASC, c.rowid ASC",
            )
            .context("Failed to prepare list_comments")?;
        let rows = stmt
            .query_map(params![issue_id], comment_from_row)
            .context("Failed to query comments")?;
        let mut comments = Vec::new();
        for row in rows {
            let r = row.context("Failed to read comment row")?;
            comments.push(r.into_comment()?);
        }
        Ok(comments)
    }
}

// ── Row types ─────────────────────────────────────────────────────────

struct ActorRow {
    id: String,
    email: String,
    full_name: String,
    role: String,
}

fn actor_from_row(row: &Row<'_>) -> rusqlite::Result<ActorRow> {
    Ok(ActorRow {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        role: row.get(3)?,
    })
}

impl ActorRow {
    fn into_actor(self) -> Result<Actor> {
        Ok(Actor {
            role: Role::from_str(&self.role).map_err(|e| anyhow::anyhow!(e))?,
            id: self.id,
            email: self.email,
            full_name: self.full_name,
        })
    }
}

struct IssueRow {
    id: String,
    title: String,
    description: String,
    category: String,
    status: String,
    latitude: f64,
    longitude: f64,
    address: String,
    image_url: Option<String>,
    creator_id: String,
    created_at: String,
    updated_at: String,
    version: i64,
    reporter_name: Option<String>,
    reporter_email: Option<String>,
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<IssueRow> {
    Ok(IssueRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        status: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        address: row.get(7)?,
        image_url: row.get(8)?,
        creator_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        version: row.get(12)?,
        reporter_name: row.get(13)?,
        reporter_email: row.get(14)?,
    })
}

impl IssueRow {
    fn into_issue_with_reporter(self) -> Result<IssueWithReporter> {
        let reporter = match (self.reporter_name, self.reporter_email) {
            (Some(full_name), Some(email)) => Some(Profile { full_name, email }),
            _ => None,
        };
        let issue = Issue {
            category: Category::from_str(&self.category).map_err(|e| anyhow::anyhow!(e))?,
            status: IssueStatus::from_str(&self.status).map_err(|e| anyhow::anyhow!(e))?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            title: self.title,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address,
            image_url: self.image_url,
            creator_id: self.creator_id,
            version: self.version,
        };
        Ok(IssueWithReporter { issue, reporter })
    }
}

struct CommentRow {
    id: String,
    issue_id: String,
    author_id: String,
    content: String,
    created_at: String,
    author_name: Option<String>,
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        issue_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        author_name: row.get(5)?,
    })
}

impl CommentRow {
    fn into_comment(self) -> Result<CommentWithAuthor> {
        Ok(CommentWithAuthor {
            comment: Comment {
                created_at: parse_timestamp(&self.created_at)?,
                id: self.id,
                issue_id: self.issue_id,
                author_id: self.author_id,
                content: self.content,
            },
            author_name: self.author_name,
        })
    }
}
