//! Identity provider boundary.
//!
//! The service only needs two things from an identity provider: resolve an
//! opaque session token to the current actor, and exchange a one-time auth
//! code for a new session. `LocalIdentity` implements both against the
//! `profiles`, `auth_codes` and `sessions` tables. Tokens and codes are only
//! ever stored as SHA-256 digests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use super::db::DbHandle;
use super::models::{Actor, Role};

/// Session token handed to a client after a successful code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionToken(pub String);

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session token. Unknown tokens resolve to `None`, which the
    /// core treats as the unauthenticated state rather than an error.
    async fn current_actor(&self, token: &str) -> Result<Option<Actor>>;

    /// Exchange a one-time auth code for a session. `None` if the code is
    /// unknown or was already used.
    async fn exchange_code(&self, code: &str) -> Result<Option<SessionToken>>;
}

pub fn digest(secret: &str) -> String {
    format!("{:x}", Sha256::digest(secret.as_bytes()))
}

fn new_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[derive(Clone)]
pub struct LocalIdentity {
    db: DbHandle,
}

impl LocalIdentity {
    pub fn new(db: DbHandle) -> Self {
        Self { db }
    }

    /// Register a new actor profile.
    pub async fn register(&self, email: &str, full_name: &str, role: Role) -> Result<Actor> {
        let actor = Actor {
            id: Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            full_name: full_name.trim().to_string(),
            role,
        };
        if actor.email.is_empty() || actor.full_name.is_empty() {
            anyhow::bail!("email and name must not be empty");
        }
        let created = self.db.call(move |db| db.create_profile(&actor)).await?;
        info!(actor = %created.id, role = created.role.as_str(), "actor registered");
        Ok(created)
    }

    /// Issue a one-time auth code for an existing actor.
    pub async fn issue_auth_code(&self, actor_id: &str) -> Result<String> {
        let code = new_secret();
        let code_hash = digest(&code);
        let actor_id = actor_id.to_string();
        self.db
            .call(move |db| {
                db.get_profile(&actor_id)?
                    .with_context(|| format!("Actor {} not found", actor_id))?;
                db.store_auth_code(&code_hash, &actor_id)
            })
            .await?;
        Ok(code)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_actor(&self, token: &str) -> Result<Option<Actor>> {
        let token_hash = digest(token);
        self.db
            .call(move |db| db.actor_for_session(&token_hash))
            .await
    }

    async fn exchange_code(&self, code: &str) -> Result<Option<SessionToken>> {
        let code_hash = digest(code);
        let token = new_secret();
        let token_hash = digest(&token);
        let user_id = self
            .db
            .call(move |db| {
                let Some(user_id) = db.consume_auth_code(&code_hash)? else {
                    return Ok(None);
                };
                db.create_session(&token_hash, &user_id)?;
                Ok(Some(user_id))
            })
            .await?;
        match user_id {
            Some(user_id) => {
                info!(actor = %user_id, "session created from auth code");
                Ok(Some(SessionToken(token)))
            }
            None => {
                debug!("auth code exchange rejected");
                Ok(None)
            }
        }
    }
}
