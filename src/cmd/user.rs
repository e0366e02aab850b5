//! Account commands: `civic-watch user`.

use anyhow::{Context, Result};
use std::path::Path;

use civic_watch::civic::db::DbHandle;
use civic_watch::civic::identity::LocalIdentity;
use civic_watch::civic::models::Role;
use civic_watch::civic::server::open_database;

use super::super::UserCommands;

pub async fn cmd_user(db_path: &Path, command: UserCommands) -> Result<()> {
    let db = DbHandle::new(open_database(db_path)?);
    let identity = LocalIdentity::new(db.clone());

    let (actor, code) = match command {
        UserCommands::Add { email, name, role } => {
            let role: Role = role.parse().map_err(anyhow::Error::msg)?;
            let actor = identity.register(&email, &name, role).await?;
            let code = identity.issue_auth_code(&actor.id).await?;
            (actor, code)
        }
        UserCommands::Login { email } => {
            let lookup = email.clone();
            let actor = db
                .call(move |db| db.get_profile_by_email(&lookup))
                .await?
                .with_context(|| format!("No account registered for {}", email))?;
            let code = identity.issue_auth_code(&actor.id).await?;
            (actor, code)
        }
    };

    println!("Account:   {} <{}> ({})", actor.full_name, actor.email, actor.role.as_str());
    println!("Id:        {}", actor.id);
    println!("Auth code: {}", code);
    println!();
    println!("Exchange it once at /api/auth/callback?code={}", code);
    Ok(())
}
