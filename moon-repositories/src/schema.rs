//! Creates the four fixed system tables on startup if they're absent. These
//! are never exposed through the dynamic collection APIs and are invisible
//! to the schema registry: code here talks to `moon-storage` directly.

use std::time::Duration;

use moon_dialect::{CompiledStatement, Dialect, SemanticType};
use moon_storage::Pool;

use crate::error::RepositoryError;

pub const USERS_TABLE: &str = "moon_users";
pub const APIKEYS_TABLE: &str = "moon_apikeys";
pub const REFRESH_TOKENS_TABLE: &str = "moon_refresh_tokens";
pub const BLACKLIST_TABLE: &str = "moon_blacklisted_tokens";

pub async fn ensure_system_tables(pool: &Pool, dialect: &dyn Dialect, deadline: Duration) -> Result<(), RepositoryError> {
    for stmt in create_statements(dialect) {
        moon_storage::execute(pool, stmt, deadline, Duration::from_secs(3600)).await?;
    }
    Ok(())
}

fn create_statements(dialect: &dyn Dialect) -> Vec<CompiledStatement> {
    let backend = dialect.backend();
    let text = SemanticType::String.sql_type(backend, 0);
    let timestamp = SemanticType::Datetime.sql_type(backend, 0);
    let boolean = SemanticType::Boolean.sql_type(backend, 0);
    let q = |ident: &str| dialect.quote_ident(ident);

    vec![
        CompiledStatement::new(
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({} {} PRIMARY KEY, {} {} NOT NULL UNIQUE, {} {} UNIQUE, {} {} NOT NULL, {} {} NOT NULL, {} {} NOT NULL, {} {} NOT NULL, {} {}, {} {})",
                q(USERS_TABLE),
                q("id"), text,
                q("username"), text,
                q("email"), text,
                q("password_hash"), text,
                q("role"), text,
                q("can_write"), boolean,
                q("created_at"), timestamp,
                q("updated_at"), timestamp,
                q("last_login_at"), timestamp,
            ),
            vec![],
        ),
        CompiledStatement::new(
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({} {} PRIMARY KEY, {} {} NOT NULL, {} {}, {} {} NOT NULL UNIQUE, {} {} NOT NULL, {} {} NOT NULL, {} {} NOT NULL, {} {} NOT NULL, {} {}, {} {})",
                q(APIKEYS_TABLE),
                q("id"), text,
                q("name"), text,
                q("description"), text,
                q("key_hash"), text,
                q("key_prefix"), text,
                q("role"), text,
                q("can_write"), boolean,
                q("created_at"), timestamp,
                q("last_used_at"), timestamp,
                q("revoked_at"), timestamp,
            ),
            vec![],
        ),
        CompiledStatement::new(
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({} {} PRIMARY KEY, {} {} NOT NULL UNIQUE, {} {} NOT NULL, {} {} NOT NULL, {} {}, {} {})",
                q(REFRESH_TOKENS_TABLE),
                q("id"), text,
                q("token_hash"), text,
                q("user_id"), text,
                q("expires_at"), timestamp,
                q("revoked_at"), timestamp,
                q("replaced_by"), text,
            ),
            vec![],
        ),
        CompiledStatement::new(
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({} {} PRIMARY KEY, {} {} NOT NULL, {} {} NOT NULL)",
                q(BLACKLIST_TABLE),
                q("jti"), text,
                q("expires_at"), timestamp,
                q("created_at"), timestamp,
            ),
            vec![],
        ),
    ]
}
