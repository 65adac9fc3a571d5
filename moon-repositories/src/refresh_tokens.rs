//! `moon_refresh_tokens` CRUD and single-use rotation.
//!
//! Rotation needs "find active token, mark it revoked, insert its
//! replacement" to happen as one unit. Backends with row-level locking get
//! that from a `SELECT ... FOR UPDATE` in a transaction; SQLite has none, so
//! rotation here is additionally serialised by a process-wide lock keyed on
//! the token hash, the same per-key `tokio::sync::Mutex` pattern the schema
//! registry uses for per-collection DDL.

use std::{collections::HashMap, sync::Arc, time::Duration};

use moon_dialect::{CompiledStatement, Dialect, RawValue, SemanticType};
use moon_identifier::Id;
use moon_storage::Pool;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::RepositoryError;
use crate::schema::REFRESH_TOKENS_TABLE;

const COLUMNS: [&str; 6] = ["id", "token_hash", "user_id", "expires_at", "revoked_at", "replaced_by"];
const TYPES: [SemanticType; 6] = [
    SemanticType::String,
    SemanticType::String,
    SemanticType::String,
    SemanticType::Datetime,
    SemanticType::Datetime,
    SemanticType::String,
];

#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: String,
    pub token_hash: String,
    pub user_id: String,
    pub expires_at: String,
    pub revoked_at: Option<String>,
    pub replaced_by: Option<String>,
}

impl RefreshToken {
    pub fn is_active(&self, now: &str) -> bool {
        self.revoked_at.is_none() && self.expires_at.as_str() > now
    }

    fn from_row(row: Vec<RawValue>) -> RefreshToken {
        let mut it = row.into_iter();
        RefreshToken {
            id: text(it.next()),
            token_hash: text(it.next()),
            user_id: text(it.next()),
            expires_at: text(it.next()),
            revoked_at: optional_text(it.next()),
            replaced_by: optional_text(it.next()),
        }
    }
}

fn text(v: Option<RawValue>) -> String {
    match v {
        Some(RawValue::Text(s)) | Some(RawValue::Datetime(s)) => s,
        _ => String::new(),
    }
}

fn optional_text(v: Option<RawValue>) -> Option<String> {
    match v {
        Some(RawValue::Text(s)) | Some(RawValue::Datetime(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Keyed by token hash so unrelated rotations never contend.
#[derive(Default)]
pub struct RotationLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RotationLocks {
    async fn guard(&self, token_hash: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("rotation lock map poisoned");
            locks.entry(token_hash.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        lock.lock_owned().await
    }
}

pub struct RefreshTokenRepository<'a> {
    pub pool: &'a Pool,
    pub dialect: &'a dyn Dialect,
    pub deadline: Duration,
    pub locks: &'a RotationLocks,
}

impl<'a> RefreshTokenRepository<'a> {
    fn select_all(&self) -> String {
        let cols: Vec<String> = COLUMNS.iter().map(|c| self.dialect.quote_ident(c)).collect();
        format!("SELECT {} FROM {}", cols.join(", "), self.dialect.quote_ident(REFRESH_TOKENS_TABLE))
    }

    pub async fn create(&self, user_id: &str, token_hash: &str, expires_at: &str) -> Result<RefreshToken, RepositoryError> {
        let id = Id::generate().to_string();
        let cols: Vec<String> = COLUMNS.iter().map(|c| self.dialect.quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| self.dialect.placeholder(i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.quote_ident(REFRESH_TOKENS_TABLE),
            cols.join(", "),
            placeholders.join(", ")
        );
        let params = vec![
            RawValue::Text(id.clone()),
            RawValue::Text(token_hash.to_owned()),
            RawValue::Text(user_id.to_owned()),
            RawValue::Datetime(expires_at.to_owned()),
            RawValue::Null,
            RawValue::Null,
        ];
        moon_storage::execute(self.pool, CompiledStatement::new(sql, params), self.deadline, Duration::from_secs(3600)).await?;
        self.find_by_hash(token_hash).await
    }

    pub async fn find_by_hash(&self, token_hash: &str) -> Result<RefreshToken, RepositoryError> {
        let sql = format!("{} WHERE {} = {}", self.select_all(), self.dialect.quote_ident("token_hash"), self.dialect.placeholder(1));
        let stmt = CompiledStatement::new(sql, vec![RawValue::Text(token_hash.to_owned())]);
        let rows = moon_storage::query(self.pool, stmt, TYPES.to_vec(), self.deadline, Duration::from_secs(3600)).await?;
        rows.into_iter().next().map(RefreshToken::from_row).ok_or(RepositoryError::RefreshTokenNotFound)
    }

    async fn mark_revoked(&self, token_hash: &str, now: &str, replaced_by: Option<&str>) -> Result<(), RepositoryError> {
        let sql = format!(
            "UPDATE {} SET {} = {}, {} = {} WHERE {} = {}",
            self.dialect.quote_ident(REFRESH_TOKENS_TABLE),
            self.dialect.quote_ident("revoked_at"),
            self.dialect.placeholder(1),
            self.dialect.quote_ident("replaced_by"),
            self.dialect.placeholder(2),
            self.dialect.quote_ident("token_hash"),
            self.dialect.placeholder(3),
        );
        let stmt = CompiledStatement::new(
            sql,
            vec![
                RawValue::Datetime(now.to_owned()),
                replaced_by.map(|s| RawValue::Text(s.to_owned())).unwrap_or(RawValue::Null),
                RawValue::Text(token_hash.to_owned()),
            ],
        );
        moon_storage::execute(self.pool, stmt, self.deadline, Duration::from_secs(3600)).await?;
        Ok(())
    }

    /// Atomically consumes `old_hash` and inserts `new_hash` as its
    /// replacement. Returns [`RepositoryError::RefreshTokenNotFound`] if
    /// `old_hash` is missing, already revoked, or expired — the caller maps
    /// that to an authentication failure rather than exposing which.
    pub async fn rotate(&self, old_hash: &str, user_id: &str, new_hash: &str, new_expires_at: &str, now: &str) -> Result<RefreshToken, RepositoryError> {
        let _guard = self.locks.guard(old_hash).await;
        let existing = self.find_by_hash(old_hash).await?;
        if !existing.is_active(now) || existing.user_id != user_id {
            return Err(RepositoryError::RefreshTokenNotFound);
        }
        let fresh = self.create(user_id, new_hash, new_expires_at).await?;
        self.mark_revoked(old_hash, now, Some(&fresh.token_hash)).await?;
        Ok(fresh)
    }

    pub async fn revoke(&self, token_hash: &str, now: &str) -> Result<(), RepositoryError> {
        let _guard = self.locks.guard(token_hash).await;
        self.mark_revoked(token_hash, now, None).await
    }

    /// Walks `replaced_by` forward from `token_hash`, revoking every token
    /// in the chain. Used when a consumed token is replayed — the whole
    /// lineage is treated as compromised.
    pub async fn revoke_chain(&self, token_hash: &str, now: &str) -> Result<(), RepositoryError> {
        let mut current = self.find_by_hash(token_hash).await?;
        self.mark_revoked(&current.token_hash, now, current.replaced_by.clone().as_deref()).await?;
        while let Some(next_hash) = current.replaced_by.clone() {
            current = match self.find_by_hash(&next_hash).await {
                Ok(t) => t,
                Err(_) => break,
            };
            self.mark_revoked(&current.token_hash, now, current.replaced_by.clone().as_deref()).await?;
        }
        Ok(())
    }
}
