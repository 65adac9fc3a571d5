//! `moon_apikeys` CRUD. The plaintext key never lands here — only its hash
//! and lookup prefix, minted by `moon_auth::apikey`.

use std::time::Duration;

use moon_dialect::{CompiledStatement, Dialect, RawValue, SemanticType};
use moon_identifier::Id;
use moon_storage::Pool;

use crate::error::RepositoryError;
use crate::schema::APIKEYS_TABLE;

const COLUMNS: [&str; 10] = [
    "id",
    "name",
    "description",
    "key_hash",
    "key_prefix",
    "role",
    "can_write",
    "created_at",
    "last_used_at",
    "revoked_at",
];
const TYPES: [SemanticType; 10] = [
    SemanticType::String,
    SemanticType::String,
    SemanticType::String,
    SemanticType::String,
    SemanticType::String,
    SemanticType::String,
    SemanticType::Boolean,
    SemanticType::Datetime,
    SemanticType::Datetime,
    SemanticType::Datetime,
];

#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub key_hash: String,
    pub key_prefix: String,
    pub role: String,
    pub can_write: bool,
    pub created_at: String,
    pub last_used_at: Option<String>,
    pub revoked_at: Option<String>,
}

impl ApiKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    fn from_row(row: Vec<RawValue>) -> ApiKey {
        let mut it = row.into_iter();
        ApiKey {
            id: text(it.next()),
            name: text(it.next()),
            description: optional_text(it.next()),
            key_hash: text(it.next()),
            key_prefix: text(it.next()),
            role: text(it.next()),
            can_write: matches!(it.next(), Some(RawValue::Boolean(true))),
            created_at: text(it.next()),
            last_used_at: optional_text(it.next()),
            revoked_at: optional_text(it.next()),
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

pub struct NewApiKey {
    pub name: String,
    pub description: Option<String>,
    pub key_hash: String,
    pub key_prefix: String,
    pub role: String,
    pub can_write: bool,
    pub now: String,
}

pub struct ApiKeyRepository<'a> {
    pub pool: &'a Pool,
    pub dialect: &'a dyn Dialect,
    pub deadline: Duration,
}

impl<'a> ApiKeyRepository<'a> {
    fn select_all(&self) -> String {
        let cols: Vec<String> = COLUMNS.iter().map(|c| self.dialect.quote_ident(c)).collect();
        format!("SELECT {} FROM {}", cols.join(", "), self.dialect.quote_ident(APIKEYS_TABLE))
    }

    pub async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, RepositoryError> {
        let id = Id::generate().to_string();
        let cols: Vec<String> = COLUMNS.iter().map(|c| self.dialect.quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| self.dialect.placeholder(i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.quote_ident(APIKEYS_TABLE),
            cols.join(", "),
            placeholders.join(", ")
        );
        let params = vec![
            RawValue::Text(id.clone()),
            RawValue::Text(new_key.name),
            new_key.description.map(RawValue::Text).unwrap_or(RawValue::Null),
            RawValue::Text(new_key.key_hash),
            RawValue::Text(new_key.key_prefix),
            RawValue::Text(new_key.role),
            RawValue::Boolean(new_key.can_write),
            RawValue::Datetime(new_key.now),
            RawValue::Null,
            RawValue::Null,
        ];
        moon_storage::execute(self.pool, CompiledStatement::new(sql, params), self.deadline, Duration::from_secs(3600)).await?;
        self.find_by_id(&id).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<ApiKey, RepositoryError> {
        let sql = format!("{} WHERE {} = {}", self.select_all(), self.dialect.quote_ident("id"), self.dialect.placeholder(1));
        let stmt = CompiledStatement::new(sql, vec![RawValue::Text(id.to_owned())]);
        let rows = moon_storage::query(self.pool, stmt, TYPES.to_vec(), self.deadline, Duration::from_secs(3600)).await?;
        rows.into_iter().next().map(ApiKey::from_row).ok_or(RepositoryError::ApiKeyNotFound)
    }

    /// Narrows on the lookup prefix; the caller still compares the full hash
    /// before trusting a match (two keys can share a 12-character prefix).
    pub async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, RepositoryError> {
        let sql = format!("{} WHERE {} = {}", self.select_all(), self.dialect.quote_ident("key_prefix"), self.dialect.placeholder(1));
        let stmt = CompiledStatement::new(sql, vec![RawValue::Text(prefix.to_owned())]);
        let rows = moon_storage::query(self.pool, stmt, TYPES.to_vec(), self.deadline, Duration::from_secs(3600)).await?;
        Ok(rows.into_iter().map(ApiKey::from_row).collect())
    }

    pub async fn list(&self) -> Result<Vec<ApiKey>, RepositoryError> {
        let sql = format!("{} ORDER BY {} ASC", self.select_all(), self.dialect.quote_ident("created_at"));
        let rows = moon_storage::query(self.pool, CompiledStatement::new(sql, vec![]), TYPES.to_vec(), self.deadline, Duration::from_secs(3600)).await?;
        Ok(rows.into_iter().map(ApiKey::from_row).collect())
    }

    pub async fn touch_last_used(&self, id: &str, now: &str) -> Result<(), RepositoryError> {
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            self.dialect.quote_ident(APIKEYS_TABLE),
            self.dialect.quote_ident("last_used_at"),
            self.dialect.placeholder(1),
            self.dialect.quote_ident("id"),
            self.dialect.placeholder(2),
        );
        let stmt = CompiledStatement::new(sql, vec![RawValue::Datetime(now.to_owned()), RawValue::Text(id.to_owned())]);
        moon_storage::execute(self.pool, stmt, self.deadline, Duration::from_secs(3600)).await?;
        Ok(())
    }

    /// Soft-delete: sets `revoked_at`, never removes the row (rotation and
    /// audit history both depend on it surviving).
    pub async fn revoke(&self, id: &str, now: &str) -> Result<(), RepositoryError> {
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            self.dialect.quote_ident(APIKEYS_TABLE),
            self.dialect.quote_ident("revoked_at"),
            self.dialect.placeholder(1),
            self.dialect.quote_ident("id"),
            self.dialect.placeholder(2),
        );
        let stmt = CompiledStatement::new(sql, vec![RawValue::Datetime(now.to_owned()), RawValue::Text(id.to_owned())]);
        let affected = moon_storage::execute(self.pool, stmt, self.deadline, Duration::from_secs(3600)).await?;
        if affected == 0 {
            return Err(RepositoryError::ApiKeyNotFound);
        }
        Ok(())
    }

    pub async fn destroy(&self, id: &str) -> Result<(), RepositoryError> {
        let sql = format!("DELETE FROM {} WHERE {} = {}", self.dialect.quote_ident(APIKEYS_TABLE), self.dialect.quote_ident("id"), self.dialect.placeholder(1));
        let stmt = CompiledStatement::new(sql, vec![RawValue::Text(id.to_owned())]);
        let affected = moon_storage::execute(self.pool, stmt, self.deadline, Duration::from_secs(3600)).await?;
        if affected == 0 {
            return Err(RepositoryError::ApiKeyNotFound);
        }
        Ok(())
    }
}
