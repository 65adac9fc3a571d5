//! `moon_blacklisted_tokens`: access token `jti`s revoked before their
//! natural expiry by logout, password change or admin session revocation.

use std::time::Duration;

use moon_dialect::{CompiledStatement, Dialect, RawValue, SemanticType};
use moon_storage::Pool;

use crate::error::RepositoryError;
use crate::schema::BLACKLIST_TABLE;

pub struct BlacklistRepository<'a> {
    pub pool: &'a Pool,
    pub dialect: &'a dyn Dialect,
    pub deadline: Duration,
}

impl<'a> BlacklistRepository<'a> {
    pub async fn add(&self, jti: &str, expires_at: &str, now: &str) -> Result<(), RepositoryError> {
        let sql = format!(
            "INSERT INTO {} ({}, {}, {}) VALUES ({}, {}, {})",
            self.dialect.quote_ident(BLACKLIST_TABLE),
            self.dialect.quote_ident("jti"),
            self.dialect.quote_ident("expires_at"),
            self.dialect.quote_ident("created_at"),
            self.dialect.placeholder(1),
            self.dialect.placeholder(2),
            self.dialect.placeholder(3),
        );
        let stmt = CompiledStatement::new(
            sql,
            vec![RawValue::Text(jti.to_owned()), RawValue::Datetime(expires_at.to_owned()), RawValue::Datetime(now.to_owned())],
        );
        // A token blacklisted twice (e.g. concurrent logout calls) is
        // harmless; tolerate the unique-constraint violation.
        match moon_storage::execute(self.pool, stmt, self.deadline, Duration::from_secs(3600)).await {
            Ok(_) => Ok(()),
            Err(moon_storage::StorageError::UniqueViolation(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn is_blacklisted(&self, jti: &str) -> Result<bool, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.dialect.quote_ident("jti"),
            self.dialect.quote_ident(BLACKLIST_TABLE),
            self.dialect.quote_ident("jti"),
            self.dialect.placeholder(1),
        );
        let stmt = CompiledStatement::new(sql, vec![RawValue::Text(jti.to_owned())]);
        let rows = moon_storage::query(self.pool, stmt, vec![SemanticType::String], self.deadline, Duration::from_secs(3600)).await?;
        Ok(!rows.is_empty())
    }

    /// Drops entries whose access token has naturally expired — the
    /// blacklist only needs to cover a token's remaining lifetime.
    pub async fn purge_expired(&self, now: &str) -> Result<u64, RepositoryError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} < {}",
            self.dialect.quote_ident(BLACKLIST_TABLE),
            self.dialect.quote_ident("expires_at"),
            self.dialect.placeholder(1),
        );
        let stmt = CompiledStatement::new(sql, vec![RawValue::Datetime(now.to_owned())]);
        Ok(moon_storage::execute(self.pool, stmt, self.deadline, Duration::from_secs(3600)).await?)
    }
}
