//! `moon_users` CRUD. Holds the "at least one admin" invariant: destroy and
//! demotion both check the surviving admin count before committing.

use std::time::Duration;

use moon_dialect::{CompiledStatement, Dialect, RawValue, SemanticType};
use moon_identifier::Id;
use moon_storage::Pool;

use crate::error::RepositoryError;
use crate::schema::USERS_TABLE;

const COLUMNS: [&str; 9] = [
    "id",
    "username",
    "email",
    "password_hash",
    "role",
    "can_write",
    "created_at",
    "updated_at",
    "last_login_at",
];
const TYPES: [SemanticType; 9] = [
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
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub can_write: bool,
    pub created_at: String,
    pub updated_at: String,
    pub last_login_at: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    fn from_row(row: Vec<RawValue>) -> User {
        let mut it = row.into_iter();
        User {
            id: text(it.next()),
            username: text(it.next()),
            email: optional_text(it.next()),
            password_hash: text(it.next()),
            role: text(it.next()),
            can_write: matches!(it.next(), Some(RawValue::Boolean(true))),
            created_at: text(it.next()),
            updated_at: text(it.next()),
            last_login_at: optional_text(it.next()),
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

pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub can_write: bool,
    pub now: String,
}

pub struct UserRepository<'a> {
    pub pool: &'a Pool,
    pub dialect: &'a dyn Dialect,
    pub deadline: Duration,
}

impl<'a> UserRepository<'a> {
    fn select_all(&self) -> String {
        let cols: Vec<String> = COLUMNS.iter().map(|c| self.dialect.quote_ident(c)).collect();
        format!("SELECT {} FROM {}", cols.join(", "), self.dialect.quote_ident(USERS_TABLE))
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote_ident(USERS_TABLE));
        let rows = moon_storage::query(self.pool, CompiledStatement::new(sql, vec![]), vec![SemanticType::Integer], self.deadline, Duration::from_secs(3600)).await?;
        Ok(rows.first().and_then(|r| r.first()).and_then(|v| match v {
            RawValue::Integer(n) => Some(*n as u64),
            _ => None,
        }).unwrap_or(0))
    }

    pub async fn count_admins(&self) -> Result<u64, RepositoryError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = {}",
            self.dialect.quote_ident(USERS_TABLE),
            self.dialect.quote_ident("role"),
            self.dialect.placeholder(1)
        );
        let stmt = CompiledStatement::new(sql, vec![RawValue::Text("admin".to_owned())]);
        let rows = moon_storage::query(self.pool, stmt, vec![SemanticType::Integer], self.deadline, Duration::from_secs(3600)).await?;
        Ok(rows.first().and_then(|r| r.first()).and_then(|v| match v {
            RawValue::Integer(n) => Some(*n as u64),
            _ => None,
        }).unwrap_or(0))
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let id = Id::generate().to_string();
        let cols: Vec<String> = COLUMNS.iter().map(|c| self.dialect.quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| self.dialect.placeholder(i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.quote_ident(USERS_TABLE),
            cols.join(", "),
            placeholders.join(", ")
        );
        let params = vec![
            RawValue::Text(id.clone()),
            RawValue::Text(new_user.username),
            new_user.email.map(RawValue::Text).unwrap_or(RawValue::Null),
            RawValue::Text(new_user.password_hash),
            RawValue::Text(new_user.role),
            RawValue::Boolean(new_user.can_write),
            RawValue::Datetime(new_user.now.clone()),
            RawValue::Datetime(new_user.now),
            RawValue::Null,
        ];
        moon_storage::execute(self.pool, CompiledStatement::new(sql, params), self.deadline, Duration::from_secs(3600))
            .await
            .map_err(|e| match e {
                moon_storage::StorageError::UniqueViolation(_) => RepositoryError::DuplicateUser,
                other => RepositoryError::Storage(other),
            })?;
        self.find_by_id(&id).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<User, RepositoryError> {
        let sql = format!("{} WHERE {} = {}", self.select_all(), self.dialect.quote_ident("id"), self.dialect.placeholder(1));
        let stmt = CompiledStatement::new(sql, vec![RawValue::Text(id.to_owned())]);
        let rows = moon_storage::query(self.pool, stmt, TYPES.to_vec(), self.deadline, Duration::from_secs(3600)).await?;
        rows.into_iter().next().map(User::from_row).ok_or(RepositoryError::UserNotFound)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User, RepositoryError> {
        let sql = format!("{} WHERE {} = {}", self.select_all(), self.dialect.quote_ident("username"), self.dialect.placeholder(1));
        let stmt = CompiledStatement::new(sql, vec![RawValue::Text(username.to_owned())]);
        let rows = moon_storage::query(self.pool, stmt, TYPES.to_vec(), self.deadline, Duration::from_secs(3600)).await?;
        rows.into_iter().next().map(User::from_row).ok_or(RepositoryError::UserNotFound)
    }

    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("{} ORDER BY {} ASC", self.select_all(), self.dialect.quote_ident("created_at"));
        let rows = moon_storage::query(self.pool, CompiledStatement::new(sql, vec![]), TYPES.to_vec(), self.deadline, Duration::from_secs(3600)).await?;
        Ok(rows.into_iter().map(User::from_row).collect())
    }

    pub async fn touch_last_login(&self, id: &str, now: &str) -> Result<(), RepositoryError> {
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            self.dialect.quote_ident(USERS_TABLE),
            self.dialect.quote_ident("last_login_at"),
            self.dialect.placeholder(1),
            self.dialect.quote_ident("id"),
            self.dialect.placeholder(2),
        );
        let stmt = CompiledStatement::new(sql, vec![RawValue::Datetime(now.to_owned()), RawValue::Text(id.to_owned())]);
        moon_storage::execute(self.pool, stmt, self.deadline, Duration::from_secs(3600)).await?;
        Ok(())
    }

    /// Applies `(column, value)` pairs built by the caller (already
    /// validated/hashed as needed) and refreshes `updated_at`.
    pub async fn update_fields(&self, id: &str, now: &str, fields: Vec<(&'static str, RawValue)>) -> Result<User, RepositoryError> {
        if fields.is_empty() {
            return self.find_by_id(id).await;
        }
        let mut set_clauses = Vec::new();
        let mut params = Vec::new();
        for (i, (col, value)) in fields.into_iter().enumerate() {
            set_clauses.push(format!("{} = {}", self.dialect.quote_ident(col), self.dialect.placeholder(i + 1)));
            params.push(value);
        }
        set_clauses.push(format!(
            "{} = {}",
            self.dialect.quote_ident("updated_at"),
            self.dialect.placeholder(params.len() + 1)
        ));
        params.push(RawValue::Datetime(now.to_owned()));
        let id_index = params.len() + 1;
        params.push(RawValue::Text(id.to_owned()));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.dialect.quote_ident(USERS_TABLE),
            set_clauses.join(", "),
            self.dialect.quote_ident("id"),
            self.dialect.placeholder(id_index),
        );
        let affected = moon_storage::execute(self.pool, CompiledStatement::new(sql, params), self.deadline, Duration::from_secs(3600))
            .await
            .map_err(|e| match e {
                moon_storage::StorageError::UniqueViolation(_) => RepositoryError::DuplicateUser,
                other => RepositoryError::Storage(other),
            })?;
        if affected == 0 {
            return Err(RepositoryError::UserNotFound);
        }
        self.find_by_id(id).await
    }

    /// Refuses to delete the last surviving admin.
    pub async fn destroy(&self, id: &str) -> Result<(), RepositoryError> {
        let target = self.find_by_id(id).await?;
        if target.is_admin() && self.count_admins().await? <= 1 {
            return Err(RepositoryError::LastAdminProtected);
        }
        let sql = format!("DELETE FROM {} WHERE {} = {}", self.dialect.quote_ident(USERS_TABLE), self.dialect.quote_ident("id"), self.dialect.placeholder(1));
        let stmt = CompiledStatement::new(sql, vec![RawValue::Text(id.to_owned())]);
        let affected = moon_storage::execute(self.pool, stmt, self.deadline, Duration::from_secs(3600)).await?;
        if affected == 0 {
            return Err(RepositoryError::UserNotFound);
        }
        Ok(())
    }
}
