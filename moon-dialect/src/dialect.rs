use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Sqlite,
    Postgres,
    Mysql,
}

#[derive(Debug, Error)]
#[error("unknown database backend {0:?}, expected one of sqlite, postgres, mysql")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Backend::Sqlite),
            "postgres" => Ok(Backend::Postgres),
            "mysql" => Ok(Backend::Mysql),
            other => Err(UnknownBackend(other.to_owned())),
        }
    }
}

/// What an `ALTER TABLE` statement can do directly on a given backend,
/// versus needing the table-rebuild recipe ([`crate::rebuild`]).
#[derive(Debug, Clone, Copy)]
pub struct AlterCapabilities {
    pub direct_add_column: bool,
    pub direct_drop_column: bool,
    pub direct_rename_column: bool,
    /// Changing a column's type or nullability in place.
    pub direct_modify_column: bool,
}

/// A capability set covering the SQL differences the rest of the engine
/// needs to paper over: type mapping, identifier quoting, placeholder
/// style, pagination syntax, `ALTER TABLE` support and unique-index naming.
/// Chosen once at startup from config and held immutable for the process.
/// When `alter_capabilities` reports a direct operation unsupported, the DDL
/// engine falls back to a table-rebuild recipe (create-copy-swap).
pub trait Dialect: Send + Sync + std::fmt::Debug {
    fn backend(&self) -> Backend;

    /// Wraps `ident` in the backend's quoting character, escaping any
    /// embedded quote. `ident` itself must already be validated against the
    /// naming rules (§3) — this never receives arbitrary user input.
    fn quote_ident(&self, ident: &str) -> String;

    /// The bind placeholder for the `index`-th (1-based) parameter in a
    /// statement: `?` for SQLite/MySQL, `$1`, `$2`, … for PostgreSQL.
    fn placeholder(&self, index: usize) -> String;

    /// Appends a `LIMIT`/`OFFSET` clause. All three backends share the same
    /// syntax, but it's exposed here so future divergence has one home.
    fn limit_offset_clause(&self, limit: u32, offset: u32) -> String {
        if offset > 0 {
            format!("LIMIT {} OFFSET {}", limit, offset)
        } else {
            format!("LIMIT {}", limit)
        }
    }

    fn alter_capabilities(&self) -> AlterCapabilities;

    /// `idx_{collection}_{column}_unique`, per §4.3.
    fn unique_index_name(&self, collection: &str, column: &str) -> String {
        format!("idx_{}_{}_unique", collection, column)
    }

    /// The DDL fragment used for the auto-increment internal primary key.
    fn pkid_column_ddl(&self) -> &'static str;

    /// `true` when boolean columns are physically stored as 0/1 integers
    /// and need translation at the record engine boundary.
    fn booleans_are_integers(&self) -> bool {
        matches!(self.backend(), Backend::Sqlite)
    }
}

#[derive(Debug, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_owned()
    }

    fn alter_capabilities(&self) -> AlterCapabilities {
        AlterCapabilities {
            direct_add_column: true,
            // SQLite (>= 3.35) supports DROP/RENAME COLUMN directly, but
            // never MODIFY (type/nullability change) — that always needs
            // the rebuild recipe.
            direct_drop_column: true,
            direct_rename_column: true,
            direct_modify_column: false,
        }
    }

    fn pkid_column_ddl(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }
}

#[derive(Debug, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn alter_capabilities(&self) -> AlterCapabilities {
        AlterCapabilities {
            direct_add_column: true,
            direct_drop_column: true,
            direct_rename_column: true,
            direct_modify_column: true,
        }
    }

    fn pkid_column_ddl(&self) -> &'static str {
        "BIGSERIAL PRIMARY KEY"
    }
}

#[derive(Debug, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn backend(&self) -> Backend {
        Backend::Mysql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_owned()
    }

    fn alter_capabilities(&self) -> AlterCapabilities {
        AlterCapabilities {
            direct_add_column: true,
            direct_drop_column: true,
            direct_rename_column: true,
            direct_modify_column: true,
        }
    }

    fn pkid_column_ddl(&self) -> &'static str {
        "BIGINT PRIMARY KEY AUTO_INCREMENT"
    }
}

/// Builds the immutable dialect chosen at startup from `database.connection`.
pub fn for_backend(backend: Backend) -> Box<dyn Dialect> {
    match backend {
        Backend::Sqlite => Box::new(SqliteDialect),
        Backend::Postgres => Box::new(PostgresDialect),
        Backend::Mysql => Box::new(MysqlDialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_placeholders_are_numbered() {
        let d = PostgresDialect;
        assert_eq!(d.placeholder(1), "$1");
        assert_eq!(d.placeholder(2), "$2");
    }

    #[test]
    fn sqlite_and_mysql_placeholders_are_positional() {
        assert_eq!(SqliteDialect.placeholder(3), "?");
        assert_eq!(MysqlDialect.placeholder(3), "?");
    }

    #[test]
    fn sqlite_requires_rebuild_for_modify_only() {
        let caps = SqliteDialect.alter_capabilities();
        assert!(caps.direct_drop_column);
        assert!(caps.direct_rename_column);
        assert!(!caps.direct_modify_column);
    }

    #[test]
    fn unique_index_naming_matches_convention() {
        assert_eq!(
            PostgresDialect.unique_index_name("products", "title"),
            "idx_products_title_unique"
        );
    }

    #[test]
    fn quoting_escapes_embedded_quote_chars() {
        assert_eq!(MysqlDialect.quote_ident("weird`name"), "`weird``name`");
    }
}
