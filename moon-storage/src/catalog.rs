//! [`PhysicalCatalog`] lets the schema reconciler ask a pool what tables
//! actually exist without knowing which backend it's talking to.

use async_trait::async_trait;
use moon_dialect::{for_backend, SemanticType};
use moon_schema::model::Column;
use moon_schema::{Collection, PhysicalCatalog, ReconcileError};

use crate::pool::Pool;

#[async_trait]
impl PhysicalCatalog for Pool {
    async fn list_tables(&self) -> Result<Vec<String>, ReconcileError> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || list_tables_blocking(&pool))
            .await
            .map_err(|e| ReconcileError::Catalog(e.to_string()))?
    }

    async fn infer_collection(&self, table: &str) -> Result<Collection, ReconcileError> {
        let pool = self.clone();
        let table = table.to_owned();
        tokio::task::spawn_blocking(move || infer_collection_blocking(&pool, &table))
            .await
            .map_err(|e| ReconcileError::Catalog(e.to_string()))?
    }

    async fn drop_table(&self, table: &str) -> Result<(), ReconcileError> {
        let pool = self.clone();
        let table = table.to_owned();
        tokio::task::spawn_blocking(move || drop_table_blocking(&pool, &table))
            .await
            .map_err(|e| ReconcileError::Catalog(e.to_string()))?
    }
}

fn list_tables_blocking(pool: &Pool) -> Result<Vec<String>, ReconcileError> {
    match pool {
        Pool::Sqlite(p) => {
            let conn = p.get().map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
                .map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            names
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ReconcileError::Catalog(e.to_string()))
        }
        Pool::Postgres(p) => {
            let mut conn = p.get().map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            let rows = conn
                .query(
                    "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'",
                    &[],
                )
                .map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
        }
        Pool::Mysql(p) => {
            use r2d2_mysql::mysql::prelude::Queryable;
            let mut conn = p.get().map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            conn.query("SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE()")
                .map_err(|e| ReconcileError::Catalog(e.to_string()))
        }
    }
}

struct PhysicalColumn {
    name: String,
    sql_type: String,
    nullable: bool,
}

fn infer_collection_blocking(pool: &Pool, table: &str) -> Result<Collection, ReconcileError> {
    let physical = describe_columns(pool, table)?;
    let columns = physical
        .into_iter()
        .filter(|c| !c.name.eq_ignore_ascii_case("pkid") && !c.name.eq_ignore_ascii_case("id"))
        .map(|c| Column {
            name: c.name,
            semantic_type: infer_semantic_type(&c.sql_type),
            nullable: c.nullable,
            unique: false,
            scale: None,
            system: false,
        })
        .collect();
    Ok(Collection::new(table.to_owned(), columns))
}

fn describe_columns(pool: &Pool, table: &str) -> Result<Vec<PhysicalColumn>, ReconcileError> {
    let dialect = for_backend(pool.backend());
    match pool {
        Pool::Sqlite(p) => {
            let conn = p.get().map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            let sql = format!("PRAGMA table_info({})", dialect.quote_ident(table));
            let mut stmt = conn.prepare(&sql).map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(PhysicalColumn {
                        name: row.get::<_, String>(1)?,
                        sql_type: row.get::<_, String>(2)?,
                        nullable: row.get::<_, i64>(3)? == 0,
                    })
                })
                .map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| ReconcileError::Catalog(e.to_string()))
        }
        Pool::Postgres(p) => {
            let mut conn = p.get().map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            let rows = conn
                .query(
                    "SELECT column_name, data_type, is_nullable = 'YES' FROM information_schema.columns \
                     WHERE table_schema = 'public' AND table_name = $1",
                    &[&table],
                )
                .map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            Ok(rows
                .iter()
                .map(|row| PhysicalColumn {
                    name: row.get(0),
                    sql_type: row.get(1),
                    nullable: row.get(2),
                })
                .collect())
        }
        Pool::Mysql(p) => {
            use r2d2_mysql::mysql::prelude::Queryable;
            let mut conn = p.get().map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            let rows: Vec<(String, String, String)> = conn
                .exec(
                    "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
                     WHERE table_schema = DATABASE() AND table_name = ?",
                    (table,),
                )
                .map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            Ok(rows
                .into_iter()
                .map(|(name, sql_type, nullable)| PhysicalColumn {
                    name,
                    sql_type,
                    nullable: nullable == "YES",
                })
                .collect())
        }
    }
}

fn drop_table_blocking(pool: &Pool, table: &str) -> Result<(), ReconcileError> {
    let dialect = for_backend(pool.backend());
    let sql = format!("DROP TABLE {}", dialect.quote_ident(table));
    match pool {
        Pool::Sqlite(p) => {
            let conn = p.get().map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            conn.execute(&sql, []).map_err(|e| ReconcileError::Catalog(e.to_string()))?;
        }
        Pool::Postgres(p) => {
            let mut conn = p.get().map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            conn.execute(sql.as_str(), &[])
                .map_err(|e| ReconcileError::Catalog(e.to_string()))?;
        }
        Pool::Mysql(p) => {
            use r2d2_mysql::mysql::prelude::Queryable;
            let mut conn = p.get().map_err(|e| ReconcileError::Catalog(e.to_string()))?;
            conn.query_drop(sql).map_err(|e| ReconcileError::Catalog(e.to_string()))?;
        }
    }
    Ok(())
}

/// Best-effort mapping from a physical column type name back to one of the
/// six semantic types, used only when adopting a table nobody registered
/// (`consistency.drop_orphans = false`). Anything unrecognised defaults to
/// `String` since every backend can at least render a value as text.
fn infer_semantic_type(sql_type: &str) -> SemanticType {
    let upper = sql_type.to_ascii_uppercase();
    if upper.contains("BOOL") {
        SemanticType::Boolean
    } else if upper.contains("JSON") {
        SemanticType::Json
    } else if upper.contains("NUMERIC") || upper.contains("DECIMAL") {
        SemanticType::Decimal
    } else if upper.contains("INT") {
        SemanticType::Integer
    } else if upper.contains("TIME") || upper.contains("DATE") {
        SemanticType::Datetime
    } else {
        SemanticType::String
    }
}
