use moon_config::DatabaseSettings;
use moon_dialect::Backend;
use r2d2_mysql::mysql::OptsBuilder;
use r2d2_mysql::MysqlConnectionManager;
use postgres::NoTls;
use r2d2_postgres::PostgresConnectionManager;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::StorageError;

/// One pool per process, chosen once at startup from `database.connection`
/// and never swapped. The three variants share nothing at the type level —
/// every call site matches on this enum rather than pretending the backends
/// are interchangeable beneath a trait object.
#[derive(Clone)]
pub enum Pool {
    Sqlite(r2d2::Pool<SqliteConnectionManager>),
    Postgres(r2d2::Pool<PostgresConnectionManager<NoTls>>),
    Mysql(r2d2::Pool<MysqlConnectionManager>),
}

impl Pool {
    pub fn connect(settings: &DatabaseSettings) -> Result<Self, StorageError> {
        let backend = settings
            .backend()
            .map_err(|e| StorageError::UnsupportedBackend(e.to_string()))?;
        match backend {
            Backend::Sqlite => {
                let manager = SqliteConnectionManager::file(&settings.database);
                let pool = r2d2::Pool::builder()
                    .max_size(settings.pool_max_size)
                    .build(manager)
                    .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
                Ok(Pool::Sqlite(pool))
            }
            Backend::Postgres => {
                let mut config = postgres::Config::new();
                config.dbname(&settings.database);
                if let Some(user) = &settings.user {
                    config.user(user);
                }
                if let Some(password) = &settings.password {
                    config.password(password);
                }
                config.host(settings.host.as_deref().unwrap_or("localhost"));
                let manager = PostgresConnectionManager::new(config, NoTls);
                let pool = r2d2::Pool::builder()
                    .max_size(settings.pool_max_size)
                    .build(manager)
                    .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
                Ok(Pool::Postgres(pool))
            }
            Backend::Mysql => {
                let opts = OptsBuilder::new()
                    .db_name(Some(settings.database.clone()))
                    .user(settings.user.clone())
                    .pass(settings.password.clone())
                    .ip_or_hostname(Some(settings.host.clone().unwrap_or_else(|| "localhost".to_owned())));
                let manager = MysqlConnectionManager::new(opts);
                let pool = r2d2::Pool::builder()
                    .max_size(settings.pool_max_size)
                    .build(manager)
                    .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
                Ok(Pool::Mysql(pool))
            }
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            Pool::Sqlite(_) => Backend::Sqlite,
            Pool::Postgres(_) => Backend::Postgres,
            Pool::Mysql(_) => Backend::Mysql,
        }
    }
}
