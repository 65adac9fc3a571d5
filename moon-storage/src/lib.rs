//! Connection pooling and statement execution across SQLite, PostgreSQL and
//! MySQL. A dynamic, client-defined schema rules out a compile-time query
//! builder, so each backend is driven through its native client crate
//! (`rusqlite`, `postgres`, `mysql`) behind one `r2d2` pool per process;
//! `moon-dialect` is what keeps the SQL text and parameter binding correct
//! per backend.

#[macro_use]
extern crate slog_scope;

pub mod catalog;
pub mod error;
pub mod exec;
pub mod pool;

pub use error::StorageError;
pub use exec::{execute, query};
pub use pool::Pool;
