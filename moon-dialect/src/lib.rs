//! Dialect polymorphism expressed as a capability set rather than inheritance:
//! type mapping, identifier quoting, placeholder style, `ALTER TABLE` support
//! and unique-index syntax, with one implementation per backend. Chosen once
//! at startup from `database.connection` and held immutable for the process.

pub mod dialect;
pub mod semantic_type;
pub mod value;

pub use dialect::{for_backend, AlterCapabilities, Backend, Dialect, MysqlDialect, PostgresDialect, SqliteDialect, UnknownBackend};
pub use semantic_type::{SemanticType, UnknownSemanticType};
pub use value::{CompiledStatement, RawValue, StatementBuilder};
