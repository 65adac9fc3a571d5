//! The in-memory schema registry (the source of truth every request
//! validates against) and the startup reconciler that keeps it aligned with
//! whatever table set the physical database actually has.

pub mod keywords;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod validate;

pub use model::{Collection, Column};
pub use reconcile::{reconcile, PhysicalCatalog, ReconcileError, ReconcileReport};
pub use registry::{Registry, Snapshot, WriterGuard};
pub use validate::SchemaError;
