//! Shared error plumbing, request-id utilities and sensitive-data redaction
//! used across every Moon crate.

#[macro_use]
extern crate slog_scope;

pub mod redact;
pub mod time;

use std::fmt;

use actix_web::web;

/// Errors originating below the HTTP boundary implement this so the single
/// mapping at the web layer can extract a stable error code and decide
/// whether to emit a backtrace to the logs.
pub trait ReportableError: fmt::Debug {
    /// Stable machine-readable code, e.g. `VALIDATION_ERROR`.
    fn error_code(&self) -> &'static str;

    /// Human readable message safe to return to a client.
    fn client_message(&self) -> String;

    /// Whether this error is noteworthy enough to log at error level with a
    /// backtrace (as opposed to routine 4xx validation failures).
    fn is_internal(&self) -> bool {
        false
    }
}

/// Types that can represent an internal (500-class) failure constructed
/// generically, e.g. by a blocking threadpool that lost its task.
pub trait InternalError {
    fn internal_error(message: String) -> Self;
}

#[macro_export]
macro_rules! from_error {
    ($from:ty, $to:ty, $to_kind:expr) => {
        impl From<$from> for $to {
            fn from(inner: $from) -> $to {
                $to_kind(inner).into()
            }
        }
    };
}

#[macro_export]
macro_rules! impl_fmt_display {
    ($error:ty, $kind:ty) => {
        impl std::fmt::Display for $error {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.kind, formatter)
            }
        }
    };
}

/// A threadpool on which callers can spawn blocking (DB, hashing) work
/// without blocking the async reactor. Intentionally not `Clone`: share it
/// behind an `Arc`.
#[derive(Debug, Default)]
pub struct BlockingThreadpool {
    spawned_tasks: std::sync::atomic::AtomicU64,
}

impl BlockingThreadpool {
    pub async fn spawn<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: fmt::Debug + Send + InternalError + 'static,
    {
        use std::sync::atomic::Ordering;
        self.spawned_tasks.fetch_add(1, Ordering::Relaxed);
        let result = web::block(f).await.unwrap_or_else(|_| {
            Err(E::internal_error(
                "blocking threadpool operation canceled".to_owned(),
            ))
        });
        self.spawned_tasks.fetch_sub(1, Ordering::Relaxed);
        result
    }

    pub fn active_threads(&self) -> u64 {
        self.spawned_tasks.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Request id header propagated through the logging middleware and returned
/// on error envelopes so operators can correlate a client report with a log
/// line.
pub static X_REQUEST_ID: &str = "x-request-id";
