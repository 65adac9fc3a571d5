//! Global `slog` logger setup consumed through the `slog_scope` macros
//! (`info!`, `warn!`, `error!`) that every other crate in the workspace
//! already calls. A plain terminal sink when writing to a TTY, a plain
//! (non-colour) sink when redirected to a file.

use std::fs::OpenOptions;
use std::io;

use moon_config::LoggingSettings;
use slog::{slog_o, Drain};

pub fn init_logging(settings: &LoggingSettings) -> io::Result<()> {
    let logger = match &settings.path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let decorator = slog_term::PlainDecorator::new(file);
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog_envlogger::new(drain);
            let drain = slog_async::Async::new(drain).build().fuse();
            slog::Logger::root(drain, slog_o!())
        }
        None => {
            let decorator = slog_term::TermDecorator::new().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog_envlogger::new(drain);
            let drain = slog_async::Async::new(drain).build().fuse();
            slog::Logger::root(drain, slog_o!())
        }
    };
    slog_scope::set_global_logger(logger).cancel_reset();
    slog_stdlog::init().ok();
    Ok(())
}

pub fn reset_logging() {
    let logger = slog::Logger::root(slog::Discard, slog_o!());
    slog_scope::set_global_logger(logger).cancel_reset();
}
