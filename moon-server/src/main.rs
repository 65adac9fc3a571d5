//! Process entrypoint: load configuration, bring the schema registry in
//! line with the physical database, seed the bootstrap admin if configured,
//! then listen.

#[macro_use]
extern crate slog_scope;

mod logging;

use std::error::Error;
use std::time::Duration;

use docopt::Docopt;
use logging::init_logging;
use moon_auth::password;
use moon_common::time::now_rfc3339;
use moon_config::Settings;
use moon_repositories::{schema::ensure_system_tables, users::NewUser, Repositories, RotationLocks};
use moon_schema::Registry;
use moon_storage::Pool;
use moon_web::state::{AppState, RateLimiter};
use serde::Deserialize;

const USAGE: &str = "
Usage: moon-server [options]

Options:
    -h, --help           Show this message.
    --config=CONFIGFILE  Configuration file path.
";

#[derive(Debug, Deserialize)]
struct Args {
    flag_config: Option<String>,
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Args = Docopt::new(USAGE).and_then(|d| d.deserialize()).unwrap_or_else(|e| e.exit());
    let settings = Settings::with_env_and_config_file(args.flag_config.as_deref())?;
    init_logging(&settings.logging)?;
    info!("starting up"; "backend" => &settings.database.connection);

    let pool = Pool::connect(&settings.database)?;
    let dialect = moon_dialect::for_backend(settings.database.backend()?);
    let query_timeout = Duration::from_secs(settings.database.query_timeout);

    ensure_system_tables(&pool, &*dialect, query_timeout).await?;
    bootstrap_admin(&pool, &*dialect, query_timeout, &settings).await?;

    let registry = Registry::default();
    let report = moon_schema::reconcile::reconcile(&registry, &pool, Duration::from_secs(settings.consistency.timeout_seconds), settings.consistency.drop_orphans).await?;
    info!(
        "startup reconciliation complete";
        "orphan_tables_registered" => report.orphan_tables_registered.len(),
        "orphan_tables_dropped" => report.orphan_tables_dropped.len(),
        "orphan_registry_entries_removed" => report.orphan_registry_entries_removed.len(),
    );

    let banner = settings.banner();
    let host = settings.server.host.clone();
    let port = settings.server.port;

    let state = actix_web::web::Data::new(AppState {
        settings,
        registry,
        pool,
        dialect,
        rotation_locks: RotationLocks::default(),
        rate_limiter: RateLimiter::default(),
    });

    info!("server running"; "address" => &banner);
    actix_web::HttpServer::new(move || {
        let cors = moon_web::build_cors(&state.settings.cors);
        moon_web::build_app!(state, cors)
    })
    .bind((host, port))?
    .run()
    .await?;

    info!("server closing");
    logging::reset_logging();
    Ok(())
}

/// Creates the configured bootstrap admin the first time the server starts
/// against an empty user table. A no-op once any admin exists, so re-runs
/// with the same config are safe.
async fn bootstrap_admin(pool: &Pool, dialect: &dyn moon_dialect::Dialect, query_timeout: Duration, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let bootstrap = &settings.auth.bootstrap_admin;
    let (username, password_plain) = match (&bootstrap.username, &bootstrap.password) {
        (Some(username), Some(password_plain)) => (username, password_plain),
        _ => return Ok(()),
    };
    let repos = Repositories::new(pool, dialect, query_timeout, &RotationLocks::default());
    if repos.users.count_admins().await? > 0 {
        return Ok(());
    }
    password::validate_complexity(password_plain)?;
    let password_hash = password::hash_password(password_plain)?;
    repos
        .users
        .create(NewUser {
            username: username.clone(),
            email: bootstrap.email.clone(),
            password_hash,
            role: "admin".to_owned(),
            can_write: true,
            now: now_rfc3339(),
        })
        .await?;
    info!("bootstrap admin created"; "username" => username);
    Ok(())
}
