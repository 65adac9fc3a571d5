//! CRUD over the four fixed system tables that back authentication:
//! `moon_users`, `moon_apikeys`, `moon_refresh_tokens`,
//! `moon_blacklisted_tokens`. These never go through the dynamic schema
//! registry or query compiler that user collections use — they have a
//! fixed shape known at compile time, so each repository hand-builds its
//! own statements with `moon-dialect`'s [`moon_dialect::StatementBuilder`]
//! conventions and runs them through `moon-storage` directly.

pub mod apikeys;
pub mod blacklist;
pub mod error;
pub mod refresh_tokens;
pub mod schema;
pub mod users;

use std::time::Duration;

use moon_dialect::Dialect;
use moon_storage::Pool;

pub use error::RepositoryError;
pub use refresh_tokens::RotationLocks;

/// Bundles the fixed-table repositories behind one set of borrows, mirroring
/// how `moon-engine`'s `Engine` bundles the dynamic-collection path.
pub struct Repositories<'a> {
    pub users: users::UserRepository<'a>,
    pub apikeys: apikeys::ApiKeyRepository<'a>,
    pub refresh_tokens: refresh_tokens::RefreshTokenRepository<'a>,
    pub blacklist: blacklist::BlacklistRepository<'a>,
}

impl<'a> Repositories<'a> {
    pub fn new(pool: &'a Pool, dialect: &'a dyn Dialect, deadline: Duration, rotation_locks: &'a RotationLocks) -> Self {
        Repositories {
            users: users::UserRepository { pool, dialect, deadline },
            apikeys: apikeys::ApiKeyRepository { pool, dialect, deadline },
            refresh_tokens: refresh_tokens::RefreshTokenRepository { pool, dialect, deadline, locks: rotation_locks },
            blacklist: blacklist::BlacklistRepository { pool, dialect, deadline },
        }
    }
}
