//! The HTTP surface: CORS, the auth/rate-limit/authorisation middleware
//! pipeline, and every route, fixed and dynamic.
//!
//! `build_app!` is a macro rather than a function because the concrete type
//! `App` settles into after a chain of `.wrap()`/`.service()` calls isn't
//! nameable as a return type — the same constraint that keeps the teacher's
//! own app assembly in macro form.

#[macro_use]
extern crate slog_scope;

pub mod envelope;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

use actix_cors::Cors;
use actix_web::{error::JsonPayloadError, http::header, HttpRequest, ResponseError};
use moon_config::CorsSettings;

use crate::error::ApiError;

/// Builds a `Cors` middleware from configuration. A wildcard origin and
/// `allow_credentials` together are rejected at [`moon_config::Settings::validate`]
/// time, so this never has to reconcile that conflict itself.
pub fn build_cors(settings: &CorsSettings) -> Cors {
    if !settings.enabled {
        return Cors::default().allow_any_origin().send_wildcard();
    }
    let mut cors = Cors::default();
    if settings.allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_any_origin();
    } else {
        for origin in &settings.allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }
    cors = cors.allowed_methods(settings.allowed_methods.iter().map(String::as_str).collect::<Vec<_>>());
    cors = cors.allowed_headers(settings.allowed_headers.iter().filter_map(|h| header::HeaderName::try_from(h.as_str()).ok()).collect::<Vec<_>>());
    if !settings.exposed_headers.is_empty() {
        cors = cors.expose_headers(settings.exposed_headers.iter().filter_map(|h| header::HeaderName::try_from(h.as_str()).ok()).collect::<Vec<_>>());
    }
    if settings.allow_credentials {
        cors = cors.supports_credentials();
    }
    cors.max_age(settings.max_age)
}

/// Converts a malformed JSON body into the same error envelope every other
/// failure renders, instead of actix's default plain-text `400`.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    actix_web::error::InternalError::from_response(err.to_string(), ApiError::invalid_json(err.to_string()).error_response()).into()
}

#[macro_export]
macro_rules! build_app {
    ($state:expr, $cors:expr) => {
        actix_web::App::new()
            .app_data($state.clone())
            .app_data(actix_web::web::JsonConfig::default().error_handler($crate::json_error_handler))
            .wrap($crate::middleware::AccessControl)
            .wrap($crate::middleware::Authenticate)
            .wrap($crate::middleware::RequestLogger)
            .wrap($cors)
            .service(
                actix_web::web::scope(&$state.settings.server.prefix)
                    .route("/", actix_web::web::get().to($crate::handlers::doc::index))
                    .route("/health", actix_web::web::get().to($crate::handlers::health::health))
                    .route("/doc", actix_web::web::get().to($crate::handlers::doc::index))
                    .route("/auth:login", actix_web::web::post().to($crate::handlers::auth::login))
                    .route("/auth:refresh", actix_web::web::post().to($crate::handlers::auth::refresh))
                    .route("/auth:logout", actix_web::web::post().to($crate::handlers::auth::logout))
                    .route("/auth:me", actix_web::web::get().to($crate::handlers::auth::me))
                    .route("/users:list", actix_web::web::get().to($crate::handlers::users::list))
                    .route("/users:get", actix_web::web::get().to($crate::handlers::users::get))
                    .route("/users:create", actix_web::web::post().to($crate::handlers::users::create))
                    .route("/users:update", actix_web::web::post().to($crate::handlers::users::update))
                    .route("/users:destroy", actix_web::web::post().to($crate::handlers::users::destroy))
                    .route("/apikeys:list", actix_web::web::get().to($crate::handlers::apikeys::list))
                    .route("/apikeys:get", actix_web::web::get().to($crate::handlers::apikeys::get))
                    .route("/apikeys:create", actix_web::web::post().to($crate::handlers::apikeys::create))
                    .route("/apikeys:revoke", actix_web::web::post().to($crate::handlers::apikeys::revoke))
                    .route("/apikeys:destroy", actix_web::web::post().to($crate::handlers::apikeys::destroy))
                    .route("/collections:list", actix_web::web::get().to($crate::handlers::collections::list))
                    .route("/collections:get", actix_web::web::get().to($crate::handlers::collections::get))
                    .route("/collections:create", actix_web::web::post().to($crate::handlers::collections::create))
                    .route("/collections:alter", actix_web::web::post().to($crate::handlers::collections::alter))
                    .route("/collections:destroy", actix_web::web::post().to($crate::handlers::collections::destroy))
                    .default_service(actix_web::web::route().to($crate::router::dynamic_collection)),
            )
    };
}
