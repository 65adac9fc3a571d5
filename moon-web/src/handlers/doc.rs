use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::state::AppState;

/// A minimal machine-readable description of the mounted resources — not a
/// full OpenAPI document, just enough for a client to discover what
/// collections exist and which fixed resources sit alongside them.
pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "server": state.settings.banner(),
        "fixed_resources": ["auth", "users", "apikeys", "collections"],
        "collections": state.registry.list(),
        "actions": ["list", "get", "create", "update", "destroy", "schema", "count", "sum", "avg", "min", "max"],
    }))
}
