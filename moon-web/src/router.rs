//! Every fixed resource (health, docs, auth, users, apikeys, collections)
//! gets a literal route in [`crate::app`]. Dynamic collections don't — their
//! names are whatever a client has created — so they fall through to this
//! single catch-all, which peels `{collection}:{action}` off the path itself.

use actix_web::{web, HttpRequest, HttpResponse};

use crate::{error::ApiError, handlers::records, state::AppState};

/// Splits `/products:list` into `("products", "list")`. The collection name
/// is validated against the registry downstream in `records::dispatch`; this
/// function only owns the `:` syntax.
fn split_resource(path: &str) -> Result<(&str, &str), ApiError> {
    let trimmed = path.trim_start_matches('/');
    trimmed
        .split_once(':')
        .filter(|(collection, action)| !collection.is_empty() && !action.is_empty())
        .ok_or_else(|| ApiError::new("ROUTE_NOT_FOUND", format!("no route matches '{}'", path)))
}

pub async fn dynamic_collection(req: HttpRequest, state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let (collection, action) = split_resource(req.path())?;
    records::dispatch(&state, collection, action, req.method(), req.query_string(), &body).await
}
