use actix_web::{web, HttpResponse};
use moon_auth::apikey;
use moon_common::time::now_rfc3339;
use moon_repositories::{apikeys::NewApiKey, Repositories};
use serde::Deserialize;
use serde_json::json;

use crate::{envelope, error::ApiError, state::AppState};

fn repos(state: &AppState) -> Repositories<'_> {
    Repositories::new(&state.pool, &*state.dialect, state.query_timeout(), &state.rotation_locks)
}

fn as_json(key: &moon_repositories::apikeys::ApiKey) -> serde_json::Value {
    json!({
        "id": key.id,
        "name": key.name,
        "description": key.description,
        "key_prefix": key.key_prefix,
        "role": key.role,
        "can_write": key.can_write,
        "created_at": key.created_at,
        "last_used_at": key.last_used_at,
        "revoked_at": key.revoked_at,
    })
}

#[derive(Deserialize)]
pub struct IdQuery {
    pub id: String,
}

pub async fn list(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let keys = repos(&state).apikeys.list().await?;
    Ok(envelope::ok(keys.iter().map(as_json).collect::<Vec<_>>()))
}

pub async fn get(state: web::Data<AppState>, query: web::Query<IdQuery>) -> Result<HttpResponse, ApiError> {
    let key = repos(&state).apikeys.find_by_id(&query.id).await?;
    Ok(envelope::ok(as_json(&key)))
}

#[derive(Deserialize)]
pub struct CreateApiKeyBody {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_true")]
    pub can_write: bool,
}

fn default_role() -> String {
    "user".to_owned()
}

fn default_true() -> bool {
    true
}

/// The generated plaintext key is returned once, under `warning` — after
/// this response nothing but its hash is ever stored.
pub async fn create(state: web::Data<AppState>, body: web::Json<CreateApiKeyBody>) -> Result<HttpResponse, ApiError> {
    let generated = apikey::generate();
    let key = repos(&state)
        .apikeys
        .create(NewApiKey {
            name: body.name.clone(),
            description: body.description.clone(),
            key_hash: generated.hash.clone(),
            key_prefix: generated.lookup_prefix.clone(),
            role: body.role.clone(),
            can_write: body.can_write,
            now: now_rfc3339(),
        })
        .await?;
    let mut data = as_json(&key);
    data["key"] = json!(generated.plaintext);
    Ok(envelope::with_warning(data, "this is the only time the full api key is shown"))
}

#[derive(Deserialize)]
pub struct RevokeApiKeyBody {
    pub id: String,
}

pub async fn revoke(state: web::Data<AppState>, body: web::Json<RevokeApiKeyBody>) -> Result<HttpResponse, ApiError> {
    repos(&state).apikeys.revoke(&body.id, &now_rfc3339()).await?;
    Ok(envelope::ok(json!({"id": body.id})))
}

pub async fn destroy(state: web::Data<AppState>, body: web::Json<RevokeApiKeyBody>) -> Result<HttpResponse, ApiError> {
    repos(&state).apikeys.destroy(&body.id).await?;
    Ok(envelope::ok(json!({"id": body.id})))
}
