use actix_web::{web, HttpResponse};
use moon_auth::password;
use moon_common::time::now_rfc3339;
use moon_dialect::RawValue;
use moon_repositories::{users::NewUser, Repositories};
use serde::Deserialize;
use serde_json::json;

use crate::{envelope, error::ApiError, state::AppState};

fn repos(state: &AppState) -> Repositories<'_> {
    Repositories::new(&state.pool, &*state.dialect, state.query_timeout(), &state.rotation_locks)
}

fn as_json(user: &moon_repositories::users::User) -> serde_json::Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "role": user.role,
        "can_write": user.can_write,
        "created_at": user.created_at,
        "updated_at": user.updated_at,
        "last_login_at": user.last_login_at,
    })
}

#[derive(Deserialize)]
pub struct IdQuery {
    pub id: String,
}

pub async fn list(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users = repos(&state).users.list().await?;
    Ok(envelope::ok(users.iter().map(as_json).collect::<Vec<_>>()))
}

pub async fn get(state: web::Data<AppState>, query: web::Query<IdQuery>) -> Result<HttpResponse, ApiError> {
    let user = repos(&state).users.find_by_id(&query.id).await?;
    Ok(envelope::ok(as_json(&user)))
}

#[derive(Deserialize)]
pub struct CreateUserBody {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
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

pub async fn create(state: web::Data<AppState>, body: web::Json<CreateUserBody>) -> Result<HttpResponse, ApiError> {
    password::validate_complexity(&body.password)?;
    let password_hash = password::hash_password(&body.password)?;
    let user = repos(&state)
        .users
        .create(NewUser {
            username: body.username.clone(),
            email: body.email.clone(),
            password_hash,
            role: body.role.clone(),
            can_write: body.can_write,
            now: now_rfc3339(),
        })
        .await?;
    Ok(envelope::created(as_json(&user)))
}

#[derive(Deserialize)]
pub struct UpdateUserBody {
    pub id: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub can_write: Option<bool>,
}

pub async fn update(state: web::Data<AppState>, body: web::Json<UpdateUserBody>) -> Result<HttpResponse, ApiError> {
    let mut fields: Vec<(&'static str, RawValue)> = Vec::new();
    if let Some(email) = &body.email {
        fields.push(("email", RawValue::Text(email.clone())));
    }
    if let Some(new_password) = &body.password {
        password::validate_complexity(new_password)?;
        fields.push(("password_hash", RawValue::Text(password::hash_password(new_password)?)));
    }
    if let Some(role) = &body.role {
        fields.push(("role", RawValue::Text(role.clone())));
    }
    if let Some(can_write) = body.can_write {
        fields.push(("can_write", RawValue::Boolean(can_write)));
    }
    let user = repos(&state).users.update_fields(&body.id, &now_rfc3339(), fields).await?;
    Ok(envelope::ok(as_json(&user)))
}

#[derive(Deserialize)]
pub struct DestroyUserBody {
    pub id: String,
}

pub async fn destroy(state: web::Data<AppState>, body: web::Json<DestroyUserBody>) -> Result<HttpResponse, ApiError> {
    repos(&state).users.destroy(&body.id).await?;
    Ok(envelope::ok(json!({"id": body.id})))
}
