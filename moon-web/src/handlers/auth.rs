use actix_web::{web, HttpRequest, HttpResponse};
use moon_auth::{apikey, password, BearerKind};
use moon_common::time::{now_rfc3339, rfc3339_from_unix, unix_seconds_now};
use moon_repositories::Repositories;
use serde::Deserialize;
use serde_json::json;

use crate::{error::ApiError, envelope, middleware::authenticate::AuthContext, state::AppState};

#[derive(Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

fn repos(state: &AppState) -> Repositories<'_> {
    Repositories::new(&state.pool, &*state.dialect, state.query_timeout(), &state.rotation_locks)
}

async fn issue_and_store(state: &AppState, user_id: &str, role: &str) -> Result<serde_json::Value, ApiError> {
    let now = unix_seconds_now();
    let pair = moon_auth::issue_token_pair(user_id, role, now, &state.settings.jwt)?;
    let refresh_hash = apikey::hash(&pair.refresh.token);
    repos(state)
        .refresh_tokens
        .create(user_id, &refresh_hash, &rfc3339_from_unix(pair.refresh.expires_at))
        .await?;
    Ok(json!({
        "access_token": pair.access.token,
        "refresh_token": pair.refresh.token,
        "token_type": "Bearer",
        "expires_in": state.settings.jwt.access_expiry,
    }))
}

/// Username/password never tell the caller which half was wrong — both a
/// missing user and a bad password map to the same generic failure.
pub async fn login(state: web::Data<AppState>, body: web::Json<LoginBody>) -> Result<HttpResponse, ApiError> {
    let user = repos(&state)
        .users
        .find_by_username(&body.username)
        .await
        .map_err(|_| ApiError::unauthorized("invalid username or password"))?;
    if !password::verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::unauthorized("invalid username or password"));
    }
    let tokens = issue_and_store(&state, &user.id, &user.role).await?;
    repos(&state).users.touch_last_login(&user.id, &now_rfc3339()).await?;
    Ok(envelope::ok(tokens))
}

/// Rotates a refresh token. A token already consumed (its `replaced_by` is
/// set) is treated as a replay and the whole lineage is revoked, since it
/// means the token leaked to someone else.
pub async fn refresh(state: web::Data<AppState>, body: web::Json<RefreshBody>) -> Result<HttpResponse, ApiError> {
    let claims = moon_auth::verify_refresh(&body.refresh_token, &state.settings.jwt).map_err(|_| ApiError::unauthorized("invalid refresh token"))?;
    let hash = apikey::hash(&body.refresh_token);
    let now = now_rfc3339();

    let existing = repos(&state).refresh_tokens.find_by_hash(&hash).await.map_err(|_| ApiError::unauthorized("invalid refresh token"))?;
    if !existing.is_active(&now) {
        if existing.replaced_by.is_some() {
            let _ = repos(&state).refresh_tokens.revoke_chain(&hash, &now).await;
        }
        return Err(ApiError::unauthorized("refresh token has already been used or has expired"));
    }

    let user = repos(&state).users.find_by_id(&claims.sub).await.map_err(|_| ApiError::unauthorized("invalid refresh token"))?;
    let access = moon_auth::jwt::issue_access(
        &user.id,
        &user.role,
        unix_seconds_now(),
        state.settings.jwt.access_expiry,
        &state.settings.jwt.issuer,
        &state.settings.jwt.audience,
        &state.settings.jwt.secret,
    )?;
    let new_refresh = moon_auth::jwt::issue_refresh(
        &user.id,
        &user.role,
        unix_seconds_now(),
        state.settings.jwt.refresh_expiry,
        &state.settings.jwt.issuer,
        &state.settings.jwt.audience,
        &state.settings.jwt.secret,
    )?;
    let new_hash = apikey::hash(&new_refresh.token);
    repos(&state)
        .refresh_tokens
        .rotate(&hash, &user.id, &new_hash, &rfc3339_from_unix(new_refresh.expires_at), &now)
        .await?;

    Ok(envelope::ok(json!({
        "access_token": access.token,
        "refresh_token": new_refresh.token,
        "token_type": "Bearer",
        "expires_in": state.settings.jwt.access_expiry,
    })))
}

/// Blacklists the access token presented on this request and, if supplied,
/// revokes the paired refresh token.
pub async fn logout(req: HttpRequest, state: web::Data<AppState>, body: Option<web::Json<RefreshBody>>) -> Result<HttpResponse, ApiError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

    if let Ok(claims) = moon_auth::verify_access(token, &state.settings.jwt) {
        let now = now_rfc3339();
        repos(&state).blacklist.add(&claims.jti, &rfc3339_from_unix(claims.exp), &now).await?;
    }
    if let Some(body) = body {
        let hash = apikey::hash(&body.refresh_token);
        let _ = repos(&state).refresh_tokens.revoke(&hash, &now_rfc3339()).await;
    }
    Ok(envelope::ok(json!({"message": "logged out"})))
}

pub async fn me(state: web::Data<AppState>, context: web::ReqData<AuthContext>) -> Result<HttpResponse, ApiError> {
    match context.via {
        BearerKind::Jwt => {
            let user = repos(&state).users.find_by_id(&context.subject).await?;
            Ok(envelope::ok(json!({
                "id": user.id,
                "username": user.username,
                "email": user.email,
                "role": user.role,
                "can_write": user.can_write,
            })))
        }
        BearerKind::ApiKey => {
            let key = repos(&state).apikeys.find_by_id(&context.subject).await?;
            Ok(envelope::ok(json!({
                "id": key.id,
                "name": key.name,
                "role": key.role,
                "can_write": key.can_write,
            })))
        }
    }
}
