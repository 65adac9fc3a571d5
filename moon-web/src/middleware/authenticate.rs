use std::{future::{ready, Ready}, rc::Rc};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use moon_auth::{bearer, BearerKind};
use moon_repositories::Repositories;

use crate::{error::ApiError, state::AppState};

/// Principal plus the write permission carried alongside it — `can_write`
/// lives on the user/apikey row, not in the JWT claims, so a revoked write
/// grant takes effect on the next request without needing a token refresh.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub role: String,
    pub can_write: bool,
    pub via: BearerKind,
}

/// Resolves the bearer credential, if any, into an [`AuthContext`] stashed
/// in request extensions. Absence of a credential is not itself a failure
/// here — whether a route requires one is [`crate::middleware::AccessControl`]'s
/// decision, made after the router has matched a resource.
pub struct Authenticate;

impl<S, B> Transform<S, ServiceRequest> for Authenticate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticateMiddleware { service: Rc::new(service) }))
    }
}

pub struct AuthenticateMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthenticateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let header = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_owned);

            let Some(token) = header else {
                return service.call(req).await.map(|res| res.map_into_left_body());
            };

            let state = req.app_data::<web::Data<AppState>>().expect("AppState missing from app data").clone();
            match resolve(&token, &state).await {
                Ok(context) => {
                    req.extensions_mut().insert(context);
                    service.call(req).await.map(|res| res.map_into_left_body())
                }
                Err(e) => Ok(req.error_response(e).map_into_right_body()),
            }
        })
    }
}

async fn resolve(token: &str, state: &AppState) -> Result<AuthContext, ApiError> {
    let repos = Repositories::new(&state.pool, &*state.dialect, state.query_timeout(), &state.rotation_locks);
    match bearer::classify(token) {
        Some(BearerKind::Jwt) => {
            let claims = moon_auth::verify_access(token, &state.settings.jwt).map_err(|_| ApiError::unauthorized("invalid or expired token"))?;
            if repos.blacklist.is_blacklisted(&claims.jti).await.map_err(ApiError::from)? {
                return Err(ApiError::unauthorized("token has been revoked"));
            }
            let user = repos.users.find_by_id(&claims.sub).await.map_err(|_| ApiError::unauthorized("invalid or expired token"))?;
            Ok(AuthContext { subject: user.id, role: user.role, can_write: user.can_write, via: BearerKind::Jwt })
        }
        Some(BearerKind::ApiKey) => {
            if !state.settings.apikey.enabled {
                return Err(ApiError::unauthorized("api keys are disabled"));
            }
            let prefix = moon_auth::apikey::lookup_prefix(token);
            let candidates = repos.apikeys.find_by_prefix(&prefix).await.map_err(ApiError::from)?;
            let hash = moon_auth::apikey::hash(token);
            let key = candidates
                .into_iter()
                .find(|k| k.key_hash == hash && !k.is_revoked())
                .ok_or_else(|| ApiError::unauthorized("invalid api key"))?;
            let now = moon_common::time::now_rfc3339();
            let _ = repos.apikeys.touch_last_used(&key.id, &now).await;
            Ok(AuthContext { subject: key.id, role: key.role, can_write: key.can_write, via: BearerKind::ApiKey })
        }
        None => Err(ApiError::unauthorized("malformed bearer credential")),
    }
}
