use std::{future::{ready, Ready}, rc::Rc};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use moon_common::time::unix_seconds_now;

use crate::{error::ApiError, middleware::authenticate::AuthContext, state::AppState};

const PUBLIC_PREFIXES: &[&str] = &["/health", "/doc", "/"];

fn is_public(path: &str) -> bool {
    path == "/health" || path == "/" || path.starts_with("/doc") || path == "/auth:login" || path == "/auth:refresh"
}

/// Rate limiting and authorisation in one pass: both need the principal
/// [`crate::middleware::Authenticate`] resolved, and authorisation (write
/// access) only makes sense once we also know the rate-limit verdict didn't
/// already reject the request.
pub struct AccessControl;

impl<S, B> Transform<S, ServiceRequest> for AccessControl
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessControlMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AccessControlMiddleware { service: Rc::new(service) }))
    }
}

pub struct AccessControlMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AccessControlMiddleware<S>
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
        let path = req.path().to_owned();
        let method = req.method().clone();

        Box::pin(async move {
            let context = req.extensions().get::<AuthContext>().cloned();
            let state = req.app_data::<web::Data<AppState>>().expect("AppState missing from app data").clone();

            if context.is_none() && !is_public(&path) {
                return Ok(req.error_response(ApiError::unauthorized("this endpoint requires authentication")).map_into_right_body());
            }

            if let Some(context) = &context {
                let (key, limit) = match context.via {
                    moon_auth::BearerKind::ApiKey => (format!("apikey:{}", context.subject), state.settings.ratelimit.apikey_rpm),
                    moon_auth::BearerKind::Jwt => (format!("user:{}", context.subject), state.settings.ratelimit.user_rpm),
                };
                let decision = state.rate_limiter.check(&key, limit, state.settings.ratelimit.window_seconds, unix_seconds_now());
                if !decision.allowed {
                    return Ok(req.error_response(ApiError::rate_limited(decision.reset_in)).map_into_right_body());
                }

                if method != actix_web::http::Method::GET && requires_write(&path) && !context.can_write {
                    return Ok(req.error_response(ApiError::forbidden("this credential does not have write access")).map_into_right_body());
                }
                if is_admin_only(&path) && context.role != "admin" {
                    return Ok(req.error_response(ApiError::forbidden("this endpoint requires an admin role")).map_into_right_body());
                }
            }

            service.call(req).await.map(|res| res.map_into_left_body())
        })
    }
}

/// `/users:*` and `/apikeys:*` are admin-only resources — the other half of
/// the admin bundle is everything this never calls out, i.e. ordinary
/// dynamic collections, which only need `can_write` for non-GET verbs.
fn is_admin_only(path: &str) -> bool {
    path.starts_with("/users:") || path.starts_with("/apikeys:") || path == "/users" || path == "/apikeys"
}

fn requires_write(path: &str) -> bool {
    !PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}
