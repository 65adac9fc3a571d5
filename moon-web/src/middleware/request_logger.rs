use std::{future::{ready, Ready}, rc::Rc, time::Instant};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use moon_common::X_REQUEST_ID;
use moon_identifier::Id;

/// Stamps every request with an id (reusing the resource-record id
/// generator — a request id has the same "sortable, unique, opaque"
/// requirements a record id does) and logs method, path, status and
/// duration once the response is ready.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware { service: Rc::new(service) }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let request_id = Id::generate().to_string();
        req.extensions_mut().insert(RequestId(request_id.clone()));
        let method = req.method().to_string();
        let path = req.path().to_owned();
        let started_at = Instant::now();
        let service = self.service.clone();

        Box::pin(async move {
            let mut res = service.call(req).await?;
            res.headers_mut().insert(
                actix_web::http::header::HeaderName::from_static(X_REQUEST_ID),
                actix_web::http::header::HeaderValue::from_str(&request_id).unwrap_or_else(|_| actix_web::http::header::HeaderValue::from_static("")),
            );
            let elapsed_ms = started_at.elapsed().as_millis();
            let status = res.status().as_u16();
            if status >= 500 {
                error!("request completed"; "method" => method, "path" => path, "status" => status, "elapsed_ms" => elapsed_ms, "request_id" => request_id);
            } else {
                info!("request completed"; "method" => method, "path" => path, "status" => status, "elapsed_ms" => elapsed_ms, "request_id" => request_id);
            }
            Ok(res)
        })
    }
}

/// Stashed in request extensions so handlers and the error mapper can echo
/// it back without re-deriving it.
#[derive(Clone)]
pub struct RequestId(pub String);
