use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use moon_common::ReportableError;
use serde::Serialize;

/// The one error type every handler returns. Built either from a typed
/// lower-layer error (`From<E: ReportableError>`) or directly for
/// web-layer-only failures (bad JSON body, unknown route).
#[derive(Debug)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    pub internal: bool,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        ApiError { code, message: message.into(), internal: false, retry_after: None }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::new("RECORD_NOT_FOUND", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new("VALIDATION_ERROR", message)
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::new("INVALID_JSON", message)
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        ApiError {
            code: "RATE_LIMIT_EXCEEDED",
            message: "too many requests".to_owned(),
            internal: false,
            retry_after: Some(retry_after),
        }
    }
}

impl<E: ReportableError> From<E> for ApiError {
    fn from(inner: E) -> Self {
        if inner.is_internal() {
            error!("internal error"; "detail" => format!("{:?}", inner), "code" => inner.error_code());
        }
        ApiError { code: inner.error_code(), message: inner.client_message(), internal: inner.is_internal(), retry_after: None }
    }
}

/// Maps the stable error codes from the §7 taxonomy to a status line. One
/// table, so every new error code only needs an entry here, not a
/// `ResponseError` impl of its own.
fn code_to_status(code: &str) -> StatusCode {
    match code {
        "VALIDATION_ERROR" | "INVALID_JSON" | "INVALID_ULID" | "INVALID_CURSOR" | "INVALID_PARAMETER"
        | "PAGE_SIZE_EXCEEDED" => StatusCode::BAD_REQUEST,
        "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
        "FORBIDDEN" => StatusCode::FORBIDDEN,
        "RECORD_NOT_FOUND" | "COLLECTION_NOT_FOUND" | "ROUTE_NOT_FOUND" => StatusCode::NOT_FOUND,
        "METHOD_NOT_ALLOWED" => StatusCode::METHOD_NOT_ALLOWED,
        "DUPLICATE_COLLECTION" | "DUPLICATE_RECORD" | "UNIQUE_CONSTRAINT_VIOLATION" | "MAX_COLLECTIONS_REACHED"
        | "MAX_COLUMNS_REACHED" => StatusCode::CONFLICT,
        "RATE_LIMIT_EXCEEDED" => StatusCode::TOO_MANY_REQUESTS,
        "QUERY_TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        code_to_status(self.code)
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(seconds) = self.retry_after {
            builder.insert_header(("Retry-After", seconds.to_string()));
        }
        builder.json(ErrorEnvelope { error: ErrorBody { code: self.code, message: &self.message } })
    }
}
