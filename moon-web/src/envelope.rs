use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct DataEnvelope<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(DataEnvelope { data, message: None, warning: None })
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(DataEnvelope { data, message: None, warning: None })
}

pub fn with_warning<T: Serialize>(data: T, warning: impl Into<String>) -> HttpResponse {
    HttpResponse::Created().json(DataEnvelope { data, message: None, warning: Some(warning.into()) })
}

#[derive(Serialize)]
pub struct ListMeta {
    pub count: usize,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

#[derive(Serialize)]
pub struct ListEnvelope {
    pub data: Vec<Value>,
    pub meta: ListMeta,
}

pub fn list(data: Vec<Value>, limit: u32, next: Option<String>, prev: Option<String>) -> HttpResponse {
    let meta = ListMeta { count: data.len(), limit, next, prev };
    HttpResponse::Ok().json(ListEnvelope { data, meta })
}
