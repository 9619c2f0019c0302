//! Standard response envelope helpers: `{success, data|message, meta?}`.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

#[derive(Serialize)]
pub struct SuccessMessage {
    pub success: bool,
    pub message: String,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::CREATED,
        Json(SuccessOne {
            success: true,
            data,
            meta: None,
        }),
    )
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::OK,
        Json(SuccessOne {
            success: true,
            data,
            meta: None,
        }),
    )
}

pub fn success_one_with_meta<T: Serialize>(
    data: T,
    meta: serde_json::Value,
) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::OK,
        Json(SuccessOne {
            success: true,
            data,
            meta: Some(meta),
        }),
    )
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            success: true,
            data,
            meta: MetaCount { count },
        }),
    )
}

pub fn success_message(message: impl Into<String>) -> (StatusCode, Json<SuccessMessage>) {
    (
        StatusCode::OK,
        Json(SuccessMessage {
            success: true,
            message: message.into(),
        }),
    )
}

pub fn error_body(message: &str) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "message": message
    })
}
