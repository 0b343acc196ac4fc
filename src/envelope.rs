use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Uniform `{status, data, message}` body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: Status,
    pub data: Option<T>,
    pub message: Option<T>,
}

impl<T> Envelope<T> {
    /// Routes `payload` into `data` on success and into `message` on error, never both.
    pub fn new(status: Status, payload: T) -> Self {
        match status {
            Status::Success => Self {
                status,
                data: Some(payload),
                message: None,
            },
            Status::Error => Self {
                status,
                data: None,
                message: Some(payload),
            },
        }
    }
}

pub fn render<T: Serialize>(code: StatusCode, status: Status, payload: T) -> Response {
    (code, Json(Envelope::new(status, payload))).into_response()
}

pub fn success<T: Serialize>(code: StatusCode, payload: T) -> Response {
    render(code, Status::Success, payload)
}

pub fn error(code: StatusCode, message: impl Into<String>) -> Response {
    render(code, Status::Error, message.into())
}
