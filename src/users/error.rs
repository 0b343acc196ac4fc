use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::envelope;
use crate::users::validation::ValidationErrors;

pub const NOT_FOUND_MESSAGE: &str = "User not found";
pub const DUPLICATE_EMAIL_MESSAGE: &str = "The email has already been taken.";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("{1}")]
    MalformedBody(StatusCode, String),

    #[error("The email has already been taken.")]
    DuplicateEmail,

    #[error("The given data was invalid.")]
    Validation(ValidationErrors),

    #[error("password hashing error: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

pub type UserResult<T> = Result<T, UserError>;

impl UserError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserError::NotFound => StatusCode::NOT_FOUND,
            UserError::MalformedBody(status, _) => *status,
            UserError::DuplicateEmail | UserError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            UserError::PasswordHash(_) | UserError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn validation_response(errors: &ValidationErrors) -> Response {
    let message = errors
        .first_message()
        .unwrap_or("The given data was invalid.")
        .to_string();
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "message": message,
            "errors": errors,
        })),
    )
        .into_response()
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            UserError::NotFound => envelope::error(status, NOT_FOUND_MESSAGE),
            UserError::MalformedBody(_, message) => envelope::error(status, message.clone()),
            UserError::DuplicateEmail => {
                validation_response(&ValidationErrors::single("email", DUPLICATE_EMAIL_MESSAGE))
            }
            UserError::Validation(errors) => validation_response(errors),
            UserError::PasswordHash(_) | UserError::Store(_) => {
                error!(error = %self, "unhandled user error");
                envelope::error(status, "Server Error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_matches_envelope_text() {
        assert_eq!(UserError::NotFound.to_string(), NOT_FOUND_MESSAGE);
        assert_eq!(UserError::NotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_failures_map_to_422() {
        assert_eq!(
            UserError::DuplicateEmail.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        let errors = ValidationErrors::single("name", "The name field is required.");
        assert_eq!(
            UserError::Validation(errors).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn malformed_body_keeps_its_status() {
        let err = UserError::MalformedBody(StatusCode::BAD_REQUEST, "bad json".into());
        assert_eq!(err.to_string(), "bad json");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = UserError::Store(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
