use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::{
    envelope,
    state::AppState,
    users::{
        dto::{ListUsersParams, ListUsersQuery, NewUser, UserChanges},
        error::{UserError, UserResult},
        validation::{self, Schema},
    },
};

pub const DELETED_MESSAGE: &str = "User deleted successfully";

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

/// Ids that don't parse can't exist, so they read as a missing user.
fn user_id(path: Result<Path<i64>, PathRejection>) -> UserResult<i64> {
    path.map(|Path(id)| id).map_err(|e| {
        warn!(error = %e, "unparseable user id");
        UserError::NotFound
    })
}

/// Normalizes blanks, runs the schema over a JSON object body, then deserializes it.
fn validated<T: DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
    schema: Schema,
) -> UserResult<T> {
    let Json(mut body) = body.map_err(|e| UserError::MalformedBody(e.status(), e.body_text()))?;
    if !body.is_object() {
        return Err(UserError::MalformedBody(
            StatusCode::UNPROCESSABLE_ENTITY,
            "The request body must be a JSON object.".into(),
        ));
    }
    validation::blank_to_null(schema, &mut body);
    validation::validate(schema, &body).map_err(|errors| {
        warn!(?errors, "validation failed");
        UserError::Validation(errors)
    })?;
    serde_json::from_value(body)
        .map_err(|e| UserError::MalformedBody(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListUsersParams>,
) -> UserResult<Response> {
    let page = state.users.list_users(ListUsersQuery::from(params)).await?;
    Ok(envelope::success(StatusCode::OK, page))
}

#[instrument(skip(state, path))]
pub async fn get_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> UserResult<Response> {
    let id = user_id(path)?;
    let user = state.users.get_user(id).await?;
    Ok(envelope::success(StatusCode::OK, user))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> UserResult<Response> {
    let input: NewUser = validated(body, validation::CREATE_USER)?;
    let user = state.users.create_user(input).await?;
    Ok(envelope::success(StatusCode::CREATED, user))
}

#[instrument(skip(state, path, body))]
pub async fn update_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> UserResult<Response> {
    let id = user_id(path)?;
    let changes: UserChanges = validated(body, validation::UPDATE_USER)?;
    let user = state.users.update_user(id, changes).await?;
    Ok(envelope::success(StatusCode::OK, user))
}

#[instrument(skip(state, path))]
pub async fn delete_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> UserResult<Response> {
    let id = user_id(path)?;
    state.users.delete_user(id).await?;
    Ok(envelope::success(StatusCode::OK, DELETED_MESSAGE))
}
