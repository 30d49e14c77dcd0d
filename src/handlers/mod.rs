// handlers/mod.rs - HTTP handlers grouped by who may call them
//
// public/     token acquisition, no authentication
// protected/  any authenticated user
// admin/      role == admin
// teacher     role == teacher, self-service and assigned courses
// student     role == student, self-service and enrollments
//
// Handlers stay thin: extract, call a service, shape the response.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::Json;

use crate::error::ApiError;

pub mod admin;
pub mod protected;
pub mod public;
pub mod student;
pub mod teacher;

/// Unwrap a JSON body, reporting malformed input in the API error envelope
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Unparseable identifiers are treated as missing records
pub(crate) fn path_param<T>(path: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    path.map(|Path(value)| value)
        .map_err(|_| ApiError::not_found("Not found."))
}

pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}
