use actix_web::http::StatusCode;
use actix_web::{error, HttpRequest, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::AuthError;
use crate::repo::RepoError;

/// Uniform body for errors (`error: true`) and mutation results (`error: false`).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JsonResponse {
    pub error: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
}

impl JsonResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { error: false, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found")] NotFound,
    #[error("unauthorized")] Unauthorized,
    #[error("invalid credentials")] InvalidCredentials,
    #[error("{0}")] Validation(String),
    #[error("service temporarily unavailable")] Unavailable,
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Unavailable(msg) => {
                log::error!("store unavailable: {msg}");
                ApiError::Unavailable
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized => ApiError::Unauthorized,
            AuthError::Unavailable(msg) => {
                log::error!("store unavailable during refresh: {msg}");
                ApiError::Unavailable
            }
            AuthError::Signing(msg) => {
                log::error!("token signing failed: {msg}");
                ApiError::Internal
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(JsonResponse { error: true, message: self.to_string(), data: None })
    }
}

/// Malformed JSON bodies become validation errors in the uniform envelope.
pub fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(format!("invalid request body: {err}")).into()
}

pub fn path_error_handler(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(format!("invalid path parameter: {err}")).into()
}
