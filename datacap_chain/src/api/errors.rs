//! HTTP error responses of the chain API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use crate::common::Error;

/// A rejected request: status plus a plain-text body.
///
/// Every rejection, whatever its cause, is reported as 403.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn forbidden(message: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.to_string(),
        }
    }

    pub fn method_not_found() -> Self {
        Self::forbidden("method not found")
    }

    pub fn params_not_found() -> Self {
        Self::forbidden("params not found")
    }

    pub fn unsupported_method() -> Self {
        Self::forbidden("unsupported method")
    }

    pub fn decode_params_failed() -> Self {
        Self::forbidden("decode params failed, is it not json format?")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Only the short code crosses the wire; detail stays in the logs.
impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::forbidden(&err.code())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
