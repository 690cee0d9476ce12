// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::any::Any;

use axum::{Json, http::HeaderValue, response::IntoResponse};
use serde::Serialize;
use snafu::Snafu;
use strum::EnumProperty;
use tollgate_core::GateError;
use tollgate_error::{ErrorExt, StackError, StatusCode};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code:    StatusCode,
    pub message: String,
    /// Seconds until the quota window resets; only set on quota denials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

#[derive(Debug, Snafu, strum_macros::EnumProperty)]
#[snafu(visibility(pub))]
pub enum ApiError {
    #[snafu(display("Not found: {resource}"))]
    #[strum(props(status_code = "not_found"))]
    NotFound { resource: String },

    #[snafu(display(
        "Download limit reached, resets in {} minute(s)",
        retry_after_seconds.div_ceil(60)
    ))]
    #[strum(props(status_code = "too_many_requests"))]
    QuotaExceeded { retry_after_seconds: u64 },

    #[snafu(display("Internal error"))]
    #[strum(props(status_code = "internal"))]
    Internal,
}

impl ErrorExt for ApiError {
    fn status_code(&self) -> StatusCode {
        self.get_str("status_code")
            .and_then(|value| value.parse().ok())
            .unwrap_or(StatusCode::Unknown)
    }

    fn as_any(&self) -> &dyn Any { self as _ }
}

impl StackError for ApiError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        buf.push(format!("{}: {}", layer, self))
    }

    fn next(&self) -> Option<&dyn StackError> { None }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let retry_after_seconds = match &self {
            Self::QuotaExceeded {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        };
        let body = Json(ErrorBody {
            code: self.status_code(),
            message: self.output_msg(),
            retry_after_seconds,
        });
        let mut response = (self.status_code().http_status(), body).into_response();
        if let Some(seconds) = retry_after_seconds
            && let Ok(value) = HeaderValue::from_str(&seconds.to_string())
        {
            response.headers_mut().insert(http::header::RETRY_AFTER, value);
        }
        response
    }
}

impl From<GateError> for ApiError {
    fn from(error: GateError) -> Self {
        match error {
            GateError::ResourceNotFound { id } => Self::NotFound {
                resource: format!("resource {id}"),
            },
            GateError::FileMissing { path } => Self::NotFound {
                resource: path.display().to_string(),
            },
            GateError::QuotaExceeded { retry_after } => Self::QuotaExceeded {
                retry_after_seconds: retry_after.as_secs().max(0).unsigned_abs(),
            },
            GateError::FileRead { .. } | GateError::LedgerWrite { .. } => Self::Internal,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
