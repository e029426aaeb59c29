//! API error surface.
//!
//! Every failure renders as `{"error": {"code", "message"}}` with a status
//! code matching the error taxonomy: admission rejections are client
//! errors reported synchronously, store corruption is a 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown run or project.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed or unacceptable request body.
    #[error("{0}")]
    InvalidRequest(String),

    /// No ready upstream data source for the project.
    #[error("project {project_id} has no ready data sources")]
    NoDataSources {
        /// Project that failed the precondition.
        project_id: String,
    },

    /// Monthly token budget exhausted at run admission.
    #[error("monthly token budget exhausted for {tenant_id}: {usage} used of {limit}")]
    BudgetExhausted {
        /// Tenant whose budget is exhausted.
        tenant_id: String,
        /// Current monthly usage.
        usage: u64,
        /// Monthly limit.
        limit: u64,
    },

    /// The server is at its concurrent-run ceiling.
    #[error("server is at its concurrent run limit")]
    ServerBusy,

    /// Anything else.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NoDataSources { .. } => StatusCode::CONFLICT,
            Self::BudgetExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ServerBusy => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::NoDataSources { .. } => "no_data_sources",
            Self::BudgetExhausted { .. } => "budget_exhausted",
            Self::ServerBusy => "server_busy",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref detail) = self {
            error!(%detail, "internal error");
        }
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<sift_store::StoreError> for ApiError {
    fn from(err: sift_store::StoreError) -> Self {
        match err {
            sift_store::StoreError::RunNotFound(_) => Self::NotFound("run"),
            other => Self::Internal(other.to_string()),
        }
    }
}
