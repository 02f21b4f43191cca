//! HTTP error responses.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::render::render_error_page;
use crate::template::TemplateEngine;
use crate::FeedhubError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Not found (404).
    NotFound,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

/// Error returned by handlers. Rendered as JSON unless an HTML page was
/// attached with [`ApiError::with_page`].
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    page: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            page: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Render the error as an HTML page. Falls back to JSON when the error
    /// template itself fails.
    pub fn with_page(mut self, engine: &TemplateEngine) -> Self {
        let status = self.code.status_code().as_u16();
        match render_error_page(engine, status, &self.message) {
            Ok(page) => self.page = Some(page),
            Err(e) => tracing::error!("failed to render error page: {}", e),
        }
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        if let Some(page) = self.page {
            return (status, Html(page)).into_response();
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<&FeedhubError> for ApiError {
    fn from(err: &FeedhubError) -> Self {
        match err {
            FeedhubError::NotFound(_) => ApiError::not_found(err.to_string()),
            FeedhubError::Validation(_)
            | FeedhubError::Fetch(_)
            | FeedhubError::Render(_)
            | FeedhubError::Template(_) => ApiError::bad_request(err.to_string()),
            _ => {
                tracing::error!("Internal error: {}", err);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

impl From<FeedhubError> for ApiError {
    fn from(err: FeedhubError) -> Self {
        ApiError::from(&err)
    }
}

/// Cached computations share their error.
impl From<Arc<FeedhubError>> for ApiError {
    fn from(err: Arc<FeedhubError>) -> Self {
        ApiError::from(err.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_error_code_status() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_feedhub_error() {
        let cases = [
            (FeedhubError::NotFound("feed x".into()), ErrorCode::NotFound),
            (FeedhubError::Render("no items".into()), ErrorCode::BadRequest),
            (FeedhubError::Validation("bad".into()), ErrorCode::BadRequest),
            (FeedhubError::Database("locked".into()), ErrorCode::InternalError),
            (FeedhubError::Config("bad".into()), ErrorCode::InternalError),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code(), code);
        }

        let shared = Arc::new(FeedhubError::NotFound("feed y".into()));
        assert_eq!(ApiError::from(shared).code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_internal_message_is_generic() {
        let resp = ApiError::from(FeedhubError::Database("disk I/O error".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(resp).await;
        assert!(body.contains("INTERNAL_ERROR"));
        assert!(!body.contains("disk"));
    }

    #[tokio::test]
    async fn test_json_and_html_bodies() {
        let resp = ApiError::not_found("feed x not found").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "feed x not found");

        let engine = TemplateEngine::with_defaults("").unwrap();
        let resp = ApiError::not_found("feed x not found")
            .with_page(&engine)
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_string(resp).await;
        assert!(body.contains("<h1>Error 404</h1>"));
        assert!(body.contains("feed x not found"));
    }
}
