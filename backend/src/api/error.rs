//! Server error payloads.
//!
//! Handlers answer unexpected failures with `{error, requestId}` so end
//! users can quote a correlation id to support. Internal messages never
//! reach the client.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::middleware::correlation::RequestId;
use crate::X_REQUEST_ID_HEADER;

/// Generic JSON error body carrying the correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Client-safe error description.
    #[schema(example = "Internal Server Error")]
    pub error: String,
    /// Correlation identifier for support.
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    #[schema(example = "5f8dd9a1-5e6c-4f6b-9f11-9d6b3a3c9f10")]
    pub request_id: Option<String>,
}

impl ErrorBody {
    /// The generic internal-failure body.
    #[must_use]
    pub fn internal(request_id: Option<String>) -> Self {
        Self {
            error: "Internal Server Error".to_owned(),
            request_id,
        }
    }
}

/// Internal handler failure.
///
/// Captures the ambient correlation id at construction so the rendered
/// response and header stay correlated with the request's log events.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ServerError {
    message: String,
    request_id: Option<String>,
}

impl ServerError {
    /// Wrap an internal failure message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            request_id: RequestId::current().map(|id| id.to_string()),
        }
    }

    /// Correlation id captured at construction, if one was in scope.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = &self.request_id {
            builder.insert_header((X_REQUEST_ID_HEADER, id.clone()));
        }
        // The internal message stays in the logs.
        builder.json(ErrorBody::internal(self.request_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[tokio::test]
    async fn response_redacts_the_message_and_carries_the_request_id() {
        let error = RequestId::scope(RequestId::from("req-9"), async {
            ServerError::internal("database exploded")
        })
        .await;
        assert_eq!(error.request_id(), Some("req-9"));

        let response = error.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response
                .headers()
                .get(X_REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some("req-9")
        );

        let bytes = to_bytes(response.into_body())
            .await
            .expect("reading response body succeeds");
        let body: ErrorBody = serde_json::from_slice(&bytes).expect("body is json");
        assert_eq!(body.error, "Internal Server Error");
        assert_eq!(body.request_id.as_deref(), Some("req-9"));
    }

    #[test]
    fn request_id_is_absent_out_of_scope() {
        let error = ServerError::internal("boom");
        assert_eq!(error.request_id(), None);
        assert_eq!(error.to_string(), "boom");
    }
}
