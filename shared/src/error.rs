use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use lambda_http::{http::StatusCode, Body, Response};
use thiserror::Error;

use crate::responses;
use crate::types::OrderStatus;

/// Every failure a handler can report to a client
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Cart is empty")]
    EmptyCart,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidTransition { .. } | ApiError::EmptyCart => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as a `{success: false, message}` envelope. Server-side details stay in the logs.
    pub fn into_response(self) -> Response<Body> {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Something went wrong!".to_string()
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
            self.to_string()
        };

        responses::json(
            status,
            &serde_json::json!({ "success": false, "message": message }),
        )
    }
}

impl<E, R> From<SdkError<E, R>> for ApiError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn from(err: SdkError<E, R>) -> Self {
        ApiError::Database(DisplayErrorContext(&err).to_string())
    }
}

impl From<aws_sdk_dynamodb::error::BuildError> for ApiError {
    fn from(err: aws_sdk_dynamodb::error::BuildError) -> Self {
        ApiError::Internal(format!("Failed to build request: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Validation("x".into()).status(), 400);
        assert_eq!(ApiError::EmptyCart.status(), 400);
        assert_eq!(
            ApiError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending
            }
            .status(),
            400
        );
        assert_eq!(ApiError::Unauthorized("x".into()).status(), 401);
        assert_eq!(ApiError::Forbidden("x".into()).status(), 403);
        assert_eq!(ApiError::NotFound("x".into()).status(), 404);
        assert_eq!(ApiError::Conflict("x".into()).status(), 409);
        assert_eq!(ApiError::Database("x".into()).status(), 500);
    }

    #[test]
    fn test_client_errors_keep_their_message() {
        let response = ApiError::NotFound("Food item not found".into()).into_response();
        assert_eq!(response.status(), 404);
        let body = body_json(&response);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Food item not found");
    }

    #[test]
    fn test_server_errors_hide_details() {
        let response = ApiError::Database("ResourceNotFoundException: table xyz".into()).into_response();
        assert_eq!(response.status(), 500);
        assert_eq!(body_json(&response)["message"], "Something went wrong!");
    }

    #[test]
    fn test_transition_message() {
        let err = ApiError::InvalidTransition {
            from: OrderStatus::Ready,
            to: OrderStatus::Preparing,
        };
        assert_eq!(err.to_string(), "Cannot change order status from ready to preparing");
    }
}
