//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use saga::SagaError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The caller may not touch this resource.
    Forbidden(String),
    /// Domain rule violation.
    Domain(DomainError),
    /// Checkout saga error.
    Saga(SagaError),
    /// Storage error.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Saga(err) => saga_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::InvalidStatusTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        DomainError::ItemNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::InvalidQuantity { .. }
        | DomainError::InvalidPrice { .. }
        | DomainError::MissingField(_) => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    match err {
        SagaError::EmptyCart => (StatusCode::BAD_REQUEST, err.to_string()),
        SagaError::InvalidInput(inner) => domain_error_to_response(inner),
        SagaError::ProductNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        SagaError::InsufficientStock { .. } => (StatusCode::CONFLICT, err.to_string()),
        SagaError::PersistenceFailure(ref inner) => {
            tracing::error!(error = %inner, "checkout persistence failure");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        SagaError::DeadlineExceeded { .. } => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match err {
        StoreError::NotFound(msg) => (StatusCode::NOT_FOUND, format!("Not found: {msg}")),
        StoreError::Domain(inner) => domain_error_to_response(inner),
        StoreError::Conflict { .. } => (StatusCode::CONFLICT, err.to_string()),
        StoreError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        other => {
            tracing::error!(error = %other, "store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal storage error".to_string(),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderStatus;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_saga_error_statuses() {
        assert_eq!(status_of(SagaError::EmptyCart.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(
                SagaError::ProductNotFound {
                    product_id: "X".into()
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                SagaError::InsufficientStock {
                    product_id: "X".into(),
                    requested: 2,
                    available: 1,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(SagaError::PersistenceFailure(StoreError::Unavailable("down".into())).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(SagaError::DeadlineExceeded { step: "reserve_stock" }.into()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(SagaError::InvalidInput(DomainError::MissingField("payment_method")).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_domain_and_store_statuses() {
        let transition = DomainError::InvalidStatusTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
        };
        assert_eq!(status_of(transition.clone().into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(StoreError::Domain(transition).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StoreError::NotFound("order".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StoreError::CorruptRow("bad".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::Forbidden("nope".into())),
            StatusCode::FORBIDDEN
        );
    }
}
