use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::aggregates::OrderError;
use crate::forms::{FormErrors, NON_FIELD_ERRORS};
use crate::payments::PaymentError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    /// Rendered as `422 {"errors": {...}}`.
    #[error("Validation failed")]
    Validation(FormErrors),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Store(StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FormErrors::single(field, message))
    }

    pub fn internal(msg: impl Into<String>) -> Self { Self::Internal(msg.into()) }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Payment(PaymentError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Payment(PaymentError::InvalidAmount(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Payment(PaymentError::InvalidWebhook(_)) => StatusCode::BAD_REQUEST,
            Self::Payment(PaymentError::Gateway(_)) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Conflict(_) => "CONFLICT",
            Self::Payment(PaymentError::NotConfigured) => "PAYMENTS_DISABLED",
            Self::Payment(_) => "PAYMENT_ERROR",
            Self::Store(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Store(other),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::AlreadyComplete => Self::Conflict(err.to_string()),
            OrderError::NoItems => Self::NotFound(err.to_string()),
            OrderError::VariantRequired => Self::invalid("variant_id", err.to_string()),
            OrderError::UnknownVariant => Self::NotFound(err.to_string()),
            OrderError::Coupon(e) => Self::invalid("code", e.to_string()),
            OrderError::MissingFulfilment => Self::invalid(NON_FIELD_ERRORS, err.to_string()),
        }
    }
}

/// Unreadable or non-JSON bodies are reported like any other invalid form.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self { Self::invalid(NON_FIELD_ERRORS, rejection.body_text()) }
}

impl From<FormErrors> for ApiError {
    fn from(errors: FormErrors) -> Self { Self::Validation(errors) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorEnvelope<'a> {
            error: ErrorBody<'a>,
        }

        #[derive(Serialize)]
        struct ErrorBody<'a> {
            code: &'a str,
            message: String,
        }

        #[derive(Serialize)]
        struct ValidationEnvelope<'a> {
            errors: &'a FormErrors,
        }

        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        if let Self::Validation(errors) = &self {
            return (status, Json(ValidationEnvelope { errors })).into_response();
        }

        // Server-side details stay in the logs.
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => status.canonical_reason().unwrap_or("Error").to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorEnvelope { error: ErrorBody { code: self.public_code(), message } })).into_response()
    }
}
