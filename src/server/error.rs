//! Maps [`VatError`] to JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::core::VatError;

/// Error returned by the `/eu-vat` handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Vat(#[from] VatError),

    /// Malformed request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A value could not be rendered in the response.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Vat(e) => match e {
                VatError::NotEuCountry(_) => StatusCode::NOT_FOUND,
                VatError::VatNumberTooShort(_)
                | VatError::UnsupportedCurrency(_)
                | VatError::AmountOutOfRange(_) => StatusCode::BAD_REQUEST,
                VatError::RateUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                VatError::RateService { .. } => StatusCode::SERVICE_UNAVAILABLE,
                VatError::Registry(_)
                | VatError::ExchangeRates(_)
                | VatError::ExchangeRateUnavailable(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, axum::Json(body)).into_response()
    }
}
