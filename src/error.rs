//! Error types shared by the pricing core, collaborators and handlers.
use lambda_http::{Body, Response};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::http::error_response;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed price, quantity or required field.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Discount {discount} exceeds the offer total {total}")]
    DiscountExceedsTotal { discount: Decimal, total: Decimal },

    /// Image, logo, font or counter failure. Callers usually log and degrade.
    #[error("{0}")]
    ExternalResource(String),

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Render(String),

    #[error("{0}")]
    Email(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl AppError {
    pub fn invalid(details: impl Into<String>) -> Self {
        AppError::InvalidInput(details.into())
    }

    pub fn status(&self) -> u16 {
        match self {
            AppError::InvalidInput(_) => 400,
            AppError::DiscountExceedsTotal { .. } => 422,
            AppError::ExternalResource(_) | AppError::Email(_) => 502,
            AppError::Configuration(_) | AppError::Render(_) | AppError::Template(_) => 500,
        }
    }

    /// Build the JSON error envelope returned to the caller.
    pub fn to_response(&self) -> Response<Body> {
        let details = self.to_string();
        match self {
            AppError::InvalidInput(_) => error_response(self.status(), "Invalid input", &details, None),
            AppError::DiscountExceedsTotal { .. } => error_response(
                self.status(),
                "Discount exceeds total",
                &details,
                Some("Lower the discount or enable clampToZero"),
            ),
            AppError::ExternalResource(_) => error_response(self.status(), "External resource error", &details, None),
            AppError::Configuration(_) => error_response(self.status(), "Configuration error", &details, None),
            AppError::Render(_) => error_response(self.status(), "Document generation failed", &details, None),
            AppError::Template(_) => error_response(self.status(), "Email generation failed", &details, None),
            AppError::Email(_) => error_response(
                self.status(),
                "Email delivery failed",
                &details,
                Some("Check the SMTP settings of the function"),
            ),
        }
    }
}
