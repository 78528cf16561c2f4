use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::deposits::DepositError;
use crate::execution::TradeError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gone: {0}")]
    Gone(String),

    /// A well-formed request the business rules refuse. `details` carries
    /// machine-readable hints such as a suggested maximum amount.
    #[error("Unprocessable: {message}")]
    Unprocessable {
        message: String,
        details: Option<Value>,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".into(), None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::Gone(msg) => (StatusCode::GONE, msg, None),
            AppError::Unprocessable { message, details } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, details)
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
                details,
            }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<TradeError> for AppError {
    fn from(e: TradeError) -> Self {
        let message = e.to_string();
        match e {
            TradeError::MarketNotFound(_) | TradeError::UserNotFound(_) => AppError::NotFound(message),
            TradeError::MarketInactive(_) => AppError::Conflict(message),
            TradeError::InvalidOutcome(_) | TradeError::InvalidAmount(_) => {
                AppError::BadRequest(message)
            }
            TradeError::InsufficientLiquidity {
                requested,
                suggested_max,
            } => AppError::Unprocessable {
                message,
                details: Some(json!({
                    "requested": requested,
                    "suggested_max": suggested_max,
                })),
            },
            TradeError::TradeTooLarge {
                requested,
                available,
            } => AppError::Unprocessable {
                message,
                details: Some(json!({
                    "requested_shares": requested,
                    "available_shares": available,
                })),
            },
            TradeError::InsufficientBalance { .. } | TradeError::InsufficientShares { .. } => {
                AppError::Unprocessable {
                    message,
                    details: None,
                }
            }
            TradeError::MarketShapeMismatch(_) => AppError::Internal(anyhow::anyhow!(message)),
            TradeError::Database(e) => AppError::Internal(e.into()),
            TradeError::Internal(e) => AppError::Internal(e),
        }
    }
}

impl From<DepositError> for AppError {
    fn from(e: DepositError) -> Self {
        let message = e.to_string();
        match e {
            DepositError::TransactionNotFound(_) | DepositError::UserNotFound(_) => {
                AppError::NotFound(message)
            }
            DepositError::TransactionExpired(_) => AppError::Gone(message),
            DepositError::InvalidTransition { .. } => AppError::Conflict(message),
            DepositError::NotAssignedAgent(_) => AppError::Forbidden(message),
            DepositError::InvalidAmount(_) => AppError::BadRequest(message),
            DepositError::NoAgentAvailable(_) | DepositError::InsufficientBalance { .. } => {
                AppError::Unprocessable {
                    message,
                    details: None,
                }
            }
            DepositError::Database(e) => AppError::Internal(e.into()),
            DepositError::Internal(e) => AppError::Internal(e),
        }
    }
}
