// Error taxonomy for bet lifecycle operations

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::BetStatus;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum BetError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u64, required: u64 },

    #[error("bet {0} has already been matched")]
    AlreadyMatched(Uuid),

    #[error("not permitted: {0}")]
    Unauthorized(String),

    #[error("authentication required: {0}")]
    Unauthenticated(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("bet {id} cannot move from {from} to {to}")]
    InvalidTransition { id: Uuid, from: BetStatus, to: BetStatus },

    #[error("{0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl BetError {
    pub fn code(&self) -> &'static str {
        match self {
            BetError::InvalidInput(_) => "invalid_input",
            BetError::InsufficientBalance { .. } => "insufficient_balance",
            BetError::AlreadyMatched(_) => "already_matched",
            BetError::Unauthorized(_) => "unauthorized",
            BetError::Unauthenticated(_) => "unauthenticated",
            BetError::NotFound(_) => "not_found",
            BetError::InvalidTransition { .. } => "invalid_transition",
            BetError::Conflict(_) => "conflict",
            BetError::Storage(_) => "storage",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BetError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            BetError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            BetError::AlreadyMatched(_)
            | BetError::InvalidTransition { .. }
            | BetError::Conflict(_) => StatusCode::CONFLICT,
            BetError::Unauthorized(_) => StatusCode::FORBIDDEN,
            BetError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            BetError::NotFound(_) => StatusCode::NOT_FOUND,
            BetError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for BetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => BetError::NotFound(what),
            StoreError::UsernameTaken(name) => {
                BetError::Conflict(format!("username {} is already taken", name))
            }
            StoreError::SubjectTaken(_) => {
                BetError::Conflict("this account already has a profile".into())
            }
            StoreError::StatusMismatch { id, actual, .. } => BetError::InvalidTransition {
                id,
                from: actual,
                to: actual,
            },
            StoreError::NotAParty { bet, profile } => BetError::InvalidInput(format!(
                "profile {} is not a party to bet {}",
                profile, bet
            )),
            StoreError::Shortfall { balance, required, .. } => BetError::InsufficientBalance {
                available: balance,
                required,
            },
            other => BetError::Storage(other),
        }
    }
}

impl IntoResponse for BetError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        }));
        (status, body).into_response()
    }
}
