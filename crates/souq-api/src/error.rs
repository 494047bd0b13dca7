use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Tagged error taxonomy carried from the handlers to the HTTP boundary.
/// Each variant maps to exactly one status code, so clients switch on
/// the `error` tag instead of matching message substrings.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid or expired verification code")]
    InvalidOtp,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing or invalid authorization")]
    Unauthorized,

    #[error("Email address is not verified yet")]
    EmailNotVerified,

    #[error("This account has been deactivated")]
    AccountDisabled,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("An account with this email is already registered")]
    EmailTaken,

    #[error("You have already applied to this campaign")]
    AlreadyApplied,

    #[error("This campaign is not accepting applications")]
    CampaignNotOpen,

    #[error("Invalid status transition")]
    InvalidTransition,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("Webhook signature verification failed")]
    InvalidSignature,

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::InvalidOtp | Self::InvalidCredentials | Self::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            Self::EmailNotVerified | Self::AccountDisabled | Self::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::EmailTaken
            | Self::AlreadyApplied
            | Self::CampaignNotOpen
            | Self::InvalidTransition
            | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable tag for clients.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidOtp => "invalid_otp",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthorized => "unauthorized",
            Self::EmailNotVerified => "email_not_verified",
            Self::AccountDisabled => "account_disabled",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::EmailTaken => "email_taken",
            Self::AlreadyApplied => "already_applied",
            Self::CampaignNotOpen => "campaign_not_open",
            Self::InvalidTransition => "invalid_transition",
            Self::Conflict(_) => "conflict",
            Self::InvalidSignature => "invalid_signature",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            // Detail stays in the logs, never in the response body
            error!("internal error: {:#}", e);
        }

        let body = json!({
            "error": self.tag(),
            "message": self.to_string(),
        });

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_409_not_500() {
        assert_eq!(ApiError::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::AlreadyApplied.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::InvalidTransition.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_errors_split_401_and_403() {
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidOtp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::EmailNotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Forbidden("nope").status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn webhook_signature_failure_is_400() {
        assert_eq!(ApiError::InvalidSignature.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_hides_detail() {
        let err = ApiError::Internal(anyhow::anyhow!("db lock poisoned"));
        assert_eq!(err.to_string(), "Internal error");
        assert_eq!(err.tag(), "internal");
    }
}
