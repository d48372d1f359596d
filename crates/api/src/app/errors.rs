use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

/// Caller-visible outcome of a rejected gate decision.
///
/// The messages are deliberately coarse: an invalid credential never says
/// whether it was expired, forged or garbled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    #[error("Invalid GraphQL request format")]
    Malformed,

    #[error("Unauthorized: Missing token")]
    MissingCredential,

    #[error("Unauthorized: Invalid token")]
    InvalidCredential,
}

impl GateRejection {
    pub fn status(self) -> StatusCode {
        match self {
            GateRejection::Malformed => StatusCode::BAD_REQUEST,
            GateRejection::MissingCredential | GateRejection::InvalidCredential => {
                StatusCode::UNAUTHORIZED
            }
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> axum::response::Response {
        // Plain text body.
        (self.status(), self.to_string()).into_response()
    }
}

/// Request-level GraphQL failure (no `data` member).
pub fn graphql_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "errors": [{ "message": message.into() }],
        })),
    )
        .into_response()
}
