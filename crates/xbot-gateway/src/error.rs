//! Gateway error type and its HTTP rendering.

use log::{error, warn};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde::Serialize;
use thiserror::Error;
use xbot_ai::AiError;
use xbot_archive::ArchiveError;

/// Errors surfaced by request handlers and startup wiring.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Ai(#[from] AiError),
    /// The request is missing something the user has to supply.
    #[error("{0}")]
    BadRequest(String),
    /// An optional capability has no configuration.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// JSON body returned for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Message suitable for showing to a chat user.
    pub error: String,
    /// Underlying error text.
    pub detail: String,
}

impl GatewayError {
    pub fn status(&self) -> Status {
        match self {
            Self::Archive(ArchiveError::NotFound(_)) => Status::NotFound,
            Self::Archive(err) if err.is_retryable() => Status::ServiceUnavailable,
            Self::Archive(ArchiveError::NoStorageConfigured) => Status::ServiceUnavailable,
            Self::Archive(_) => Status::InternalServerError,
            Self::Ai(_) => Status::BadGateway,
            Self::BadRequest(_) => Status::BadRequest,
            Self::NotConfigured(_) => Status::NotImplemented,
        }
    }

    /// Apology shown instead of the raw error.
    pub fn apology(&self) -> String {
        match self {
            Self::Archive(ArchiveError::NotFound(_)) => "Nothing stored for this chat yet.".to_string(),
            Self::Archive(_) => "Error retrieving messages. Please try again later.".to_string(),
            Self::Ai(_) => "Error processing your request. Please try again later.".to_string(),
            Self::BadRequest(message) => message.clone(),
            Self::NotConfigured(what) => format!("Sorry, {what} is not available here."),
        }
    }
}

impl<'r> Responder<'r, 'static> for GatewayError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            error!(
                "request failed (method={}, uri={}, status={}, error={})",
                request.method(),
                request.uri(),
                status.code,
                self
            );
        } else {
            warn!(
                "request rejected (method={}, uri={}, status={}, error={})",
                request.method(),
                request.uri(),
                status.code,
                self
            );
        }
        let body = ErrorBody {
            error: self.apology(),
            detail: self.to_string(),
        };
        (status, Json(body)).respond_to(request)
    }
}

#[cfg(test)]
mod tests {
    use super::GatewayError;
    use pretty_assertions::assert_eq;
    use rocket::http::Status;
    use xbot_ai::AiError;
    use xbot_archive::ArchiveError;

    #[test]
    fn statuses_follow_error_kind() {
        let unavailable = GatewayError::from(ArchiveError::StorageUnavailable("down".into()));
        assert_eq!(unavailable.status(), Status::ServiceUnavailable);
        let missing = GatewayError::from(ArchiveError::NotFound("prompt".into()));
        assert_eq!(missing.status(), Status::NotFound);
        let upstream = GatewayError::from(AiError::NoModels);
        assert_eq!(upstream.status(), Status::BadGateway);
        assert_eq!(
            GatewayError::BadRequest("question required".into()).apology(),
            "question required"
        );
    }
}
