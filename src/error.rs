use std::collections::BTreeMap;

use thiserror::Error;

/// Failure of a call against the remote API.
///
/// `Unauthorized` is the one variant with an effect beyond its caller: it
/// always routes through the session expiry path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("session expired or token rejected")]
    Unauthorized,

    #[error("record not found")]
    NotFound,

    #[error("rejected by server: {message}")]
    ValidationRejected {
        message: String,
        fields: BTreeMap<String, String>,
    },

    #[error("network or server error: {0}")]
    NetworkOrServer(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Text for a banner or inline form message. `fallback` covers the
    /// catch-all case, where the transport detail is not for the user.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Unauthorized => "Session expired. Please log in again.".to_string(),
            ApiError::NotFound => "The requested record no longer exists.".to_string(),
            ApiError::ValidationRejected { message, fields } => {
                if fields.is_empty() {
                    message.clone()
                } else {
                    let details: Vec<String> = fields
                        .iter()
                        .map(|(field, reason)| format!("{}: {}", field, reason))
                        .collect();
                    format!("{} ({})", message, details.join("; "))
                }
            }
            ApiError::NetworkOrServer(_) => fallback.to_string(),
        }
    }
}
