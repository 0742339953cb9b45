use std::error::Error as StdError;
use std::fmt;

use crate::sync::remote::ApiError;

/// User-facing classification of a failed remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    Forbidden,
    Unauthorized,
    NotFound,
    ConnectionRefused,
    HostNotFound,
    Timeout,
    InvalidUrl(String),
    Other(String),
}

impl SyncFailure {
    pub fn is_authorization(&self) -> bool {
        matches!(self, SyncFailure::Forbidden | SyncFailure::Unauthorized)
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncFailure::Forbidden => {
                f.write_str("You do not have permission to perform this operation on the server")
            }
            SyncFailure::Unauthorized => f.write_str("Invalid authorization token"),
            SyncFailure::NotFound => f.write_str("Server or event not found"),
            SyncFailure::ConnectionRefused => f.write_str(
                "Could not connect to the server. Check the URL and that the server is running",
            ),
            SyncFailure::HostNotFound => f.write_str("Server not found. Check the URL"),
            SyncFailure::Timeout => f.write_str("Timed out waiting for the server"),
            SyncFailure::InvalidUrl(url) => write!(f, "Invalid server URL '{}'", url),
            SyncFailure::Other(message) => f.write_str(message),
        }
    }
}

impl From<ApiError> for SyncFailure {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Forbidden => SyncFailure::Forbidden,
            ApiError::AuthenticationFailed => SyncFailure::Unauthorized,
            ApiError::NotFound(_) => SyncFailure::NotFound,
            ApiError::HttpError(e) => classify_transport(&e),
            ApiError::RequestError(message) | ApiError::UnrecognizedBody(message) => {
                classify_message(&message)
            }
        }
    }
}

pub fn classify_transport(error: &reqwest::Error) -> SyncFailure {
    if error.is_timeout() {
        return SyncFailure::Timeout;
    }

    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    classify_message(&message)
}

/// Unclassified messages pass through verbatim.
pub fn classify_message(message: &str) -> SyncFailure {
    let lowered = message.to_lowercase();

    if lowered.contains("connection refused") {
        SyncFailure::ConnectionRefused
    } else if lowered.contains("host not found")
        || lowered.contains("dns error")
        || lowered.contains("failed to lookup address")
        || lowered.contains("name or service not known")
    {
        SyncFailure::HostNotFound
    } else if lowered.contains("timed out") || lowered.contains("timeout") {
        SyncFailure::Timeout
    } else {
        SyncFailure::Other(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_maps_to_permission_failure() {
        let failure = SyncFailure::from(ApiError::Forbidden);

        assert_eq!(failure, SyncFailure::Forbidden);
        assert!(failure.is_authorization());
        assert!(failure.to_string().contains("permission"));
    }

    #[test]
    fn unauthorized_and_not_found_are_distinguished() {
        assert_eq!(SyncFailure::from(ApiError::AuthenticationFailed), SyncFailure::Unauthorized);
        assert_eq!(
            SyncFailure::from(ApiError::NotFound("e1".to_string())),
            SyncFailure::NotFound
        );
    }

    #[test]
    fn classifies_connection_refused() {
        let failure = classify_message("tcp connect error: Connection refused (os error 111)");
        assert_eq!(failure, SyncFailure::ConnectionRefused);
    }

    #[test]
    fn classifies_host_not_found() {
        assert_eq!(classify_message("Host not found"), SyncFailure::HostNotFound);
        assert_eq!(
            classify_message("dns error: failed to lookup address information"),
            SyncFailure::HostNotFound
        );
    }

    #[test]
    fn classifies_timeout() {
        assert_eq!(classify_message("operation timed out"), SyncFailure::Timeout);
    }

    #[test]
    fn unclassified_message_passes_through() {
        let failure = classify_message("Status 500 Internal Server Error: boom");

        assert_eq!(
            failure,
            SyncFailure::Other("Status 500 Internal Server Error: boom".to_string())
        );
        assert_eq!(failure.to_string(), "Status 500 Internal Server Error: boom");
    }
}
