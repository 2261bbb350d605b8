//! Error types shared by the stream consumer and the provisioning client.
use thiserror::Error;

/// Faults reported while consuming a machine log stream.
///
/// Every variant is terminal for the session that produced it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("target identifier must not be empty")]
    EmptyTarget,
    #[error("invalid stream endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("stream connection failed: {0}")]
    Connection(String),
    #[error("stream endpoint responded with status {0}")]
    Status(u16),
    #[error("stream closed by the server")]
    Ended,
}

/// Errors returned by the provisioning, catalog and search clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{message} (status {status})")]
    Status { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("No custom nodes found in the uploaded workflow file")]
    NoCustomNodes,
}

impl ApiError {
    /// Status code and message to report to an HTTP caller, mirroring the
    /// upstream status when one is known.
    pub fn client_facing(&self, fallback: &str) -> (u16, String) {
        match self {
            ApiError::Status { status, message } => (*status, message.clone()),
            ApiError::NoCustomNodes => (400, self.to_string()),
            _ => (500, fallback.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_preserved() {
        let err = ApiError::Status {
            status: 404,
            message: "Unable to delete app".into(),
        };
        assert_eq!(err.client_facing("x"), (404, "Unable to delete app".into()));
    }

    #[test]
    fn transport_failures_fall_back_to_500() {
        let err = ApiError::NotConfigured("APP_BUILDER_API_BASE_URL");
        assert_eq!(
            err.client_facing("Unable to fetch list of apps"),
            (500, "Unable to fetch list of apps".into())
        );
    }
}
