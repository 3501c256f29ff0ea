/// Failures of the HTTP exchange with the agent service.
///
/// These are fatal to the submission that produced them and are never
/// retried. The `Display` text is what ends up in the output panel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The service refused the cross-origin request.
    #[error("cross-origin access was rejected (status {status}), check the server CORS configuration")]
    CrossOrigin { status: u16 },
    /// The endpoint does not accept `POST`.
    #[error("request method not allowed, confirm the endpoint supports POST")]
    MethodNotAllowed,
    /// Nothing is served at the configured URL.
    #[error("agent endpoint not found at {url}")]
    NotFound { url: String },
    /// Any other non-success status, passed through as reported.
    #[error("HTTP error: {status} {reason}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    /// The response carried no streaming body.
    #[error("response does not contain stream data")]
    NoStream,
    /// The request could not be sent.
    #[error("request failed: {0}")]
    Request(String),
    /// Reading the response body failed part way through.
    #[error("stream read failed: {0}")]
    Read(String),
}

impl TransportError {
    /// Classifies a non-success status into the known causes.
    pub fn from_status(status: u16, reason: impl Into<String>, url: &str, body: String) -> Self {
        match status {
            403 => Self::CrossOrigin { status },
            404 => Self::NotFound {
                url: url.to_string(),
            },
            405 => Self::MethodNotAllowed,
            204 => Self::NoStream,
            _ => Self::Status {
                status,
                reason: reason.into(),
                body,
            },
        }
    }

    /// Returns the HTTP status behind this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::CrossOrigin { status } | Self::Status { status, .. } => Some(*status),
            Self::MethodNotAllowed => Some(405),
            Self::NotFound { .. } => Some(404),
            Self::NoStream | Self::Request(_) | Self::Read(_) => None,
        }
    }
}

/// Top-level error returned by [`crate::AgentClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The submitted input was rejected before any request was made.
    #[error("validation error: {0}")]
    Validation(String),
    /// The exchange with the agent service failed.
    #[error(transparent)]
    Transport(TransportError),
}

impl From<TransportError> for ClientError {
    fn from(value: TransportError) -> Self {
        ClientError::Transport(value)
    }
}
