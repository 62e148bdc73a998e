use std::fmt;

/// Error returned by every management API call.
///
/// Collectors treat all variants the same way: the sub-operation that
/// issued the call failed. The variants only matter for log lines.
#[derive(Debug)]
pub enum ClientError {
    /// Connection, TLS, timeout or authentication handshake failure.
    Transport(String),
    /// The API answered with a non-success status.
    Status {
        status: u16,
        path: String,
        body: String,
    },
    /// The response body did not have the expected shape.
    Decode { path: String, message: String },
    /// The HTTP client could not be constructed.
    Build(String),
}

impl ClientError {
    pub(crate) fn decode(path: impl Into<String>, err: impl fmt::Display) -> Self {
        ClientError::Decode {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "transport error: {e}"),
            ClientError::Status { status, path, body } => {
                if body.is_empty() {
                    write!(f, "{path}: HTTP {status}")
                } else {
                    write!(f, "{path}: HTTP {status}: {body}")
                }
            }
            ClientError::Decode { path, message } => {
                write!(f, "{path}: unexpected response: {message}")
            }
            ClientError::Build(e) => write!(f, "failed to build HTTP client: {e}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}
