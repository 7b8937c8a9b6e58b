use std::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The adapter could not be brought up (bad settings, unreachable store).
    Unavailable(String),
    /// Transport failure while talking to the remote store.
    Io(String),
    /// The remote store answered with something the adapter cannot use.
    Protocol(String),
    /// The remote store refused the request.
    Rejected { status: u16, message: String },
}

impl BackendError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        BackendError::Unavailable(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        BackendError::Io(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        BackendError::Protocol(msg.into())
    }

    pub fn rejected(status: u16, msg: impl Into<String>) -> Self {
        BackendError::Rejected {
            status,
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Unavailable(e) => write!(f, "Backend unavailable: {}", e),
            BackendError::Io(e) => write!(f, "IO error: {}", e),
            BackendError::Protocol(e) => write!(f, "Protocol error: {}", e),
            BackendError::Rejected { status, message } => {
                write!(f, "Rejected with status {}: {}", status, message)
            }
        }
    }
}

impl Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}
