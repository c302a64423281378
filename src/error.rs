use std::{fmt, io};

/// Crate-local error type. Handler and pump functions propagate with `?` and
/// only the process entry points turn a terminal error into a printed
/// diagnostic and an exit code.
#[derive(Debug)]
pub enum BridgeError {
    Io(io::Error),
    Http(reqwest::Error),
    /// A condition the pump layer cannot recover from: a 5xx from the
    /// bridge, or a malformed bridge URL.
    Fatal(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Http(err) => write!(f, "{err}"),
            Self::Fatal(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Http(err) => Some(err),
            Self::Fatal(_) => None,
        }
    }
}

impl From<io::Error> for BridgeError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<BridgeError> for io::Error {
    fn from(value: BridgeError) -> Self {
        match value {
            BridgeError::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}
