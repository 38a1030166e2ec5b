//! Common error types used throughout the crate.

use std::fmt;

/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type covering failures across the index lifecycle.
#[derive(Debug)]
pub enum Error {
    /// A build parameter violated preconditions.
    InvalidArgument(String),
    /// An index file was malformed: bad magic, unsupported version, or a
    /// truncated or misplaced section.
    InvalidFormat(String),
    /// A query hit an internally inconsistent state, e.g. an LF walk that
    /// never reached a sampled row. Indicates a corrupted index or a text
    /// indexed without a unique sentinel.
    Corrupted(String),
    /// Wrapper around [`std::io::Error`] values.
    Io(std::io::Error),
}

impl Error {
    /// Creates an [`Error::InvalidArgument`] with the provided message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates an [`Error::InvalidFormat`] with the provided message.
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Creates an [`Error::Corrupted`] with the provided message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "{msg}"),
            Error::InvalidFormat(msg) => write!(f, "invalid index: {msg}"),
            Error::Corrupted(msg) => write!(f, "corrupted index: {msg}"),
            Error::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidArgument(_) | Error::InvalidFormat(_) | Error::Corrupted(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes() {
        assert_eq!(
            Error::invalid_argument("stride must be at least 1").to_string(),
            "stride must be at least 1"
        );
        assert_eq!(
            Error::invalid_format("bad magic").to_string(),
            "invalid index: bad magic"
        );
        assert!(Error::corrupted("LF walk overran the text")
            .to_string()
            .starts_with("corrupted index:"));
    }
}
