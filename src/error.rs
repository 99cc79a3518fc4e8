//! Error types for the public interface of the library.
//!
//! Internally the crate uses `anyhow` (see `Res`) to build up context. At the public boundary an
//! `anyhow::Error` is wrapped in an `Error` that also carries an `ErrorType`, so that callers (the
//! controller in particular) can decide which state to fall back to.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The internal result type. Functions that are not at the public boundary use this.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of failure. Each kind is terminal for the attempt that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// A bad or misplaced URL, a missing API key, or an unreadable config file.
    Configuration,
    /// The camera is unavailable or access was denied.
    Capture,
    /// The inference request failed or returned an empty or non-conforming response.
    Extraction,
    /// The webhook POST failed or was rejected by the receiver.
    Export,
    /// A transition was requested from a state that does not offer it.
    State,
    /// A local filesystem failure.
    Io,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// The public error type: an `ErrorType` plus the `anyhow` context chain.
pub struct Error {
    kind: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub fn new(kind: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            kind,
            inner: inner.into(),
        }
    }

    /// Creates an error from a plain message.
    pub fn msg<S>(kind: ErrorType, message: S) -> Self
    where
        S: Display + Debug + Send + Sync + 'static,
    {
        Self::new(kind, anyhow::Error::msg(message))
    }

    pub fn kind(&self) -> ErrorType {
        self.kind
    }

    /// The outermost message, without the chain of causes.
    pub fn message(&self) -> String {
        self.inner.to_string()
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.kind, self.inner)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:#}", self.kind, self.inner)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// Converts an internal `Res` into a public `Result` by tagging the error with an `ErrorType`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, kind: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for Res<T> {
    fn pub_result(self, kind: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(kind, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_pub_result_keeps_kind_and_context() {
        let res: Res<()> = Err(anyhow::anyhow!("root cause")).context("outer");
        let err = res.pub_result(ErrorType::Export).unwrap_err();
        assert_eq!(err.kind(), ErrorType::Export);
        assert_eq!(err.message(), "outer");
        assert_eq!(err.to_string(), "export error: outer: root cause");
    }

    #[test]
    fn test_error_type_display_and_parse() {
        assert_eq!(ErrorType::Configuration.to_string(), "configuration");
        let parsed: ErrorType = "extraction".parse().unwrap();
        assert_eq!(parsed, ErrorType::Extraction);
    }
}
