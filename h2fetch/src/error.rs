use std::io;

use crate::assert_types::*;
use crate::hpack::DecoderError;
use crate::solicit::error_code::ErrorCode;
use crate::solicit::frame::ParseFrameError;

/// An enum representing errors that can arise when fetching a resource over
/// an HTTP/2 connection.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[source] io::Error),
    #[error("TLS error: {0}")]
    TlsError(#[source] rustls::Error),
    #[error("Could not parse URI {0}: {1}")]
    UrlParse(String, #[source] url::ParseError),
    #[error("URI {0} has no host")]
    MissingHost(String),
    #[error("URI {0} has no path")]
    MissingPath(String),
    #[error("Unsupported scheme {0}")]
    UnsupportedScheme(String),
    #[error("Invalid DNS name {0}")]
    InvalidDnsName(String),
    #[error("Could not load certificates from {0}: {1}")]
    CertificateLoad(String, String),
    #[error("Server did not advertise h2")]
    NegotiationFailed,
    #[error("Address resolved to empty list")]
    AddrResolvedToEmptyList,
    #[error("Connection timed out")]
    ConnectionTimeout,
    #[error("Failed to parse frame: {0}")]
    ParseFrameError(ParseFrameError),
    #[error("Header compression error: {0}")]
    CompressionError(#[source] DecoderError),
    #[error("Protocol error {0}: {1}")]
    ProtocolError(ErrorCode, String),
    #[error("Session is closed")]
    SessionClosed,
}

fn _assert_error_sync_send() {
    assert_send::<Error>();
    assert_sync::<Error>();
}

impl Error {
    /// Errors in the command line or the target, detected before connecting.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::UrlParse(..)
            | Error::MissingHost(..)
            | Error::MissingPath(..)
            | Error::UnsupportedScheme(..)
            | Error::InvalidDnsName(..)
            | Error::CertificateLoad(..) => true,
            _ => false,
        }
    }

    pub fn is_negotiation(&self) -> bool {
        match self {
            Error::NegotiationFailed => true,
            _ => false,
        }
    }
}

/// Implement the trait that allows us to automatically convert `io::Error`s
/// into an `Error` by wrapping the given `io::Error` into an `Error::IoError` variant.
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_err: tokio::time::error::Elapsed) -> Error {
        Error::ConnectionTimeout
    }
}

impl From<ParseFrameError> for Error {
    fn from(e: ParseFrameError) -> Self {
        Error::ParseFrameError(e)
    }
}

impl From<DecoderError> for Error {
    fn from(e: DecoderError) -> Self {
        Error::CompressionError(e)
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Error::TlsError(e)
    }
}

impl Into<io::Error> for Error {
    fn into(self) -> io::Error {
        match self {
            Error::IoError(e) => e,
            e => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn categories() {
        assert!(Error::MissingHost("x".to_owned()).is_configuration());
        assert!(!Error::MissingHost("x".to_owned()).is_negotiation());
        assert!(Error::NegotiationFailed.is_negotiation());
        assert!(!Error::ConnectionTimeout.is_configuration());
        assert!(Error::MissingPath("https://example.test".to_owned()).is_configuration());
        assert_eq!(
            "Header compression error: header block truncated",
            Error::from(DecoderError::Truncated).to_string()
        );
    }
}
