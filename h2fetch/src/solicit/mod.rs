//! The module implements the framing layer of HTTP/2 and the client protocol engine.

use crate::solicit::frame::HttpSettings;

pub(crate) mod closed_streams;
pub mod error_code;
pub mod frame;
pub mod header;
pub mod session;
pub mod stream_id;
pub(crate) mod window_size;

/// Client connection preface, RFC 7540 section 3.5.
pub const PREFACE: &'static [u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Default settings.
// 6.5.2 Defined SETTINGS Parameters
pub const DEFAULT_SETTINGS: HttpSettings = HttpSettings {
    header_table_size: 4_096,
    enable_push: true,
    max_concurrent_streams: u32::MAX,
    initial_window_size: window_size::DEFAULT_WINDOW_SIZE,
    max_frame_size: 16_384,
    max_header_list_size: u32::MAX,
};

/// The only protocol identifier offered during ALPN.
pub const ALPN_H2: &'static [u8] = b"h2";

/// An enum representing the two possible HTTP schemes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HttpScheme {
    /// The variant corresponding to `http://`
    Http,
    /// The variant corresponding to `https://`
    Https,
}

impl HttpScheme {
    pub fn from_str(scheme: &str) -> Option<HttpScheme> {
        match scheme {
            "http" => Some(HttpScheme::Http),
            "https" => Some(HttpScheme::Https),
            _ => None,
        }
    }

    /// Returns a byte string representing the scheme.
    #[inline]
    pub fn as_bytes(&self) -> &'static [u8] {
        match *self {
            HttpScheme::Http => b"http",
            HttpScheme::Https => b"https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match *self {
            HttpScheme::Http => 80,
            HttpScheme::Https => 443,
        }
    }
}

#[cfg(test)]
pub mod tests;
