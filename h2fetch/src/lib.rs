#![deny(broken_intra_doc_links)]

//! Fetch one resource over HTTP/2.
//!
//! A connection carries exactly one `GET` request. Response headers are
//! printed to a diagnostics sink, the body is copied verbatim to a body sink,
//! and the connection is closed with `GOAWAY` once the stream is done.
//!
//! Based on tokio and rustls.

#[macro_use]
extern crate log;

pub use crate::client::cli;
pub use crate::client::conf::ClientConf;
pub use crate::client::driver::run;
pub use crate::client::driver::DriverState;
pub use crate::client::session::SessionContext;
pub use crate::client::session::Teardown;
pub use crate::client::target::StreamDescriptor;
pub use crate::client::transport::CloseReason;
pub use crate::client::transport::TransportEvent;
pub use crate::error::Error;
pub use crate::net::connect::resolve;
pub use crate::net::connect::ConnectFuture;
pub use crate::net::connect::Connector;
pub use crate::net::connect::DefaultConnector;
pub use crate::net::socket::NegotiatedProtocol;
pub use crate::net::socket::SocketStream;
pub use crate::result::Result;
pub use crate::signal::IgnoreSigpipe;
pub use crate::solicit::error_code::ErrorCode;
pub use crate::solicit::header::Header;
pub use crate::solicit::header::Headers;
pub use crate::solicit::stream_id::StreamId;
pub use crate::solicit::HttpScheme;

mod solicit;

mod error;
mod result;

mod client;
mod codec;
mod hpack;

mod assert_types;

pub(crate) mod net;
mod signal;

/// Protocol internals used by tests
#[doc(hidden)]
pub mod for_test {
    pub use crate::codec::write_buffer::WriteBuffer;

    pub mod solicit {
        pub use crate::solicit::*;
    }
    pub mod hpack {
        pub use crate::hpack::*;
    }
}
