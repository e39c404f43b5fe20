//! Client for exactly one request per connection.

pub mod cli;
pub(crate) mod conf;
pub(crate) mod driver;
pub(crate) mod session;
pub(crate) mod target;
pub(crate) mod transport;
