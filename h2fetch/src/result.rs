use crate::error;

/// A convenience `Result` type that has the `Error` as the error type.
pub type Result<T> = ::std::result::Result<T, error::Error>;
