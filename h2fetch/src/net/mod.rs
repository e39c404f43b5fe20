pub mod connect;
#[cfg(test)]
pub(crate) mod mock;
pub mod socket;
pub mod tcp;
pub mod tls;
