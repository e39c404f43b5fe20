use std::path::PathBuf;
use std::time::Duration;

/// Concurrent streams limit advertised to the server.
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 100;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConf {
    /// TCP_NODELAY
    pub no_delay: Option<bool>,
    /// Covers name resolution, TCP connect and TLS handshake.
    pub connect_timeout: Option<Duration>,
    /// Connection is dropped after this long without reading or writing anything.
    pub idle_timeout: Option<Duration>,
    /// `SETTINGS_MAX_CONCURRENT_STREAMS` sent in the initial `SETTINGS`.
    pub max_concurrent_streams: u32,
    /// PEM files with certificates trusted in addition to the web PKI roots.
    pub root_certificates: Vec<PathBuf>,
}

impl Default for ClientConf {
    fn default() -> Self {
        ClientConf {
            no_delay: None,
            connect_timeout: None,
            idle_timeout: None,
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            root_certificates: Vec::new(),
        }
    }
}

impl ClientConf {
    /// Default configuration.
    pub fn new() -> ClientConf {
        Default::default()
    }
}
