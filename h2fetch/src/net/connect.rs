use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use tokio_rustls::TlsConnector;

use crate::client::conf::ClientConf;
use crate::net::socket::SocketStream;
use crate::net::tcp;
use crate::net::tls;
use crate::solicit::HttpScheme;

pub type ConnectFuture<'a> =
    Pin<Box<dyn Future<Output = crate::Result<Box<dyn SocketStream>>> + Send + 'a>>;

/// Opens the transport a session runs over.
pub trait Connector: Send + Sync {
    /// Connect to one of resolved `addrs` of `host`.
    fn connect<'a>(
        &'a self,
        addrs: &'a [SocketAddr],
        scheme: HttpScheme,
        host: &'a str,
    ) -> ConnectFuture<'a>;
}

/// Resolve `host` with the system resolver.
pub async fn resolve(host: &str, port: u16) -> crate::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port)).await?.collect();
    debug!("{} resolved to {:?}", host, addrs);
    if addrs.is_empty() {
        return Err(crate::Error::AddrResolvedToEmptyList);
    }
    Ok(addrs)
}

/// TCP for `http`, TLS with ALPN `h2` over TCP for `https`.
#[derive(Clone)]
pub struct DefaultConnector {
    tls: TlsConnector,
}

impl DefaultConnector {
    pub fn new(conf: &ClientConf) -> crate::Result<DefaultConnector> {
        let config = tls::client_config(&conf.root_certificates)?;
        Ok(DefaultConnector {
            tls: TlsConnector::from(Arc::new(config)),
        })
    }
}

impl Connector for DefaultConnector {
    fn connect<'a>(
        &'a self,
        addrs: &'a [SocketAddr],
        scheme: HttpScheme,
        host: &'a str,
    ) -> ConnectFuture<'a> {
        Box::pin(async move {
            let tcp = tcp::connect_any(addrs).await?;
            match scheme {
                HttpScheme::Http => Ok(Box::new(tcp) as Box<dyn SocketStream>),
                HttpScheme::Https => {
                    let tls = tls::handshake(&self.tls, host, tcp).await?;
                    Ok(Box::new(tls) as Box<dyn SocketStream>)
                }
            }
        })
    }
}
