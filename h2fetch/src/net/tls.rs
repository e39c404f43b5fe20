use std::convert::TryFrom;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use rustls::RootCertStore;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::net::socket::NegotiatedProtocol;
use crate::net::socket::SocketStream;
use crate::solicit::ALPN_H2;

impl<S: SocketStream> SocketStream for TlsStream<S> {
    fn is_tcp(&self) -> bool {
        self.get_ref().0.is_tcp()
    }

    fn set_tcp_nodelay(&self, no_delay: bool) -> io::Result<()> {
        self.get_ref().0.set_tcp_nodelay(no_delay)
    }

    fn negotiated_protocol(&self) -> NegotiatedProtocol {
        NegotiatedProtocol::Alpn(self.get_ref().1.alpn_protocol().map(|p| p.to_vec()))
    }
}

/// Parse every certificate of a PEM file.
fn load_pem_certificates(path: &Path) -> crate::Result<Vec<CertificateDer<'static>>> {
    let load_error =
        |message: String| crate::Error::CertificateLoad(path.display().to_string(), message);

    let pem = fs::read(path).map_err(|e| load_error(e.to_string()))?;
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| load_error(e.to_string()))?;
    if certs.is_empty() {
        return Err(load_error("no certificates found".to_owned()));
    }
    Ok(certs)
}

/// Client TLS configuration: web PKI roots plus the given PEM files, ALPN `h2`.
pub fn client_config<P: AsRef<Path>>(extra_roots: &[P]) -> crate::Result<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    for path in extra_roots {
        let path = path.as_ref();
        for cert in load_pem_certificates(path)? {
            roots.add(cert).map_err(|e| {
                crate::Error::CertificateLoad(path.display().to_string(), e.to_string())
            })?;
        }
        debug!("added trusted certificates from {}", path.display());
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![ALPN_H2.to_vec()];
    Ok(config)
}

/// Run the TLS handshake over an established stream.
pub async fn handshake<S: SocketStream>(
    connector: &TlsConnector,
    host: &str,
    stream: S,
) -> crate::Result<TlsStream<S>> {
    let server_name = ServerName::try_from(host.to_owned())
        .map_err(|_| crate::Error::InvalidDnsName(host.to_owned()))?;
    let stream = connector.connect(server_name, stream).await?;
    debug!(
        "TLS handshake with {} done, ALPN: {}",
        host,
        stream.negotiated_protocol()
    );
    Ok(stream)
}
