//! Connector whose sockets claim a fixed ALPN result, for negotiation tests
//! without certificates.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::ReadBuf;
use tokio::net::TcpStream;

use h2fetch::ConnectFuture;
use h2fetch::Connector;
use h2fetch::HttpScheme;
use h2fetch::NegotiatedProtocol;
use h2fetch::SocketStream;

/// Plain TCP socket reporting `protocol` as negotiated.
#[derive(Debug)]
pub struct AlpnSocket {
    tcp: TcpStream,
    protocol: NegotiatedProtocol,
}

impl AsyncRead for AlpnSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.tcp).poll_read(cx, buf)
    }
}

impl AsyncWrite for AlpnSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.tcp).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.tcp).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.tcp).poll_shutdown(cx)
    }
}

impl SocketStream for AlpnSocket {
    fn is_tcp(&self) -> bool {
        true
    }

    fn set_tcp_nodelay(&self, no_delay: bool) -> io::Result<()> {
        self.tcp.set_nodelay(no_delay)
    }

    fn negotiated_protocol(&self) -> NegotiatedProtocol {
        self.protocol.clone()
    }
}

/// Connects over plain TCP and pretends ALPN selected `protocol`.
pub struct AlpnConnector {
    pub protocol: NegotiatedProtocol,
}

impl AlpnConnector {
    pub fn http11() -> AlpnConnector {
        AlpnConnector {
            protocol: NegotiatedProtocol::Alpn(Some(b"http/1.1".to_vec())),
        }
    }

    pub fn h2() -> AlpnConnector {
        AlpnConnector {
            protocol: NegotiatedProtocol::Alpn(Some(b"h2".to_vec())),
        }
    }
}

impl Connector for AlpnConnector {
    fn connect<'a>(
        &'a self,
        addrs: &'a [SocketAddr],
        _scheme: HttpScheme,
        _host: &'a str,
    ) -> ConnectFuture<'a> {
        Box::pin(async move {
            let tcp = TcpStream::connect(addrs).await?;
            Ok(Box::new(AlpnSocket {
                tcp,
                protocol: self.protocol.clone(),
            }) as Box<dyn SocketStream>)
        })
    }
}
