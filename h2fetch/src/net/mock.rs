//! In-memory socket for tests.

use std::io;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::DuplexStream;
use tokio::io::ReadBuf;

use crate::net::socket::NegotiatedProtocol;
use crate::net::socket::SocketStream;

#[derive(Debug)]
pub struct MockSocket {
    inner: DuplexStream,
    protocol: NegotiatedProtocol,
}

impl MockSocket {
    /// Socket and the peer end of it.
    pub fn pair(protocol: NegotiatedProtocol) -> (MockSocket, DuplexStream) {
        let (inner, peer) = tokio::io::duplex(64 * 1024);
        (MockSocket { inner, protocol }, peer)
    }
}

impl AsyncRead for MockSocket {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockSocket {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl SocketStream for MockSocket {
    fn is_tcp(&self) -> bool {
        false
    }

    fn set_tcp_nodelay(&self, _no_delay: bool) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "not a TCP socket"))
    }

    fn negotiated_protocol(&self) -> NegotiatedProtocol {
        self.protocol.clone()
    }
}
