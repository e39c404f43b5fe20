use std::fmt;
use std::io;

use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;

use crate::solicit::ALPN_H2;

/// Application protocol agreed on for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiatedProtocol {
    /// Plain TCP, HTTP/2 is assumed without negotiation.
    PriorKnowledge,
    /// Result of TLS ALPN, `None` if the server selected nothing.
    Alpn(Option<Vec<u8>>),
}

impl NegotiatedProtocol {
    /// Whether HTTP/2 may be spoken on the connection.
    pub fn is_h2(&self) -> bool {
        match self {
            NegotiatedProtocol::PriorKnowledge => true,
            NegotiatedProtocol::Alpn(Some(p)) => p.as_slice() == ALPN_H2,
            NegotiatedProtocol::Alpn(None) => false,
        }
    }
}

impl fmt::Display for NegotiatedProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NegotiatedProtocol::PriorKnowledge => write!(f, "prior knowledge"),
            NegotiatedProtocol::Alpn(Some(p)) => write!(f, "{}", String::from_utf8_lossy(p)),
            NegotiatedProtocol::Alpn(None) => write!(f, "no ALPN"),
        }
    }
}

/// TCP stream or TLS over it; basically any async stream usable for http2
pub trait SocketStream: AsyncRead + AsyncWrite + fmt::Debug + Send + Unpin + 'static {
    /// True iff this socket is TCP socket.
    fn is_tcp(&self) -> bool;

    /// Set no delay for TCP socket, return error for non-TCP socket.
    fn set_tcp_nodelay(&self, no_delay: bool) -> io::Result<()>;

    fn negotiated_protocol(&self) -> NegotiatedProtocol;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn is_h2() {
        assert!(NegotiatedProtocol::PriorKnowledge.is_h2());
        assert!(NegotiatedProtocol::Alpn(Some(b"h2".to_vec())).is_h2());
        assert!(!NegotiatedProtocol::Alpn(Some(b"http/1.1".to_vec())).is_h2());
        assert!(!NegotiatedProtocol::Alpn(None).is_h2());
    }
}
