use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::net::socket::NegotiatedProtocol;
use crate::net::socket::SocketStream;

impl SocketStream for TcpStream {
    fn is_tcp(&self) -> bool {
        true
    }

    fn set_tcp_nodelay(&self, no_delay: bool) -> io::Result<()> {
        self.set_nodelay(no_delay)
    }

    fn negotiated_protocol(&self) -> NegotiatedProtocol {
        NegotiatedProtocol::PriorKnowledge
    }
}

/// Connect to the first address that accepts, in order.
///
/// The error of the last attempt is returned if none does.
pub async fn connect_any(addrs: &[SocketAddr]) -> crate::Result<TcpStream> {
    let mut last_error = None;
    for addr in addrs {
        debug!("connecting to {}", addr);
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("failed to connect to {}: {}", addr, e);
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(e) => Err(e.into()),
        None => Err(crate::Error::AddrResolvedToEmptyList),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn empty_list() {
        match connect_any(&[]).await {
            Err(crate::Error::AddrResolvedToEmptyList) => {}
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[tokio::test]
    async fn skips_refusing_address() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let good = listener.local_addr().unwrap();
        // closed right away, so connecting is refused
        let refused = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap()
        };
        let stream = connect_any(&[refused, good]).await.unwrap();
        assert_eq!(good, stream.peer_addr().unwrap());
        assert_eq!(
            NegotiatedProtocol::PriorKnowledge,
            stream.negotiated_protocol()
        );
    }
}
