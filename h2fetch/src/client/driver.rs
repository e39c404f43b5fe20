//! Runs one session from name resolution to teardown.

use std::io::Write;

use tokio::time;

use crate::client::conf::ClientConf;
use crate::client::session::SessionContext;
use crate::client::session::Teardown;
use crate::client::target::StreamDescriptor;
use crate::client::transport::CloseReason;
use crate::client::transport::TransportEvent;
use crate::net::connect;
use crate::net::connect::Connector;
use crate::net::socket::SocketStream;

/// Connection lifecycle. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriverState {
    Idle,
    Resolving,
    Connecting,
    Active,
    /// Stream closed, `GOAWAY` submitted.
    Draining,
    Closed,
}

#[derive(Debug)]
pub(crate) struct StateMachine {
    state: DriverState,
}

impl StateMachine {
    pub fn new() -> StateMachine {
        StateMachine {
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Move to `next` unless that would not be forward. Returns whether the
    /// state changed.
    pub fn advance(&mut self, next: DriverState) -> bool {
        if next <= self.state {
            if next < self.state {
                debug!("ignoring transition {:?} -> {:?}", self.state, next);
            }
            return false;
        }
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
        true
    }
}

/// Fetch the descriptor's target and write the response to the sinks.
///
/// Transport failures, timeouts and protocol errors end the run normally and
/// are reported through the returned [`Teardown`] and the diagnostics sink.
/// Only a failed ALPN negotiation is an error.
pub async fn run<D: Write, B: Write>(
    descriptor: StreamDescriptor<'_>,
    conf: &ClientConf,
    connector: &dyn Connector,
    diag: D,
    body: B,
) -> crate::Result<Teardown> {
    let mut state = StateMachine::new();
    let scheme = descriptor.scheme();
    let host = descriptor.host().to_owned();
    let port = descriptor.port();
    let mut ctx = SessionContext::new(descriptor, conf.clone(), diag, body);

    state.advance(DriverState::Resolving);
    let connect = async {
        let addrs = connect::resolve(&host, port).await?;
        state.advance(DriverState::Connecting);
        connector.connect(&addrs, scheme, &host).await
    };
    let connected: crate::Result<Box<dyn SocketStream>> = match conf.connect_timeout {
        Some(timeout) => time::timeout(timeout, connect)
            .await
            .map_err(crate::Error::from)
            .and_then(|r| r),
        None => connect.await,
    };

    let event = match connected {
        Ok(socket) => TransportEvent::Connected(socket),
        Err(e) => {
            info!("failed to connect to {}:{}: {}", host, port, e);
            TransportEvent::Closed(CloseReason::from(e))
        }
    };
    let r = run_session(&mut ctx, &mut state, event).await;
    ctx.finish().await;
    state.advance(DriverState::Closed);
    r?;

    Ok(ctx.teardown_reason().unwrap_or(Teardown::PeerClosed))
}

async fn run_session<D: Write, B: Write>(
    ctx: &mut SessionContext<'_, D, B>,
    state: &mut StateMachine,
    first: TransportEvent,
) -> crate::Result<()> {
    if let TransportEvent::Connected(..) = first {
        state.advance(DriverState::Active);
    }
    ctx.handle_transport_event(first)?;

    while !ctx.is_closed() {
        if ctx.is_draining() {
            state.advance(DriverState::Draining);
        }
        let event = match ctx.next_transport_event().await {
            Some(event) => event,
            None => break,
        };
        ctx.handle_transport_event(event)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn forward_only() {
        let mut m = StateMachine::new();
        assert_eq!(DriverState::Idle, m.state());
        assert!(m.advance(DriverState::Resolving));
        assert!(m.advance(DriverState::Connecting));
        assert!(!m.advance(DriverState::Resolving));
        assert_eq!(DriverState::Connecting, m.state());
        assert!(m.advance(DriverState::Active));
        assert!(!m.advance(DriverState::Active));
        assert!(m.advance(DriverState::Closed));
        assert!(!m.advance(DriverState::Draining));
        assert_eq!(DriverState::Closed, m.state());
    }

    #[test]
    fn failure_skips_to_closed() {
        let mut m = StateMachine::new();
        m.advance(DriverState::Resolving);
        assert!(m.advance(DriverState::Closed));
    }

    #[tokio::test]
    async fn connect_failure_is_not_an_error() {
        // nothing listens on a port that was just released
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let target = format!("http://127.0.0.1:{}/", port);
        let descriptor = StreamDescriptor::parse(&target).unwrap();
        let conf = ClientConf::new();
        let connector = connect::DefaultConnector::new(&conf).unwrap();
        let mut diag = Vec::new();
        let mut body = Vec::new();
        let teardown = run(descriptor, &conf, &connector, &mut diag, &mut body)
            .await
            .unwrap();
        assert_eq!(Teardown::NetworkError, teardown);
        assert_eq!("Network error\n", String::from_utf8(diag).unwrap());
        assert!(body.is_empty());
    }
}
