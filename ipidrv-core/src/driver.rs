// MIT License
// Copyright 2026--present ipidrv developers

//! Connected clients and the reconnecting supervisor.
//!
//! A [`Driver`] is one [`Session`] over one [`TcpTransport`]: it is built by
//! connecting, and it is spent once the orchestrator sends EXIT or the
//! connection fails. [`supervise`] turns that into a long-running process by
//! building fresh drivers as long as the orchestrator keeps coming back.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::{DriverError, Result};
use crate::evaluator::Evaluator;
use crate::session::{Flow, Policy, Session, SessionState};
use crate::transport::TcpTransport;

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Upper bound on the wait for each command header; `None` blocks.
    pub header_timeout: Option<Duration>,
    pub policy: Policy,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 31415,
            connect_timeout: Duration::from_secs(10),
            header_timeout: None,
            policy: Policy::Lenient,
        }
    }
}

/// One connected client.
pub struct Driver<E> {
    session: Session<TcpTransport, E>,
}

impl<E: Evaluator> Driver<E> {
    pub fn connect(opts: &ConnectOptions, evaluator: E) -> Result<Self> {
        let transport = TcpTransport::connect(&opts.host, opts.port, opts.connect_timeout)?;
        let session = Session::new(transport, evaluator)
            .with_policy(opts.policy)
            .with_header_timeout(opts.header_timeout);
        Ok(Self { session })
    }

    /// Handle a single command.
    pub fn step(&mut self) -> Result<Flow> {
        self.session.step()
    }

    /// Serve the orchestrator until EXIT.
    pub fn run(&mut self) -> Result<()> {
        self.session.run()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn into_evaluator(self) -> E {
        self.session.into_parts().1
    }
}

/// Serve consecutive orchestrator sessions.
///
/// `make_evaluator` is called once per connection. Without `reconnect` this
/// is a single [`Driver::run`]. With it, every EXIT (and every peer
/// disconnect or header timeout) is followed by a new connection attempt; the first failed
/// attempt after at least one served session ends the loop normally, since
/// the orchestrator has most likely finished. Returns the number of sessions
/// that ended with EXIT.
pub fn supervise<E, F>(opts: &ConnectOptions, reconnect: bool, mut make_evaluator: F) -> Result<usize>
where
    E: Evaluator,
    F: FnMut() -> Result<E>,
{
    let mut served = 0usize;
    let mut attempts = 0usize;
    loop {
        let evaluator = make_evaluator()?;
        let mut driver = match Driver::connect(opts, evaluator) {
            Ok(d) => d,
            Err(e) if attempts > 0 && reconnect => {
                info!(error = %e, served, "orchestrator gone, stopping");
                return Ok(served);
            }
            Err(e) => return Err(e),
        };
        attempts += 1;

        match driver.run() {
            Ok(()) => served += 1,
            Err(e) if reconnect && e.is_disconnect() => {
                warn!(error = %e, "orchestrator unreachable, reconnecting");
            }
            Err(e) => return Err(e),
        }

        if !reconnect {
            return Ok(served);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Command;
    use crate::evaluator::Harmonic;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn opts(port: u16) -> ConnectOptions {
        ConnectOptions {
            port,
            connect_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_reference_driver() {
        let o = ConnectOptions::default();
        assert_eq!(o.host, "127.0.0.1");
        assert_eq!(o.port, 31415);
        assert_eq!(o.connect_timeout, Duration::from_secs(10));
        assert_eq!(o.header_timeout, None);
    }

    #[test]
    fn connect_refused_is_an_error() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        assert!(Driver::connect(&opts(port), Harmonic::new(1.0)).is_err());
    }

    #[test]
    fn supervise_reconnects_after_exit() {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = l.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            for _ in 0..2 {
                let (mut s, _) = l.accept().unwrap();
                s.write_all(&Command::Status.header()).unwrap();
                let mut reply = [0u8; 12];
                s.read_exact(&mut reply).unwrap();
                assert_eq!(&reply, b"NEEDINIT    ");
                s.write_all(&Command::Exit.header()).unwrap();
            }
            // Dropping the listener makes the third attempt fail.
        });

        let mut built = 0;
        let served = supervise(&opts(port), true, || {
            built += 1;
            Ok(Harmonic::new(1.0))
        })
        .unwrap();
        server.join().unwrap();
        assert_eq!(served, 2);
        // A third attempt may land in the backlog before the listener closes.
        assert!(built >= 3);
    }

    #[test]
    fn supervise_reconnects_after_header_timeout() {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = l.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            // Stay silent on the first connection until the driver gives up.
            let (_silent, _) = l.accept().unwrap();
            let (mut s, _) = l.accept().unwrap();
            s.write_all(&Command::Exit.header()).unwrap();
        });

        let opts = ConnectOptions {
            header_timeout: Some(Duration::from_millis(200)),
            ..opts(port)
        };
        let served = supervise(&opts, true, || Ok(Harmonic::new(1.0))).unwrap();
        server.join().unwrap();
        assert_eq!(served, 1);
    }

    #[test]
    fn header_timeout_without_reconnect_is_an_error() {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = l.local_addr().unwrap().port();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let server = thread::spawn(move || {
            let (_silent, _) = l.accept().unwrap();
            let _ = rx.recv();
        });

        let opts = ConnectOptions {
            header_timeout: Some(Duration::from_millis(100)),
            ..opts(port)
        };
        let err = supervise(&opts, false, || Ok(Harmonic::new(1.0))).unwrap_err();
        tx.send(()).unwrap();
        server.join().unwrap();
        assert!(matches!(err, DriverError::ConnectionTimeout { .. }), "{err:?}");
    }

    #[test]
    fn supervise_without_reconnect_serves_once() {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = l.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut s, _) = l.accept().unwrap();
            s.write_all(&Command::Exit.header()).unwrap();
        });
        let served = supervise(&opts(port), false, || Ok(Harmonic::new(1.0))).unwrap();
        server.join().unwrap();
        assert_eq!(served, 1);
    }

    #[test]
    fn evaluator_construction_failure_stops_supervisor() {
        let err = supervise(&opts(1), true, || -> Result<Harmonic> {
            Err(DriverError::Config("missing template".into()))
        })
        .unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
    }
}
