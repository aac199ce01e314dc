//! Single-threaded readiness-based event loop.
//!
//! One `Poll` multiplexes every listener and client socket. Each iteration
//! waits for readiness, then performs exactly one nonblocking syscall per
//! ready socket: accept, read, or write. Nothing else blocks.
//!
//! Per connection, requests and replies are strictly ordered: after a read
//! the socket is rearmed for writability until the staged reply has fully
//! drained, and only then rearmed for readability. The loop never exits on
//! a per-connection failure; teardown closes that one socket and releases
//! its record.

mod connection;
mod stats;

pub use connection::{Connection, ProtocolTag};
pub use stats::ServerStats;

pub(crate) use connection::ConnState;

use crate::config::Config;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Listener tokens live above this base; connection tokens are slab keys.
const LISTENER_BASE: usize = usize::MAX - 4096;

/// Readiness events drained per poll iteration.
const EVENT_CAPACITY: usize = 1024;

/// Content callback installed into the reactor.
///
/// `on_request` consumes the connection's current request and stages a reply
/// into its write buffer, returning the staged length. `Ok(0)` stages
/// nothing and the connection is rearmed for reading; an error tears the
/// connection down.
pub trait MessageHandler {
    fn on_request(&mut self, conn: &mut Connection) -> io::Result<usize>;
}

/// The event loop and everything it owns: the multiplexer, the listeners,
/// the connection table, and the statistics block.
pub struct Reactor {
    poll: Poll,
    events: Events,
    /// Scratch copy of the current batch, so handlers can borrow the table.
    ready: Vec<(usize, bool, bool)>,
    listeners: Vec<TcpListener>,
    conns: Slab<Connection>,
    stats: ServerStats,
    buffer_size: usize,
    max_connections: usize,
}

impl Reactor {
    /// Bind one listener per port in the configured range and register them
    /// for readability.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listeners = Vec::with_capacity(config.port_count as usize);
        for i in 0..config.port_count {
            let addr: SocketAddr = format!("{}:{}", config.host, config.port + i)
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let mut listener = TcpListener::from_std(bind_listener(addr)?);
            poll.registry().register(
                &mut listener,
                Token(LISTENER_BASE + listeners.len()),
                Interest::READABLE,
            )?;
            info!(%addr, "listening");
            listeners.push(listener);
        }

        Ok(Reactor {
            poll,
            events: Events::with_capacity(EVENT_CAPACITY),
            ready: Vec::new(),
            listeners,
            conns: Slab::new(),
            stats: ServerStats::default(),
            buffer_size: config.buffer_size,
            max_connections: config.max_connections,
        })
    }

    /// Addresses actually bound, after ephemeral port resolution.
    pub fn local_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.listeners.iter().map(|l| l.local_addr()).collect()
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Run the loop until a multiplexer-level error.
    pub fn run(&mut self, handler: &mut dyn MessageHandler) -> io::Result<()> {
        loop {
            self.poll_once(handler, None)?;
        }
    }

    /// One readiness-dispatch iteration.
    pub fn poll_once(
        &mut self,
        handler: &mut dyn MessageHandler,
        timeout: Option<Duration>,
    ) -> io::Result<()> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        self.ready.clear();
        self.ready.extend(
            self.events
                .iter()
                .map(|e| (e.token().0, e.is_readable(), e.is_writable())),
        );

        for i in 0..self.ready.len() {
            let (token, readable, writable) = self.ready[i];
            if token >= LISTENER_BASE {
                self.accept_ready(token - LISTENER_BASE);
                continue;
            }
            if readable {
                if let Err(e) = self.read_ready(token, handler) {
                    debug!(token, error = %e, "closing after read");
                    self.close(token);
                    continue;
                }
            }
            if writable && self.conns.contains(token) {
                if let Err(e) = self.write_ready(token) {
                    debug!(token, error = %e, "closing after write");
                    self.close(token);
                }
            }
        }
        Ok(())
    }

    fn accept_ready(&mut self, listener_idx: usize) {
        loop {
            match self.listeners[listener_idx].accept() {
                Ok((stream, peer)) => {
                    if self.conns.len() >= self.max_connections {
                        warn!(%peer, "connection limit reached, rejecting");
                        continue;
                    }
                    let entry = self.conns.vacant_entry();
                    let token = Token(entry.key());
                    let mut conn = Connection::new(stream, self.buffer_size);
                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut conn.stream, token, Interest::READABLE)
                    {
                        error!(error = %e, "failed to register connection");
                        continue;
                    }
                    entry.insert(conn);
                    self.stats.total_connections += 1;
                    self.stats.active_connections += 1;
                    debug!(token = token.0, %peer, "accepted connection");
                    if self.stats.total_connections % 100_000 == 0 {
                        self.stats.log_summary();
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(error = %e, "accept error");
                    break;
                }
            }
        }
    }

    fn read_ready(&mut self, key: usize, handler: &mut dyn MessageHandler) -> io::Result<()> {
        let conn = match self.conns.get_mut(key) {
            Some(conn) => conn,
            None => return Ok(()),
        };
        if !matches!(conn.state, ConnState::Reading) {
            return Ok(());
        }

        let n = match conn.stream.read(&mut conn.rbuf[..]) {
            Ok(0) => return Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer closed")),
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e),
        };
        conn.rlen = n;
        self.stats.total_requests += 1;
        self.stats.bytes_recv += n as u64;

        let staged = handler.on_request(conn)?;
        if staged == 0 {
            if conn.close_after_flush {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "handler finished",
                ));
            }
            conn.rlen = 0;
            return Ok(());
        }
        if staged > conn.wbuf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "reply exceeds write buffer",
            ));
        }

        conn.state = ConnState::Writing {
            written: 0,
            total: staged,
        };
        self.poll
            .registry()
            .reregister(&mut conn.stream, Token(key), Interest::WRITABLE)?;
        Ok(())
    }

    fn write_ready(&mut self, key: usize) -> io::Result<()> {
        let conn = match self.conns.get_mut(key) {
            Some(conn) => conn,
            None => return Ok(()),
        };
        let (written, total) = match conn.state {
            ConnState::Writing { written, total } => (written, total),
            ConnState::Reading => return Ok(()),
        };

        let n = match conn.stream.write(&conn.wbuf[written..total]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"))
            }
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e),
        };
        self.stats.bytes_sent += n as u64;

        if written + n >= total {
            if conn.close_after_flush {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "close after flush",
                ));
            }
            conn.reset_for_read();
            self.poll
                .registry()
                .reregister(&mut conn.stream, Token(key), Interest::READABLE)?;
        } else {
            // Partial write: keep writability armed and resume from the tail.
            conn.state = ConnState::Writing {
                written: written + n,
                total,
            };
        }
        Ok(())
    }

    fn close(&mut self, key: usize) {
        if let Some(mut conn) = self.conns.try_remove(key) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            self.stats.active_connections = self.stats.active_connections.saturating_sub(1);
            debug!(token = key, "connection closed");
        }
    }
}

/// Nonblocking listener with address reuse and the backlog at the system
/// ceiling, which matters when connections arrive in large bursts.
fn bind_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let domain = match addr {
        SocketAddr::V4(_) => socket2::Domain::IPV4,
        SocketAddr::V6(_) => socket2::Domain::IPV6,
    };
    let socket = socket2::Socket::new(domain, socket2::Type::STREAM, Some(socket2::Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(libc::SOMAXCONN)?;
    Ok(socket.into())
}
