//! Content protocols and the per-connection dispatcher.
//!
//! The dispatcher is the one handler the reactor installs in normal
//! operation. It classifies each connection's traffic once as KV text,
//! plain HTTP, or a WebSocket upgrade, then routes every later request by
//! the sticky tag.

pub mod echo;
pub mod http;
pub mod kv;
pub mod ws;

pub use echo::EchoHandler;

use crate::reactor::{Connection, MessageHandler, ProtocolTag};
use crate::store::Stores;
use std::io;

/// Routes each request to the KV pipeline, the HTTP handler, or the
/// WebSocket handler, and owns the storage engines.
pub struct Dispatcher {
    stores: Stores,
}

impl Dispatcher {
    pub fn new(stores: Stores) -> Self {
        Dispatcher { stores }
    }

    fn handle_kv(&mut self, conn: &mut Connection) -> io::Result<usize> {
        conn.protocol = ProtocolTag::Kv;
        let (request, out) = conn.reply_buffers();
        Ok(kv::process(&mut self.stores, request, out))
    }
}

impl MessageHandler for Dispatcher {
    fn on_request(&mut self, conn: &mut Connection) -> io::Result<usize> {
        match conn.protocol {
            ProtocolTag::Http => http::handle(conn),
            ProtocolTag::Ws => ws::handle_frame(conn),
            ProtocolTag::Kv => self.handle_kv(conn),
            ProtocolTag::Unknown => match classify(conn.request()) {
                Classified::WsUpgrade => ws::handshake(conn),
                Classified::Http => http::handle(conn),
                Classified::Kv => self.handle_kv(conn),
            },
        }
    }
}

enum Classified {
    Http,
    WsUpgrade,
    Kv,
}

/// Classify a first request. HTTP is recognized by `HTTP/1.` in the first
/// line (up to 512 bytes); an HTTP request carrying the upgrade headers is a
/// WebSocket handshake; everything else is KV text.
fn classify(request: &[u8]) -> Classified {
    let head = &request[..request.len().min(512)];
    let line = match head.iter().position(|&b| b == b'\n') {
        Some(pos) => &head[..pos],
        None => head,
    };
    if !contains(line, b"HTTP/1.") {
        return Classified::Kv;
    }

    let lower: Vec<u8> = request.iter().map(|b| b.to_ascii_lowercase()).collect();
    if header_contains(&lower, b"upgrade:", b"websocket")
        && header_contains(&lower, b"connection:", b"upgrade")
    {
        Classified::WsUpgrade
    } else {
        Classified::Http
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// True when a header line starts with `name` and mentions `value`.
/// Expects pre-lowercased input.
fn header_contains(lower: &[u8], name: &[u8], value: &[u8]) -> bool {
    lower
        .split(|&b| b == b'\n')
        .any(|line| line.starts_with(name) && contains(line, value))
}
