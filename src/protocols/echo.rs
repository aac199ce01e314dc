//! Echo content handler.
//!
//! Copies the request to the write buffer unchanged. Installable in place of
//! the dispatcher when the reactor is exercised without KV semantics, for
//! example under connection-churn load tests.

use crate::reactor::{Connection, MessageHandler};
use std::io;

pub struct EchoHandler;

impl MessageHandler for EchoHandler {
    fn on_request(&mut self, conn: &mut Connection) -> io::Result<usize> {
        let (request, out) = conn.reply_buffers();
        if request.len() > out.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request exceeds write buffer",
            ));
        }
        out[..request.len()].copy_from_slice(request);
        Ok(request.len())
    }
}
