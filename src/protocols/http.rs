//! Plain HTTP handler.
//!
//! Serves one fixed page to any request and asks the reactor to release the
//! connection once the reply has drained.

use crate::reactor::{Connection, ProtocolTag};
use std::io;

const BODY: &str = "<html><body>Hello</body></html>";

pub fn handle(conn: &mut Connection) -> io::Result<usize> {
    let header = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        BODY.len()
    );
    let total = header.len() + BODY.len();

    let (_, out) = conn.reply_buffers();
    if total > out.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "response exceeds write buffer",
        ));
    }
    out[..header.len()].copy_from_slice(header.as_bytes());
    out[header.len()..total].copy_from_slice(BODY.as_bytes());

    conn.protocol = ProtocolTag::Http;
    conn.close_after_flush = true;
    Ok(total)
}
