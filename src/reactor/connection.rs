//! Per-connection state: socket, fixed read/write buffers, the sticky
//! protocol tag, and the close-after-flush flag.

use mio::net::TcpStream;

/// Content classification for a connection. Assigned once on the first
/// request and kept for the connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolTag {
    Unknown,
    Http,
    Kv,
    Ws,
}

/// I/O phase of a connection. A connection is armed for readability or
/// writability, never both.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ConnState {
    /// Waiting for the next request.
    Reading,
    /// Draining a staged reply.
    Writing {
        /// Bytes already sent.
        written: usize,
        /// Bytes staged in the write buffer.
        total: usize,
    },
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    pub(crate) stream: TcpStream,
    pub(crate) rbuf: Box<[u8]>,
    /// Bytes filled by the last read.
    pub(crate) rlen: usize,
    pub(crate) wbuf: Box<[u8]>,
    pub(crate) state: ConnState,
    pub protocol: ProtocolTag,
    /// Release the connection once the staged reply has fully drained.
    pub close_after_flush: bool,
}

impl Connection {
    /// Fresh record for a newly accepted stream. Buffers start empty and
    /// the tag unknown, so a reused token never sees stale state.
    pub(crate) fn new(stream: TcpStream, buffer_size: usize) -> Self {
        Connection {
            stream,
            rbuf: vec![0u8; buffer_size].into_boxed_slice(),
            rlen: 0,
            wbuf: vec![0u8; buffer_size].into_boxed_slice(),
            state: ConnState::Reading,
            protocol: ProtocolTag::Unknown,
            close_after_flush: false,
        }
    }

    /// The bytes of the current request.
    pub fn request(&self) -> &[u8] {
        &self.rbuf[..self.rlen]
    }

    /// The current request alongside the whole write buffer, for handlers
    /// that format a reply while reading the request.
    pub fn reply_buffers(&mut self) -> (&[u8], &mut [u8]) {
        (&self.rbuf[..self.rlen], &mut self.wbuf[..])
    }

    /// Return to the reading phase with an empty request.
    pub(crate) fn reset_for_read(&mut self) {
        self.rlen = 0;
        self.state = ConnState::Reading;
    }

    #[cfg(test)]
    pub(crate) fn load_request(&mut self, request: &[u8]) {
        self.rbuf[..request.len()].copy_from_slice(request);
        self.rlen = request.len();
    }
}
