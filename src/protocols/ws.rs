//! WebSocket content handler.
//!
//! The first request on a connection is the RFC 6455 upgrade: the client key
//! plus the protocol GUID is SHA-1 hashed, Base64 encoded, and returned in a
//! `101 Switching Protocols` reply. Every later request is parsed as one
//! frame. Text and binary frames are echoed back framed, pings answered with
//! pongs, a close frame answered with a close before the connection drains
//! shut. Frames from the server are never masked.

use crate::reactor::{Connection, ProtocolTag};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::{Digest, Sha1};
use std::io;

const MAGIC_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const OP_TEXT: u8 = 0x1;
const OP_BINARY: u8 = 0x2;
const OP_CLOSE: u8 = 0x8;
const OP_PING: u8 = 0x9;
const OP_PONG: u8 = 0xA;

/// Answer the upgrade request and mark the connection as WebSocket.
pub fn handshake(conn: &mut Connection) -> io::Result<usize> {
    let key = extract_key(conn.request()).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "missing Sec-WebSocket-Key")
    })?;
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        accept_key(&key)
    );

    let (_, out) = conn.reply_buffers();
    if response.len() > out.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "handshake exceeds write buffer",
        ));
    }
    out[..response.len()].copy_from_slice(response.as_bytes());

    // The upgraded connection stays open, unlike plain HTTP.
    conn.protocol = ProtocolTag::Ws;
    Ok(response.len())
}

/// Process one frame from an upgraded connection.
pub fn handle_frame(conn: &mut Connection) -> io::Result<usize> {
    let frame = parse_frame(conn.request())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed frame"))?;

    let mut close = false;
    let staged = {
        let (_, out) = conn.reply_buffers();
        match frame.opcode {
            OP_TEXT => write_frame(out, OP_TEXT, &frame.payload),
            OP_BINARY => write_frame(out, OP_BINARY, &frame.payload),
            OP_PING => write_frame(out, OP_PONG, &frame.payload),
            OP_PONG => Some(0),
            OP_CLOSE => {
                close = true;
                write_frame(out, OP_CLOSE, &frame.payload)
            }
            _ => None,
        }
    };
    let staged = staged.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "unsupported frame")
    })?;

    if close {
        conn.close_after_flush = true;
    }
    Ok(staged)
}

/// `Sec-WebSocket-Key` header value, name matched case-insensitively.
fn extract_key(request: &[u8]) -> Option<String> {
    const NAME: &[u8] = b"sec-websocket-key:";
    for line in request.split(|&b| b == b'\n') {
        if line.len() > NAME.len() && line[..NAME.len()].eq_ignore_ascii_case(NAME) {
            let value = std::str::from_utf8(&line[NAME.len()..]).ok()?;
            return Some(value.trim().to_string());
        }
    }
    None
}

fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(MAGIC_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

struct Frame {
    opcode: u8,
    payload: Vec<u8>,
}

/// Decode one client frame: 2-byte header, optional extended length,
/// optional mask applied to the payload.
fn parse_frame(buf: &[u8]) -> Option<Frame> {
    if buf.len() < 2 {
        return None;
    }
    let opcode = buf[0] & 0x0F;
    let masked = buf[1] & 0x80 != 0;
    let mut len = (buf[1] & 0x7F) as usize;
    let mut off = 2;

    if len == 126 {
        if buf.len() < off + 2 {
            return None;
        }
        len = u16::from_be_bytes([buf[off], buf[off + 1]]) as usize;
        off += 2;
    } else if len == 127 {
        if buf.len() < off + 8 {
            return None;
        }
        len = usize::try_from(u64::from_be_bytes(buf[off..off + 8].try_into().ok()?)).ok()?;
        off += 8;
    }

    let mask = if masked {
        if buf.len() < off + 4 {
            return None;
        }
        let m = [buf[off], buf[off + 1], buf[off + 2], buf[off + 3]];
        off += 4;
        Some(m)
    } else {
        None
    };

    // A hostile 64-bit length can overflow `off + len`; checked arithmetic
    // keeps the declared payload bounded by the buffer.
    let end = off.checked_add(len).filter(|&end| end <= buf.len())?;
    let mut payload = buf[off..end].to_vec();
    if let Some(mask) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }
    }
    Some(Frame { opcode, payload })
}

/// Encode a server frame, FIN set, no mask. `None` when it does not fit.
fn write_frame(out: &mut [u8], opcode: u8, payload: &[u8]) -> Option<usize> {
    let header_len = if payload.len() < 126 {
        2
    } else if payload.len() <= u16::MAX as usize {
        4
    } else {
        10
    };
    let total = header_len + payload.len();
    if total > out.len() {
        return None;
    }

    out[0] = 0x80 | opcode;
    match header_len {
        2 => out[1] = payload.len() as u8,
        4 => {
            out[1] = 126;
            out[2..4].copy_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        _ => {
            out[1] = 127;
            out[2..10].copy_from_slice(&(payload.len() as u64).to_be_bytes());
        }
    }
    out[header_len..total].copy_from_slice(payload);
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc_sample() {
        // The handshake example from RFC 6455 section 1.3.
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn extract_key_is_case_insensitive() {
        let request = b"GET /chat HTTP/1.1\r\nSEC-WEBSOCKET-KEY: abc123==\r\n\r\n";
        assert_eq!(extract_key(request).as_deref(), Some("abc123=="));
        assert_eq!(extract_key(b"GET / HTTP/1.1\r\n\r\n"), None);
    }

    fn masked_frame(opcode: u8, mask: [u8; 4], payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() < 126);
        let mut frame = vec![0x80 | opcode, 0x80 | payload.len() as u8];
        frame.extend_from_slice(&mask);
        frame.extend(
            payload
                .iter()
                .enumerate()
                .map(|(i, &b)| b ^ mask[i % 4]),
        );
        frame
    }

    #[test]
    fn masked_payload_is_unmasked() {
        let frame = masked_frame(OP_TEXT, [0x37, 0xFA, 0x21, 0x3D], b"Hello");
        let parsed = parse_frame(&frame).unwrap();
        assert_eq!(parsed.opcode, OP_TEXT);
        assert_eq!(parsed.payload, b"Hello");
    }

    #[test]
    fn short_frames_are_incomplete() {
        assert!(parse_frame(b"").is_none());
        assert!(parse_frame(&[0x81]).is_none());
        // Declared 5-byte payload, nothing delivered.
        assert!(parse_frame(&[0x81, 0x85, 1, 2, 3, 4]).is_none());
    }

    #[test]
    fn extended_length_round_trip() {
        let payload = vec![b'x'; 300];
        let mut out = vec![0u8; 512];
        let n = write_frame(&mut out, OP_BINARY, &payload).unwrap();
        // 126 marker plus a 16-bit length.
        assert_eq!(out[1], 126);
        assert_eq!(n, 4 + 300);

        let parsed = parse_frame(&out[..n]).unwrap();
        assert_eq!(parsed.opcode, OP_BINARY);
        assert_eq!(parsed.payload, payload);
    }

    #[test]
    fn hostile_64_bit_length_is_rejected() {
        // Declared payload of u64::MAX; the offset+length sum must not wrap.
        let mut frame = vec![0x81, 0xFF];
        frame.extend_from_slice(&u64::MAX.to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0, 0]);
        assert!(parse_frame(&frame).is_none());

        // Same without the mask bit.
        let mut frame = vec![0x81, 0x7F];
        frame.extend_from_slice(&u64::MAX.to_be_bytes());
        assert!(parse_frame(&frame).is_none());

        // A large-but-truthful declaration with no payload is incomplete,
        // not a panic.
        let mut frame = vec![0x81, 0x7F];
        frame.extend_from_slice(&(1u64 << 32).to_be_bytes());
        assert!(parse_frame(&frame).is_none());
    }

    #[test]
    fn sixty_four_bit_length_round_trip() {
        let payload = vec![b'x'; 70_000];
        let mut out = vec![0u8; 70_016];
        let n = write_frame(&mut out, OP_BINARY, &payload).unwrap();
        // 127 marker plus a 64-bit length.
        assert_eq!(out[1], 127);
        assert_eq!(n, 10 + 70_000);

        let parsed = parse_frame(&out[..n]).unwrap();
        assert_eq!(parsed.opcode, OP_BINARY);
        assert_eq!(parsed.payload.len(), 70_000);
    }

    #[test]
    fn server_frames_carry_no_mask() {
        let mut out = vec![0u8; 64];
        let n = write_frame(&mut out, OP_TEXT, b"hi").unwrap();
        assert_eq!(n, 4);
        assert_eq!(out[0], 0x80 | OP_TEXT);
        assert_eq!(out[1] & 0x80, 0);
    }
}
