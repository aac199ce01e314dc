//! KV command executor.
//!
//! Takes one tokenized request, runs the engine operation, and formats the
//! reply into the caller's write buffer with a trailing CRLF. A reply that
//! cannot fit the buffer is replaced by the Internal-error reply.

use super::parser::{first_line, tokenize, Command};
use crate::error::{KvError, KvResult};
use crate::store::Stores;

/// Reply for a request with too few tokens.
const MISSING_ARGUMENTS: &[u8] = b"ERROR Missing arguments";
/// Reply for an unrecognized verb.
const UNKNOWN_COMMAND: &[u8] = b"ERROR Unknown command";

/// Process a raw KV request and stage the reply into `out`.
/// Returns the number of bytes written, CRLF included.
pub fn process(stores: &mut Stores, request: &[u8], out: &mut [u8]) -> usize {
    let line = first_line(request);
    let tokens = tokenize(line);

    match execute(stores, &tokens, out) {
        Some(n) => n,
        // The reply did not fit; the Internal-error string always does on
        // any sane buffer profile.
        None => write_reply(out, &[KvError::Internal.reply().as_bytes()]).unwrap_or(0),
    }
}

fn execute(stores: &mut Stores, tokens: &[&[u8]], out: &mut [u8]) -> Option<usize> {
    if tokens.is_empty() {
        return write_reply(out, &[MISSING_ARGUMENTS]);
    }
    let cmd = match Command::classify(tokens[0]) {
        Some(cmd) => cmd,
        None => return write_reply(out, &[UNKNOWN_COMMAND]),
    };
    if tokens.len() < cmd.arity() {
        return write_reply(out, &[MISSING_ARGUMENTS]);
    }

    let key = tokens[1];
    match cmd {
        Command::Set => status(out, stores.array.set(key, tokens[2])),
        Command::Get => match stores.array.get(key) {
            Ok(value) => write_reply(out, &[b"OK ", value]),
            Err(e) => write_reply(out, &[e.reply().as_bytes()]),
        },
        Command::Del => status(out, stores.array.delete(key)),
        Command::Mod => status(out, stores.array.modify(key, tokens[2])),
        Command::Exist => status(out, stores.array.exists(key)),

        Command::RSet => status(out, stores.tree.set(key, tokens[2])),
        Command::RGet => match stores.tree.get(key) {
            Ok(value) => write_reply(out, &[b"OK ", value]),
            Err(e) => write_reply(out, &[e.reply().as_bytes()]),
        },
        Command::RDel => status(out, stores.tree.delete(key)),
        Command::RMod => status(out, stores.tree.modify(key, tokens[2])),
        Command::RExist => status(out, stores.tree.exists(key)),

        Command::HSet => status(out, stores.hash.set(key, tokens[2])),
        Command::HGet => match stores.hash.get(key) {
            Ok(value) => write_reply(out, &[b"OK ", value.as_slice()]),
            Err(e) => write_reply(out, &[e.reply().as_bytes()]),
        },
        Command::HDel => status(out, stores.hash.delete(key)),
        Command::HMod => status(out, stores.hash.modify(key, tokens[2])),
        Command::HExist => status(out, stores.hash.exists(key)),
    }
}

fn status(out: &mut [u8], result: KvResult<()>) -> Option<usize> {
    match result {
        Ok(()) => write_reply(out, &[b"OK"]),
        Err(e) => write_reply(out, &[e.reply().as_bytes()]),
    }
}

/// Concatenate `parts` plus CRLF into `out`. `None` when it does not fit.
fn write_reply(out: &mut [u8], parts: &[&[u8]]) -> Option<usize> {
    let total = parts.iter().map(|p| p.len()).sum::<usize>() + 2;
    if total > out.len() {
        return None;
    }
    let mut n = 0;
    for part in parts {
        out[n..n + part.len()].copy_from_slice(part);
        n += part.len();
    }
    out[n..n + 2].copy_from_slice(b"\r\n");
    Some(n + 2)
}
