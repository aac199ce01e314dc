//! KV text protocol parser: request line framing, tokenizer, and command
//! classification.
//!
//! The tokenizer borrows from the request buffer instead of mutating it, so
//! the raw bytes stay available for logging or retry after tokenizing.

/// A classified command verb. The verb prefix selects the engine:
/// bare for the array, `R` for the tree, `H` for the hash table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Set,
    Get,
    Del,
    Mod,
    Exist,
    RSet,
    RGet,
    RDel,
    RMod,
    RExist,
    HSet,
    HGet,
    HDel,
    HMod,
    HExist,
}

impl Command {
    /// Exact, case-sensitive match of a verb token.
    pub fn classify(verb: &[u8]) -> Option<Command> {
        match verb {
            b"SET" => Some(Command::Set),
            b"GET" => Some(Command::Get),
            b"DEL" => Some(Command::Del),
            b"MOD" => Some(Command::Mod),
            b"EXIST" => Some(Command::Exist),
            b"RSET" => Some(Command::RSet),
            b"RGET" => Some(Command::RGet),
            b"RDEL" => Some(Command::RDel),
            b"RMOD" => Some(Command::RMod),
            b"REXIST" => Some(Command::RExist),
            b"HSET" => Some(Command::HSet),
            b"HGET" => Some(Command::HGet),
            b"HDEL" => Some(Command::HDel),
            b"HMOD" => Some(Command::HMod),
            b"HEXIST" => Some(Command::HExist),
            _ => None,
        }
    }

    /// Token count the verb requires, counting the verb itself.
    pub fn arity(self) -> usize {
        match self {
            Command::Set
            | Command::Mod
            | Command::RSet
            | Command::RMod
            | Command::HSet
            | Command::HMod => 3,
            _ => 2,
        }
    }
}

/// Slice the first line out of a raw request, excluding the newline.
/// A request without a newline is taken whole.
pub fn first_line(buf: &[u8]) -> &[u8] {
    match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => &buf[..pos],
        None => buf,
    }
}

/// Split a request line into tokens on ASCII whitespace, collapsing runs of
/// separators. Tokens borrow from the input. Empty input yields no tokens.
pub fn tokenize(line: &[u8]) -> Vec<&[u8]> {
    line.split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .collect()
}
