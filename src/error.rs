//! Error taxonomy shared by the storage engines and the command pipeline.
//!
//! The set is closed: every engine operation and every protocol reply maps
//! onto one of these variants, and each variant has a fixed wire string.

use std::fmt;

/// Failure modes surfaced by the storage engines.
///
/// Success is `Result::Ok`; there is no `Ok` variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvError {
    /// An argument was malformed (empty key, oversize key/value, ...).
    BadParam,
    /// Capacity exhausted.
    NoMemory,
    /// The key is absent.
    NotFound,
    /// An insert collided with an existing key.
    AlreadyExists,
    /// A state inconsistency that should not occur in normal operation.
    Internal,
}

/// Result alias used across the engines and the executor.
pub type KvResult<T> = Result<T, KvError>;

impl KvError {
    /// The exact reply string sent to clients for this error.
    pub fn reply(self) -> &'static str {
        match self {
            KvError::BadParam => "ERROR: Invalid parameter",
            KvError::NoMemory => "ERROR: Out of memory",
            KvError::NotFound => "ERROR: Key not found",
            KvError::AlreadyExists => "ERROR: Key already exists",
            KvError::Internal => "ERROR: Internal error",
        }
    }
}

impl fmt::Display for KvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reply())
    }
}

impl std::error::Error for KvError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_strings_are_fixed() {
        assert_eq!(KvError::BadParam.reply(), "ERROR: Invalid parameter");
        assert_eq!(KvError::NoMemory.reply(), "ERROR: Out of memory");
        assert_eq!(KvError::NotFound.reply(), "ERROR: Key not found");
        assert_eq!(KvError::AlreadyExists.reply(), "ERROR: Key already exists");
        assert_eq!(KvError::Internal.reply(), "ERROR: Internal error");
    }

    #[test]
    fn display_matches_reply() {
        assert_eq!(KvError::NotFound.to_string(), KvError::NotFound.reply());
    }
}
