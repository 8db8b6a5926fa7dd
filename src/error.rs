// SPDX-License-Identifier: CC0-1.0

//! Descriptor realization errors

use std::{error, fmt};

use bitcoin::bip32;

use crate::limits::ScriptRole;

/// Everything that can go wrong while parsing or realizing a descriptor.
///
/// Construction is fail-fast: a [`Descriptor`](crate::Descriptor) that exists
/// is valid, and its accessors cannot fail except [`Error::NoAddress`].
#[derive(Debug)]
pub enum Error {
    /// The expression did not match any descriptor envelope.
    Parse(String),
    /// Encountered a byte outside the printable descriptor range.
    Unprintable(u8),
    /// A character outside the descriptor checksum charset.
    InvalidCharacter(char),
    /// A checksum was required but the expression carries none.
    MissingChecksum(String),
    /// The trailing checksum does not match the descriptor body.
    InvalidChecksum {
        /// The descriptor body the checksum was computed over.
        descriptor: String,
        /// The checksum the body should carry.
        expected: String,
    },
    /// A wildcard descriptor was realized without a derivation index.
    InvalidIndex(String),
    /// A key expression did not match the key grammar, or still carries an
    /// uninstantiated wildcard.
    BadKeyExpression(String),
    /// A public key that is not a valid curve point, or an uncompressed key
    /// in a SegWit context.
    InvalidPubKey(String),
    /// A WIF-encoded key that does not decode, or is for another network.
    InvalidWif(String),
    /// An extended key that does not decode, or is for another network.
    InvalidExtendedKey(String),
    /// A derivation path element outside `[0, 2^31)`.
    PathElementOverflow(String),
    /// BIP32 derivation failure, e.g. a hardened step from an xpub.
    Bip32(bip32::Error),
    /// Two distinct key expressions in one miniscript resolved to the same
    /// public key.
    DuplicateKey(String),
    /// The compiled miniscript failed a sanity property.
    UnsaneMiniscript(&'static str),
    /// A hash literal inside a miniscript fragment is not valid hex of the
    /// expected length.
    InvalidHashLiteral(String),
    /// No non-malleable satisfaction exists for the given unknowns.
    Unsatisfiable,
    /// A realized script exceeds its size cap. The size is absent when the
    /// miniscript compiler rejected the fragment before a script was built.
    ScriptTooLarge {
        /// Which script hit the cap.
        role: ScriptRole,
        /// Actual size in bytes, when a script was built.
        size: Option<usize>,
        /// The cap in bytes.
        limit: usize,
    },
    /// A realized script contains more than the allowed number of non-push
    /// opcodes. The count is absent when the miniscript compiler rejected
    /// the fragment before a script was built.
    TooManyOps {
        /// Actual opcode count, when a script was built.
        count: Option<usize>,
        /// The opcode cap.
        limit: usize,
    },
    /// `sh(...)` wraps a miniscript whose head is not in the standard
    /// allow-list, and permissive P2SH realization was not requested.
    MiniscriptNotAllowedInP2sh(String),
    /// An `addr(...)` body that does not decode under the requested network.
    InvalidAddress(String),
    /// The descriptor kind has no address form (`pk(...)`).
    NoAddress,
    /// Error from the miniscript compiler or satisfier.
    Miniscript(miniscript::Error),
    /// Error decoding a script during opcode counting.
    Script(bitcoin::script::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Parse(ref s) => write!(f, "expression '{}' matches no descriptor envelope", s),
            Error::Unprintable(b) => write!(f, "unprintable character 0x{:02x} in descriptor", b),
            Error::InvalidCharacter(c) => write!(f, "invalid character '{}' in checksum input", c),
            Error::MissingChecksum(ref s) => write!(f, "descriptor '{}' carries no checksum", s),
            Error::InvalidChecksum { ref descriptor, ref expected } => {
                write!(f, "invalid checksum for '{}', expected '{}'", descriptor, expected)
            }
            Error::InvalidIndex(ref s) => {
                write!(f, "wildcard descriptor '{}' requires a derivation index", s)
            }
            Error::BadKeyExpression(ref s) => write!(f, "invalid key expression '{}'", s),
            Error::InvalidPubKey(ref s) => write!(f, "invalid public key '{}'", s),
            Error::InvalidWif(ref s) => write!(f, "invalid WIF key '{}'", s),
            Error::InvalidExtendedKey(ref s) => write!(f, "invalid extended key '{}'", s),
            Error::PathElementOverflow(ref s) => {
                write!(f, "derivation path element '{}' out of range", s)
            }
            Error::Bip32(ref e) => write!(f, "bip32 derivation: {}", e),
            Error::DuplicateKey(ref s) => {
                write!(f, "key expressions resolve to the same public key {}", s)
            }
            Error::UnsaneMiniscript(reason) => write!(f, "unsane miniscript: {}", reason),
            Error::InvalidHashLiteral(ref s) => write!(f, "invalid hash literal '{}'", s),
            Error::Unsatisfiable => f.write_str("no non-malleable satisfaction exists"),
            Error::ScriptTooLarge { role, size: Some(size), limit } => {
                write!(f, "{} script of {} bytes exceeds the {}-byte cap", role.as_str(), size, limit)
            }
            Error::ScriptTooLarge { role, size: None, limit } => {
                write!(f, "{} script exceeds the {}-byte cap", role.as_str(), limit)
            }
            Error::TooManyOps { count: Some(count), limit } => {
                write!(f, "script with {} non-push opcodes exceeds the cap of {}", count, limit)
            }
            Error::TooManyOps { count: None, limit } => {
                write!(f, "script exceeds the cap of {} non-push opcodes", limit)
            }
            Error::MiniscriptNotAllowedInP2sh(ref s) => {
                write!(f, "miniscript '{}' is not allowed directly under sh()", s)
            }
            Error::InvalidAddress(ref s) => write!(f, "invalid address '{}'", s),
            Error::NoAddress => f.write_str("descriptor has no address form"),
            Error::Miniscript(ref e) => write!(f, "miniscript: {}", e),
            Error::Script(ref e) => write!(f, "script decoding: {}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Bip32(ref e) => Some(e),
            Error::Miniscript(ref e) => Some(e),
            Error::Script(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<bip32::Error> for Error {
    fn from(e: bip32::Error) -> Error { Error::Bip32(e) }
}
