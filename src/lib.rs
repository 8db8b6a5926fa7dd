// SPDX-License-Identifier: CC0-1.0

//! Output Descriptors
//!
//! Parsing and realization of Bitcoin output descriptors with inline
//! [Miniscript]. A textual descriptor such as
//! `wsh(andor(pk(KEY1),older(144),and_v(v:pk(KEY2),after(HEIGHT))))` is
//! turned into its locking script, address, redeem/witness scripts and a
//! *satisfaction template*: the unlocking assembly with `sig(<pubkey>)` and
//! preimage placeholders left for a signing stage to fill in.
//!
//! Key expressions cover raw public keys, WIF-encoded private keys and
//! BIP32 extended keys with origin information, derivation paths and `*`
//! range wildcards; ranged descriptors are materialized at a caller-supplied
//! index, every wildcard in lockstep. Checksums follow BIP-380.
//!
//! The crate is purely synchronous and stateless. Elliptic-curve checks,
//! BIP32 derivation, WIF decoding, miniscript compilation/satisfaction and
//! address encoding are consumed from [`bitcoin`] and [`miniscript`] rather
//! than reimplemented.
//!
//! [Miniscript]: <https://bitcoin.sipa.be/miniscript/>
//!
//! # Examples
//!
//! ```
//! use bitcoin::secp256k1::Secp256k1;
//! use output_descriptors::{Descriptor, DescriptorRequest};
//!
//! let secp = Secp256k1::new();
//! let descriptor = Descriptor::new(
//!     &secp,
//!     DescriptorRequest {
//!         expression:
//!             "wpkh(0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798)"
//!                 .to_owned(),
//!         ..Default::default()
//!     },
//! )
//! .unwrap();
//! assert_eq!(
//!     descriptor.address().unwrap().to_string(),
//!     "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
//! );
//! ```

pub use bitcoin;
pub use miniscript;

pub mod checksum;
pub mod descriptor;
mod error;
mod grammar;
pub mod key;
pub mod limits;
mod range;
mod solver;

pub use crate::checksum::desc_checksum;
pub use crate::descriptor::{Descriptor, DescriptorKind, DescriptorRequest, Payment};
pub use crate::error::Error;
pub use crate::key::{InnerKey, KeyExpression, KeyOrigin};
pub use crate::limits::ScriptRole;
pub use crate::solver::Unknown;
