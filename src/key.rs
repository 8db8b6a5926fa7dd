// SPDX-License-Identifier: CC0-1.0

//! Key expressions
//!
//! Parsing and resolution of descriptor key expressions: raw public keys,
//! WIF-encoded private keys and extended keys with an optional BIP32 origin
//! and derivation path. Resolution turns any of these into the concrete
//! public key it stands for.

use std::fmt;
use std::str::FromStr;

use bitcoin::bip32::{ChildNumber, DerivationPath, Fingerprint, Xpriv, Xpub};
use bitcoin::secp256k1::{Secp256k1, Signing, Verification};
use bitcoin::{Network, NetworkKind, PrivateKey, PublicKey};

use crate::grammar;
use crate::Error;

/// BIP32 origin information prefixed to a key expression, e.g.
/// `[d34db33f/49'/0'/0']`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOrigin {
    /// Fingerprint of the master key this expression descends from.
    pub fingerprint: Fingerprint,
    /// Derivation path from the master key to the expressed key.
    pub path: DerivationPath,
}

/// The actual key inside a key expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerKey {
    /// A hex-encoded public key, compressed or uncompressed.
    Raw(PublicKey),
    /// A WIF-encoded private key.
    Wif(PrivateKey),
    /// An extended public key with a derivation path (possibly empty).
    Xpub {
        /// The encoded key.
        xkey: Xpub,
        /// Derivation steps below the encoded key.
        path: DerivationPath,
    },
    /// An extended private key with a derivation path (possibly empty).
    Xprv {
        /// The encoded key.
        xkey: Xpriv,
        /// Derivation steps below the encoded key.
        path: DerivationPath,
    },
}

/// A parsed key expression.
///
/// Wildcards are resolved textually before key expressions are parsed, so a
/// parsed expression never contains `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExpression {
    /// The origin prefix, if any.
    pub origin: Option<KeyOrigin>,
    /// The key itself.
    pub key: InnerKey,
}

impl KeyExpression {
    /// Resolves the expression to the public key it stands for.
    ///
    /// Extended and WIF keys must match `network`; raw keys carry no network
    /// information. In a SegWit context (`wpkh`, `wsh` and their `sh`-nested
    /// forms) the resolved key must be compressed.
    pub fn resolve<C: Signing + Verification>(
        &self,
        secp: &Secp256k1<C>,
        network: Network,
        is_segwit: bool,
    ) -> Result<PublicKey, Error> {
        let pk = match self.key {
            InnerKey::Raw(pk) => pk,
            InnerKey::Wif(ref sk) => {
                if sk.network != NetworkKind::from(network) {
                    return Err(Error::InvalidWif(sk.to_string()));
                }
                sk.public_key(secp)
            }
            InnerKey::Xpub { ref xkey, ref path } => {
                if xkey.network != NetworkKind::from(network) {
                    return Err(Error::InvalidExtendedKey(xkey.to_string()));
                }
                let derived = xkey.derive_pub(secp, path)?;
                PublicKey::new(derived.public_key)
            }
            InnerKey::Xprv { ref xkey, ref path } => {
                if xkey.network != NetworkKind::from(network) {
                    return Err(Error::InvalidExtendedKey(xkey.to_string()));
                }
                let derived = xkey.derive_priv(secp, path)?;
                derived.to_priv().public_key(secp)
            }
        };
        if is_segwit && !pk.compressed {
            return Err(Error::InvalidPubKey(pk.to_string()));
        }
        Ok(pk)
    }
}

impl FromStr for KeyExpression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let caps = grammar::RE_KEY_EXPRESSION
            .captures(s)
            .ok_or_else(|| Error::BadKeyExpression(s.to_owned()))?;

        let origin = match caps.name("fingerprint") {
            Some(fingerprint) => Some(KeyOrigin {
                fingerprint: Fingerprint::from_str(fingerprint.as_str())
                    .map_err(|_| Error::BadKeyExpression(s.to_owned()))?,
                path: parse_derivation_path(
                    caps.name("origin_path").map_or("", |m| m.as_str()),
                )?,
            }),
            None => None,
        };

        let key = if let Some(xpub) = caps.name("xpub") {
            InnerKey::Xpub {
                xkey: Xpub::from_str(xpub.as_str())
                    .map_err(|_| Error::InvalidExtendedKey(xpub.as_str().to_owned()))?,
                path: parse_derivation_path(caps.name("xpub_path").map_or("", |m| m.as_str()))?,
            }
        } else if let Some(xprv) = caps.name("xprv") {
            InnerKey::Xprv {
                xkey: Xpriv::from_str(xprv.as_str())
                    .map_err(|_| Error::InvalidExtendedKey(xprv.as_str().to_owned()))?,
                path: parse_derivation_path(caps.name("xprv_path").map_or("", |m| m.as_str()))?,
            }
        } else if let Some(pubkey) = caps.name("pubkey") {
            InnerKey::Raw(
                PublicKey::from_str(pubkey.as_str())
                    .map_err(|_| Error::InvalidPubKey(pubkey.as_str().to_owned()))?,
            )
        } else {
            let wif = caps.name("wif").expect("the grammar has no fifth key form");
            InnerKey::Wif(
                PrivateKey::from_wif(wif.as_str())
                    .map_err(|_| Error::InvalidWif(wif.as_str().to_owned()))?,
            )
        };

        Ok(KeyExpression { origin, key })
    }
}

impl fmt::Display for KeyExpression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref origin) = self.origin {
            write!(f, "[{}", origin.fingerprint)?;
            for child in &origin.path {
                write!(f, "/{}", child)?;
            }
            f.write_str("]")?;
        }
        match self.key {
            InnerKey::Raw(ref pk) => write!(f, "{}", pk),
            InnerKey::Wif(ref sk) => write!(f, "{}", sk),
            InnerKey::Xpub { ref xkey, ref path } => {
                write!(f, "{}", xkey)?;
                for child in path {
                    write!(f, "/{}", child)?;
                }
                Ok(())
            }
            InnerKey::Xprv { ref xkey, ref path } => {
                write!(f, "{}", xkey)?;
                for child in path {
                    write!(f, "/{}", child)?;
                }
                Ok(())
            }
        }
    }
}

/// Parses a derivation path suffix like `/44'/0H/1`, normalizing every
/// hardened marker. The empty string is the empty path.
fn parse_derivation_path(path: &str) -> Result<DerivationPath, Error> {
    let mut children = Vec::new();
    let Some(path) = path.strip_prefix('/') else {
        if path.is_empty() {
            return Ok(DerivationPath::from(children));
        }
        return Err(Error::BadKeyExpression(path.to_owned()));
    };
    for element in path.split('/') {
        if element.starts_with('*') {
            return Err(Error::BadKeyExpression(element.to_owned()));
        }
        let (digits, hardened) = match element.strip_suffix(['\'', 'h', 'H']) {
            Some(digits) => (digits, true),
            None => (element, false),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| Error::PathElementOverflow(element.to_owned()))?;
        if value >= 1 << 31 {
            return Err(Error::PathElementOverflow(element.to_owned()));
        }
        let child = if hardened {
            ChildNumber::from_hardened_idx(value as u32)?
        } else {
            ChildNumber::from_normal_idx(value as u32)?
        };
        children.push(child);
    }
    Ok(DerivationPath::from(children))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const RAW_UNCOMPRESSED: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";
    const XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
    const XPRV: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
    const TPUB: &str = "tpubD6NzVbkrYhZ4XgiXtGrdW5XDAPFCL9h7we1vwNCpn8tGbBcgfVYjXyhWo4E1xkh56hjod1RhGjxbaTLV3X4FyWuejifB9jusQ46QzG87VKp";

    #[test]
    fn raw_keys() {
        let secp = Secp256k1::new();
        let expr: KeyExpression = RAW.parse().unwrap();
        let pk = expr.resolve(&secp, Network::Bitcoin, true).unwrap();
        assert_eq!(pk.to_string(), RAW);

        let expr: KeyExpression = RAW_UNCOMPRESSED.parse().unwrap();
        assert!(expr.resolve(&secp, Network::Bitcoin, false).is_ok());
        assert!(matches!(
            expr.resolve(&secp, Network::Bitcoin, true),
            Err(Error::InvalidPubKey(_))
        ));
    }

    #[test]
    fn not_a_point() {
        // The right shape, but x is not on the curve.
        let bogus = format!("02{}", "ff".repeat(32));
        assert!(matches!(bogus.parse::<KeyExpression>(), Err(Error::InvalidPubKey(_))));
    }

    #[test]
    fn wif_keys() {
        let secp = Secp256k1::new();
        // Private key 1, mainnet, compressed: resolves to the generator point.
        let expr: KeyExpression = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
            .parse()
            .unwrap();
        assert_eq!(expr.resolve(&secp, Network::Bitcoin, true).unwrap().to_string(), RAW);
        assert!(matches!(
            expr.resolve(&secp, Network::Testnet, true),
            Err(Error::InvalidWif(_))
        ));

        // Same key, testnet version byte; regtest shares it.
        let expr: KeyExpression = "cMahea7zqjxrtgAbB7LSGbcQUr1uX1ojuat9jZodMN87JcbXMTcA"
            .parse()
            .unwrap();
        assert_eq!(expr.resolve(&secp, Network::Regtest, true).unwrap().to_string(), RAW);
        assert!(matches!(
            expr.resolve(&secp, Network::Bitcoin, true),
            Err(Error::InvalidWif(_))
        ));

        // Uncompressed WIF resolves to an uncompressed key.
        let expr: KeyExpression = "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf"
            .parse()
            .unwrap();
        assert_eq!(
            expr.resolve(&secp, Network::Bitcoin, false).unwrap().to_string(),
            RAW_UNCOMPRESSED
        );
        assert!(matches!(
            expr.resolve(&secp, Network::Bitcoin, true),
            Err(Error::InvalidPubKey(_))
        ));
    }

    #[test]
    fn extended_keys() {
        let secp = Secp256k1::new();
        let expr: KeyExpression = format!("{}/0/0", XPUB).parse().unwrap();
        let pk = expr.resolve(&secp, Network::Bitcoin, true).unwrap();
        assert_eq!(
            pk.to_string(),
            "02756de182c5dd4b717ea87e693006da62dbb3cddaa4a5cad2ed1f5bbab755f0f5"
        );

        // The xprv of the same node derives the same child key.
        let expr: KeyExpression = format!("{}/0/0", XPRV).parse().unwrap();
        assert_eq!(expr.resolve(&secp, Network::Bitcoin, true).unwrap(), pk);

        // Hardened steps work on the private key but not on the public one.
        let expr: KeyExpression = format!("{}/0h/0", XPRV).parse().unwrap();
        assert!(expr.resolve(&secp, Network::Bitcoin, true).is_ok());
        let expr: KeyExpression = format!("{}/0h/0", XPUB).parse().unwrap();
        assert!(matches!(expr.resolve(&secp, Network::Bitcoin, true), Err(Error::Bip32(_))));
    }

    #[test]
    fn extended_key_networks() {
        let secp = Secp256k1::new();
        let expr: KeyExpression = TPUB.parse().unwrap();
        assert!(expr.resolve(&secp, Network::Regtest, true).is_ok());
        assert!(expr.resolve(&secp, Network::Signet, true).is_ok());
        assert!(matches!(
            expr.resolve(&secp, Network::Bitcoin, true),
            Err(Error::InvalidExtendedKey(_))
        ));
        let expr: KeyExpression = XPUB.parse().unwrap();
        assert!(matches!(
            expr.resolve(&secp, Network::Testnet, true),
            Err(Error::InvalidExtendedKey(_))
        ));
    }

    #[test]
    fn origin_and_display() {
        let expr: KeyExpression = format!("[d34db33f/49h/0H/0']{}/0/0", XPUB).parse().unwrap();
        let origin = expr.origin.as_ref().unwrap();
        assert_eq!(origin.fingerprint.to_string(), "d34db33f");
        assert_eq!(origin.path, "m/49'/0'/0'".parse::<DerivationPath>().unwrap());
        // Hardened markers are normalized on display.
        assert_eq!(expr.to_string(), format!("[d34db33f/49'/0'/0']{}/0/0", XPUB));
    }

    #[test]
    fn path_bounds() {
        assert!(format!("{}/2147483647", XPUB).parse::<KeyExpression>().is_ok());
        assert!(matches!(
            format!("{}/2147483648", XPUB).parse::<KeyExpression>(),
            Err(Error::PathElementOverflow(_))
        ));
        assert!(matches!(
            format!("{}/99999999999999999999", XPUB).parse::<KeyExpression>(),
            Err(Error::PathElementOverflow(_))
        ));
    }

    #[test]
    fn wildcard_must_be_resolved_first() {
        assert!(matches!(
            format!("{}/0/*", XPUB).parse::<KeyExpression>(),
            Err(Error::BadKeyExpression(_))
        ));
    }

    #[test]
    fn not_a_key() {
        assert!(matches!("notakey".parse::<KeyExpression>(), Err(Error::BadKeyExpression(_))));
    }
}
