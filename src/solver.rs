// SPDX-License-Identifier: CC0-1.0

//! Miniscript solving
//!
//! Substitutes the key expressions of a miniscript fragment with opaque
//! placeholders `@0, @1, …`, hands the bare fragment to the miniscript
//! compiler, substitutes the resolved keys back, and assembles the binary
//! locking script together with a non-malleable satisfaction template. The
//! compiler only ever sees placeholder keys; substitution happens after
//! compilation.

use std::collections::HashSet;

use bitcoin::hashes::{hash160, ripemd160, sha256};
use bitcoin::secp256k1::{Secp256k1, Signing, Verification};
use bitcoin::{absolute, relative, Network, PublicKey, ScriptBuf};
use miniscript::miniscript::satisfy::{Placeholder, Witness};
use miniscript::plan::AssetProvider;
use miniscript::{
    hash256, Legacy, Miniscript, ScriptContext, Segwitv0, TranslateErr, TranslatePk, Translator,
};

use crate::key::KeyExpression;
use crate::limits::{self, ScriptRole};
use crate::{grammar, Error};

/// Satisfaction material the caller does not expect to hold at signing time.
///
/// Anything not named here is assumed available: every key can sign and every
/// preimage is known. Naming a signature or preimage steers template
/// selection away from spending paths that need it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unknown {
    /// No signature will be available for this key.
    Signature(PublicKey),
    /// The preimage of this SHA-256 hash is not known.
    Sha256Preimage(sha256::Hash),
    /// The preimage of this double-SHA-256 hash is not known.
    Hash256Preimage(hash256::Hash),
    /// The preimage of this RIPEMD-160 hash is not known.
    Ripemd160Preimage(ripemd160::Hash),
    /// The preimage of this HASH160 hash is not known.
    Hash160Preimage(hash160::Hash),
}

/// A solved miniscript fragment: the binary locking script and the chosen
/// satisfaction assembly.
#[derive(Debug)]
pub(crate) struct Solution {
    pub(crate) script: ScriptBuf,
    pub(crate) sat_asm: String,
}

/// Solves a fragment destined for `wsh(...)` or `sh(wsh(...))`.
pub(crate) fn solve_segwit<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    fragment: &str,
    network: Network,
    unknowns: &HashSet<Unknown>,
) -> Result<Solution, Error> {
    solve::<Segwitv0, C>(secp, fragment, network, true, unknowns)
}

/// Solves a fragment destined for a bare `sh(...)`.
pub(crate) fn solve_legacy<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    fragment: &str,
    network: Network,
    unknowns: &HashSet<Unknown>,
) -> Result<Solution, Error> {
    solve::<Legacy, C>(secp, fragment, network, false, unknowns)
}

fn solve<Ctx: ScriptContext, C: Signing + Verification>(
    secp: &Secp256k1<C>,
    fragment: &str,
    network: Network,
    is_segwit: bool,
    unknowns: &HashSet<Unknown>,
) -> Result<Solution, Error> {
    let (bare, keys) = substitute_keys(secp, fragment, network, is_segwit)?;

    let mut seen = HashSet::with_capacity(keys.len());
    for key in &keys {
        if !seen.insert(key) {
            return Err(Error::DuplicateKey(key.to_string()));
        }
    }

    let ms = Miniscript::<String, Ctx>::from_str_insane(&bare).map_err(compile_error)?;
    check_sanity(&ms)?;

    let mut substitution = KeySubstitution { keys: &keys };
    let ms: Miniscript<PublicKey, Ctx> = match ms.translate_pk(&mut substitution) {
        Ok(ms) => ms,
        Err(TranslateErr::TranslatorErr(e)) => return Err(e),
        Err(TranslateErr::OuterError(e)) => return Err(compile_error(e)),
    };

    let script = ms.encode();
    let template = ms.build_template(&TemplateAssets { keys: &keys, unknowns });
    let stack = match template.stack {
        Witness::Stack(stack) => stack,
        _ => return Err(Error::Unsatisfiable),
    };

    Ok(Solution { script, sat_asm: render_stack(&stack, &keys)? })
}

/// Replaces the i-th key expression of the fragment with `@i`, resolving
/// each to its public key along the way.
fn substitute_keys<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    fragment: &str,
    network: Network,
    is_segwit: bool,
) -> Result<(String, Vec<PublicKey>), Error> {
    let mut bare = String::with_capacity(fragment.len());
    let mut keys = Vec::new();
    let mut tail = 0;
    for found in grammar::RE_KEY_EXPRESSION_SCAN.find_iter(fragment) {
        let expression: KeyExpression = found.as_str().parse()?;
        bare.push_str(&fragment[tail..found.start()]);
        bare.push('@');
        bare.push_str(&keys.len().to_string());
        keys.push(expression.resolve(secp, network, is_segwit)?);
        tail = found.end();
    }
    bare.push_str(&fragment[tail..]);
    Ok((bare, keys))
}

/// The sanity properties the external compiler reports as `issane`. Resource
/// limits are checked separately, on the realized script.
fn check_sanity<Ctx: ScriptContext>(ms: &Miniscript<String, Ctx>) -> Result<(), Error> {
    if !ms.requires_sig() {
        Err(Error::UnsaneMiniscript("some spending path needs no signature"))
    } else if !ms.is_non_malleable() {
        Err(Error::UnsaneMiniscript("a third party could malleate a satisfaction"))
    } else if ms.has_mixed_timelocks() {
        Err(Error::UnsaneMiniscript("mixes block-height and clock-time timelocks"))
    } else if ms.has_repeated_keys() {
        Err(Error::UnsaneMiniscript("contains repeated public keys"))
    } else {
        Ok(())
    }
}

/// Maps the compiler's resource-limit rejections onto the crate's own limit
/// errors; everything else passes through.
///
/// `miniscript::miniscript::context::ScriptContextError` is a `pub(crate)`
/// item in this version of the `miniscript` crate, so its variants cannot be
/// named or matched on from here. The context error's `Display` text is
/// stable across the crate's own tests (see `miniscript/src/miniscript/context.rs`),
/// so the specific resource-limit rejections are recovered from it instead.
fn compile_error(e: miniscript::Error) -> Error {
    if let miniscript::Error::ContextError(ref context_error) = e {
        let message = context_error.to_string();
        if message.contains("MAX_SCRIPT_ELEMENT_SIZE") {
            return Error::ScriptTooLarge {
                role: ScriptRole::Redeem,
                size: None,
                limit: limits::MAX_REDEEM_SCRIPT_SIZE,
            };
        } else if message.contains("MAX_STANDARD_P2WSH_SCRIPT_SIZE") {
            return Error::ScriptTooLarge {
                role: ScriptRole::Witness,
                size: None,
                limit: limits::MAX_WITNESS_SCRIPT_SIZE,
            };
        } else if message.contains("MAX_OPS_PER_SCRIPT") {
            return Error::TooManyOps { count: None, limit: limits::MAX_OPS_PER_SCRIPT };
        }
    }
    Error::Miniscript(e)
}

/// Translates `@i` placeholders back to the keys they stand for. Hash
/// literals cross unchanged, re-parsed into their binary form.
struct KeySubstitution<'a> {
    keys: &'a [PublicKey],
}

impl Translator<String, PublicKey, Error> for KeySubstitution<'_> {
    fn pk(&mut self, pk: &String) -> Result<PublicKey, Error> {
        pk.strip_prefix('@')
            .and_then(|index| index.parse::<usize>().ok())
            .and_then(|index| self.keys.get(index))
            .copied()
            .ok_or_else(|| Error::BadKeyExpression(pk.clone()))
    }

    fn sha256(&mut self, hash: &String) -> Result<sha256::Hash, Error> {
        hash.parse().map_err(|_| Error::InvalidHashLiteral(hash.clone()))
    }

    fn hash256(&mut self, hash: &String) -> Result<hash256::Hash, Error> {
        hash.parse().map_err(|_| Error::InvalidHashLiteral(hash.clone()))
    }

    fn ripemd160(&mut self, hash: &String) -> Result<ripemd160::Hash, Error> {
        hash.parse().map_err(|_| Error::InvalidHashLiteral(hash.clone()))
    }

    fn hash160(&mut self, hash: &String) -> Result<hash160::Hash, Error> {
        hash.parse().map_err(|_| Error::InvalidHashLiteral(hash.clone()))
    }
}

/// The key a satisfier-side `HASH160` digest stands for, if it is one of the
/// fragment's resolved keys.
fn key_for_hash(keys: &[PublicKey], hash: &hash160::Hash) -> Option<PublicKey> {
    keys.iter().copied().find(|pk| pk.pubkey_hash().to_raw_hash() == *hash)
}

/// Reports every signature and preimage as available unless listed in the
/// unknowns, and every timelock as satisfiable: timelocks become template
/// constraints rather than missing assets. `pkh` fragments look keys up by
/// their hash, so those are answered from the resolved key set.
struct TemplateAssets<'a> {
    keys: &'a [PublicKey],
    unknowns: &'a HashSet<Unknown>,
}

impl AssetProvider<PublicKey> for TemplateAssets<'_> {
    fn provider_lookup_ecdsa_sig(&self, pk: &PublicKey) -> bool {
        !self.unknowns.contains(&Unknown::Signature(*pk))
    }

    fn provider_lookup_raw_pkh_pk(&self, hash: &hash160::Hash) -> Option<PublicKey> {
        key_for_hash(self.keys, hash)
    }

    fn provider_lookup_raw_pkh_ecdsa_sig(&self, hash: &hash160::Hash) -> Option<PublicKey> {
        key_for_hash(self.keys, hash)
            .filter(|pk| !self.unknowns.contains(&Unknown::Signature(*pk)))
    }

    fn provider_lookup_sha256(&self, hash: &sha256::Hash) -> bool {
        !self.unknowns.contains(&Unknown::Sha256Preimage(*hash))
    }

    fn provider_lookup_hash256(&self, hash: &hash256::Hash) -> bool {
        !self.unknowns.contains(&Unknown::Hash256Preimage(*hash))
    }

    fn provider_lookup_ripemd160(&self, hash: &ripemd160::Hash) -> bool {
        !self.unknowns.contains(&Unknown::Ripemd160Preimage(*hash))
    }

    fn provider_lookup_hash160(&self, hash: &hash160::Hash) -> bool {
        !self.unknowns.contains(&Unknown::Hash160Preimage(*hash))
    }

    fn check_older(&self, _: relative::LockTime) -> bool {
        true
    }

    fn check_after(&self, _: absolute::LockTime) -> bool {
        true
    }
}

/// Renders a satisfaction template stack as assembly. Signatures and
/// preimages stay placeholders for the signing stage; everything else is
/// concrete. Hash-addressed key and signature items are rendered through the
/// key they resolve to, like their directly-keyed counterparts.
fn render_stack(stack: &[Placeholder<PublicKey>], keys: &[PublicKey]) -> Result<String, Error> {
    let mut asm = String::new();
    for item in stack {
        if !asm.is_empty() {
            asm.push(' ');
        }
        match item {
            Placeholder::Pubkey(pk, _) => asm.push_str(&format!("<{}>", pk)),
            Placeholder::PubkeyHash(hash, _) => match key_for_hash(keys, hash) {
                Some(pk) => asm.push_str(&format!("<{}>", pk)),
                None => asm.push_str(&format!("<{}>", hash)),
            },
            Placeholder::EcdsaSigPk(pk) => asm.push_str(&format!("<sig({})>", pk)),
            Placeholder::EcdsaSigPkHash(hash) => match key_for_hash(keys, hash) {
                Some(pk) => asm.push_str(&format!("<sig({})>", pk)),
                None => asm.push_str(&format!("<sig({})>", hash)),
            },
            Placeholder::Sha256Preimage(hash) => {
                asm.push_str(&format!("<sha256_preimage({})>", hash))
            }
            Placeholder::Hash256Preimage(hash) => {
                asm.push_str(&format!("<hash256_preimage({})>", hash))
            }
            Placeholder::Ripemd160Preimage(hash) => {
                asm.push_str(&format!("<ripemd160_preimage({})>", hash))
            }
            Placeholder::Hash160Preimage(hash) => {
                asm.push_str(&format!("<hash160_preimage({})>", hash))
            }
            Placeholder::HashDissatisfaction => {
                asm.push('<');
                asm.push_str(&"00".repeat(32));
                asm.push('>');
            }
            Placeholder::PushZero => asm.push('0'),
            Placeholder::PushOne => asm.push('1'),
            // Taproot material cannot appear in an ECDSA template.
            _ => return Err(Error::Unsatisfiable),
        }
    }
    Ok(asm)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
    const SHA: &str = "50929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0";

    #[test]
    fn placeholders_in_order_of_appearance() {
        let secp = Secp256k1::new();
        let fragment = format!("or_b(pk({}/0/0),a:pk({}))", XPUB, RAW);
        let (bare, keys) = substitute_keys(&secp, &fragment, Network::Bitcoin, true).unwrap();
        assert_eq!(bare, "or_b(pk(@0),a:pk(@1))");
        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys[0].to_string(),
            "02756de182c5dd4b717ea87e693006da62dbb3cddaa4a5cad2ed1f5bbab755f0f5"
        );
        assert_eq!(keys[1].to_string(), RAW);
    }

    #[test]
    fn single_key() {
        let secp = Secp256k1::new();
        let solution =
            solve_segwit(&secp, &format!("pk({})", RAW), Network::Bitcoin, &HashSet::new())
                .unwrap();
        assert_eq!(solution.script.to_hex_string(), format!("21{}ac", RAW));
        assert_eq!(solution.sat_asm, format!("<sig({})>", RAW));
    }

    #[test]
    fn hashed_key() {
        let secp = Secp256k1::new();
        let solution =
            solve_segwit(&secp, &format!("pkh({})", RAW), Network::Bitcoin, &HashSet::new())
                .unwrap();
        assert_eq!(
            solution.script.to_hex_string(),
            "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac"
        );
        // The satisfaction carries the signature and the key itself, both
        // rendered through the key the hash resolves to.
        assert!(solution.sat_asm.contains(&format!("<sig({})>", RAW)));
        assert!(solution.sat_asm.contains(&format!("<{}>", RAW)));

        let unknowns: HashSet<Unknown> =
            [Unknown::Signature(RAW.parse().unwrap())].into_iter().collect();
        let err =
            solve_segwit(&secp, &format!("pkh({})", RAW), Network::Bitcoin, &unknowns)
                .unwrap_err();
        assert!(matches!(err, Error::Unsatisfiable));
    }

    #[test]
    fn duplicate_keys_rejected() {
        let secp = Secp256k1::new();
        // Distinct expressions, same resolved key.
        let fragment = format!("or_b(pk([d34db33f/44']{}),a:pk({}))", RAW, RAW);
        let err =
            solve_segwit(&secp, &fragment, Network::Bitcoin, &HashSet::new()).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[test]
    fn sigless_fragment_is_unsane() {
        let secp = Secp256k1::new();
        let err = solve_segwit(&secp, "older(5)", Network::Bitcoin, &HashSet::new()).unwrap_err();
        assert!(matches!(err, Error::UnsaneMiniscript(_)));
    }

    #[test]
    fn preimage_placeholders_survive() {
        let secp = Secp256k1::new();
        let fragment = format!("and_v(v:sha256({}),pk({}))", SHA, RAW);
        let solution =
            solve_segwit(&secp, &fragment, Network::Bitcoin, &HashSet::new()).unwrap();
        assert!(solution.sat_asm.contains(&format!("<sha256_preimage({})>", SHA)));
        assert!(solution.sat_asm.contains(&format!("<sig({})>", RAW)));
        assert!(!solution.sat_asm.contains('@'));

        // Marking the preimage unknown makes the only path unsatisfiable.
        let unknowns: HashSet<Unknown> =
            [Unknown::Sha256Preimage(SHA.parse().unwrap())].into_iter().collect();
        let err = solve_segwit(&secp, &fragment, Network::Bitcoin, &unknowns).unwrap_err();
        assert!(matches!(err, Error::Unsatisfiable));
    }

    #[test]
    fn multisig_template() {
        let secp = Secp256k1::new();
        let fragment = format!("multi(2,{}/7,{}/8)", XPUB, XPUB);
        let solution =
            solve_segwit(&secp, &fragment, Network::Bitcoin, &HashSet::new()).unwrap();
        // CHECKMULTISIG satisfactions lead with the dummy element.
        assert!(solution.sat_asm.starts_with('0'));
        assert_eq!(solution.sat_asm.matches("<sig(").count(), 2);
    }
}
