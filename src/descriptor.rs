// SPDX-License-Identifier: CC0-1.0

//! Descriptor realization
//!
//! Dispatches an isolated descriptor expression to its envelope handler,
//! builds the payment (address, scriptPubKey, redeem and witness scripts),
//! enforces script resource limits and stores the satisfaction template for
//! miniscript envelopes.

use std::collections::HashSet;

use bitcoin::address::NetworkUnchecked;
use bitcoin::secp256k1::{Secp256k1, Signing, Verification};
use bitcoin::{Address, CompressedPublicKey, Network, PublicKey, Script, ScriptBuf};

use crate::key::KeyExpression;
use crate::limits::{self, ScriptRole};
use crate::solver::{self, Unknown};
use crate::{checksum, grammar, range, Error};

/// The envelope forms a descriptor can take.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// `addr(ADDRESS)`
    Addr,
    /// `pk(KEY)`
    Pk,
    /// `pkh(KEY)`
    Pkh,
    /// `wpkh(KEY)`
    Wpkh,
    /// `sh(wpkh(KEY))`
    ShWpkh,
    /// `sh(MINISCRIPT)`
    ShMs,
    /// `wsh(MINISCRIPT)`
    WshMs,
    /// `sh(wsh(MINISCRIPT))`
    ShWshMs,
}

/// The realized payment of a descriptor.
///
/// Which fields are populated depends on the envelope: every kind except
/// `pk(...)` has an address, `sh(...)` kinds carry a redeem script and
/// `wsh(...)` kinds a witness script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payment {
    /// The address, for every kind that defines one.
    pub address: Option<Address>,
    /// The output locking script.
    pub script_pubkey: ScriptBuf,
    /// The P2SH redeem script.
    pub redeem_script: Option<ScriptBuf>,
    /// The P2WSH witness script.
    pub witness_script: Option<ScriptBuf>,
}

/// Construction parameters for [`Descriptor::new`].
#[derive(Clone, Debug)]
pub struct DescriptorRequest {
    /// The descriptor expression, with or without a trailing checksum.
    pub expression: String,
    /// Derivation index materializing `*` wildcards. Required iff the
    /// expression is ranged.
    pub index: Option<u32>,
    /// Reject expressions that carry no checksum.
    pub require_checksum: bool,
    /// Accept any miniscript head under bare `sh(...)`, not just the
    /// standard ones. Consensus or standardness may still reject the
    /// resulting spend; that is on the caller.
    pub allow_miniscript_in_p2sh: bool,
    /// Satisfaction material assumed unavailable when choosing the
    /// satisfaction template.
    pub unknowns: HashSet<Unknown>,
    /// The network keys and addresses must belong to.
    pub network: Network,
}

impl Default for DescriptorRequest {
    fn default() -> Self {
        DescriptorRequest {
            expression: String::new(),
            index: None,
            require_checksum: false,
            allow_miniscript_in_p2sh: false,
            unknowns: HashSet::new(),
            network: Network::Bitcoin,
        }
    }
}

/// A realized output descriptor.
///
/// Constructed in one shot by [`Descriptor::new`] from validated inputs and
/// immutable afterwards.
#[derive(Clone, Debug)]
pub struct Descriptor {
    kind: DescriptorKind,
    network: Network,
    payment: Payment,
    sat_asm: Option<String>,
}

/// Miniscript heads accepted under bare `sh(...)` by default.
const P2SH_MINISCRIPT_HEADS: [&str; 8] = [
    "pk(", "pkh(", "wpkh(", "combo(", "multi(", "sortedmulti(", "multi_a(", "sortedmulti_a(",
];

impl Descriptor {
    /// Parses and realizes a descriptor expression.
    ///
    /// The expression is checksum-stripped and wildcard-materialized, matched
    /// against the envelope forms in a fixed order (`addr`, `pk`, `pkh`,
    /// `sh(wpkh)`, `wpkh`, `sh(wsh)`, `sh`, `wsh`), and realized into a
    /// [`Payment`]. Fails fast; see [`Error`] for every way this can reject
    /// an expression.
    pub fn new<C: Signing + Verification>(
        secp: &Secp256k1<C>,
        request: DescriptorRequest,
    ) -> Result<Descriptor, Error> {
        let DescriptorRequest {
            expression,
            index,
            require_checksum,
            allow_miniscript_in_p2sh,
            unknowns,
            network,
        } = request;
        let bare = range::isolate(&expression, index, require_checksum)?;

        if let Some(caps) = grammar::RE_ADDR.captures(&bare) {
            let body = &caps[1];
            let address = body
                .parse::<Address<NetworkUnchecked>>()
                .ok()
                .and_then(|address| address.require_network(network).ok())
                .ok_or_else(|| Error::InvalidAddress(body.to_owned()))?;
            return Ok(Descriptor {
                kind: DescriptorKind::Addr,
                network,
                payment: Payment {
                    script_pubkey: address.script_pubkey(),
                    address: Some(address),
                    redeem_script: None,
                    witness_script: None,
                },
                sat_asm: None,
            });
        }

        if let Some(caps) = grammar::RE_PK.captures(&bare) {
            let pk = caps[1].parse::<KeyExpression>()?.resolve(secp, network, false)?;
            return Ok(Descriptor {
                kind: DescriptorKind::Pk,
                network,
                payment: Payment {
                    address: None,
                    script_pubkey: ScriptBuf::new_p2pk(&pk),
                    redeem_script: None,
                    witness_script: None,
                },
                sat_asm: None,
            });
        }

        if let Some(caps) = grammar::RE_PKH.captures(&bare) {
            let pk = caps[1].parse::<KeyExpression>()?.resolve(secp, network, false)?;
            let address = Address::p2pkh(pk, network);
            return Ok(Descriptor {
                kind: DescriptorKind::Pkh,
                network,
                payment: Payment {
                    script_pubkey: address.script_pubkey(),
                    address: Some(address),
                    redeem_script: None,
                    witness_script: None,
                },
                sat_asm: None,
            });
        }

        if let Some(caps) = grammar::RE_SH_WPKH.captures(&bare) {
            let pk = caps[1].parse::<KeyExpression>()?.resolve(secp, network, true)?;
            let pk = compressed(pk)?;
            let address = Address::p2shwpkh(&pk, network);
            return Ok(Descriptor {
                kind: DescriptorKind::ShWpkh,
                network,
                payment: Payment {
                    script_pubkey: address.script_pubkey(),
                    address: Some(address),
                    redeem_script: Some(ScriptBuf::new_p2wpkh(&pk.wpubkey_hash())),
                    witness_script: None,
                },
                sat_asm: None,
            });
        }

        if let Some(caps) = grammar::RE_WPKH.captures(&bare) {
            let pk = caps[1].parse::<KeyExpression>()?.resolve(secp, network, true)?;
            let pk = compressed(pk)?;
            let address = Address::p2wpkh(&pk, network);
            return Ok(Descriptor {
                kind: DescriptorKind::Wpkh,
                network,
                payment: Payment {
                    script_pubkey: address.script_pubkey(),
                    address: Some(address),
                    redeem_script: None,
                    witness_script: None,
                },
                sat_asm: None,
            });
        }

        if let Some(caps) = grammar::RE_SH_WSH.captures(&bare) {
            let solution = solver::solve_segwit(secp, &caps[1], network, &unknowns)?;
            limits::check_resource_limits(&solution.script, ScriptRole::Witness)?;
            let redeem = ScriptBuf::new_p2wsh(&solution.script.wscript_hash());
            let address = p2sh_address(&redeem, network)?;
            return Ok(Descriptor {
                kind: DescriptorKind::ShWshMs,
                network,
                payment: Payment {
                    script_pubkey: address.script_pubkey(),
                    address: Some(address),
                    redeem_script: Some(redeem),
                    witness_script: Some(solution.script),
                },
                sat_asm: Some(solution.sat_asm),
            });
        }

        if let Some(caps) = grammar::RE_SH.captures(&bare) {
            let body = &caps[1];
            if !allow_miniscript_in_p2sh
                && !P2SH_MINISCRIPT_HEADS.iter().any(|head| body.starts_with(head))
            {
                return Err(Error::MiniscriptNotAllowedInP2sh(body.to_owned()));
            }
            let solution = solver::solve_legacy(secp, body, network, &unknowns)?;
            limits::check_resource_limits(&solution.script, ScriptRole::Redeem)?;
            let address = p2sh_address(&solution.script, network)?;
            return Ok(Descriptor {
                kind: DescriptorKind::ShMs,
                network,
                payment: Payment {
                    script_pubkey: address.script_pubkey(),
                    address: Some(address),
                    redeem_script: Some(solution.script),
                    witness_script: None,
                },
                sat_asm: Some(solution.sat_asm),
            });
        }

        if let Some(caps) = grammar::RE_WSH.captures(&bare) {
            let solution = solver::solve_segwit(secp, &caps[1], network, &unknowns)?;
            limits::check_resource_limits(&solution.script, ScriptRole::Witness)?;
            let address = Address::p2wsh(&solution.script, network);
            return Ok(Descriptor {
                kind: DescriptorKind::WshMs,
                network,
                payment: Payment {
                    script_pubkey: address.script_pubkey(),
                    address: Some(address),
                    redeem_script: None,
                    witness_script: Some(solution.script),
                },
                sat_asm: Some(solution.sat_asm),
            });
        }

        Err(Error::Parse(bare))
    }

    /// The envelope form this descriptor used.
    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    /// The network this descriptor was realized for.
    pub fn network(&self) -> Network {
        self.network
    }

    /// The realized payment.
    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    /// The address of this descriptor's output.
    ///
    /// Errors with [`Error::NoAddress`] for `pk(...)`, the one kind without
    /// an address form.
    pub fn address(&self) -> Result<&Address, Error> {
        self.payment.address.as_ref().ok_or(Error::NoAddress)
    }

    /// The output locking script.
    pub fn script_pubkey(&self) -> &Script {
        &self.payment.script_pubkey
    }

    /// The satisfaction assembly template, present iff the descriptor
    /// contains miniscript.
    ///
    /// `<sig(<pubkey>)>` and `<…_preimage(<hash>)>` tokens are placeholders
    /// for the signing stage; all other tokens are concrete.
    pub fn satisfaction(&self) -> Option<&str> {
        self.sat_asm.as_deref()
    }

    /// Computes the checksum of a descriptor expression.
    pub fn checksum(expression: &str) -> Result<String, Error> {
        checksum::desc_checksum(expression)
    }

    /// Resolves a single key expression to the public key it stands for.
    pub fn key_expression_to_pub_key<C: Signing + Verification>(
        secp: &Secp256k1<C>,
        expression: &str,
        network: Network,
        is_segwit: bool,
    ) -> Result<PublicKey, Error> {
        expression.parse::<KeyExpression>()?.resolve(secp, network, is_segwit)
    }
}

fn compressed(pk: PublicKey) -> Result<CompressedPublicKey, Error> {
    CompressedPublicKey::try_from(pk).map_err(|_| Error::InvalidPubKey(pk.to_string()))
}

fn p2sh_address(redeem: &Script, network: Network) -> Result<Address, Error> {
    Address::p2sh(redeem, network).map_err(|_| Error::ScriptTooLarge {
        role: ScriptRole::Redeem,
        size: Some(redeem.len()),
        limit: limits::MAX_REDEEM_SCRIPT_SIZE,
    })
}
