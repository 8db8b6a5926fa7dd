// SPDX-License-Identifier: CC0-1.0

//! Descriptor grammar
//!
//! Regular expressions for key expressions and descriptor envelopes. The
//! envelope bodies captured as `.*?` are deliberately loose; key bodies are
//! validated by the anchored key-expression parse and miniscript bodies by
//! the compiler. All patterns are compiled once per process.

use std::sync::LazyLock;

use regex::Regex;

const HARDENED: &str = "['hH]";
const BASE58: &str = "[1-9A-HJ-NP-Za-km-z]";

/// A single derivation level: digits with an optional hardened marker.
fn level() -> String {
    format!(r"\d+{}?", HARDENED)
}

/// A derivation path suffix: levels ending in a level or a wildcard.
fn path() -> String {
    format!(r"(?:/{lvl})*/(?:\*{h}?|{lvl})", lvl = level(), h = HARDENED)
}

fn origin() -> String {
    format!(r"\[[0-9a-fA-F]{{8}}(?:/{})*\]", level())
}

const PUBKEY: &str = r"(?:(?:02|03)[0-9a-fA-F]{64}|04[0-9a-fA-F]{128})";
const WIF: &str = r"[5KLc9][1-9A-HJ-NP-Za-km-z]{50,51}";

fn xkey(kind: &str) -> String {
    format!(r"[xXtT]{}{}{{79,108}}", kind, BASE58)
}

/// The full key-expression pattern, without capture groups.
fn key_expression() -> String {
    format!(
        r"(?:{origin})?(?:{xpub}(?:{path})?|{xprv}(?:{path})?|{pubkey}|{wif})",
        origin = origin(),
        xpub = xkey("pub"),
        xprv = xkey("prv"),
        path = path(),
        pubkey = PUBKEY,
        wif = WIF,
    )
}

fn compile(pattern: String) -> Regex {
    Regex::new(&pattern).expect("grammar patterns are well-formed")
}

/// Anchored key expression with named groups, used for parsing.
pub(crate) static RE_KEY_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    compile(format!(
        r"^(?:\[(?P<fingerprint>[0-9a-fA-F]{{8}})(?P<origin_path>(?:/{lvl})*)\])?(?:(?P<xpub>{xpub})(?P<xpub_path>{path})?|(?P<xprv>{xprv})(?P<xprv_path>{path})?|(?P<pubkey>{pubkey})|(?P<wif>{wif}))$",
        lvl = level(),
        xpub = xkey("pub"),
        xprv = xkey("prv"),
        path = path(),
        pubkey = PUBKEY,
        wif = WIF,
    ))
});

/// Unanchored key expression, used to scan miniscript fragments.
pub(crate) static RE_KEY_EXPRESSION_SCAN: LazyLock<Regex> =
    LazyLock::new(|| compile(key_expression()));

pub(crate) static RE_ADDR: LazyLock<Regex> = LazyLock::new(|| compile(r"^addr\((.*?)\)$".into()));
pub(crate) static RE_PK: LazyLock<Regex> = LazyLock::new(|| compile(r"^pk\((.*?)\)$".into()));
pub(crate) static RE_PKH: LazyLock<Regex> =
    LazyLock::new(|| compile(format!(r"^pkh\(({})\)$", key_expression())));
pub(crate) static RE_WPKH: LazyLock<Regex> =
    LazyLock::new(|| compile(format!(r"^wpkh\(({})\)$", key_expression())));
pub(crate) static RE_SH_WPKH: LazyLock<Regex> =
    LazyLock::new(|| compile(format!(r"^sh\(wpkh\(({})\)\)$", key_expression())));
pub(crate) static RE_SH_WSH: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^sh\(wsh\((.*?)\)\)$".into()));
pub(crate) static RE_SH: LazyLock<Regex> = LazyLock::new(|| compile(r"^sh\((.*?)\)$".into()));
pub(crate) static RE_WSH: LazyLock<Regex> = LazyLock::new(|| compile(r"^wsh\((.*?)\)$".into()));
