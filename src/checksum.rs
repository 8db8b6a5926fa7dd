// SPDX-License-Identifier: CC0-1.0

//! Descriptor checksum
//!
//! The 8-symbol checksum Bitcoin Core appends to output descriptors,
//! specified in [BIP-380]. Covers the descriptor string before any `#`.
//!
//! [BIP-380]: <https://github.com/bitcoin/bips/blob/master/bip-0380.mediawiki>

use crate::Error;

const INPUT_CHARSET: &str = "0123456789()[],'/*abcdefgh@:$%{}IJKLMNOPQRSTUVWXYZ&+-.;<=>?!^_|~ijklmnopqrstuvwxyzABCDEFGH`#\"\\ ";
const CHECKSUM_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const CHECKSUM_LENGTH: usize = 8;

fn poly_mod(mut c: u64, val: u64) -> u64 {
    let c0 = c >> 35;

    c = ((c & 0x7ffffffff) << 5) ^ val;
    if c0 & 1 > 0 {
        c ^= 0xf5dee51989
    };
    if c0 & 2 > 0 {
        c ^= 0xa9fdca3312
    };
    if c0 & 4 > 0 {
        c ^= 0x1bab10e32d
    };
    if c0 & 8 > 0 {
        c ^= 0x3706b1677a
    };
    if c0 & 16 > 0 {
        c ^= 0x644d626ffd
    };

    c
}

/// Computes the checksum of a descriptor string.
///
/// The input is the descriptor body, without any `#` suffix. This does not
/// check that the descriptor is syntactically meaningful, only that every
/// character belongs to the descriptor charset.
pub fn desc_checksum(desc: &str) -> Result<String, Error> {
    let mut c = 1u64;
    let mut cls = 0u64;
    let mut clscount = 0;

    for ch in desc.chars() {
        let pos = INPUT_CHARSET.find(ch).ok_or(Error::InvalidCharacter(ch))? as u64;
        c = poly_mod(c, pos & 31);
        cls = cls * 3 + (pos >> 5);
        clscount += 1;
        if clscount == 3 {
            c = poly_mod(c, cls);
            cls = 0;
            clscount = 0;
        }
    }
    if clscount > 0 {
        c = poly_mod(c, cls);
    }
    (0..CHECKSUM_LENGTH).for_each(|_| c = poly_mod(c, 0));
    c ^= 1;

    let mut checksum = String::with_capacity(CHECKSUM_LENGTH);
    for i in 0..CHECKSUM_LENGTH {
        let idx = ((c >> (5 * (CHECKSUM_LENGTH - 1 - i))) & 31) as usize;
        checksum.push(
            CHECKSUM_CHARSET
                .as_bytes()
                .get(idx)
                .copied()
                .map(char::from)
                .expect("index masked to the 32-symbol charset"),
        );
    }
    Ok(checksum)
}

/// Verifies and strips a trailing `#checksum`, returning the descriptor body.
///
/// With `required` set, a descriptor without a checksum is rejected.
pub(crate) fn verify_checksum(s: &str, required: bool) -> Result<&str, Error> {
    for ch in s.as_bytes() {
        if *ch < 20 || *ch > 127 {
            return Err(Error::Unprintable(*ch));
        }
    }

    let mut parts = s.splitn(2, '#');
    let desc_str = parts.next().expect("splitn always yields one part");
    match parts.next() {
        Some(checksum_str) => {
            let expected = desc_checksum(desc_str)?;
            if checksum_str != expected {
                return Err(Error::InvalidChecksum {
                    descriptor: desc_str.to_owned(),
                    expected,
                });
            }
            Ok(desc_str)
        }
        None if required => Err(Error::MissingChecksum(s.to_owned())),
        None => Ok(desc_str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! check_expected {
        ($desc: expr, $checksum: expr) => {
            assert_eq!(desc_checksum($desc).unwrap(), $checksum);
        };
    }

    #[test]
    fn known_checksums() {
        // BIP-380 test vector.
        check_expected!("raw(deadbeef)", "89f8spxm");
        check_expected!(
            "wpkh(tprv8ZgxMBicQKsPdpkqS7Eair4YxjcuuvDPNYmKX3sCniCf16tHEVrjjiSXEkFRnUH77yXc6ZcwHHcLNfjdi5qUvw3VDfgYiH5mNsj5izuiu2N/1/2/*)",
            "tqz0nc62"
        );
        check_expected!(
            "pkh(tpubD6NzVbkrYhZ4XHndKkuB8FifXm8r5FQHwrN6oZuWCz13qb93rtgKvD4PQsqC4HP4yhV3tA2fqr2RbY5mNXfM7RxXUoeABoDtsFUq2zJq6YK/44'/1'/0'/0/*)",
            "lasegmfs"
        );
        check_expected!(
            "wpkh(0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798)",
            "ucxz0gak"
        );
    }

    #[test]
    fn invalid_character() {
        assert!(matches!(desc_checksum("pk(\u{1f496})"), Err(Error::InvalidCharacter('\u{1f496}'))));
    }

    #[test]
    fn verify_and_strip() {
        assert_eq!(verify_checksum("raw(deadbeef)#89f8spxm", false).unwrap(), "raw(deadbeef)");
        assert_eq!(verify_checksum("raw(deadbeef)", false).unwrap(), "raw(deadbeef)");
        assert!(matches!(
            verify_checksum("raw(deadbeef)", true),
            Err(Error::MissingChecksum(_))
        ));
        // Wrong, truncated and overlong checksums are all rejected.
        for bad in ["raw(deadbeef)#89f8spxx", "raw(deadbeef)#89f8spx", "raw(deadbeef)#89f8spxmq"] {
            assert!(matches!(verify_checksum(bad, false), Err(Error::InvalidChecksum { .. })));
        }
        // An error in the payload changes the expected checksum.
        assert!(matches!(
            verify_checksum("raw(dedbeef)#89f8spxm", false),
            Err(Error::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn unprintable_input() {
        assert!(matches!(verify_checksum("pk(\u{1f496})", false), Err(Error::Unprintable(_))));
    }
}
