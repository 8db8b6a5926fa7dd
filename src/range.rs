// SPDX-License-Identifier: CC0-1.0

//! Range isolation
//!
//! Strips (and verifies) the checksum of a descriptor expression and
//! materializes every `*` wildcard at a concrete derivation index. All
//! wildcards of one descriptor share the same index.

use crate::checksum::verify_checksum;
use crate::Error;

pub(crate) fn isolate(
    expression: &str,
    index: Option<u32>,
    require_checksum: bool,
) -> Result<String, Error> {
    let bare = verify_checksum(expression, require_checksum)?;
    if !bare.contains('*') {
        return Ok(bare.to_owned());
    }
    let index = index.ok_or_else(|| Error::InvalidIndex(bare.to_owned()))?;
    Ok(bare.replace('*', &index.to_string()))
}
