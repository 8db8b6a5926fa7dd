// SPDX-License-Identifier: CC0-1.0

//! Script resource limits
//!
//! Consensus and standardness bounds enforced on realized descriptor scripts.

use bitcoin::opcodes::all::OP_PUSHNUM_16;
use bitcoin::script::Instruction;
use bitcoin::Script;

use crate::Error;

/// Maximum size in bytes of a P2SH redeem script.
pub const MAX_REDEEM_SCRIPT_SIZE: usize = 520;

/// Maximum (standardness) size in bytes of a P2WSH witness script.
pub const MAX_WITNESS_SCRIPT_SIZE: usize = 3600;

/// Maximum number of non-push opcodes per script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Which realized script a resource limit applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScriptRole {
    /// A P2SH redeem script.
    Redeem,
    /// A P2WSH witness script.
    Witness,
}

impl ScriptRole {
    /// The size cap for scripts in this role.
    pub fn size_limit(self) -> usize {
        match self {
            ScriptRole::Redeem => MAX_REDEEM_SCRIPT_SIZE,
            ScriptRole::Witness => MAX_WITNESS_SCRIPT_SIZE,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ScriptRole::Redeem => "redeem",
            ScriptRole::Witness => "witness",
        }
    }
}

/// Counts the opcodes with a value strictly greater than `OP_16` in a decoded
/// script. Push operations and small-number pushes do not count.
pub(crate) fn non_push_opcode_count(script: &Script) -> Result<usize, Error> {
    let mut count = 0;
    for instruction in script.instructions() {
        if let Instruction::Op(op) = instruction.map_err(Error::Script)? {
            if op.to_u8() > OP_PUSHNUM_16.to_u8() {
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Checks the size cap for `role` and the opcode cap on a realized script.
pub(crate) fn check_resource_limits(script: &Script, role: ScriptRole) -> Result<(), Error> {
    let limit = role.size_limit();
    if script.len() > limit {
        return Err(Error::ScriptTooLarge { role, size: Some(script.len()), limit });
    }
    let ops = non_push_opcode_count(script)?;
    if ops > MAX_OPS_PER_SCRIPT {
        return Err(Error::TooManyOps { count: Some(ops), limit: MAX_OPS_PER_SCRIPT });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bitcoin::opcodes::all::{OP_CHECKSIG, OP_CSV, OP_PUSHNUM_16};
    use bitcoin::script::Builder;

    use super::*;

    #[test]
    fn pushes_do_not_count() {
        let script = Builder::new()
            .push_int(16)
            .push_slice([0xab; 20])
            .push_opcode(OP_PUSHNUM_16)
            .into_script();
        assert_eq!(non_push_opcode_count(&script).unwrap(), 0);
    }

    #[test]
    fn ops_above_op_16_count() {
        let script = Builder::new()
            .push_int(5)
            .push_opcode(OP_CSV)
            .push_opcode(OP_CHECKSIG)
            .into_script();
        assert_eq!(non_push_opcode_count(&script).unwrap(), 2);
    }

    #[test]
    fn op_count_cap() {
        let mut builder = Builder::new();
        for _ in 0..MAX_OPS_PER_SCRIPT + 1 {
            builder = builder.push_opcode(OP_CHECKSIG);
        }
        let script = builder.into_script();
        assert!(matches!(
            check_resource_limits(&script, ScriptRole::Witness),
            Err(Error::TooManyOps { count: Some(202), limit: MAX_OPS_PER_SCRIPT })
        ));
    }

    #[test]
    fn size_cap() {
        let mut builder = Builder::new();
        for _ in 0..30 {
            builder = builder.push_slice([0u8; 20]);
        }
        let script = builder.into_script();
        assert_eq!(script.len(), 630);
        assert!(matches!(
            check_resource_limits(&script, ScriptRole::Redeem),
            Err(Error::ScriptTooLarge { role: ScriptRole::Redeem, size: Some(630), limit: MAX_REDEEM_SCRIPT_SIZE })
        ));
        assert!(check_resource_limits(&script, ScriptRole::Witness).is_ok());
    }
}
