//! Jump and padding synthesis for donor sites and caves
//!
//! Everything here is pure byte construction; committing the bytes to
//! the target lives in the cave module. Wire formats: `E9` + signed
//! 32-bit little-endian displacement (relative to the byte after the
//! displacement), `90` for padding.

use crate::error::{BurrowError, Result};

/// size of a near jump: opcode + rel32
pub const JMP_REL_SIZE: usize = 5;

const OPCODE_JMP_REL32: u8 = 0xE9;
const OPCODE_NOP: u8 = 0x90;

/// encode `jmp rel32` from `source` to `target`
///
/// `None` when the displacement exceeds the signed 32-bit range.
pub fn encode_jmp_rel(source: usize, target: usize) -> Option<[u8; JMP_REL_SIZE]> {
    let displacement = (target as i64) - (source as i64) - JMP_REL_SIZE as i64;
    if displacement < i32::MIN as i64 || displacement > i32::MAX as i64 {
        return None;
    }

    let mut bytes = [OPCODE_NOP; JMP_REL_SIZE];
    bytes[0] = OPCODE_JMP_REL32;
    bytes[1..].copy_from_slice(&(displacement as i32).to_le_bytes());
    Some(bytes)
}

/// decode the target of a `jmp rel32` located at `source`
pub fn decode_jmp_rel(source: usize, bytes: &[u8]) -> Option<usize> {
    if bytes.len() < JMP_REL_SIZE || bytes[0] != OPCODE_JMP_REL32 {
        return None;
    }
    let displacement = i32::from_le_bytes(bytes[1..JMP_REL_SIZE].try_into().ok()?);
    Some((source as i64 + JMP_REL_SIZE as i64 + displacement as i64) as usize)
}

/// donor-site patch: jump to the cave plus NOP padding
///
/// `replaced` is the count of donor bytes being overwritten and must
/// cover at least the jump itself; anything beyond the jump is padded
/// so no partial instruction survives at the donor site.
pub fn donor_patch(donor: usize, cave: usize, replaced: usize) -> Result<Vec<u8>> {
    if replaced < JMP_REL_SIZE {
        return Err(BurrowError::PatchTooShort { replaced });
    }
    let jmp = encode_jmp_rel(donor, cave).ok_or(BurrowError::DisplacementOutOfRange {
        from: donor,
        to: cave,
    })?;

    let mut bytes = Vec::with_capacity(replaced);
    bytes.extend_from_slice(&jmp);
    bytes.resize(replaced, OPCODE_NOP);
    Ok(bytes)
}

/// cave contents: payload plus optional trampoline
///
/// the trampoline resumes at `donor + replaced`, the first instruction
/// after the patched bytes.
pub fn cave_image(
    payload: &[u8],
    cave: usize,
    donor: usize,
    replaced: usize,
    jump_back: bool,
) -> Result<Vec<u8>> {
    let mut bytes = payload.to_vec();
    if jump_back {
        let jmp_site = cave + payload.len();
        let resume = donor + replaced;
        let jmp = encode_jmp_rel(jmp_site, resume).ok_or(BurrowError::DisplacementOutOfRange {
            from: jmp_site,
            to: resume,
        })?;
        bytes.extend_from_slice(&jmp);
    }
    Ok(bytes)
}
