//! Inline expansions of small memset/memmove operations.
//!
//! Short fixed-size clears and copies dominate trace bodies; expanding them
//! into straight store runs avoids the call overhead of the bulk memory
//! instructions while staying byte-for-byte equivalent in effect.

use crate::error::Result;

use super::builder::{LocalOp, WasmBuilder};
use super::opcodes::op;

/// Upper bound (exclusive) for the inline memset expansion.
pub const MAX_MEMSET_SIZE: i32 = 64;

/// Upper bound (exclusive) for the inline memmove expansion.
pub const MAX_MEMMOVE_SIZE: i32 = 64;

/// Scratch locals used to park on-stack addresses. Trace function types
/// declare both in every function that reaches these helpers.
pub const SCRATCH_LHS: &str = "math_lhs32";
pub const SCRATCH_RHS: &str = "math_rhs32";

/// Try to expand a memset of `count` bytes into inline stores.
///
/// Returns `Ok(false)` without emitting anything when `count` is too large
/// for the fast path; the caller then uses [`append_memset_dest`]. With the
/// destination on the operand stack it is parked in [`SCRATCH_LHS`] first,
/// otherwise `dest_local` holds the base address. Only `value = 0` is
/// generated today; other values are written through as given.
pub fn try_append_memset_fast(
    builder: &mut WasmBuilder,
    dest_local: &str,
    local_offset: u32,
    value: i32,
    count: i32,
    dest_on_stack: bool,
) -> Result<bool> {
    if count <= 0 {
        if dest_on_stack {
            builder.push_op(op::DROP)?;
        }
        return Ok(true);
    }
    if count >= MAX_MEMSET_SIZE {
        return Ok(false);
    }

    let dest = if dest_on_stack {
        builder.local(SCRATCH_LHS, LocalOp::Set)?;
        SCRATCH_LHS
    } else {
        dest_local
    };

    let mut offset = local_offset;
    let mut remaining = count;
    while remaining >= 8 {
        builder.local(dest, LocalOp::Get)?;
        builder.i52_const(i64::from(value))?;
        builder.push_op(op::I64_STORE)?;
        builder.append_memarg(u64::from(offset), 0)?;
        offset += 8;
        remaining -= 8;
    }
    while remaining >= 1 {
        // The tail selects the widest store that cannot overrun: a
        // remainder of 0 mod 4 here means exactly four bytes are left.
        let (store, width) = match remaining % 4 {
            0 => (op::I32_STORE, 4u32),
            1 => (op::I32_STORE8, 1),
            _ => (op::I32_STORE16, 2),
        };
        builder.local(dest, LocalOp::Get)?;
        builder.i32_const(value)?;
        builder.push_op(store)?;
        builder.append_memarg(u64::from(offset), 0)?;
        offset += width;
        remaining -= width as i32;
    }
    Ok(true)
}

/// Bulk memset fallback: destination address already on the operand stack.
pub fn append_memset_dest(builder: &mut WasmBuilder, value: i32, count: i32) -> Result<()> {
    builder.i32_const(value)?;
    builder.i32_const(count)?;
    builder.push_op(op::PREFIX_MISC)?;
    builder.append_uleb(op::MISC_MEMORY_FILL)?;
    builder.push_op(0x00)?; // memory index
    Ok(())
}

/// Try to expand a copy of `count` bytes into matched load/store pairs.
///
/// With the addresses on the operand stack (destination below source) both
/// are parked in the scratch locals; otherwise `dest_local` / `src_local`
/// hold the base addresses. Returns `Ok(false)` without emitting anything
/// when `count` is too large; the caller then uses
/// [`append_memmove_dest_src`].
pub fn try_append_memmove_fast(
    builder: &mut WasmBuilder,
    dest_local: &str,
    src_local: &str,
    dest_offset: u32,
    src_offset: u32,
    count: i32,
    addresses_on_stack: bool,
) -> Result<bool> {
    if count <= 0 {
        if addresses_on_stack {
            builder.push_op(op::DROP)?;
            builder.push_op(op::DROP)?;
        }
        return Ok(true);
    }
    if count >= MAX_MEMMOVE_SIZE {
        return Ok(false);
    }

    let (dest, src) = if addresses_on_stack {
        // Source is on top of the stack.
        builder.local(SCRATCH_RHS, LocalOp::Set)?;
        builder.local(SCRATCH_LHS, LocalOp::Set)?;
        (SCRATCH_LHS, SCRATCH_RHS)
    } else {
        (dest_local, src_local)
    };

    let mut dest_off = dest_offset;
    let mut src_off = src_offset;
    let mut remaining = count;
    while remaining >= 8 {
        builder.local(dest, LocalOp::Get)?;
        builder.local(src, LocalOp::Get)?;
        builder.push_op(op::I64_LOAD)?;
        builder.append_memarg(u64::from(src_off), 0)?;
        builder.push_op(op::I64_STORE)?;
        builder.append_memarg(u64::from(dest_off), 0)?;
        dest_off += 8;
        src_off += 8;
        remaining -= 8;
    }
    while remaining >= 1 {
        let (load, store, width) = match remaining % 4 {
            0 => (op::I32_LOAD, op::I32_STORE, 4u32),
            1 => (op::I32_LOAD8_U, op::I32_STORE8, 1),
            _ => (op::I32_LOAD16_U, op::I32_STORE16, 2),
        };
        builder.local(dest, LocalOp::Get)?;
        builder.local(src, LocalOp::Get)?;
        builder.push_op(load)?;
        builder.append_memarg(u64::from(src_off), 0)?;
        builder.push_op(store)?;
        builder.append_memarg(u64::from(dest_off), 0)?;
        dest_off += width;
        src_off += width;
        remaining -= width as i32;
    }
    Ok(true)
}

/// Bulk memmove fallback: destination and source addresses already on the
/// operand stack, destination deepest.
pub fn append_memmove_dest_src(builder: &mut WasmBuilder, count: i32) -> Result<()> {
    builder.i32_const(count)?;
    builder.push_op(op::PREFIX_MISC)?;
    builder.append_uleb(op::MISC_MEMORY_COPY)?;
    builder.push_op(0x00)?; // destination memory index
    builder.push_op(0x00)?; // source memory index
    Ok(())
}
