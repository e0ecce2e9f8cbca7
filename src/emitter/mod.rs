//! Streaming emission of WebAssembly modules.
//!
//! Trace generators push opcodes into nested byte buffers; the builder
//! resolves types, imports, locals and constant slots as emission proceeds
//! and finally frames the canonical section sequence (1, 2, 3, 7, 10) into a
//! module blob ready for instantiation.

use std::sync::OnceLock;

pub(crate) const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
pub(crate) const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Default capacity of every emission buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 32_000;

/// Default length of the pointer constant slot table.
pub const DEFAULT_CONSTANT_SLOTS: usize = 8;

pub(crate) fn emit_trace_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("JITWASM_EMIT_TRACE").is_some())
}

pub(crate) fn trace_log(args: std::fmt::Arguments<'_>) {
    if emit_trace_enabled() {
        eprintln!("[emit] {args}");
    }
}

macro_rules! emit_debug {
    ($($arg:tt)*) => {
        $crate::emitter::trace_log(format_args!($($arg)*));
    };
}

mod buffer;
mod builder;
mod encoding;
mod functions;
mod imports;
mod limits;
mod memops;
mod opcodes;
mod sections;
mod types;

pub use buffer::{BufferStack, ByteBuffer};
pub use builder::{
    BlockKind, EmissionStats, LeaBase, LocalOp, LocalRef, MAX_FAILURES, WasmBuilder,
};
pub use functions::format_blob_hex;
pub use memops::{
    MAX_MEMMOVE_SIZE, MAX_MEMSET_SIZE, SCRATCH_LHS, SCRATCH_RHS, append_memmove_dest_src,
    append_memset_dest, try_append_memmove_fast, try_append_memset_fast,
};
pub use opcodes::{BlockType, ValType};

pub(crate) use limits::ensure_u32;

#[cfg(test)]
mod tests;
