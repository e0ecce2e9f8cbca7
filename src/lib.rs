#![deny(clippy::all, clippy::perf, clippy::suspicious)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

//! Streaming WebAssembly module builder for runtime trace compilation.
//!
//! The interpreter's trace translator feeds high-level emission calls into a
//! [`WasmBuilder`] — define function types, declare imports, register
//! functions with generator closures — and receives a byte-exact module blob
//! ready for immediate instantiation. Everything the builder needs from the
//! embedding runtime (option store, member offsets, heap reads, the indirect
//! function table) arrives through the traits in [`host`] and [`table`].

pub mod emitter;
pub mod error;
pub mod host;
pub mod logging;
pub mod options;
pub mod table;

pub use emitter::{
    BlockKind, BlockType, EmissionStats, LeaBase, LocalOp, LocalRef, ValType, WasmBuilder,
};
pub use error::{Error, Result};
pub use host::{FuncRef, HostEnv, Ip, MemberOffsetCache, Ptr};
pub use options::{OptionOverride, OptionsCache, RuntimeOptions};
pub use table::{FunctionTableAllocator, IndirectFunctionTable};
