use tracing::warn;

use crate::error::{Error, Result};
use crate::host::{HostEnv, Ip, Ptr};
use crate::options::{DISABLE_GENERATION, apply_options};

use super::buffer::{BufferStack, ByteBuffer};
use super::functions::{FunctionRecord, LocalBindings, bind_locals};
use super::imports::ImportRegistry;
use super::opcodes::{BlockType, op};
use super::types::TypeRegistry;
use super::{DEFAULT_BUFFER_CAPACITY, DEFAULT_CONSTANT_SLOTS, ValType};

/// Trace-level failures tolerated before generation is switched off.
pub const MAX_FAILURES: u32 = 2;

/// Counters kept while emitting; cheap enough to maintain unconditionally,
/// surfaced when stats are enabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmissionStats {
    pub functions_compiled: u32,
    pub modules_emitted: u32,
    pub bytes_generated: usize,
    /// `ptr_const` calls resolved to an already-bound slot.
    pub constant_slot_reuses: u32,
    /// `ptr_const` calls that bound a fresh slot.
    pub constant_slot_binds: u32,
    /// `ptr_const` calls that fell back to an inline constant.
    pub constant_slot_spills: u32,
}

/// Reference to a parameter or local, by declared name or by index.
#[derive(Clone, Copy, Debug)]
pub enum LocalRef<'a> {
    Name(&'a str),
    Index(u32),
}

impl<'a> From<&'a str> for LocalRef<'a> {
    fn from(name: &'a str) -> Self {
        LocalRef::Name(name)
    }
}

impl From<u32> for LocalRef<'_> {
    fn from(index: u32) -> Self {
        LocalRef::Index(index)
    }
}

/// Base operand of `lea`: a named local holding an address, or an absolute
/// address known at emission time.
#[derive(Clone, Copy, Debug)]
pub enum LeaBase<'a> {
    Local(&'a str),
    Address(i32),
}

/// Access opcode for a parameter or local.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocalOp {
    #[default]
    Get,
    Set,
    Tee,
}

impl LocalOp {
    fn to_byte(self) -> u8 {
        match self {
            LocalOp::Get => op::LOCAL_GET,
            LocalOp::Set => op::LOCAL_SET,
            LocalOp::Tee => op::LOCAL_TEE,
        }
    }
}

/// Structured control constructs trackable by `active_blocks`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockKind {
    #[default]
    Block,
    Loop,
    If,
}

impl BlockKind {
    fn to_byte(self) -> u8 {
        match self {
            BlockKind::Block => op::BLOCK,
            BlockKind::Loop => op::LOOP,
            BlockKind::If => op::IF,
        }
    }
}

/// Streaming builder for one WebAssembly module.
///
/// A builder is reused across compilations: `clear` resets everything except
/// the permanent types and the pointer constant slot table, which stay bound
/// for the lifetime of the instantiating host wiring.
pub struct WasmBuilder {
    pub(crate) stack: BufferStack,
    pub(crate) types: TypeRegistry,
    pub(crate) imports: ImportRegistry,
    pub(crate) functions: Vec<FunctionRecord>,
    constant_slots: Vec<Option<Ptr>>,
    use_constants: bool,
    base: Ip,
    locals: LocalBindings,
    active_blocks: u32,
    back_branch_targets: Vec<Ip>,
    tolerate_generator_errors: bool,
    failures: u32,
    pub(crate) stats: EmissionStats,
}

impl Default for WasmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WasmBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY, DEFAULT_CONSTANT_SLOTS)
    }

    #[must_use]
    pub fn with_capacity(buffer_capacity: usize, constant_slot_count: usize) -> Self {
        Self {
            stack: BufferStack::new(buffer_capacity),
            types: TypeRegistry::default(),
            imports: ImportRegistry::default(),
            functions: Vec::new(),
            constant_slots: vec![None; constant_slot_count],
            use_constants: false,
            base: Ip(0),
            locals: LocalBindings::default(),
            active_blocks: 0,
            back_branch_targets: Vec::new(),
            tolerate_generator_errors: false,
            failures: 0,
            stats: EmissionStats::default(),
        }
    }

    /// Reset per-compilation state. Permanent types and bound constant
    /// slots survive; everything else starts fresh.
    pub fn clear(&mut self) {
        self.stack.clear();
        self.types.clear();
        self.imports.clear();
        self.functions.clear();
        self.locals = LocalBindings::default();
        self.active_blocks = 0;
        self.back_branch_targets.clear();
    }

    /// Base address of the trace being compiled; `ip_const` emits offsets
    /// relative to it.
    pub fn set_base(&mut self, base: Ip) {
        self.base = base;
    }

    #[must_use]
    pub fn base(&self) -> Ip {
        self.base
    }

    /// Gate the pointer constant slot mechanism; mirrors the host's
    /// `useConstants` option.
    pub fn set_use_constants(&mut self, enabled: bool) {
        self.use_constants = enabled;
    }

    /// Keep running generators after one fails, retaining the partial body.
    /// Off by default: generator errors propagate to the caller.
    pub fn set_tolerate_generator_errors(&mut self, enabled: bool) {
        self.tolerate_generator_errors = enabled;
    }

    pub(crate) fn tolerate_generator_errors(&self) -> bool {
        self.tolerate_generator_errors
    }

    #[must_use]
    pub fn stats(&self) -> EmissionStats {
        self.stats
    }

    // ---- symbol registration ------------------------------------------

    /// Intern a function type under a human name. Structurally equal shapes
    /// share one index; permanent types survive `clear`.
    pub fn define_type(
        &mut self,
        name: &str,
        params: &[(&str, ValType)],
        result: Option<ValType>,
        permanent: bool,
    ) -> Result<u32> {
        self.types.define(name, params, result, permanent)
    }

    /// Declare an imported function. No index is assigned until the import
    /// is first called, unless `assume_used` forces one now.
    pub fn define_imported_function(
        &mut self,
        module: &str,
        name: &str,
        type_name: &str,
        assume_used: bool,
        wasm_name: Option<&str>,
    ) -> Result<()> {
        let type_index = self.types.lookup(type_name)?.index;
        self.imports
            .define(module, name, wasm_name, type_index, assume_used)
    }

    /// Register a function whose body `generator` will produce when the
    /// module is emitted.
    pub fn define_function(
        &mut self,
        name: &str,
        type_name: &str,
        export: bool,
        locals: &[(&str, ValType)],
        generator: impl FnOnce(&mut WasmBuilder) -> Result<()> + 'static,
    ) -> Result<()> {
        if self.functions.iter().any(|record| record.name == name) {
            return Err(Error::duplicate_name(name));
        }
        let type_index = self.types.lookup(type_name)?.index;
        self.functions.push(FunctionRecord {
            name: name.to_string(),
            type_name: type_name.to_string(),
            type_index,
            export,
            locals: locals
                .iter()
                .map(|(local, ty)| ((*local).to_string(), *ty))
                .collect(),
            generator: Some(Box::new(generator)),
            blob: None,
        });
        Ok(())
    }

    // ---- function emission --------------------------------------------

    /// Open a function body scope: bind parameters and locals, then write
    /// the local-declaration prologue.
    pub fn begin_function(&mut self, type_name: &str, locals: &[(&str, ValType)]) -> Result<()> {
        let ty = self.types.lookup(type_name)?.clone();
        let owned: Vec<(String, ValType)> = locals
            .iter()
            .map(|(name, val)| ((*name).to_string(), *val))
            .collect();
        self.begin_function_owned(&ty.param_names, &ty.param_types, &owned)
    }

    pub(crate) fn begin_function_owned(
        &mut self,
        param_names: &[String],
        param_types: &[ValType],
        locals: &[(String, ValType)],
    ) -> Result<()> {
        let (bindings, groups) = bind_locals(param_names, param_types, locals)?;
        self.locals = bindings;
        self.active_blocks = 0;
        self.back_branch_targets.clear();
        self.stack.push();

        let buf = self.stack.current_mut();
        buf.append_uleb(groups.len() as u64)?;
        for group in &groups {
            buf.append_uleb(u64::from(group.count))?;
            buf.push_byte(group.ty.to_byte())?;
        }
        Ok(())
    }

    /// Close the current function body. With `write_to_output` the body is
    /// spliced length-prefixed into the parent buffer; otherwise the bytes
    /// are returned for capture.
    pub fn end_function(&mut self, write_to_output: bool) -> Result<Option<Vec<u8>>> {
        if self.active_blocks > 0 {
            return Err(Error::UnclosedBlocks {
                active: self.active_blocks,
            });
        }
        if write_to_output {
            self.stack.pop_spliced()?;
            Ok(None)
        } else {
            self.stack.pop_bytes().map(Some)
        }
    }

    /// Abandon the current function body scope, returning whatever the
    /// generator managed to emit. Used on the failure path only.
    pub(crate) fn abort_function(&mut self) -> Result<Vec<u8>> {
        self.active_blocks = 0;
        self.stack.pop_bytes()
    }

    /// Access a parameter (or any local by absolute index).
    pub fn arg<'a>(&mut self, which: impl Into<LocalRef<'a>>, access: LocalOp) -> Result<()> {
        let index = match which.into() {
            LocalRef::Name(name) => self.locals.index_of(name)?,
            LocalRef::Index(index) => index,
        };
        self.push_op(access.to_byte())?;
        self.stack.current_mut().append_uleb(u64::from(index))?;
        Ok(())
    }

    /// Access a declared local; numeric references are zero-based past the
    /// parameters.
    pub fn local<'a>(&mut self, which: impl Into<LocalRef<'a>>, access: LocalOp) -> Result<()> {
        let index = match which.into() {
            LocalRef::Name(name) => self.locals.index_of(name)?,
            LocalRef::Index(index) => self.locals.param_count + index,
        };
        self.push_op(access.to_byte())?;
        self.stack.current_mut().append_uleb(u64::from(index))?;
        Ok(())
    }

    // ---- constants ----------------------------------------------------

    pub fn i32_const(&mut self, value: i32) -> Result<()> {
        self.push_op(op::I32_CONST)?;
        self.stack.current_mut().append_leb(i64::from(value))?;
        Ok(())
    }

    /// Emit an `i64.const`. Values stay within 52 bits on the paths that
    /// reach this; wider constants come through `i64_const_ref`.
    pub fn i52_const(&mut self, value: i64) -> Result<()> {
        self.push_op(op::I64_CONST)?;
        self.stack.current_mut().append_leb(value)?;
        Ok(())
    }

    /// Emit an `i64.const` whose operand lives in the interpreter heap.
    pub fn i64_const_ref(&mut self, host: &dyn HostEnv, src: Ptr) -> Result<()> {
        self.push_op(op::I64_CONST)?;
        self.stack.current_mut().append_leb_ref(host, src, true)?;
        Ok(())
    }

    pub fn f32_const(&mut self, value: f32) -> Result<()> {
        self.push_op(op::F32_CONST)?;
        self.stack.current_mut().append_f32(value)?;
        Ok(())
    }

    pub fn f64_const(&mut self, value: f64) -> Result<()> {
        self.push_op(op::F64_CONST)?;
        self.stack.current_mut().append_f64(value)?;
        Ok(())
    }

    /// Emit an `i32.const` of the ip rebased against the trace base
    /// address. This is the sole rebasing the builder performs.
    pub fn ip_const(&mut self, ip: Ip) -> Result<()> {
        self.push_op(op::I32_CONST)?;
        let offset = ip.offset_from(self.base);
        self.stack.current_mut().append_leb(offset)?;
        Ok(())
    }

    /// Emit a pointer constant, preferring a bound constant slot
    /// (`global.get`) and falling back to an inline `i32.const` when the
    /// mechanism is disabled or the table is full.
    pub fn ptr_const(&mut self, ptr: Ptr) -> Result<()> {
        if self.use_constants
            && let Some(slot) = self.find_or_bind_slot(ptr)
        {
            self.push_op(op::GLOBAL_GET)?;
            self.stack.current_mut().append_uleb(u64::from(slot))?;
            return Ok(());
        }
        if self.use_constants {
            self.stats.constant_slot_spills += 1;
        }
        self.i32_const(ptr.0 as u32 as i32)
    }

    fn find_or_bind_slot(&mut self, ptr: Ptr) -> Option<u32> {
        // Linear search; the slot table is a handful of entries.
        for (index, slot) in self.constant_slots.iter_mut().enumerate() {
            match slot {
                Some(bound) if *bound == ptr => {
                    self.stats.constant_slot_reuses += 1;
                    return Some(index as u32);
                }
                Some(_) => {}
                None => {
                    *slot = Some(ptr);
                    self.stats.constant_slot_binds += 1;
                    return Some(index as u32);
                }
            }
        }
        None
    }

    /// Count of constant-slot globals the import section will declare.
    pub(crate) fn constant_slot_count(&self) -> usize {
        if self.use_constants {
            self.constant_slots.len()
        } else {
            0
        }
    }

    // ---- control structure and memory ---------------------------------

    /// Open a structured block. The result type defaults to void.
    pub fn block(&mut self, ty: BlockType, kind: BlockKind) -> Result<()> {
        self.push_op(kind.to_byte())?;
        self.stack.current_mut().push_byte(ty.to_byte())?;
        self.active_blocks += 1;
        Ok(())
    }

    /// Close the innermost structured block.
    pub fn end_block(&mut self) -> Result<()> {
        self.push_op(op::END)?;
        self.active_blocks = self.active_blocks.saturating_sub(1);
        Ok(())
    }

    /// Compute `base + offset` onto the operand stack.
    pub fn lea(&mut self, base: LeaBase<'_>, offset: i32) -> Result<()> {
        match base {
            LeaBase::Local(name) => self.arg(name, LocalOp::Get)?,
            LeaBase::Address(address) => self.i32_const(address)?,
        }
        self.i32_const(offset)?;
        self.push_op(op::I32_ADD)?;
        Ok(())
    }

    /// Append a memarg immediate: alignment exponent, then offset.
    pub fn append_memarg(&mut self, offset: u64, align_log2: u32) -> Result<()> {
        let buf = self.stack.current_mut();
        buf.append_uleb(u64::from(align_log2))?;
        buf.append_uleb(offset)?;
        Ok(())
    }

    /// Return to the dispatcher at `ip`.
    pub fn ret(&mut self, ip: Ip) -> Result<()> {
        self.ip_const(ip)?;
        self.push_op(op::RETURN)?;
        Ok(())
    }

    /// Emit a call to a named import, assigning its index on first use.
    pub fn call_import(&mut self, name: &str) -> Result<()> {
        let index = self.imports.index_of(name)?;
        self.push_op(op::CALL)?;
        self.stack.current_mut().append_uleb(u64::from(index))?;
        Ok(())
    }

    // ---- raw appends ---------------------------------------------------

    /// The buffer currently receiving appends.
    pub fn current(&mut self) -> &mut ByteBuffer {
        self.stack.current_mut()
    }

    /// Append one raw byte (range-checked) to the current buffer.
    pub fn append_u8(&mut self, value: i32) -> Result<usize> {
        self.stack.current_mut().append_u8(value)
    }

    pub fn append_uleb(&mut self, value: u64) -> Result<usize> {
        self.stack.current_mut().append_uleb(value)
    }

    pub fn append_leb(&mut self, value: i64) -> Result<usize> {
        self.stack.current_mut().append_leb(value)
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<usize> {
        self.stack.current_mut().append_bytes(bytes)
    }

    pub fn append_name(&mut self, text: &str) -> Result<usize> {
        self.stack.current_mut().append_name(text)
    }

    pub(crate) fn push_op(&mut self, opcode: u8) -> Result<()> {
        self.stack.current_mut().push_byte(opcode)?;
        Ok(())
    }

    // ---- back branches and diagnostics ---------------------------------

    /// Record that `ip` begins a backward-branch target in the trace being
    /// emitted; the dispatcher reads these back after compilation.
    pub fn record_back_branch_target(&mut self, ip: Ip) {
        self.back_branch_targets.push(ip);
    }

    #[must_use]
    pub fn back_branch_targets(&self) -> &[Ip] {
        &self.back_branch_targets
    }

    /// Captured body bytes of a defined function, once its generator ran.
    #[must_use]
    pub fn function_body(&self, name: &str) -> Option<&[u8]> {
        self.functions
            .iter()
            .find(|record| record.name == name)
            .and_then(|record| record.blob.as_deref())
    }

    /// Record a trace-level failure. Reaching the failure limit turns off
    /// every generation category through the host option parser.
    pub fn record_failure(&mut self, host: &mut dyn HostEnv) {
        self.failures += 1;
        warn!(failures = self.failures, "trace compilation failure recorded");
        if self.failures == MAX_FAILURES {
            warn!("failure limit reached; disabling trace generation");
            apply_options(host, &DISABLE_GENERATION);
        }
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failures
    }
}
