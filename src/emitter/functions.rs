use std::collections::HashMap;
use std::fmt::Write as _;

use crate::error::{Error, Result};

use super::builder::WasmBuilder;
use super::ensure_u32;
use super::opcodes::ValType;

/// Generator closure that streams a function body into the builder.
pub(crate) type FunctionGenerator = Box<dyn FnOnce(&mut WasmBuilder) -> Result<()>>;

/// A function registered for the current compilation.
///
/// `blob` is captured when `emit_imports_and_functions` runs the generator;
/// a failed generator still leaves its partial body here for dumping.
pub(crate) struct FunctionRecord {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) type_index: u32,
    pub(crate) export: bool,
    pub(crate) locals: Vec<(String, ValType)>,
    pub(crate) generator: Option<FunctionGenerator>,
    pub(crate) blob: Option<Vec<u8>>,
}

/// Parameter and local bindings for the function currently being emitted.
#[derive(Default, Debug)]
pub(crate) struct LocalBindings {
    map: HashMap<String, (ValType, u32)>,
    pub(crate) param_count: u32,
}

impl LocalBindings {
    pub(crate) fn index_of(&self, name: &str) -> Result<u32> {
        self.map
            .get(name)
            .map(|&(_, index)| index)
            .ok_or_else(|| Error::unknown_local(name))
    }
}

/// One run of same-typed locals in the body prologue.
#[derive(Debug)]
pub(crate) struct LocalGroup {
    pub(crate) ty: ValType,
    pub(crate) count: u32,
}

/// Assign indices per the binary-format convention: parameters first in
/// declaration order, then locals grouped i32, i64, f32, f64, each group in
/// declaration order.
pub(crate) fn bind_locals(
    param_names: &[String],
    param_types: &[ValType],
    locals: &[(String, ValType)],
) -> Result<(LocalBindings, Vec<LocalGroup>)> {
    let mut bindings = LocalBindings::default();

    for (name, ty) in param_names.iter().zip(param_types) {
        let index = ensure_u32(bindings.map.len())?;
        if bindings.map.insert(name.clone(), (*ty, index)).is_some() {
            return Err(Error::duplicate_name(name));
        }
    }
    bindings.param_count = bindings.map.len() as u32;

    let mut groups = Vec::new();
    let mut next = bindings.param_count;
    for group_ty in ValType::GROUP_ORDER {
        let mut count = 0u32;
        for (name, ty) in locals {
            if *ty != group_ty {
                continue;
            }
            if bindings.map.insert(name.clone(), (*ty, next)).is_some() {
                return Err(Error::duplicate_name(name));
            }
            next += 1;
            count += 1;
        }
        if count > 0 {
            groups.push(LocalGroup {
                ty: group_ty,
                count,
            });
        }
    }
    Ok((bindings, groups))
}

/// Render a captured blob as a hex dump, sixteen bytes per row.
///
/// Backs trace dumps and post-mortem inspection of failed generators.
#[must_use]
pub fn format_blob_hex(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:04x} ", row * 16);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
        out.push('\n');
    }
    out
}
