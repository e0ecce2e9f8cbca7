use tracing::{debug, info};

use crate::error::Result;

use super::builder::WasmBuilder;
use super::imports::base36;
use super::opcodes::ValType;
use super::{WASM_MAGIC, WASM_VERSION, ensure_u32};

const SECTION_TYPE: u8 = 1;
const SECTION_IMPORT: u8 = 2;
const SECTION_FUNCTION: u8 = 3;
const SECTION_EXPORT: u8 = 7;
const SECTION_CODE: u8 = 10;

impl WasmBuilder {
    /// Run every pending generator, capture the body blobs, then emit
    /// sections 1, 2, 3, 7 and 10 into the current buffer.
    ///
    /// A failed generator still has its partial body captured for forensic
    /// dumps; the failure propagates unless error tolerance was enabled.
    pub fn emit_imports_and_functions(&mut self) -> Result<()> {
        for index in 0..self.functions.len() {
            self.run_generator(index)?;
        }
        self.emit_type_section()?;
        self.emit_import_section()?;
        self.emit_function_section()?;
        self.emit_export_section()?;
        self.emit_code_section()?;
        Ok(())
    }

    /// Emit a complete module: header, then the five sections.
    pub fn emit_module(&mut self) -> Result<Vec<u8>> {
        {
            let buf = self.stack.current_mut();
            buf.append_bytes(&WASM_MAGIC)?;
            buf.append_bytes(&WASM_VERSION)?;
        }
        self.emit_imports_and_functions()?;
        let bytes = self.stack.current().view().to_vec();
        self.stats.modules_emitted += 1;
        self.stats.bytes_generated += bytes.len();
        info!(
            bytes = bytes.len(),
            functions = self.functions.len(),
            "emitted module"
        );
        Ok(bytes)
    }

    fn run_generator(&mut self, index: usize) -> Result<()> {
        let (type_name, locals, generator) = {
            let record = &mut self.functions[index];
            if record.blob.is_some() {
                // Generators run exactly once per compilation.
                return Ok(());
            }
            (
                record.type_name.clone(),
                record.locals.clone(),
                record.generator.take(),
            )
        };
        emit_debug!("running generator for `{}`", self.functions[index].name);

        let ty = self.types.lookup(&type_name)?.clone();
        self.begin_function_owned(&ty.param_names, &ty.param_types, &locals)?;
        let outcome = match generator {
            Some(generate) => generate(self),
            None => Ok(()),
        };
        match outcome {
            Ok(()) => {
                let blob = self.end_function(false)?;
                self.functions[index].blob = blob;
                self.stats.functions_compiled += 1;
                Ok(())
            }
            Err(err) => {
                // Keep whatever the generator managed to emit; a dump of the
                // partial body is the main debugging aid after a bad trace.
                let partial = self.abort_function()?;
                self.functions[index].blob = Some(partial);
                if self.tolerate_generator_errors() {
                    tracing::warn!(
                        function = self.functions[index].name.as_str(),
                        "generator failed, keeping partial body: {err}"
                    );
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    fn begin_section(&mut self, id: u8) -> Result<()> {
        self.stack.current_mut().push_byte(id)?;
        self.stack.push();
        Ok(())
    }

    fn end_section(&mut self, id: u8) -> Result<()> {
        debug!(section = id, bytes = self.stack.size(), "section emitted");
        self.stack.pop_spliced()
    }

    pub(crate) fn emit_type_section(&mut self) -> Result<()> {
        self.begin_section(SECTION_TYPE)?;
        let count = ensure_u32(self.types.count())?;
        let buf = self.stack.current_mut();
        buf.append_uleb(u64::from(count))?;
        for shape in self.types.shapes() {
            buf.push_byte(0x60)?; // func type
            buf.append_uleb(shape.params.len() as u64)?;
            for ty in &shape.params {
                buf.push_byte(ty.to_byte())?;
            }
            match shape.result {
                Some(ty) => {
                    buf.append_uleb(1)?;
                    buf.push_byte(ty.to_byte())?;
                }
                None => {
                    buf.append_uleb(0)?;
                }
            }
        }
        self.end_section(SECTION_TYPE)
    }

    /// Import section: assigned imports in index order, then one global per
    /// constant slot, then the memory import. The host wiring relies on
    /// this exact ordering.
    pub(crate) fn emit_import_section(&mut self) -> Result<()> {
        self.begin_section(SECTION_IMPORT)?;
        let slot_count = self.constant_slot_count();
        let assigned = self.imports.assigned_in_order();
        let buf = self.stack.current_mut();
        buf.append_uleb((1 + assigned.len() + slot_count) as u64)?;
        for import in assigned {
            buf.append_name(&import.module)?;
            buf.append_name(&import.field_name)?;
            buf.push_byte(0x00)?; // function import
            buf.append_uleb(u64::from(import.type_index))?;
        }
        for slot in 0..slot_count {
            buf.append_name("c")?;
            buf.append_name(&base36(slot as u32))?;
            buf.push_byte(0x03)?; // global import
            buf.push_byte(ValType::I32.to_byte())?;
            buf.push_byte(0x00)?; // immutable
        }
        buf.append_name("m")?;
        buf.append_name("h")?;
        buf.push_byte(0x02)?; // memory import
        buf.push_byte(0x00)?; // limits: min only
        buf.append_uleb(1)?; // one 64 KiB page; the host grows it as needed
        self.end_section(SECTION_IMPORT)
    }

    pub(crate) fn emit_function_section(&mut self) -> Result<()> {
        self.begin_section(SECTION_FUNCTION)?;
        let buf = self.stack.current_mut();
        buf.append_uleb(self.functions.len() as u64)?;
        for record in &self.functions {
            buf.append_uleb(u64::from(record.type_index))?;
        }
        self.end_section(SECTION_FUNCTION)
    }

    pub(crate) fn emit_export_section(&mut self) -> Result<()> {
        self.begin_section(SECTION_EXPORT)?;
        let import_count = self.imports.assigned_count();
        let buf = self.stack.current_mut();
        let exported = self
            .functions
            .iter()
            .enumerate()
            .filter(|(_, record)| record.export);
        buf.append_uleb(exported.clone().count() as u64)?;
        for (index, record) in exported {
            buf.append_name(&record.name)?;
            buf.push_byte(0x00)?; // function export
            buf.append_uleb(u64::from(import_count) + index as u64)?;
        }
        self.end_section(SECTION_EXPORT)
    }

    pub(crate) fn emit_code_section(&mut self) -> Result<()> {
        self.begin_section(SECTION_CODE)?;
        let buf = self.stack.current_mut();
        buf.append_uleb(self.functions.len() as u64)?;
        for record in &self.functions {
            let body = record.blob.as_deref().unwrap_or(&[]);
            buf.append_uleb(body.len() as u64)?;
            buf.append_bytes(body)?;
        }
        self.end_section(SECTION_CODE)
    }
}
