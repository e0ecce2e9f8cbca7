use crate::error::{Error, Result};
use crate::host::FuncRef;

/// Host-owned indirect function table.
pub trait IndirectFunctionTable {
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extend the table by `delta` slots.
    fn grow(&mut self, delta: u32);

    /// Install a function at `index`.
    fn set(&mut self, index: u32, func: FuncRef);
}

/// Number of slots added each time the table runs out.
const TABLE_GROWTH_CHUNK: u32 = 512;

/// Installs host-callable functions into the indirect function table,
/// growing it in fixed-size chunks so repeated installs stay cheap.
#[derive(Debug, Default)]
pub struct FunctionTableAllocator {
    next: u32,
    free: u32,
}

impl FunctionTableAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `func` in the next free slot and return its table index.
    pub fn add_function_pointer(
        &mut self,
        table: &mut dyn IndirectFunctionTable,
        func: FuncRef,
    ) -> Result<u32> {
        if func.is_null() {
            return Err(Error::NullFunction);
        }
        if self.free == 0 {
            self.next = table.len();
            table.grow(TABLE_GROWTH_CHUNK);
            self.free = TABLE_GROWTH_CHUNK;
        }
        let index = self.next;
        table.set(index, func);
        self.next += 1;
        self.free -= 1;
        Ok(index)
    }
}
