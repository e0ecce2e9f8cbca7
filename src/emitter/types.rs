use std::collections::HashMap;

use crate::error::{Error, Result};

use super::ensure_u32;
use super::opcodes::ValType;

/// Structural shape of a function type. Two types with the same shape share
/// one index in the module's type space regardless of their names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FuncTypeShape {
    pub(crate) params: Vec<ValType>,
    pub(crate) result: Option<ValType>,
}

/// A function type registered under a human name.
#[derive(Clone, Debug)]
pub(crate) struct NamedType {
    pub(crate) index: u32,
    pub(crate) param_names: Vec<String>,
    pub(crate) param_types: Vec<ValType>,
}

/// Interns function types by structural shape.
///
/// Permanent types survive `clear` and occupy the low indices; the
/// per-compilation overlay is consulted first on lookup and receives all
/// writes unless the definition is permanent.
#[derive(Default)]
pub(crate) struct TypeRegistry {
    permanent_shapes: Vec<FuncTypeShape>,
    permanent_index_by_shape: HashMap<FuncTypeShape, u32>,
    permanent_by_name: HashMap<String, NamedType>,
    shapes: Vec<FuncTypeShape>,
    index_by_shape: HashMap<FuncTypeShape, u32>,
    by_name: HashMap<String, NamedType>,
}

impl TypeRegistry {
    pub(crate) fn define(
        &mut self,
        name: &str,
        params: &[(&str, ValType)],
        result: Option<ValType>,
        permanent: bool,
    ) -> Result<u32> {
        if self.by_name.contains_key(name) || self.permanent_by_name.contains_key(name) {
            return Err(Error::duplicate_name(name));
        }
        if permanent && !self.shapes.is_empty() {
            return Err(Error::InvalidPermanentOrdering {
                name: name.to_string(),
            });
        }

        let shape = FuncTypeShape {
            params: params.iter().map(|(_, ty)| *ty).collect(),
            result,
        };
        let index = self.intern_shape(shape, permanent)?;

        let record = NamedType {
            index,
            param_names: params.iter().map(|(name, _)| (*name).to_string()).collect(),
            param_types: params.iter().map(|(_, ty)| *ty).collect(),
        };
        if permanent {
            self.permanent_by_name.insert(name.to_string(), record);
        } else {
            self.by_name.insert(name.to_string(), record);
        }
        Ok(index)
    }

    fn intern_shape(&mut self, shape: FuncTypeShape, permanent: bool) -> Result<u32> {
        if let Some(&index) = self
            .index_by_shape
            .get(&shape)
            .or_else(|| self.permanent_index_by_shape.get(&shape))
        {
            return Ok(index);
        }
        if permanent {
            let index = ensure_u32(self.permanent_shapes.len())?;
            self.permanent_shapes.push(shape.clone());
            self.permanent_index_by_shape.insert(shape, index);
            Ok(index)
        } else {
            let index = ensure_u32(self.permanent_shapes.len() + self.shapes.len())?;
            self.shapes.push(shape.clone());
            self.index_by_shape.insert(shape, index);
            Ok(index)
        }
    }

    /// Resolve a type name, consulting the per-compilation overlay first.
    pub(crate) fn lookup(&self, name: &str) -> Result<&NamedType> {
        self.by_name
            .get(name)
            .or_else(|| self.permanent_by_name.get(name))
            .ok_or_else(|| Error::unknown_type(name))
    }

    pub(crate) fn count(&self) -> usize {
        self.permanent_shapes.len() + self.shapes.len()
    }

    /// All interned shapes in index order, permanent first.
    pub(crate) fn shapes(&self) -> impl Iterator<Item = &FuncTypeShape> {
        self.permanent_shapes.iter().chain(self.shapes.iter())
    }

    /// Drop the per-compilation overlay; permanent types keep their indices.
    pub(crate) fn clear(&mut self) {
        self.shapes.clear();
        self.index_by_shape.clear();
        self.by_name.clear();
    }
}
