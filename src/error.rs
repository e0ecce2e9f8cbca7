use std::error::Error as StdError;
use std::fmt;

/// Unified error type for the module builder.
///
/// Every failure surfaces synchronously from the offending operation. The
/// builder deliberately leaves its partial state in place so callers can dump
/// it before discarding the compilation with `clear`.
#[derive(Debug)]
pub enum Error {
    /// An append would exceed the owning buffer's fixed capacity.
    BufferFull { capacity: usize, requested: usize },
    /// A byte append received a value outside `[0, 255]`.
    ByteOutOfRange { value: i32 },
    /// A function type or function was re-defined under an existing name.
    DuplicateName { name: String },
    /// A permanent type was defined after a per-compilation type already
    /// existed; permanent indices must stay densely packed at the bottom.
    InvalidPermanentOrdering { name: String },
    /// Reference to a function type name that was never defined.
    UnknownType { name: String },
    /// Reference to a name missing from the current local map.
    UnknownLocal { name: String },
    /// `call_import` against a name that was never defined.
    UnknownImport { name: String },
    /// Attempt to pop the base buffer of the stack.
    StackEmpty,
    /// `end_function` while `block`/`loop`/`if` scopes are still open.
    UnclosedBlocks { active: u32 },
    /// The integer encoding layer failed: the LEB128 encoder reported a
    /// written byte count below 1, or a count left the u32 range the
    /// binary format can encode.
    EncoderFailure { count: usize },
    /// A null function handle was passed to the table installer.
    NullFunction,
}

/// Convenience result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    pub fn unknown_local(name: impl Into<String>) -> Self {
        Self::UnknownLocal { name: name.into() }
    }

    pub fn unknown_import(name: impl Into<String>) -> Self {
        Self::UnknownImport { name: name.into() }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BufferFull {
                capacity,
                requested,
            } => write!(
                f,
                "buffer full: append of {requested} byte(s) exceeds capacity {capacity}"
            ),
            Error::ByteOutOfRange { value } => {
                write!(f, "byte append received out-of-range value {value}")
            }
            Error::DuplicateName { name } => write!(f, "name `{name}` is already defined"),
            Error::InvalidPermanentOrdering { name } => write!(
                f,
                "permanent type `{name}` defined after a per-compilation type"
            ),
            Error::UnknownType { name } => write!(f, "unknown function type `{name}`"),
            Error::UnknownLocal { name } => write!(f, "unknown local or parameter `{name}`"),
            Error::UnknownImport { name } => write!(f, "unknown import `{name}`"),
            Error::StackEmpty => write!(f, "cannot pop the base buffer of the stack"),
            Error::UnclosedBlocks { active } => {
                write!(f, "function ended with {active} unclosed block(s)")
            }
            Error::EncoderFailure { count } => {
                write!(f, "integer encoding failed (count {count})")
            }
            Error::NullFunction => write!(f, "null function handle passed to table installer"),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn display_formats_variants() {
        let full = Error::BufferFull {
            capacity: 8,
            requested: 16,
        };
        assert_eq!(
            full.to_string(),
            "buffer full: append of 16 byte(s) exceeds capacity 8"
        );

        let byte = Error::ByteOutOfRange { value: 300 };
        assert_eq!(byte.to_string(), "byte append received out-of-range value 300");

        let dup = Error::duplicate_name("trace_0");
        assert_eq!(dup.to_string(), "name `trace_0` is already defined");

        let local = Error::unknown_local("math_lhs32");
        assert_eq!(local.to_string(), "unknown local or parameter `math_lhs32`");

        let blocks = Error::UnclosedBlocks { active: 2 };
        assert_eq!(blocks.to_string(), "function ended with 2 unclosed block(s)");
    }

    #[test]
    fn helpers_accept_owned_and_borrowed_names() {
        let borrowed = Error::unknown_type("void");
        let owned = Error::unknown_type(String::from("void"));
        assert_eq!(borrowed.to_string(), owned.to_string());
    }
}
