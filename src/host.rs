use std::collections::HashMap;
use std::fmt;

/// Byte address in the interpreter's linear heap.
///
/// Kept distinct from [`Ip`] so addresses and instruction pointers cannot be
/// confused at the emission boundary; both are wide enough for a 64-bit heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ptr(pub u64);

impl fmt::Display for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Interpreter instruction pointer: a byte offset into the bytecode stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ip(pub u64);

impl Ip {
    /// Signed distance from `base` to this ip.
    #[must_use]
    pub fn offset_from(self, base: Ip) -> i64 {
        self.0 as i64 - base.0 as i64
    }
}

impl fmt::Display for Ip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Opaque handle to a host-callable function. The zero handle is null.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FuncRef(pub u64);

impl FuncRef {
    pub const NULL: FuncRef = FuncRef(0);

    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Services the embedding runtime provides to the builder.
///
/// The option parser accepts the same `--name[=value]` arguments the
/// runtime's command line does; `options_version` advances whenever any
/// option changes, and `options_json` snapshots the full table.
pub trait HostEnv {
    /// Monotonic counter advanced whenever any option changes.
    fn options_version(&self) -> u32;

    /// Full options table as one JSON document.
    fn options_json(&self) -> String;

    /// Feed one `--name[=value]` argument to the runtime option parser.
    fn parse_option(&mut self, arg: &str);

    /// Byte offset of a well-known interpreter structure member.
    fn member_offset(&self, member: &str) -> u32;

    /// Read a little-endian 64-bit integer from the interpreter heap.
    fn read_i64(&self, addr: Ptr) -> i64;
}

/// Memoised member-offset lookups: one host call per member, ever.
#[derive(Debug, Default)]
pub struct MemberOffsetCache {
    offsets: HashMap<&'static str, u32>,
}

impl MemberOffsetCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, host: &dyn HostEnv, member: &'static str) -> u32 {
        *self
            .offsets
            .entry(member)
            .or_insert_with(|| host.member_offset(member))
    }
}

#[cfg(test)]
mod tests {
    use super::{FuncRef, HostEnv, Ip, MemberOffsetCache, Ptr};
    use std::cell::Cell;

    struct CountingHost {
        lookups: Cell<u32>,
    }

    impl HostEnv for CountingHost {
        fn options_version(&self) -> u32 {
            0
        }

        fn options_json(&self) -> String {
            "{}".to_string()
        }

        fn parse_option(&mut self, _arg: &str) {}

        fn member_offset(&self, member: &str) -> u32 {
            self.lookups.set(self.lookups.get() + 1);
            member.len() as u32
        }

        fn read_i64(&self, _addr: Ptr) -> i64 {
            0
        }
    }

    #[test]
    fn ip_offsets_are_signed() {
        assert_eq!(Ip(0x1008).offset_from(Ip(0x1000)), 8);
        assert_eq!(Ip(0x1000).offset_from(Ip(0x1008)), -8);
    }

    #[test]
    fn null_func_ref_is_detected() {
        assert!(FuncRef::NULL.is_null());
        assert!(!FuncRef(7).is_null());
    }

    #[test]
    fn member_offsets_hit_the_host_once() {
        let host = CountingHost {
            lookups: Cell::new(0),
        };
        let mut cache = MemberOffsetCache::new();
        assert_eq!(cache.get(&host, "sp"), 2);
        assert_eq!(cache.get(&host, "sp"), 2);
        assert_eq!(cache.get(&host, "locals"), 6);
        assert_eq!(host.lookups.get(), 2);
    }
}
