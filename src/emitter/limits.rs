use crate::error::{Error, Result};

/// Narrow a count to the u32 range the binary format can encode.
///
/// Counts and indices beyond u32 have no module representation, so the
/// overflow surfaces through the encoding-layer error kind.
pub(crate) fn ensure_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::EncoderFailure { count: value })
}
