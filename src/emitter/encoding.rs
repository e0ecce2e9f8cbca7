//! LEB128 encoders with the count-returning contract of the runtime's
//! integer encoder: each writes into a scratch destination and returns the
//! exact number of bytes produced. Callers treat a count below 1 as
//! `EncoderFailure`.

/// Largest encoding any writer produces (a full 65-bit SLEB128 group run).
pub(crate) const MAX_LEB_BYTES: usize = 10;

pub(crate) fn write_uleb(dest: &mut [u8; MAX_LEB_BYTES], value: u64) -> usize {
    let mut val = value;
    let mut count = 0;
    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;
        if val != 0 {
            byte |= 0x80;
        }
        dest[count] = byte;
        count += 1;
        if val == 0 {
            break;
        }
    }
    count
}

pub(crate) fn write_sleb(dest: &mut [u8; MAX_LEB_BYTES], value: i64) -> usize {
    write_sleb_wide(dest, i128::from(value))
}

/// Encode the overflow-test sentinel `±2^(bits − 1)`.
///
/// The positive sentinel for `bits = 64` does not fit an i64, so the shared
/// encoder runs over i128.
pub(crate) fn write_sleb_boundary(
    dest: &mut [u8; MAX_LEB_BYTES],
    bits: u32,
    negative: bool,
) -> usize {
    debug_assert!((1..=64).contains(&bits));
    let magnitude = 1i128 << (bits - 1);
    let value = if negative { -magnitude } else { magnitude };
    write_sleb_wide(dest, value)
}

fn write_sleb_wide(dest: &mut [u8; MAX_LEB_BYTES], value: i128) -> usize {
    let mut val = value;
    let mut count = 0;
    loop {
        let mut byte = (val & 0x7F) as u8;
        let sign_bit = byte & 0x40;
        val >>= 7;
        let done = (val == 0 && sign_bit == 0) || (val == -1 && sign_bit != 0);
        if !done {
            byte |= 0x80;
        }
        dest[count] = byte;
        count += 1;
        if done {
            break;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::{MAX_LEB_BYTES, write_sleb, write_sleb_boundary, write_uleb};

    fn uleb(value: u64) -> Vec<u8> {
        let mut scratch = [0u8; MAX_LEB_BYTES];
        let count = write_uleb(&mut scratch, value);
        scratch[..count].to_vec()
    }

    fn sleb(value: i64) -> Vec<u8> {
        let mut scratch = [0u8; MAX_LEB_BYTES];
        let count = write_sleb(&mut scratch, value);
        scratch[..count].to_vec()
    }

    #[test]
    fn uleb_single_and_multi_byte_values() {
        assert_eq!(uleb(0), vec![0x00]);
        assert_eq!(uleb(127), vec![0x7F]);
        assert_eq!(uleb(128), vec![0x80, 0x01]);
        assert_eq!(uleb(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(uleb(u64::MAX).len(), 10);
    }

    #[test]
    fn sleb_handles_sign_extension() {
        assert_eq!(sleb(0), vec![0x00]);
        assert_eq!(sleb(-1), vec![0x7F]);
        assert_eq!(sleb(63), vec![0x3F]);
        // 64 sets the sign bit of its low group and needs a second byte.
        assert_eq!(sleb(64), vec![0xC0, 0x00]);
        assert_eq!(sleb(-64), vec![0x40]);
        assert_eq!(sleb(-123_456), vec![0xC0, 0xBB, 0x78]);
    }

    #[test]
    fn boundary_sentinels_for_32_bits() {
        let mut scratch = [0u8; MAX_LEB_BYTES];
        let count = write_sleb_boundary(&mut scratch, 32, true);
        assert_eq!(&scratch[..count], &[0x80, 0x80, 0x80, 0x80, 0x78]);
        assert_eq!(scratch[..count], *sleb(i64::from(i32::MIN)).as_slice());

        let count = write_sleb_boundary(&mut scratch, 32, false);
        assert_eq!(&scratch[..count], &[0x80, 0x80, 0x80, 0x80, 0x08]);
    }

    #[test]
    fn boundary_sentinel_for_64_bits_widens_past_i64() {
        let mut scratch = [0u8; MAX_LEB_BYTES];
        let negative = write_sleb_boundary(&mut scratch, 64, true);
        assert_eq!(scratch[..negative], *sleb(i64::MIN).as_slice());

        // +2^63 has no i64 representation; it must still encode.
        let positive = write_sleb_boundary(&mut scratch, 64, false);
        assert_eq!(positive, 10);
        assert_eq!(
            &scratch[..positive],
            &[0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01]
        );
    }
}
