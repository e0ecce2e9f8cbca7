use super::common::TestHost;
use crate::emitter::buffer::{BufferStack, ByteBuffer};
use crate::error::Error;
use crate::host::Ptr;

#[test]
fn appends_return_the_offset_where_the_write_began() {
    let mut buf = ByteBuffer::new(64);
    assert_eq!(buf.append_u8(0x41).expect("byte"), 0);
    assert_eq!(buf.append_u32(0xDEAD_BEEF).expect("u32"), 1);
    assert_eq!(buf.append_uleb(300).expect("uleb"), 5);
    assert_eq!(buf.view(), &[0x41, 0xEF, 0xBE, 0xAD, 0xDE, 0xAC, 0x02]);
}

#[test]
fn primitive_appends_are_little_endian() {
    let mut buf = ByteBuffer::new(64);
    buf.append_u16(0x1234).expect("u16");
    buf.append_i16(-2).expect("i16");
    buf.append_i32(-1).expect("i32");
    buf.append_f32(1.5).expect("f32");
    buf.append_f64(-2.25).expect("f64");
    let mut expected = vec![0x34, 0x12, 0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
    expected.extend_from_slice(&1.5f32.to_le_bytes());
    expected.extend_from_slice(&(-2.25f64).to_le_bytes());
    assert_eq!(buf.view(), expected.as_slice());
}

#[test]
fn capacity_is_a_hard_limit() {
    let mut buf = ByteBuffer::new(4);
    buf.append_u32(7).expect("fits exactly");
    let err = buf.append_u8(0).expect_err("no room left");
    assert!(matches!(
        err,
        Error::BufferFull {
            capacity: 4,
            requested: 1
        }
    ));
}

#[test]
fn leb_appends_require_encoder_headroom() {
    let mut buf = ByteBuffer::new(10);
    buf.append_bytes(&[0; 3]).expect("fill");
    // Seven bytes remain, which is below the encoder headroom even though
    // the value itself would fit in one byte.
    let err = buf.append_uleb(1).expect_err("headroom");
    assert!(matches!(err, Error::BufferFull { .. }));
}

#[test]
fn out_of_range_byte_immediates_are_rejected() {
    let mut buf = ByteBuffer::new(8);
    assert!(matches!(
        buf.append_u8(256),
        Err(Error::ByteOutOfRange { value: 256 })
    ));
    assert!(matches!(
        buf.append_u8(-1),
        Err(Error::ByteOutOfRange { value: -1 })
    ));
    assert!(buf.is_empty());
}

#[test]
fn names_are_length_prefixed_utf8() {
    let mut buf = ByteBuffer::new(64);
    buf.append_name("m").expect("single ascii");
    buf.append_name("memory").expect("word");
    buf.append_name("é").expect("two-byte char");
    assert_eq!(
        buf.view(),
        &[
            0x01, b'm', // fast path
            0x06, b'm', b'e', b'm', b'o', b'r', b'y', // general path
            0x02, 0xC3, 0xA9, // utf-8 bytes counted, not chars
        ]
    );
}

#[test]
fn clear_resets_size_but_keeps_the_region() {
    let mut buf = ByteBuffer::new(16);
    buf.append_u32(1).expect("write");
    buf.clear();
    assert!(buf.is_empty());
    assert_eq!(buf.capacity(), 16);
    buf.append_u8(0x0B).expect("write after clear");
    assert_eq!(buf.view(), &[0x0B]);
}

#[test]
fn leb_ref_encodes_heap_values_without_widening() {
    let mut host = TestHost::default();
    host.store_i64(8, -2);
    host.store_i64(16, 0x000F_FFFF_FFFF_FFFF); // 52-bit payload

    let mut buf = ByteBuffer::new(64);
    buf.append_leb_ref(&host, Ptr(8), true).expect("signed");
    assert_eq!(buf.view(), &[0x7E]);

    buf.clear();
    buf.append_leb_ref(&host, Ptr(16), false).expect("unsigned");
    assert_eq!(buf.view().len(), 8);
}

#[test]
fn popped_scopes_splice_length_prefixed_into_the_parent() {
    let mut stack = BufferStack::new(64);
    stack.current_mut().append_u8(0x01).expect("parent byte");
    stack.push();
    stack
        .current_mut()
        .append_bytes(&[0xAA, 0xBB])
        .expect("child bytes");
    stack.pop_spliced().expect("pop");
    assert_eq!(stack.depth(), 1);
    assert_eq!(stack.current().view(), &[0x01, 0x02, 0xAA, 0xBB]);
}

#[test]
fn popped_scopes_can_hand_their_bytes_back_instead() {
    let mut stack = BufferStack::new(64);
    stack.push();
    stack.current_mut().append_u8(0x7F).expect("child byte");
    let bytes = stack.pop_bytes().expect("pop");
    assert_eq!(bytes, vec![0x7F]);
    assert!(stack.current().is_empty());
}

#[test]
fn the_base_slot_is_never_popped() {
    let mut stack = BufferStack::new(64);
    assert!(matches!(stack.pop_bytes(), Err(Error::StackEmpty)));
    stack.push();
    stack.pop_spliced().expect("balanced pop");
    assert!(matches!(stack.pop_spliced(), Err(Error::StackEmpty)));
}

#[test]
fn slots_are_reused_across_pushes() {
    let mut stack = BufferStack::new(64);
    stack.push();
    stack.current_mut().append_bytes(&[1, 2, 3]).expect("fill");
    let _ = stack.pop_bytes().expect("pop");

    // The next push reuses the slot and must not leak the old bytes.
    stack.push();
    assert!(stack.current().is_empty());
}
