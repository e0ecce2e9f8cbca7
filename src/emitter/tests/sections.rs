use expect_test::expect;

use super::common::{read_name, read_uleb, split_sections};
use crate::emitter::{ValType, WasmBuilder, format_blob_hex};

#[test]
fn empty_module_matches_the_canonical_byte_sequence() {
    let mut builder = WasmBuilder::with_capacity(1024, 0);
    let module = builder.emit_module().expect("emit");

    #[rustfmt::skip]
    let expected: Vec<u8> = vec![
        0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00, // header
        0x01, 0x01, 0x00, // type section: no entries
        0x02, 0x08, 0x01, 0x01, b'm', 0x01, b'h', 0x02, 0x00, 0x01, // memory import only
        0x03, 0x01, 0x00, // function section: no entries
        0x07, 0x01, 0x00, // export section: no entries
        0x0A, 0x01, 0x00, // code section: no entries
    ];
    assert_eq!(module, expected);

    let golden = expect![[r#"
        0000  00 61 73 6d 01 00 00 00 01 01 00 02 08 01 01 6d
        0010  01 68 02 00 01 03 01 00 07 01 00 0a 01 00
    "#]];
    golden.assert_eq(&format_blob_hex(&module));
}

#[test]
fn sections_appear_in_canonical_order_with_exact_length_prefixes() {
    let mut builder = WasmBuilder::with_capacity(8192, 0);
    builder
        .define_type("sig", &[("x", ValType::I32)], Some(ValType::I32), false)
        .expect("type");
    builder
        .define_imported_function("i", "bailout", "sig", true, None)
        .expect("import");
    builder
        .define_function("trace_0", "sig", true, &[], |b| {
            b.i32_const(3)?;
            b.append_u8(0x0B)?; // end
            Ok(())
        })
        .expect("function");

    let module = builder.emit_module().expect("emit");
    let sections = split_sections(&module);
    let ids: Vec<u8> = sections.iter().map(|section| section.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 7, 10]);
}

#[test]
fn structurally_equal_types_intern_to_one_entry() {
    let mut builder = WasmBuilder::with_capacity(1024, 0);
    let first = builder
        .define_type(
            "a",
            &[("x", ValType::I32), ("y", ValType::I32)],
            Some(ValType::I32),
            false,
        )
        .expect("a");
    let second = builder
        .define_type(
            "b",
            &[("p", ValType::I32), ("q", ValType::I32)],
            Some(ValType::I32),
            false,
        )
        .expect("b");
    assert_eq!(first, 0);
    assert_eq!(second, 0);

    let module = builder.emit_module().expect("emit");
    let sections = split_sections(&module);
    assert_eq!(
        sections[0].payload,
        vec![0x01, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F]
    );
}

#[test]
fn imports_are_listed_in_first_call_order() {
    let mut builder = WasmBuilder::with_capacity(8192, 0);
    builder
        .define_type("sig", &[], None, false)
        .expect("type");
    builder
        .define_imported_function("i", "I1", "sig", false, None)
        .expect("I1");
    builder
        .define_imported_function("i", "I2", "sig", false, None)
        .expect("I2");
    builder
        .define_function("trace_0", "sig", false, &[], |b| {
            b.call_import("I2")?;
            b.call_import("I1")?;
            b.call_import("I2")?;
            Ok(())
        })
        .expect("function");

    let module = builder.emit_module().expect("emit");
    let sections = split_sections(&module);

    // Call sites reference the lazily assigned indices 0, 1, 0.
    let body = builder.function_body("trace_0").expect("body");
    assert_eq!(&body[1..], &[0x10, 0x00, 0x10, 0x01, 0x10, 0x00]);

    // Section 2: both imports in assignment order, then the memory import.
    let payload = &sections[1].payload;
    let mut pos = 0;
    assert_eq!(read_uleb(payload, &mut pos), 3);
    let mut fields = Vec::new();
    for _ in 0..2 {
        assert_eq!(read_name(payload, &mut pos), "i");
        fields.push(read_name(payload, &mut pos));
        assert_eq!(payload[pos], 0x00); // function import
        pos += 1;
        let _type_index = read_uleb(payload, &mut pos);
    }
    assert_eq!(fields, vec!["I2", "I1"]);

    assert_eq!(read_name(payload, &mut pos), "m");
    assert_eq!(read_name(payload, &mut pos), "h");
    assert_eq!(&payload[pos..], &[0x02, 0x00, 0x01]);
}

#[test]
fn exports_offset_function_indices_past_the_imports() {
    let mut builder = WasmBuilder::with_capacity(8192, 0);
    builder.define_type("sig", &[], None, false).expect("type");
    builder
        .define_imported_function("i", "entry", "sig", true, Some("e"))
        .expect("import");
    builder
        .define_function("helper", "sig", false, &[], |_| Ok(()))
        .expect("helper");
    builder
        .define_function("trace_main", "sig", true, &[], |_| Ok(()))
        .expect("trace_main");

    let module = builder.emit_module().expect("emit");
    let sections = split_sections(&module);

    // Section 3 carries one type index per defined function.
    assert_eq!(sections[2].payload, vec![0x02, 0x00, 0x00]);

    // Only `trace_main` is exported, at one import plus function slot 1.
    let payload = &sections[3].payload;
    let mut pos = 0;
    assert_eq!(read_uleb(payload, &mut pos), 1);
    assert_eq!(read_name(payload, &mut pos), "trace_main");
    assert_eq!(payload[pos], 0x00);
    pos += 1;
    assert_eq!(read_uleb(payload, &mut pos), 2);
}

#[test]
fn code_section_carries_each_captured_body_verbatim() {
    let mut builder = WasmBuilder::with_capacity(8192, 0);
    builder.define_type("sig", &[], None, false).expect("type");
    builder
        .define_function("trace_0", "sig", false, &[("t", ValType::I64)], |b| {
            b.i52_const(-9)?;
            b.local("t", crate::emitter::LocalOp::Set)?;
            b.append_u8(0x0B)?;
            Ok(())
        })
        .expect("function");

    let module = builder.emit_module().expect("emit");
    let sections = split_sections(&module);

    let payload = &sections[4].payload;
    let mut pos = 0;
    assert_eq!(read_uleb(payload, &mut pos), 1);
    let body_len = read_uleb(payload, &mut pos) as usize;
    let body = &payload[pos..pos + body_len];
    assert_eq!(Some(body), builder.function_body("trace_0"));
    // Prologue (one i64 local) followed by the generator's opcodes.
    assert_eq!(body, &[0x01, 0x01, 0x7E, 0x42, 0x77, 0x21, 0x00, 0x0B]);
}
