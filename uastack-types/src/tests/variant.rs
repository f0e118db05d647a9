// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

use std::io::Cursor;

use super::serialize_test;
use crate::{
    Array, BinaryDecodable, BinaryEncodable, ByteString, ContextOwned, DataValue, DateTime,
    LocalizedText, NodeId, QualifiedName, StatusCode, UAString, Variant, VariantScalarTypeId,
};

#[test]
fn scalar_round_trips() {
    serialize_test(Variant::Empty);
    serialize_test(Variant::Boolean(true));
    serialize_test(Variant::from(-125i8));
    serialize_test(Variant::from(0.00125f64));
    serialize_test(Variant::from(UAString::from("hello")));
    serialize_test(Variant::from(StatusCode::BadNodeIdUnknown));
    serialize_test(Variant::from(DateTime::from_ticks(1_000_000)));
    serialize_test(Variant::from(NodeId::new(2, "AGV.Speed")));
    serialize_test(Variant::from(QualifiedName::new(1, "Speed")));
    serialize_test(Variant::from(LocalizedText::new("en", "speed")));
    serialize_test(Variant::from(ByteString::from(&[0u8, 1, 2, 3])));
}

#[test]
fn nested_variant() {
    serialize_test(Variant::Variant(Box::new(Variant::from(42i32))));
}

#[test]
fn one_dimensional_array() {
    let array = Array::new(
        VariantScalarTypeId::Int32,
        vec![Variant::from(1i32), Variant::from(2i32), Variant::from(3i32)],
    )
    .unwrap();
    serialize_test(Variant::from(array));
}

#[test]
fn multi_dimensional_array() {
    let values = (0..6).map(|i| Variant::from(i as f64)).collect::<Vec<_>>();
    let array = Array::new_multi(VariantScalarTypeId::Double, values, Some(vec![2, 3])).unwrap();
    let variant = Variant::from(array);
    // Mask must carry both the array bit and the dimensions bit.
    assert_eq!(variant.encoding_mask(), 11 | 0x80 | 0x40);
    serialize_test(variant);
}

#[test]
fn mismatched_dimensions_rejected() {
    let values = (0..6).map(|i| Variant::from(i as f64)).collect::<Vec<_>>();
    assert!(Array::new_multi(VariantScalarTypeId::Double, values, Some(vec![2, 2])).is_err());
}

#[test]
fn mixed_type_array_rejected() {
    assert!(Array::new(
        VariantScalarTypeId::Int32,
        vec![Variant::from(1i32), Variant::from("two")],
    )
    .is_err());
}

#[test]
fn data_value_inside_variant() {
    let dv = DataValue {
        value: Some(Variant::from(1.23f64)),
        status: Some(StatusCode::UncertainLastUsableValue),
        source_timestamp: Some(DateTime::from_ticks(5_000_000)),
        source_picoseconds: Some(100),
        ..Default::default()
    };
    serialize_test(Variant::from(dv));
}

#[test]
fn unknown_type_id_fails() {
    let ctx_owned = ContextOwned::default();
    let ctx = ctx_owned.context();
    // Type id 60 does not exist.
    let mut stream = Cursor::new(vec![60u8, 0, 0, 0, 0]);
    assert!(Variant::decode(&mut stream, &ctx).is_err());
}

#[test]
fn byte_len_matches_encoded_len() {
    let ctx_owned = ContextOwned::default();
    let ctx = ctx_owned.context();
    let variant = Variant::from(
        Array::new(
            VariantScalarTypeId::String,
            vec![Variant::from("a"), Variant::from("bc")],
        )
        .unwrap(),
    );
    assert_eq!(variant.encode_to_vec(&ctx).len(), variant.byte_len(&ctx));
}
