//! Row codec properties across record and wire byte orders.

use std::sync::Arc;

use proptest::prelude::*;
use uuid::Uuid;

use tessera_common::config::CodecConfig;
use tessera_field::{
    Charset, Decimal, Diagnostics, Field, FieldType, Record, RecordLayout, RowCodec, Value,
};

fn layout(config: &CodecConfig) -> Arc<RecordLayout> {
    Arc::new(
        RecordLayout::new(
            vec![
                Field::new("id", FieldType::LongLong { unsigned: false }),
                Field::new("qty", FieldType::Long { unsigned: true }),
                Field::new(
                    "name",
                    FieldType::VarString {
                        max_length: 24,
                        charset: Default::default(),
                    },
                )
                .nullable(),
                Field::new("score", FieldType::Double).nullable(),
            ],
            config,
        )
        .unwrap(),
    )
}

/// One column of every remaining type, with a string wide enough for a
/// two-byte length prefix.
fn mixed_layout(config: &CodecConfig) -> Arc<RecordLayout> {
    Arc::new(
        RecordLayout::new(
            vec![
                Field::new("flag", FieldType::Tiny { unsigned: false }),
                Field::new("port", FieldType::Short { unsigned: true }),
                Field::new(
                    "amount",
                    FieldType::Decimal {
                        precision: 12,
                        scale: 3,
                    },
                ),
                Field::new("token", FieldType::Uuid).nullable(),
                Field::new(
                    "note",
                    FieldType::VarString {
                        max_length: 300,
                        charset: Charset::Binary,
                    },
                ),
            ],
            config,
        )
        .unwrap(),
    )
}

fn configs() -> impl Strategy<Value = CodecConfig> {
    (any::<bool>(), any::<bool>()).prop_map(|(db, wire)| CodecConfig {
        db_low_byte_first: db,
        wire_low_byte_first: wire,
    })
}

proptest! {
    /// Unpacking a packed row restores every column, whatever the byte
    /// orders of the two sides.
    #[test]
    fn prop_row_survives_pack_unpack(
        source in configs(),
        target in configs(),
        id in any::<i64>(),
        qty in any::<u32>(),
        name in proptest::option::of("[a-z0-9 ]{0,24}"),
        score in proptest::option::of(-1.0e12f64..1.0e12),
    ) {
        let mut diag = Diagnostics::default();
        let mut record = Record::new(layout(&source));
        record.store_int(0, id, false, &mut diag).unwrap();
        record.store_int(1, i64::from(qty), false, &mut diag).unwrap();
        match &name {
            Some(name) => record.store_str(2, name.as_bytes(), &mut diag).unwrap(),
            None => record.store_value(2, &Value::Null, &mut diag).unwrap(),
        };
        match score {
            Some(score) => record.store_real(3, score, &mut diag).unwrap(),
            None => record.store_value(3, &Value::Null, &mut diag).unwrap(),
        };
        prop_assert!(diag.is_empty());

        // Both sides must agree on the wire order.
        let wire = CodecConfig { wire_low_byte_first: source.wire_low_byte_first, ..target };
        let packed = RowCodec::new(&source).pack_row(&record);
        let target_layout = layout(&wire);
        let mut copy = Record::new(Arc::clone(&target_layout));
        let used = RowCodec::new(&wire)
            .unpack_row(&mut copy, &packed, &target_layout.metadata())
            .unwrap();

        prop_assert_eq!(used, packed.len());
        prop_assert_eq!(copy.values(), record.values());
        prop_assert_eq!(copy.value(0), Value::Int(id));
        prop_assert_eq!(copy.value(1), Value::UInt(u64::from(qty)));
    }

    /// The same holds for small integers, decimals, UUIDs and strings
    /// with a two-byte length prefix.
    #[test]
    fn prop_mixed_row_survives_pack_unpack(
        source in configs(),
        target in configs(),
        flag in any::<i8>(),
        port in any::<u16>(),
        amount in -999_999_999_999i128..=999_999_999_999,
        token in proptest::option::of(any::<u128>()),
        note in "[a-z]{0,290}",
    ) {
        let mut diag = Diagnostics::default();
        let mut record = Record::new(mixed_layout(&source));
        record.store_int(0, i64::from(flag), false, &mut diag).unwrap();
        record.store_int(1, i64::from(port), false, &mut diag).unwrap();
        record.store_decimal(2, &Decimal::new(amount, 3), &mut diag).unwrap();
        let token = token.map(Uuid::from_u128);
        match token {
            Some(token) => record.store_value(3, &Value::Uuid(token), &mut diag).unwrap(),
            None => record.store_value(3, &Value::Null, &mut diag).unwrap(),
        };
        record.store_str(4, note.as_bytes(), &mut diag).unwrap();
        prop_assert!(diag.is_empty());

        let wire = CodecConfig { wire_low_byte_first: source.wire_low_byte_first, ..target };
        let packed = RowCodec::new(&source).pack_row(&record);
        let target_layout = mixed_layout(&wire);
        let mut copy = Record::new(Arc::clone(&target_layout));
        let used = RowCodec::new(&wire)
            .unpack_row(&mut copy, &packed, &target_layout.metadata())
            .unwrap();

        prop_assert_eq!(used, packed.len());
        prop_assert_eq!(copy.values(), record.values());
        prop_assert_eq!(copy.value(0), Value::Int(i64::from(flag)));
        prop_assert_eq!(copy.value(1), Value::UInt(u64::from(port)));
        prop_assert_eq!(copy.value(2), Value::Decimal(Decimal::new(amount, 3)));
        prop_assert_eq!(copy.value(3), token.map_or(Value::Null, Value::Uuid));
        prop_assert_eq!(copy.value(4), Value::Bytes(note.into_bytes().into()));
    }

    /// Sort keys compare like the integers they encode.
    #[test]
    fn prop_integer_sort_key_order(
        db_low_byte_first in any::<bool>(),
        a in any::<i32>(),
        b in any::<i32>(),
    ) {
        let field = Field::new("n", FieldType::Long { unsigned: false })
            .with_byte_order(db_low_byte_first);
        let mut left = vec![0u8; field.pack_length()];
        let mut right = vec![0u8; field.pack_length()];
        field.store_int(&mut left, i64::from(a), false).unwrap();
        field.store_int(&mut right, i64::from(b), false).unwrap();

        prop_assert_eq!(field.sort_key(&left).cmp(&field.sort_key(&right)), a.cmp(&b));
        prop_assert_eq!(field.cmp(&left, &right), a.cmp(&b));
    }

    /// A string sorts before every longer string it prefixes.
    #[test]
    fn prop_string_sort_key_prefix(s in "[a-z]{0,10}", suffix in "[a-z]{1,5}") {
        let field = Field::new(
            "s",
            FieldType::VarString { max_length: 16, charset: Default::default() },
        );
        let mut short = vec![0u8; field.pack_length()];
        let mut long = vec![0u8; field.pack_length()];
        field.store_str(&mut short, s.as_bytes()).unwrap();
        field.store_str(&mut long, format!("{s}{suffix}").as_bytes()).unwrap();

        prop_assert!(field.sort_key(&short) < field.sort_key(&long));
    }
}

#[test]
fn test_table_map_round_trip() {
    let layout = layout(&CodecConfig::default());
    let columns = layout.metadata();
    let encoded = RowCodec::encode_metadata(&columns);
    assert_eq!(encoded.len(), 2 + 3 * columns.len());
    assert_eq!(RowCodec::decode_metadata(&encoded).unwrap(), columns);
}
