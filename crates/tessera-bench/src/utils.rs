//! Benchmark utilities and helpers.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tessera_common::config::CodecConfig;
use tessera_field::{Diagnostics, Field, FieldResult, FieldType, Record, RecordLayout};

/// Generates random string data for benchmarks.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Layout of an order row: id, quantity, item name, price, score.
///
/// # Errors
///
/// Propagates layout validation errors.
pub fn order_layout(config: &CodecConfig) -> FieldResult<Arc<RecordLayout>> {
    let fields = vec![
        Field::new("id", FieldType::LongLong { unsigned: false }),
        Field::new("qty", FieldType::Long { unsigned: true }),
        Field::new(
            "item",
            FieldType::VarString {
                max_length: 64,
                charset: Default::default(),
            },
        )
        .nullable(),
        Field::new(
            "price",
            FieldType::Decimal {
                precision: 12,
                scale: 2,
            },
        ),
        Field::new("score", FieldType::Double).nullable(),
    ];
    Ok(Arc::new(RecordLayout::new(fields, config)?))
}

/// Generates `count` filled order rows with a fixed seed.
///
/// # Errors
///
/// Propagates store errors.
pub fn generate_orders(layout: &Arc<RecordLayout>, count: usize) -> FieldResult<Vec<Record>> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut diag = Diagnostics::default();
    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let mut record = Record::new(Arc::clone(layout));
        let item_len = rng.gen_range(4..48);
        let item = random_string(&mut rng, item_len);
        let price = format!("{}.{:02}", rng.gen_range(0..100_000), rng.gen_range(0..100));
        record.store_int(0, i as i64, false, &mut diag)?;
        record.store_int(1, rng.gen_range(1..1000), false, &mut diag)?;
        record.store_str(2, item.as_bytes(), &mut diag)?;
        record.store_str(3, price.as_bytes(), &mut diag)?;
        record.store_real(4, rng.gen_range(-1.0e6..1.0e6), &mut diag)?;
        records.push(record);
    }
    Ok(records)
}

/// Generates random signed integers with a fixed seed.
pub fn generate_ints(count: usize) -> Vec<i64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count).map(|_| rng.gen()).collect()
}

/// Generates sequential catalog names.
pub fn generate_catalog_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("catalog_{:06}", i)).collect()
}
