//! Record buffers and the packed row format.
//!
//! A record is `null_bytes` of null bitmap followed by one slot per column
//! at a fixed offset. The packed row format used by replication is a null
//! bitmap with one bit per source column followed by the packed form of
//! every non-null column.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use tessera_common::config::CodecConfig;

use crate::decimal::Decimal;
use crate::diagnostics::{Diagnostics, StoreStatus};
use crate::error::{FieldError, FieldResult};
use crate::field::Field;
use crate::types::RealType;
use crate::value::Value;

/// Type and metadata of a column on the side that produced a packed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceColumn {
    /// Type byte.
    pub real_type: RealType,
    /// Type metadata, see [`crate::FieldType::field_metadata`].
    pub metadata: u16,
}

impl SourceColumn {
    /// Describes a local column.
    #[must_use]
    pub fn of(field: &Field) -> Self {
        Self {
            real_type: field.real_type(),
            metadata: field.field_metadata(),
        }
    }

    /// Returns the size of this column's packed value at the start of
    /// `data`.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooShort` if `data` ends inside the value.
    pub fn packed_size(&self, data: &[u8]) -> FieldResult<usize> {
        let size = match self.real_type.fixed_pack_length(self.metadata) {
            Some(size) => size,
            None => {
                let prefix = if self.metadata > 255 { 2 } else { 1 };
                FieldError::check_len(prefix, data.len())?;
                let len = if prefix == 1 {
                    usize::from(data[0])
                } else {
                    usize::from(u16::from_le_bytes([data[0], data[1]]))
                };
                prefix + len
            }
        };
        FieldError::check_len(size, data.len())?;
        Ok(size)
    }
}

/// Column layout of a table's record buffer.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    fields: Vec<Field>,
    offsets: Vec<usize>,
    null_bits: Vec<Option<usize>>,
    null_bytes: usize,
    reclength: usize,
}

impl RecordLayout {
    /// Builds a layout, binding every column to the configured record byte
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` for an invalid column type or a
    /// duplicate column name.
    pub fn new(fields: Vec<Field>, config: &CodecConfig) -> FieldResult<Self> {
        let mut names = HashSet::with_capacity(fields.len());
        for field in &fields {
            field.field_type().validate()?;
            if !names.insert(field.name().to_ascii_lowercase()) {
                return Err(FieldError::invalid_definition(format!(
                    "duplicate column name '{}'",
                    field.name()
                )));
            }
        }

        let fields: Vec<Field> = fields
            .into_iter()
            .map(|f| f.with_byte_order(config.db_low_byte_first))
            .collect();

        let mut null_bits = Vec::with_capacity(fields.len());
        let mut nullable: usize = 0;
        for field in &fields {
            if field.is_nullable() {
                null_bits.push(Some(nullable));
                nullable += 1;
            } else {
                null_bits.push(None);
            }
        }
        let null_bytes = nullable.div_ceil(8);

        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = null_bytes;
        for field in &fields {
            offsets.push(offset);
            offset += field.pack_length();
        }

        Ok(Self {
            fields,
            offsets,
            null_bits,
            null_bytes,
            reclength: offset,
        })
    }

    /// Returns the columns in order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns a column by position.
    ///
    /// # Errors
    ///
    /// Returns `ColumnOutOfBounds` for an invalid position.
    pub fn field(&self, idx: usize) -> FieldResult<&Field> {
        self.fields.get(idx).ok_or(FieldError::ColumnOutOfBounds {
            index: idx,
            count: self.fields.len(),
        })
    }

    /// Returns the position of a column by case-insensitive name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the layout has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the record buffer size.
    #[must_use]
    pub fn reclength(&self) -> usize {
        self.reclength
    }

    /// Returns the size of the null bitmap at the head of the record.
    #[must_use]
    pub fn null_bytes(&self) -> usize {
        self.null_bytes
    }

    /// Returns the table map describing this layout to a replica.
    #[must_use]
    pub fn metadata(&self) -> Vec<SourceColumn> {
        self.fields.iter().map(SourceColumn::of).collect()
    }

    fn slot_range(&self, idx: usize) -> std::ops::Range<usize> {
        let start = self.offsets[idx];
        start..start + self.fields[idx].pack_length()
    }
}

/// A record buffer bound to its layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    layout: Arc<RecordLayout>,
    buf: Vec<u8>,
}

impl PartialEq for RecordLayout {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for RecordLayout {}

impl Record {
    /// Creates an empty record: nullable columns NULL, the rest zero.
    #[must_use]
    pub fn new(layout: Arc<RecordLayout>) -> Self {
        let buf = vec![0u8; layout.reclength()];
        let mut record = Self { layout, buf };
        record.reset();
        record
    }

    /// Wraps an existing record buffer.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooShort` if `buf` is smaller than the layout.
    pub fn from_bytes(layout: Arc<RecordLayout>, buf: Vec<u8>) -> FieldResult<Self> {
        FieldError::check_len(layout.reclength(), buf.len())?;
        Ok(Self { layout, buf })
    }

    /// Returns the layout.
    #[must_use]
    pub fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    /// Returns the raw record buffer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Resets every column to its initial state.
    pub fn reset(&mut self) {
        self.buf.fill(0);
        for idx in 0..self.layout.len() {
            if let Some(bit) = self.layout.null_bits[idx] {
                self.buf[bit / 8] |= 1 << (bit % 8);
            }
        }
    }

    /// Returns true if the column is NULL.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[must_use]
    pub fn is_null(&self, idx: usize) -> bool {
        match self.layout.null_bits[idx] {
            Some(bit) => self.buf[bit / 8] & (1 << (bit % 8)) != 0,
            None => false,
        }
    }

    /// Sets a column to NULL.
    ///
    /// # Errors
    ///
    /// Returns `NullNotAllowed` for a NOT NULL column.
    pub fn set_null(&mut self, idx: usize) -> FieldResult<()> {
        let field = self.layout.field(idx)?;
        let Some(bit) = self.layout.null_bits[idx] else {
            return Err(FieldError::NullNotAllowed {
                field: field.name().to_string(),
            });
        };
        self.buf[bit / 8] |= 1 << (bit % 8);
        Ok(())
    }

    fn set_not_null(&mut self, idx: usize) {
        if let Some(bit) = self.layout.null_bits[idx] {
            self.buf[bit / 8] &= !(1 << (bit % 8));
        }
    }

    /// Returns the slot of a column.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[must_use]
    pub fn field_bytes(&self, idx: usize) -> &[u8] {
        &self.buf[self.layout.slot_range(idx)]
    }

    fn store_with<F>(
        &mut self,
        idx: usize,
        diag: &mut Diagnostics,
        store: F,
    ) -> FieldResult<StoreStatus>
    where
        F: FnOnce(&Field, &mut [u8]) -> FieldResult<StoreStatus>,
    {
        let layout = Arc::clone(&self.layout);
        let field = layout.field(idx)?;
        let status = store(field, &mut self.buf[layout.slot_range(idx)])?;
        self.set_not_null(idx);
        diag.report(field.name(), status)
    }

    /// Stores an integer into a column, see [`Field::store_int`].
    ///
    /// # Errors
    ///
    /// Returns the field error, or `Strict` when strict mode turns the
    /// outcome into an error.
    pub fn store_int(
        &mut self,
        idx: usize,
        nr: i64,
        unsigned_val: bool,
        diag: &mut Diagnostics,
    ) -> FieldResult<StoreStatus> {
        self.store_with(idx, diag, |f, to| f.store_int(to, nr, unsigned_val))
    }

    /// Stores text into a column, see [`Field::store_str`].
    ///
    /// # Errors
    ///
    /// As [`Record::store_int`].
    pub fn store_str(
        &mut self,
        idx: usize,
        from: &[u8],
        diag: &mut Diagnostics,
    ) -> FieldResult<StoreStatus> {
        self.store_with(idx, diag, |f, to| f.store_str(to, from))
    }

    /// Stores a double into a column.
    ///
    /// # Errors
    ///
    /// As [`Record::store_int`].
    pub fn store_real(
        &mut self,
        idx: usize,
        nr: f64,
        diag: &mut Diagnostics,
    ) -> FieldResult<StoreStatus> {
        self.store_with(idx, diag, |f, to| f.store_real(to, nr))
    }

    /// Stores a decimal into a column.
    ///
    /// # Errors
    ///
    /// As [`Record::store_int`].
    pub fn store_decimal(
        &mut self,
        idx: usize,
        nr: &Decimal,
        diag: &mut Diagnostics,
    ) -> FieldResult<StoreStatus> {
        self.store_with(idx, diag, |f, to| f.store_decimal(to, nr))
    }

    /// Stores a canonical value; NULL sets the null bit.
    ///
    /// # Errors
    ///
    /// Returns `NullNotAllowed` for NULL into a NOT NULL column, otherwise
    /// as [`Record::store_int`].
    pub fn store_value(
        &mut self,
        idx: usize,
        value: &Value,
        diag: &mut Diagnostics,
    ) -> FieldResult<StoreStatus> {
        if value.is_null() {
            self.set_null(idx)?;
            return Ok(StoreStatus::Ok);
        }
        self.store_with(idx, diag, |f, to| f.store_value(to, value))
    }

    /// Reads a column.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[must_use]
    pub fn value(&self, idx: usize) -> Value {
        if self.is_null(idx) {
            return Value::Null;
        }
        self.layout.fields[idx].value(self.field_bytes(idx))
    }

    /// Reads every column.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        (0..self.layout.len()).map(|idx| self.value(idx)).collect()
    }
}

/// Packs and unpacks rows for replication.
///
/// The wire byte order is fixed per codec; fields convert from and to the
/// record byte order as needed.
#[derive(Debug, Clone, Copy)]
pub struct RowCodec {
    low_byte_first: bool,
}

impl RowCodec {
    /// Creates a codec for the configured wire byte order.
    #[must_use]
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            low_byte_first: config.wire_low_byte_first,
        }
    }

    /// Returns true if the wire format is little-endian.
    #[must_use]
    pub fn low_byte_first(&self) -> bool {
        self.low_byte_first
    }

    /// Packs a record.
    #[must_use]
    pub fn pack_row(&self, record: &Record) -> Bytes {
        let layout = record.layout();
        let count = layout.len();
        let mut out = BytesMut::with_capacity(count.div_ceil(8) + layout.reclength());

        let mut bitmap = vec![0u8; count.div_ceil(8)];
        for idx in 0..count {
            if record.is_null(idx) {
                bitmap[idx / 8] |= 1 << (idx % 8);
            }
        }
        out.put_slice(&bitmap);

        for (idx, field) in layout.fields().iter().enumerate() {
            if !record.is_null(idx) {
                field.pack(&mut out, record.field_bytes(idx), usize::MAX, self.low_byte_first);
            }
        }
        out.freeze()
    }

    /// Unpacks a row produced by a source with the given columns into
    /// `record`.
    ///
    /// Source columns beyond the local layout are skipped. Local columns
    /// the source does not have are reset. Returns the number of bytes
    /// consumed.
    ///
    /// # Errors
    ///
    /// Returns `IncompatibleField` when a source column type differs from
    /// the local one or its values may not fit the local column,
    /// `NullNotAllowed` for NULL into a NOT NULL column and `BufferTooShort`
    /// for a truncated row.
    pub fn unpack_row(
        &self,
        record: &mut Record,
        from: &[u8],
        source: &[SourceColumn],
    ) -> FieldResult<usize> {
        let layout = Arc::clone(record.layout());
        let bitmap_len = source.len().div_ceil(8);
        FieldError::check_len(bitmap_len, from.len())?;
        let (bitmap, mut rest) = from.split_at(bitmap_len);
        let mut pos = bitmap_len;

        record.reset();
        for (idx, column) in source.iter().enumerate() {
            let is_null = bitmap[idx / 8] & (1 << (idx % 8)) != 0;
            let Some(field) = layout.fields().get(idx) else {
                if !is_null {
                    let size = column.packed_size(rest)?;
                    trace!(column = idx, size, "skipping extra source column");
                    rest.advance(size);
                    pos += size;
                }
                continue;
            };

            if column.real_type != field.real_type() {
                return Err(FieldError::IncompatibleField {
                    field: field.name().to_string(),
                    reason: format!(
                        "source type {:?} does not match {}",
                        column.real_type,
                        field.field_type()
                    ),
                });
            }

            if !field.compatible_field_size(column.metadata) {
                return Err(FieldError::IncompatibleField {
                    field: field.name().to_string(),
                    reason: format!(
                        "source metadata {:#06x} does not fit {}",
                        column.metadata,
                        field.field_type()
                    ),
                });
            }

            if is_null {
                record.set_null(idx)?;
                continue;
            }

            let range = layout.slot_range(idx);
            let used = field.unpack(
                &mut record.buf[range],
                rest,
                column.metadata,
                self.low_byte_first,
            )?;
            record.set_not_null(idx);
            rest.advance(used);
            pos += used;
        }
        Ok(pos)
    }

    /// Encodes a table map: column count (u16 LE) then, per column, the
    /// type byte and the metadata (u16 LE).
    #[must_use]
    pub fn encode_metadata(columns: &[SourceColumn]) -> Bytes {
        let mut out = BytesMut::with_capacity(2 + columns.len() * 3);
        out.put_u16_le(columns.len() as u16);
        for column in columns {
            out.put_u8(column.real_type.as_u8());
            out.put_u16_le(column.metadata);
        }
        out.freeze()
    }

    /// Decodes a table map written by [`RowCodec::encode_metadata`].
    ///
    /// # Errors
    ///
    /// Returns `BufferTooShort` for truncated input and
    /// `IncompatibleField` for an unknown type byte or impossible decimal
    /// dimensions.
    pub fn decode_metadata(mut data: &[u8]) -> FieldResult<Vec<SourceColumn>> {
        FieldError::check_len(2, data.len())?;
        let count = usize::from(data.get_u16_le());
        FieldError::check_len(count * 3, data.len())?;
        let mut columns = Vec::with_capacity(count);
        for idx in 0..count {
            let tag = data.get_u8();
            let real_type = RealType::from_u8(tag).ok_or_else(|| FieldError::IncompatibleField {
                field: format!("#{idx}"),
                reason: format!("unknown type byte {tag}"),
            })?;
            let metadata = data.get_u16_le();
            if real_type == RealType::Decimal {
                let [precision, scale] = metadata.to_be_bytes();
                Decimal::check_dimensions(precision, scale).map_err(|err| {
                    FieldError::IncompatibleField {
                        field: format!("#{idx}"),
                        reason: err.to_string(),
                    }
                })?;
            }
            columns.push(SourceColumn {
                real_type,
                metadata,
            });
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Charset, FieldType};

    fn layout(config: &CodecConfig) -> Arc<RecordLayout> {
        Arc::new(
            RecordLayout::new(
                vec![
                    Field::new("id", FieldType::LongLong { unsigned: false }),
                    Field::new(
                        "name",
                        FieldType::VarString {
                            max_length: 20,
                            charset: Charset::Utf8,
                        },
                    )
                    .nullable(),
                    Field::new(
                        "price",
                        FieldType::Decimal {
                            precision: 8,
                            scale: 2,
                        },
                    ),
                    Field::new("score", FieldType::Double).nullable(),
                ],
                config,
            )
            .unwrap(),
        )
    }

    fn sample(layout: Arc<RecordLayout>) -> Record {
        let mut diag = Diagnostics::default();
        let mut record = Record::new(layout);
        record.store_int(0, 42, false, &mut diag).unwrap();
        record.store_str(1, b"widget", &mut diag).unwrap();
        record.store_str(2, b"19.99", &mut diag).unwrap();
        assert!(diag.is_empty());
        record
    }

    #[test]
    fn test_layout_offsets() {
        let layout = layout(&CodecConfig::default());
        assert_eq!(layout.null_bytes(), 1);
        assert_eq!(layout.reclength(), 1 + 8 + 21 + 4 + 8);
        assert_eq!(layout.position("PRICE"), Some(2));
        assert_eq!(layout.metadata()[2].metadata, 0x0802);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let err = RecordLayout::new(
            vec![
                Field::new("a", FieldType::Double),
                Field::new("A", FieldType::Double),
            ],
            &CodecConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FieldError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_new_record_nulls() {
        let record = Record::new(layout(&CodecConfig::default()));
        assert_eq!(record.value(0), Value::Int(0));
        assert_eq!(record.value(1), Value::Null);
        assert_eq!(record.value(3), Value::Null);
    }

    #[test]
    fn test_store_value_null() {
        let mut diag = Diagnostics::default();
        let mut record = sample(layout(&CodecConfig::default()));
        record.store_value(1, &Value::Null, &mut diag).unwrap();
        assert!(record.is_null(1));
        assert!(matches!(
            record.store_value(0, &Value::Null, &mut diag),
            Err(FieldError::NullNotAllowed { .. })
        ));
        assert!(matches!(
            record.store_int(9, 1, false, &mut diag),
            Err(FieldError::ColumnOutOfBounds { index: 9, count: 4 })
        ));
    }

    #[test]
    fn test_strict_mode_fails_store() {
        let mut diag = Diagnostics::new(true);
        let mut record = Record::new(layout(&CodecConfig::default()));
        let err = record.store_str(2, b"123456789", &mut diag).unwrap_err();
        assert!(matches!(err, FieldError::Strict { row: 1, .. }));
    }

    #[test]
    fn test_row_round_trip_with_byte_swap() {
        let config = CodecConfig {
            db_low_byte_first: true,
            wire_low_byte_first: false,
        };
        let layout = layout(&config);
        let record = sample(Arc::clone(&layout));
        let codec = RowCodec::new(&config);

        let packed = codec.pack_row(&record);
        // bitmap, id, "widget" with a 1-byte length, price
        assert_eq!(packed.len(), 1 + 8 + 7 + 4);
        assert_eq!(packed[0], 0b1000);
        assert_eq!(&packed[1..9], 42i64.to_be_bytes());

        let mut copy = Record::new(Arc::clone(&layout));
        let used = codec.unpack_row(&mut copy, &packed, &layout.metadata()).unwrap();
        assert_eq!(used, packed.len());
        assert_eq!(copy.values(), record.values());
    }

    #[test]
    fn test_unpack_skips_extra_source_columns() {
        let config = CodecConfig::default();
        let wide = layout(&config);
        let narrow = Arc::new(
            RecordLayout::new(
                vec![Field::new("id", FieldType::LongLong { unsigned: false })],
                &config,
            )
            .unwrap(),
        );
        let codec = RowCodec::new(&config);
        let mut record = sample(Arc::clone(&wide));
        let mut diag = Diagnostics::default();
        record.store_real(3, 0.5, &mut diag).unwrap();
        let packed = codec.pack_row(&record);

        let mut target = Record::new(narrow);
        let used = codec
            .unpack_row(&mut target, &packed, &wide.metadata())
            .unwrap();
        assert_eq!(used, packed.len());
        assert_eq!(target.value(0), Value::Int(42));
    }

    #[test]
    fn test_unpack_type_mismatch() {
        let config = CodecConfig::default();
        let layout = layout(&config);
        let record = sample(Arc::clone(&layout));
        let packed = RowCodec::new(&config).pack_row(&record);

        let mut source = layout.metadata();
        source[0].real_type = RealType::Long;
        let mut target = Record::new(layout);
        assert!(matches!(
            RowCodec::new(&config).unpack_row(&mut target, &packed, &source),
            Err(FieldError::IncompatibleField { .. })
        ));
    }

    #[test]
    fn test_metadata_encoding() {
        let layout = layout(&CodecConfig::default());
        let encoded = RowCodec::encode_metadata(&layout.metadata());
        assert_eq!(encoded.len(), 2 + 4 * 3);
        let decoded = RowCodec::decode_metadata(&encoded).unwrap();
        assert_eq!(decoded, layout.metadata());

        assert!(RowCodec::decode_metadata(&[1, 0, 99, 0, 0]).is_err());
        assert!(RowCodec::decode_metadata(&[2, 0, 1, 0, 0]).is_err());
    }

    #[test]
    fn test_metadata_rejects_impossible_decimal() {
        // DECIMAL(2,5) and DECIMAL(64,0)
        for metadata in [0x0205u16, 0x4000] {
            let mut map = vec![1, 0, RealType::Decimal.as_u8()];
            map.extend_from_slice(&metadata.to_le_bytes());
            assert!(matches!(
                RowCodec::decode_metadata(&map),
                Err(FieldError::IncompatibleField { .. })
            ));
        }
    }

    #[test]
    fn test_unpack_rejects_wider_source_string() {
        let config = CodecConfig::default();
        let make = |max_length| {
            Arc::new(
                RecordLayout::new(
                    vec![
                        Field::new(
                            "tag",
                            FieldType::VarString {
                                max_length,
                                charset: Charset::Binary,
                            },
                        ),
                        Field::new("n", FieldType::Long { unsigned: false }),
                    ],
                    &config,
                )
                .unwrap(),
            )
        };
        let (wide, narrow) = (make(300), make(200));
        let mut diag = Diagnostics::default();
        let mut record = Record::new(Arc::clone(&wide));
        record.store_str(0, b"hey", &mut diag).unwrap();
        record.store_int(1, 7, false, &mut diag).unwrap();
        let codec = RowCodec::new(&config);
        let packed = codec.pack_row(&record);

        let mut target = Record::new(narrow);
        assert!(matches!(
            codec.unpack_row(&mut target, &packed, &wide.metadata()),
            Err(FieldError::IncompatibleField { .. })
        ));

        let mut same = Record::new(Arc::clone(&wide));
        codec.unpack_row(&mut same, &packed, &wide.metadata()).unwrap();
        assert_eq!(same.values(), record.values());
    }
}
