//! Column codec.
//!
//! A [`Field`] knows how one column is laid out inside a record buffer.
//! Every method takes the column's slot (`pack_length()` bytes of the
//! record) rather than the whole record, so engines can run the codec over
//! their own buffers.
//!
//! Multi-byte numbers are stored in the record's byte order
//! (`db_low_byte_first`). [`Field::pack`] and [`Field::unpack`] reverse the
//! bytes exactly when the wire order requested by the caller disagrees.

use std::cmp::Ordering;

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use tessera_common::constants::{UUID_PACK_LENGTH, VARSTRING_ONE_BYTE_MAX};

use crate::decimal::Decimal;
use crate::diagnostics::StoreStatus;
use crate::error::{FieldError, FieldResult};
use crate::parse::{rint, scan_number};
use crate::types::{Charset, FieldType, RealType};
use crate::value::Value;

/// A column definition bound to a record byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    field_type: FieldType,
    nullable: bool,
    db_low_byte_first: bool,
}

impl Field {
    /// Creates a NOT NULL column stored little-endian.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            db_low_byte_first: true,
        }
    }

    /// Marks the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the byte order of the record buffer.
    #[must_use]
    pub fn with_byte_order(mut self, db_low_byte_first: bool) -> Self {
        self.db_low_byte_first = db_low_byte_first;
        self
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns true if the column accepts NULL.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns the record byte order.
    #[must_use]
    pub fn db_low_byte_first(&self) -> bool {
        self.db_low_byte_first
    }

    /// Returns the slot size in the record.
    #[must_use]
    pub fn pack_length(&self) -> usize {
        self.field_type.pack_length()
    }

    /// Returns the replication type byte.
    #[must_use]
    pub fn real_type(&self) -> RealType {
        self.field_type.real_type()
    }

    /// Returns the replication metadata.
    #[must_use]
    pub fn field_metadata(&self) -> u16 {
        self.field_type.field_metadata()
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// Stores text, converting it to the column type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUuid` for malformed UUID text and `BufferTooShort`
    /// if `to` is smaller than the slot.
    pub fn store_str(&self, to: &mut [u8], from: &[u8]) -> FieldResult<StoreStatus> {
        FieldError::check_len(self.pack_length(), to.len())?;
        match self.field_type {
            FieldType::Tiny { .. }
            | FieldType::Short { .. }
            | FieldType::Long { .. }
            | FieldType::LongLong { .. } => {
                let Some(num) = scan_number(from, false) else {
                    self.write_int(to, 0);
                    return Ok(StoreStatus::WrongValue);
                };
                let mut status = match num.to_i128_rounded() {
                    Some((v, lossy)) => {
                        let status = self.store_clamped(to, v);
                        if lossy {
                            status.max(StoreStatus::Rounded)
                        } else {
                            status
                        }
                    }
                    None => {
                        let bound = if num.negative { i128::MIN } else { i128::MAX };
                        self.store_clamped(to, bound)
                    }
                };
                if num.garbage {
                    status = status.max(StoreStatus::Truncated);
                }
                Ok(status)
            }
            FieldType::Double => {
                let Some(num) = scan_number(from, true) else {
                    self.write_double(to, 0.0);
                    return Ok(StoreStatus::WrongValue);
                };
                let nr = std::str::from_utf8(num.span)
                    .ok()
                    .and_then(|s| s.parse::<f64>().ok())
                    .unwrap_or(0.0);
                let status = self.store_real(to, nr)?;
                Ok(if num.garbage {
                    status.max(StoreStatus::Truncated)
                } else {
                    status
                })
            }
            FieldType::Decimal { precision, scale } => {
                let Some(num) = scan_number(from, false) else {
                    Decimal::new(0, scale).to_bin(precision, scale, to)?;
                    return Ok(StoreStatus::WrongValue);
                };
                let (value, status) = Decimal::fit_text(&num, precision, scale);
                value.to_bin(precision, scale, to)?;
                Ok(status)
            }
            FieldType::VarString {
                max_length,
                charset,
            } => Ok(self.store_string(to, from, usize::from(max_length), charset)),
            FieldType::Uuid => {
                let parsed = std::str::from_utf8(from)
                    .ok()
                    .and_then(|s| Uuid::parse_str(s.trim()).ok());
                let Some(uuid) = parsed else {
                    return Err(FieldError::InvalidUuid {
                        field: self.name.clone(),
                        value: String::from_utf8_lossy(from).into_owned(),
                    });
                };
                to[..UUID_PACK_LENGTH].copy_from_slice(uuid.as_bytes());
                Ok(StoreStatus::Ok)
            }
        }
    }

    /// Stores an integer.
    ///
    /// `unsigned_val` says how to read `nr`: as `u64` bits when true. A
    /// negative value stored into an unsigned column becomes 0; an unsigned
    /// value above `i64::MAX` stored into a signed column clamps to the
    /// column maximum. Both report `OutOfRange`.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for UUID columns.
    pub fn store_int(
        &self,
        to: &mut [u8],
        nr: i64,
        unsigned_val: bool,
    ) -> FieldResult<StoreStatus> {
        FieldError::check_len(self.pack_length(), to.len())?;
        let wide = if unsigned_val {
            i128::from(nr as u64)
        } else {
            i128::from(nr)
        };
        match self.field_type {
            FieldType::Double => {
                self.write_double(to, wide as f64);
                Ok(StoreStatus::Ok)
            }
            FieldType::Decimal { precision, scale } => {
                let (value, status) = Decimal::from_int(wide).fit(precision, scale);
                value.to_bin(precision, scale, to)?;
                Ok(status)
            }
            FieldType::VarString { .. } => self.store_str(to, wide.to_string().as_bytes()),
            FieldType::Uuid => Err(self.mismatch("integer")),
            _ => Ok(self.store_clamped(to, wide)),
        }
    }

    /// Stores a double.
    ///
    /// Integer columns round with `rint` (ties to even) and clamp.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for UUID columns.
    pub fn store_real(&self, to: &mut [u8], nr: f64) -> FieldResult<StoreStatus> {
        FieldError::check_len(self.pack_length(), to.len())?;
        match self.field_type {
            FieldType::Double => {
                if nr.is_nan() {
                    self.write_double(to, 0.0);
                    return Ok(StoreStatus::WrongValue);
                }
                if nr.is_infinite() {
                    self.write_double(to, if nr > 0.0 { f64::MAX } else { f64::MIN });
                    return Ok(StoreStatus::OutOfRange);
                }
                self.write_double(to, nr);
                Ok(StoreStatus::Ok)
            }
            FieldType::Decimal { precision, scale } => {
                let max = Decimal::max_for(precision, scale);
                let (value, status) = if nr.is_nan() {
                    (Decimal::new(0, scale), StoreStatus::WrongValue)
                } else if nr.is_infinite() {
                    let sign = if nr > 0.0 { 1 } else { -1 };
                    (Decimal::new(sign * max.unscaled(), scale), StoreStatus::OutOfRange)
                } else {
                    let text = format!("{nr}");
                    match scan_number(text.as_bytes(), false) {
                        Some(num) => Decimal::fit_text(&num, precision, scale),
                        None => (Decimal::new(0, scale), StoreStatus::WrongValue),
                    }
                };
                value.to_bin(precision, scale, to)?;
                Ok(status)
            }
            FieldType::VarString { .. } => self.store_str(to, format!("{nr}").as_bytes()),
            FieldType::Uuid => Err(self.mismatch("double")),
            _ => {
                if nr.is_nan() {
                    self.write_int(to, 0);
                    return Ok(StoreStatus::WrongValue);
                }
                // `as` saturates, and every clamped bound fits an i128.
                Ok(self.store_clamped(to, rint(nr) as i128))
            }
        }
    }

    /// Stores a decimal.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` for UUID columns.
    pub fn store_decimal(&self, to: &mut [u8], nr: &Decimal) -> FieldResult<StoreStatus> {
        FieldError::check_len(self.pack_length(), to.len())?;
        match self.field_type {
            FieldType::Double => {
                self.write_double(to, nr.to_f64());
                Ok(StoreStatus::Ok)
            }
            FieldType::Decimal { precision, scale } => {
                let (value, status) = nr.fit(precision, scale);
                value.to_bin(precision, scale, to)?;
                Ok(status)
            }
            FieldType::VarString { .. } => self.store_str(to, nr.to_string().as_bytes()),
            FieldType::Uuid => Err(self.mismatch("decimal")),
            _ => {
                let lossy = nr.rescale(0).map_or(true, |(_, lossy)| lossy);
                let status = self.store_clamped(to, nr.round_to_int());
                Ok(if lossy {
                    status.max(StoreStatus::Rounded)
                } else {
                    status
                })
            }
        }
    }

    /// Stores a canonical value.
    ///
    /// # Errors
    ///
    /// Returns `NullNotAllowed` for NULL (null bits belong to the record),
    /// `TypeMismatch` for values the column cannot hold, and the errors of
    /// the typed store methods.
    pub fn store_value(&self, to: &mut [u8], value: &Value) -> FieldResult<StoreStatus> {
        match value {
            Value::Null => Err(FieldError::NullNotAllowed {
                field: self.name.clone(),
            }),
            Value::Int(v) => self.store_int(to, *v, false),
            Value::UInt(v) => self.store_int(to, *v as i64, true),
            Value::Double(v) => self.store_real(to, *v),
            Value::Decimal(d) => self.store_decimal(to, d),
            Value::Bytes(b) => self.store_str(to, b),
            Value::Uuid(u) => match self.field_type {
                FieldType::Uuid => {
                    FieldError::check_len(UUID_PACK_LENGTH, to.len())?;
                    to[..UUID_PACK_LENGTH].copy_from_slice(u.as_bytes());
                    Ok(StoreStatus::Ok)
                }
                FieldType::VarString { .. } => {
                    self.store_str(to, u.hyphenated().to_string().as_bytes())
                }
                _ => Err(self.mismatch("uuid")),
            },
        }
    }

    fn store_string(
        &self,
        to: &mut [u8],
        from: &[u8],
        max: usize,
        charset: Charset,
    ) -> StoreStatus {
        let mut keep = from.len().min(max);
        if charset == Charset::Utf8 {
            while keep > 0 && from.get(keep).is_some_and(|&b| b & 0xC0 == 0x80) {
                keep -= 1;
            }
        }
        let status = if keep == from.len() {
            StoreStatus::Ok
        } else if from[keep..].iter().all(|&b| b == b' ') {
            StoreStatus::TrailingSpaces
        } else {
            StoreStatus::Truncated
        };

        let lb = self.field_type.length_bytes();
        write_length(to, lb, keep);
        to[lb..lb + keep].copy_from_slice(&from[..keep]);
        to[lb + keep..lb + max].fill(0);
        status
    }

    fn store_clamped(&self, to: &mut [u8], v: i128) -> StoreStatus {
        let Some((min, max)) = self.field_type.integer_range() else {
            return StoreStatus::WrongValue;
        };
        let clamped = v.clamp(min, max);
        self.write_int(to, clamped);
        if clamped == v {
            StoreStatus::Ok
        } else {
            StoreStatus::OutOfRange
        }
    }

    fn mismatch(&self, value_kind: &'static str) -> FieldError {
        FieldError::TypeMismatch {
            field: self.name.clone(),
            value_kind,
        }
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Reads the value as a signed integer.
    ///
    /// Doubles round with `rint`, decimals half away from zero; results
    /// outside `i64` saturate.
    #[must_use]
    pub fn val_int(&self, from: &[u8]) -> i64 {
        let wide = match self.field_type {
            FieldType::Double => rint(self.read_double(from)) as i128,
            FieldType::Decimal { precision, scale } => Decimal::from_bin(from, precision, scale)
                .map_or(0, |d| d.round_to_int()),
            FieldType::VarString { .. } => scan_number(self.string_data(from), false)
                .and_then(|n| n.to_i128_rounded())
                .map_or(0, |(v, _)| v),
            FieldType::Uuid => 0,
            _ => self.read_int(from),
        };
        saturate_i64(wide)
    }

    /// Reads the value as a double.
    #[must_use]
    pub fn val_real(&self, from: &[u8]) -> f64 {
        match self.field_type {
            FieldType::Double => self.read_double(from),
            FieldType::Decimal { precision, scale } => {
                Decimal::from_bin(from, precision, scale).map_or(0.0, |d| d.to_f64())
            }
            FieldType::VarString { .. } => scan_number(self.string_data(from), true)
                .and_then(|n| std::str::from_utf8(n.span).ok()?.parse().ok())
                .unwrap_or(0.0),
            FieldType::Uuid => 0.0,
            _ => self.read_int(from) as f64,
        }
    }

    /// Reads the value as a decimal.
    #[must_use]
    pub fn val_decimal(&self, from: &[u8]) -> Decimal {
        match self.field_type {
            FieldType::Double => {
                decimal_from_text(format!("{}", self.read_double(from)).as_bytes())
            }
            FieldType::Decimal { precision, scale } => {
                Decimal::from_bin(from, precision, scale).unwrap_or_default()
            }
            FieldType::VarString { .. } => decimal_from_text(self.string_data(from)),
            FieldType::Uuid => Decimal::ZERO,
            _ => Decimal::from_int(self.read_int(from)),
        }
    }

    /// Reads the value as text.
    #[must_use]
    pub fn val_str(&self, from: &[u8]) -> String {
        match self.field_type {
            FieldType::Double => format!("{}", self.read_double(from)),
            FieldType::Decimal { .. } => self.val_decimal(from).to_string(),
            FieldType::VarString { .. } => {
                String::from_utf8_lossy(self.string_data(from)).into_owned()
            }
            FieldType::Uuid => self.read_uuid(from).hyphenated().to_string(),
            _ => self.read_int(from).to_string(),
        }
    }

    /// Reads the value in its natural canonical form.
    #[must_use]
    pub fn value(&self, from: &[u8]) -> Value {
        match self.field_type {
            FieldType::Double => Value::Double(self.read_double(from)),
            FieldType::Decimal { .. } => Value::Decimal(self.val_decimal(from)),
            FieldType::VarString { .. } => {
                Value::Bytes(bytes::Bytes::copy_from_slice(self.string_data(from)))
            }
            FieldType::Uuid => Value::Uuid(self.read_uuid(from)),
            FieldType::Tiny { unsigned: true }
            | FieldType::Short { unsigned: true }
            | FieldType::Long { unsigned: true }
            | FieldType::LongLong { unsigned: true } => {
                Value::UInt(u64::try_from(self.read_int(from)).unwrap_or(u64::MAX))
            }
            _ => Value::Int(saturate_i64(self.read_int(from))),
        }
    }

    /// Returns the data bytes of a string column (without the length
    /// prefix). Empty for other types.
    #[must_use]
    pub fn string_data<'a>(&self, from: &'a [u8]) -> &'a [u8] {
        let FieldType::VarString { max_length, .. } = self.field_type else {
            return &[];
        };
        let lb = self.field_type.length_bytes();
        let len = read_length(from, lb).min(usize::from(max_length));
        &from[lb..lb + len]
    }

    // =========================================================================
    // Compare and sort
    // =========================================================================

    /// Compares two slots of this column by value.
    ///
    /// Integers compare numerically with their signedness, doubles by total
    /// order, decimals by their sortable binary form, strings and UUIDs by
    /// bytes.
    #[must_use]
    pub fn cmp(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.field_type {
            FieldType::Double => self.read_double(a).total_cmp(&self.read_double(b)),
            FieldType::Decimal { .. } | FieldType::Uuid => {
                let n = self.pack_length();
                a[..n].cmp(&b[..n])
            }
            FieldType::VarString { .. } => self.string_data(a).cmp(self.string_data(b)),
            _ => self.read_int(a).cmp(&self.read_int(b)),
        }
    }

    /// Returns the length of the full sort key.
    #[must_use]
    pub fn sort_length(&self) -> usize {
        match self.field_type {
            FieldType::VarString { max_length, .. } => usize::from(max_length) + 2,
            _ => self.pack_length(),
        }
    }

    /// Writes a key whose unsigned byte order matches the value order.
    ///
    /// Writes `min(to.len(), sort_length())` key bytes and zero-fills the
    /// rest of `to`. Signed integers are written big-endian with the sign
    /// bit flipped; strings are zero padded to their maximum length and
    /// followed by their length so that a prefix sorts first.
    pub fn sort_string(&self, from: &[u8], to: &mut [u8]) {
        let key = self.sort_key(from);
        let n = key.len().min(to.len());
        to[..n].copy_from_slice(&key[..n]);
        to[n..].fill(0);
    }

    /// Returns the full sort key.
    #[must_use]
    pub fn sort_key(&self, from: &[u8]) -> Vec<u8> {
        match self.field_type {
            FieldType::Double => {
                let bits = self.read_double(from).to_bits();
                let flipped = if bits >> 63 == 1 { !bits } else { bits ^ (1 << 63) };
                flipped.to_be_bytes().to_vec()
            }
            FieldType::Decimal { .. } | FieldType::Uuid => from[..self.pack_length()].to_vec(),
            FieldType::VarString { max_length, .. } => {
                let data = self.string_data(from);
                let mut key = vec![0u8; usize::from(max_length) + 2];
                key[..data.len()].copy_from_slice(data);
                let len = u16::try_from(data.len()).unwrap_or(u16::MAX);
                key[usize::from(max_length)..].copy_from_slice(&len.to_be_bytes());
                key
            }
            _ => {
                let (width, unsigned) = self.field_type.integer_info().unwrap_or((8, false));
                let mut bits = self.read_int(from) as u64;
                if !unsigned {
                    bits ^= 1 << (8 * width - 1);
                }
                bits.to_be_bytes()[8 - width..].to_vec()
            }
        }
    }

    // =========================================================================
    // Pack and unpack
    // =========================================================================

    /// Appends the packed form of the slot `from` to `to`.
    ///
    /// Strings are packed as a little-endian length (one byte if the
    /// effective maximum length is at most 255, else two) followed by at
    /// most `max_length` data bytes. Returns the number of bytes written.
    pub fn pack(
        &self,
        to: &mut BytesMut,
        from: &[u8],
        max_length: usize,
        low_byte_first: bool,
    ) -> usize {
        match self.field_type {
            FieldType::VarString {
                max_length: field_max,
                ..
            } => {
                let max = max_length.min(usize::from(field_max));
                let data = self.string_data(from);
                let len = data.len().min(max);
                let prefix = if max > VARSTRING_ONE_BYTE_MAX { 2 } else { 1 };
                if prefix == 1 {
                    to.put_u8(len as u8);
                } else {
                    to.put_u16_le(len as u16);
                }
                to.put_slice(&data[..len]);
                prefix + len
            }
            ref t if t.is_byte_order_sensitive() && low_byte_first != self.db_low_byte_first => {
                let n = self.pack_length();
                to.extend(from[..n].iter().rev());
                n
            }
            _ => {
                let n = self.pack_length();
                to.put_slice(&from[..n]);
                n
            }
        }
    }

    /// Decodes a packed value from `from` into the slot `to`.
    ///
    /// `param_data` is the source column metadata. For strings it selects
    /// the width of the length prefix; for decimals a source with a
    /// different precision or scale is converted into this column. Returns
    /// the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooShort` on truncated input and `IncompatibleField`
    /// when a string is longer than this column allows or the source
    /// decimal dimensions are impossible.
    pub fn unpack(
        &self,
        to: &mut [u8],
        from: &[u8],
        param_data: u16,
        low_byte_first: bool,
    ) -> FieldResult<usize> {
        FieldError::check_len(self.pack_length(), to.len())?;
        match self.field_type {
            FieldType::VarString { max_length, .. } => {
                let l_bytes = match param_data {
                    0 => self.field_type.length_bytes(),
                    n if usize::from(n) <= VARSTRING_ONE_BYTE_MAX => 1,
                    _ => 2,
                };
                FieldError::check_len(l_bytes, from.len())?;
                let len = read_length(from, l_bytes);
                FieldError::check_len(l_bytes + len, from.len())?;
                if len > usize::from(max_length) {
                    return Err(FieldError::IncompatibleField {
                        field: self.name.clone(),
                        reason: format!("value of {len} bytes exceeds maximum {max_length}"),
                    });
                }
                let lb = self.field_type.length_bytes();
                write_length(to, lb, len);
                to[lb..lb + len].copy_from_slice(&from[l_bytes..l_bytes + len]);
                to[lb + len..].fill(0);
                Ok(l_bytes + len)
            }
            FieldType::Decimal { precision, scale }
                if param_data != 0 && param_data != self.field_metadata() =>
            {
                let (from_precision, from_scale) = self.source_decimal(param_data)?;
                let source = Decimal::from_bin(from, from_precision, from_scale)?;
                let (value, _) = source.fit(precision, scale);
                value.to_bin(precision, scale, to)?;
                Ok(Decimal::bin_size(from_precision, from_scale))
            }
            ref t => {
                let n = self.pack_length();
                FieldError::check_len(n, from.len())?;
                if t.is_byte_order_sensitive() && low_byte_first != self.db_low_byte_first {
                    for (dst, src) in to[..n].iter_mut().zip(from[..n].iter().rev()) {
                        *dst = *src;
                    }
                } else {
                    to[..n].copy_from_slice(&from[..n]);
                }
                Ok(n)
            }
        }
    }

    /// Returns the packed size of a source column of this type with the
    /// given metadata (the maximum size for strings).
    #[must_use]
    pub fn pack_length_from_metadata(&self, metadata: u16) -> usize {
        if metadata == 0 {
            return self.pack_length();
        }
        match self.field_type {
            FieldType::Decimal { .. } => {
                let [precision, scale] = metadata.to_be_bytes();
                Decimal::bin_size(precision, scale)
            }
            FieldType::VarString { .. } => {
                let lb = if usize::from(metadata) > VARSTRING_ONE_BYTE_MAX { 2 } else { 1 };
                usize::from(metadata) + lb
            }
            _ => self.pack_length(),
        }
    }

    /// Returns true if values of a source column with the given metadata
    /// always fit this column.
    #[must_use]
    pub fn compatible_field_size(&self, metadata: u16) -> bool {
        if metadata == 0 {
            return true;
        }
        match self.field_type {
            FieldType::Decimal { precision, scale } => {
                let [from_precision, from_scale] = metadata.to_be_bytes();
                Decimal::check_dimensions(from_precision, from_scale).is_ok()
                    && from_scale <= scale
                    && from_precision.saturating_sub(from_scale) <= precision - scale
            }
            FieldType::VarString { max_length, .. } => metadata <= max_length,
            _ => self.pack_length_from_metadata(metadata) <= self.pack_length(),
        }
    }

    fn source_decimal(&self, metadata: u16) -> FieldResult<(u8, u8)> {
        let [precision, scale] = metadata.to_be_bytes();
        Decimal::check_dimensions(precision, scale).map_err(|err| {
            FieldError::IncompatibleField {
                field: self.name.clone(),
                reason: format!("source metadata {metadata:#06x}: {err}"),
            }
        })?;
        Ok((precision, scale))
    }

    // =========================================================================
    // Raw slot access
    // =========================================================================

    fn write_int(&self, to: &mut [u8], v: i128) {
        let width = self.field_type.integer_info().map_or(8, |(w, _)| w);
        let bits = v as u64;
        if self.db_low_byte_first {
            to[..width].copy_from_slice(&bits.to_le_bytes()[..width]);
        } else {
            to[..width].copy_from_slice(&bits.to_be_bytes()[8 - width..]);
        }
    }

    fn read_int(&self, from: &[u8]) -> i128 {
        let (width, unsigned) = self.field_type.integer_info().unwrap_or((8, false));
        let mut raw = [0u8; 8];
        let bits = if self.db_low_byte_first {
            raw[..width].copy_from_slice(&from[..width]);
            u64::from_le_bytes(raw)
        } else {
            raw[8 - width..].copy_from_slice(&from[..width]);
            u64::from_be_bytes(raw)
        };
        if unsigned {
            i128::from(bits)
        } else {
            let shift = 64 - 8 * width as u32;
            i128::from(((bits << shift) as i64) >> shift)
        }
    }

    fn write_double(&self, to: &mut [u8], v: f64) {
        let bytes = if self.db_low_byte_first {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        };
        to[..8].copy_from_slice(&bytes);
    }

    fn read_double(&self, from: &[u8]) -> f64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&from[..8]);
        if self.db_low_byte_first {
            f64::from_le_bytes(raw)
        } else {
            f64::from_be_bytes(raw)
        }
    }

    fn read_uuid(&self, from: &[u8]) -> Uuid {
        let mut raw = [0u8; UUID_PACK_LENGTH];
        raw.copy_from_slice(&from[..UUID_PACK_LENGTH]);
        Uuid::from_bytes(raw)
    }
}

fn write_length(to: &mut [u8], length_bytes: usize, len: usize) {
    if length_bytes == 1 {
        to[0] = len as u8;
    } else {
        to[..2].copy_from_slice(&(len as u16).to_le_bytes());
    }
}

fn read_length(from: &[u8], length_bytes: usize) -> usize {
    if length_bytes == 1 {
        usize::from(from[0])
    } else {
        usize::from(u16::from_le_bytes([from[0], from[1]]))
    }
}

fn saturate_i64(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(if v < 0 { i64::MIN } else { i64::MAX })
}

/// Converts numeric text to the closest decimal that keeps every integer
/// digit and as many fractional digits as still fit.
fn decimal_from_text(text: &[u8]) -> Decimal {
    const MAX_PRECISION: usize = tessera_common::constants::DECIMAL_MAX_PRECISION as usize;
    const MAX_SCALE: usize = tessera_common::constants::DECIMAL_MAX_SCALE as usize;
    let Some(num) = scan_number(text, false) else {
        return Decimal::ZERO;
    };
    let intg = num.int_digits.len().min(MAX_PRECISION);
    let scale = (MAX_PRECISION - intg).min(MAX_SCALE).min(num.frac_digits.len());
    Decimal::fit_text(&num, MAX_PRECISION as u8, scale as u8).0
}
