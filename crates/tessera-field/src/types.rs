//! Column type definitions.

use std::fmt;

use tessera_common::constants::{
    DECIMAL_MAX_PRECISION, DECIMAL_MAX_SCALE, UUID_PACK_LENGTH, VARSTRING_ONE_BYTE_MAX,
};

use crate::decimal::Decimal;
use crate::error::{FieldError, FieldResult};

/// Type byte written into replication table maps.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealType {
    /// 1-byte integer.
    Tiny = 1,
    /// 2-byte integer.
    Short = 2,
    /// 4-byte integer.
    Long = 3,
    /// IEEE double.
    Double = 5,
    /// 8-byte integer.
    LongLong = 8,
    /// Variable-length string.
    VarString = 15,
    /// 16-byte UUID.
    Uuid = 30,
    /// Binary decimal.
    Decimal = 246,
}

impl RealType {
    /// Decodes a type byte.
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Tiny),
            2 => Some(Self::Short),
            3 => Some(Self::Long),
            5 => Some(Self::Double),
            8 => Some(Self::LongLong),
            15 => Some(Self::VarString),
            30 => Some(Self::Uuid),
            246 => Some(Self::Decimal),
            _ => None,
        }
    }

    /// Returns the byte value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the packed size of a column of this type given its
    /// metadata, or `None` for variable-length types.
    #[must_use]
    pub fn fixed_pack_length(self, metadata: u16) -> Option<usize> {
        match self {
            Self::Tiny => Some(1),
            Self::Short => Some(2),
            Self::Long => Some(4),
            Self::Double | Self::LongLong => Some(8),
            Self::Uuid => Some(UUID_PACK_LENGTH),
            Self::Decimal => {
                let [precision, scale] = metadata.to_be_bytes();
                Some(Decimal::bin_size(precision, scale))
            }
            Self::VarString => None,
        }
    }
}

/// Character set of a string column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    /// Raw bytes.
    Binary,
    /// UTF-8; truncation never splits a character.
    #[default]
    Utf8,
}

/// Column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 1-byte integer.
    Tiny {
        /// Unsigned flag.
        unsigned: bool,
    },
    /// 2-byte integer.
    Short {
        /// Unsigned flag.
        unsigned: bool,
    },
    /// 4-byte integer.
    Long {
        /// Unsigned flag.
        unsigned: bool,
    },
    /// 8-byte integer.
    LongLong {
        /// Unsigned flag.
        unsigned: bool,
    },
    /// IEEE 754 double.
    Double,
    /// Fixed-point decimal.
    Decimal {
        /// Total significant digits.
        precision: u8,
        /// Fractional digits.
        scale: u8,
    },
    /// Variable-length string with a declared maximum byte length.
    VarString {
        /// Maximum length in bytes.
        max_length: u16,
        /// Character set.
        charset: Charset,
    },
    /// UUID stored as 16 raw bytes.
    Uuid,
}

impl FieldType {
    /// Checks precision, scale and length limits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` naming the violated limit.
    pub fn validate(&self) -> FieldResult<()> {
        if let Self::Decimal { precision, scale } = *self {
            if precision == 0 || precision > DECIMAL_MAX_PRECISION {
                return Err(FieldError::invalid_definition(format!(
                    "decimal precision {precision} outside 1..={DECIMAL_MAX_PRECISION}"
                )));
            }
            if scale > DECIMAL_MAX_SCALE || scale > precision {
                return Err(FieldError::invalid_definition(format!(
                    "decimal scale {scale} exceeds precision {precision} or {DECIMAL_MAX_SCALE}"
                )));
            }
        }
        Ok(())
    }

    /// Returns the replication type byte.
    #[must_use]
    pub const fn real_type(&self) -> RealType {
        match self {
            Self::Tiny { .. } => RealType::Tiny,
            Self::Short { .. } => RealType::Short,
            Self::Long { .. } => RealType::Long,
            Self::LongLong { .. } => RealType::LongLong,
            Self::Double => RealType::Double,
            Self::Decimal { .. } => RealType::Decimal,
            Self::VarString { .. } => RealType::VarString,
            Self::Uuid => RealType::Uuid,
        }
    }

    /// Returns the number of bytes the column occupies in a record.
    #[must_use]
    pub fn pack_length(&self) -> usize {
        match *self {
            Self::Tiny { .. } => 1,
            Self::Short { .. } => 2,
            Self::Long { .. } => 4,
            Self::LongLong { .. } | Self::Double => 8,
            Self::Decimal { precision, scale } => Decimal::bin_size(precision, scale),
            Self::VarString { max_length, .. } => {
                self.length_bytes() + usize::from(max_length)
            }
            Self::Uuid => UUID_PACK_LENGTH,
        }
    }

    /// Width of the length prefix of a string column: 1 if the declared
    /// length is at most 255 bytes, else 2. Zero for other types.
    #[must_use]
    pub fn length_bytes(&self) -> usize {
        match *self {
            Self::VarString { max_length, .. } => {
                if usize::from(max_length) <= VARSTRING_ONE_BYTE_MAX {
                    1
                } else {
                    2
                }
            }
            _ => 0,
        }
    }

    /// Returns the metadata written next to the type byte in a table map.
    ///
    /// Decimal: `precision << 8 | scale`; string: declared byte length;
    /// double: 8; integers and UUID: 0.
    #[must_use]
    pub fn field_metadata(&self) -> u16 {
        match *self {
            Self::Decimal { precision, scale } => u16::from_be_bytes([precision, scale]),
            Self::VarString { max_length, .. } => max_length,
            Self::Double => 8,
            _ => 0,
        }
    }

    /// Returns the integer width and signedness, for integer types.
    #[must_use]
    pub const fn integer_info(&self) -> Option<(usize, bool)> {
        match *self {
            Self::Tiny { unsigned } => Some((1, unsigned)),
            Self::Short { unsigned } => Some((2, unsigned)),
            Self::Long { unsigned } => Some((4, unsigned)),
            Self::LongLong { unsigned } => Some((8, unsigned)),
            _ => None,
        }
    }

    /// Returns the inclusive range of an integer type.
    #[must_use]
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let (width, unsigned) = self.integer_info()?;
        let bits = 8 * width as u32;
        Some(if unsigned {
            (0, (1i128 << bits) - 1)
        } else {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        })
    }

    /// Returns true for multi-byte numeric types whose bytes depend on the
    /// record byte order.
    #[must_use]
    pub const fn is_byte_order_sensitive(&self) -> bool {
        matches!(
            self,
            Self::Short { .. } | Self::Long { .. } | Self::LongLong { .. } | Self::Double
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unsigned = |u: bool| if u { " UNSIGNED" } else { "" };
        match *self {
            Self::Tiny { unsigned: u } => write!(f, "TINYINT{}", unsigned(u)),
            Self::Short { unsigned: u } => write!(f, "SMALLINT{}", unsigned(u)),
            Self::Long { unsigned: u } => write!(f, "INT{}", unsigned(u)),
            Self::LongLong { unsigned: u } => write!(f, "BIGINT{}", unsigned(u)),
            Self::Double => write!(f, "DOUBLE"),
            Self::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            Self::VarString {
                max_length,
                charset: Charset::Binary,
            } => write!(f, "VARBINARY({max_length})"),
            Self::VarString { max_length, .. } => write!(f, "VARCHAR({max_length})"),
            Self::Uuid => write!(f, "UUID"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_lengths() {
        assert_eq!(FieldType::Tiny { unsigned: false }.pack_length(), 1);
        assert_eq!(FieldType::LongLong { unsigned: true }.pack_length(), 8);
        assert_eq!(
            FieldType::Decimal {
                precision: 14,
                scale: 4
            }
            .pack_length(),
            7
        );
        assert_eq!(FieldType::Uuid.pack_length(), 16);
    }

    #[test]
    fn test_varstring_length_prefix_width() {
        let short = FieldType::VarString {
            max_length: 255,
            charset: Charset::Utf8,
        };
        let long = FieldType::VarString {
            max_length: 256,
            charset: Charset::Utf8,
        };
        assert_eq!(short.length_bytes(), 1);
        assert_eq!(short.pack_length(), 256);
        assert_eq!(long.length_bytes(), 2);
        assert_eq!(long.pack_length(), 258);
    }

    #[test]
    fn test_metadata() {
        let dec = FieldType::Decimal {
            precision: 10,
            scale: 2,
        };
        assert_eq!(dec.field_metadata(), (10 << 8) | 2);
        assert_eq!(
            RealType::Decimal.fixed_pack_length(dec.field_metadata()),
            Some(dec.pack_length())
        );
        assert_eq!(FieldType::Double.field_metadata(), 8);
        assert_eq!(RealType::VarString.fixed_pack_length(300), None);
    }

    #[test]
    fn test_integer_range() {
        assert_eq!(
            FieldType::Tiny { unsigned: false }.integer_range(),
            Some((-128, 127))
        );
        assert_eq!(
            FieldType::LongLong { unsigned: true }.integer_range(),
            Some((0, i128::from(u64::MAX)))
        );
        assert_eq!(FieldType::Double.integer_range(), None);
    }

    #[test]
    fn test_validate() {
        assert!(FieldType::Decimal {
            precision: 39,
            scale: 0
        }
        .validate()
        .is_err());
        assert!(FieldType::Decimal {
            precision: 5,
            scale: 6
        }
        .validate()
        .is_err());
        assert!(FieldType::Decimal {
            precision: 38,
            scale: 30
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_real_type_round_trip() {
        for t in [
            RealType::Tiny,
            RealType::Short,
            RealType::Long,
            RealType::Double,
            RealType::LongLong,
            RealType::VarString,
            RealType::Uuid,
            RealType::Decimal,
        ] {
            assert_eq!(RealType::from_u8(t.as_u8()), Some(t));
        }
        assert_eq!(RealType::from_u8(99), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldType::Long { unsigned: true }.to_string(), "INT UNSIGNED");
        assert_eq!(
            FieldType::VarString {
                max_length: 20,
                charset: Charset::Binary
            }
            .to_string(),
            "VARBINARY(20)"
        );
    }
}
