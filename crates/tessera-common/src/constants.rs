//! System-wide constants for tessera.
//!
//! The XID constants mirror the X/Open XA layout so identifiers handed to
//! and received from external transaction managers keep their meaning.

// =============================================================================
// XID Layout
// =============================================================================

/// Capacity of the XID data area (global id plus branch qualifier).
pub const XID_DATA_SIZE: usize = 128;

/// Maximum length of the global transaction id part of an XID.
pub const MAX_GTRID_SIZE: usize = 64;

/// Maximum length of the branch qualifier part of an XID.
pub const MAX_BQUAL_SIZE: usize = 64;

/// Format id marking an XID as null/unset.
pub const NULL_XID_FORMAT_ID: i64 = -1;

/// Format id used for XIDs generated from local transaction ids.
pub const LOCAL_XID_FORMAT_ID: i64 = 1;

/// Fixed prefix of locally generated XIDs.
pub const LOCAL_XID_PREFIX: &[u8; 8] = b"TessXid\0";

/// Global id length of a locally generated XID:
/// prefix (8) + server id (4) + transaction id (8).
pub const LOCAL_XID_GTRID_LEN: usize = LOCAL_XID_PREFIX.len() + 4 + 8;

/// Width in bytes of each length field in the XID hash key.
pub const XID_KEY_LENGTH_FIELD_SIZE: usize = 8;

// =============================================================================
// XA Recovery
// =============================================================================

/// Smallest XID batch requested from an engine during recovery.
pub const MIN_XID_LIST_SIZE: usize = 128;

/// Largest XID batch requested from an engine during recovery.
pub const MAX_XID_LIST_SIZE: usize = 128 * 1024;

// =============================================================================
// Engine Slots
// =============================================================================

/// Default upper bound on the number of registered storage engines.
///
/// Each session pre-allocates two resource contexts per slot.
pub const DEFAULT_MAX_ENGINES: usize = 64;

// =============================================================================
// Field Codec Limits
// =============================================================================

/// Maximum declared byte length of a variable-length string column.
pub const VARSTRING_MAX_LENGTH: usize = u16::MAX as usize;

/// Declared lengths above this need a two-byte length prefix.
pub const VARSTRING_ONE_BYTE_MAX: usize = 255;

/// Maximum decimal precision (the unscaled value must fit an `i128`).
pub const DECIMAL_MAX_PRECISION: u8 = 38;

/// Maximum decimal scale.
pub const DECIMAL_MAX_SCALE: u8 = 30;

/// Decimal digits stored per four-byte group in the binary decimal format.
pub const DECIMAL_DIGITS_PER_WORD: usize = 9;

/// Packed length of a UUID column.
pub const UUID_PACK_LENGTH: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xid_layout_fits() {
        assert_eq!(LOCAL_XID_GTRID_LEN, 20);
        assert!(LOCAL_XID_GTRID_LEN <= MAX_GTRID_SIZE);
        assert_eq!(MAX_GTRID_SIZE + MAX_BQUAL_SIZE, XID_DATA_SIZE);
    }

    #[test]
    fn test_recovery_batch_bounds() {
        assert!(MIN_XID_LIST_SIZE < MAX_XID_LIST_SIZE);
    }
}
