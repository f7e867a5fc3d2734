//! XA transaction identifiers.
//!
//! An XID addresses a distributed transaction independently of the session
//! that created it, which is what makes crash recovery possible: after a
//! restart the original session is gone but the XID is still on disk in
//! every engine that prepared it.
//!
//! # Layout
//!
//! ```text
//! ┌───────────┬──────────────┬──────────────┬───────────────────────────┐
//! │ format_id │ gtrid_length │ bqual_length │ data[0..gtrid+bqual]      │
//! └───────────┴──────────────┴──────────────┴───────────────────────────┘
//! ```
//!
//! Locally generated XIDs use format id 1 and a 20 byte global id made of
//! a fixed prefix, the server id and the local transaction id. The hash
//! key used by the XID cache is `gtrid_length || bqual_length || data`
//! with both lengths stored as 8-byte little-endian integers, so keys stay
//! stable across restarts.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::constants::{
    LOCAL_XID_FORMAT_ID, LOCAL_XID_GTRID_LEN, LOCAL_XID_PREFIX, MAX_BQUAL_SIZE, MAX_GTRID_SIZE,
    NULL_XID_FORMAT_ID, XID_DATA_SIZE, XID_KEY_LENGTH_FIELD_SIZE,
};
use crate::error::{TesseraError, TesseraResult};
use crate::types::{QueryId, ServerId};

/// A global transaction identifier.
#[derive(Clone)]
pub struct Xid {
    format_id: i64,
    gtrid_length: usize,
    bqual_length: usize,
    data: [u8; XID_DATA_SIZE],
}

impl Xid {
    /// Returns the null XID (format id -1).
    #[must_use]
    pub const fn null() -> Self {
        Self {
            format_id: NULL_XID_FORMAT_ID,
            gtrid_length: 0,
            bqual_length: 0,
            data: [0; XID_DATA_SIZE],
        }
    }

    /// Creates an XID from an externally supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidXid` if the format id is the null marker, the global
    /// id is empty or either part exceeds its maximum size.
    pub fn new(format_id: i64, gtrid: &[u8], bqual: &[u8]) -> TesseraResult<Self> {
        if format_id == NULL_XID_FORMAT_ID {
            return Err(TesseraError::invalid_xid("format id -1 is reserved for null"));
        }
        if gtrid.is_empty() || gtrid.len() > MAX_GTRID_SIZE {
            return Err(TesseraError::invalid_xid(format!(
                "gtrid length {} outside 1..={}",
                gtrid.len(),
                MAX_GTRID_SIZE
            )));
        }
        if bqual.len() > MAX_BQUAL_SIZE {
            return Err(TesseraError::invalid_xid(format!(
                "bqual length {} exceeds {}",
                bqual.len(),
                MAX_BQUAL_SIZE
            )));
        }

        let mut xid = Self::null();
        xid.format_id = format_id;
        xid.gtrid_length = gtrid.len();
        xid.bqual_length = bqual.len();
        xid.data[..gtrid.len()].copy_from_slice(gtrid);
        xid.data[gtrid.len()..gtrid.len() + bqual.len()].copy_from_slice(bqual);
        Ok(xid)
    }

    /// Creates the deterministic XID of a local transaction.
    #[must_use]
    pub fn from_local(server_id: ServerId, trx_id: QueryId) -> Self {
        let mut xid = Self::null();
        xid.set_local(server_id, trx_id);
        xid
    }

    /// Overwrites this XID with the XID of a local transaction.
    pub fn set_local(&mut self, server_id: ServerId, trx_id: QueryId) {
        let prefix_len = LOCAL_XID_PREFIX.len();
        self.format_id = LOCAL_XID_FORMAT_ID;
        self.gtrid_length = LOCAL_XID_GTRID_LEN;
        self.bqual_length = 0;
        self.data = [0; XID_DATA_SIZE];
        self.data[..prefix_len].copy_from_slice(LOCAL_XID_PREFIX);
        self.data[prefix_len..prefix_len + 4].copy_from_slice(&server_id.as_u32().to_le_bytes());
        self.data[prefix_len + 4..LOCAL_XID_GTRID_LEN]
            .copy_from_slice(&trx_id.as_u64().to_le_bytes());
    }

    /// Resets this XID to null.
    pub fn set_null(&mut self) {
        *self = Self::null();
    }

    /// Returns true if this is the null XID.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.format_id == NULL_XID_FORMAT_ID
    }

    /// Returns the format id.
    #[inline]
    #[must_use]
    pub const fn format_id(&self) -> i64 {
        self.format_id
    }

    /// Returns the global transaction id bytes.
    #[must_use]
    pub fn gtrid(&self) -> &[u8] {
        &self.data[..self.gtrid_length]
    }

    /// Returns the branch qualifier bytes.
    #[must_use]
    pub fn bqual(&self) -> &[u8] {
        &self.data[self.gtrid_length..self.gtrid_length + self.bqual_length]
    }

    /// Returns the significant part of the data area.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.gtrid_length + self.bqual_length]
    }

    /// Returns the local transaction id if this XID was generated locally.
    ///
    /// Foreign XIDs (supplied by an external transaction manager) return
    /// `None`; recovery must leave those for their coordinator.
    #[must_use]
    pub fn local_trx_id(&self) -> Option<QueryId> {
        if !self.is_local() {
            return None;
        }
        let start = LOCAL_XID_PREFIX.len() + 4;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.data[start..start + 8]);
        Some(QueryId::new(u64::from_le_bytes(raw)))
    }

    /// Returns the server id of a locally generated XID.
    #[must_use]
    pub fn local_server_id(&self) -> Option<ServerId> {
        if !self.is_local() {
            return None;
        }
        let start = LOCAL_XID_PREFIX.len();
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[start..start + 4]);
        Some(ServerId::new(u32::from_le_bytes(raw)))
    }

    fn is_local(&self) -> bool {
        self.format_id == LOCAL_XID_FORMAT_ID
            && self.gtrid_length == LOCAL_XID_GTRID_LEN
            && self.bqual_length == 0
            && self.data.starts_with(LOCAL_XID_PREFIX)
    }

    /// Returns the hash key: `gtrid_length || bqual_length || data`.
    #[must_use]
    pub fn key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.key_length());
        key.extend_from_slice(&(self.gtrid_length as u64).to_le_bytes());
        key.extend_from_slice(&(self.bqual_length as u64).to_le_bytes());
        key.extend_from_slice(self.data());
        key
    }

    /// Returns the length of [`Xid::key`].
    #[inline]
    #[must_use]
    pub const fn key_length(&self) -> usize {
        2 * XID_KEY_LENGTH_FIELD_SIZE + self.gtrid_length + self.bqual_length
    }
}

impl Default for Xid {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for Xid {
    fn eq(&self, other: &Self) -> bool {
        self.format_id == other.format_id
            && self.gtrid_length == other.gtrid_length
            && self.bqual_length == other.bqual_length
            && self.data() == other.data()
    }
}

impl Eq for Xid {}

impl Hash for Xid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.format_id.hash(state);
        self.gtrid_length.hash(state);
        self.bqual_length.hash(state);
        self.data().hash(state);
    }
}

impl fmt::Debug for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "Xid(NULL)");
        }
        write!(f, "Xid({self})")
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},", self.format_id)?;
        for b in self.gtrid() {
            write!(f, "{b:02x}")?;
        }
        f.write_str(",")?;
        for b in self.bqual() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// XA state of a transaction branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum XaState {
    /// No XA transaction.
    #[default]
    NotInTransaction,
    /// `XA START` was issued; work is in progress.
    Active,
    /// `XA END` was issued; the branch is waiting to be prepared.
    Idle,
    /// The branch is prepared and waits for commit or rollback.
    Prepared,
}

impl XaState {
    /// Returns the name used by `XA RECOVER` style reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            XaState::NotInTransaction => "NON-EXISTING",
            XaState::Active => "ACTIVE",
            XaState::Idle => "IDLE",
            XaState::Prepared => "PREPARED",
        }
    }
}

impl fmt::Display for XaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An XID together with its XA state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XidState {
    /// The transaction identifier.
    pub xid: Xid,
    /// The XA state of the branch.
    pub xa_state: XaState,
    /// True while a live session owns the branch; false for branches
    /// recovered after a restart or detached by a disconnect.
    pub in_session: bool,
}

impl XidState {
    /// Creates a state owned by a live session.
    #[must_use]
    pub fn new(xid: Xid, xa_state: XaState) -> Self {
        Self {
            xid,
            xa_state,
            in_session: true,
        }
    }

    /// Creates a detached state, as produced by recovery.
    #[must_use]
    pub fn detached(xid: Xid, xa_state: XaState) -> Self {
        Self {
            xid,
            xa_state,
            in_session: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_null_xid() {
        let xid = Xid::null();
        assert!(xid.is_null());
        assert_eq!(xid.format_id(), -1);
        assert!(xid.data().is_empty());
        assert_eq!(format!("{xid:?}"), "Xid(NULL)");
    }

    #[test]
    fn test_local_xid_round_trip() {
        let xid = Xid::from_local(ServerId::new(3), QueryId::new(0xDEAD_BEEF));
        assert!(!xid.is_null());
        assert_eq!(xid.gtrid().len(), LOCAL_XID_GTRID_LEN);
        assert!(xid.bqual().is_empty());
        assert_eq!(xid.local_trx_id(), Some(QueryId::new(0xDEAD_BEEF)));
        assert_eq!(xid.local_server_id(), Some(ServerId::new(3)));
    }

    #[test]
    fn test_foreign_xid_has_no_local_id() {
        let xid = Xid::new(77, b"global-1", b"branch-a").unwrap();
        assert_eq!(xid.local_trx_id(), None);
        assert_eq!(xid.gtrid(), b"global-1");
        assert_eq!(xid.bqual(), b"branch-a");
    }

    #[test]
    fn test_invalid_xids() {
        assert!(Xid::new(-1, b"g", b"").is_err());
        assert!(Xid::new(1, b"", b"").is_err());
        assert!(Xid::new(1, &[0u8; 65], b"").is_err());
        assert!(Xid::new(1, b"g", &[0u8; 65]).is_err());
        assert!(Xid::new(1, &[1u8; 64], &[2u8; 64]).is_ok());
    }

    #[test]
    fn test_key_layout() {
        let xid = Xid::new(5, b"abc", b"de").unwrap();
        let key = xid.key();
        assert_eq!(key.len(), xid.key_length());
        assert_eq!(key.len(), 8 + 8 + 5);
        assert_eq!(&key[..8], &3u64.to_le_bytes());
        assert_eq!(&key[8..16], &2u64.to_le_bytes());
        assert_eq!(&key[16..], b"abcde");
    }

    #[test]
    fn test_equality_ignores_unused_bytes() {
        let a = Xid::new(9, b"same", b"").unwrap();
        let mut b = a.clone();
        b.data[XID_DATA_SIZE - 1] = 0xFF;
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&b));
        assert_ne!(a, Xid::new(9, b"sam", b"e").unwrap());
    }

    #[test]
    fn test_set_null_resets() {
        let mut xid = Xid::from_local(ServerId::new(1), QueryId::new(10));
        xid.set_null();
        assert!(xid.is_null());
        assert_eq!(xid, Xid::null());
    }

    #[test]
    fn test_xa_state_names() {
        assert_eq!(XaState::Prepared.to_string(), "PREPARED");
        assert_eq!(XaState::default(), XaState::NotInTransaction);
        assert!(!XidState::detached(Xid::null(), XaState::Prepared).in_session);
    }
}
