//! Type definitions for tessera.
//!
//! This module contains the identifier types and the XA transaction
//! identifier shared across the workspace.

mod ids;
mod xid;

pub use ids::{EngineSlot, QueryId, ServerId, SessionId};
pub use xid::{XaState, Xid, XidState};
