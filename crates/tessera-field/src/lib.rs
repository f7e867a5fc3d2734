//! # tessera-field
//!
//! The row codec every storage engine plugs into.
//!
//! A table row lives in a fixed-layout record buffer: a null bitmap
//! followed by one fixed-width slot per column. This crate moves values
//! between those slots and
//!
//! - the canonical value domain used by the kernel ([`Value`]), with the
//!   clamp-and-warn store policy recorded in a [`Diagnostics`] area
//! - sortable keys for indexes ([`Field::sort_string`])
//! - the portable packed format used for replication ([`Field::pack`],
//!   [`Field::unpack`], [`RowCodec`])
//!
//! ## Example
//!
//! ```rust
//! use tessera_common::config::CodecConfig;
//! use tessera_field::{Diagnostics, Field, FieldType, Record, RecordLayout, Value};
//!
//! let layout = RecordLayout::new(
//!     vec![
//!         Field::new("id", FieldType::Long { unsigned: false }),
//!         Field::new("qty", FieldType::Tiny { unsigned: true }).nullable(),
//!     ],
//!     &CodecConfig::default(),
//! )
//! .unwrap();
//!
//! let mut diag = Diagnostics::new(false);
//! let mut record = Record::new(layout.into());
//! record.store_int(0, -7, false, &mut diag).unwrap();
//! record.store_int(1, 300, false, &mut diag).unwrap();
//!
//! assert_eq!(record.value(0), Value::Int(-7));
//! assert_eq!(record.value(1), Value::UInt(255));
//! assert_eq!(diag.warning_count(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decimal;
pub mod diagnostics;
pub mod error;
pub mod field;
pub mod record;
pub mod types;
pub mod value;

mod parse;

pub use decimal::Decimal;
pub use diagnostics::{Diagnostics, StoreStatus, Warning, WarningLevel};
pub use error::{FieldError, FieldResult};
pub use field::Field;
pub use record::{Record, RecordLayout, RowCodec, SourceColumn};
pub use types::{Charset, FieldType, RealType};
pub use value::Value;
