//! Typed interaction storage on top of the columnar engine.
//!
//! - [`schema`] declares the interaction table and its encoding hints.
//! - [`store`] appends records and runs queries under an [`ExecContext`].
//! - [`filter`] builds the sent/received predicates.
//! - [`decode`] turns engine batches back into [`InteractionRecord`]s.
//!
//! [`ExecContext`]: rapport_columnar::ExecContext
//! [`InteractionRecord`]: rapport_types::InteractionRecord

pub mod decode;
pub mod error;
pub mod filter;
pub mod schema;
pub mod store;

pub use decode::{BatchDecoder, ColumnView, DecodeError, decode};
pub use error::StoreError;
pub use filter::build_direction_filter;
pub use schema::{InteractionColumn, TABLE_NAME, interaction_schema};
pub use store::{InteractionStore, ScanReport};
