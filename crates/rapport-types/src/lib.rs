pub mod api;
pub mod models;

pub use models::{Direction, InteractionKind, InteractionRecord, UnknownVariant};
