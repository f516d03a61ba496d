//! Core value and snapshot types

mod snapshot;
mod value;

pub use snapshot::Snapshot;
pub use value::{Value, decode_cstr, scrub_f64};
