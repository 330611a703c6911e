//! Desired-state model
//!
//! Table and extension shapes as operators author them. Field names and
//! optionality mirror the JSON configuration exactly.

mod extension;
mod table;

pub use extension::Extension;
pub use table::*;
