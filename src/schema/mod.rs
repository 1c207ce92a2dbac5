//! Source schema: timestamp parsing, file reading and integrity checks
//!
//! Everything that touches raw upstream records lives here. Past this module
//! the engine only sees typed, parsed records.

pub mod timestamp;
mod source;
mod validate;

pub use source::*;
pub use timestamp::{parse_date, parse_timestamp};
pub use validate::*;
