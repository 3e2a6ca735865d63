//! Diagnostic dump formats.

mod csv;
mod dump;
mod json;

pub use self::csv::*;
pub use self::dump::*;
pub use self::json::*;
