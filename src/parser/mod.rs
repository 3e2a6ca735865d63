//! Sparse indexed attribute store and the structures layered on it.

mod extended;
mod header;
mod meta;
mod props;
mod value;
mod var_data;
mod view;

pub use extended::*;
pub use header::*;
pub use meta::*;
pub use props::*;
pub use value::*;
pub use var_data::*;
pub use view::*;
