//! Lookup table and the sources that fill it.
//!
//! [`SkuTable`] is the unit the reloader rebuilds and the matchers serve.
//! A table is mutable only while it is privately owned; once published it
//! travels as `Arc<SkuTable>` and is read-only for everyone.

mod source;
mod table;

pub use source::{SourceError, StaticSource, SyntheticSource, TableSource};
pub use table::{LOOKUP_ROUNDS, SkuTable};
