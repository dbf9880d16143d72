// src/source/mod.rs
pub mod cast;
pub mod reader;
pub mod record;

pub use reader::{read_source, SourceLocation};
pub use record::{records_from_batch, RawRecord};
