pub mod cleaner;
pub mod error;
pub mod raw_store;
pub mod writer;
