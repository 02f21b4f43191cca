//! Persistent item store with dedup on insert and size-bounded trimming.

mod repository;

pub use repository::ItemRepository;
