#![forbid(unsafe_code)]

pub mod access_store;
pub mod repository;
pub mod sqlite;

pub use access_store::{AccessRecord, AccessStore};
pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
