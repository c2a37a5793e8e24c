pub mod config;
pub mod error;
pub mod memory_store;
pub mod sqlite_store;
pub mod storage;
pub mod store;
