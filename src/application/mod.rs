pub mod bootstrap;
pub mod engine;
pub mod error;
pub mod reporting;
pub mod scheduler;
