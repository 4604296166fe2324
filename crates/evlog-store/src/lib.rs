// ABOUTME: Persistence layer for evlog, providing append-only store drivers.
// ABOUTME: Provides the durable JSONL file driver, an in-memory driver, and offline log repair.

pub mod file;
pub mod jsonl;
pub mod memory;

#[cfg(test)]
mod conformance;

pub use file::{DriverConfig, FileSystemDriver};
pub use jsonl::{RepairReport, repair};
pub use memory::InMemoryDriver;
