// ABOUTME: Core library for evlog, containing the record model and the store contract.
// ABOUTME: This crate defines the types shared by every driver and by callers of the store.

pub mod error;
pub mod index;
pub mod record;
pub mod store;

pub use error::StoreError;
pub use index::VersionIndex;
pub use record::{Payload, Record, StreamId, Version};
pub use store::AppendOnlyStore;
