//! examrun-store — Backend record-store adapters.
//!
//! Implements the `QuestionSource` and `AttemptStore` contracts from
//! `examrun-core` against a JSON-record backend, plus an in-memory store
//! for tests and offline runs.

pub mod attempts;
pub mod config;
pub mod filter;
pub mod memory;
pub mod questions;
pub mod record;

pub use attempts::AttemptStoreAdapter;
pub use config::{load_config, load_config_from, BackendConfig};
pub use filter::Filter;
pub use memory::MemoryRecordStore;
pub use questions::QuestionSourceAdapter;
pub use record::{HttpRecordStore, RawRecord, RecordStore};
