//! examrun-core — Exam-session engine, scoring, and adapter contracts.
//!
//! This crate defines the data model, the session state machine, and the
//! async traits that the `examrun-store` adapters implement.

pub mod error;
pub mod model;
pub mod palette;
pub mod quota;
pub mod scoring;
pub mod session;
pub mod traits;
