#![deny(missing_docs)]

//! Core library for the Campus Search server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and search metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Document persistence.
pub mod store;
/// Summarization client abstraction and adapters.
pub mod summarization;
