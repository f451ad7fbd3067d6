//! # threatload core
//!
//! I/O-free logic for threatload: weapon list normalization, the
//! sentiment + weapon enrichment rules, document models, batching, and the
//! [`backend::Backend`] abstraction that the ingestion, pipeline
//! registration, and status recording all write through.
//!
//! Nothing here touches the filesystem or the network. Concrete backends
//! that do (Elasticsearch, SQLite) live in the `threatload` crate; the
//! [`backend::memory::InMemoryBackend`] in this crate is for tests.

pub mod backend;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod status;
pub mod weapons;
