//! # threatload
//!
//! Bulk-load labeled text records into a search index, tagging each one
//! with a keyword sentiment label and the weapon terms it mentions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ weapon list  │──▶│ Enrichment   │──▶│ Backend          │
//! │ CSV rows     │   │ local or     │   │ Elasticsearch or │
//! └──────────────┘   │ pipeline     │   │ SQLite           │
//!                    └──────┬───────┘   └────────┬─────────┘
//!                           ▼                    ▼
//!                     batches of 500       status flag
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! threatload init                        # create indices, register pipeline
//! threatload load --csv data/texts.csv   # enrich + bulk load + status
//! threatload status                      # was the last load complete?
//! threatload enrich "they will attack with a knife"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`weapons`] | Weapon list file loading |
//! | [`csv_source`] | CSV input reading |
//! | [`backend`] | Backend selection |
//! | [`backend_es`] | Elasticsearch REST backend |
//! | [`backend_sqlite`] | Local SQLite backend |
//! | [`load`] | Load run orchestration |
//! | [`progress`] | Progress reporting on stderr |

pub mod backend;
pub mod backend_es;
pub mod backend_sqlite;
pub mod config;
pub mod csv_source;
pub mod enrich_cmd;
pub mod load;
pub mod migrate;
pub mod progress;
pub mod status;
pub mod weapons;
