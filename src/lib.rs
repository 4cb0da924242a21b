//! # Tariff Classifier
//!
//! Ranks candidate tariff classification codes for a free-text product
//! description, optionally biased by a company's search profile.
//!
//! A request is tokenized into search terms, searched against the reference
//! catalog in progressively broader tiers until enough distinct codes are
//! found, de-duplicated, scored, and cached.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Terms   │──▶│   Tiered   │──▶│  Combine +  │──▶│  Cache   │
//! │ extract  │   │   search   │   │   Scoring   │   │  (TTL)   │
//! └──────────┘   └─────┬──────┘   └─────────────┘   └──────────┘
//!                      │
//!              ┌───────┴────────┐
//!              ▼                ▼
//!        ┌──────────┐     ┌──────────┐
//!        │  SQLite  │     │ In-memory│
//!        │  FTS5    │     │  store   │
//!        └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tclass init                                  # create database
//! tclass import catalog ./data/catalog.jsonl   # load reference catalog
//! tclass import contexts ./data/profiles.jsonl # load company profiles
//! tclass classify "wireless bluetooth headphones"
//! tclass classify "steel bolts" --company acme --json
//! tclass serve                                 # start HTTP server
//! ```
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tariff_classifier::config::Config;
//! use tariff_classifier::engine::Engine;
//! use tariff_classifier::memory_store::InMemoryCatalog;
//! use tariff_classifier::models::{CatalogRecord, SearchRequest};
//! use tariff_classifier::store::NoContext;
//!
//! # async fn example() {
//! let catalog = InMemoryCatalog::from_records(
//!     CatalogRecord::new("8518.30", "Headphones and earphones", 4.9, 0.0, 1_000),
//! );
//! let engine = Engine::new(
//!     Arc::new(catalog),
//!     Arc::new(NoContext),
//!     &Config::with_db_path("unused.sqlite"),
//! );
//! let response = engine.classify(&SearchRequest::new("bluetooth headphones")).await;
//! println!("{} via {}", response.results.len(), response.strategy);
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`terms`] | Search term extraction |
//! | [`store`] | Catalog and context provider traits |
//! | [`memory_store`] | In-memory backends |
//! | [`sqlite_store`] | SQLite backends |
//! | [`tiered`] | Tiered search executor |
//! | [`combine`] | Result de-duplication |
//! | [`scoring`] | Relevance scoring and ordering |
//! | [`cache`] | Response cache |
//! | [`engine`] | Classification façade |
//! | [`error`] | Downgrade fault taxonomy |
//! | [`import`] | JSONL import |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cache;
pub mod classify;
pub mod combine;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod import;
pub mod memory_store;
pub mod migrate;
pub mod models;
pub mod scoring;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod store;
pub mod terms;
pub mod tiered;
