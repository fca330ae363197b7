//! # docledger
//!
//! An incremental documentation regeneration engine for codebases.
//!
//! docledger keeps a content-addressed ledger of every source file in a
//! repository, a dependency graph between them, and a chunk-level vector
//! index. When files change, the change propagates through the graph to
//! determine which documentation artifacts are affected; only those are
//! regenerated, from context retrieved out of the vector index.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌─────────────┐
//! │   Scan   │──▶│ File Ledger │──▶│   Impact    │
//! │ walk+hash│   │ SQLite + DAG│   │  Closure    │
//! └────┬─────┘   └─────────────┘   └──────┬──────┘
//!      │                                  │
//!      ▼                                  ▼
//! ┌─────────────┐                  ┌─────────────┐
//! │Vector Index │─────retrieval───▶│ Invalidation│
//! │ Chunk+Embed │                  │ + Generate  │
//! └─────────────┘                  └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dlg init                      # create database
//! dlg scan                      # hash, diff, chunk, and embed the repo
//! dlg search "config parsing"   # semantic search over code chunks
//! dlg generate readme           # regenerate only if stale
//! dlg status                    # ledger and index overview
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`ledger`] | Content-addressed file ledger and dependency graph |
//! | [`chunker`] | Definition-boundary code chunking |
//! | [`deps`] | Import extraction and edge resolution |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Chunk-level vector similarity index |
//! | [`generator`] | Documentation generator abstraction |
//! | [`invalidation`] | Fingerprint-based staleness and deduplicated regeneration |
//! | [`vcs`] | Git change source, cross-checked against content hashes |
//! | [`feedback`] | Reader feedback on generated artifacts |
//! | [`scan`] | Scan pipeline orchestration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod changes;
pub mod chunker;
pub mod config;
pub mod db;
pub mod deps;
pub mod embedding;
pub mod error;
pub mod feedback;
pub mod generate;
pub mod generator;
pub mod index;
pub mod invalidation;
pub mod ledger;
pub mod migrate;
pub mod models;
pub mod scan;
pub mod search;
pub mod stats;
pub mod vcs;
