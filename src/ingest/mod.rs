//! Incremental ingestion of the listening history.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │  pipeline  │────▶│   resolver   │────▶│     db (store)   │
//! │  (phases)  │     │ (what's new, │     └──────────────────┘
//! │            │     │ what's gone) │
//! │            │     └──────────────┘     ┌──────────────────┐
//! │            │────▶ fetcher (chunks) ──▶│ HistoryProvider  │
//! └────────────┘                          └──────────────────┘
//! ```
//!
//! The provider is reached only through [`traits::HistoryProvider`], so
//! tests run the whole pipeline against an in-memory mock.

pub mod fetcher;
pub mod pipeline;
pub mod resolver;
pub mod traits;

pub use fetcher::{Batch, BatchFetcher};
pub use pipeline::{Phase, Pipeline, RunReport};
pub use traits::HistoryProvider;
