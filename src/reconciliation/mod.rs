//! Reconciliation module containing normalization, ingestion, matching,
//! and job orchestration

pub mod ingest;
pub mod matcher;
pub mod normalize;
pub mod processer;

pub use ingest::*;
pub use matcher::*;
pub use normalize::*;
pub use processer::*;
