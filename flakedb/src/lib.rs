//! flakedb library crate.
//!
//! This crate provides the core building blocks of a transactional,
//! immutable, time-travel-capable graph ledger:
//!
//! - strongly-typed domain types: flakes, blocks, schema (`types`),
//! - the deterministic genesis bootstrap (`bootstrap`),
//! - the novelty / multi-order index layer (`index`),
//! - schema-mutation validation and the spec-function seam (`validation`),
//! - the transactor and block builder (`txn`),
//! - per-ledger state and the ledger registry (`ledger`),
//! - pluggable blob storage backends (`storage`),
//! - crypto seams for hashing and signature recovery (`crypto`),
//! - Prometheus-based metrics (`metrics`),
//! - and the `fdb-*` node configuration surface (`config`).
//!
//! Higher-level binaries compose these pieces into transactor nodes and
//! query peers.

pub mod bootstrap;
pub mod config;
pub mod crypto;
pub mod error;
pub mod index;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod txn;
pub mod types;
pub mod validation;

// Re-export the node configuration types.
pub use config::{ConsensusType, NodeMode, Settings, StorageType};

// Re-export the error type used across the crate.
pub use error::LedgerError;

// Re-export per-ledger state and the registry.
pub use ledger::{Ledger, LedgerRegistry, LedgerStats};

// Re-export the novelty layer.
pub use index::{Novelty, ReindexPointer, ReindexStatus};

// Re-export the transaction pipeline.
pub use txn::{BlockBuilder, SignedCommand, Transactor, TxResponse};

// Re-export validation seams.
pub use validation::{ApproveAllSpecs, SchemaValidator, SpecRunner};

// Re-export storage backends and the facade trait.
pub use storage::{
    FileStorage, MemoryStorage, S3Storage, StashStorage, Storage, StorageError,
};

// Re-export metrics registry and exporter.
pub use metrics::{LedgerMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the storage backend a "typical" single node runs on.
pub type DefaultStorage = FileStorage;

/// Type alias for the default transactor stack: file-backed storage and
/// approve-all spec evaluation.
pub type DefaultTransactor = Transactor<DefaultStorage, ApproveAllSpecs>;
