//! The transaction pipeline.
//!
//! This module wires the end-to-end path of one command:
//!
//! - [`command`]: the signed command envelope and its statement graph,
//! - [`Transactor`]: parse, sign-check, materialize flakes, validate,
//!   admit to novelty, and cooperate with the block builder,
//! - [`BlockBuilder`]: seal admitted transactions into a hash-chained
//!   block.
//!
//! The consensus leader serializes transactions, so the transactor never
//! sees two commands concurrently for one ledger; within a block,
//! transactions carry strictly decreasing `t`.

pub mod builder;
pub mod command;
pub mod transactor;

pub use builder::BlockBuilder;
pub use command::{SignedCommand, Statement, StatementAction, SubjectRef};
pub use transactor::{Transactor, TxResponse};
