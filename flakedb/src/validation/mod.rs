//! Transaction-time validation.
//!
//! This module enforces legal mutations of the `_collection` and
//! `_predicate` meta-collections during a transaction:
//!
//! - [`schema::SchemaValidator`]: the type-compatibility lattice and
//!   structural rules for predicates, plus collection-name checks.
//! - [`SpecRunner`]: the seam through which user-defined spec functions
//!   (`_predicate/spec`, `_predicate/txSpec`, `_collection/spec`) are
//!   evaluated against the post-transaction view. Evaluation is delegated;
//!   the default implementation approves everything.
//!
//! Validation failures are captured and returned, never thrown; a failed
//! transaction is rejected individually without disturbing the block
//! builder or the novelty layer.

pub mod schema;

pub use schema::{SchemaValidation, SchemaValidator};

use crate::error::LedgerError;
use crate::types::{Flake, Schema};

/// Evaluates user-defined spec functions against the db-after view.
pub trait SpecRunner {
    /// Returns `Err` with the spec's error message when any spec function
    /// rejects the transaction's flakes.
    fn run_specs(
        &self,
        flakes: &[Flake],
        db_after: &Schema,
    ) -> Result<(), LedgerError>;
}

/// Spec runner that approves every transaction.
///
/// Stands in wherever a ledger runs without a function-evaluation engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproveAllSpecs;

impl SpecRunner for ApproveAllSpecs {
    fn run_specs(&self, _flakes: &[Flake], _db_after: &Schema) -> Result<(), LedgerError> {
        Ok(())
    }
}
