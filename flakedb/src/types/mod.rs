//! Core domain types used by the ledger.
//!
//! This module defines strongly-typed hashes, subject/predicate identifier
//! helpers, and the polymorphic object value that flakes carry. The goal is
//! to avoid "naked" integers and byte buffers in public APIs and instead use
//! domain-specific types with explicit semantics.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub mod block;
pub mod flake;
pub mod schema;

pub use block::{Block, BlockHash, Transaction};
pub use flake::{Flake, SortOrder};
pub use schema::{Collection, Predicate, PredicateType, Schema};

/// Length in bytes of all 256-bit hash types used by the ledger.
pub const HASH_LEN: usize = 32;

/// Number of low bits of a subject id reserved for the within-collection
/// counter. The remaining high bits carry the collection id.
pub const COLLECTION_SHIFT: u32 = 44;

/// Collection id of the `_predicate` system collection.
///
/// It is pinned to zero so that predicate subject ids coincide with their
/// within-collection counters, which keeps the stable predicate ids in the
/// bootstrap program small and readable.
pub const PREDICATE_CID: u32 = 0;

/// Strongly-typed 256-bit hash wrapper (SHA3-256).
///
/// This type backs every consensus-visible hash in the ledger: transaction
/// ids, block content hashes, and authority derivation. It is always exactly
/// [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the SHA3-256 digest of `data`.
    ///
    /// The result is deterministic for a given byte slice and is suitable
    /// for use as an identifier or content hash, but it is **not** a
    /// password hash or KDF.
    pub fn compute(data: &[u8]) -> Self {
        use sha3::{Digest, Sha3_256};
        let mut hasher = Sha3_256::new();
        hasher.update(data);
        Hash256(hasher.finalize().into())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Returns the lowercase hex encoding of this hash.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Builds a subject id from a collection id and a within-collection counter.
///
/// Subject ids are 64-bit composites: the collection id occupies the bits
/// above [`COLLECTION_SHIFT`], the counter the bits below. Negative subject
/// ids are reserved for transaction and block metadata subjects, whose id
/// *is* their logical time `t`.
pub fn subject_id(cid: u32, counter: u64) -> i64 {
    debug_assert!(counter < (1 << COLLECTION_SHIFT));
    ((cid as i64) << COLLECTION_SHIFT) | (counter as i64)
}

/// Extracts the collection id from a non-negative subject id.
pub fn subject_collection(sid: i64) -> u32 {
    debug_assert!(sid >= 0);
    (sid >> COLLECTION_SHIFT) as u32
}

/// Extracts the within-collection counter from a non-negative subject id.
pub fn subject_counter(sid: i64) -> u64 {
    debug_assert!(sid >= 0);
    (sid & ((1_i64 << COLLECTION_SHIFT) - 1)) as u64
}

/// Polymorphic object value carried by a flake.
///
/// The representation is a storage kind, not a schema type: several
/// predicate types share one kind (`int`, `long`, and `instant` literals all
/// land in 64-bit integers; `uri`, `uuid`, `json`, and `geojson` land in
/// strings). Coercion from a literal into a kind is driven by the declared
/// predicate type, see [`schema::PredicateType::coerce`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ObjectValue {
    /// Boolean literal.
    Bool(bool),
    /// 64-bit integer (`int` / `long` predicate types).
    Long(i64),
    /// IEEE double (`float` / `double` predicate types). Total ordering via
    /// `f64::total_cmp`.
    Double(f64),
    /// Arbitrary-precision integer, canonical decimal string form.
    BigInt(String),
    /// Arbitrary-precision decimal, canonical string form.
    BigDec(String),
    /// UTF-8 string (`string` / `uri` / `uuid` / `json` / `geojson`).
    Str(String),
    /// Temporal instant as milliseconds since the Unix epoch.
    Instant(i64),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Subject id of another entity (`ref` / `tag` predicate types).
    Ref(i64),
}

impl ObjectValue {
    /// Rank used as the primary key when ordering values of distinct kinds.
    fn kind_rank(&self) -> u8 {
        match self {
            ObjectValue::Bool(_) => 0,
            ObjectValue::Long(_) => 1,
            ObjectValue::Double(_) => 2,
            ObjectValue::BigInt(_) => 3,
            ObjectValue::BigDec(_) => 4,
            ObjectValue::Str(_) => 5,
            ObjectValue::Instant(_) => 6,
            ObjectValue::Bytes(_) => 7,
            ObjectValue::Ref(_) => 8,
        }
    }

    /// Renders this value into the canonical JSON form used for block
    /// hashing: bare literals for scalars, numbers for refs and instants,
    /// hex strings for bytes.
    pub fn canonical_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            ObjectValue::Bool(b) => Value::Bool(*b),
            ObjectValue::Long(n) => Value::from(*n),
            ObjectValue::Double(d) => {
                serde_json::Number::from_f64(*d).map_or(Value::Null, Value::Number)
            }
            ObjectValue::BigInt(s) | ObjectValue::BigDec(s) | ObjectValue::Str(s) => {
                Value::String(s.clone())
            }
            ObjectValue::Instant(ms) => Value::from(*ms),
            ObjectValue::Bytes(b) => Value::String(hex::encode(b)),
            ObjectValue::Ref(sid) => Value::from(*sid),
        }
    }

    /// Serialized-size estimate in bytes, used for novelty accounting.
    pub fn size_estimate(&self) -> usize {
        match self {
            ObjectValue::Bool(_) => 1,
            ObjectValue::Long(_) | ObjectValue::Instant(_) | ObjectValue::Ref(_) => 8,
            ObjectValue::Double(_) => 8,
            ObjectValue::BigInt(s) | ObjectValue::BigDec(s) | ObjectValue::Str(s) => s.len(),
            ObjectValue::Bytes(b) => b.len(),
        }
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ObjectValue {}

impl PartialOrd for ObjectValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use ObjectValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Long(a), Long(b)) => a.cmp(b),
            (Double(a), Double(b)) => a.total_cmp(b),
            (BigInt(a), BigInt(b)) => a.cmp(b),
            (BigDec(a), BigDec(b)) => a.cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            (Instant(a), Instant(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (Ref(a), Ref(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash256_is_deterministic_and_hex_encodes() {
        let a = Hash256::compute(b"flake");
        let b = Hash256::compute(b"flake");
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), HASH_LEN * 2);
    }

    #[test]
    fn subject_id_roundtrips_collection_and_counter() {
        let sid = subject_id(7, 42);
        assert_eq!(subject_collection(sid), 7);
        assert_eq!(subject_counter(sid), 42);
    }

    #[test]
    fn predicate_subject_ids_equal_their_counters() {
        // The _predicate collection is pinned to cid 0.
        assert_eq!(subject_id(PREDICATE_CID, 12), 12);
    }

    #[test]
    fn object_values_order_within_and_across_kinds() {
        assert!(ObjectValue::Long(1) < ObjectValue::Long(2));
        assert!(ObjectValue::Str("a".into()) < ObjectValue::Str("b".into()));
        // Cross-kind ordering is by kind rank, so sets stay total.
        assert!(ObjectValue::Long(i64::MAX) < ObjectValue::Double(0.0));
        assert_eq!(
            ObjectValue::Double(1.5),
            ObjectValue::Double(1.5),
        );
    }

    #[test]
    fn canonical_json_elides_nothing_but_uses_bare_literals() {
        assert_eq!(ObjectValue::Bool(true).canonical_json(), serde_json::json!(true));
        assert_eq!(ObjectValue::Long(-3).canonical_json(), serde_json::json!(-3));
        assert_eq!(
            ObjectValue::Bytes(vec![0xAB, 0xCD]).canonical_json(),
            serde_json::json!("abcd")
        );
        assert_eq!(ObjectValue::Ref(99).canonical_json(), serde_json::json!(99));
    }
}
