//! Block and transaction types, and canonical block hashing.
//!
//! A block is a hash-chained batch of transactions sealed at one logical
//! era. Persistence uses **bincode 2** with the `serde` integration and an
//! explicit `standard()` config; the consensus-visible content hash uses
//! SHA3-256 over the canonical JSON of the spot-sorted flake tuples,
//! excluding the `_block/hash` and `_block/ledgers` flakes themselves
//! (they are appended after hashing).

use serde::{Deserialize, Serialize};

use super::{Flake, Hash256, SortOrder};
use crate::bootstrap::ids;

/// Strongly-typed block content hash (SHA3-256).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl BlockHash {
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

/// One accepted transaction and the flakes it produced.
///
/// All of a transaction's flakes share one `t`; within a block, transactions
/// carry strictly decreasing `t`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// SHA3-256 of the canonical command bytes, hex-encoded.
    pub id: String,
    /// Auth id recovered from the command signature.
    pub auth: String,
    /// Client-chosen anti-replay nonce.
    pub nonce: u64,
    /// Canonical command bytes as submitted.
    pub command: String,
    /// Hex-encoded recoverable signature over the command bytes.
    pub signature: String,
    /// Logical time assigned to this transaction.
    pub t: i64,
    /// Flakes materialized by this transaction (metadata flakes included).
    pub flakes: Vec<Flake>,
}

/// A sealed block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Block number, starting at 1 for genesis.
    pub number: u64,
    /// Logical time of the block header flakes (more negative than any
    /// transaction `t` in the block).
    pub t: i64,
    /// Wall-clock instant of sealing, milliseconds since the Unix epoch.
    pub instant: i64,
    /// Content hash of the previous block; `None` only for genesis.
    pub prev_hash: Option<String>,
    /// Content hash of this block, hex-encoded.
    pub hash: String,
    /// Every flake in the block: transaction flakes plus header flakes.
    pub flakes: Vec<Flake>,
    /// Ledger signer auth ids recorded in `_block/ledgers`.
    pub ledger_signatures: Vec<String>,
    /// The transactions sealed into this block, in descending `t` order.
    pub txs: Vec<Transaction>,
}

impl Block {
    /// Computes the canonical content hash over a flake set.
    ///
    /// The input is spot-sorted and the `_block/hash` / `_block/ledgers`
    /// flakes are excluded, so the hash can be computed before those flakes
    /// exist and re-verified after they are appended.
    pub fn compute_hash(flakes: &[Flake]) -> BlockHash {
        let mut hashable: Vec<&Flake> = flakes
            .iter()
            .filter(|f| f.p != ids::BLOCK_HASH && f.p != ids::BLOCK_LEDGERS)
            .collect();
        hashable.sort_by(|a, b| SortOrder::Spot.compare(a, b));

        let tuples: Vec<serde_json::Value> =
            hashable.iter().map(|f| f.canonical_json()).collect();
        let canonical = serde_json::Value::Array(tuples).to_string();
        BlockHash(Hash256::compute(canonical.as_bytes()))
    }

    /// Verifies that the recorded hash matches the recomputed content hash.
    pub fn verify_hash(&self) -> bool {
        Self::compute_hash(&self.flakes).to_hex() == self.hash
    }

    /// Returns the canonical byte representation of this block, used for
    /// persistence through the storage facade.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails, which would be a programming error: all
    /// fields are required to be serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("Block should always be serializable with bincode 2 + serde")
    }

    /// Decodes a block from its canonical byte representation.
    pub fn decode(bytes: &[u8]) -> Option<Block> {
        let cfg = bincode::config::standard();
        let (block, _): (Block, usize) = bincode::serde::decode_from_slice(bytes, cfg).ok()?;
        Some(block)
    }
}
