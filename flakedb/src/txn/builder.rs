//! Block builder: seals admitted transactions into a hash-chained block.

use crate::bootstrap::ids;
use crate::types::{Block, Flake, ObjectValue, SortOrder, Transaction};

/// Builds blocks from batches of admitted transactions.
///
/// Stateless: the chain position comes in as arguments, the sealed block
/// goes out. Persistence and ledger bookkeeping belong to the transactor.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockBuilder;

impl BlockBuilder {
    /// Seals `txs` (descending `t`, all flakes already materialized) on top
    /// of the block identified by `(prev_number, prev_hash)`.
    ///
    /// Emits the header flakes at `block-t` (one era below the oldest tx),
    /// computes the content hash over everything except the yet-unwritten
    /// `_block/hash` / `_block/ledgers` flakes, then appends those.
    pub fn seal(
        prev_number: u64,
        prev_hash: &str,
        instant_ms: i64,
        txs: Vec<Transaction>,
        signer_sid: i64,
        signer_auth_id: &str,
    ) -> Block {
        debug_assert!(!txs.is_empty());
        debug_assert!(txs.windows(2).all(|w| w[0].t > w[1].t));

        let block_number = prev_number + 1;
        let block_t = txs.last().map(|tx| tx.t - 1).unwrap_or(-1);

        let mut flakes: Vec<Flake> = txs.iter().flat_map(|tx| tx.flakes.clone()).collect();

        flakes.push(Flake::new(
            block_t,
            ids::BLOCK_NUMBER,
            ObjectValue::Long(block_number as i64),
            block_t,
            true,
        ));
        flakes.push(Flake::new(
            block_t,
            ids::BLOCK_INSTANT,
            ObjectValue::Instant(instant_ms),
            block_t,
            true,
        ));
        for tx in &txs {
            flakes.push(Flake::new(
                block_t,
                ids::BLOCK_TRANSACTIONS,
                ObjectValue::Ref(tx.t),
                block_t,
                true,
            ));
        }
        flakes.push(Flake::new(
            block_t,
            ids::BLOCK_PREV_HASH,
            ObjectValue::Str(prev_hash.to_string()),
            block_t,
            true,
        ));

        let hash = Block::compute_hash(&flakes);
        flakes.push(Flake::new(
            block_t,
            ids::BLOCK_HASH,
            ObjectValue::Str(hash.to_hex()),
            block_t,
            true,
        ));
        flakes.push(Flake::new(
            block_t,
            ids::BLOCK_LEDGERS,
            ObjectValue::Ref(signer_sid),
            block_t,
            true,
        ));

        flakes.sort_by(|a, b| SortOrder::Spot.compare(a, b));

        Block {
            number: block_number,
            t: block_t,
            instant: instant_ms,
            prev_hash: Some(prev_hash.to_string()),
            hash: hash.to_hex(),
            flakes,
            ledger_signatures: vec![signer_auth_id.to_string()],
            txs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_tx(t: i64, s: i64) -> Transaction {
        Transaction {
            id: format!("tx-{t}"),
            auth: "0xauth".to_string(),
            nonce: 1,
            command: "{}".to_string(),
            signature: "sig".to_string(),
            t,
            flakes: vec![Flake::new(s, 1000, ObjectValue::Long(1), t, true)],
        }
    }

    #[test]
    fn sealed_block_chains_to_the_previous_hash() {
        let block = BlockBuilder::seal(4, "prevhash", 1_700_000_000_000, vec![dummy_tx(-9, 5)], 99, "0xauth");

        assert_eq!(block.number, 5);
        assert_eq!(block.t, -10);
        assert_eq!(block.prev_hash.as_deref(), Some("prevhash"));
        assert!(block.verify_hash());
        assert!(block.flakes.iter().any(|f| {
            f.p == ids::BLOCK_PREV_HASH && f.o == ObjectValue::Str("prevhash".to_string())
        }));
    }

    #[test]
    fn header_references_every_transaction_t() {
        let block = BlockBuilder::seal(
            1,
            "h",
            1_700_000_000_000,
            vec![dummy_tx(-3, 5), dummy_tx(-4, 6)],
            99,
            "0xauth",
        );

        let refs: Vec<i64> = block
            .flakes
            .iter()
            .filter(|f| f.p == ids::BLOCK_TRANSACTIONS)
            .filter_map(|f| match f.o {
                ObjectValue::Ref(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&-3) && refs.contains(&-4));
        assert_eq!(block.t, -5);
    }

    #[test]
    fn hash_and_ledgers_flakes_are_appended_after_hashing() {
        let block = BlockBuilder::seal(1, "h", 1, vec![dummy_tx(-3, 5)], 99, "0xauth");

        // Recomputing over all flakes (exclusion rule applies) matches.
        assert_eq!(Block::compute_hash(&block.flakes).to_hex(), block.hash);
        assert!(block.flakes.iter().any(|f| f.p == ids::BLOCK_HASH));
        assert!(
            block
                .flakes
                .iter()
                .any(|f| f.p == ids::BLOCK_LEDGERS && f.o == ObjectValue::Ref(99))
        );
    }
}
