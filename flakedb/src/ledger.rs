//! Per-ledger owned state and the process-wide ledger registry.
//!
//! One [`Ledger`] owns everything a `network/dbid` needs between blocks:
//! the subject-id high-water marks (`ecount`), flake statistics, the
//! copy-on-write schema view, novelty, and the chain position `(block, t,
//! hash)`. The registry maps `network/dbid` to a shared handle; it is
//! created at startup and torn down at shutdown.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::bootstrap::{self, Genesis};
use crate::error::LedgerError;
use crate::index::Novelty;
use crate::types::{Block, Flake, ObjectValue, Schema, SortOrder, subject_id};

/// Running flake statistics for one ledger.
#[derive(Clone, Copy, Debug, Default)]
pub struct LedgerStats {
    /// Total flakes ever absorbed.
    pub flakes: u64,
    /// Serialized-size estimate of those flakes, in bytes.
    pub size: u64,
}

/// The state of one ledger between blocks.
#[derive(Clone, Debug)]
pub struct Ledger {
    pub network: String,
    pub dbid: String,
    /// Per-collection high-water mark of issued sub-ids.
    pub ecount: BTreeMap<u32, u64>,
    pub stats: LedgerStats,
    /// Published schema view; replaced wholesale at block commit.
    pub schema: Arc<Schema>,
    pub novelty: Novelty,
    /// Logical time of the newest sealed block header.
    pub t: i64,
    /// Newest sealed block number.
    pub block: u64,
    /// Content hash of the newest sealed block.
    pub block_hash: String,
    /// Auth id of this ledger's signing authority.
    pub auth_id: String,
    /// Subject id of that authority's `_auth` record.
    pub auth_sid: i64,
}

impl Ledger {
    /// Creates a fresh ledger from genesis bootstrap.
    ///
    /// Returns the ledger with the genesis flakes absorbed into novelty,
    /// plus the genesis block for persistence.
    pub fn genesis(
        network: &str,
        dbid: &str,
        cmd: &str,
        sig: &str,
        timestamp_ms: i64,
    ) -> Result<(Ledger, Block), LedgerError> {
        let Genesis {
            block,
            schema,
            ecount,
            auth_id,
        } = bootstrap::bootstrap(cmd, sig, timestamp_ms)?;

        let schema = Arc::new(schema);
        let mut novelty = Novelty::new();
        let added = novelty.absorb(&block.flakes, &schema);

        let ledger = Ledger {
            network: network.to_string(),
            dbid: dbid.to_string(),
            ecount,
            stats: LedgerStats {
                flakes: block.flakes.len() as u64,
                size: added as u64,
            },
            schema,
            novelty,
            t: block.t,
            block: block.number,
            block_hash: block.hash.clone(),
            auth_id,
            auth_sid: subject_id(bootstrap::ids::AUTH_CID, 1),
        };
        Ok((ledger, block))
    }

    /// `network/dbid` identifier used in storage keys and the registry.
    pub fn ledger_id(&self) -> String {
        format!("{}/{}", self.network, self.dbid)
    }

    /// Mints the next subject id in `cid`, advancing the high-water mark.
    pub fn mint_subject(&mut self, cid: u32) -> i64 {
        let counter = self.ecount.entry(cid).or_insert(0);
        *counter += 1;
        subject_id(cid, *counter)
    }

    /// Finds the subject currently asserting `o` under the unique predicate
    /// `pid`, consulting the `post` projection at the ledger's current `t`.
    pub fn find_unique_subject(&self, pid: i64, o: &ObjectValue) -> Option<i64> {
        let from = Flake {
            s: i64::MIN,
            p: pid,
            o: o.clone(),
            t: i64::MAX,
            op: false,
            m: None,
        };
        let to = Flake {
            s: i64::MAX,
            p: pid,
            o: o.clone(),
            t: i64::MIN,
            op: true,
            m: Some(String::new()),
        };

        // post is (p, o, s, t): within one (p, o) run, per-subject runs end
        // with the newest flake, which decides liveness.
        let mut current: Option<&Flake> = None;
        for f in self.novelty.range(SortOrder::Post, &from, &to) {
            if f.t < self.t {
                continue;
            }
            match current {
                Some(prev) if prev.s == f.s => current = Some(f),
                Some(prev) => {
                    if prev.op {
                        return Some(prev.s);
                    }
                    current = Some(f);
                }
                None => current = Some(f),
            }
        }
        current.filter(|f| f.op).map(|f| f.s)
    }
}

/// Process-wide mapping from `network/dbid` to a ledger handle.
#[derive(Default)]
pub struct LedgerRegistry {
    inner: RwLock<HashMap<String, Arc<Mutex<Ledger>>>>,
}

impl LedgerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, ledger: Ledger) -> Arc<Mutex<Ledger>> {
        let id = ledger.ledger_id();
        let handle = Arc::new(Mutex::new(ledger));
        self.inner.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, ledger_id: &str) -> Option<Arc<Mutex<Ledger>>> {
        self.inner.read().await.get(ledger_id).cloned()
    }

    pub async fn remove(&self, ledger_id: &str) -> Option<Arc<Mutex<Ledger>>> {
        self.inner.write().await.remove(ledger_id)
    }

    pub async fn ledger_ids(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }

    /// Drops every handle. Ledgers are never destroyed, only released.
    pub async fn shutdown(&self) {
        self.inner.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::ids;
    use crate::crypto;

    const CMD: &str = r#"{"type":"new-db","db":"net/db","auth":"0xabc","nonce":1000,"expire":1000300000}"#;

    fn test_ledger() -> (Ledger, Block) {
        let sig = crypto::sign_recoverable(&[7u8; 32], CMD.as_bytes()).expect("sign");
        Ledger::genesis("net", "db", CMD, &sig, 1000).expect("genesis")
    }

    #[test]
    fn genesis_ledger_starts_at_block_one() {
        let (ledger, block) = test_ledger();
        assert_eq!(ledger.block, 1);
        assert_eq!(ledger.t, -2);
        assert_eq!(ledger.block_hash, block.hash);
        // Novelty contains exactly the bootstrap flakes. The genesis block
        // carries its doubled `_block/transactions` reference as two equal
        // tuples, which occupy a single set entry.
        assert_eq!(ledger.novelty.len(), block.flakes.len() - 1);
        assert_eq!(ledger.stats.flakes, block.flakes.len() as u64);
        assert!(ledger.stats.size > 0);
    }

    #[test]
    fn mint_subject_advances_the_high_water_mark() {
        let (mut ledger, _) = test_ledger();
        let before = ledger.ecount[&ids::USER_CID];
        let sid = ledger.mint_subject(ids::USER_CID);
        assert_eq!(crate::types::subject_counter(sid), before + 1);
        assert_eq!(ledger.ecount[&ids::USER_CID], before + 1);
    }

    #[test]
    fn find_unique_subject_resolves_the_master_auth() {
        let (ledger, _) = test_ledger();
        let found = ledger.find_unique_subject(
            ids::AUTH_ID,
            &ObjectValue::Str(ledger.auth_id.clone()),
        );
        assert_eq!(found, Some(ledger.auth_sid));
        assert_eq!(
            ledger.find_unique_subject(ids::AUTH_ID, &ObjectValue::Str("0xmissing".into())),
            None
        );
    }

    #[tokio::test]
    async fn registry_inserts_and_removes_handles() {
        let registry = LedgerRegistry::new();
        let (ledger, _) = test_ledger();
        let id = ledger.ledger_id();

        registry.insert(ledger).await;
        assert!(registry.get(&id).await.is_some());
        assert_eq!(registry.ledger_ids().await, vec![id.clone()]);

        registry.remove(&id).await;
        assert!(registry.get(&id).await.is_none());
    }
}
