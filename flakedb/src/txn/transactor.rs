//! The transactor: executes one command end-to-end.
//!
//! Pipeline: parse & sign-check, assign `t`, materialize flakes through the
//! schema cache, gather and validate schema mutations, run delegated spec
//! functions on the db-after view, absorb into novelty, seal the block, and
//! persist it through the storage facade.
//!
//! All mutation is staged on a clone of the ledger and merged only after
//! the block is persisted, so a transaction cancelled or failed mid-flight
//! has no observable effect.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::bootstrap::ids;
use crate::crypto;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::storage::{self, Storage};
use crate::types::{
    Flake, ObjectValue, Predicate, PredicateType, Schema, SortOrder, Transaction,
    subject_collection,
};
use crate::validation::schema::recheck_remove_from_post;
use crate::validation::{SchemaValidator, SpecRunner};

use super::builder::BlockBuilder;
use super::command::{
    SignedCommand, Statement, StatementAction, SubjectRef, parse_command, parse_statements,
};

/// User-visible result of one transaction.
#[derive(Clone, Debug)]
pub struct TxResponse {
    /// 200 on success, 400/500 on rejection.
    pub status: u16,
    /// Error kind on rejection.
    pub error: Option<String>,
    pub message: Option<String>,
    /// New block number on success.
    pub block: Option<u64>,
    /// New block hash on success.
    pub hash: Option<String>,
    pub tx_id: String,
    /// Mapping from user tempids to allocated subject ids.
    pub tempids: BTreeMap<String, i64>,
    /// On success every flake of the sealed block; on rejection the
    /// transaction metadata flakes including `_tx/error`.
    pub flakes: Vec<Flake>,
}

impl TxResponse {
    fn rejected(tx_id: String, t: i64, err: &LedgerError) -> Self {
        let flakes = vec![
            Flake::new(t, ids::TX_ID, ObjectValue::Str(tx_id.clone()), t, true),
            Flake::new(
                t,
                ids::TX_ERROR,
                ObjectValue::Str(err.message().to_string()),
                t,
                true,
            ),
        ];
        TxResponse {
            status: err.status(),
            error: Some(err.kind().to_string()),
            message: Some(err.message().to_string()),
            block: None,
            hash: None,
            tx_id,
            tempids: BTreeMap::new(),
            flakes,
        }
    }
}

/// Executes commands against one ledger.
///
/// Generic over the storage backend and the spec-function runner, mirroring
/// how the rest of the node composes collaborators at startup.
pub struct Transactor<S, R> {
    storage: Arc<S>,
    specs: R,
    novelty_min: usize,
    novelty_max: usize,
}

impl<S, R> Transactor<S, R>
where
    S: Storage,
    R: SpecRunner,
{
    pub fn new(storage: Arc<S>, specs: R, novelty_min: usize, novelty_max: usize) -> Self {
        Self {
            storage,
            specs,
            novelty_min,
            novelty_max,
        }
    }

    /// Whether the indexer is eligible to flush novelty to segments.
    pub fn reindex_eligible(&self, ledger: &Ledger) -> bool {
        ledger
            .novelty
            .reindex_status(self.novelty_min, self.novelty_max)
            != crate::index::ReindexStatus::Idle
    }

    /// Executes one command.
    ///
    /// Rejections (bad input, failed validation) come back as an `Ok`
    /// response with `status >= 400` and a recorded `_tx/error` flake;
    /// transient and infrastructure failures (back-pressure, storage)
    /// surface as `Err` for the consensus layer to retry or report.
    pub async fn transact(
        &self,
        ledger: &mut Ledger,
        cmd: &SignedCommand,
        instant_ms: i64,
    ) -> Result<TxResponse, LedgerError> {
        use crate::index::ReindexStatus;
        if ledger.novelty.reindex_status(self.novelty_min, self.novelty_max)
            == ReindexStatus::AtMax
        {
            return Err(LedgerError::Overloaded(format!(
                "novelty at {} bytes exceeds the hard reindex threshold",
                ledger.novelty.size()
            )));
        }

        let tx_id = cmd.tx_id();
        let t = ledger.t - 1;
        match self.apply(ledger, cmd, &tx_id, instant_ms).await {
            Ok(response) => Ok(response),
            Err(err) if err.status() == 400 => {
                tracing::info!(tx_id = %tx_id, error = %err, "transaction rejected");
                Ok(TxResponse::rejected(tx_id, t, &err))
            }
            Err(err) => Err(err),
        }
    }

    async fn apply(
        &self,
        ledger: &mut Ledger,
        cmd: &SignedCommand,
        tx_id: &str,
        instant_ms: i64,
    ) -> Result<TxResponse, LedgerError> {
        // 1. Parse & sign-check.
        let envelope = parse_command(&cmd.cmd)?;
        if envelope.kind != "tx" {
            return Err(LedgerError::InvalidTx(format!(
                "unsupported command type {:?}",
                envelope.kind
            )));
        }
        if let Some(expire) = envelope.expire {
            if instant_ms > expire {
                return Err(LedgerError::InvalidTx("command expired".to_string()));
            }
        }
        if let Some(db) = &envelope.db {
            let ledger_id = ledger.ledger_id();
            if db != &ledger_id {
                return Err(LedgerError::InvalidTx(format!(
                    "command targets ledger {db:?}, this ledger is {ledger_id:?}"
                )));
            }
        }
        let auth_id = crypto::recover_auth_id(cmd.cmd.as_bytes(), &cmd.sig)?;
        if let Some(declared) = &envelope.auth {
            if declared != &auth_id {
                return Err(LedgerError::InvalidTx(format!(
                    "signature recovers {auth_id}, command declares {declared}"
                )));
            }
        }

        // All mutation below happens on the staged clone; the real ledger
        // only advances after the block is persisted.
        let mut staged = ledger.clone();
        let schema = staged.schema.clone();

        let auth_sid = staged
            .find_unique_subject(ids::AUTH_ID, &ObjectValue::Str(auth_id.clone()))
            .ok_or_else(|| LedgerError::InvalidTx(format!("unknown auth {auth_id}")))?;

        // 2. Assign t.
        let t = staged.t - 1;

        // 3. Materialize flakes.
        let statements = parse_statements(&envelope.tx)?;
        let mut materializer = Materializer {
            schema: &schema,
            staged: &mut staged,
            t,
            tempids: BTreeMap::new(),
            new_tags: HashMap::new(),
            flakes: Vec::new(),
        };
        materializer.run(&statements)?;
        let Materializer {
            tempids,
            mut flakes,
            ..
        } = materializer;

        // Implicit single-cardinality retractions can duplicate explicit
        // ones; the flake multiset is a set per (s, p, o, t, op).
        flakes.sort_by(|a, b| SortOrder::Spot.compare(a, b));
        flakes.dedup();

        // 4.–5. Gather schema c-spec and validate.
        let validation = SchemaValidator::new(&schema).validate(&flakes);
        if let Some(first) = validation.errors.into_iter().next() {
            return Err(first);
        }

        let db_after = Arc::new(schema.apply_flakes(&flakes));
        let remove_from_post = recheck_remove_from_post(validation.remove_from_post, &db_after);

        // 7. Delegated spec functions run on the db-after view.
        self.specs.run_specs(&flakes, &db_after)?;

        // Transaction metadata flakes.
        flakes.push(Flake::new(t, ids::TX_ID, ObjectValue::Str(tx_id.to_string()), t, true));
        flakes.push(Flake::new(t, ids::TX_AUTH, ObjectValue::Ref(auth_sid), t, true));
        flakes.push(Flake::new(
            t,
            ids::TX_NONCE,
            ObjectValue::Long(envelope.nonce as i64),
            t,
            true,
        ));

        // 6. + 8. Absorb into novelty and seal the block.
        let tx = Transaction {
            id: tx_id.to_string(),
            auth: auth_id.clone(),
            nonce: envelope.nonce,
            command: cmd.cmd.clone(),
            signature: cmd.sig.clone(),
            t,
            flakes: flakes.clone(),
        };
        let block = BlockBuilder::seal(
            staged.block,
            &staged.block_hash,
            instant_ms,
            vec![tx],
            staged.auth_sid,
            &staged.auth_id,
        );

        let added = staged.novelty.absorb(&block.flakes, &db_after);
        for pid in &remove_from_post {
            staged.novelty.remove_from_post(*pid);
        }
        staged.stats.flakes += block.flakes.len() as u64;
        staged.stats.size += added as u64;
        staged.schema = db_after;
        staged.t = block.t;
        staged.block = block.number;
        staged.block_hash = block.hash.clone();

        // Persist before anything becomes visible to readers.
        let key = storage::block_key(&staged.network, &staged.dbid, block.number);
        let bytes = block.canonical_bytes();
        storage::with_retries(storage::DEFAULT_RETRY_BUDGET, || {
            self.storage.write(&key, &bytes)
        })
        .await?;

        // Commit.
        *ledger = staged;
        tracing::info!(
            block = block.number,
            hash = %block.hash,
            flakes = block.flakes.len(),
            "sealed block"
        );

        Ok(TxResponse {
            status: 200,
            error: None,
            message: None,
            block: Some(block.number),
            hash: Some(block.hash.clone()),
            tx_id: tx_id.to_string(),
            tempids,
            flakes: block.flakes,
        })
    }
}

/// Walks the statement graph, resolving names to ids through the schema
/// cache, minting new subject ids via `ecount`, and coercing literals to
/// the declared predicate types.
struct Materializer<'a> {
    schema: &'a Arc<Schema>,
    staged: &'a mut Ledger,
    t: i64,
    tempids: BTreeMap<String, i64>,
    new_tags: HashMap<String, i64>,
    flakes: Vec<Flake>,
}

impl Materializer<'_> {
    fn run(&mut self, statements: &[Statement]) -> Result<(), LedgerError> {
        // First pass: mint one subject id per distinct tempid.
        for st in statements {
            if let SubjectRef::TempId(tempid) = &st.subject {
                if self.tempids.contains_key(tempid) {
                    continue;
                }
                let coll_name = st.subject.tempid_collection().unwrap_or_default();
                let collection = self
                    .schema
                    .collection_by_name(coll_name)
                    .ok_or_else(|| {
                        LedgerError::InvalidCollection(format!(
                            "unknown collection {coll_name:?} in tempid {tempid:?}"
                        ))
                    })?;
                let sid = self.staged.mint_subject(collection.id);
                self.tempids.insert(tempid.clone(), sid);
            }
        }

        // Second pass: emit flakes.
        for st in statements {
            self.materialize_statement(st)?;
        }
        Ok(())
    }

    fn materialize_statement(&mut self, st: &Statement) -> Result<(), LedgerError> {
        let (s, coll_name) = match &st.subject {
            SubjectRef::TempId(tempid) => (
                self.tempids[tempid],
                st.subject.tempid_collection().unwrap_or_default().to_string(),
            ),
            SubjectRef::Existing(sid) => {
                if *sid < 0 {
                    return Err(LedgerError::InvalidTx(
                        "transaction and block metadata subjects are read-only".to_string(),
                    ));
                }
                let name = self
                    .schema
                    .collection(subject_collection(*sid))
                    .map(|c| c.name.clone())
                    .ok_or_else(|| {
                        LedgerError::InvalidTx(format!("subject {sid} has no known collection"))
                    })?;
                (*sid, name)
            }
        };

        for (key, value) in &st.attrs {
            let pname = if key.contains('/') {
                key.clone()
            } else {
                format!("{coll_name}/{key}")
            };
            let pred = self
                .schema
                .predicate_by_name(&pname)
                .cloned()
                .ok_or_else(|| {
                    LedgerError::InvalidPredicate(format!("unknown predicate {pname:?}"))
                })?;

            let values: Vec<&serde_json::Value> = match value {
                serde_json::Value::Array(items) if pred.multi => items.iter().collect(),
                serde_json::Value::Array(_) => {
                    return Err(LedgerError::InvalidPredicate(format!(
                        "predicate {pname} is not multi-valued"
                    )));
                }
                single => vec![single],
            };

            for v in values {
                let o = self.resolve_object(&pred, v)?;
                match st.action {
                    StatementAction::Retract => {
                        self.flakes.push(Flake::new(s, pred.id, o, self.t, false));
                    }
                    StatementAction::Assert => self.assert_value(s, &pred, o)?,
                }
            }
        }
        Ok(())
    }

    fn assert_value(&mut self, s: i64, pred: &Predicate, o: ObjectValue) -> Result<(), LedgerError> {
        if !pred.multi {
            // Single-cardinality: retract whatever is live so at most one
            // object survives per subject at this t.
            let live = self.staged.novelty.live_objects(s, pred.id, self.staged.t);
            if live.contains(&o) {
                return Ok(());
            }
            for old in live {
                self.flakes.push(Flake::new(s, pred.id, old, self.t, false));
            }
        }
        if pred.unique {
            if let Some(other) = self.staged.find_unique_subject(pred.id, &o) {
                if other != s {
                    return Err(LedgerError::InvalidTx(format!(
                        "unique value conflict on {}: already asserted by subject {other}",
                        pred.name
                    )));
                }
            }
        }
        self.flakes.push(Flake::new(s, pred.id, o, self.t, true));
        Ok(())
    }

    fn resolve_object(
        &mut self,
        pred: &Predicate,
        value: &serde_json::Value,
    ) -> Result<ObjectValue, LedgerError> {
        match pred.ptype {
            PredicateType::Ref => {
                let target = match value {
                    serde_json::Value::Number(n) => n.as_i64().ok_or_else(|| {
                        LedgerError::InvalidTx(format!("bad subject id {n} for {}", pred.name))
                    })?,
                    serde_json::Value::String(tempid) => {
                        *self.tempids.get(tempid).ok_or_else(|| {
                            LedgerError::InvalidTx(format!(
                                "unresolved reference {tempid:?} for {}",
                                pred.name
                            ))
                        })?
                    }
                    other => {
                        return Err(LedgerError::InvalidTx(format!(
                            "cannot use {other} as a reference for {}",
                            pred.name
                        )));
                    }
                };
                if target >= 0 {
                    if let Some(required) = &pred.restrict_collection {
                        let actual = self
                            .schema
                            .collection(subject_collection(target))
                            .map(|c| c.name.as_str());
                        if actual != Some(required.as_str()) {
                            return Err(LedgerError::InvalidTx(format!(
                                "{} references must point at collection {required}",
                                pred.name
                            )));
                        }
                    }
                }
                Ok(ObjectValue::Ref(target))
            }
            PredicateType::Tag => match value {
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .map(ObjectValue::Ref)
                    .ok_or_else(|| LedgerError::InvalidTx(format!("bad tag id {n}"))),
                serde_json::Value::String(v) => {
                    let full = format!("{}:{}", pred.name, v);
                    let known = self
                        .schema
                        .tag_sid(&full)
                        .or_else(|| self.new_tags.get(&full).copied());
                    let sid = match known {
                        Some(sid) => sid,
                        None => {
                            // Unknown tag values mint a fresh _tag subject.
                            let sid = self.staged.mint_subject(ids::TAG_CID);
                            self.flakes.push(Flake::new(
                                sid,
                                ids::TAG_ID,
                                ObjectValue::Str(full.clone()),
                                self.t,
                                true,
                            ));
                            self.new_tags.insert(full, sid);
                            sid
                        }
                    };
                    Ok(ObjectValue::Ref(sid))
                }
                other => Err(LedgerError::InvalidTx(format!(
                    "cannot use {other} as a tag value for {}",
                    pred.name
                ))),
            },
            _ => pred
                .ptype
                .coerce(value)
                .map_err(LedgerError::InvalidTx),
        }
    }
}

// The integration-flavored tests for the full pipeline live here, next to
// the code they exercise, in the same style as the rest of the crate.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::program;
    use crate::storage::MemoryStorage;
    use crate::validation::ApproveAllSpecs;
    use serde_json::json;

    const SECRET: [u8; 32] = [7u8; 32];
    const GENESIS_CMD: &str =
        r#"{"type":"new-db","db":"net/db","auth":"0xabc","nonce":1000,"expire":1000300000}"#;

    fn genesis_ledger() -> Ledger {
        let sig = crypto::sign_recoverable(&SECRET, GENESIS_CMD.as_bytes()).unwrap();
        let (ledger, _) = Ledger::genesis("net", "db", GENESIS_CMD, &sig, 1000).unwrap();
        ledger
    }

    fn transactor() -> Transactor<MemoryStorage, ApproveAllSpecs> {
        Transactor::new(
            Arc::new(MemoryStorage::new()),
            ApproveAllSpecs,
            1_000_000,
            10_000_000,
        )
    }

    fn signed(tx: serde_json::Value, nonce: u64) -> SignedCommand {
        signed_by(&SECRET, tx, nonce)
    }

    fn signed_by(secret: &[u8; 32], tx: serde_json::Value, nonce: u64) -> SignedCommand {
        let cmd = json!({"type": "tx", "db": "net/db", "tx": tx, "nonce": nonce}).to_string();
        let sig = crypto::sign_recoverable(secret, cmd.as_bytes()).unwrap();
        SignedCommand::new(cmd, sig)
    }

    async fn declare_predicate(
        ledger: &mut Ledger,
        txr: &Transactor<MemoryStorage, ApproveAllSpecs>,
        body: serde_json::Value,
    ) -> (TxResponse, i64) {
        let response = txr
            .transact(ledger, &signed(json!([body]), 1), 2000)
            .await
            .expect("transact");
        assert_eq!(response.status, 200, "{:?}", response.message);
        let pid = *response.tempids.values().next().expect("tempid allocated");
        (response, pid)
    }

    #[tokio::test]
    async fn new_predicate_seals_a_chained_block() {
        let mut ledger = genesis_ledger();
        let txr = transactor();
        let genesis_hash = ledger.block_hash.clone();

        let (response, pid) = declare_predicate(
            &mut ledger,
            &txr,
            json!({"_id": "_predicate$xy", "name": "x/y", "type": "int"}),
        )
        .await;

        assert_eq!(response.block, Some(2));
        assert_eq!(ledger.block, 2);
        assert_eq!(ledger.t, -4);
        assert_eq!(pid, ids::MAX_BOOTSTRAP_PID + 1);

        // The schema cache published at commit resolves the new predicate.
        let pred = ledger.schema.predicate_by_name("x/y").expect("in schema");
        assert_eq!(pred.ptype, PredicateType::Int);

        // The block persisted, chains to genesis, and verifies.
        let key = storage::block_key("net", "db", 2);
        let bytes = txr.storage.read(&key).await.unwrap().expect("persisted");
        let block = crate::types::Block::decode(&bytes).expect("decodes");
        assert_eq!(block.prev_hash.as_deref(), Some(genesis_hash.as_str()));
        assert!(block.verify_hash());
    }

    #[tokio::test]
    async fn legal_type_change_lands_both_flakes() {
        let mut ledger = genesis_ledger();
        let txr = transactor();
        let (_, pid) = declare_predicate(
            &mut ledger,
            &txr,
            json!({"_id": "_predicate$xy", "name": "x/y", "type": "int"}),
        )
        .await;

        let change = signed(
            json!([
                {"_id": pid, "_action": "delete", "type": "int"},
                {"_id": pid, "type": "long"}
            ]),
            2,
        );
        let response = txr.transact(&mut ledger, &change, 3000).await.unwrap();
        assert_eq!(response.status, 200, "{:?}", response.message);

        // Novelty holds the retraction and the assertion; the live view at
        // the new t resolves to long.
        let int_tag = program::tag_sid("_predicate/type:int").unwrap();
        let long_tag = program::tag_sid("_predicate/type:long").unwrap();
        assert!(response.flakes.iter().any(|f| {
            f.p == ids::PREDICATE_TYPE && !f.op && f.o == ObjectValue::Ref(int_tag)
        }));
        assert_eq!(
            ledger.novelty.live_objects(pid, ids::PREDICATE_TYPE, ledger.t),
            vec![ObjectValue::Ref(long_tag)]
        );
        assert_eq!(
            ledger.schema.predicate_by_name("x/y").unwrap().ptype,
            PredicateType::Long
        );
    }

    #[tokio::test]
    async fn illegal_type_change_is_rejected_without_side_effects() {
        let mut ledger = genesis_ledger();
        let txr = transactor();
        let (_, pid) = declare_predicate(
            &mut ledger,
            &txr,
            json!({"_id": "_predicate$xy", "name": "x/y", "type": "int"}),
        )
        .await;

        let novelty_before = ledger.novelty.len();
        let block_before = ledger.block;

        let change = signed(
            json!([
                {"_id": pid, "_action": "delete", "type": "int"},
                {"_id": pid, "type": "boolean"}
            ]),
            2,
        );
        let response = txr.transact(&mut ledger, &change, 3000).await.unwrap();

        assert_eq!(response.status, 400);
        assert_eq!(response.error.as_deref(), Some("invalid-tx"));
        assert!(response.message.as_deref().unwrap().contains("illegal type change"));
        assert!(response.flakes.iter().any(|f| f.p == ids::TX_ERROR));

        // Novelty unchanged, block not advanced.
        assert_eq!(ledger.novelty.len(), novelty_before);
        assert_eq!(ledger.block, block_before);
    }

    #[tokio::test]
    async fn unique_on_existing_predicate_suggests_migration() {
        let mut ledger = genesis_ledger();
        let txr = transactor();
        let (_, pid) = declare_predicate(
            &mut ledger,
            &txr,
            json!({"_id": "_predicate$xy", "name": "x/y", "type": "string"}),
        )
        .await;

        let change = signed(json!([{"_id": pid, "unique": true}]), 2);
        let response = txr.transact(&mut ledger, &change, 3000).await.unwrap();

        assert_eq!(response.status, 400);
        assert_eq!(response.error.as_deref(), Some("invalid-tx"));
        assert!(response.message.as_deref().unwrap().contains("migrate"));
    }

    #[tokio::test]
    async fn component_requires_ref_type_on_new_predicates() {
        let mut ledger = genesis_ledger();
        let txr = transactor();

        let ok = txr
            .transact(
                &mut ledger,
                &signed(
                    json!([{"_id": "_predicate$child", "name": "x/child", "type": "ref", "component": true}]),
                    1,
                ),
                2000,
            )
            .await
            .unwrap();
        assert_eq!(ok.status, 200, "{:?}", ok.message);

        let bad = txr
            .transact(
                &mut ledger,
                &signed(
                    json!([{"_id": "_predicate$label", "name": "x/label", "type": "string", "component": true}]),
                    2,
                ),
                3000,
            )
            .await
            .unwrap();
        assert_eq!(bad.status, 400);
        assert_eq!(bad.error.as_deref(), Some("invalid-predicate"));
    }

    #[tokio::test]
    async fn retracting_unique_keeps_post_while_index_remains() {
        let mut ledger = genesis_ledger();
        let txr = transactor();
        let (_, pid) = declare_predicate(
            &mut ledger,
            &txr,
            json!({"_id": "_predicate$xy", "name": "x/y", "type": "string", "index": true, "unique": true}),
        )
        .await;

        let change = signed(json!([{"_id": pid, "_action": "delete", "unique": true}]), 2);
        let response = txr.transact(&mut ledger, &change, 3000).await.unwrap();
        assert_eq!(response.status, 200, "{:?}", response.message);

        // index=true still holds, so the db-after recheck kept the
        // predicate's flakes in post.
        let post_flakes = ledger
            .novelty
            .range(
                SortOrder::Post,
                &Flake::min_for_subject(i64::MIN),
                &Flake::max_for_subject(i64::MAX),
            )
            .filter(|f| f.s == pid)
            .count();
        assert!(post_flakes > 0);
    }

    #[tokio::test]
    async fn duplicate_unique_value_is_rejected() {
        let mut ledger = genesis_ledger();
        let txr = transactor();

        // _tag/id is unique; re-asserting an existing tag id from a new
        // subject must conflict.
        let response = txr
            .transact(
                &mut ledger,
                &signed(json!([{"_id": "_tag", "id": "_predicate/type:string"}]), 1),
                2000,
            )
            .await
            .unwrap();
        assert_eq!(response.status, 400);
        assert!(response.message.as_deref().unwrap().contains("unique value conflict"));
    }

    #[tokio::test]
    async fn unknown_signer_is_rejected() {
        let mut ledger = genesis_ledger();
        let txr = transactor();

        let stranger = [42u8; 32];
        let cmd = signed_by(
            &stranger,
            json!([{"_id": "_predicate$xy", "name": "x/y", "type": "int"}]),
            1,
        );
        let response = txr.transact(&mut ledger, &cmd, 2000).await.unwrap();
        assert_eq!(response.status, 400);
        assert!(response.message.as_deref().unwrap().contains("unknown auth"));
    }

    #[tokio::test]
    async fn back_pressure_rejects_with_a_transient_error() {
        let mut ledger = genesis_ledger();
        // Hard threshold below the genesis novelty size.
        let txr: Transactor<MemoryStorage, ApproveAllSpecs> =
            Transactor::new(Arc::new(MemoryStorage::new()), ApproveAllSpecs, 1, 2);

        let cmd = signed(json!([{"_id": "_predicate$xy", "name": "x/y", "type": "int"}]), 1);
        let err = txr.transact(&mut ledger, &cmd, 2000).await.unwrap_err();
        assert_eq!(err.kind(), "overloaded");
    }

    #[tokio::test]
    async fn expired_commands_are_rejected() {
        let mut ledger = genesis_ledger();
        let txr = transactor();

        let cmd_json = json!({
            "type": "tx",
            "db": "net/db",
            "tx": [{"_id": "_predicate$xy", "name": "x/y", "type": "int"}],
            "nonce": 1,
            "expire": 1000
        })
        .to_string();
        let sig = crypto::sign_recoverable(&SECRET, cmd_json.as_bytes()).unwrap();
        let response = txr
            .transact(&mut ledger, &SignedCommand::new(cmd_json, sig), 5000)
            .await
            .unwrap();
        assert_eq!(response.status, 400);
        assert!(response.message.as_deref().unwrap().contains("expired"));
    }
}
