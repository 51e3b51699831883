//! Genesis bootstrap: the deterministic construction of block 1.
//!
//! From a signed new-database command and a timestamp — and no prior state —
//! the bootstrap produces the block that defines the database's own schema.
//! Two bootstraps with the same `(cmd, sig, timestamp)` yield byte-identical
//! blocks; all ids embedded here are invariant across ledger instances.
//!
//! Any unresolved reference inside the program is a defect in the program
//! itself and aborts with a fatal error rather than producing a partial
//! genesis.

pub mod ids;
pub mod program;

use std::collections::BTreeMap;

use crate::crypto;
use crate::error::LedgerError;
use crate::types::{
    Block, Flake, ObjectValue, Schema, SortOrder, Transaction, subject_id,
};

/// Logical time of the genesis transaction flakes.
pub const GENESIS_TX_T: i64 = -1;
/// Logical time of the genesis block header flakes.
pub const GENESIS_BLOCK_T: i64 = -2;

/// Everything a fresh ledger needs from genesis.
#[derive(Debug)]
pub struct Genesis {
    pub block: Block,
    pub schema: Schema,
    pub ecount: BTreeMap<u32, u64>,
    /// Auth id of the master authority recovered from the command signature.
    pub auth_id: String,
}

fn defect(msg: String) -> LedgerError {
    LedgerError::Unexpected(format!("bootstrap program defect: {msg}"))
}

fn resolve_tag(full_id: &str) -> Result<i64, LedgerError> {
    program::tag_sid(full_id).ok_or_else(|| defect(format!("unresolved tag {full_id}")))
}

/// Builds the genesis block from a signed new-database command.
pub fn bootstrap(cmd: &str, sig: &str, timestamp_ms: i64) -> Result<Genesis, LedgerError> {
    let auth_id = crypto::recover_auth_id(cmd.as_bytes(), sig).map_err(|e| {
        LedgerError::Unexpected(format!("bootstrap: cannot derive master authority: {e}"))
    })?;

    let schema = program::base_schema();
    if schema.predicate_by_name("_auth/id").is_none() {
        return Err(defect("_auth/id predicate missing".to_string()));
    }

    let t = GENESIS_TX_T;
    let mut flakes: Vec<Flake> = Vec::new();
    let mut add = |s: i64, p: i64, o: ObjectValue| {
        flakes.push(Flake::new(s, p, o, t, true));
    };

    // Collection definitions.
    for c in program::collections() {
        let sid = subject_id(ids::COLLECTION_CID, c.id as u64);
        add(sid, ids::COLLECTION_NAME, ObjectValue::Str(c.name.to_string()));
        if !c.doc.is_empty() {
            add(sid, ids::COLLECTION_DOC, ObjectValue::Str(c.doc.to_string()));
        }
        add(sid, ids::COLLECTION_VERSION, ObjectValue::Str("1".to_string()));
    }

    // Tag definitions.
    for tag in program::tags() {
        let sid = subject_id(ids::TAG_CID, tag.counter);
        add(sid, ids::TAG_ID, ObjectValue::Str(tag.id.clone()));
    }

    // Predicate definitions. Types resolve through the tag table; specs and
    // shards would resolve through subject ids, but the bootstrap program
    // declares none.
    for p in program::predicates() {
        add(p.id, ids::PREDICATE_NAME, ObjectValue::Str(p.name.to_string()));
        let type_tag = resolve_tag(&format!("_predicate/type:{}", p.ptype.tag_name()))?;
        add(p.id, ids::PREDICATE_TYPE, ObjectValue::Ref(type_tag));
        if p.multi {
            add(p.id, ids::PREDICATE_MULTI, ObjectValue::Bool(true));
        }
        if p.unique {
            add(p.id, ids::PREDICATE_UNIQUE, ObjectValue::Bool(true));
        }
        if p.index {
            add(p.id, ids::PREDICATE_INDEX, ObjectValue::Bool(true));
        }
        if p.upsert {
            add(p.id, ids::PREDICATE_UPSERT, ObjectValue::Bool(true));
        }
        if p.component {
            add(p.id, ids::PREDICATE_COMPONENT, ObjectValue::Bool(true));
        }
        if p.restrict_tag {
            add(p.id, ids::PREDICATE_RESTRICT_TAG, ObjectValue::Bool(true));
        }
        if let Some(rc) = p.restrict_collection {
            add(
                p.id,
                ids::PREDICATE_RESTRICT_COLLECTION,
                ObjectValue::Str(rc.to_string()),
            );
        }
        if !p.doc.is_empty() {
            add(p.id, ids::PREDICATE_DOC, ObjectValue::Str(p.doc.to_string()));
        }
    }

    // Master authority graph: builtin fns, root rule/role, the recovered
    // auth, and the setting record tying ledger identity to it.
    let fn_true = subject_id(ids::FN_CID, 1);
    let fn_false = subject_id(ids::FN_CID, 2);
    let root_rule = subject_id(ids::RULE_CID, 1);
    let root_role = subject_id(ids::ROLE_CID, 1);
    let master_auth = subject_id(ids::AUTH_CID, 1);
    let root_setting = subject_id(ids::SETTING_CID, 1);

    add(fn_true, ids::FN_NAME, ObjectValue::Str("true".to_string()));
    add(fn_true, ids::FN_CODE, ObjectValue::Str("true".to_string()));
    add(fn_true, ids::FN_DOC, ObjectValue::Str("Always allows.".to_string()));
    add(fn_false, ids::FN_NAME, ObjectValue::Str("false".to_string()));
    add(fn_false, ids::FN_CODE, ObjectValue::Str("false".to_string()));
    add(fn_false, ids::FN_DOC, ObjectValue::Str("Always denies.".to_string()));

    add(root_rule, ids::RULE_ID, ObjectValue::Str("root".to_string()));
    add(root_rule, ids::RULE_COLLECTION, ObjectValue::Str("*".to_string()));
    add(root_rule, ids::RULE_PREDICATES, ObjectValue::Str("*".to_string()));
    add(root_rule, ids::RULE_FNS, ObjectValue::Ref(fn_true));
    let ops_all = resolve_tag("_rule/ops:all")?;
    add(root_rule, ids::RULE_OPS, ObjectValue::Ref(ops_all));

    add(root_role, ids::ROLE_ID, ObjectValue::Str("root".to_string()));
    add(root_role, ids::ROLE_RULES, ObjectValue::Ref(root_rule));

    add(master_auth, ids::AUTH_ID, ObjectValue::Str(auth_id.clone()));
    add(
        master_auth,
        ids::AUTH_DOC,
        ObjectValue::Str("Master authority.".to_string()),
    );
    add(master_auth, ids::AUTH_ROLES, ObjectValue::Ref(root_role));

    add(root_setting, ids::SETTING_ID, ObjectValue::Str("root".to_string()));
    add(root_setting, ids::SETTING_LEDGERS, ObjectValue::Ref(master_auth));

    // Transaction metadata at t=-1.
    let tx_id = crypto::sha3_256(cmd.as_bytes()).to_hex();
    add(GENESIS_TX_T, ids::TX_ID, ObjectValue::Str(tx_id.clone()));
    add(GENESIS_TX_T, ids::TX_NONCE, ObjectValue::Long(timestamp_ms));

    // Block metadata at t=-2.
    let bt = GENESIS_BLOCK_T;
    flakes.push(Flake::new(bt, ids::BLOCK_NUMBER, ObjectValue::Long(1), bt, true));
    flakes.push(Flake::new(bt, ids::BLOCK_INSTANT, ObjectValue::Instant(timestamp_ms), bt, true));
    flakes.push(Flake::new(bt, ids::BLOCK_TRANSACTIONS, ObjectValue::Ref(GENESIS_TX_T), bt, true));
    flakes.push(Flake::new(bt, ids::BLOCK_TRANSACTIONS, ObjectValue::Ref(GENESIS_TX_T), bt, true));

    // Hash over the spot-ordered canonical set, then the post-hash flakes.
    let hash = Block::compute_hash(&flakes);
    flakes.push(Flake::new(
        bt,
        ids::BLOCK_HASH,
        ObjectValue::Str(hash.to_hex()),
        bt,
        true,
    ));
    flakes.push(Flake::new(bt, ids::BLOCK_LEDGERS, ObjectValue::Ref(master_auth), bt, true));

    flakes.sort_by(|a, b| SortOrder::Spot.compare(a, b));

    let tx_flakes: Vec<Flake> = flakes.iter().filter(|f| f.t == GENESIS_TX_T).cloned().collect();
    let block = Block {
        number: 1,
        t: bt,
        instant: timestamp_ms,
        prev_hash: None,
        hash: hash.to_hex(),
        flakes,
        ledger_signatures: vec![auth_id.clone()],
        txs: vec![Transaction {
            id: tx_id,
            auth: auth_id.clone(),
            nonce: timestamp_ms as u64,
            command: cmd.to_string(),
            signature: sig.to_string(),
            t: GENESIS_TX_T,
            flakes: tx_flakes,
        }],
    };

    Ok(Genesis {
        block,
        schema,
        ecount: program::initial_ecount(),
        auth_id,
    })
}
