//! The fixed bootstrap program: the meta-schema as data.
//!
//! The program is an ordered list of collection, tag, and predicate
//! definitions with explicit stable ids (see [`super::ids`]). Everything
//! derived here — lookup tables, the base schema view, the initial
//! `ecount` — is a pure function of these tables.

use std::collections::BTreeMap;

use super::ids;
use crate::types::{
    Collection, PREDICATE_CID, Predicate, PredicateType, Schema, subject_id,
};

pub struct CollectionDef {
    pub id: u32,
    pub name: &'static str,
    pub doc: &'static str,
}

pub struct PredicateDef {
    pub id: i64,
    pub name: &'static str,
    pub ptype: PredicateType,
    pub multi: bool,
    pub unique: bool,
    pub index: bool,
    pub upsert: bool,
    pub component: bool,
    pub restrict_collection: Option<&'static str>,
    pub restrict_tag: bool,
    pub doc: &'static str,
}

pub struct TagDef {
    pub counter: u64,
    pub id: String,
}

fn coll(id: u32, name: &'static str, doc: &'static str) -> CollectionDef {
    CollectionDef { id, name, doc }
}

fn pred(id: i64, name: &'static str, ptype: PredicateType) -> PredicateDef {
    PredicateDef {
        id,
        name,
        ptype,
        multi: false,
        unique: false,
        index: false,
        upsert: false,
        component: false,
        restrict_collection: None,
        restrict_tag: false,
        doc: "",
    }
}

/// System collections, in definition order.
pub fn collections() -> Vec<CollectionDef> {
    vec![
        coll(PREDICATE_CID, "_predicate", "Schema predicate definitions."),
        coll(ids::COLLECTION_CID, "_collection", "Schema collections."),
        coll(ids::SHARD_CID, "_shard", "Ledger shards."),
        coll(ids::TAG_CID, "_tag", "Enumerated tag values."),
        coll(ids::FN_CID, "_fn", "Database functions."),
        coll(ids::USER_CID, "_user", "Users."),
        coll(ids::AUTH_CID, "_auth", "Authority records."),
        coll(ids::ROLE_CID, "_role", "Roles grouping permission rules."),
        coll(ids::RULE_CID, "_rule", "Permission rules."),
        coll(ids::SETTING_CID, "_setting", "Ledger settings."),
        coll(ids::TX_CID, "_tx", "Transaction metadata."),
        coll(ids::BLOCK_CID, "_block", "Block metadata."),
    ]
}

/// System predicates, in definition order.
pub fn predicates() -> Vec<PredicateDef> {
    use PredicateType::*;
    vec![
        PredicateDef { unique: true, ..pred(ids::PREDICATE_NAME, "_predicate/name", String) },
        pred(ids::PREDICATE_DOC, "_predicate/doc", String),
        PredicateDef { restrict_tag: true, ..pred(ids::PREDICATE_TYPE, "_predicate/type", Tag) },
        pred(ids::PREDICATE_UNIQUE, "_predicate/unique", Boolean),
        pred(ids::PREDICATE_MULTI, "_predicate/multi", Boolean),
        pred(ids::PREDICATE_INDEX, "_predicate/index", Boolean),
        pred(ids::PREDICATE_UPSERT, "_predicate/upsert", Boolean),
        pred(ids::PREDICATE_COMPONENT, "_predicate/component", Boolean),
        pred(ids::PREDICATE_NO_HISTORY, "_predicate/noHistory", Boolean),
        pred(
            ids::PREDICATE_RESTRICT_COLLECTION,
            "_predicate/restrictCollection",
            String,
        ),
        PredicateDef {
            multi: true,
            restrict_collection: Some("_fn"),
            ..pred(ids::PREDICATE_SPEC, "_predicate/spec", Ref)
        },
        pred(ids::PREDICATE_SPEC_DOC, "_predicate/specDoc", String),
        PredicateDef {
            multi: true,
            restrict_collection: Some("_fn"),
            ..pred(ids::PREDICATE_TX_SPEC, "_predicate/txSpec", Ref)
        },
        pred(ids::PREDICATE_TX_SPEC_DOC, "_predicate/txSpecDoc", String),
        pred(ids::PREDICATE_RESTRICT_TAG, "_predicate/restrictTag", Boolean),
        pred(ids::PREDICATE_FULL_TEXT, "_predicate/fullText", Boolean),
        pred(ids::PREDICATE_ENCRYPTED, "_predicate/encrypted", Boolean),
        pred(ids::PREDICATE_DEPRECATED, "_predicate/deprecated", Boolean),
        //
        PredicateDef { unique: true, ..pred(ids::COLLECTION_NAME, "_collection/name", String) },
        pred(ids::COLLECTION_DOC, "_collection/doc", String),
        pred(ids::COLLECTION_VERSION, "_collection/version", String),
        PredicateDef {
            multi: true,
            restrict_collection: Some("_fn"),
            ..pred(ids::COLLECTION_SPEC, "_collection/spec", Ref)
        },
        pred(ids::COLLECTION_SPEC_DOC, "_collection/specDoc", String),
        PredicateDef {
            restrict_collection: Some("_shard"),
            ..pred(ids::COLLECTION_SHARD, "_collection/shard", Ref)
        },
        //
        PredicateDef { unique: true, upsert: true, ..pred(ids::TAG_ID, "_tag/id", String) },
        pred(ids::TAG_DOC, "_tag/doc", String),
        //
        PredicateDef { unique: true, ..pred(ids::FN_NAME, "_fn/name", String) },
        PredicateDef { multi: true, ..pred(ids::FN_PARAMS, "_fn/params", String) },
        pred(ids::FN_CODE, "_fn/code", String),
        pred(ids::FN_DOC, "_fn/doc", String),
        //
        PredicateDef { unique: true, ..pred(ids::AUTH_ID, "_auth/id", String) },
        pred(ids::AUTH_DOC, "_auth/doc", String),
        PredicateDef {
            multi: true,
            restrict_collection: Some("_role"),
            ..pred(ids::AUTH_ROLES, "_auth/roles", Ref)
        },
        //
        PredicateDef { unique: true, ..pred(ids::ROLE_ID, "_role/id", String) },
        pred(ids::ROLE_DOC, "_role/doc", String),
        PredicateDef {
            multi: true,
            restrict_collection: Some("_rule"),
            ..pred(ids::ROLE_RULES, "_role/rules", Ref)
        },
        //
        PredicateDef { unique: true, ..pred(ids::RULE_ID, "_rule/id", String) },
        pred(ids::RULE_DOC, "_rule/doc", String),
        pred(ids::RULE_COLLECTION, "_rule/collection", String),
        PredicateDef { multi: true, ..pred(ids::RULE_PREDICATES, "_rule/predicates", String) },
        PredicateDef {
            multi: true,
            restrict_collection: Some("_fn"),
            ..pred(ids::RULE_FNS, "_rule/fns", Ref)
        },
        PredicateDef { multi: true, restrict_tag: true, ..pred(ids::RULE_OPS, "_rule/ops", Tag) },
        pred(ids::RULE_COLLECTION_DEFAULT, "_rule/collectionDefault", Boolean),
        //
        PredicateDef { unique: true, ..pred(ids::SETTING_ID, "_setting/id", String) },
        pred(ids::SETTING_DOC, "_setting/doc", String),
        PredicateDef {
            restrict_collection: Some("_auth"),
            ..pred(ids::SETTING_ANONYMOUS, "_setting/anonymous", Ref)
        },
        PredicateDef {
            multi: true,
            restrict_collection: Some("_auth"),
            ..pred(ids::SETTING_LEDGERS, "_setting/ledgers", Ref)
        },
        PredicateDef { restrict_tag: true, ..pred(ids::SETTING_CONSENSUS, "_setting/consensus", Tag) },
        //
        PredicateDef { unique: true, ..pred(ids::SHARD_NAME, "_shard/name", String) },
        PredicateDef {
            multi: true,
            restrict_collection: Some("_auth"),
            ..pred(ids::SHARD_MINERS, "_shard/miners", Ref)
        },
        pred(ids::SHARD_MUTABLE, "_shard/mutable", Boolean),
        //
        PredicateDef { unique: true, ..pred(ids::USER_USERNAME, "_user/username", String) },
        PredicateDef {
            multi: true,
            restrict_collection: Some("_role"),
            ..pred(ids::USER_ROLES, "_user/roles", Ref)
        },
        PredicateDef {
            multi: true,
            restrict_collection: Some("_auth"),
            ..pred(ids::USER_AUTH, "_user/auth", Ref)
        },
        //
        PredicateDef { unique: true, ..pred(ids::TX_ID, "_tx/id", String) },
        PredicateDef {
            restrict_collection: Some("_auth"),
            ..pred(ids::TX_AUTH, "_tx/auth", Ref)
        },
        PredicateDef {
            restrict_collection: Some("_auth"),
            ..pred(ids::TX_AUTHORITY, "_tx/authority", Ref)
        },
        pred(ids::TX_NONCE, "_tx/nonce", Long),
        pred(ids::TX_ERROR, "_tx/error", String),
        //
        PredicateDef { unique: true, ..pred(ids::BLOCK_NUMBER, "_block/number", Long) },
        PredicateDef { unique: true, ..pred(ids::BLOCK_HASH, "_block/hash", String) },
        pred(ids::BLOCK_PREV_HASH, "_block/prevHash", String),
        PredicateDef { multi: true, ..pred(ids::BLOCK_TRANSACTIONS, "_block/transactions", Ref) },
        PredicateDef {
            multi: true,
            restrict_collection: Some("_auth"),
            ..pred(ids::BLOCK_LEDGERS, "_block/ledgers", Ref)
        },
        PredicateDef { index: true, ..pred(ids::BLOCK_INSTANT, "_block/instant", Instant) },
        PredicateDef { multi: true, ..pred(ids::BLOCK_SIGS, "_block/sigs", String) },
    ]
}

/// System tags, in definition order: one per predicate type, plus the rule
/// operation and consensus flavor enumerations.
pub fn tags() -> Vec<TagDef> {
    let mut out = Vec::new();
    let mut counter = 1;
    for t in PredicateType::all() {
        out.push(TagDef {
            counter,
            id: format!("_predicate/type:{}", t.tag_name()),
        });
        counter += 1;
    }
    for op in ["all", "query", "transact", "token"] {
        out.push(TagDef { counter, id: format!("_rule/ops:{op}") });
        counter += 1;
    }
    for c in ["raft", "in-memory"] {
        out.push(TagDef { counter, id: format!("_setting/consensus:{c}") });
        counter += 1;
    }
    out
}

/// Subject id of the tag carrying `full_id`, if the program defines it.
pub fn tag_sid(full_id: &str) -> Option<i64> {
    tags()
        .iter()
        .find(|t| t.id == full_id)
        .map(|t| subject_id(ids::TAG_CID, t.counter))
}

/// The materialized schema view the genesis block describes.
pub fn base_schema() -> Schema {
    let mut schema = Schema::default();
    for c in collections() {
        let mut collection = Collection::new(c.id, c.name);
        collection.doc = Some(c.doc.to_string());
        collection.version = Some("1".to_string());
        schema.insert_collection(collection);
    }
    for t in tags() {
        schema.insert_tag(&t.id, subject_id(ids::TAG_CID, t.counter));
    }
    for d in predicates() {
        let mut p = Predicate::new(d.id, d.name, d.ptype);
        p.multi = d.multi;
        p.unique = d.unique;
        p.index = d.index;
        p.upsert = d.upsert;
        p.component = d.component;
        p.restrict_collection = d.restrict_collection.map(str::to_string);
        p.restrict_tag = d.restrict_tag;
        if !d.doc.is_empty() {
            p.doc = Some(d.doc.to_string());
        }
        schema.insert_predicate(p);
    }
    schema
}

/// Initial per-collection high-water marks of issued sub-ids.
///
/// Counts everything the genesis block mints: the bootstrap tables plus the
/// master-authority subjects created in [`super::bootstrap`].
pub fn initial_ecount() -> BTreeMap<u32, u64> {
    let mut ecount: BTreeMap<u32, u64> = collections().iter().map(|c| (c.id, 0)).collect();
    ecount.insert(PREDICATE_CID, ids::MAX_BOOTSTRAP_PID as u64);
    ecount.insert(ids::COLLECTION_CID, ids::MAX_BOOTSTRAP_CID as u64);
    ecount.insert(
        ids::TAG_CID,
        tags().last().map(|t| t.counter).unwrap_or(0),
    );
    ecount.insert(ids::FN_CID, 2); // fn true, fn false
    ecount.insert(ids::AUTH_CID, 1); // master auth
    ecount.insert(ids::ROLE_CID, 1); // root role
    ecount.insert(ids::RULE_CID, 1); // root rule
    ecount.insert(ids::SETTING_CID, 1); // root setting
    ecount
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_ids_are_unique() {
        let colls = collections();
        let mut cids: Vec<u32> = colls.iter().map(|c| c.id).collect();
        cids.sort_unstable();
        cids.dedup();
        assert_eq!(cids.len(), colls.len());

        let preds = predicates();
        let mut pids: Vec<i64> = preds.iter().map(|p| p.id).collect();
        pids.sort_unstable();
        pids.dedup();
        assert_eq!(pids.len(), preds.len());

        let tag_list = tags();
        let mut counters: Vec<u64> = tag_list.iter().map(|t| t.counter).collect();
        counters.sort_unstable();
        counters.dedup();
        assert_eq!(counters.len(), tag_list.len());
    }

    #[test]
    fn every_predicate_type_has_a_tag() {
        for t in PredicateType::all() {
            let full = format!("_predicate/type:{}", t.tag_name());
            assert!(tag_sid(&full).is_some(), "missing tag for {full}");
        }
    }

    #[test]
    fn base_schema_resolves_core_names() {
        let schema = base_schema();
        assert!(schema.predicate_by_name("_auth/id").is_some());
        assert!(schema.predicate_by_name("_block/hash").is_some());
        assert!(schema.collection_by_name("_predicate").is_some());
        assert_eq!(
            schema.predicate_by_name("_predicate/name").unwrap().id,
            ids::PREDICATE_NAME
        );
    }

    #[test]
    fn ecount_covers_every_bootstrap_collection() {
        let ecount = initial_ecount();
        for c in collections() {
            assert!(ecount.contains_key(&c.id), "missing ecount for {}", c.name);
        }
        assert_eq!(ecount[&crate::types::PREDICATE_CID], ids::MAX_BOOTSTRAP_PID as u64);
    }
}
