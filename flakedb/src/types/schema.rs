//! Schema model: collections, predicates, tags, and the schema cache.
//!
//! The schema is itself data — every collection and predicate is a subject
//! in the `_collection` / `_predicate` system collections — but the
//! transactor keeps a materialized, copy-on-write [`Schema`] view so that
//! name resolution and index routing never scan flakes. A new immutable
//! view is published at block commit.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{ObjectValue, PREDICATE_CID, subject_collection};
use crate::bootstrap::ids;

/// Declared value type of a predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateType {
    String,
    Int,
    Long,
    BigInt,
    Float,
    Double,
    BigDec,
    Instant,
    Boolean,
    Uri,
    Uuid,
    Bytes,
    Json,
    GeoJson,
    Ref,
    Tag,
}

impl PredicateType {
    /// Tag-value spelling of this type, as stored in `_tag/id` under
    /// `_predicate/type:<name>`.
    pub fn tag_name(self) -> &'static str {
        match self {
            PredicateType::String => "string",
            PredicateType::Int => "int",
            PredicateType::Long => "long",
            PredicateType::BigInt => "bigint",
            PredicateType::Float => "float",
            PredicateType::Double => "double",
            PredicateType::BigDec => "bigdec",
            PredicateType::Instant => "instant",
            PredicateType::Boolean => "boolean",
            PredicateType::Uri => "uri",
            PredicateType::Uuid => "uuid",
            PredicateType::Bytes => "bytes",
            PredicateType::Json => "json",
            PredicateType::GeoJson => "geojson",
            PredicateType::Ref => "ref",
            PredicateType::Tag => "tag",
        }
    }

    /// All declared types, in stable order.
    pub fn all() -> &'static [PredicateType] {
        use PredicateType::*;
        &[
            String, Int, Long, BigInt, Float, Double, BigDec, Instant, Boolean, Uri, Uuid, Bytes,
            Json, GeoJson, Ref, Tag,
        ]
    }

    pub fn from_tag_name(name: &str) -> Option<Self> {
        PredicateType::all()
            .iter()
            .copied()
            .find(|t| t.tag_name() == name)
    }

    /// Whether an existing predicate may change its declared type from
    /// `self` to `to`.
    ///
    /// The relation is the widening lattice: a change is legal only when
    /// every value written under the old type is representable under the
    /// new one.
    pub fn can_change_to(self, to: PredicateType) -> bool {
        use PredicateType::*;
        matches!(
            (to, self),
            (Long, Int | Instant)
                | (BigInt, Int | Long | Instant)
                | (Float, Int | Long)
                | (Double, Float | Int | Long)
                | (BigDec, Float | Double | Int | Long | BigInt)
                | (String, Json | GeoJson | Bytes | Uuid | Uri)
                | (Instant, Int | Long)
        )
    }

    /// Coerces a JSON literal into the object kind this type stores.
    ///
    /// Refs and tags accept a resolved subject id; tempid and name
    /// resolution happen in the transactor before coercion.
    pub fn coerce(self, value: &serde_json::Value) -> Result<ObjectValue, String> {
        use serde_json::Value;
        let fail = || format!("cannot coerce {value} to {}", self.tag_name());
        match self {
            PredicateType::String | PredicateType::Uri | PredicateType::Uuid => match value {
                Value::String(s) => Ok(ObjectValue::Str(s.clone())),
                _ => Err(fail()),
            },
            PredicateType::Json | PredicateType::GeoJson => {
                // Any JSON value is accepted and stored in serialized form.
                Ok(ObjectValue::Str(value.to_string()))
            }
            PredicateType::Int => match value.as_i64() {
                Some(n) if i32::try_from(n).is_ok() => Ok(ObjectValue::Long(n)),
                _ => Err(fail()),
            },
            PredicateType::Long => value.as_i64().map(ObjectValue::Long).ok_or_else(fail),
            PredicateType::BigInt => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => {
                    Ok(ObjectValue::BigInt(n.to_string()))
                }
                Value::String(s) if is_integer_literal(s) => Ok(ObjectValue::BigInt(s.clone())),
                _ => Err(fail()),
            },
            PredicateType::Float | PredicateType::Double => {
                value.as_f64().map(ObjectValue::Double).ok_or_else(fail)
            }
            PredicateType::BigDec => match value {
                Value::Number(n) => Ok(ObjectValue::BigDec(n.to_string())),
                Value::String(s) if s.parse::<f64>().is_ok() => Ok(ObjectValue::BigDec(s.clone())),
                _ => Err(fail()),
            },
            PredicateType::Instant => value.as_i64().map(ObjectValue::Instant).ok_or_else(fail),
            PredicateType::Boolean => value.as_bool().map(ObjectValue::Bool).ok_or_else(fail),
            PredicateType::Bytes => match value {
                Value::String(s) => hex::decode(s)
                    .map(ObjectValue::Bytes)
                    .map_err(|_| fail()),
                _ => Err(fail()),
            },
            PredicateType::Ref | PredicateType::Tag => {
                value.as_i64().map(ObjectValue::Ref).ok_or_else(fail)
            }
        }
    }
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Returns `true` if `name` is a legal collection name: first character
/// alphanumeric or underscore, the rest alphanumeric or `.`, `_`, `-`, at
/// most 255 characters total.
pub fn valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return false;
    }
    if name.len() > 255 {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

/// Returns `true` if `name` is a legal predicate name: `ns/local` where each
/// side is a legal collection name, and the full string contains none of the
/// reserved substrings `__`, `/_`, `_Via_`.
pub fn valid_predicate_name(name: &str) -> bool {
    let Some((ns, local)) = name.split_once('/') else {
        return false;
    };
    if !valid_collection_name(ns) || !valid_collection_name(local) {
        return false;
    }
    !(name.contains("__") || name.contains("/_") || name.contains("_Via_"))
}

/// A namespace of subject identifiers sharing a numeric prefix.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collection {
    pub id: u32,
    pub name: String,
    pub doc: Option<String>,
    pub version: Option<String>,
    /// Spec function refs (evaluation delegated).
    pub spec: Vec<i64>,
    pub spec_doc: Option<String>,
    pub shard: Option<i64>,
}

impl Collection {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            doc: None,
            version: None,
            spec: Vec::new(),
            spec_doc: None,
            shard: None,
        }
    }
}

/// A named, typed edge kind in the graph schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Predicate {
    pub id: i64,
    pub name: String,
    pub ptype: PredicateType,
    pub doc: Option<String>,
    pub multi: bool,
    pub unique: bool,
    pub index: bool,
    pub upsert: bool,
    pub component: bool,
    pub no_history: bool,
    pub restrict_collection: Option<String>,
    pub restrict_tag: bool,
    pub full_text: bool,
    pub spec: Vec<i64>,
    pub spec_doc: Option<String>,
    pub tx_spec: Vec<i64>,
    pub tx_spec_doc: Option<String>,
    pub encrypted: bool,
    pub deprecated: bool,
}

impl Predicate {
    pub fn new(id: i64, name: &str, ptype: PredicateType) -> Self {
        Self {
            id,
            name: name.to_string(),
            ptype,
            doc: None,
            multi: false,
            unique: false,
            index: false,
            upsert: false,
            component: false,
            no_history: false,
            restrict_collection: None,
            restrict_tag: false,
            full_text: false,
            spec: Vec::new(),
            spec_doc: None,
            tx_spec: Vec::new(),
            tx_spec_doc: None,
            encrypted: false,
            deprecated: false,
        }
    }

    /// Whether flakes of this predicate belong in the `post` projection.
    pub fn is_indexed(&self) -> bool {
        self.index || self.unique
    }

    /// Whether flakes of this predicate belong in the `opst` projection.
    pub fn is_ref(&self) -> bool {
        matches!(self.ptype, PredicateType::Ref | PredicateType::Tag)
    }
}

/// Materialized, immutable view of the schema at some `t`.
///
/// Published behind an `Arc` and replaced wholesale at block commit; readers
/// hold their snapshot for the lifetime of a query.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    collections: BTreeMap<u32, Collection>,
    collection_ids: HashMap<String, u32>,
    predicates: BTreeMap<i64, Predicate>,
    predicate_ids: HashMap<String, i64>,
    /// Full tag id (`"_predicate/type:string"`) to tag subject id.
    tags: HashMap<String, i64>,
    tag_names: HashMap<i64, String>,
}

impl Schema {
    pub fn insert_collection(&mut self, c: Collection) {
        self.collection_ids.insert(c.name.clone(), c.id);
        self.collections.insert(c.id, c);
    }

    pub fn insert_predicate(&mut self, p: Predicate) {
        self.predicate_ids.insert(p.name.clone(), p.id);
        self.predicates.insert(p.id, p);
    }

    pub fn insert_tag(&mut self, full_id: &str, sid: i64) {
        self.tags.insert(full_id.to_string(), sid);
        self.tag_names.insert(sid, full_id.to_string());
    }

    pub fn collection(&self, cid: u32) -> Option<&Collection> {
        self.collections.get(&cid)
    }

    pub fn collection_by_name(&self, name: &str) -> Option<&Collection> {
        self.collection_ids
            .get(name)
            .and_then(|cid| self.collections.get(cid))
    }

    pub fn predicate(&self, pid: i64) -> Option<&Predicate> {
        self.predicates.get(&pid)
    }

    pub fn predicate_by_name(&self, name: &str) -> Option<&Predicate> {
        self.predicate_ids
            .get(name)
            .and_then(|pid| self.predicates.get(pid))
    }

    pub fn tag_sid(&self, full_id: &str) -> Option<i64> {
        self.tags.get(full_id).copied()
    }

    pub fn tag_name(&self, sid: i64) -> Option<&str> {
        self.tag_names.get(&sid).map(String::as_str)
    }

    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.values()
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    /// Folds accepted transaction flakes into a successor schema view.
    ///
    /// Only flakes whose subject lives in the `_collection` or `_predicate`
    /// system collections (or that assert new tags) change the view; all
    /// others pass through untouched. The caller publishes the result at
    /// block commit.
    pub fn apply_flakes(&self, flakes: &[super::Flake]) -> Schema {
        let mut next = self.clone();
        for f in flakes {
            if f.s < 0 {
                continue;
            }
            match subject_collection(f.s) {
                PREDICATE_CID => next.apply_predicate_flake(f),
                ids::COLLECTION_CID => next.apply_collection_flake(f),
                ids::TAG_CID => {
                    if f.p == ids::TAG_ID && f.op {
                        if let ObjectValue::Str(full) = &f.o {
                            next.insert_tag(full, f.s);
                        }
                    }
                }
                _ => {}
            }
        }
        next
    }

    fn apply_predicate_flake(&mut self, f: &super::Flake) {
        use ObjectValue::*;
        // New predicate subjects appear on the first asserted name/type.
        let entry = self.predicates.entry(f.s).or_insert_with(|| {
            Predicate::new(f.s, "", PredicateType::String)
        });
        if f.op {
            match (f.p, &f.o) {
                (ids::PREDICATE_NAME, Str(name)) => {
                    entry.name = name.clone();
                    self.predicate_ids.insert(name.clone(), f.s);
                }
                (ids::PREDICATE_DOC, Str(doc)) => entry.doc = Some(doc.clone()),
                (ids::PREDICATE_TYPE, Ref(tag_sid)) => {
                    if let Some(t) = self
                        .tag_names
                        .get(tag_sid)
                        .and_then(|full| full.rsplit_once(':'))
                        .and_then(|(_, v)| PredicateType::from_tag_name(v))
                    {
                        entry.ptype = t;
                    }
                }
                (ids::PREDICATE_MULTI, Bool(v)) => entry.multi = *v,
                (ids::PREDICATE_UNIQUE, Bool(v)) => entry.unique = *v,
                (ids::PREDICATE_INDEX, Bool(v)) => entry.index = *v,
                (ids::PREDICATE_UPSERT, Bool(v)) => entry.upsert = *v,
                (ids::PREDICATE_COMPONENT, Bool(v)) => entry.component = *v,
                (ids::PREDICATE_NO_HISTORY, Bool(v)) => entry.no_history = *v,
                (ids::PREDICATE_RESTRICT_COLLECTION, Str(v)) => {
                    entry.restrict_collection = Some(v.clone())
                }
                (ids::PREDICATE_RESTRICT_TAG, Bool(v)) => entry.restrict_tag = *v,
                (ids::PREDICATE_FULL_TEXT, Bool(v)) => entry.full_text = *v,
                (ids::PREDICATE_SPEC, Ref(sid)) => entry.spec.push(*sid),
                (ids::PREDICATE_SPEC_DOC, Str(v)) => entry.spec_doc = Some(v.clone()),
                (ids::PREDICATE_TX_SPEC, Ref(sid)) => entry.tx_spec.push(*sid),
                (ids::PREDICATE_TX_SPEC_DOC, Str(v)) => entry.tx_spec_doc = Some(v.clone()),
                (ids::PREDICATE_ENCRYPTED, Bool(v)) => entry.encrypted = *v,
                (ids::PREDICATE_DEPRECATED, Bool(v)) => entry.deprecated = *v,
                _ => {}
            }
        } else {
            match (f.p, &f.o) {
                (ids::PREDICATE_MULTI, _) => entry.multi = false,
                (ids::PREDICATE_UNIQUE, _) => entry.unique = false,
                (ids::PREDICATE_INDEX, _) => entry.index = false,
                (ids::PREDICATE_UPSERT, _) => entry.upsert = false,
                (ids::PREDICATE_COMPONENT, _) => entry.component = false,
                (ids::PREDICATE_SPEC, Ref(sid)) => entry.spec.retain(|s| s != sid),
                (ids::PREDICATE_TX_SPEC, Ref(sid)) => entry.tx_spec.retain(|s| s != sid),
                // A type retraction alone is illegal; the validator
                // guarantees a replacement assertion exists in the same
                // transaction, which overwrites ptype above.
                _ => {}
            }
        }
    }

    fn apply_collection_flake(&mut self, f: &super::Flake) {
        use ObjectValue::*;
        let cid = super::subject_counter(f.s) as u32;
        let entry = self
            .collections
            .entry(cid)
            .or_insert_with(|| Collection::new(cid, ""));
        if f.op {
            match (f.p, &f.o) {
                (ids::COLLECTION_NAME, Str(name)) => {
                    entry.name = name.clone();
                    self.collection_ids.insert(name.clone(), cid);
                }
                (ids::COLLECTION_DOC, Str(doc)) => entry.doc = Some(doc.clone()),
                (ids::COLLECTION_VERSION, Str(v)) => entry.version = Some(v.clone()),
                (ids::COLLECTION_SPEC, Ref(sid)) => entry.spec.push(*sid),
                (ids::COLLECTION_SPEC_DOC, Str(v)) => entry.spec_doc = Some(v.clone()),
                (ids::COLLECTION_SHARD, Ref(sid)) => entry.shard = Some(*sid),
                _ => {}
            }
        } else if f.p == ids::COLLECTION_SPEC {
            if let Ref(sid) = &f.o {
                entry.spec.retain(|s| s != sid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_change_lattice_matches_the_table_exactly() {
        use PredicateType::*;
        let allowed: &[(PredicateType, PredicateType)] = &[
            (Int, Long),
            (Instant, Long),
            (Int, BigInt),
            (Long, BigInt),
            (Instant, BigInt),
            (Int, Float),
            (Long, Float),
            (Float, Double),
            (Int, Double),
            (Long, Double),
            (Float, BigDec),
            (Double, BigDec),
            (Int, BigDec),
            (Long, BigDec),
            (BigInt, BigDec),
            (Json, String),
            (GeoJson, String),
            (Bytes, String),
            (Uuid, String),
            (Uri, String),
            (Int, Instant),
            (Long, Instant),
        ];
        for &from in PredicateType::all() {
            for &to in PredicateType::all() {
                let expect = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_change_to(to),
                    expect,
                    "{} -> {}",
                    from.tag_name(),
                    to.tag_name()
                );
            }
        }
    }

    #[test]
    fn collection_names_validate() {
        assert!(valid_collection_name("person"));
        assert!(valid_collection_name("_predicate"));
        assert!(valid_collection_name("a.b-c_d"));
        assert!(!valid_collection_name(""));
        assert!(!valid_collection_name("-leading"));
        assert!(!valid_collection_name("has space"));
        assert!(!valid_collection_name(&"x".repeat(256)));
    }

    #[test]
    fn predicate_names_validate() {
        assert!(valid_predicate_name("person/name"));
        assert!(valid_predicate_name("x/y"));
        assert!(!valid_predicate_name("noslash"));
        assert!(!valid_predicate_name("a//b"));
        assert!(!valid_predicate_name("a/_b"));
        assert!(!valid_predicate_name("a__x/b"));
        assert!(!valid_predicate_name("a/b_Via_c"));
    }

    #[test]
    fn coercion_respects_declared_types() {
        use serde_json::json;
        assert_eq!(
            PredicateType::Long.coerce(&json!(7)).unwrap(),
            ObjectValue::Long(7)
        );
        assert_eq!(
            PredicateType::Boolean.coerce(&json!(true)).unwrap(),
            ObjectValue::Bool(true)
        );
        assert_eq!(
            PredicateType::Bytes.coerce(&json!("abcd")).unwrap(),
            ObjectValue::Bytes(vec![0xAB, 0xCD])
        );
        assert!(PredicateType::Long.coerce(&json!("seven")).is_err());
        assert!(PredicateType::Int.coerce(&json!(i64::MAX)).is_err());
    }
}
