//! Schema mutation validator.
//!
//! When a transaction touches the `_predicate` or `_collection`
//! meta-collections, every mutated subject is checked against the type
//! lattice and the structural rules before the transaction may be admitted
//! to novelty. Failures are collected per transaction; the caller decides
//! what to do with them.
//!
//! Error kinds distinguish where the defect lives: an illegal *mutation* of
//! an existing predicate rejects the transaction (`invalid-tx`), while an
//! illegal *definition* of a new predicate is `invalid-predicate` and a bad
//! collection name is `invalid-collection`.

use std::collections::{HashMap, HashSet};

use crate::bootstrap::ids;
use crate::error::LedgerError;
use crate::types::schema::{valid_collection_name, valid_predicate_name};
use crate::types::{Flake, ObjectValue, PREDICATE_CID, PredicateType, Schema, subject_collection};

/// Outcome of validating one transaction's schema-touching flakes.
#[derive(Debug, Default)]
pub struct SchemaValidation {
    /// Collected violations; empty means the mutation set is legal.
    pub errors: Vec<LedgerError>,
    /// Predicate subjects whose `index`/`unique` flag turned off in this
    /// transaction. Re-checked against the db-after view: a predicate that
    /// is still indexable through the other flag is dropped from the set,
    /// the rest are scheduled for removal from the `post` projection.
    pub remove_from_post: HashSet<i64>,
}

/// Related flakes of one mutated predicate subject, partitioned by the
/// predicate they assert or retract.
#[derive(Default)]
struct PredicateGroup<'a> {
    ptype: Vec<&'a Flake>,
    multi: Vec<&'a Flake>,
    component: Vec<&'a Flake>,
    unique: Vec<&'a Flake>,
    index: Vec<&'a Flake>,
    name: Vec<&'a Flake>,
}

fn asserted_bool(flakes: &[&Flake]) -> Option<bool> {
    flakes.iter().rev().find_map(|f| match (&f.o, f.op) {
        (ObjectValue::Bool(v), true) => Some(*v),
        _ => None,
    })
}

fn retracts_true(flakes: &[&Flake]) -> bool {
    flakes
        .iter()
        .any(|f| !f.op && f.o == ObjectValue::Bool(true))
}

/// Validator over one transaction's flakes against the pre-transaction
/// schema view.
pub struct SchemaValidator<'a> {
    before: &'a Schema,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(before: &'a Schema) -> Self {
        Self { before }
    }

    /// Runs every check over the transaction's flakes.
    pub fn validate(&self, flakes: &[Flake]) -> SchemaValidation {
        let mut out = SchemaValidation::default();

        self.check_collection_names(flakes, &mut out);

        let groups = self.group_predicate_flakes(flakes);
        for (pid, group) in &groups {
            let existing = self
                .before
                .predicate(*pid)
                .filter(|p| !p.name.is_empty())
                .is_some();
            self.check_type(*pid, group, existing, &mut out);
            self.check_multi(*pid, group, existing, &mut out);
            self.check_component(*pid, group, existing, &mut out);
            self.check_unique(*pid, group, existing, &mut out);
            self.check_name(group, &mut out);
            self.track_post_removal(*pid, group, existing, &mut out);
        }

        out
    }

    fn group_predicate_flakes<'b>(&self, flakes: &'b [Flake]) -> HashMap<i64, PredicateGroup<'b>> {
        let mut groups: HashMap<i64, PredicateGroup<'b>> = HashMap::new();
        for f in flakes {
            if f.s < 0 || subject_collection(f.s) != PREDICATE_CID {
                continue;
            }
            let group = groups.entry(f.s).or_default();
            match f.p {
                ids::PREDICATE_TYPE => group.ptype.push(f),
                ids::PREDICATE_MULTI => group.multi.push(f),
                ids::PREDICATE_COMPONENT => group.component.push(f),
                ids::PREDICATE_UNIQUE => group.unique.push(f),
                ids::PREDICATE_INDEX => group.index.push(f),
                ids::PREDICATE_NAME => group.name.push(f),
                _ => {}
            }
        }
        groups
    }

    fn tag_type(&self, o: &ObjectValue) -> Option<PredicateType> {
        match o {
            ObjectValue::Ref(sid) => self
                .before
                .tag_name(*sid)
                .and_then(|full| full.rsplit_once(':'))
                .and_then(|(_, v)| PredicateType::from_tag_name(v)),
            _ => None,
        }
    }

    /// Declared type of the subject after this transaction, if decidable.
    fn resulting_type(&self, pid: i64, group: &PredicateGroup<'_>) -> Option<PredicateType> {
        group
            .ptype
            .iter()
            .rev()
            .find(|f| f.op)
            .and_then(|f| self.tag_type(&f.o))
            .or_else(|| self.before.predicate(pid).map(|p| p.ptype))
    }

    fn check_type(
        &self,
        pid: i64,
        group: &PredicateGroup<'_>,
        existing: bool,
        out: &mut SchemaValidation,
    ) {
        let asserted = group.ptype.iter().rev().find(|f| f.op);
        let retracted = group.ptype.iter().find(|f| !f.op);

        if !existing {
            if asserted.is_none() {
                out.errors.push(LedgerError::InvalidPredicate(format!(
                    "new predicate {pid} must declare a _predicate/type"
                )));
            }
            return;
        }

        let from = self.before.predicate(pid).map(|p| p.ptype);
        match (retracted, asserted) {
            (None, None) => {}
            (Some(_), None) => out.errors.push(LedgerError::InvalidTx(format!(
                "predicate {pid}: retracting _predicate/type without asserting a replacement"
            ))),
            (retract, Some(assert_flake)) => {
                let Some(to) = self.tag_type(&assert_flake.o) else {
                    out.errors.push(LedgerError::InvalidTx(format!(
                        "predicate {pid}: unknown _predicate/type tag"
                    )));
                    return;
                };
                let Some(from) = from else {
                    return;
                };
                if from == to {
                    return;
                }
                if retract.is_none() {
                    out.errors.push(LedgerError::InvalidTx(format!(
                        "predicate {pid}: type change requires retracting the current type"
                    )));
                } else if !from.can_change_to(to) {
                    out.errors.push(LedgerError::InvalidTx(format!(
                        "predicate {pid}: illegal type change {} -> {}",
                        from.tag_name(),
                        to.tag_name()
                    )));
                }
            }
        }
    }

    fn check_multi(
        &self,
        pid: i64,
        group: &PredicateGroup<'_>,
        existing: bool,
        out: &mut SchemaValidation,
    ) {
        if group.multi.is_empty() {
            return;
        }
        let was_multi = existing && self.before.predicate(pid).is_some_and(|p| p.multi);
        let turns_off =
            retracts_true(&group.multi) || asserted_bool(&group.multi) == Some(false);
        let turns_on = asserted_bool(&group.multi) == Some(true);
        if was_multi && turns_off && !turns_on {
            out.errors.push(LedgerError::InvalidTx(format!(
                "predicate {pid}: cannot change multi cardinality back to single"
            )));
        }
    }

    fn check_component(
        &self,
        pid: i64,
        group: &PredicateGroup<'_>,
        existing: bool,
        out: &mut SchemaValidation,
    ) {
        if asserted_bool(&group.component) != Some(true) {
            return;
        }
        if existing {
            out.errors.push(LedgerError::InvalidTx(format!(
                "predicate {pid}: cannot set component=true on an existing predicate"
            )));
        } else if self.resulting_type(pid, group) != Some(PredicateType::Ref) {
            out.errors.push(LedgerError::InvalidPredicate(format!(
                "predicate {pid}: component predicates must be of type ref"
            )));
        }
    }

    fn check_unique(
        &self,
        pid: i64,
        group: &PredicateGroup<'_>,
        existing: bool,
        out: &mut SchemaValidation,
    ) {
        if asserted_bool(&group.unique) != Some(true) {
            return;
        }
        if existing {
            out.errors.push(LedgerError::InvalidTx(format!(
                "predicate {pid}: cannot set unique=true on an existing predicate; \
                 migrate the data to a new predicate declared unique"
            )));
        }
        if self.resulting_type(pid, group) == Some(PredicateType::Boolean) {
            out.errors.push(LedgerError::InvalidPredicate(format!(
                "predicate {pid}: boolean predicates may never be unique"
            )));
        }
    }

    fn check_name(&self, group: &PredicateGroup<'_>, out: &mut SchemaValidation) {
        for f in group.name.iter().filter(|f| f.op) {
            if let ObjectValue::Str(name) = &f.o {
                if !valid_predicate_name(name) {
                    out.errors.push(LedgerError::InvalidPredicate(format!(
                        "illegal predicate name {name:?}"
                    )));
                }
            }
        }
    }

    fn check_collection_names(&self, flakes: &[Flake], out: &mut SchemaValidation) {
        for f in flakes {
            if f.p != ids::COLLECTION_NAME || !f.op {
                continue;
            }
            if let ObjectValue::Str(name) = &f.o {
                if !valid_collection_name(name) {
                    out.errors.push(LedgerError::InvalidCollection(format!(
                        "illegal collection name {name:?}"
                    )));
                }
            }
        }
    }

    fn track_post_removal(
        &self,
        pid: i64,
        group: &PredicateGroup<'_>,
        existing: bool,
        out: &mut SchemaValidation,
    ) {
        if !existing {
            return;
        }
        let Some(before) = self.before.predicate(pid) else {
            return;
        };
        let index_off = before.index
            && (retracts_true(&group.index) || asserted_bool(&group.index) == Some(false))
            && asserted_bool(&group.index) != Some(true);
        let unique_off = before.unique
            && (retracts_true(&group.unique) || asserted_bool(&group.unique) == Some(false))
            && asserted_bool(&group.unique) != Some(true);
        if index_off || unique_off {
            out.remove_from_post.insert(pid);
        }
    }
}

/// Db-after recheck of the accumulated `remove-from-post` set.
///
/// A predicate that remains indexable (the other flag still holds) is
/// dropped; what survives is scheduled for removal from `post`.
pub fn recheck_remove_from_post(candidates: HashSet<i64>, after: &Schema) -> HashSet<i64> {
    candidates
        .into_iter()
        .filter(|pid| !after.predicate(*pid).is_some_and(|p| p.is_indexed()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::program;
    use crate::types::Predicate;

    const T: i64 = -3;

    fn schema_with(preds: Vec<Predicate>) -> Schema {
        // Start from the bootstrap view so type tags resolve.
        let mut schema = program::base_schema();
        for p in preds {
            schema.insert_predicate(p);
        }
        schema
    }

    fn type_flake(pid: i64, t: PredicateType, op: bool) -> Flake {
        let tag = program::tag_sid(&format!("_predicate/type:{}", t.tag_name())).unwrap();
        Flake::new(pid, ids::PREDICATE_TYPE, ObjectValue::Ref(tag), T, op)
    }

    fn bool_flake(pid: i64, p: i64, v: bool, op: bool) -> Flake {
        Flake::new(pid, p, ObjectValue::Bool(v), T, op)
    }

    fn name_flake(pid: i64, name: &str) -> Flake {
        Flake::new(pid, ids::PREDICATE_NAME, ObjectValue::Str(name.to_string()), T, true)
    }

    const PID: i64 = 2000;

    #[test]
    fn legal_type_widening_is_accepted() {
        let schema = schema_with(vec![Predicate::new(PID, "x/y", PredicateType::Int)]);
        let v = SchemaValidator::new(&schema);

        let flakes = vec![
            type_flake(PID, PredicateType::Int, false),
            type_flake(PID, PredicateType::Long, true),
        ];
        let out = v.validate(&flakes);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
    }

    #[test]
    fn illegal_type_change_is_rejected() {
        let schema = schema_with(vec![Predicate::new(PID, "x/y", PredicateType::Int)]);
        let v = SchemaValidator::new(&schema);

        let flakes = vec![
            type_flake(PID, PredicateType::Int, false),
            type_flake(PID, PredicateType::Boolean, true),
        ];
        let out = v.validate(&flakes);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message().contains("illegal type change"));
    }

    #[test]
    fn retracting_type_without_replacement_is_rejected() {
        let schema = schema_with(vec![Predicate::new(PID, "x/y", PredicateType::Int)]);
        let v = SchemaValidator::new(&schema);

        let out = v.validate(&[type_flake(PID, PredicateType::Int, false)]);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message().contains("without asserting"));
    }

    #[test]
    fn new_predicate_must_declare_a_type() {
        let schema = program::base_schema();
        let v = SchemaValidator::new(&schema);

        let out = v.validate(&[name_flake(PID, "x/y")]);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message().contains("must declare"));
    }

    #[test]
    fn multi_to_single_is_rejected_single_to_multi_allowed() {
        let mut p = Predicate::new(PID, "x/y", PredicateType::String);
        p.multi = true;
        let schema = schema_with(vec![p]);
        let v = SchemaValidator::new(&schema);

        let out = v.validate(&[
            bool_flake(PID, ids::PREDICATE_MULTI, true, false),
            bool_flake(PID, ids::PREDICATE_MULTI, false, true),
        ]);
        assert_eq!(out.errors.len(), 1);

        let single = schema_with(vec![Predicate::new(3000, "x/z", PredicateType::String)]);
        let v2 = SchemaValidator::new(&single);
        let out2 = v2.validate(&[bool_flake(3000, ids::PREDICATE_MULTI, true, true)]);
        assert!(out2.errors.is_empty());
    }

    #[test]
    fn unique_on_existing_predicate_mentions_migration() {
        let schema = schema_with(vec![Predicate::new(PID, "x/y", PredicateType::String)]);
        let v = SchemaValidator::new(&schema);

        let out = v.validate(&[bool_flake(PID, ids::PREDICATE_UNIQUE, true, true)]);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message().contains("migrate"));
    }

    #[test]
    fn boolean_predicates_may_never_be_unique() {
        let schema = program::base_schema();
        let v = SchemaValidator::new(&schema);

        let out = v.validate(&[
            name_flake(PID, "x/flag"),
            type_flake(PID, PredicateType::Boolean, true),
            bool_flake(PID, ids::PREDICATE_UNIQUE, true, true),
        ]);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message().contains("never be unique"));
    }

    #[test]
    fn component_requires_new_ref_predicate() {
        let schema = program::base_schema();
        let v = SchemaValidator::new(&schema);

        // New ref predicate with component=true: fine.
        let ok = v.validate(&[
            name_flake(PID, "x/child"),
            type_flake(PID, PredicateType::Ref, true),
            bool_flake(PID, ids::PREDICATE_COMPONENT, true, true),
        ]);
        assert!(ok.errors.is_empty(), "{:?}", ok.errors);

        // Same shape but type=string: rejected.
        let bad = v.validate(&[
            name_flake(PID, "x/child"),
            type_flake(PID, PredicateType::String, true),
            bool_flake(PID, ids::PREDICATE_COMPONENT, true, true),
        ]);
        assert_eq!(bad.errors.len(), 1);

        // Existing predicate: rejected regardless of type.
        let existing = schema_with(vec![Predicate::new(PID, "x/y", PredicateType::Ref)]);
        let v2 = SchemaValidator::new(&existing);
        let out = v2.validate(&[bool_flake(PID, ids::PREDICATE_COMPONENT, true, true)]);
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn reserved_predicate_names_are_rejected() {
        let schema = program::base_schema();
        let v = SchemaValidator::new(&schema);

        for bad in ["nope", "a/_b", "a__b/c", "a/b_Via_c"] {
            let out = v.validate(&[
                name_flake(PID, bad),
                type_flake(PID, PredicateType::String, true),
            ]);
            assert!(
                out.errors
                    .iter()
                    .any(|e| e.message().contains("illegal predicate name")),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn collection_names_are_checked() {
        let schema = program::base_schema();
        let v = SchemaValidator::new(&schema);

        let sid = crate::types::subject_id(ids::COLLECTION_CID, 50);
        let out = v.validate(&[Flake::new(
            sid,
            ids::COLLECTION_NAME,
            ObjectValue::Str("bad name".to_string()),
            T,
            true,
        )]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind(), "invalid-collection");
    }

    #[test]
    fn post_removal_survives_only_when_no_flag_remains() {
        // index=true, unique=true; retracting unique keeps the predicate
        // indexable, so the db-after recheck drops it from the set.
        let mut p = Predicate::new(PID, "x/y", PredicateType::String);
        p.index = true;
        p.unique = true;
        let schema = schema_with(vec![p.clone()]);
        let v = SchemaValidator::new(&schema);

        let out = v.validate(&[bool_flake(PID, ids::PREDICATE_UNIQUE, true, false)]);
        assert!(out.remove_from_post.contains(&PID));

        let mut after_pred = p.clone();
        after_pred.unique = false;
        let after = schema_with(vec![after_pred]);
        let survivors = recheck_remove_from_post(out.remove_from_post, &after);
        assert!(survivors.is_empty());

        // Retracting both flags leaves nothing indexable; removal sticks.
        let out2 = v.validate(&[
            bool_flake(PID, ids::PREDICATE_UNIQUE, true, false),
            bool_flake(PID, ids::PREDICATE_INDEX, true, false),
        ]);
        let mut neither = p;
        neither.unique = false;
        neither.index = false;
        let after2 = schema_with(vec![neither]);
        let survivors2 = recheck_remove_from_post(out2.remove_from_post, &after2);
        assert!(survivors2.contains(&PID));
    }
}
