//! The flake: the atomic datum of the ledger, and its sort orders.
//!
//! A flake is an immutable `(s, p, o, t, op, m)` tuple. Flakes are created
//! by the transactor, absorbed into novelty, periodically flushed into
//! persisted index segments, and never mutated thereafter. Five sort orders
//! project the same flake multiset for different access paths; the
//! comparators here are the single source of truth for all of them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::ObjectValue;

/// An immutable assertion or retraction of one fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flake {
    /// Subject id: `(collection-id, within-collection counter)` composite,
    /// or a negative logical time for tx/block metadata subjects.
    pub s: i64,
    /// Predicate id (a subject id in the `_predicate` collection).
    pub p: i64,
    /// Object value.
    pub o: ObjectValue,
    /// Logical time. Monotonically decreasing: more negative is newer.
    pub t: i64,
    /// `true` = assertion, `false` = retraction.
    pub op: bool,
    /// Optional metadata blob.
    pub m: Option<String>,
}

impl Flake {
    pub fn new(s: i64, p: i64, o: ObjectValue, t: i64, op: bool) -> Self {
        Self { s, p, o, t, op, m: None }
    }

    /// Renders the canonical JSON tuple `[s, p, o, t, op, m]` used for block
    /// hashing. A `nil` metadata slot is elided, so flakes without metadata
    /// hash as five-element tuples.
    pub fn canonical_json(&self) -> serde_json::Value {
        let mut tuple = vec![
            serde_json::Value::from(self.s),
            serde_json::Value::from(self.p),
            self.o.canonical_json(),
            serde_json::Value::from(self.t),
            serde_json::Value::from(self.op),
        ];
        if let Some(m) = &self.m {
            tuple.push(serde_json::Value::String(m.clone()));
        }
        serde_json::Value::Array(tuple)
    }

    /// Serialized-size estimate in bytes.
    ///
    /// Computed once per flake on insertion into novelty; feeds the
    /// `novelty.size` statistic and the reindex thresholds.
    pub fn size_estimate(&self) -> usize {
        // s + p + t fixed-width, op one byte, object and metadata variable.
        8 + 8 + 8
            + 1
            + self.o.size_estimate()
            + self.m.as_ref().map_or(0, |m| m.len())
    }

    /// Smallest flake (in every sort order) touching subject `s`.
    pub fn min_for_subject(s: i64) -> Self {
        Flake {
            s,
            p: i64::MIN,
            o: ObjectValue::Bool(false),
            t: i64::MAX,
            op: false,
            m: None,
        }
    }

    /// Largest flake (in every sort order) touching subject `s`.
    pub fn max_for_subject(s: i64) -> Self {
        Flake {
            s,
            p: i64::MAX,
            o: ObjectValue::Ref(i64::MAX),
            t: i64::MIN,
            op: true,
            m: Some(String::new()),
        }
    }
}

/// Compares logical times in index order: larger `t` (less negative, older
/// era boundary first within a key) sorts first.
fn cmp_t(a: i64, b: i64) -> Ordering {
    b.cmp(&a)
}

/// Tie-break over the components not named by a sort order.
fn cmp_rest(a: &Flake, b: &Flake) -> Ordering {
    a.op.cmp(&b.op).then_with(|| a.m.cmp(&b.m))
}

/// The five index projections over the flake multiset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// `(s, p, o, t)` — primary fact lookup.
    Spot,
    /// `(p, s, o, t)` — predicate-centric scans.
    Psot,
    /// `(p, o, s, t)` — equality/range lookup, indexed predicates only.
    Post,
    /// `(o, p, s, t)` — reverse-reference lookup, ref predicates only.
    Opst,
    /// `(t, s, p, o)` — history/log replay order.
    Tspo,
}

impl SortOrder {
    /// Total order over flakes for this projection.
    ///
    /// Key components compare in the stated tuple order with `t`
    /// descending; equal keys fall through to the remaining components.
    pub fn compare(self, a: &Flake, b: &Flake) -> Ordering {
        let key = match self {
            SortOrder::Spot => a
                .s
                .cmp(&b.s)
                .then_with(|| a.p.cmp(&b.p))
                .then_with(|| a.o.cmp(&b.o))
                .then_with(|| cmp_t(a.t, b.t)),
            SortOrder::Psot => a
                .p
                .cmp(&b.p)
                .then_with(|| a.s.cmp(&b.s))
                .then_with(|| a.o.cmp(&b.o))
                .then_with(|| cmp_t(a.t, b.t)),
            SortOrder::Post => a
                .p
                .cmp(&b.p)
                .then_with(|| a.o.cmp(&b.o))
                .then_with(|| a.s.cmp(&b.s))
                .then_with(|| cmp_t(a.t, b.t)),
            SortOrder::Opst => a
                .o
                .cmp(&b.o)
                .then_with(|| a.p.cmp(&b.p))
                .then_with(|| a.s.cmp(&b.s))
                .then_with(|| cmp_t(a.t, b.t)),
            SortOrder::Tspo => cmp_t(a.t, b.t)
                .then_with(|| a.s.cmp(&b.s))
                .then_with(|| a.p.cmp(&b.p))
                .then_with(|| a.o.cmp(&b.o)),
        };
        key.then_with(|| cmp_rest(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flake(s: i64, p: i64, o: i64, t: i64) -> Flake {
        Flake::new(s, p, ObjectValue::Long(o), t, true)
    }

    #[test]
    fn spot_orders_by_subject_then_predicate() {
        let a = flake(1, 10, 0, -1);
        let b = flake(1, 11, 0, -1);
        let c = flake(2, 10, 0, -1);
        assert_eq!(SortOrder::Spot.compare(&a, &b), Ordering::Less);
        assert_eq!(SortOrder::Spot.compare(&b, &c), Ordering::Less);
    }

    #[test]
    fn t_compares_descending_in_every_order() {
        // -1 is an older era than -2; the less negative t sorts first.
        let newer = flake(1, 10, 0, -2);
        let older = flake(1, 10, 0, -1);
        for order in [
            SortOrder::Spot,
            SortOrder::Psot,
            SortOrder::Post,
            SortOrder::Opst,
        ] {
            assert_eq!(order.compare(&older, &newer), Ordering::Less, "{order:?}");
        }
        assert_eq!(SortOrder::Tspo.compare(&older, &newer), Ordering::Less);
    }

    #[test]
    fn tspo_is_keyed_by_time_first() {
        let a = flake(9, 10, 0, -1);
        let b = flake(1, 10, 0, -2);
        // a has a larger (older) t, so it sorts first despite the bigger s.
        assert_eq!(SortOrder::Tspo.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn canonical_json_elides_nil_metadata() {
        let f = flake(1, 10, 7, -3);
        let v = f.canonical_json();
        assert_eq!(v, serde_json::json!([1, 10, 7, -3, true]));

        let mut g = f.clone();
        g.m = Some("meta".to_string());
        assert_eq!(g.canonical_json(), serde_json::json!([1, 10, 7, -3, true, "meta"]));
    }

    #[test]
    fn subject_bounds_bracket_all_flakes_for_a_subject() {
        let lo = Flake::min_for_subject(5);
        let hi = Flake::max_for_subject(5);
        let mid = flake(5, 10, 3, -4);
        assert_eq!(SortOrder::Spot.compare(&lo, &mid), Ordering::Less);
        assert_eq!(SortOrder::Spot.compare(&mid, &hi), Ordering::Less);
    }

    #[test]
    fn size_estimate_counts_object_and_metadata() {
        let f = Flake::new(1, 10, ObjectValue::Str("abcd".into()), -1, true);
        let base = f.size_estimate();
        let mut g = f.clone();
        g.m = Some("xy".to_string());
        assert_eq!(g.size_estimate(), base + 2);
    }
}
