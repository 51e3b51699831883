//! Novelty & index layer.
//!
//! Novelty holds every flake not yet flushed into a persisted index
//! segment, projected into the five sort orders, together with running
//! byte-size and count statistics. Retractions are *added* like any other
//! flake — nothing in novelty is ever deleted; retrieval interprets
//! assertion/retraction by the newest flake visible at the query time.
//!
//! Sharing model (single-writer / many-reader): the five sets live behind
//! `Arc`s and the writer mutates them copy-on-write, so a reader that
//! clones the [`Novelty`] handle keeps a consistent snapshot for as long
//! as it likes without holding any lock.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Flake, ObjectValue, Schema, SortOrder};

/// The boundary between persisted index segments and novelty.
///
/// Advances monotonically each time the (external) indexer flushes: flakes
/// at or before the pointer live in segments, everything newer is answered
/// from novelty. Readers see a union of both views. Persisted at the
/// current-index-pointer storage key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexPointer {
    /// Newest block covered by persisted segments.
    pub block: u64,
    /// Logical time of that block's header.
    pub t: i64,
}

impl ReindexPointer {
    /// Whether `candidate` may replace `self`; the pointer only advances.
    pub fn can_advance_to(&self, candidate: &ReindexPointer) -> bool {
        candidate.block >= self.block && candidate.t <= self.t
    }
}

macro_rules! order_key {
    ($name:ident, $order:expr) => {
        #[derive(Clone, Debug, PartialEq, Eq)]
        struct $name(Arc<Flake>);

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                $order.compare(&self.0, &other.0)
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
    };
}

order_key!(SpotKey, SortOrder::Spot);
order_key!(PsotKey, SortOrder::Psot);
order_key!(PostKey, SortOrder::Post);
order_key!(OpstKey, SortOrder::Opst);
order_key!(TspoKey, SortOrder::Tspo);

/// Reindex eligibility derived from the configured thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReindexStatus {
    /// Below the soft threshold; nothing to do.
    Idle,
    /// At or above `novelty-min`: the indexer may flush.
    Eligible,
    /// At or above `novelty-max`: the transactor must apply back-pressure.
    AtMax,
}

/// The in-memory flake universe not yet persisted to index segments.
#[derive(Clone, Debug, Default)]
pub struct Novelty {
    spot: Arc<BTreeSet<SpotKey>>,
    psot: Arc<BTreeSet<PsotKey>>,
    post: Arc<BTreeSet<PostKey>>,
    opst: Arc<BTreeSet<OpstKey>>,
    tspo: Arc<BTreeSet<TspoKey>>,
    /// Serialized-size estimate of everything held, in bytes.
    size: usize,
}

impl Novelty {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs flakes into the projections.
    ///
    /// Every flake lands in `spot`, `psot`, and `tspo`; `post` only when
    /// its predicate is indexed or unique; `opst` only when its predicate
    /// is a reference or tag. Returns the bytes added, which the caller
    /// folds into the ledger stats.
    pub fn absorb(&mut self, flakes: &[Flake], schema: &Schema) -> usize {
        let mut added = 0;
        for flake in flakes {
            let bytes = flake.size_estimate();
            let f = Arc::new(flake.clone());

            Arc::make_mut(&mut self.spot).insert(SpotKey(f.clone()));
            Arc::make_mut(&mut self.psot).insert(PsotKey(f.clone()));
            Arc::make_mut(&mut self.tspo).insert(TspoKey(f.clone()));

            if let Some(pred) = schema.predicate(flake.p) {
                if pred.is_indexed() {
                    Arc::make_mut(&mut self.post).insert(PostKey(f.clone()));
                }
                if pred.is_ref() {
                    Arc::make_mut(&mut self.opst).insert(OpstKey(f.clone()));
                }
            }

            added += bytes;
        }
        self.size += added;
        added
    }

    /// Absorbs retraction flakes. A retraction is added, never used to
    /// delete; the symmetric name exists because callers distinguish the
    /// two phases.
    pub fn retract(&mut self, flakes: &[Flake], schema: &Schema) -> usize {
        debug_assert!(flakes.iter().all(|f| !f.op));
        self.absorb(flakes, schema)
    }

    /// Drops every flake of predicate `pid` from the `post` projection.
    ///
    /// Used by post-index hygiene when a predicate stops being indexable.
    pub fn remove_from_post(&mut self, pid: i64) {
        Arc::make_mut(&mut self.post).retain(|k| k.0.p != pid);
    }

    /// Lazily iterates flakes of `order` in `[from, to)`.
    ///
    /// The returned iterator borrows the underlying set and is restartable
    /// by calling `range` again with the same bounds; cost is
    /// O(log n + k).
    pub fn range<'a>(
        &'a self,
        order: SortOrder,
        from: &Flake,
        to: &Flake,
    ) -> Box<dyn Iterator<Item = &'a Flake> + 'a> {
        macro_rules! ranged {
            ($set:expr, $key:ident) => {{
                let lo = Bound::Included($key(Arc::new(from.clone())));
                let hi = Bound::Excluded($key(Arc::new(to.clone())));
                Box::new($set.range((lo, hi)).map(|k| k.0.as_ref()))
            }};
        }
        match order {
            SortOrder::Spot => ranged!(self.spot, SpotKey),
            SortOrder::Psot => ranged!(self.psot, PsotKey),
            SortOrder::Post => ranged!(self.post, PostKey),
            SortOrder::Opst => ranged!(self.opst, OpstKey),
            SortOrder::Tspo => ranged!(self.tspo, TspoKey),
        }
    }

    /// Iterates the full spot projection in order.
    pub fn spot_iter(&self) -> impl Iterator<Item = &Flake> {
        self.spot.iter().map(|k| k.0.as_ref())
    }

    /// Resolves the objects of `(s, p)` live at `query_t`.
    ///
    /// A flake is visible when its `t` is at or before the query time
    /// (numerically `f.t >= query_t`); per object, the newest visible flake
    /// decides liveness by its `op`.
    pub fn live_objects(&self, s: i64, p: i64, query_t: i64) -> Vec<ObjectValue> {
        let from = Flake {
            s,
            p,
            ..Flake::min_for_subject(s)
        };
        let to = Flake {
            s,
            p: p + 1,
            ..Flake::min_for_subject(s)
        };

        let mut live: Vec<ObjectValue> = Vec::new();
        let mut current: Option<(&ObjectValue, &Flake)> = None;

        // Spot order groups (s, p, o) runs with the newest visible t won by
        // the most negative t, which sorts last within the run.
        for f in self.range(SortOrder::Spot, &from, &to) {
            if f.t < query_t {
                continue;
            }
            match current {
                Some((o, _)) if *o == f.o => current = Some((&f.o, f)),
                Some((_, winner)) => {
                    if winner.op {
                        live.push(winner.o.clone());
                    }
                    current = Some((&f.o, f));
                }
                None => current = Some((&f.o, f)),
            }
        }
        if let Some((_, winner)) = current {
            if winner.op {
                live.push(winner.o.clone());
            }
        }
        live
    }

    /// Serialized-size estimate of the held flakes, in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of flakes held (each flake counted once).
    pub fn len(&self) -> usize {
        self.spot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spot.is_empty()
    }

    /// Compares the current size against the configured thresholds.
    pub fn reindex_status(&self, novelty_min: usize, novelty_max: usize) -> ReindexStatus {
        if self.size >= novelty_max {
            ReindexStatus::AtMax
        } else if self.size >= novelty_min {
            ReindexStatus::Eligible
        } else {
            ReindexStatus::Idle
        }
    }
}
