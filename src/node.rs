//! Nodes of the aggregation tree and their cached summaries.
//!
//! A [`Slot`] is one child position of a branch: not yet materialized
//! ([`Slot::Vacant`]), exhausted ([`Slot::Pruned`]) or holding a [`Node`].
//!
//! Branch caches are tagged with the bound epoch they were computed under.
//! Bounds only ever tighten, so a stale cache is optimistic: its utility and
//! bound are at least as good as the fresh values. A stale child therefore only
//! needs refreshing when its cached values could still win.

use crate::bounds::BoundCache;
use crate::ledger::{Entry, Ledger};
use crate::local::LocalOverlay;
use crate::schema::Schema;
use crate::traits::Utility;
use crate::utility::Objective;
use crate::utils::{child_bit, full_mask, ChildMask};
use std::hash::Hash;

/// Read-only view of the state a node needs to (re)compute itself.
pub(crate) struct Env<'a, V, U> {
    pub objective: Objective,
    pub schema: &'a Schema<V>,
    pub ledger: &'a Ledger<U>,
    pub bounds: &'a BoundCache<U>,
    pub local: Option<&'a LocalOverlay<V, U>>,
}

impl<'a, V: Clone + Eq + Hash, U: Utility> Env<'a, V, U> {
    /// Aggregate a leaf for a full path from the ledgers.
    ///
    /// Returns `None` when the local utility of the path is infeasible.
    pub fn make_leaf(&self, path: &[u32], real: bool) -> Option<Leaf<U>> {
        let local = self
            .local
            .map_or_else(U::zero, |l| l.utility_at(self.schema, path));
        if self.objective.is_infeasible(local) {
            return None;
        }
        let children = self.bounds.children();
        let mut leaf = Leaf {
            raw: local,
            confirmed: local,
            pending: full_mask(children),
            real,
        };
        for sender in 0..children {
            let key = self.ledger.key_at(sender, self.schema, path);
            if let Some(entry) = self.ledger.get(sender, &key) {
                leaf.raw = leaf.raw.plus(entry.utility);
                if entry.confirmed {
                    leaf.confirmed = leaf.confirmed.plus(entry.utility);
                    leaf.pending &= !child_bit(sender);
                }
            }
        }
        if leaf.pending == 0 {
            leaf.raw = leaf.confirmed;
        }
        Some(leaf)
    }
}

/// One sender's report being pushed into existing leaves.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Update<U> {
    pub sender: usize,
    pub previous: Option<Entry<U>>,
    pub current: Entry<U>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Summary<U> {
    /// Best utility of a real, feasible leaf below.
    pub util: Option<U>,
    /// Best bound of any materialized leaf below.
    pub bound: Option<U>,
    /// Some slot below is still vacant.
    pub vacant: bool,
}

impl<U> Summary<U> {
    pub fn vacant() -> Self {
        Self {
            util: None,
            bound: None,
            vacant: true,
        }
    }

    pub fn exhausted() -> Self {
        Self {
            util: None,
            bound: None,
            vacant: false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Slot<U> {
    Vacant,
    Pruned,
    Occupied(Node<U>),
}

impl<U> Slot<U> {
    pub fn is_pruned(&self) -> bool {
        matches!(self, Slot::Pruned)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node<U> {
    Branch(Branch<U>),
    Leaf(Leaf<U>),
}

/// Aggregated data for one full assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Leaf<U> {
    /// Local utility plus every known contribution, confirmed or not.
    raw: U,
    /// Local utility plus the confirmed contributions only.
    confirmed: U,
    /// Children whose contribution to this assignment is not confirmed.
    pending: ChildMask,
    /// Reached through known values only.
    pub real: bool,
}

impl<U: Utility> Leaf<U> {
    pub fn bound(&self, bounds: &BoundCache<U>) -> Option<U> {
        bounds
            .subset_sum(self.pending)
            .map(|rest| self.confirmed.plus(rest))
    }

    /// Known utility, capped by the bound once it exists.
    pub fn utility(&self, objective: Objective, bounds: &BoundCache<U>) -> U {
        match self.bound(bounds) {
            Some(b) => objective.worse_of(self.raw, b),
            None => self.raw,
        }
    }

    /// No future report can change this leaf.
    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }

    fn summary<V>(&self, env: &Env<'_, V, U>) -> Summary<U> {
        let util = self.utility(env.objective, env.bounds);
        let reportable = self.real && !env.objective.is_infeasible(util);
        Summary {
            util: reportable.then_some(util),
            bound: self.bound(env.bounds),
            vacant: false,
        }
    }

    pub fn apply<V: Clone + Eq + Hash>(&mut self, env: &Env<'_, V, U>, path: &[u32], update: &Update<U>) {
        let current = update.current;
        match update.previous {
            None => self.raw = self.raw.plus(current.utility),
            Some(prev)
                if !prev.utility.is_infinite()
                    && !current.utility.is_infinite()
                    && !self.raw.is_infinite() =>
            {
                self.raw = self.raw.plus(current.utility.minus(prev.utility));
            }
            Some(_) => {
                // Sentinels do not cancel, rebuild from the ledgers instead.
                if let Some(fresh) = env.make_leaf(path, self.real) {
                    *self = fresh;
                }
                return;
            }
        }
        let bit = child_bit(update.sender);
        if current.confirmed && self.pending & bit != 0 {
            self.confirmed = self.confirmed.plus(current.utility);
            self.pending &= !bit;
        }
        if self.pending == 0 {
            self.raw = self.confirmed;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Branch<U> {
    pub slots: Vec<Slot<U>>,
    best_util: Option<usize>,
    best_bound: Option<usize>,
    summary: Summary<U>,
    epoch: u64,
    pub real: bool,
}

impl<U: Utility> Branch<U> {
    pub fn new(width: usize, real: bool) -> Self {
        Self {
            slots: (0..width).map(|_| Slot::Vacant).collect(),
            best_util: None,
            best_bound: None,
            summary: Summary::vacant(),
            epoch: 0,
            real,
        }
    }

    pub fn from_slots(slots: Vec<Slot<U>>, real: bool) -> Self {
        Self {
            slots,
            ..Self::new(0, real)
        }
    }

    pub fn best_util(&self) -> Option<usize> {
        self.best_util
    }

    pub fn best_bound(&self) -> Option<usize> {
        self.best_bound
    }

    pub fn all_pruned(&self) -> bool {
        self.slots.iter().all(Slot::is_pruned)
    }

    /// Recompute if the cache predates the current bound epoch.
    pub fn refresh<V>(&mut self, env: &Env<'_, V, U>) {
        if self.epoch != env.bounds.epoch() {
            self.recompute(env);
        }
    }

    /// Rebuild the cached pointers and summary from the children.
    pub fn recompute<V>(&mut self, env: &Env<'_, V, U>) {
        let epoch = env.bounds.epoch();
        let mut best = Best::new(env.objective);
        let mut stale = Vec::new();
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Vacant => best.vacant = true,
                Slot::Pruned => {}
                Slot::Occupied(Node::Leaf(leaf)) => best.offer(i, leaf.summary(env)),
                Slot::Occupied(Node::Branch(b)) if b.epoch == epoch => best.offer(i, b.summary),
                Slot::Occupied(Node::Branch(_)) => stale.push(i),
            }
        }
        for i in stale {
            if let Slot::Occupied(Node::Branch(b)) = &mut self.slots[i] {
                if best.may_improve(i, &b.summary) {
                    b.recompute(env);
                    best.offer(i, b.summary);
                } else {
                    best.vacant |= b.summary.vacant;
                }
            }
        }
        self.best_util = best.util.map(|(i, _)| i);
        self.best_bound = best.bound.map(|(i, _)| i);
        self.summary = Summary {
            util: best.util.map(|(_, u)| u),
            bound: best.bound.map(|(_, b)| b),
            vacant: best.vacant,
        };
        self.epoch = epoch;
    }
}

impl<U: Utility> Node<U> {
    pub fn summary<V>(&mut self, env: &Env<'_, V, U>) -> Summary<U> {
        match self {
            Node::Leaf(leaf) => leaf.summary(env),
            Node::Branch(b) => {
                b.refresh(env);
                b.summary
            }
        }
    }
}

/// Running best over the children of one branch. Ties go to the lower index.
struct Best<U> {
    objective: Objective,
    util: Option<(usize, U)>,
    bound: Option<(usize, U)>,
    vacant: bool,
}

impl<U: Utility> Best<U> {
    fn new(objective: Objective) -> Self {
        Self {
            objective,
            util: None,
            bound: None,
            vacant: false,
        }
    }

    fn beats(&self, i: usize, value: U, current: Option<(usize, U)>) -> bool {
        match current {
            None => true,
            Some((j, v)) => self.objective.better(value, v) || (value == v && i < j),
        }
    }

    fn offer(&mut self, i: usize, s: Summary<U>) {
        if let Some(u) = s.util {
            if self.beats(i, u, self.util) {
                self.util = Some((i, u));
            }
        }
        if let Some(b) = s.bound {
            if self.beats(i, b, self.bound) {
                self.bound = Some((i, b));
            }
        }
        self.vacant |= s.vacant;
    }

    /// Whether a stale child with cached summary `s` could displace the
    /// current best utility or bound.
    fn may_improve(&self, i: usize, s: &Summary<U>) -> bool {
        let util = s.util.map_or(false, |u| self.beats(i, u, self.util));
        let bound = s.bound.map_or(true, |b| self.beats(i, b, self.bound));
        util || bound
    }
}
