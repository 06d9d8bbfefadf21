//! The aggregation tree: one level per discovered variable, lazily
//! materialized.
//!
//! Paths are vectors of value indices, one per depth. A free coordinate in a
//! pattern (`None`) matches every slot at that depth, the reserved one
//! included. Mutations recompute branch caches bottom-up along the touched
//! paths only.

use crate::node::{Branch, Env, Leaf, Node, Slot, Summary, Update};
use crate::schema::Schema;
use crate::traits::Utility;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub(crate) struct AggregationTree<U> {
    root: Slot<U>,
    leaves_created: usize,
    synthetic_leaves_created: usize,
}

impl<U: Utility> AggregationTree<U> {
    pub fn new() -> Self {
        Self {
            root: Slot::Vacant,
            leaves_created: 0,
            synthetic_leaves_created: 0,
        }
    }

    pub fn is_pruned(&self) -> bool {
        self.root.is_pruned()
    }

    pub fn kill(&mut self) {
        self.root = Slot::Pruned;
    }

    pub fn leaves_created(&self) -> usize {
        self.leaves_created
    }

    pub fn synthetic_leaves_created(&self) -> usize {
        self.synthetic_leaves_created
    }

    /// Bring the root cache up to date and return it.
    pub fn refresh<V>(&mut self, env: &Env<'_, V, U>) -> Summary<U> {
        match &mut self.root {
            Slot::Vacant => Summary::vacant(),
            Slot::Pruned => Summary::exhausted(),
            Slot::Occupied(node) => node.summary(env),
        }
    }

    /// Push a report along every path matching `partial`, materializing
    /// vacant slots on the way. With `update == None` this only materializes.
    pub fn push<V: Clone + Eq + Hash>(
        &mut self,
        env: &Env<'_, V, U>,
        partial: &[Option<u32>],
        update: Option<&Update<U>>,
    ) {
        debug_assert_eq!(partial.len(), env.schema.len());
        let mut walk = Walk {
            env,
            partial,
            update,
            path: Vec::with_capacity(partial.len()),
            created: 0,
            synthetic: 0,
        };
        walk.visit(&mut self.root, 0, true);
        self.leaves_created += walk.created;
        self.synthetic_leaves_created += walk.synthetic;
    }

    /// A variable was inserted at depth 0: the old tree is copied under every
    /// slot of the new root.
    pub fn insert_root_level<V: Clone + Eq + Hash>(&mut self, env: &Env<'_, V, U>) {
        let old = std::mem::replace(&mut self.root, Slot::Vacant);
        if old.is_pruned() {
            self.root = Slot::Pruned;
            return;
        }
        let width = env.schema.branching(0);
        let slots = (0..width).map(|_| old.clone()).collect();
        self.root = Slot::Occupied(Node::Branch(Branch::from_slots(slots, true)));
        rebuild(&mut self.root, env, 0, true);
    }

    /// Value `index` was added to the variable at `depth`. The reserved slot's
    /// subtree becomes the new value's subtree; unless the reservation was
    /// dropped, a copy of it stays reserved.
    pub fn grow_domain<V: Clone + Eq + Hash>(
        &mut self,
        env: &Env<'_, V, U>,
        depth: usize,
        index: u32,
        reservation_dropped: bool,
    ) {
        grow(&mut self.root, env, 0, depth, index as usize, reservation_dropped);
    }

    /// The variable at `depth` lost its reserved slot.
    pub fn drop_reserved<V>(&mut self, env: &Env<'_, V, U>, depth: usize) {
        drop_last(&mut self.root, env, 0, depth);
    }

    /// Exhaust the subtree at `prefix` and propagate dead branches upward.
    pub fn prune<V>(&mut self, env: &Env<'_, V, U>, prefix: &[u32]) {
        prune(&mut self.root, env, 0, prefix);
    }

    /// Path to the leaf reached through the cached best-utility pointers.
    pub fn best_util_path(&self) -> Option<(Vec<u32>, &Leaf<U>)> {
        self.follow(Branch::best_util)
    }

    /// Path to the leaf reached through the cached best-bound pointers.
    pub fn best_bound_path(&self) -> Option<(Vec<u32>, &Leaf<U>)> {
        self.follow(Branch::best_bound)
    }

    fn follow(&self, pick: impl Fn(&Branch<U>) -> Option<usize>) -> Option<(Vec<u32>, &Leaf<U>)> {
        let mut path = Vec::new();
        let mut slot = &self.root;
        loop {
            match slot {
                Slot::Occupied(Node::Leaf(leaf)) => return Some((path, leaf)),
                Slot::Occupied(Node::Branch(b)) => {
                    let i = pick(b)?;
                    path.push(i as u32);
                    slot = &b.slots[i];
                }
                Slot::Vacant | Slot::Pruned => return None,
            }
        }
    }

    /// Some path matching `pattern` is vacant or ends in a leaf.
    pub fn path_alive(&self, pattern: &[Option<u32>]) -> bool {
        alive(&self.root, 0, pattern)
    }

    /// A path over known values matching `pattern` that is still alive,
    /// preferring one no report has touched yet.
    pub fn find_unused<V>(&self, schema: &Schema<V>, pattern: &[Option<u32>]) -> Option<Vec<u32>>
    where
        V: Clone + Eq + Hash,
    {
        [true, false].into_iter().find_map(|want_vacant| {
            let mut path = Vec::with_capacity(pattern.len());
            search(&self.root, schema, 0, pattern, &mut path, want_vacant).then_some(path)
        })
    }

    /// Best real leaf matching `pattern`, with its path and utility.
    pub fn best_under<V>(&self, env: &Env<'_, V, U>, pattern: &[Option<u32>]) -> Option<(Vec<u32>, U)> {
        let mut best = None;
        let mut path = Vec::with_capacity(pattern.len());
        best_under(&self.root, env, 0, pattern, &mut path, &mut best);
        best
    }

    pub fn count_leaves(&self) -> usize {
        count(&self.root)
    }
}

struct Walk<'e, 'a, V, U> {
    env: &'e Env<'a, V, U>,
    partial: &'e [Option<u32>],
    update: Option<&'e Update<U>>,
    path: Vec<u32>,
    created: usize,
    synthetic: usize,
}

impl<'e, 'a, V: Clone + Eq + Hash, U: Utility> Walk<'e, 'a, V, U> {
    fn visit(&mut self, slot: &mut Slot<U>, depth: usize, real: bool) {
        let levels = self.env.schema.len();
        if let Slot::Vacant = slot {
            if depth == levels {
                *slot = match self.env.make_leaf(&self.path, real) {
                    Some(leaf) => {
                        self.created += 1;
                        if !real {
                            self.synthetic += 1;
                        }
                        Slot::Occupied(Node::Leaf(leaf))
                    }
                    None => Slot::Pruned,
                };
                return;
            }
            *slot = Slot::Occupied(Node::Branch(Branch::new(
                self.env.schema.branching(depth),
                real,
            )));
        }
        let dead = match slot {
            Slot::Vacant | Slot::Pruned => false,
            Slot::Occupied(Node::Leaf(leaf)) => {
                if let Some(update) = self.update {
                    leaf.apply(self.env, &self.path, update);
                }
                false
            }
            Slot::Occupied(Node::Branch(b)) => {
                let range = match self.partial[depth] {
                    Some(i) => i as usize..i as usize + 1,
                    None => 0..b.slots.len(),
                };
                for i in range {
                    let child_real = real && !self.env.schema.is_reserved_slot(depth, i as u32);
                    self.path.push(i as u32);
                    self.visit(&mut b.slots[i], depth + 1, child_real);
                    self.path.pop();
                }
                b.recompute(self.env);
                b.all_pruned()
            }
        };
        if dead {
            *slot = Slot::Pruned;
        }
    }
}

/// Relabel `real` flags below `slot` and recompute every branch cache.
fn rebuild<V: Clone + Eq + Hash, U: Utility>(
    slot: &mut Slot<U>,
    env: &Env<'_, V, U>,
    depth: usize,
    real: bool,
) {
    match slot {
        Slot::Occupied(Node::Leaf(leaf)) => leaf.real = real,
        Slot::Occupied(Node::Branch(b)) => {
            b.real = real;
            for (i, child) in b.slots.iter_mut().enumerate() {
                let child_real = real && !env.schema.is_reserved_slot(depth, i as u32);
                rebuild(child, env, depth + 1, child_real);
            }
            b.recompute(env);
        }
        Slot::Vacant | Slot::Pruned => {}
    }
}

fn grow<V: Clone + Eq + Hash, U: Utility>(
    slot: &mut Slot<U>,
    env: &Env<'_, V, U>,
    depth: usize,
    target: usize,
    index: usize,
    reservation_dropped: bool,
) {
    let Slot::Occupied(Node::Branch(b)) = slot else {
        return;
    };
    if depth == target {
        let real = b.real;
        if reservation_dropped {
            rebuild(&mut b.slots[index], env, depth + 1, real);
        } else {
            let mut copy = b.slots[index].clone();
            rebuild(&mut copy, env, depth + 1, real);
            b.slots.insert(index, copy);
        }
    } else {
        for child in &mut b.slots {
            grow(child, env, depth + 1, target, index, reservation_dropped);
        }
    }
    b.recompute(env);
}

fn drop_last<V, U: Utility>(slot: &mut Slot<U>, env: &Env<'_, V, U>, depth: usize, target: usize) {
    let dead = match slot {
        Slot::Occupied(Node::Branch(b)) => {
            if depth == target {
                b.slots.pop();
            } else {
                for child in &mut b.slots {
                    drop_last(child, env, depth + 1, target);
                }
            }
            b.recompute(env);
            b.all_pruned()
        }
        _ => false,
    };
    if dead {
        *slot = Slot::Pruned;
    }
}

fn prune<V, U: Utility>(slot: &mut Slot<U>, env: &Env<'_, V, U>, depth: usize, prefix: &[u32]) {
    if depth == prefix.len() {
        *slot = Slot::Pruned;
        return;
    }
    let dead = match slot {
        Slot::Occupied(Node::Branch(b)) => {
            prune(&mut b.slots[prefix[depth] as usize], env, depth + 1, prefix);
            b.recompute(env);
            b.all_pruned()
        }
        _ => false,
    };
    if dead {
        *slot = Slot::Pruned;
    }
}

fn matches(pattern: &[Option<u32>], depth: usize, i: usize) -> bool {
    pattern[depth].map_or(true, |p| p as usize == i)
}

fn alive<U>(slot: &Slot<U>, depth: usize, pattern: &[Option<u32>]) -> bool {
    match slot {
        Slot::Pruned => false,
        Slot::Vacant | Slot::Occupied(Node::Leaf(_)) => true,
        Slot::Occupied(Node::Branch(b)) => b
            .slots
            .iter()
            .enumerate()
            .any(|(i, child)| matches(pattern, depth, i) && alive(child, depth + 1, pattern)),
    }
}

fn search<V: Clone + Eq + Hash, U>(
    slot: &Slot<U>,
    schema: &Schema<V>,
    depth: usize,
    pattern: &[Option<u32>],
    path: &mut Vec<u32>,
    want_vacant: bool,
) -> bool {
    match slot {
        Slot::Pruned => false,
        Slot::Vacant => {
            path.extend(pattern[depth..].iter().map(|p| p.unwrap_or(0)));
            true
        }
        Slot::Occupied(Node::Leaf(_)) => !want_vacant,
        Slot::Occupied(Node::Branch(b)) => {
            let known = schema.domain_len(schema.var_at(depth));
            for i in (0..known).filter(|&i| matches(pattern, depth, i)) {
                path.push(i as u32);
                if search(&b.slots[i], schema, depth + 1, pattern, path, want_vacant) {
                    return true;
                }
                path.pop();
            }
            false
        }
    }
}

fn best_under<V, U: Utility>(
    slot: &Slot<U>,
    env: &Env<'_, V, U>,
    depth: usize,
    pattern: &[Option<u32>],
    path: &mut Vec<u32>,
    best: &mut Option<(Vec<u32>, U)>,
) {
    match slot {
        Slot::Occupied(Node::Leaf(leaf)) if leaf.real => {
            let u = leaf.utility(env.objective, env.bounds);
            if env.objective.is_infeasible(u) {
                return;
            }
            let wins = best
                .as_ref()
                .map_or(true, |(_, b)| env.objective.better(u, *b));
            if wins {
                *best = Some((path.clone(), u));
            }
        }
        Slot::Occupied(Node::Branch(b)) => {
            for (i, child) in b.slots.iter().enumerate() {
                if matches(pattern, depth, i) {
                    path.push(i as u32);
                    best_under(child, env, depth + 1, pattern, path, best);
                    path.pop();
                }
            }
        }
        _ => {}
    }
}

fn count<U>(slot: &Slot<U>) -> usize {
    match slot {
        Slot::Occupied(Node::Leaf(_)) => 1,
        Slot::Occupied(Node::Branch(b)) => b.slots.iter().map(count).sum(),
        Slot::Vacant | Slot::Pruned => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundCache;
    use crate::ledger::{Entry, Ledger};
    use crate::utility::Objective;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashMap;

    struct Fixture {
        schema: Schema<u8>,
        ledger: Ledger<i64>,
        bounds: BoundCache<i64>,
    }

    impl Fixture {
        fn new(children: usize) -> Self {
            Self {
                schema: Schema::new(
                    vec![("p".into(), vec![0, 1])],
                    vec![("o".into(), vec![0, 1, 2])],
                )
                .unwrap(),
                ledger: Ledger::new(children),
                bounds: BoundCache::new(Objective::Maximize, children),
            }
        }

        fn env(&self) -> Env<'_, u8, i64> {
            Env {
                objective: Objective::Maximize,
                schema: &self.schema,
                ledger: &self.ledger,
                bounds: &self.bounds,
                local: None,
            }
        }
    }

    #[test]
    fn push_materializes_matching_paths_only() {
        let mut fx = Fixture::new(1);
        fx.ledger.extend_separator(0, 0, 2);
        let current = Entry { utility: 4, confirmed: false };
        fx.ledger.record(0, vec![1], current);
        let mut tree = AggregationTree::new();
        let update = Update { sender: 0, previous: None, current };
        tree.push(&fx.env(), &[Some(1), None], Some(&update));
        assert_eq!(tree.count_leaves(), 3);
        assert_eq!(tree.leaves_created(), 3);
        let summary = tree.refresh(&fx.env());
        assert_eq!(summary.util, Some(4));
        assert!(summary.vacant);
        let (path, leaf) = tree.best_util_path().unwrap();
        assert_eq!(path, vec![1, 0]);
        assert!(leaf.real);
        assert!(tree.path_alive(&[Some(0), None]));
        assert_eq!(tree.find_unused(&fx.schema, &[None, Some(2)]), Some(vec![0, 2]));
    }

    #[test]
    fn prune_propagates_dead_branches() {
        let fx = Fixture::new(0);
        let mut tree = AggregationTree::new();
        tree.push(&fx.env(), &[Some(0), None], None);
        tree.push(&fx.env(), &[Some(1), None], None);
        assert_eq!(tree.count_leaves(), 6);
        tree.prune(&fx.env(), &[0]);
        assert!(!tree.path_alive(&[Some(0), None]));
        assert!(tree.path_alive(&[Some(1), Some(2)]));
        assert_eq!(tree.count_leaves(), 3);
        tree.prune(&fx.env(), &[1]);
        assert!(tree.is_pruned());
        assert_eq!(tree.refresh(&fx.env()), Summary::exhausted());
    }

    #[test]
    fn root_insertion_copies_subtree_under_each_slot() {
        let mut fx = Fixture::new(0);
        let mut tree = AggregationTree::new();
        tree.push(&fx.env(), &[Some(0), Some(1)], None);
        let x = fx.schema.discover("x");
        fx.schema.add_value(x, 9);
        tree.insert_root_level(&fx.env());
        assert_eq!(tree.count_leaves(), 2);
        // Reserved copy is synthetic, so only the value copy reports a utility.
        let (path, leaf) = tree.best_util_path().unwrap();
        assert_eq!(path, vec![0, 0, 1]);
        assert!(leaf.real);
        // Both copies share the bound; the lower index wins the tie.
        let (bound_path, _) = tree.best_bound_path().unwrap();
        assert_eq!(bound_path, vec![0, 0, 1]);

        fx.schema.add_value(x, 8);
        tree.grow_domain(&fx.env(), 0, 1, false);
        assert_eq!(tree.count_leaves(), 3);
        assert!(tree.path_alive(&[Some(2), Some(0), Some(1)]));
    }

    fn leaves(tree: &AggregationTree<i64>) -> Vec<(Vec<u32>, Leaf<i64>)> {
        fn walk(slot: &Slot<i64>, path: &mut Vec<u32>, out: &mut Vec<(Vec<u32>, Leaf<i64>)>) {
            match slot {
                Slot::Occupied(Node::Leaf(leaf)) => out.push((path.clone(), leaf.clone())),
                Slot::Occupied(Node::Branch(b)) => {
                    for (i, child) in b.slots.iter().enumerate() {
                        path.push(i as u32);
                        walk(child, path, out);
                        path.pop();
                    }
                }
                Slot::Vacant | Slot::Pruned => {}
            }
        }
        let mut out = Vec::new();
        walk(&tree.root, &mut Vec::new(), &mut out);
        out
    }

    /// A random report of one of two children on `p`, recorded and pushed in
    /// the same order as [`crate::GoodsTree::add_contribution`] does.
    fn random_report(fx: &mut Fixture, tree: &mut AggregationTree<i64>, rng: &mut StdRng) {
        let sender = rng.gen_range(0..2);
        let idx = rng.gen_range(0..2u32);
        if fx.ledger.get(sender, &[idx]).map_or(false, |e| e.confirmed) {
            return;
        }
        let confirmed = rng.gen_bool(0.5);
        let utility = match fx.bounds.bound(sender) {
            Some(b) if confirmed => rng.gen_range(-10..=b),
            _ => rng.gen_range(-10..40),
        };
        if confirmed {
            fx.bounds.tighten(sender, utility).unwrap();
        }
        let current = Entry { utility, confirmed };
        let previous = fx.ledger.record(sender, vec![idx], current);
        let mut partial = vec![None; fx.schema.len()];
        partial[fx.schema.depth_of(0)] = Some(idx);
        let update = Update { sender, previous, current };
        tree.push(&fx.env(), &partial, Some(&update));
    }

    /// Every leaf matches a fresh aggregation of the ledgers and its utility
    /// never beats its bound. Returns the utility of every leaf.
    fn check_leaves(fx: &Fixture, tree: &AggregationTree<i64>) -> HashMap<Vec<u32>, i64> {
        let env = fx.env();
        let mut utilities = HashMap::new();
        for (path, leaf) in leaves(tree) {
            assert_eq!(Some(&leaf), env.make_leaf(&path, leaf.real).as_ref(), "leaf {path:?}");
            let u = leaf.utility(env.objective, env.bounds);
            if let Some(b) = leaf.bound(env.bounds) {
                assert!(!env.objective.better(u, b), "utility {u} beats bound {b} at {path:?}");
            }
            utilities.insert(path, u);
        }
        utilities
    }

    #[test]
    fn random_reports_keep_leaves_consistent_across_root_insertion() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut fx = Fixture::new(2);
            fx.ledger.extend_separator(0, 0, 2);
            fx.ledger.extend_separator(1, 0, 2);
            let mut tree = AggregationTree::new();
            for _ in 0..12 {
                random_report(&mut fx, &mut tree, &mut rng);
            }
            let before = check_leaves(&fx, &tree);

            let x = fx.schema.discover("x");
            fx.schema.add_value(x, 9);
            tree.insert_root_level(&fx.env());
            let after = check_leaves(&fx, &tree);
            // One copy under `x = 9`, one under the reserved slot.
            assert_eq!(after.len(), 2 * before.len());
            for (path, u) in &after {
                assert_eq!(before.get(&path[1..]), Some(u), "copy at {path:?}");
            }

            for _ in 0..12 {
                random_report(&mut fx, &mut tree, &mut rng);
            }
            check_leaves(&fx, &tree);
        }
    }
}
