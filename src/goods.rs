//! [`GoodsTree`]: the node-level entry point.
//!
//! A contribution flows through schema growth, the ledger and the bound cache
//! before being pushed into the aggregation tree. Extraction reads the cached
//! best path, decides whether it can be certified, and prunes it if so.

use crate::bounds::BoundCache;
use crate::contribution::{Contribution, Good};
use crate::error::{Result, TreeError};
use crate::ledger::{Entry, Ledger};
use crate::local::LocalOverlay;
use crate::node::{Env, Summary, Update};
use crate::schema::{Schema, WILDCARD};
use crate::traits::Utility;
use crate::tree::AggregationTree;
use crate::utility::Objective;
use std::collections::HashMap;
use std::hash::Hash;

/// Counters describing what the tree has seen and done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Contributions accepted, stale ones excluded.
    pub contributions: usize,
    pub speculative_contributions: usize,
    /// Contributions dropped because they repeat a confirmed report.
    pub stale_contributions: usize,
    pub leaves_created: usize,
    /// Leaves created below a reserved slot.
    pub synthetic_leaves_created: usize,
    pub live_leaves: usize,
    pub ledger_entries: usize,
    pub goods_emitted: usize,
    pub confirmed_goods: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Fresh,
    Stale,
}

#[derive(Debug, Clone)]
struct Certified<V, U> {
    good: Good<V, U>,
    own: Vec<V>,
}

/// Incremental utility-aggregation tree of one node.
///
/// Build one with [`crate::GoodsTreeBuilder`].
#[derive(Debug)]
pub struct GoodsTree<V, U> {
    objective: Objective,
    schema: Schema<V>,
    ledger: Ledger<U>,
    bounds: BoundCache<U>,
    tree: AggregationTree<U>,
    local: Option<LocalOverlay<V, U>>,
    certified: Vec<Certified<V, U>>,
    last_speculative: Option<Good<V, U>>,
    news: bool,
    stats: TreeStats,
}

impl<V, U> GoodsTree<V, U>
where
    V: Clone + Eq + Hash,
    U: Utility,
{
    pub(crate) fn from_parts(
        objective: Objective,
        children: usize,
        schema: Schema<V>,
        local: Option<LocalOverlay<V, U>>,
    ) -> Self {
        let mut goods = Self {
            objective,
            schema,
            ledger: Ledger::new(children),
            bounds: BoundCache::new(objective, children),
            tree: AggregationTree::new(),
            local,
            certified: Vec::new(),
            last_speculative: None,
            news: true,
            stats: TreeStats::default(),
        };
        if let Some(local) = goods.local.as_mut() {
            local.advance(&goods.schema, &goods.tree);
        }
        goods
    }

    fn split(&mut self) -> (Env<'_, V, U>, &mut AggregationTree<U>) {
        let env = Env {
            objective: self.objective,
            schema: &self.schema,
            ledger: &self.ledger,
            bounds: &self.bounds,
            local: self.local.as_ref(),
        };
        (env, &mut self.tree)
    }

    fn refresh(&mut self) -> Summary<U> {
        let (env, tree) = self.split();
        tree.refresh(&env)
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn children(&self) -> usize {
        self.bounds.children()
    }

    /// Record a child's report and push it into the tree.
    ///
    /// Returns the number of variables seen for the first time.
    ///
    /// A report that repeats an already confirmed one is not recorded, but the
    /// variables and values it mentions are still discovered and counted. On
    /// error nothing has changed, so a report conflicting with a confirmed one
    /// discovers nothing either.
    pub fn add_contribution(&mut self, sender: usize, c: &Contribution<V, U>) -> Result<usize> {
        #[cfg(feature = "tracing")]
        let span = tracing::trace_span!("add_contribution", sender, confirmed = c.confirmed);
        #[cfg(feature = "tracing")]
        let _enter = span.enter();

        let verdict = self.validate(sender, c)?;
        let new_variables = self.grow_schema(c);
        self.extend_separator(sender, c);
        if verdict == Verdict::Stale {
            self.stats.stale_contributions += 1;
            return Ok(new_variables);
        }
        self.stats.contributions += 1;
        if !c.confirmed {
            self.stats.speculative_contributions += 1;
        }

        let mut key = Vec::with_capacity(self.ledger.separator(sender).len());
        let mut partial = vec![None; self.schema.len()];
        for &var in self.ledger.separator(sender) {
            let idx = position(c, self.schema.name(var))
                .and_then(|pos| self.schema.value_index(var, &c.values[pos]))
                .ok_or_else(|| TreeError::UnknownVariable(self.schema.name(var).to_owned()))?;
            key.push(idx);
            partial[self.schema.depth_of(var)] = Some(idx);
        }

        if c.confirmed {
            self.bounds.tighten(sender, c.utility)?;
        }
        let current = Entry {
            utility: c.utility,
            confirmed: c.confirmed,
        };
        let previous = self.ledger.record(sender, key, current);
        let update = Update {
            sender,
            previous,
            current,
        };
        let (env, tree) = self.split();
        tree.push(&env, &partial, Some(&update));
        self.news = true;
        Ok(new_variables)
    }

    fn validate(&self, sender: usize, c: &Contribution<V, U>) -> Result<Verdict> {
        let children = self.children();
        if sender >= children {
            return Err(TreeError::UnknownSender { sender, children });
        }
        if c.variables.len() != c.values.len() {
            return Err(TreeError::ArityMismatch {
                variables: c.variables.len(),
                values: c.values.len(),
            });
        }
        for (i, name) in c.variables.iter().enumerate() {
            if c.variables[..i].contains(name) {
                return Err(TreeError::DuplicateVariable(name.clone()));
            }
        }
        if c.utility == self.objective.unbounded() {
            return Err(TreeError::UnboundedUtility);
        }
        for (name, value) in c.variables.iter().zip(&c.values) {
            if let Some(var) = self.schema.lookup(name) {
                self.schema.check_value(var, value)?;
            }
        }
        for &var in self.ledger.separator(sender) {
            let name = self.schema.name(var);
            if position(c, name).is_none() {
                return Err(TreeError::MissingSeparatorVariable {
                    sender,
                    variable: name.to_owned(),
                });
            }
        }
        if let Some(prev) = self.prospective_entry(sender, c) {
            if prev.confirmed {
                if c.confirmed && prev.utility != c.utility {
                    return Err(TreeError::ConfirmedConflict { sender });
                }
                return Ok(Verdict::Stale);
            }
        }
        if c.confirmed {
            self.bounds.check(sender, c.utility)?;
        }
        Ok(Verdict::Fresh)
    }

    /// Ledger entry the contribution would replace, looked up before any
    /// schema growth. Unseen values map to the wildcard coordinate.
    fn prospective_entry(&self, sender: usize, c: &Contribution<V, U>) -> Option<&Entry<U>> {
        let key: Option<Vec<u32>> = self
            .ledger
            .separator(sender)
            .iter()
            .map(|&var| {
                let pos = position(c, self.schema.name(var))?;
                Some(
                    self.schema
                        .value_index(var, &c.values[pos])
                        .unwrap_or(WILDCARD),
                )
            })
            .collect();
        self.ledger.get(sender, &key?)
    }

    fn grow_schema(&mut self, c: &Contribution<V, U>) -> usize {
        let mut new_variables = 0;
        for (name, value) in c.variables.iter().zip(&c.values) {
            match self.schema.lookup(name) {
                None => {
                    #[cfg(feature = "tracing")]
                    let span = tracing::trace_span!("insert_level", variable = %name);
                    #[cfg(feature = "tracing")]
                    let _enter = span.enter();

                    let var = self.schema.discover(name);
                    self.schema.add_value(var, value.clone());
                    let (env, tree) = self.split();
                    tree.insert_root_level(&env);
                    new_variables += 1;
                    #[cfg(feature = "tracing")]
                    tracing::debug!(variable = %name, levels = self.schema.len(), "new variable");
                }
                Some(var) if self.schema.value_index(var, value).is_none() => {
                    let added = self.schema.add_value(var, value.clone());
                    self.ledger.widen(var, added.index);
                    let depth = self.schema.depth_of(var);
                    let (env, tree) = self.split();
                    tree.grow_domain(&env, depth, added.index, added.reservation_dropped);
                }
                Some(_) => {}
            }
        }
        new_variables
    }

    /// Make `sender` depend on every variable `c` mentions.
    fn extend_separator(&mut self, sender: usize, c: &Contribution<V, U>) {
        for name in &c.variables {
            let Some(var) = self.schema.lookup(name) else {
                continue;
            };
            if !self.ledger.depends_on(sender, var) {
                let known = self.schema.domain_len(var);
                self.ledger.extend_separator(sender, var, known);
            }
        }
    }

    /// Whether a contribution repeats an assignment the sender already
    /// confirmed, and can be dropped.
    pub fn is_contribution_stale(&self, c: &Contribution<V, U>, sender: usize) -> bool {
        sender < self.children()
            && c.variables.len() == c.values.len()
            && self
                .prospective_entry(sender, c)
                .map_or(false, |e| e.confirmed)
    }

    /// Current best assignment of the variables reported upward.
    ///
    /// A confirmed answer is removed from the tree and never returned again.
    /// A speculative answer stays; asking again with no new information in
    /// between yields `None` instead of the same answer.
    ///
    /// A confirmed answer lists no variables when every variable of the node
    /// is its own. A speculative answer with no variables is never returned.
    pub fn extract_best(&mut self) -> Option<Good<V, U>> {
        #[cfg(feature = "tracing")]
        let span = tracing::trace_span!("extract_best");
        #[cfg(feature = "tracing")]
        let _enter = span.enter();

        if self.tree.is_pruned() {
            return None;
        }
        let mut summary = self.refresh();
        if self.is_dead(&summary) {
            self.tree.kill();
            #[cfg(feature = "tracing")]
            tracing::debug!("tree exhausted");
            return None;
        }
        let ready = self.bounds.is_ready();

        if let Some(local_util) = self.local_optimum_utility() {
            let local_wins = summary
                .util
                .map_or(true, |u| self.objective.better(local_util, u));
            if !ready || local_wins {
                let path = self
                    .local
                    .as_ref()
                    .and_then(|l| l.pattern(&self.schema))
                    .and_then(|p| self.tree.find_unused(&self.schema, &p));
                let Some(path) = path else {
                    self.news = false;
                    return None;
                };
                if !ready {
                    let good = self.good_at(&path, local_util, false);
                    return self.emit_speculative(good);
                }
                let partial: Vec<Option<u32>> = path.iter().map(|&i| Some(i)).collect();
                let (env, tree) = self.split();
                tree.push(&env, &partial, None);
                summary = self.refresh();
            }
        }

        let Some(util) = summary.util else {
            self.news = false;
            return None;
        };
        let Some((path, leaf)) = self.tree.best_util_path() else {
            self.news = false;
            return None;
        };
        let confirmed = ready
            && leaf.is_settled()
            && summary
                .bound
                .map_or(false, |b| !self.objective.better(b, util))
            && (!summary.vacant || !self.objective.better(self.vacant_bound(), util));

        if confirmed {
            Some(self.certify(path, util))
        } else {
            let good = self.good_at(&path, util, false);
            self.emit_speculative(good)
        }
    }

    fn certify(&mut self, path: Vec<u32>, util: U) -> Good<V, U> {
        let own_depth = self.schema.own_depth();
        let good = self.good_at(&path, util, true);
        let own = (own_depth..self.schema.len())
            .map(|d| self.schema.value(self.schema.var_at(d), path[d]).clone())
            .collect();
        self.certified.push(Certified {
            good: good.clone(),
            own,
        });
        let (env, tree) = self.split();
        tree.prune(&env, &path[..own_depth]);
        if let Some(local) = self.local.as_mut() {
            local.revalidate(&self.schema, &self.tree);
        }
        self.news = true;
        self.stats.goods_emitted += 1;
        self.stats.confirmed_goods += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(remaining = self.tree.count_leaves(), "confirmed good");
        good
    }

    fn emit_speculative(&mut self, good: Good<V, U>) -> Option<Good<V, U>> {
        let news = std::mem::replace(&mut self.news, false);
        if good.variables.is_empty() || (!news && self.last_speculative.as_ref() == Some(&good)) {
            return None;
        }
        self.last_speculative = Some(good.clone());
        self.stats.goods_emitted += 1;
        Some(good)
    }

    fn good_at(&self, path: &[u32], utility: U, confirmed: bool) -> Good<V, U> {
        let outside = 0..self.schema.own_depth();
        let (variables, values) = outside
            .map(|d| {
                let var = self.schema.var_at(d);
                (
                    self.schema.name(var).to_owned(),
                    self.schema.value(var, path[d]).clone(),
                )
            })
            .unzip();
        Good {
            variables,
            values,
            utility,
            confirmed,
        }
    }

    fn local_optimum_utility(&self) -> Option<U> {
        self.local.as_ref()?.optimum().map(|o| o.utility)
    }

    /// Best utility any not yet materialized assignment could still reach.
    fn vacant_bound(&self) -> U {
        let floor = match &self.local {
            Some(local) => local
                .optimum()
                .map_or_else(|| self.objective.infeasible(), |o| o.utility),
            None => U::zero(),
        };
        match self.bounds.total() {
            Some(total) => floor.plus(total),
            None => self.objective.unbounded(),
        }
    }

    fn is_dead(&self, summary: &Summary<U>) -> bool {
        let infeasible = |u: U| self.objective.is_infeasible(u);
        self.bounds.is_ready()
            && summary.bound.map_or(true, infeasible)
            && (!summary.vacant || infeasible(self.vacant_bound()))
    }

    fn exhausted(&mut self) -> bool {
        if self.tree.is_pruned() {
            return true;
        }
        let summary = self.refresh();
        if self.is_dead(&summary) {
            self.tree.kill();
            true
        } else {
            false
        }
    }

    /// Whether extraction can still produce anything.
    pub fn has_more(&mut self) -> bool {
        !self.exhausted()
    }

    /// Tighten a child's bound explicitly.
    pub fn tighten_bound(&mut self, sender: usize, bound: U) -> Result<()> {
        let children = self.children();
        if sender >= children {
            return Err(TreeError::UnknownSender { sender, children });
        }
        if self.bounds.tighten(sender, bound)? != crate::bounds::Tightening::Unchanged {
            self.news = true;
        }
        Ok(())
    }

    /// The child will send nothing more: every assignment it has not reported
    /// is infeasible. Returns `true` if the tree is now exhausted.
    pub fn set_child_done(&mut self, sender: usize) -> Result<bool> {
        self.tighten_bound(sender, self.objective.infeasible())?;
        Ok(self.exhausted())
    }

    /// Close the domain of `variable` at `size` values.
    pub fn set_final_domain_size(&mut self, variable: &str, size: usize) -> Result<()> {
        let var = self
            .schema
            .lookup(variable)
            .ok_or_else(|| TreeError::UnknownVariable(variable.to_owned()))?;
        if self.schema.set_final_size(var, size)? {
            let depth = self.schema.depth_of(var);
            let (env, tree) = self.split();
            tree.drop_reserved(&env, depth);
            if let Some(local) = self.local.as_mut() {
                local.revalidate(&self.schema, &self.tree);
            }
            self.news = true;
        }
        Ok(())
    }

    /// Values of the own variables that go with `context`, an assignment of
    /// the variables reported upward (as decided by the parent).
    ///
    /// Certified goods are remembered after pruning; otherwise the best live
    /// leaf consistent with `context` is used.
    pub fn best_own_assignment(&mut self, context: &HashMap<String, V>) -> Option<Vec<V>> {
        let matches = |good: &Good<V, U>| {
            good.variables
                .iter()
                .zip(&good.values)
                .all(|(n, v)| context.get(n) == Some(v))
        };
        if let Some(done) = self.certified.iter().find(|c| matches(&c.good)) {
            return Some(done.own.clone());
        }
        let own_depth = self.schema.own_depth();
        let mut pattern = vec![None; self.schema.len()];
        for (depth, slot) in pattern.iter_mut().enumerate().take(own_depth) {
            let var = self.schema.var_at(depth);
            if let Some(value) = context.get(self.schema.name(var)) {
                *slot = Some(self.schema.value_index(var, value)?);
            }
        }
        self.refresh();
        let (env, tree) = self.split();
        let (path, _) = tree.best_under(&env, &pattern)?;
        Some(
            (own_depth..self.schema.len())
                .map(|d| self.schema.value(self.schema.var_at(d), path[d]).clone())
                .collect(),
        )
    }

    /// Restriction of `assignment` to the variables `sender` reports on.
    pub fn child_context(
        &self,
        sender: usize,
        assignment: &HashMap<String, V>,
    ) -> Result<Vec<(String, V)>> {
        let children = self.children();
        if sender >= children {
            return Err(TreeError::UnknownSender { sender, children });
        }
        Ok(self
            .ledger
            .separator(sender)
            .iter()
            .filter_map(|&var| {
                let name = self.schema.name(var);
                assignment.get(name).map(|v| (name.to_owned(), v.clone()))
            })
            .collect())
    }

    /// The assignment with the best bound, if it only uses known values.
    pub fn optimistic_good(&mut self) -> Option<Good<V, U>> {
        self.refresh();
        let (path, leaf) = self.tree.best_bound_path()?;
        let bound = leaf.bound(&self.bounds)?;
        let reserved = (0..self.schema.own_depth()).any(|d| self.schema.is_reserved_slot(d, path[d]));
        if reserved {
            return None;
        }
        Some(self.good_at(&path, bound, false))
    }

    /// Best bound over every materialized assignment, once all child bounds
    /// are known.
    pub fn upper_bound(&mut self) -> Option<U> {
        self.refresh().bound
    }

    pub fn knows_variable(&self, name: &str) -> bool {
        self.schema.lookup(name).is_some()
    }

    pub fn variable_count(&self) -> usize {
        self.schema.len()
    }

    /// Variable names in tree order, outermost first.
    pub fn variables(&self) -> Vec<&str> {
        (0..self.schema.len())
            .map(|d| self.schema.name(self.schema.var_at(d)))
            .collect()
    }

    pub fn own_variables(&self) -> Vec<&str> {
        (self.schema.own_depth()..self.schema.len())
            .map(|d| self.schema.name(self.schema.var_at(d)))
            .collect()
    }

    /// Known values of every variable, in tree order.
    pub fn domains(&self) -> Vec<(&str, &[V])> {
        (0..self.schema.len())
            .map(|d| {
                let var = self.schema.var_at(d);
                debug_assert_eq!(self.schema.is_own(var), d >= self.schema.own_depth());
                (self.schema.name(var), self.schema.domain(var))
            })
            .collect()
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            leaves_created: self.tree.leaves_created(),
            synthetic_leaves_created: self.tree.synthetic_leaves_created(),
            live_leaves: self.tree.count_leaves(),
            ledger_entries: (0..self.children())
                .map(|s| self.ledger.entry_count(s))
                .sum(),
            ..self.stats
        }
    }

    /// Live leaves over the number of assignments of the known values.
    pub fn fill_ratio(&self) -> f64 {
        let space = self.schema.assignment_space();
        if space == 0.0 {
            0.0
        } else {
            self.tree.count_leaves() as f64 / space
        }
    }

    /// Rewind the local candidate stream, e.g. after the local problem changed.
    pub fn restart_local_search(&mut self) {
        if let Some(local) = self.local.as_mut() {
            local.restart(&self.schema, &self.tree);
            self.news = true;
        }
    }
}

fn position<V, U>(c: &Contribution<V, U>, name: &str) -> Option<usize> {
    c.variables.iter().position(|v| v == name)
}
