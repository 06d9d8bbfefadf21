//! Local sub-problem overlay.
//!
//! The overlay tracks the node's current *local optimum*: the best candidate of
//! the [`LocalProblem`] whose partial path is still alive in the tree.
//! Candidates arrive best-first, so the current optimum's utility bounds the
//! local utility of every assignment that has not been exhausted yet.
//!
//! [`TableLocalProblem`] is a ready-made implementation over an explicit
//! utility table.

use crate::schema::{Schema, VarId};
use crate::traits::{LocalProblem, Utility};
use crate::tree::AggregationTree;
use crate::utility::Objective;
use std::fmt;
use std::hash::Hash;

/// Local utility over a small scope, stored as a dense row-major table.
///
/// The last variable varies fastest. Candidates are the feasible rows in
/// best-first order; ties keep table order.
#[derive(Debug, Clone)]
pub struct TableLocalProblem<V, U> {
    variables: Vec<String>,
    domains: Vec<Vec<V>>,
    utilities: Vec<U>,
    objective: Objective,
    order: Vec<usize>,
    cursor: usize,
}

impl<V: Clone + PartialEq, U: Utility> TableLocalProblem<V, U> {
    pub fn new(
        variables: Vec<String>,
        domains: Vec<Vec<V>>,
        utilities: Vec<U>,
        objective: Objective,
    ) -> Self {
        assert_eq!(variables.len(), domains.len());
        assert!(domains.iter().all(|d| !d.is_empty()), "empty local domain");
        let rows: usize = domains.iter().map(Vec::len).product();
        assert_eq!(utilities.len(), rows);
        let mut order: Vec<usize> = (0..rows)
            .filter(|&r| !objective.is_infeasible(utilities[r]))
            .collect();
        order.sort_by(|&a, &b| match objective {
            Objective::Maximize => utilities[b].cmp(&utilities[a]),
            Objective::Minimize => utilities[a].cmp(&utilities[b]),
        });
        Self {
            variables,
            domains,
            utilities,
            objective,
            order,
            cursor: 0,
        }
    }

    /// Tabulate `f` over the cross product of `domains`.
    pub fn from_fn(
        variables: Vec<String>,
        domains: Vec<Vec<V>>,
        objective: Objective,
        f: impl Fn(&[V]) -> U,
    ) -> Self {
        let rows: usize = domains.iter().map(Vec::len).product();
        let mut utilities = Vec::with_capacity(rows);
        let mut scratch = Vec::with_capacity(domains.len());
        for row in 0..rows {
            decode_into(&domains, row, &mut scratch);
            utilities.push(f(&scratch));
        }
        Self::new(variables, domains, utilities, objective)
    }

    fn row_of(&self, values: &[V]) -> Option<usize> {
        let mut row = 0;
        for (domain, value) in self.domains.iter().zip(values) {
            row = row * domain.len() + domain.iter().position(|v| v == value)?;
        }
        Some(row)
    }
}

fn decode_into<V: Clone>(domains: &[Vec<V>], mut row: usize, out: &mut Vec<V>) {
    out.clear();
    for domain in domains.iter().rev() {
        out.push(domain[row % domain.len()].clone());
        row /= domain.len();
    }
    out.reverse();
}

impl<V: Clone + PartialEq + Send, U: Utility> LocalProblem<V, U> for TableLocalProblem<V, U> {
    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn domain(&self, i: usize) -> &[V] {
        &self.domains[i]
    }

    fn utility(&self, values: &[V]) -> U {
        match self.row_of(values) {
            Some(row) if values.len() == self.domains.len() => self.utilities[row],
            _ => self.objective.infeasible(),
        }
    }

    fn next_candidate(&mut self) -> Option<(Vec<V>, U)> {
        let row = *self.order.get(self.cursor)?;
        self.cursor += 1;
        let mut values = Vec::with_capacity(self.domains.len());
        decode_into(&self.domains, row, &mut values);
        Some((values, self.utilities[row]))
    }

    fn restart(&mut self) {
        self.cursor = 0;
    }
}

/// Current local optimum, as value indices of the scope variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalOptimum<U> {
    pub coords: Vec<u32>,
    pub utility: U,
}

pub(crate) struct LocalOverlay<V, U> {
    problem: Box<dyn LocalProblem<V, U>>,
    scope: Vec<VarId>,
    optimum: Option<LocalOptimum<U>>,
}

impl<V: fmt::Debug, U: fmt::Debug> fmt::Debug for LocalOverlay<V, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalOverlay")
            .field("scope", &self.scope)
            .field("optimum", &self.optimum)
            .finish_non_exhaustive()
    }
}

impl<V: Clone + Eq + Hash, U: Utility> LocalOverlay<V, U> {
    /// `scope[i]` is the schema id of the problem's `i`-th variable.
    pub fn new(problem: Box<dyn LocalProblem<V, U>>, scope: Vec<VarId>) -> Self {
        debug_assert_eq!(problem.variables().len(), scope.len());
        Self {
            problem,
            scope,
            optimum: None,
        }
    }

    /// Local utility of a full tree path.
    pub fn utility_at(&self, schema: &Schema<V>, path: &[u32]) -> U {
        let values: Vec<V> = self
            .scope
            .iter()
            .map(|&var| schema.value(var, path[schema.depth_of(var)]).clone())
            .collect();
        self.problem.utility(&values)
    }

    pub fn optimum(&self) -> Option<&LocalOptimum<U>> {
        self.optimum.as_ref()
    }

    /// Tree-depth pattern of the current optimum; other depths are free.
    pub fn pattern(&self, schema: &Schema<V>) -> Option<Vec<Option<u32>>> {
        let opt = self.optimum.as_ref()?;
        let mut pattern = vec![None; schema.len()];
        for (&var, &idx) in self.scope.iter().zip(&opt.coords) {
            pattern[schema.depth_of(var)] = Some(idx);
        }
        Some(pattern)
    }

    /// Move to the next candidate whose path is alive.
    pub fn advance(&mut self, schema: &Schema<V>, tree: &AggregationTree<U>) {
        self.optimum = None;
        while let Some((values, utility)) = self.problem.next_candidate() {
            let coords: Option<Vec<u32>> = self
                .scope
                .iter()
                .zip(&values)
                .map(|(&var, v)| schema.value_index(var, v))
                .collect();
            let Some(coords) = coords else { continue };
            self.optimum = Some(LocalOptimum { coords, utility });
            let alive = self
                .pattern(schema)
                .map_or(false, |p| tree.path_alive(&p));
            if alive {
                return;
            }
            self.optimum = None;
        }
    }

    /// Advance only if the current optimum's path died.
    pub fn revalidate(&mut self, schema: &Schema<V>, tree: &AggregationTree<U>) {
        let alive = self
            .pattern(schema)
            .map_or(false, |p| tree.path_alive(&p));
        if !alive {
            self.advance(schema, tree);
        }
    }

    pub fn restart(&mut self, schema: &Schema<V>, tree: &AggregationTree<U>) {
        self.problem.restart();
        self.advance(schema, tree);
    }
}
