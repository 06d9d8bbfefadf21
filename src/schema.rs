//! Discovered variables, their domains and the tree's level order.
//!
//! Variables get a stable [`VarId`] on discovery and a depth in the tree. Own
//! variables sit at the deepest levels; every remote variable discovered at
//! runtime is inserted at depth 0, shifting the existing levels down.
//!
//! A variable whose domain is still open carries one *reserved* slot after its
//! known values. The reserved slot stands for every value not seen yet, so a
//! branch at that depth has `domain_len + 1` children.

use crate::error::{Result, TreeError};
use std::collections::HashMap;
use std::hash::Hash;

pub type VarId = usize;

/// Ledger coordinate of the reserved slot.
pub(crate) const WILDCARD: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub(crate) struct Variable<V> {
    name: String,
    values: Vec<V>,
    index: HashMap<V, u32>,
    own: bool,
    reserved: bool,
    final_size: Option<usize>,
}

impl<V: Clone + Eq + Hash> Variable<V> {
    fn closed(name: String, domain: Vec<V>, own: bool) -> Self {
        let index = domain
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i as u32))
            .collect();
        let size = domain.len();
        Self {
            name,
            values: domain,
            index,
            own,
            reserved: false,
            final_size: Some(size),
        }
    }

    fn open(name: String) -> Self {
        Self {
            name,
            values: Vec::new(),
            index: HashMap::new(),
            own: false,
            reserved: true,
            final_size: None,
        }
    }

    fn is_closed(&self) -> bool {
        self.final_size.map_or(false, |size| self.values.len() >= size)
    }
}

/// Result of [`Schema::add_value`] for a value seen for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AddedValue {
    pub index: u32,
    /// The new value completed the domain and the reserved slot is gone.
    pub reservation_dropped: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Schema<V> {
    vars: Vec<Variable<V>>,
    by_name: HashMap<String, VarId>,
    order: Vec<VarId>,
    depth: Vec<usize>,
    own_count: usize,
}

impl<V: Clone + Eq + Hash> Schema<V> {
    /// Schema with closed remote variables above closed own variables.
    pub fn new(remote: Vec<(String, Vec<V>)>, own: Vec<(String, Vec<V>)>) -> Result<Self> {
        let mut schema = Self {
            vars: Vec::new(),
            by_name: HashMap::new(),
            order: Vec::new(),
            depth: Vec::new(),
            own_count: own.len(),
        };
        let declared = remote
            .into_iter()
            .map(|d| (d, false))
            .chain(own.into_iter().map(|d| (d, true)));
        for ((name, domain), is_own) in declared {
            if schema.by_name.contains_key(&name) {
                return Err(TreeError::DuplicateVariable(name));
            }
            if domain.is_empty() {
                return Err(TreeError::DomainTooSmall {
                    variable: name,
                    size: 0,
                    known: 0,
                });
            }
            let id = schema.vars.len();
            schema.by_name.insert(name.clone(), id);
            schema.vars.push(Variable::closed(name, domain, is_own));
            schema.order.push(id);
        }
        schema.reindex();
        Ok(schema)
    }

    fn reindex(&mut self) {
        self.depth = vec![0; self.vars.len()];
        for (d, &id) in self.order.iter().enumerate() {
            self.depth[id] = d;
        }
    }

    /// Register a new open variable at depth 0.
    pub fn discover(&mut self, name: &str) -> VarId {
        let id = self.vars.len();
        self.vars.push(Variable::open(name.to_owned()));
        self.by_name.insert(name.to_owned(), id);
        self.order.insert(0, id);
        self.reindex();
        id
    }

    /// Fails when `value` is unseen and the domain is closed.
    pub fn check_value(&self, var: VarId, value: &V) -> Result<()> {
        let v = &self.vars[var];
        if v.index.contains_key(value) || !v.is_closed() {
            Ok(())
        } else {
            Err(TreeError::DomainClosed(v.name.clone()))
        }
    }

    /// Append an unseen value. Callers check with [`Schema::check_value`] first.
    pub fn add_value(&mut self, var: VarId, value: V) -> AddedValue {
        let v = &mut self.vars[var];
        debug_assert!(!v.index.contains_key(&value));
        let index = v.values.len() as u32;
        v.index.insert(value.clone(), index);
        v.values.push(value);
        let reservation_dropped = v.reserved && v.is_closed();
        if reservation_dropped {
            v.reserved = false;
        }
        AddedValue {
            index,
            reservation_dropped,
        }
    }

    /// Record the final domain size. Returns `true` when the reserved slot
    /// disappears right away because every value is already known.
    pub fn set_final_size(&mut self, var: VarId, size: usize) -> Result<bool> {
        let v = &mut self.vars[var];
        if size < v.values.len() || v.final_size.map_or(false, |s| s != size) {
            return Err(TreeError::DomainTooSmall {
                variable: v.name.clone(),
                size,
                known: v.values.len(),
            });
        }
        v.final_size = Some(size);
        let dropped = v.reserved && v.is_closed();
        if dropped {
            v.reserved = false;
        }
        Ok(dropped)
    }

    pub fn lookup(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    pub fn value_index(&self, var: VarId, value: &V) -> Option<u32> {
        self.vars[var].index.get(value).copied()
    }

    pub fn value(&self, var: VarId, index: u32) -> &V {
        &self.vars[var].values[index as usize]
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.vars[var].name
    }

    pub fn domain(&self, var: VarId) -> &[V] {
        &self.vars[var].values
    }

    pub fn is_own(&self, var: VarId) -> bool {
        self.vars[var].own
    }

    pub fn depth_of(&self, var: VarId) -> usize {
        self.depth[var]
    }

    pub fn var_at(&self, depth: usize) -> VarId {
        self.order[depth]
    }

    /// Number of levels in the tree.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn domain_len(&self, var: VarId) -> usize {
        self.vars[var].values.len()
    }

    /// Number of slots of a branch at `depth`.
    pub fn branching(&self, depth: usize) -> usize {
        let v = &self.vars[self.order[depth]];
        v.values.len() + usize::from(v.reserved)
    }

    pub fn is_reserved_slot(&self, depth: usize, index: u32) -> bool {
        let v = &self.vars[self.order[depth]];
        v.reserved && index as usize == v.values.len()
    }

    /// First depth occupied by an own variable. Depths above it hold the
    /// variables reported upward.
    pub fn own_depth(&self) -> usize {
        self.vars.len() - self.own_count
    }

    /// Number of full assignments over the known values.
    pub fn assignment_space(&self) -> f64 {
        self.vars.iter().map(|v| v.values.len() as f64).product()
    }
}
