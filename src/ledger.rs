//! Per-child contribution ledger.
//!
//! Each child has a *separator*: the variables it has reported so far, in the
//! order it first reported them. Its entries are keyed by the value indices of
//! exactly those variables. When a separator variable still has a reserved
//! slot, entries may also live under the [`WILDCARD`] coordinate, which stands
//! for every value not seen yet and is copied to a value when it appears.

use crate::schema::{Schema, VarId, WILDCARD};
use std::collections::HashMap;
use std::hash::Hash;

/// Latest report of one child for one restricted assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Entry<U> {
    pub utility: U,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default)]
struct SenderLedger<U> {
    separator: Vec<VarId>,
    entries: HashMap<Vec<u32>, Entry<U>>,
}

#[derive(Debug, Clone)]
pub(crate) struct Ledger<U> {
    senders: Vec<SenderLedger<U>>,
}

impl<U: Copy + PartialEq> Ledger<U> {
    pub fn new(children: usize) -> Self {
        Self {
            senders: (0..children)
                .map(|_| SenderLedger {
                    separator: Vec::new(),
                    entries: HashMap::new(),
                })
                .collect(),
        }
    }

    pub fn separator(&self, sender: usize) -> &[VarId] {
        &self.senders[sender].separator
    }

    pub fn depends_on(&self, sender: usize, var: VarId) -> bool {
        self.senders[sender].separator.contains(&var)
    }

    /// Add `var` to the sender's separator. Existing entries are replicated
    /// uniformly over the `known` values of `var` and its wildcard coordinate.
    pub fn extend_separator(&mut self, sender: usize, var: VarId, known: usize) {
        let ledger = &mut self.senders[sender];
        debug_assert!(!ledger.separator.contains(&var));
        ledger.separator.push(var);
        let old = std::mem::take(&mut ledger.entries);
        for (key, entry) in old {
            for idx in (0..known as u32).chain(std::iter::once(WILDCARD)) {
                let mut k = key.clone();
                k.push(idx);
                ledger.entries.insert(k, entry);
            }
        }
    }

    /// A new value `index` of `var` appeared: every wildcard entry of a
    /// sender depending on `var` now also holds for that value.
    pub fn widen(&mut self, var: VarId, index: u32) {
        for ledger in &mut self.senders {
            let Some(pos) = ledger.separator.iter().position(|&v| v == var) else {
                continue;
            };
            let copies: Vec<(Vec<u32>, Entry<U>)> = ledger
                .entries
                .iter()
                .filter(|(k, _)| k[pos] == WILDCARD)
                .map(|(k, e)| {
                    let mut k = k.clone();
                    k[pos] = index;
                    (k, *e)
                })
                .collect();
            ledger.entries.extend(copies);
        }
    }

    /// Key of the sender's entry covering a full tree path.
    pub fn key_at<V: Clone + Eq + Hash>(
        &self,
        sender: usize,
        schema: &Schema<V>,
        path: &[u32],
    ) -> Vec<u32> {
        self.senders[sender]
            .separator
            .iter()
            .map(|&var| {
                let depth = schema.depth_of(var);
                let idx = path[depth];
                if schema.is_reserved_slot(depth, idx) {
                    WILDCARD
                } else {
                    idx
                }
            })
            .collect()
    }

    pub fn get(&self, sender: usize, key: &[u32]) -> Option<&Entry<U>> {
        self.senders[sender].entries.get(key)
    }

    /// Store a report, returning the entry it replaces.
    pub fn record(&mut self, sender: usize, key: Vec<u32>, entry: Entry<U>) -> Option<Entry<U>> {
        let slot = self.senders[sender].entries.entry(key);
        match slot {
            std::collections::hash_map::Entry::Occupied(mut o) => {
                debug_assert!(!o.get().confirmed || *o.get() == entry);
                Some(o.insert(entry))
            }
            std::collections::hash_map::Entry::Vacant(v) => {
                v.insert(entry);
                None
            }
        }
    }

    pub fn entry_count(&self, sender: usize) -> usize {
        self.senders[sender].entries.len()
    }
}
