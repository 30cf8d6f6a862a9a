//! Derived def-use index.
//!
//! Each tracked value maps to the instructions that read it, one entry per operand slot, so an
//! instruction using a value twice appears twice. Every mutation on [`super::Procedure`] keeps
//! this index in step with the operand lists.

use super::inst::{InstId, Value};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UseMap {
    users: IndexMap<Value, Vec<InstId>>,
}

impl UseMap {
    pub(crate) fn add(&mut self, value: Value, user: InstId) {
        if value.is_tracked() {
            self.users.entry(value).or_default().push(user);
        }
    }

    /// Drops one occurrence of `user` from `value`'s use-list.
    pub(crate) fn remove(&mut self, value: Value, user: InstId) {
        if let Some(list) = self.users.get_mut(&value) {
            if let Some(pos) = list.iter().position(|u| *u == user) {
                list.swap_remove(pos);
            }
            if list.is_empty() {
                self.users.swap_remove(&value);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.users.clear();
    }

    /// Distinct users of `value`, ordered by instruction id.
    pub fn users(&self, value: Value) -> Vec<InstId> {
        let mut users = self.users.get(&value).cloned().unwrap_or_default();
        users.sort_unstable();
        users.dedup();
        users
    }

    /// Number of operand slots reading `value`.
    pub fn use_count(&self, value: Value) -> usize {
        self.users.get(&value).map_or(0, Vec::len)
    }

    pub fn has_uses(&self, value: Value) -> bool {
        self.use_count(value) > 0
    }

    /// Multiset view for comparing against a recomputed index.
    pub(crate) fn normalized(&self) -> Vec<(Value, Vec<InstId>)> {
        let mut out: Vec<(Value, Vec<InstId>)> = self
            .users
            .iter()
            .map(|(v, list)| {
                let mut list = list.clone();
                list.sort_unstable();
                (*v, list)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
