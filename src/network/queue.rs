//! Defines the `FrontierQueue` of the ground network builder.
//!
//! Vertices waiting to be expanded are bucketed by attribute, so that each bucket can be expanded
//! with one batched data access call per dependency.

use crate::schema::AttrId;

use indexmap::{IndexMap, IndexSet};


#[derive(Clone, Debug, Default)]
pub struct FrontierQueue {
    buckets: IndexMap<AttrId, Vec<String>>,

    /// Every vertex ever pushed
    pushed: IndexSet<String>,
}

impl FrontierQueue {

    pub fn new() -> Self {
        FrontierQueue::default()
    }

    /// Push the vertex `id` of attribute `attr`.
    ///
    /// # Returns
    /// `false` if the vertex was pushed before. A vertex is expanded at most once.
    pub fn push(&mut self, attr: AttrId, id: &str) -> bool {
        if !self.pushed.insert(id.to_string()) {
            return false;
        }

        self.buckets.entry(attr).or_insert_with(Vec::new).push(id.to_string());
        true
    }

    /// Remove and return the oldest attribute bucket
    pub fn pop_bucket(&mut self) -> Option<(AttrId, Vec<String>)> {
        self.buckets.shift_remove_index(0)
    }

    /// `true` if the vertex `id` was ever pushed
    pub fn was_pushed(&self, id: &str) -> bool {
        self.pushed.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// The number of vertices waiting to be expanded
    pub fn len(&self) -> usize {
        self.buckets.values().map(|b| b.len()).sum()
    }
}
