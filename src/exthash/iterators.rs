//! Iteration over the hash table: directory slots in index order, skipping
//! empty and shared entries, and within each owned bucket the elements in
//! key order. The combined order is unspecified as far as callers are
//! concerned.

use super::{ExtHash, ExtHashAdapt, Slot};
use crate::rbtree::iterators::{leftmost, next_in_order};
use crate::rbtree::Link;

pub struct Iter<'a, A: ExtHashAdapt> {
    table: &'a [Slot<A::Elem>],
    /// next directory slot to examine
    index: usize,
    /// position inside the current bucket
    next: Link<A::Elem>,
}

impl<'a, A: ExtHashAdapt> Iter<'a, A> {
    pub(crate) fn new(table: &'a ExtHash<A>) -> Self {
        Iter { table: &table.table, index: 0, next: None }
    }
}

impl<'a, A: ExtHashAdapt> Iterator for Iter<'a, A> {
    type Item = &'a A::Elem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.next {
                self.next = next_in_order::<A>(node);
                return Some(unsafe { node.as_ref() });
            }

            let slot = *self.table.get(self.index)?;
            self.index += 1;
            if let Slot::Root(root) = slot {
                self.next = leftmost::<A>(Some(root));
            }
        }
    }
}
