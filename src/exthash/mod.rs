//! Extendible hash table composing red-black trees as bucket storage.
//!
//! The directory is a flat array of `2^level` slots. A slot either owns a
//! bucket (the root of a red-black tree holding every element whose hash,
//! masked to `level` bits, equals the slot index), is empty, or shares its
//! bucket with a slot at a lower index. Shared slots are resolved by
//! clearing the highest set bit of the index until an owning slot is
//! reached; slot 0 is never shared, so the walk terminates.
//!
//! The directory only ever grows. An insert that lands in a bucket whose
//! root has both children (at least three elements) doubles the directory,
//! marking the new upper half as shared; an insert that lands in a shared
//! slot first unshares it by repartitioning the owning bucket on the
//! distinguishing hash bit. Growth stops at `max_level`; beyond that the
//! buckets simply grow deeper.

pub(crate) mod iterators;

use std::ptr::NonNull;

use log::{debug, trace};

use crate::adapt::GetHash;
use crate::rbtree::{self, link_of, Link, RbTreeAdapt};
use crate::types::errors::StoreError;
use crate::types::stats::HashStats;

pub use iterators::Iter;

//------------ Slot ----------------------------------------------------------

/// One directory entry. The shared state replaces the all-ones pointer
/// sentinel of pointer-based designs.
#[derive(Debug)]
pub(crate) enum Slot<T> {
    Empty,
    Root(NonNull<T>),
    Shared,
}

// hand-written so that Slot<T> is copyable for any element type
impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Slot<T> {}

impl<T> Slot<T> {
    fn from_link(link: Link<T>) -> Self {
        match link {
            Some(root) => Slot::Root(root),
            None => Slot::Empty,
        }
    }

    fn to_link(self) -> Link<T> {
        match self {
            Slot::Root(root) => Some(root),
            Slot::Empty => None,
            Slot::Shared => {
                debug_assert!(false, "shared slot was not resolved");
                None
            }
        }
    }

    fn is_shared(&self) -> bool {
        matches!(self, Slot::Shared)
    }
}

//------------ ExtHashAdapt --------------------------------------------------

/// Adapter for a hash-table membership: the ordered-tree contract for the
/// buckets plus hash functions over keys and elements.
pub trait ExtHashAdapt: RbTreeAdapt + GetHash {}

impl<A: RbTreeAdapt + GetHash> ExtHashAdapt for A {}

//------------ ExtHash -------------------------------------------------------

/// Extendible hash table over caller-owned elements.
#[derive(Debug)]
pub struct ExtHash<A: ExtHashAdapt> {
    table: Vec<Slot<A::Elem>>,
    len: usize,
    level: u8,
    max_level: u8,
    bucket_splits: usize,
    directory_doublings: usize,
    adapter: A,
}

impl<A: ExtHashAdapt> ExtHash<A> {
    /// Creates a table with a directory of `initial_size` slots, allowed to
    /// grow up to `max_size` slots. Both sizes are rounded down to the
    /// nearest power of two. Fails with `InvalidKey` unless
    /// `initial_size <= max_size` and the maximum directory is addressable.
    pub fn new(
        adapter: A,
        initial_size: usize,
        max_size: usize,
    ) -> Result<Self, StoreError> {
        if initial_size > max_size
            || max_size >= usize::MAX / std::mem::size_of::<usize>()
        {
            return Err(StoreError::InvalidKey);
        }

        let level = initial_size.max(1).ilog2() as u8;
        let max_level = max_size.max(1).ilog2() as u8;

        let table_len = 1usize << level;
        let mut table = Vec::new();
        table
            .try_reserve(table_len)
            .map_err(|_| StoreError::OutOfMemory)?;
        table.resize(table_len, Slot::Empty);

        Ok(ExtHash {
            table,
            len: 0,
            level,
            max_level,
            bucket_splits: 0,
            directory_doublings: 0,
            adapter,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// log2 of the current directory size.
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn stats(&self) -> HashStats {
        HashStats {
            elements: self.len,
            directory_len: self.table.len(),
            level: self.level,
            max_level: self.max_level,
            bucket_splits: self.bucket_splits,
            directory_doublings: self.directory_doublings,
        }
    }

    fn mask(&self) -> usize {
        self.table.len() - 1
    }

    /// Follows shared slots down to the owning slot. Returns the owning
    /// index and the last shared index seen on the way (0 if the slot was
    /// not shared).
    fn resolve(&self, mut idx: usize) -> (usize, usize) {
        let mut shared = 0;
        while self.table[idx].is_shared() {
            // slot 0 is never shared, so idx != 0 here; clearing the
            // highest set bit skips all intermediate zero bits at once
            shared = idx;
            idx ^= 1 << idx.ilog2();
        }
        (idx, shared)
    }

    /// Repartitions the bucket at `tabidx` with the next-higher slot that
    /// shares it, on the hash bit distinguishing the two slots.
    fn unshare(&mut self, tabidx: usize) -> Result<(), StoreError> {
        let mut highbit =
            if tabidx == 0 { 1 } else { 2usize << tabidx.ilog2() };
        let splitidx = loop {
            let splitidx = tabidx | highbit;
            if self.table[splitidx].is_shared() {
                break splitidx;
            }
            highbit <<= 1;
        };

        debug!(
            "unsharing bucket {:#x} into {:#x} on bit {:#x}",
            tabidx, splitidx, highbit
        );

        let mut tree = self.table[tabidx].to_link();
        let mut tree2: Link<A::Elem> = None;
        let mut err = Ok(());

        let mut cur = rbtree::iterators::leftmost::<A>(tree);
        while let Some(node) = cur {
            // the step is taken before the element may be unlinked
            cur = rbtree::iterators::next_in_order::<A>(node);
            let hash = self.adapter.hash_elem(unsafe { node.as_ref() });
            if hash & highbit != 0 {
                rbtree::unlink_node::<A>(&mut tree, node);
                let res = unsafe {
                    rbtree::insert_node::<A>(&mut tree2, &self.adapter, node)
                };
                if let Err(e) = res {
                    if err.is_ok() {
                        err = Err(e);
                    }
                }
            }
        }

        self.table[tabidx] = Slot::from_link(tree);
        self.table[splitidx] = Slot::from_link(tree2);
        self.bucket_splits += 1;

        err
    }

    /// Doubles the directory, marking the new upper half as shared with the
    /// lower half. Does nothing once `max_level` is reached.
    fn double_directory(&mut self) -> Result<(), StoreError> {
        if self.level >= self.max_level {
            return Ok(());
        }

        let old_len = self.table.len();
        self.table
            .try_reserve(old_len)
            .map_err(|_| StoreError::OutOfMemory)?;
        for _ in 0..old_len {
            self.table.push(Slot::Shared);
        }
        self.level += 1;
        self.directory_doublings += 1;

        trace!("directory doubled to 2^{} slots", self.level);

        Ok(())
    }

    /// Inserts `new`, hashed by the adapter. Returns `AlreadyExists` and
    /// leaves the table unchanged if an element with an equal key is
    /// present in the target bucket.
    ///
    /// # Safety
    ///
    /// `new` must point to a live element that is not linked into any tree
    /// through its tree link header, and it must stay valid until it is
    /// removed or the table is cleared.
    pub unsafe fn insert(
        &mut self,
        new: NonNull<A::Elem>,
    ) -> Result<(), StoreError> {
        let hash = self.adapter.hash_elem(new.as_ref());
        let (mut tabidx, sharedidx) = self.resolve(hash & self.mask());

        if sharedidx != 0 {
            self.unshare(tabidx)?;
            if !self.table[sharedidx].is_shared() {
                // sharedidx was the split target one level up, and the new
                // element's hash carries that bit
                tabidx = sharedidx;
            }
        } else if let Slot::Root(root) = self.table[tabidx] {
            if link_of::<A>(root).left().is_some()
                && link_of::<A>(root).right().is_some()
            {
                // three or more elements in this bucket
                self.double_directory()?;
            }
        }

        let mut root = self.table[tabidx].to_link();
        rbtree::insert_node::<A>(&mut root, &self.adapter, new)?;
        self.table[tabidx] = Slot::from_link(root);

        self.len += 1;
        Ok(())
    }

    pub fn find(&self, key: &A::Key) -> Option<&A::Elem> {
        let (tabidx, _) =
            self.resolve(self.adapter.hash_key(key) & self.mask());
        rbtree::find_node::<A>(
            self.table[tabidx].to_link(),
            &self.adapter,
            key,
        )
        .map(|n| unsafe { n.as_ref() })
    }

    /// Unlinks the element with the given key and returns it with a reset
    /// link header.
    pub fn remove(
        &mut self,
        key: &A::Key,
    ) -> Result<NonNull<A::Elem>, StoreError> {
        let (tabidx, _) =
            self.resolve(self.adapter.hash_key(key) & self.mask());
        let mut root = self.table[tabidx].to_link();
        let node = rbtree::remove_node::<A>(&mut root, &self.adapter, key)?;
        self.table[tabidx] = Slot::from_link(root);
        self.len -= 1;
        Ok(node)
    }

    /// Empties every bucket, invoking the adapter's delete callback per
    /// element, and resets every slot. The directory keeps its size; it
    /// never shrinks. The first callback error is reported after the table
    /// has been emptied.
    pub fn remove_all(&mut self) -> Result<(), StoreError> {
        let mut err = Ok(());
        for i in 0..self.table.len() {
            if let Slot::Root(root) = self.table[i] {
                let mut root = Some(root);
                if let Err(e) =
                    rbtree::remove_all_nodes::<A>(&mut root, &self.adapter)
                {
                    if err.is_ok() {
                        err = Err(e);
                    }
                }
            }
            self.table[i] = Slot::Empty;
        }
        self.len = 0;
        err
    }

    /// Synonym of [`ExtHash::remove_all`].
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.remove_all()
    }

    /// Iterates over all elements in unspecified order: directory slots in
    /// index order, bucket elements in key order.
    pub fn iter(&self) -> Iter<'_, A> {
        Iter::new(self)
    }

    /// Verifies every owned bucket's tree invariants, that every element
    /// hashes back to the slot owning its bucket, and that the element
    /// count matches `len`.
    pub fn check_invariant(&self) -> Result<(), StoreError> {
        let mut total = 0;
        for (i, slot) in self.table.iter().enumerate() {
            let Slot::Root(root) = *slot else { continue };
            let root = Some(root);
            rbtree::check_invariant::<A>(root, &self.adapter)?;

            let mut cur = rbtree::iterators::leftmost::<A>(root);
            while let Some(node) = cur {
                let hash = self.adapter.hash_elem(unsafe { node.as_ref() });
                let (tabidx, _) = self.resolve(hash & self.mask());
                if tabidx != i {
                    return Err(StoreError::InvariantViolated);
                }
                total += 1;
                cur = rbtree::iterators::next_in_order::<A>(node);
            }
        }

        if total != self.len {
            return Err(StoreError::InvariantViolated);
        }
        Ok(())
    }
}

impl<A: ExtHashAdapt> Drop for ExtHash<A> {
    fn drop(&mut self) {
        // Unlink only; element memory belongs to the caller. The delete
        // callback runs on the explicit teardown paths exclusively.
        for i in 0..self.table.len() {
            if let Slot::Root(root) = self.table[i] {
                let mut root = Some(root);
                rbtree::unlink_all_nodes::<A>(&mut root);
            }
            self.table[i] = Slot::Empty;
        }
    }
}
