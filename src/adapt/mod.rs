//! Adapter traits that let caller-owned element types participate in the
//! collections without the collections knowing the element type.
//!
//! An adapter bundles up to four capability groups, each of them optional
//! and only demanded by the collections that need it:
//!
//! - lifetime: [`TypeAdapt::delete`], invoked by the bulk teardown paths,
//! - ordering: [`KeyComparator`], required by the ordered tree and, through
//!   it, by the hash table,
//! - key extraction: [`GetBinaryKey`], required by the crit-bit trie,
//! - hashing: [`GetHash`], required by the hash table.
//!
//! No runtime node offset is needed to translate between elements and
//! link headers: every collection's adapter trait carries a `link`
//! accessor returning a reference to the header embedded in the element.
//! One element type can take part in several collections at once by
//! embedding several link headers and providing one adapter type per
//! membership.

use std::cmp::Ordering;
use std::ptr::NonNull;

use crate::types::errors::StoreError;

/// Base contract between a collection and the element type stored in it.
///
/// `Elem` is the caller-owned element type, `Key` the type lookups are
/// keyed by. The collections store raw element pointers and never copy or
/// own element memory; the only place a collection touches element lifetime
/// is [`TypeAdapt::delete`] on the `clear`/`remove_all` paths.
pub trait TypeAdapt {
    type Elem;
    type Key: ?Sized;

    /// Deletes one element during a bulk teardown.
    ///
    /// The default implementation does nothing, which makes the lifetime
    /// capability optional: collections then unlink elements without
    /// touching them. An implementation may free the element memory; the
    /// collection has already reset the element's link header and will not
    /// access the element again.
    fn delete(&self, elem: NonNull<Self::Elem>) -> Result<(), StoreError> {
        let _ = elem;
        Ok(())
    }
}

/// Total orders over elements and over (key, element) pairs.
///
/// Both orders must agree on the key material an element carries:
/// `cmp_key(k, e) == Ordering::Equal` exactly when `k` equals the key of
/// `e`, and `cmp_elems` must order elements by those same keys.
pub trait KeyComparator: TypeAdapt {
    fn cmp_key(&self, key: &Self::Key, elem: &Self::Elem) -> Ordering;

    fn cmp_elems(&self, a: &Self::Elem, b: &Self::Elem) -> Ordering;
}

/// Borrows the binary key of an element.
///
/// The returned slice borrows from the element; the crit-bit trie consults
/// it during insert (to compute the first differing bit against the
/// resident candidate) and during every verification compare.
pub trait GetBinaryKey: TypeAdapt {
    fn binary_key<'e>(&self, elem: &'e Self::Elem) -> &'e [u8];
}

/// Hash values for keys and for elements.
///
/// The two functions must agree on the key an element carries, i.e.
/// `hash_elem(e) == hash_key(k)` whenever `cmp_key(k, e)` is `Equal`. Hash
/// values are taken modulo the directory size; distribution quality is the
/// implementor's responsibility.
pub trait GetHash: TypeAdapt {
    fn hash_elem(&self, elem: &Self::Elem) -> usize;

    fn hash_key(&self, key: &Self::Key) -> usize;
}
