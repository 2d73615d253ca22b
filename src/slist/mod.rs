//! Circular singly linked list over an embedded link header.
//!
//! The list stores one pointer, `last`; `last.next` is the head of the
//! circle. An empty list is `last == None`. Elements are caller-owned: the
//! list registers raw pointers and never copies or frees element memory
//! (except through the adapter's delete callback on [`SList::clear`]).
//!
//! The same element type can thread through several lists at the same time
//! by embedding one [`ListLink`] per membership and providing one
//! [`SListAdapt`] per link.

use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr::NonNull;

use log::trace;

use crate::adapt::TypeAdapt;
use crate::types::errors::StoreError;

//------------ ListLink ------------------------------------------------------

/// Link header embedded in every element stored in an [`SList`].
#[derive(Debug)]
pub struct ListLink<T> {
    next: Cell<Option<NonNull<T>>>,
}

impl<T> ListLink<T> {
    pub const fn new() -> Self {
        ListLink { next: Cell::new(None) }
    }

    /// Returns true while the element is threaded into a list.
    pub fn is_linked(&self) -> bool {
        self.next.get().is_some()
    }

    pub(crate) fn next(&self) -> Option<NonNull<T>> {
        self.next.get()
    }

    pub(crate) fn set_next(&self, next: Option<NonNull<T>>) {
        self.next.set(next);
    }
}

impl<T> Default for ListLink<T> {
    fn default() -> Self {
        Self::new()
    }
}

//------------ SListAdapt ----------------------------------------------------

/// Adapter for one list membership of an element type.
pub trait SListAdapt: TypeAdapt {
    fn link(elem: &Self::Elem) -> &ListLink<Self::Elem>;
}

#[inline]
fn link_of<'a, A: SListAdapt>(elem: NonNull<A::Elem>) -> &'a ListLink<A::Elem> {
    // The element outlives the list per the contract on the insert methods.
    unsafe { A::link(elem.as_ref()) }
}

//------------ SList ---------------------------------------------------------

/// Circular singly linked list.
#[derive(Debug)]
pub struct SList<A: SListAdapt> {
    last: Option<NonNull<A::Elem>>,
    adapter: A,
}

impl<A: SListAdapt> SList<A> {
    pub fn new(adapter: A) -> Self {
        SList { last: None, adapter }
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    pub fn first(&self) -> Option<&A::Elem> {
        self.last.map(|last| {
            let first = link_of::<A>(last).next().expect("list is circular");
            unsafe { first.as_ref() }
        })
    }

    pub fn last(&self) -> Option<&A::Elem> {
        self.last.map(|last| unsafe { last.as_ref() })
    }

    /// Returns the element following `elem`, or `None` if `elem` is the
    /// last element of the list.
    pub fn next<'s>(&'s self, elem: &A::Elem) -> Option<&'s A::Elem> {
        let last = self.last?;
        if std::ptr::eq(last.as_ptr(), elem) {
            return None;
        }
        A::link(elem).next().map(|next| unsafe { next.as_ref() })
    }

    /// Inserts `new` at the head of the list.
    ///
    /// # Safety
    ///
    /// `new` must point to a live element that is not linked into any list
    /// through this link header, and it must stay valid until it is removed
    /// from the list or the list is cleared.
    pub unsafe fn insert_first(&mut self, new: NonNull<A::Elem>) {
        match self.last {
            None => {
                self.last = Some(new);
                link_of::<A>(new).set_next(Some(new));
            }
            Some(last) => {
                link_of::<A>(new).set_next(link_of::<A>(last).next());
                link_of::<A>(last).set_next(Some(new));
            }
        }
    }

    /// Inserts `new` at the tail of the list.
    ///
    /// # Safety
    ///
    /// Same contract as [`SList::insert_first`].
    pub unsafe fn insert_last(&mut self, new: NonNull<A::Elem>) {
        match self.last {
            None => {
                self.last = Some(new);
                link_of::<A>(new).set_next(Some(new));
            }
            Some(last) => {
                link_of::<A>(new).set_next(link_of::<A>(last).next());
                link_of::<A>(last).set_next(Some(new));
                self.last = Some(new);
            }
        }
    }

    /// Inserts `new` directly after `prev`, which must be linked in this
    /// list.
    ///
    /// # Safety
    ///
    /// Same contract as [`SList::insert_first`]; additionally `prev` must
    /// be an element of this list.
    pub unsafe fn insert_after(
        &mut self,
        prev: &A::Elem,
        new: NonNull<A::Elem>,
    ) {
        let prev_link = A::link(prev);
        link_of::<A>(new).set_next(prev_link.next());
        prev_link.set_next(Some(new));
        if let Some(last) = self.last {
            if std::ptr::eq(last.as_ptr(), prev) {
                self.last = Some(new);
            }
        }
    }

    /// Unlinks and returns the head of the list. The returned element's
    /// link header has been reset.
    pub fn remove_first(&mut self) -> Result<NonNull<A::Elem>, StoreError> {
        let last = self.last.ok_or(StoreError::InvalidKey)?;
        let first = link_of::<A>(last).next().expect("list is circular");

        if first == last {
            self.last = None;
        } else {
            link_of::<A>(last).set_next(link_of::<A>(first).next());
        }

        link_of::<A>(first).set_next(None);
        Ok(first)
    }

    /// Unlinks and returns the element following `prev`.
    pub fn remove_after(
        &mut self,
        prev: &A::Elem,
    ) -> Result<NonNull<A::Elem>, StoreError> {
        if self.last.is_none() || !A::link(prev).is_linked() {
            return Err(StoreError::InvalidKey);
        }

        let prev_link = A::link(prev);
        let next = prev_link.next().expect("prev is linked");

        prev_link.set_next(link_of::<A>(next).next());
        link_of::<A>(next).set_next(None);

        if self.last == Some(next) {
            if std::ptr::eq(next.as_ptr(), prev) {
                // prev was the only element
                self.last = None;
            } else {
                self.last = Some(NonNull::from(prev));
            }
        }

        Ok(next)
    }

    /// Unlinks every element and invokes the adapter's delete callback per
    /// element. A failing callback does not stop the walk; the first error
    /// is returned after the list has been emptied.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let Some(last) = self.last.take() else {
            return Ok(());
        };

        trace!("clearing list ending at {:?}", last);

        let mut err = Ok(());
        let mut next = link_of::<A>(last).next().expect("list is circular");
        loop {
            let node = next;
            next = link_of::<A>(node).next().expect("list is circular");
            link_of::<A>(node).set_next(None);
            if let Err(e) = self.adapter.delete(node) {
                if err.is_ok() {
                    err = Err(e);
                }
            }
            if node == last {
                break;
            }
        }

        err
    }

    pub fn iter(&self) -> Iter<'_, A> {
        Iter {
            next: self.last.map(|last| {
                link_of::<A>(last).next().expect("list is circular")
            }),
            last: self.last,
            _list: PhantomData,
        }
    }
}

impl<A: SListAdapt> Drop for SList<A> {
    fn drop(&mut self) {
        // Unlink only; element memory belongs to the caller.
        while self.remove_first().is_ok() {}
    }
}

//------------ Iter ----------------------------------------------------------

pub struct Iter<'a, A: SListAdapt> {
    next: Option<NonNull<A::Elem>>,
    last: Option<NonNull<A::Elem>>,
    _list: PhantomData<&'a SList<A>>,
}

impl<'a, A: SListAdapt> Iterator for Iter<'a, A> {
    type Item = &'a A::Elem;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        if Some(node) == self.last {
            self.next = None;
        } else {
            self.next = link_of::<A>(node).next();
        }
        Some(unsafe { node.as_ref() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_types::{Token, TokenChain};

    fn arena(keys: &[u32]) -> Vec<Box<Token>> {
        keys.iter().map(|k| Box::new(Token::new(*k))).collect()
    }

    fn ptr(token: &Token) -> NonNull<Token> {
        NonNull::from(token)
    }

    fn keys(list: &SList<TokenChain>) -> Vec<u32> {
        list.iter().map(|t| t.key()).collect()
    }

    #[test]
    fn test_insert_first_last() {
        let tokens = arena(&[1, 2, 3]);
        let mut list = SList::new(TokenChain);
        assert!(list.is_empty());
        assert!(list.first().is_none());
        assert!(list.last().is_none());

        unsafe {
            list.insert_last(ptr(&tokens[0]));
            list.insert_last(ptr(&tokens[1]));
            list.insert_first(ptr(&tokens[2]));
        }
        assert!(!list.is_empty());
        assert_eq!(keys(&list), vec![3, 1, 2]);
        assert_eq!(list.first().unwrap().key(), 3);
        assert_eq!(list.last().unwrap().key(), 2);

        let first = list.first().unwrap();
        assert_eq!(list.next(first).unwrap().key(), 1);
        let last = list.last().unwrap();
        assert!(list.next(last).is_none());
    }

    #[test]
    fn test_insert_after() {
        let tokens = arena(&[1, 2, 3]);
        let mut list = SList::new(TokenChain);
        unsafe {
            list.insert_last(ptr(&tokens[0]));
            list.insert_after(&tokens[0], ptr(&tokens[1]));
            list.insert_after(&tokens[0], ptr(&tokens[2]));
        }
        assert_eq!(keys(&list), vec![1, 3, 2]);
        // inserting after the tail moves the tail
        assert_eq!(list.last().unwrap().key(), 2);
    }

    #[test]
    fn test_remove_first() {
        let tokens = arena(&[1, 2]);
        let mut list = SList::new(TokenChain);
        assert_eq!(list.remove_first(), Err(StoreError::InvalidKey));

        unsafe {
            list.insert_last(ptr(&tokens[0]));
            list.insert_last(ptr(&tokens[1]));
        }
        let removed = list.remove_first().unwrap();
        assert_eq!(unsafe { removed.as_ref() }.key(), 1);
        assert!(!tokens[0].chain.is_linked());
        assert_eq!(keys(&list), vec![2]);

        list.remove_first().unwrap();
        assert!(list.is_empty());
        assert_eq!(list.remove_first(), Err(StoreError::InvalidKey));
    }

    #[test]
    fn test_remove_after() {
        let tokens = arena(&[1, 2, 3]);
        let mut list = SList::new(TokenChain);
        unsafe {
            list.insert_last(ptr(&tokens[0]));
            list.insert_last(ptr(&tokens[1]));
            list.insert_last(ptr(&tokens[2]));
        }

        // removing the tail re-aims the tail at its predecessor
        let removed = list.remove_after(&tokens[1]).unwrap();
        assert_eq!(unsafe { removed.as_ref() }.key(), 3);
        assert_eq!(list.last().unwrap().key(), 2);

        // removing the head via the circular edge from the tail
        let removed = list.remove_after(&tokens[1]).unwrap();
        assert_eq!(unsafe { removed.as_ref() }.key(), 1);
        assert_eq!(keys(&list), vec![2]);

        // a single self-linked element empties the list
        let removed = list.remove_after(&tokens[1]).unwrap();
        assert_eq!(unsafe { removed.as_ref() }.key(), 2);
        assert!(list.is_empty());

        assert_eq!(
            list.remove_after(&tokens[0]),
            Err(StoreError::InvalidKey)
        );
    }

    #[test]
    fn test_clear_calls_delete() {
        let tokens = arena(&[1, 2, 3, 4]);
        let mut list = SList::new(TokenChain);
        unsafe {
            for token in &tokens {
                list.insert_last(ptr(token));
            }
        }
        assert_eq!(list.clear(), Ok(()));
        assert!(list.is_empty());
        for token in &tokens {
            assert_eq!(token.deleted.get(), 1);
            assert!(!token.chain.is_linked());
        }
        // clearing an empty list is fine
        assert_eq!(list.clear(), Ok(()));
    }

    #[test]
    fn test_clear_reports_first_error_but_empties() {
        struct FailOn(u32);

        impl TypeAdapt for FailOn {
            type Elem = Token;
            type Key = ();

            fn delete(
                &self,
                elem: NonNull<Token>,
            ) -> Result<(), StoreError> {
                let elem = unsafe { elem.as_ref() };
                if elem.key() == self.0 {
                    return Err(StoreError::DeleteFailed);
                }
                elem.deleted.set(elem.deleted.get() + 1);
                Ok(())
            }
        }

        impl SListAdapt for FailOn {
            fn link(elem: &Token) -> &ListLink<Token> {
                &elem.chain
            }
        }

        let tokens = arena(&[1, 2, 3]);
        let mut list = SList::new(FailOn(2));
        unsafe {
            for token in &tokens {
                list.insert_last(ptr(token));
            }
        }
        assert_eq!(list.clear(), Err(StoreError::DeleteFailed));
        assert!(list.is_empty());
        assert_eq!(tokens[0].deleted.get(), 1);
        assert_eq!(tokens[1].deleted.get(), 0);
        assert_eq!(tokens[2].deleted.get(), 1);
    }

    #[test]
    fn test_reinsert_after_remove() {
        let tokens = arena(&[1, 2]);
        let mut list = SList::new(TokenChain);
        unsafe {
            list.insert_last(ptr(&tokens[0]));
            list.insert_last(ptr(&tokens[1]));
        }
        let removed = list.remove_first().unwrap();
        unsafe { list.insert_last(removed) };
        assert_eq!(keys(&list), vec![2, 1]);
    }
}
