//! Intrusive red-black tree ordered through a caller-supplied adapter.
//!
//! Elements embed a [`TreeLink`] header; the tree stores raw element
//! pointers and owns no element memory. The node color lives in its own
//! cell instead of being packed into the parent pointer, which removes any
//! alignment requirement on element allocation.
//!
//! The balancing algorithms are implemented as free functions over a bare
//! root link plus an adapter. [`RbTree`] wraps them for standalone use; the
//! extendible hash table drives the same functions directly on its bucket
//! roots.

pub(crate) mod iterators;

use std::cell::Cell;
use std::ptr::NonNull;

use log::trace;

use crate::adapt::KeyComparator;
use crate::types::errors::StoreError;

pub use iterators::{Iter, IterRev};

pub(crate) type Link<T> = Option<NonNull<T>>;

//------------ TreeLink ------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// Link header embedded in every element stored in an [`RbTree`] (or in an
/// extendible hash bucket).
#[derive(Debug)]
pub struct TreeLink<T> {
    left: Cell<Option<NonNull<T>>>,
    right: Cell<Option<NonNull<T>>>,
    parent: Cell<Option<NonNull<T>>>,
    color: Cell<Color>,
}

impl<T> TreeLink<T> {
    pub const fn new() -> Self {
        TreeLink {
            left: Cell::new(None),
            right: Cell::new(None),
            parent: Cell::new(None),
            color: Cell::new(Color::Red),
        }
    }

    pub(crate) fn left(&self) -> Option<NonNull<T>> {
        self.left.get()
    }

    pub(crate) fn right(&self) -> Option<NonNull<T>> {
        self.right.get()
    }

    pub(crate) fn parent(&self) -> Option<NonNull<T>> {
        self.parent.get()
    }

    pub(crate) fn color(&self) -> Color {
        self.color.get()
    }

    pub(crate) fn set_left(&self, left: Option<NonNull<T>>) {
        self.left.set(left);
    }

    pub(crate) fn set_right(&self, right: Option<NonNull<T>>) {
        self.right.set(right);
    }

    pub(crate) fn set_parent(&self, parent: Option<NonNull<T>>) {
        self.parent.set(parent);
    }

    pub(crate) fn set_color(&self, color: Color) {
        self.color.set(color);
    }

    pub(crate) fn reset(&self) {
        self.left.set(None);
        self.right.set(None);
        self.parent.set(None);
        self.color.set(Color::Red);
    }
}

impl<T> Default for TreeLink<T> {
    fn default() -> Self {
        Self::new()
    }
}

//------------ RbTreeAdapt ---------------------------------------------------

/// Adapter for one ordered-tree membership of an element type.
pub trait RbTreeAdapt: KeyComparator {
    fn link(elem: &Self::Elem) -> &TreeLink<Self::Elem>;
}

#[inline]
pub(crate) fn link_of<'a, A: RbTreeAdapt>(
    elem: NonNull<A::Elem>,
) -> &'a TreeLink<A::Elem> {
    // The element outlives the tree per the contract on the insert methods.
    unsafe { A::link(elem.as_ref()) }
}

#[inline]
fn is_black<A: RbTreeAdapt>(elem: NonNull<A::Elem>) -> bool {
    link_of::<A>(elem).color() == Color::Black
}

#[inline]
fn is_red<A: RbTreeAdapt>(elem: NonNull<A::Elem>) -> bool {
    link_of::<A>(elem).color() == Color::Red
}

//------------ rotation and rebalancing --------------------------------------

/// Rotates left around `node` and returns the element that took its place.
fn rotate_left<A: RbTreeAdapt>(
    root: &mut Link<A::Elem>,
    node: NonNull<A::Elem>,
) -> NonNull<A::Elem> {
    let l = link_of::<A>(node);
    let parent = l.parent();
    let right = l.right().expect("rotation needs a right child");
    let rl = link_of::<A>(right);

    // left child of right child becomes right child of node
    l.set_right(rl.left());
    if let Some(child) = rl.left() {
        link_of::<A>(child).set_parent(Some(node));
    }

    // node is now left child of former right child
    rl.set_left(Some(node));
    l.set_parent(Some(right));

    // former parent of node is now parent of former right child
    rl.set_parent(parent);
    match parent {
        Some(parent) => {
            let pl = link_of::<A>(parent);
            if pl.left() == Some(node) {
                pl.set_left(Some(right));
            } else {
                pl.set_right(Some(right));
            }
        }
        None => *root = Some(right),
    }

    right
}

fn rotate_right<A: RbTreeAdapt>(
    root: &mut Link<A::Elem>,
    node: NonNull<A::Elem>,
) -> NonNull<A::Elem> {
    let l = link_of::<A>(node);
    let parent = l.parent();
    let left = l.left().expect("rotation needs a left child");
    let ll = link_of::<A>(left);

    l.set_left(ll.right());
    if let Some(child) = ll.right() {
        link_of::<A>(child).set_parent(Some(node));
    }

    ll.set_right(Some(node));
    l.set_parent(Some(left));

    ll.set_parent(parent);
    match parent {
        Some(parent) => {
            let pl = link_of::<A>(parent);
            if pl.left() == Some(node) {
                pl.set_left(Some(left));
            } else {
                pl.set_right(Some(left));
            }
        }
        None => *root = Some(left),
    }

    left
}

/// Repairs all red-red conflicts above a freshly inserted red element.
fn rebalance_after_insert<A: RbTreeAdapt>(
    root: &mut Link<A::Elem>,
    inserted: NonNull<A::Elem>,
) {
    debug_assert!(is_red::<A>(inserted));

    let mut child = inserted;
    let mut node =
        link_of::<A>(inserted).parent().expect("red element has a parent");
    debug_assert!(is_red::<A>(node));

    loop {
        // node is red, so it cannot be the root and has a parent
        let parent =
            link_of::<A>(node).parent().expect("red element has a parent");
        let next = if link_of::<A>(parent).left() == Some(node) {
            let uncle = link_of::<A>(parent).right();
            if uncle.map_or(true, |u| is_black::<A>(u)) {
                // uncle is black: one or two rotations finish the repair
                if link_of::<A>(node).right() == Some(child) {
                    // make child a left child
                    node = rotate_left::<A>(root, node);
                }
                link_of::<A>(node).set_color(Color::Black);
                link_of::<A>(parent).set_color(Color::Red);
                rotate_right::<A>(root, parent);
                return;
            }
            // uncle is red: repaint and propagate upwards
            link_of::<A>(node).set_color(Color::Black);
            link_of::<A>(uncle.expect("uncle is red")).set_color(Color::Black);
            link_of::<A>(parent).set_color(Color::Red);
            child = parent;
            link_of::<A>(parent).parent()
        } else {
            let uncle = link_of::<A>(parent).left();
            if uncle.map_or(true, |u| is_black::<A>(u)) {
                if link_of::<A>(node).left() == Some(child) {
                    // make child a right child
                    node = rotate_right::<A>(root, node);
                }
                link_of::<A>(node).set_color(Color::Black);
                link_of::<A>(parent).set_color(Color::Red);
                rotate_left::<A>(root, parent);
                return;
            }
            link_of::<A>(node).set_color(Color::Black);
            link_of::<A>(uncle.expect("uncle is red")).set_color(Color::Black);
            link_of::<A>(parent).set_color(Color::Red);
            child = parent;
            link_of::<A>(parent).parent()
        };

        match next {
            None => {
                // child is the root
                link_of::<A>(root.expect("tree is not empty"))
                    .set_color(Color::Black);
                return;
            }
            Some(next) => {
                if is_black::<A>(next) {
                    return;
                }
                node = next;
            }
        }
    }
}

/// Restores the black-height after a black element with no children left
/// the tree. `is_left` tells on which side of `parent` the hole is.
fn rebalance_after_remove<A: RbTreeAdapt>(
    root: &mut Link<A::Elem>,
    is_left: bool,
    parent: NonNull<A::Elem>,
) {
    let mut parent = parent;
    let mut is_left = is_left;

    loop {
        if is_left {
            // black height guarantees a sibling on the right
            let mut right = link_of::<A>(parent)
                .right()
                .expect("sibling exists after black removal");
            if is_red::<A>(right) {
                link_of::<A>(right).set_color(Color::Black);
                link_of::<A>(parent).set_color(Color::Red);
                rotate_left::<A>(root, parent);
                right = link_of::<A>(parent)
                    .right()
                    .expect("sibling exists after rotation");
            }

            let near = link_of::<A>(right).left();
            let far = link_of::<A>(right).right();
            if near.map_or(true, |n| is_black::<A>(n))
                && far.map_or(true, |n| is_black::<A>(n))
            {
                // reduce the height of the sibling side
                link_of::<A>(right).set_color(Color::Red);
            } else {
                if far.map_or(true, |n| is_black::<A>(n)) {
                    // near nephew is red: rotate it into the far slot
                    link_of::<A>(near.expect("near nephew is red"))
                        .set_color(Color::Black);
                    right = rotate_right::<A>(root, right);
                }
                if is_red::<A>(parent) {
                    link_of::<A>(right).set_color(Color::Red);
                    link_of::<A>(parent).set_color(Color::Black);
                }
                link_of::<A>(
                    link_of::<A>(right).right().expect("far nephew is red"),
                )
                .set_color(Color::Black);
                rotate_left::<A>(root, parent);
                return;
            }
        } else {
            let mut left = link_of::<A>(parent)
                .left()
                .expect("sibling exists after black removal");
            if is_red::<A>(left) {
                link_of::<A>(left).set_color(Color::Black);
                link_of::<A>(parent).set_color(Color::Red);
                rotate_right::<A>(root, parent);
                left = link_of::<A>(parent)
                    .left()
                    .expect("sibling exists after rotation");
            }

            let near = link_of::<A>(left).right();
            let far = link_of::<A>(left).left();
            if near.map_or(true, |n| is_black::<A>(n))
                && far.map_or(true, |n| is_black::<A>(n))
            {
                link_of::<A>(left).set_color(Color::Red);
            } else {
                if far.map_or(true, |n| is_black::<A>(n)) {
                    link_of::<A>(near.expect("near nephew is red"))
                        .set_color(Color::Black);
                    left = rotate_left::<A>(root, left);
                }
                if is_red::<A>(parent) {
                    link_of::<A>(left).set_color(Color::Red);
                    link_of::<A>(parent).set_color(Color::Black);
                }
                link_of::<A>(
                    link_of::<A>(left).left().expect("far nephew is red"),
                )
                .set_color(Color::Black);
                rotate_right::<A>(root, parent);
                return;
            }
        }

        if is_red::<A>(parent) {
            // both subtrees are whole again
            link_of::<A>(parent).set_color(Color::Black);
            return;
        }
        match link_of::<A>(parent).parent() {
            // the whole tree lost one level of depth
            None => return,
            Some(pparent) => {
                // propagate the height reduction one level up
                is_left = link_of::<A>(pparent).left() == Some(parent);
                parent = pparent;
            }
        }
    }
}

//------------ operations over a bare root link ------------------------------

/// Inserts `new` ordered by the adapter's element comparator.
///
/// # Safety
///
/// `new` must point to a live element that is not linked into any tree
/// through this link header, and it must stay valid until it is removed
/// from the tree or the tree is cleared.
pub(crate) unsafe fn insert_node<A: RbTreeAdapt>(
    root: &mut Link<A::Elem>,
    adapter: &A,
    new: NonNull<A::Elem>,
) -> Result<(), StoreError> {
    let Some(top) = *root else {
        // first element
        *root = Some(new);
        let l = link_of::<A>(new);
        l.set_left(None);
        l.set_right(None);
        l.set_parent(None);
        l.set_color(Color::Black);
        return Ok(());
    };

    let mut parent = top;
    loop {
        let ord = adapter.cmp_elems(new.as_ref(), parent.as_ref());
        match ord {
            std::cmp::Ordering::Equal => {
                return Err(StoreError::AlreadyExists)
            }
            std::cmp::Ordering::Less => {
                match link_of::<A>(parent).left() {
                    Some(left) => parent = left,
                    None => {
                        link_of::<A>(parent).set_left(Some(new));
                        break;
                    }
                }
            }
            std::cmp::Ordering::Greater => {
                match link_of::<A>(parent).right() {
                    Some(right) => parent = right,
                    None => {
                        link_of::<A>(parent).set_right(Some(new));
                        break;
                    }
                }
            }
        }
    }

    let l = link_of::<A>(new);
    l.set_left(None);
    l.set_right(None);
    l.set_parent(Some(parent));
    l.set_color(Color::Red);

    if is_red::<A>(parent) {
        rebalance_after_insert::<A>(root, new);
    }

    Ok(())
}

pub(crate) fn find_node<A: RbTreeAdapt>(
    root: Link<A::Elem>,
    adapter: &A,
    key: &A::Key,
) -> Option<NonNull<A::Elem>> {
    let mut node = root;
    while let Some(n) = node {
        let ord = adapter.cmp_key(key, unsafe { n.as_ref() });
        match ord {
            std::cmp::Ordering::Equal => return Some(n),
            std::cmp::Ordering::Less => node = link_of::<A>(n).left(),
            std::cmp::Ordering::Greater => node = link_of::<A>(n).right(),
        }
    }
    None
}

/// Physically unlinks `node`, which must be linked in the tree rooted at
/// `root`. An element with two children is replaced by its in-order
/// successor, which inherits its position and color. The removed element's
/// link header is reset before returning.
pub(crate) fn unlink_node<A: RbTreeAdapt>(
    root: &mut Link<A::Elem>,
    node: NonNull<A::Elem>,
) {
    let l = link_of::<A>(node);

    let node_parent;
    let node_child;
    let removed_black;
    let is_left;

    if l.left().is_none() {
        node_parent = l.parent();
        node_child = l.right();
        removed_black = is_black::<A>(node);
        is_left = node_parent
            .map_or(false, |p| link_of::<A>(p).left() == Some(node));
    } else if l.right().is_none() {
        node_parent = l.parent();
        node_child = l.left();
        removed_black = is_black::<A>(node);
        is_left = node_parent
            .map_or(false, |p| link_of::<A>(p).left() == Some(node));
    } else {
        // find the in-order successor, which has no left child
        let mut replace = l.right().expect("two children");
        while let Some(left) = link_of::<A>(replace).left() {
            replace = left;
        }

        // move replace into the position of node
        match l.parent() {
            Some(parent) => {
                let pl = link_of::<A>(parent);
                if pl.left() == Some(node) {
                    pl.set_left(Some(replace));
                } else {
                    pl.set_right(Some(replace));
                }
            }
            None => *root = Some(replace),
        }

        let rl = link_of::<A>(replace);
        let mut parent_of_replace =
            rl.parent().expect("successor is below node");
        node_child = rl.right();
        removed_black = is_black::<A>(replace);
        is_left =
            link_of::<A>(parent_of_replace).left() == Some(replace);

        // the successor inherits position and color
        rl.set_parent(l.parent());
        rl.set_color(l.color());
        rl.set_left(l.left());
        if let Some(left) = rl.left() {
            link_of::<A>(left).set_parent(Some(replace));
        }
        if parent_of_replace == node {
            // replace is the right child of node
            parent_of_replace = replace;
        } else {
            rl.set_right(l.right());
            if let Some(right) = rl.right() {
                link_of::<A>(right).set_parent(Some(replace));
            }
        }
        node_parent = Some(parent_of_replace);
    }

    // detach the spliced-out element from the tree
    match node_parent {
        Some(parent) => {
            let pl = link_of::<A>(parent);
            if is_left {
                pl.set_left(node_child);
            } else {
                pl.set_right(node_child);
            }

            if removed_black {
                // the black height changed
                match node_child {
                    Some(child) => {
                        // the lone child of a black element is red
                        let cl = link_of::<A>(child);
                        cl.set_parent(Some(parent));
                        cl.set_color(Color::Black);
                    }
                    None => {
                        rebalance_after_remove::<A>(root, is_left, parent)
                    }
                }
            } else {
                // a red element with at most one child has none
                debug_assert!(node_child.is_none());
            }
        }
        None => {
            *root = node_child;
            if let Some(child) = node_child {
                let cl = link_of::<A>(child);
                cl.set_parent(None);
                cl.set_color(Color::Black);
            }
        }
    }

    l.reset();
}

pub(crate) fn remove_node<A: RbTreeAdapt>(
    root: &mut Link<A::Elem>,
    adapter: &A,
    key: &A::Key,
) -> Result<NonNull<A::Elem>, StoreError> {
    let node =
        find_node::<A>(*root, adapter, key).ok_or(StoreError::NotFound)?;
    unlink_node::<A>(root, node);
    Ok(node)
}

/// Unlinks every element, resetting each link header and invoking the
/// adapter's delete callback. The walk continues past callback failures and
/// the first error is reported after the tree is empty.
pub(crate) fn remove_all_nodes<A: RbTreeAdapt>(
    root: &mut Link<A::Elem>,
    adapter: &A,
) -> Result<(), StoreError> {
    let Some(first) = root.take() else {
        return Ok(());
    };

    trace!("removing all elements below {:?}", first);

    let mut err = Ok(());
    let mut node = first;
    loop {
        while let Some(left) = link_of::<A>(node).left() {
            link_of::<A>(node).set_left(None);
            node = left;
        }
        let delnode = node;
        let next = match link_of::<A>(delnode).right() {
            Some(right) => {
                link_of::<A>(delnode).set_right(None);
                link_of::<A>(right)
                    .set_parent(link_of::<A>(delnode).parent());
                Some(right)
            }
            None => link_of::<A>(delnode).parent(),
        };
        link_of::<A>(delnode).reset();

        if let Err(e) = adapter.delete(delnode) {
            if err.is_ok() {
                err = Err(e);
            }
        }

        match next {
            Some(next) => node = next,
            None => break,
        }
    }

    err
}

/// Unlinks every element without touching element lifetime. Used by the
/// container `Drop` impls, where no delete callback may run.
pub(crate) fn unlink_all_nodes<A: RbTreeAdapt>(root: &mut Link<A::Elem>) {
    let mut cur = root.take();
    while let Some(node) = cur {
        let mut n = node;
        while let Some(left) = link_of::<A>(n).left() {
            link_of::<A>(n).set_left(None);
            n = left;
        }
        let next = match link_of::<A>(n).right() {
            Some(right) => {
                link_of::<A>(n).set_right(None);
                link_of::<A>(right).set_parent(link_of::<A>(n).parent());
                Some(right)
            }
            None => link_of::<A>(n).parent(),
        };
        link_of::<A>(n).reset();
        cur = next;
    }
}

/// Verifies element colors, black height, parent back-pointers and the
/// in-order key ordering.
pub(crate) fn check_invariant<A: RbTreeAdapt>(
    root: Link<A::Elem>,
    adapter: &A,
) -> Result<(), StoreError> {
    use std::cmp::Ordering::{Greater, Less};

    let Some(top) = root else {
        return Ok(());
    };

    if !is_black::<A>(top) || link_of::<A>(top).parent().is_some() {
        return Err(StoreError::InvariantViolated);
    }

    // determine the black height along the left spine
    let mut node = top;
    let mut height: isize = 1;
    while let Some(left) = link_of::<A>(node).left() {
        if link_of::<A>(left).parent() != Some(node) {
            return Err(StoreError::InvariantViolated);
        }
        node = left;
        if is_black::<A>(node) {
            height += 1;
        }
    }
    let const_height = height;

    let mut prev: Option<NonNull<A::Elem>> = None;
    let mut cur = Some(node);
    while let Some(node) = cur {
        let l = link_of::<A>(node);
        let elem = unsafe { node.as_ref() };

        if let Some(left) = l.left() {
            if adapter.cmp_elems(unsafe { left.as_ref() }, elem) != Less {
                return Err(StoreError::InvariantViolated);
            }
        }
        if let Some(right) = l.right() {
            if adapter.cmp_elems(unsafe { right.as_ref() }, elem) != Greater
            {
                return Err(StoreError::InvariantViolated);
            }
        }

        if is_red::<A>(node) {
            if l.left().map_or(false, |n| is_red::<A>(n))
                || l.right().map_or(false, |n| is_red::<A>(n))
            {
                return Err(StoreError::InvariantViolated);
            }
        }

        if let Some(prev) = prev {
            let prev_elem = unsafe { prev.as_ref() };
            if adapter.cmp_elems(elem, prev_elem) != Greater
                || adapter.cmp_elems(prev_elem, elem) != Less
            {
                return Err(StoreError::InvariantViolated);
            }
        }
        prev = Some(node);

        if (l.left().is_none() || l.right().is_none())
            && const_height != height
        {
            return Err(StoreError::InvariantViolated);
        }

        match l.right() {
            None => {
                // ascend until coming from a left child
                let mut x = node;
                cur = loop {
                    if is_black::<A>(x) {
                        height -= 1;
                    }
                    match link_of::<A>(x).parent() {
                        None => break None,
                        Some(parent) => {
                            if link_of::<A>(parent).left() == Some(x) {
                                break Some(parent);
                            }
                            x = parent;
                        }
                    }
                };
            }
            Some(right) => {
                if link_of::<A>(right).parent() != Some(node) {
                    return Err(StoreError::InvariantViolated);
                }
                let mut x = right;
                if is_black::<A>(x) {
                    height += 1;
                }
                while let Some(left) = link_of::<A>(x).left() {
                    if link_of::<A>(left).parent() != Some(x) {
                        return Err(StoreError::InvariantViolated);
                    }
                    x = left;
                    if is_black::<A>(x) {
                        height += 1;
                    }
                }
                cur = Some(x);
            }
        }
    }

    if height != 0 {
        return Err(StoreError::InvariantViolated);
    }

    Ok(())
}

//------------ RbTree --------------------------------------------------------

/// Ordered intrusive collection keyed through a [`KeyComparator`] adapter.
#[derive(Debug)]
pub struct RbTree<A: RbTreeAdapt> {
    root: Link<A::Elem>,
    adapter: A,
}

impl<A: RbTreeAdapt> RbTree<A> {
    pub fn new(adapter: A) -> Self {
        RbTree { root: None, adapter }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Inserts `new`, ordered by the adapter's element comparator. Returns
    /// `AlreadyExists` and leaves the tree unchanged if an element with an
    /// equal key is present.
    ///
    /// # Safety
    ///
    /// `new` must point to a live element that is not linked into any tree
    /// through this link header, and it must stay valid until it is removed
    /// or the tree is cleared.
    pub unsafe fn insert(
        &mut self,
        new: NonNull<A::Elem>,
    ) -> Result<(), StoreError> {
        insert_node::<A>(&mut self.root, &self.adapter, new)
    }

    pub fn find(&self, key: &A::Key) -> Option<&A::Elem> {
        find_node::<A>(self.root, &self.adapter, key)
            .map(|n| unsafe { n.as_ref() })
    }

    /// Unlinks the element with the given key and returns it with a reset
    /// link header; re-inserting it later is well defined.
    pub fn remove(
        &mut self,
        key: &A::Key,
    ) -> Result<NonNull<A::Elem>, StoreError> {
        remove_node::<A>(&mut self.root, &self.adapter, key)
    }

    /// Empties the tree, invoking the adapter's delete callback per
    /// element. See [`remove_all_nodes`] for the error contract.
    pub fn remove_all(&mut self) -> Result<(), StoreError> {
        remove_all_nodes::<A>(&mut self.root, &self.adapter)
    }

    /// Synonym of [`RbTree::remove_all`].
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.remove_all()
    }

    /// In-order iteration, smallest key first.
    pub fn iter(&self) -> Iter<'_, A> {
        Iter::from_root(self.root)
    }

    /// Reverse in-order iteration, largest key first.
    pub fn iter_rev(&self) -> IterRev<'_, A> {
        IterRev::from_root(self.root)
    }

    pub fn check_invariant(&self) -> Result<(), StoreError> {
        check_invariant::<A>(self.root, &self.adapter)
    }
}

impl<A: RbTreeAdapt> Drop for RbTree<A> {
    fn drop(&mut self) {
        // Unlink only; element memory belongs to the caller. The delete
        // callback runs on the explicit teardown paths exclusively.
        unlink_all_nodes::<A>(&mut self.root);
    }
}
