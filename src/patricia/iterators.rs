//! Iteration over the crit-bit trie in byte-lexicographic key order.
//!
//! Stepping is stateless apart from the next element to yield: every step
//! re-descends from the root using the key of the element just yielded,
//! remembering the deepest node where the descent branched towards the
//! other side. This makes it legal to remove the yielded element before
//! calling `next` again.

use std::ptr::NonNull;

use super::{
    child_for_bit, get_bit, link_of, PatriciaAdapt, PatriciaTrie,
};

/// Follows left children from `start` down to the back-edge target, which
/// holds the smallest key of the subtree.
fn smallest_below<A: PatriciaAdapt>(
    start: NonNull<A::Elem>,
) -> NonNull<A::Elem> {
    let mut parent = start;
    loop {
        let node = link_of::<A>(parent).left().expect("element is linked");
        if link_of::<A>(node).bit_offset()
            <= link_of::<A>(parent).bit_offset()
        {
            return node;
        }
        parent = node;
    }
}

fn largest_below<A: PatriciaAdapt>(
    start: NonNull<A::Elem>,
) -> NonNull<A::Elem> {
    let mut parent = start;
    loop {
        let node = link_of::<A>(parent).right().expect("element is linked");
        if link_of::<A>(node).bit_offset()
            <= link_of::<A>(parent).bit_offset()
        {
            return node;
        }
        parent = node;
    }
}

//------------ Iter ----------------------------------------------------------

pub struct Iter<'a, A: PatriciaAdapt> {
    tree: &'a PatriciaTrie<A>,
    next: Option<NonNull<A::Elem>>,
}

impl<'a, A: PatriciaAdapt> Iter<'a, A> {
    pub(crate) fn new(tree: &'a PatriciaTrie<A>) -> Self {
        Iter { tree, next: tree.root().map(smallest_below::<A>) }
    }
}

impl<'a, A: PatriciaAdapt> Iterator for Iter<'a, A> {
    type Item = &'a A::Elem;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        let elem = unsafe { node.as_ref() };
        let key = self.tree.adapter().binary_key(elem);

        // re-descend by the yielded key, remembering the deepest node
        // where the search went left; its right subtree holds the next key
        let mut cur = self.tree.root().expect("yielded element is linked");
        let mut higher_branch_parent = None;
        loop {
            let parent = cur;
            let bit = get_bit(key, link_of::<A>(parent).bit_offset());
            if !bit {
                higher_branch_parent = Some(parent);
            }
            cur = child_for_bit::<A>(parent, bit);
            if link_of::<A>(cur).bit_offset()
                <= link_of::<A>(parent).bit_offset()
            {
                break;
            }
        }

        self.next = higher_branch_parent.map(|parent| {
            let mut parent = parent;
            let mut next =
                link_of::<A>(parent).right().expect("element is linked");
            while link_of::<A>(next).bit_offset()
                > link_of::<A>(parent).bit_offset()
            {
                parent = next;
                next = link_of::<A>(next).left().expect("element is linked");
            }
            next
        });

        Some(elem)
    }
}

//------------ IterRev -------------------------------------------------------

pub struct IterRev<'a, A: PatriciaAdapt> {
    tree: &'a PatriciaTrie<A>,
    next: Option<NonNull<A::Elem>>,
}

impl<'a, A: PatriciaAdapt> IterRev<'a, A> {
    pub(crate) fn new(tree: &'a PatriciaTrie<A>) -> Self {
        IterRev { tree, next: tree.root().map(largest_below::<A>) }
    }
}

impl<'a, A: PatriciaAdapt> Iterator for IterRev<'a, A> {
    type Item = &'a A::Elem;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        let elem = unsafe { node.as_ref() };
        let key = self.tree.adapter().binary_key(elem);

        let mut cur = self.tree.root().expect("yielded element is linked");
        let mut lower_branch_parent = None;
        loop {
            let parent = cur;
            let bit = get_bit(key, link_of::<A>(parent).bit_offset());
            if bit {
                lower_branch_parent = Some(parent);
            }
            cur = child_for_bit::<A>(parent, bit);
            if link_of::<A>(cur).bit_offset()
                <= link_of::<A>(parent).bit_offset()
            {
                break;
            }
        }

        self.next = lower_branch_parent.map(|parent| {
            let mut parent = parent;
            let mut next =
                link_of::<A>(parent).left().expect("element is linked");
            while link_of::<A>(next).bit_offset()
                > link_of::<A>(parent).bit_offset()
            {
                parent = next;
                next =
                    link_of::<A>(next).right().expect("element is linked");
            }
            next
        });

        Some(elem)
    }
}

//------------ PrefixIter ----------------------------------------------------

/// Iterates, in key order, every element whose key starts with the given
/// prefix. Binds the descent to the first `8 * prefix.len()` bits and
/// refuses to branch above them while stepping.
pub struct PrefixIter<'t, A: PatriciaAdapt> {
    tree: &'t PatriciaTrie<A>,
    prefix_bits: usize,
    next: Option<NonNull<A::Elem>>,
}

impl<'t, A: PatriciaAdapt> PrefixIter<'t, A> {
    pub(crate) fn new(tree: &'t PatriciaTrie<A>, prefix: &[u8]) -> Self {
        let prefix_bits = 8 * prefix.len();
        let mut next = None;

        if prefix.len() < usize::MAX / 8 {
            if let Some(root) = tree.root() {
                let mut parent;
                let mut node = root;
                if link_of::<A>(node).bit_offset() < prefix_bits {
                    loop {
                        parent = node;
                        node = child_for_bit::<A>(
                            parent,
                            get_bit(
                                prefix,
                                link_of::<A>(parent).bit_offset(),
                            ),
                        );
                        if link_of::<A>(node).bit_offset()
                            <= link_of::<A>(parent).bit_offset()
                            || link_of::<A>(node).bit_offset() >= prefix_bits
                        {
                            break;
                        }
                    }
                } else {
                    parent = node;
                    node =
                        link_of::<A>(node).left().expect("root is linked");
                }
                // down to the smallest key below the prefix position
                while link_of::<A>(node).bit_offset()
                    > link_of::<A>(parent).bit_offset()
                {
                    parent = node;
                    node =
                        link_of::<A>(node).left().expect("element is linked");
                }
                let key =
                    tree.adapter().binary_key(unsafe { node.as_ref() });
                if key.len() >= prefix.len()
                    && &key[..prefix.len()] == prefix
                {
                    next = Some(node);
                }
            }
        }

        PrefixIter { tree, prefix_bits, next }
    }
}

impl<'t, A: PatriciaAdapt> Iterator for PrefixIter<'t, A> {
    type Item = &'t A::Elem;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        let elem = unsafe { node.as_ref() };
        let key = self.tree.adapter().binary_key(elem);

        let mut cur = self.tree.root().expect("yielded element is linked");
        let mut higher_branch_parent = None;
        loop {
            let parent = cur;
            let bit = get_bit(key, link_of::<A>(parent).bit_offset());
            if !bit {
                higher_branch_parent = Some(parent);
            }
            cur = child_for_bit::<A>(parent, bit);
            if link_of::<A>(cur).bit_offset()
                <= link_of::<A>(parent).bit_offset()
            {
                break;
            }
        }

        // branching above the prefix would leave the matching subtree
        self.next = higher_branch_parent
            .filter(|parent| {
                link_of::<A>(*parent).bit_offset() >= self.prefix_bits
            })
            .map(|parent| {
                let mut parent = parent;
                let mut next = link_of::<A>(parent)
                    .right()
                    .expect("element is linked");
                while link_of::<A>(next).bit_offset()
                    > link_of::<A>(parent).bit_offset()
                {
                    parent = next;
                    next = link_of::<A>(next)
                        .left()
                        .expect("element is linked");
                }
                next
            });

        Some(elem)
    }
}
