//! Node storage for the suffix tree.
//!
//! Leaves and inner nodes share the label and sibling fields and differ by
//! a tagged kind, so no bit of the label length is sacrificed for a type
//! flag. Nodes are owned by the tree and allocated through a fallible
//! helper so that allocator exhaustion surfaces as an error instead of an
//! abort.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use crate::types::errors::StoreError;

/// One node of the tree. The label `(start, len)` addresses a substring of
/// the borrowed input; a length of zero marks the end-marker child.
#[derive(Debug)]
pub(crate) struct StNode {
    pub start: usize,
    pub len: usize,
    /// sibling in the parent's child list
    pub next_child: Option<NonNull<StNode>>,
    pub kind: NodeKind,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Leaf,
    Inner {
        /// head of the single-linked child list
        childs: Option<NonNull<StNode>>,
        /// the node matching this node's string with its first character
        /// removed; `None` stands for the root
        suffix_link: Option<NonNull<StNode>>,
    },
}

impl StNode {
    pub fn new_leaf(start: usize, len: usize) -> Self {
        StNode { start, len, next_child: None, kind: NodeKind::Leaf }
    }

    pub fn new_inner(start: usize, len: usize) -> Self {
        StNode {
            start,
            len,
            next_child: None,
            kind: NodeKind::Inner { childs: None, suffix_link: None },
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    pub fn childs(&self) -> Option<NonNull<StNode>> {
        match self.kind {
            NodeKind::Inner { childs, .. } => childs,
            NodeKind::Leaf => None,
        }
    }

    pub fn suffix_link(&self) -> Option<NonNull<StNode>> {
        match self.kind {
            NodeKind::Inner { suffix_link, .. } => suffix_link,
            NodeKind::Leaf => None,
        }
    }
}

#[inline]
pub(crate) fn node_ref<'a>(node: NonNull<StNode>) -> &'a StNode {
    // Nodes live until clear() frees them.
    unsafe { node.as_ref() }
}

pub(crate) fn set_next_child(
    node: NonNull<StNode>,
    next: Option<NonNull<StNode>>,
) {
    unsafe {
        (*node.as_ptr()).next_child = next;
    }
}

pub(crate) fn set_childs(
    node: NonNull<StNode>,
    new_childs: Option<NonNull<StNode>>,
) {
    unsafe {
        match &mut (*node.as_ptr()).kind {
            NodeKind::Inner { childs, .. } => *childs = new_childs,
            NodeKind::Leaf => debug_assert!(false, "leaf has no child list"),
        }
    }
}

pub(crate) fn set_suffix_link(
    node: NonNull<StNode>,
    target: Option<NonNull<StNode>>,
) {
    unsafe {
        match &mut (*node.as_ptr()).kind {
            NodeKind::Inner { suffix_link, .. } => *suffix_link = target,
            NodeKind::Leaf => {
                debug_assert!(false, "leaf has no suffix link")
            }
        }
    }
}

/// Advances the label by `count` characters, as done to the lower half of a
/// split node.
pub(crate) fn skip_label(node: NonNull<StNode>, count: usize) {
    unsafe {
        (*node.as_ptr()).start += count;
        (*node.as_ptr()).len -= count;
    }
}

pub(crate) fn alloc_node(node: StNode) -> Result<NonNull<StNode>, StoreError> {
    let layout = Layout::new::<StNode>();
    let ptr = unsafe { alloc(layout) } as *mut StNode;
    let Some(ptr) = NonNull::new(ptr) else {
        return Err(StoreError::OutOfMemory);
    };
    unsafe {
        ptr.as_ptr().write(node);
    }
    Ok(ptr)
}

pub(crate) fn free_node(node: NonNull<StNode>) {
    let layout = Layout::new::<StNode>();
    unsafe {
        // StNode has no drop glue; deallocation is all that is needed
        dealloc(node.as_ptr() as *mut u8, layout);
    }
}
