//! Example element types used by the unit and integration tests and by the
//! benchmarks.
//!
//! `Token` is the canonical multi-membership element: it embeds a list
//! link, a tree link and a trie link at the same time, with one adapter
//! type per membership. Its binary key is the big-endian image of its
//! numeric key, so byte-lexicographic trie order and numeric tree order
//! coincide.

use std::cell::Cell;
use std::cmp::Ordering;
use std::ptr::NonNull;

use zerocopy::{IntoBytes, NetworkEndian, U32};

use crate::adapt::{GetBinaryKey, GetHash, KeyComparator, TypeAdapt};
use crate::patricia::{PatriciaAdapt, TrieLink};
use crate::rbtree::{RbTreeAdapt, TreeLink};
use crate::slist::{ListLink, SListAdapt};
use crate::types::errors::StoreError;

//------------ Token ---------------------------------------------------------

/// Integer-keyed element embedding one link header per membership.
#[derive(Debug)]
pub struct Token {
    key: U32<NetworkEndian>,
    pub chain: ListLink<Token>,
    pub by_key: TreeLink<Token>,
    pub by_bytes: TrieLink<Token>,
    /// how often a delete callback has seen this element
    pub deleted: Cell<u32>,
}

impl Token {
    pub fn new(key: u32) -> Self {
        Token {
            key: U32::new(key),
            chain: ListLink::new(),
            by_key: TreeLink::new(),
            by_bytes: TrieLink::new(),
            deleted: Cell::new(0),
        }
    }

    pub fn key(&self) -> u32 {
        self.key.get()
    }

    /// The big-endian key image; lexicographic order equals numeric order.
    pub fn key_bytes(&self) -> &[u8] {
        self.key.as_bytes()
    }
}

//------------ TokenOrd ------------------------------------------------------

/// Orders and hashes tokens by their numeric key. The hash is the identity
/// of the key, which makes directory indexes predictable in tests. Deleted
/// elements are marked, not freed; the arenas in the tests own them.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenOrd;

impl TypeAdapt for TokenOrd {
    type Elem = Token;
    type Key = u32;

    fn delete(&self, elem: NonNull<Token>) -> Result<(), StoreError> {
        let elem = unsafe { elem.as_ref() };
        elem.deleted.set(elem.deleted.get() + 1);
        Ok(())
    }
}

impl KeyComparator for TokenOrd {
    fn cmp_key(&self, key: &u32, elem: &Token) -> Ordering {
        key.cmp(&elem.key())
    }

    fn cmp_elems(&self, a: &Token, b: &Token) -> Ordering {
        a.key().cmp(&b.key())
    }
}

impl GetHash for TokenOrd {
    fn hash_elem(&self, elem: &Token) -> usize {
        elem.key() as usize
    }

    fn hash_key(&self, key: &u32) -> usize {
        *key as usize
    }
}

impl RbTreeAdapt for TokenOrd {
    fn link(elem: &Token) -> &TreeLink<Token> {
        &elem.by_key
    }
}

//------------ TokenBytes ----------------------------------------------------

/// Trie membership of [`Token`], keyed by the big-endian key image.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenBytes;

impl TypeAdapt for TokenBytes {
    type Elem = Token;
    type Key = [u8];

    fn delete(&self, elem: NonNull<Token>) -> Result<(), StoreError> {
        let elem = unsafe { elem.as_ref() };
        elem.deleted.set(elem.deleted.get() + 1);
        Ok(())
    }
}

impl GetBinaryKey for TokenBytes {
    fn binary_key<'e>(&self, elem: &'e Token) -> &'e [u8] {
        elem.key_bytes()
    }
}

impl PatriciaAdapt for TokenBytes {
    fn link(elem: &Token) -> &TrieLink<Token> {
        &elem.by_bytes
    }
}

//------------ TokenChain ----------------------------------------------------

/// List membership of [`Token`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TokenChain;

impl TypeAdapt for TokenChain {
    type Elem = Token;
    type Key = ();

    fn delete(&self, elem: NonNull<Token>) -> Result<(), StoreError> {
        let elem = unsafe { elem.as_ref() };
        elem.deleted.set(elem.deleted.get() + 1);
        Ok(())
    }
}

impl SListAdapt for TokenChain {
    fn link(elem: &Token) -> &ListLink<Token> {
        &elem.chain
    }
}

//------------ Lexeme --------------------------------------------------------

/// Byte-string-keyed element for the trie tests; keys of arbitrary length,
/// including keys that are prefixes of one another.
#[derive(Debug)]
pub struct Lexeme {
    key: Vec<u8>,
    pub by_bytes: TrieLink<Lexeme>,
    pub deleted: Cell<u32>,
}

impl Lexeme {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Lexeme {
            key: key.into(),
            by_bytes: TrieLink::new(),
            deleted: Cell::new(0),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

/// Trie membership of [`Lexeme`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LexemeBytes;

impl TypeAdapt for LexemeBytes {
    type Elem = Lexeme;
    type Key = [u8];

    fn delete(&self, elem: NonNull<Lexeme>) -> Result<(), StoreError> {
        let elem = unsafe { elem.as_ref() };
        elem.deleted.set(elem.deleted.get() + 1);
        Ok(())
    }
}

impl GetBinaryKey for LexemeBytes {
    fn binary_key<'e>(&self, elem: &'e Lexeme) -> &'e [u8] {
        elem.key()
    }
}

impl PatriciaAdapt for LexemeBytes {
    fn link(elem: &Lexeme) -> &TrieLink<Lexeme> {
        &elem.by_bytes
    }
}
