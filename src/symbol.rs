//! Symbol slots with a tag in the low address bit.
//!
//! The runtime uses bit 0 of some symbol slots as its own flag. That only
//! works because symbols are at least 2-byte aligned, which [`decode`] and
//! [`encode`] check at compile time for the referent type.

use std::fmt;
use std::marker::PhantomData;

use crate::error::{fatal, VisitError};
use crate::visitor::Visitor;

/// The caller-owned flag bit.
pub const SYMBOL_TAG: usize = 1;

/// A machine word holding a symbol address, possibly with [`SYMBOL_TAG`] set.
#[repr(transparent)]
pub struct SymbolSlot<S> {
    word: usize,
    _marker: PhantomData<*const S>,
}

impl<S> SymbolSlot<S> {
    pub fn new(symbol: *const S) -> Self {
        Self::from_raw(symbol as usize)
    }

    pub fn new_tagged(symbol: *const S) -> Self {
        Self::from_raw(symbol as usize | SYMBOL_TAG)
    }

    pub fn from_raw(word: usize) -> Self {
        Self {
            word,
            _marker: PhantomData,
        }
    }

    pub fn raw(&self) -> usize {
        self.word
    }

    pub fn is_tagged(&self) -> bool {
        self.word & SYMBOL_TAG != 0
    }
}

impl<S> Clone for SymbolSlot<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for SymbolSlot<S> {}

impl<S> PartialEq for SymbolSlot<S> {
    fn eq(&self, other: &Self) -> bool {
        self.word == other.word
    }
}

impl<S> Eq for SymbolSlot<S> {}

impl<S> fmt::Debug for SymbolSlot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolSlot({:#x})", self.word)
    }
}

/// The symbol address in `slot`, with the tag bit cleared.
#[inline]
pub fn decode<S>(slot: &SymbolSlot<S>) -> *const S {
    const {
        assert!(std::mem::align_of::<S>() >= 2, "symbol type leaves no room for the tag bit")
    };
    (slot.word & !SYMBOL_TAG) as *const S
}

/// Stores `symbol` in `slot`, keeping whatever tag bit the slot already had.
///
/// Not synchronized: concurrent stores to one slot must be serialized by the caller.
#[inline]
pub fn encode<S>(slot: &mut SymbolSlot<S>, symbol: *const S) {
    const {
        assert!(std::mem::align_of::<S>() >= 2, "symbol type leaves no room for the tag bit")
    };
    let address = symbol as usize;
    if address & SYMBOL_TAG != 0 {
        fatal(VisitError::MisalignedSymbol { address });
    }
    slot.word = address | (slot.word & SYMBOL_TAG);
}

pub trait SymbolVisitor<S>: Visitor {
    fn visit_symbol(&mut self, slot: &mut SymbolSlot<S>);
}
