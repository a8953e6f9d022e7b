//! Heap addresses and reference slots.
//!
//! A slot is a borrowed `&mut Oop` or `&mut NarrowOop`. The borrow's type is
//! the slot's representation, so visiting a slot can rewrite its value but can
//! never turn a full-width slot into a compressed one or back.

use std::fmt;

use crate::config::CompressedReferences;
use crate::visitor::ReferenceVisitor;

/// Minimum alignment of every heap object, in bytes.
pub const MIN_OBJECT_ALIGNMENT: usize = 8;

/// A raw heap address.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(usize);

impl Address {
    pub const NULL: Address = Address(0);

    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn offset(self, bytes: usize) -> Self {
        Self(self.0 + bytes)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

/// A half-open range of heap memory, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegion {
    start: Address,
    end: Address,
}

impl MemRegion {
    pub fn new(start: Address, end: Address) -> Self {
        debug_assert!(start <= end, "region end precedes start");
        Self { start, end }
    }

    pub fn with_size(start: Address, bytes: usize) -> Self {
        Self::new(start, start.offset(bytes))
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    pub fn byte_size(&self) -> usize {
        self.end.raw() - self.start.raw()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.start <= addr && addr < self.end
    }

    /// The overlap of two regions; empty when they are disjoint.
    pub fn intersection(&self, other: &MemRegion) -> MemRegion {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start >= end {
            MemRegion::new(start, start)
        } else {
            MemRegion::new(start, end)
        }
    }
}

/// A full-width reference to a heap object.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oop(usize);

impl Oop {
    pub const NULL: Oop = Oop(0);

    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub fn from_address(addr: Address) -> Self {
        Self(addr.raw())
    }

    pub fn address(self) -> Address {
        Address::new(self.0)
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Null, or a properly aligned object address.
    pub fn is_well_formed(self) -> bool {
        self.is_null() || self.0 % MIN_OBJECT_ALIGNMENT == 0
    }
}

impl fmt::Debug for Oop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oop({:#x})", self.0)
    }
}

/// A compressed reference; see [`CompressedReferences`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NarrowOop(u32);

impl NarrowOop {
    pub const NULL: NarrowOop = NarrowOop(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Oop {}
    impl Sealed for super::NarrowOop {}
}

/// Operations shared by both slot representations.
///
/// Generic drivers use this to walk a field array without caring which
/// representation the heap was configured with.
pub trait ReferenceSlot: private::Sealed + Copy {
    /// Hands this slot to the matching `visit_*` method of `visitor`.
    fn accept<V>(&mut self, visitor: &mut V)
    where
        V: ReferenceVisitor + ?Sized;

    fn is_null(&self) -> bool;

    fn load(&self, compressed: CompressedReferences) -> Oop;
}

impl ReferenceSlot for Oop {
    #[inline]
    fn accept<V>(&mut self, visitor: &mut V)
    where
        V: ReferenceVisitor + ?Sized,
    {
        visitor.visit_oop(self);
    }

    #[inline]
    fn is_null(&self) -> bool {
        Oop::is_null(*self)
    }

    #[inline]
    fn load(&self, _compressed: CompressedReferences) -> Oop {
        *self
    }
}

impl ReferenceSlot for NarrowOop {
    #[inline]
    fn accept<V>(&mut self, visitor: &mut V)
    where
        V: ReferenceVisitor + ?Sized,
    {
        visitor.visit_narrow_oop(self);
    }

    #[inline]
    fn is_null(&self) -> bool {
        NarrowOop::is_null(*self)
    }

    #[inline]
    fn load(&self, compressed: CompressedReferences) -> Oop {
        compressed.decode(*self)
    }
}

/// The reference fields of one object, in whichever representation the heap uses.
pub enum FieldSlots<'a> {
    Full(&'a mut [Oop]),
    Narrow(&'a mut [NarrowOop]),
}

impl FieldSlots<'_> {
    pub fn len(&self) -> usize {
        match self {
            FieldSlots::Full(slots) => slots.len(),
            FieldSlots::Narrow(slots) => slots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, FieldSlots::Narrow(_))
    }
}

/// A single borrowed slot of either representation.
pub enum SlotMut<'a> {
    Full(&'a mut Oop),
    Narrow(&'a mut NarrowOop),
}

impl SlotMut<'_> {
    pub fn is_null(&self) -> bool {
        match self {
            SlotMut::Full(slot) => slot.is_null(),
            SlotMut::Narrow(slot) => slot.is_null(),
        }
    }

    pub fn load(&self, compressed: CompressedReferences) -> Oop {
        match self {
            SlotMut::Full(slot) => **slot,
            SlotMut::Narrow(slot) => compressed.decode(**slot),
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, SlotMut::Narrow(_))
    }
}
