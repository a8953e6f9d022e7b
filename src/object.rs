//! Object-, predicate- and block-granularity visitors.

use crate::config::TraversalConfig;
use crate::dispatch::{Dispatch, Dynamic};
use crate::error::{fatal, VisitError};
use crate::iterate::FieldIterator;
use crate::metadata::{ClassLoaderData, TypeMetadata};
use crate::oop::{Address, FieldSlots, MemRegion, Oop, SlotMut};
use crate::trace::{ReferenceType, TracingVisitor};
use crate::visitor::Visitor;

/// A heap object as seen by a traversal. Implemented by the runtime's object model.
pub trait HeapObject {
    fn address(&self) -> Oop;

    fn size_in_bytes(&self) -> usize;

    /// Borrows the object's header metadata and reference slots together.
    fn layout(&mut self) -> ObjectLayout<'_>;
}

pub struct ObjectLayout<'a> {
    /// `None` for objects whose type metadata cannot be unloaded.
    pub metadata: Option<&'a dyn TypeMetadata>,
    /// Set on class mirrors: the type the mirror stands for.
    pub mirrored: Option<&'a dyn TypeMetadata>,
    /// Set on class-loader objects: the loader's data node.
    pub class_loader: Option<&'a dyn ClassLoaderData>,
    pub fields: FieldSlots<'a>,
    /// Present only on reference objects (soft, weak, final, phantom).
    pub reference: Option<ReferenceFields<'a>>,
}

/// The two special fields of a reference object.
pub struct ReferenceFields<'a> {
    pub kind: ReferenceType,
    pub referent: SlotMut<'a>,
    pub discovered: SlotMut<'a>,
}

pub trait ObjectVisitor: Visitor {
    fn visit_object(&mut self, object: &mut dyn HeapObject);
}

/// Liveness and inclusion tests.
pub trait PredicateVisitor: Visitor {
    fn test(&mut self, obj: Oop) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrue;

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFalse;

impl Visitor for AlwaysTrue {}

impl PredicateVisitor for AlwaysTrue {
    #[inline]
    fn test(&mut self, _obj: Oop) -> bool {
        true
    }
}

impl Visitor for AlwaysFalse {}

impl PredicateVisitor for AlwaysFalse {
    #[inline]
    fn test(&mut self, _obj: Oop) -> bool {
        false
    }
}

/// Applies a tracing visitor to the reference fields of every object it is given.
///
/// Calls go through `dyn TracingVisitor` unless another dispatch mode is named.
pub struct ObjectToReferences<'a, V, D = Dynamic>
where
    V: TracingVisitor,
    D: Dispatch,
{
    visitor: &'a mut V,
    iterator: FieldIterator<D>,
}

impl<'a, V, D> ObjectToReferences<'a, V, D>
where
    V: TracingVisitor,
    D: Dispatch,
{
    pub fn new(visitor: &'a mut V) -> Self {
        Self::new_with_config(visitor, TraversalConfig::default())
    }

    pub fn new_with_config(visitor: &'a mut V, config: TraversalConfig) -> Self {
        Self {
            visitor,
            iterator: FieldIterator::new(config),
        }
    }
}

impl<V, D> Visitor for ObjectToReferences<'_, V, D>
where
    V: TracingVisitor,
    D: Dispatch,
{
}

impl<V, D> ObjectVisitor for ObjectToReferences<'_, V, D>
where
    V: TracingVisitor,
    D: Dispatch,
{
    fn visit_object(&mut self, object: &mut dyn HeapObject) {
        self.iterator.iterate(object, &mut *self.visitor);
    }
}

/// An object visitor that copes with objects that may not be fully
/// initialized yet.
///
/// Both entry points return the number of bytes the caller should skip to
/// reach the next object, instead of trusting the object's header.
pub trait CarefulObjectVisitor: ObjectVisitor {
    /// Visits only the part of `object` that lies within `bounds`.
    fn visit_careful_in(&mut self, object: &mut dyn HeapObject, bounds: MemRegion) -> usize;

    fn visit_careful(&mut self, object: &mut dyn HeapObject) -> usize;
}

/// Walks raw memory by address, before objects there are known to be valid.
pub trait BlockVisitor: Visitor {
    /// Returns the size in bytes of the block starting at `addr`.
    fn visit_block(&mut self, addr: Address) -> usize;
}

/// A block visitor that only has a careful entry point.
///
/// Every careful visitor is also a [`BlockVisitor`] whose plain entry point is
/// fatal, so a caller has to opt into `visit_block_careful` explicitly.
pub trait CarefulBlockVisitor: Visitor {
    fn visit_block_careful(&mut self, addr: Address) -> usize;
}

impl<T> BlockVisitor for T
where
    T: CarefulBlockVisitor,
{
    fn visit_block(&mut self, _addr: Address) -> usize {
        fatal(VisitError::CarefulOnly)
    }
}
