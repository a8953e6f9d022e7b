//! Type metadata and class-loader nodes, and the visitors that walk them.
//!
//! Both node kinds live outside the object heap but hold references into it.
//! A collector that can unload types has to trace through them, which is what
//! [`MetadataAware`] is for.

use crate::oop::{NarrowOop, Oop};
use crate::trace::{ReferenceDiscoverer, ReferenceIterationMode, TracingVisitor};
use crate::visitor::{ReferenceVisitor, Visitor};

/// Describes an object's type. Owned by the runtime.
pub trait TypeMetadata {
    /// The loading context that keeps this type alive.
    fn class_loader_data(&self) -> &dyn ClassLoaderData;
}

/// A class-loader node. Owned by the runtime.
///
/// Implementations hold their references behind interior mutability, since
/// visiting may rewrite them through a shared borrow.
pub trait ClassLoaderData {
    /// Claims the node for the current claim epoch. Returns false if somebody
    /// already claimed it.
    fn try_claim(&self) -> bool;

    /// Applies `visitor` to every reference slot the node holds.
    fn references_do(&self, visitor: &mut dyn ReferenceVisitor);
}

pub trait TypeMetadataVisitor: Visitor {
    fn visit_metadata(&mut self, metadata: &dyn TypeMetadata);
}

pub trait ClassLoaderDataVisitor: Visitor {
    fn visit_loader(&mut self, cld: &dyn ClassLoaderData);
}

/// Applies `visitor` to the references of `cld`.
///
/// With `must_claim`, a node already claimed in this epoch is skipped.
pub fn visit_class_loader_references(
    cld: &dyn ClassLoaderData,
    visitor: &mut dyn ReferenceVisitor,
    must_claim: bool,
) {
    if must_claim && !cld.try_claim() {
        return;
    }
    cld.references_do(visitor);
}

/// Bridges class-loader iteration to reference visiting.
pub struct ClassLoaderDataToReferences<'a, V>
where
    V: ReferenceVisitor + ?Sized,
{
    visitor: &'a mut V,
    must_claim: bool,
}

impl<'a, V> ClassLoaderDataToReferences<'a, V>
where
    V: ReferenceVisitor + ?Sized,
{
    pub fn new(visitor: &'a mut V) -> Self {
        Self {
            visitor,
            must_claim: true,
        }
    }

    pub fn new_with_claim(visitor: &'a mut V, must_claim: bool) -> Self {
        Self {
            visitor,
            must_claim,
        }
    }

    pub fn must_claim(&self) -> bool {
        self.must_claim
    }
}

impl<V> Visitor for ClassLoaderDataToReferences<'_, V> where V: ReferenceVisitor + ?Sized {}

impl<V> ClassLoaderDataVisitor for ClassLoaderDataToReferences<'_, V>
where
    V: ReferenceVisitor + ?Sized,
{
    fn visit_loader(&mut self, cld: &dyn ClassLoaderData) {
        visit_class_loader_references(cld, &mut self.visitor, self.must_claim);
    }
}

/// A tracing visitor that also traces through type metadata.
///
/// `visits_metadata` is pinned to true. Type metadata is walked through its
/// class-loader node, and each node's references get this same visitor,
/// claiming the node first so shared loaders are walked once.
///
/// Everything else (discovery, iteration mode, idempotency, verification) is
/// the wrapped visitor's answer.
pub struct MetadataAware<V>
where
    V: TracingVisitor,
{
    inner: V,
}

#[allow(dead_code)]
impl<V> MetadataAware<V>
where
    V: TracingVisitor,
{
    pub fn new(inner: V) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut V {
        &mut self.inner
    }

    pub fn into_inner(self) -> V {
        self.inner
    }
}

impl<V> Visitor for MetadataAware<V> where V: TracingVisitor {}

impl<V> ReferenceVisitor for MetadataAware<V>
where
    V: TracingVisitor,
{
    #[inline]
    fn visit_oop(&mut self, slot: &mut Oop) {
        self.inner.visit_oop(slot);
    }

    #[inline]
    fn visit_narrow_oop(&mut self, slot: &mut NarrowOop) {
        self.inner.visit_narrow_oop(slot);
    }
}

impl<V> TracingVisitor for MetadataAware<V>
where
    V: TracingVisitor,
{
    fn reference_discoverer(&self) -> Option<&dyn ReferenceDiscoverer> {
        self.inner.reference_discoverer()
    }

    fn iteration_mode(&self) -> ReferenceIterationMode {
        self.inner.iteration_mode()
    }

    #[inline]
    fn visits_metadata(&self) -> bool {
        true
    }

    fn visit_type_metadata(&mut self, metadata: &dyn TypeMetadata) {
        self.visit_class_loader_data(metadata.class_loader_data());
    }

    fn visit_class_loader_data(&mut self, cld: &dyn ClassLoaderData) {
        visit_class_loader_references(cld, self, true);
    }

    fn is_idempotent(&self) -> bool {
        self.inner.is_idempotent()
    }

    fn should_verify_references(&self) -> bool {
        self.inner.should_verify_references()
    }
}
