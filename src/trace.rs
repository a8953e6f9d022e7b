//! Tracing visitors: reference visitors that also carry the collector's
//! reference-discovery and metadata-walking policy.

use crate::error::{fatal, VisitError};
use crate::metadata::{ClassLoaderData, TypeMetadata};
use crate::oop::{NarrowOop, Oop};
use crate::visitor::{ReferenceVisitor, Visitor};

/// Kind of a reference object, as reported to the discoverer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Soft,
    Weak,
    Final,
    Phantom,
}

/// How the referent and discovered fields of a reference object are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReferenceIterationMode {
    /// Try discovery; visit the fields only if the discoverer declines.
    #[default]
    DiscoverOnly,
    /// Always visit the discovered field, then behave like `DiscoverOnly`.
    DiscoveredAndDiscovery,
    /// Visit both fields and never discover.
    Fields,
}

/// The reference-discovery collaborator.
///
/// Shared with the collector's reference processor, which owns it; a tracing
/// visitor only holds a borrow for the length of one traversal.
pub trait ReferenceDiscoverer {
    /// Offers `obj` for deferred processing. Returns true if it was taken, in
    /// which case the referent must not be visited now.
    fn discover_reference(&self, obj: Oop, kind: ReferenceType) -> bool;
}

/// A reference visitor with collector policy attached.
///
/// `visits_metadata` and the two metadata actions belong together: a driver
/// asks first and only calls the actions when the answer is yes. The default
/// actions are fatal, so a driver that skips the question is caught.
pub trait TracingVisitor: ReferenceVisitor {
    fn reference_discoverer(&self) -> Option<&dyn ReferenceDiscoverer> {
        None
    }

    fn iteration_mode(&self) -> ReferenceIterationMode {
        ReferenceIterationMode::DiscoverOnly
    }

    fn visits_metadata(&self) -> bool {
        false
    }

    fn visit_type_metadata(&mut self, _metadata: &dyn TypeMetadata) {
        fatal(VisitError::UnreachableMetadata {
            what: "visit_type_metadata",
        })
    }

    fn visit_class_loader_data(&mut self, _cld: &dyn ClassLoaderData) {
        fatal(VisitError::UnreachableMetadata {
            what: "visit_class_loader_data",
        })
    }

    /// Whether re-applying this visitor to a slot before the end of the
    /// current collection is harmless.
    fn is_idempotent(&self) -> bool {
        false
    }

    /// Debug builds verify every visited slot unless this returns false.
    /// Visitors that leave slots transiently invalid mid-traversal opt out.
    fn should_verify_references(&self) -> bool {
        true
    }
}

impl<V> TracingVisitor for &mut V
where
    V: TracingVisitor + ?Sized,
{
    #[inline]
    fn reference_discoverer(&self) -> Option<&dyn ReferenceDiscoverer> {
        (**self).reference_discoverer()
    }

    #[inline]
    fn iteration_mode(&self) -> ReferenceIterationMode {
        (**self).iteration_mode()
    }

    #[inline]
    fn visits_metadata(&self) -> bool {
        (**self).visits_metadata()
    }

    #[inline]
    fn visit_type_metadata(&mut self, metadata: &dyn TypeMetadata) {
        (**self).visit_type_metadata(metadata);
    }

    #[inline]
    fn visit_class_loader_data(&mut self, cld: &dyn ClassLoaderData) {
        (**self).visit_class_loader_data(cld);
    }

    #[inline]
    fn is_idempotent(&self) -> bool {
        (**self).is_idempotent()
    }

    #[inline]
    fn should_verify_references(&self) -> bool {
        (**self).should_verify_references()
    }
}

/// Lets a plain reference visitor walk an object's fields, skipping the header.
///
/// Never visits metadata and never discovers; the wrapped visitor sees every
/// field.
pub struct NoHeaderVisitor<'a, V>
where
    V: ReferenceVisitor + ?Sized,
{
    wrapped: &'a mut V,
}

impl<'a, V> NoHeaderVisitor<'a, V>
where
    V: ReferenceVisitor + ?Sized,
{
    pub fn new(wrapped: &'a mut V) -> Self {
        Self { wrapped }
    }
}

impl<V> Visitor for NoHeaderVisitor<'_, V> where V: ReferenceVisitor + ?Sized {}

impl<V> ReferenceVisitor for NoHeaderVisitor<'_, V>
where
    V: ReferenceVisitor + ?Sized,
{
    #[inline]
    fn visit_oop(&mut self, slot: &mut Oop) {
        self.wrapped.visit_oop(slot);
    }

    #[inline]
    fn visit_narrow_oop(&mut self, slot: &mut NarrowOop) {
        self.wrapped.visit_narrow_oop(slot);
    }
}

impl<V> TracingVisitor for NoHeaderVisitor<'_, V>
where
    V: ReferenceVisitor + ?Sized,
{
    fn iteration_mode(&self) -> ReferenceIterationMode {
        ReferenceIterationMode::Fields
    }
}
