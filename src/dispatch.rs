//! Static vs. dynamic routing of tracing-visitor calls.
//!
//! A driver picks a strategy per call site as a type parameter:
//!
//! - [`Static`] calls the visitor's methods on its concrete type, so the
//!   compiler can inline them into the field loop.
//! - [`Dynamic`] calls through `dyn TracingVisitor`, one indirect call each,
//!   which is what lets one driver serve visitors it only knows as trait
//!   objects.
//!
//! Both strategies end up in the same trait implementation, so they cannot
//! disagree; the equivalence tests pin that down.

use crate::metadata::{ClassLoaderData, TypeMetadata};
use crate::oop::ReferenceSlot;
use crate::trace::TracingVisitor;

pub trait Dispatch {
    /// True when calls are resolved on the concrete visitor type.
    const INLINED: bool;

    fn visit_reference<V, S>(visitor: &mut V, slot: &mut S)
    where
        V: TracingVisitor,
        S: ReferenceSlot;

    fn visit_type_metadata<V>(visitor: &mut V, metadata: &dyn TypeMetadata)
    where
        V: TracingVisitor;

    fn visit_class_loader_data<V>(visitor: &mut V, cld: &dyn ClassLoaderData)
    where
        V: TracingVisitor;

    fn visits_metadata<V>(visitor: &V) -> bool
    where
        V: TracingVisitor;

    fn is_idempotent<V>(visitor: &V) -> bool
    where
        V: TracingVisitor;
}

/// Monomorphized calls on the concrete visitor type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Static;

/// Indirect calls through `dyn TracingVisitor`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dynamic;

impl Dispatch for Static {
    const INLINED: bool = true;

    #[inline(always)]
    fn visit_reference<V, S>(visitor: &mut V, slot: &mut S)
    where
        V: TracingVisitor,
        S: ReferenceSlot,
    {
        slot.accept(visitor);
    }

    #[inline(always)]
    fn visit_type_metadata<V>(visitor: &mut V, metadata: &dyn TypeMetadata)
    where
        V: TracingVisitor,
    {
        visitor.visit_type_metadata(metadata);
    }

    #[inline(always)]
    fn visit_class_loader_data<V>(visitor: &mut V, cld: &dyn ClassLoaderData)
    where
        V: TracingVisitor,
    {
        visitor.visit_class_loader_data(cld);
    }

    #[inline(always)]
    fn visits_metadata<V>(visitor: &V) -> bool
    where
        V: TracingVisitor,
    {
        visitor.visits_metadata()
    }

    #[inline(always)]
    fn is_idempotent<V>(visitor: &V) -> bool
    where
        V: TracingVisitor,
    {
        visitor.is_idempotent()
    }
}

impl Dispatch for Dynamic {
    const INLINED: bool = false;

    fn visit_reference<V, S>(visitor: &mut V, slot: &mut S)
    where
        V: TracingVisitor,
        S: ReferenceSlot,
    {
        let visitor: &mut dyn TracingVisitor = visitor;
        slot.accept(visitor);
    }

    fn visit_type_metadata<V>(visitor: &mut V, metadata: &dyn TypeMetadata)
    where
        V: TracingVisitor,
    {
        let visitor: &mut dyn TracingVisitor = visitor;
        visitor.visit_type_metadata(metadata);
    }

    fn visit_class_loader_data<V>(visitor: &mut V, cld: &dyn ClassLoaderData)
    where
        V: TracingVisitor,
    {
        let visitor: &mut dyn TracingVisitor = visitor;
        visitor.visit_class_loader_data(cld);
    }

    fn visits_metadata<V>(visitor: &V) -> bool
    where
        V: TracingVisitor,
    {
        let visitor: &dyn TracingVisitor = visitor;
        visitor.visits_metadata()
    }

    fn is_idempotent<V>(visitor: &V) -> bool
    where
        V: TracingVisitor,
    {
        let visitor: &dyn TracingVisitor = visitor;
        visitor.is_idempotent()
    }
}
