//! Applies a tracing visitor to one object's reference fields.
//!
//! This is the glue every object-granularity driver shares: metadata first
//! (only when the visitor asks for it; the header type, the type a mirror
//! stands for, and a loader object's data node), then the ordinary reference
//! fields, then the referent and discovered fields of reference objects
//! according to the visitor's iteration mode.

use std::marker::PhantomData;

use tracing::trace;

use crate::config::TraversalConfig;
use crate::dispatch::{Dispatch, Static};
use crate::error::{fatal, VisitError};
use crate::object::{HeapObject, ReferenceFields};
use crate::oop::{FieldSlots, Oop, ReferenceSlot, SlotMut};
use crate::trace::{NoHeaderVisitor, ReferenceIterationMode, TracingVisitor};
use crate::visitor::ReferenceVisitor;

pub struct FieldIterator<D = Static>
where
    D: Dispatch,
{
    config: TraversalConfig,
    _mode: PhantomData<D>,
}

impl<D> FieldIterator<D>
where
    D: Dispatch,
{
    pub fn new(config: TraversalConfig) -> Self {
        Self {
            config,
            _mode: PhantomData,
        }
    }

    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    /// Visits every reference held by `object`, header included.
    pub fn iterate<V>(&self, object: &mut dyn HeapObject, visitor: &mut V)
    where
        V: TracingVisitor,
    {
        let obj = object.address();
        let layout = object.layout();

        if D::visits_metadata(visitor) {
            if let Some(metadata) = layout.metadata {
                D::visit_type_metadata(visitor, metadata);
            }
            if let Some(mirrored) = layout.mirrored {
                D::visit_type_metadata(visitor, mirrored);
            }
            if let Some(cld) = layout.class_loader {
                D::visit_class_loader_data(visitor, cld);
            }
        }

        self.iterate_fields(visitor, layout.fields);

        if let Some(reference) = layout.reference {
            self.iterate_reference(obj, reference, visitor);
        }
    }

    /// Visits the fields of `object` with a plain reference visitor, skipping
    /// its header and bypassing discovery.
    pub fn iterate_no_header<V>(&self, object: &mut dyn HeapObject, visitor: &mut V)
    where
        V: ReferenceVisitor + ?Sized,
    {
        let mut wrapper = NoHeaderVisitor::new(visitor);
        self.iterate(object, &mut wrapper);
    }

    fn iterate_fields<V>(&self, visitor: &mut V, fields: FieldSlots<'_>)
    where
        V: TracingVisitor,
    {
        match fields {
            FieldSlots::Full(slots) => {
                for slot in slots.iter_mut() {
                    self.visit_slot(visitor, slot);
                }
            }
            FieldSlots::Narrow(slots) => {
                for slot in slots.iter_mut() {
                    self.visit_slot(visitor, slot);
                }
            }
        }
    }

    fn iterate_reference<V>(&self, obj: Oop, mut fields: ReferenceFields<'_>, visitor: &mut V)
    where
        V: TracingVisitor,
    {
        match visitor.iteration_mode() {
            ReferenceIterationMode::DiscoverOnly => {
                self.discover_or_visit(obj, &mut fields, visitor);
            }
            ReferenceIterationMode::DiscoveredAndDiscovery => {
                self.visit_slot_mut(visitor, &mut fields.discovered);
                self.discover_or_visit(obj, &mut fields, visitor);
            }
            ReferenceIterationMode::Fields => {
                self.visit_slot_mut(visitor, &mut fields.referent);
                self.visit_slot_mut(visitor, &mut fields.discovered);
            }
        }
    }

    fn discover_or_visit<V>(&self, obj: Oop, fields: &mut ReferenceFields<'_>, visitor: &mut V)
    where
        V: TracingVisitor,
    {
        if try_discover(obj, fields, visitor) {
            trace!(object = ?obj, kind = ?fields.kind, "reference discovered");
            return;
        }
        self.visit_slot_mut(visitor, &mut fields.referent);
        self.visit_slot_mut(visitor, &mut fields.discovered);
    }

    fn visit_slot_mut<V>(&self, visitor: &mut V, slot: &mut SlotMut<'_>)
    where
        V: TracingVisitor,
    {
        match slot {
            SlotMut::Full(slot) => self.visit_slot(visitor, &mut **slot),
            SlotMut::Narrow(slot) => self.visit_slot(visitor, &mut **slot),
        }
    }

    #[inline]
    fn visit_slot<V, S>(&self, visitor: &mut V, slot: &mut S)
    where
        V: TracingVisitor,
        S: ReferenceSlot,
    {
        D::visit_reference(visitor, slot);
        if self.config.verifies() && visitor.should_verify_references() {
            self.verify(slot);
        }
    }

    fn verify<S>(&self, slot: &S)
    where
        S: ReferenceSlot,
    {
        let oop = slot.load(self.config.compressed);
        if !oop.is_well_formed() {
            fatal(VisitError::MalformedReference { address: oop.raw() });
        }
    }
}

impl<D> Default for FieldIterator<D>
where
    D: Dispatch,
{
    fn default() -> Self {
        Self::new(TraversalConfig::default())
    }
}

// 只有非空的 referent 才需要发现，空引用没有可推迟的内容
fn try_discover<V>(obj: Oop, fields: &ReferenceFields<'_>, visitor: &V) -> bool
where
    V: TracingVisitor,
{
    match visitor.reference_discoverer() {
        Some(discoverer) if !fields.referent.is_null() => {
            discoverer.discover_reference(obj, fields.kind)
        }
        _ => false,
    }
}
