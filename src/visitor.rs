use crate::oop::{NarrowOop, Oop};

/// Capability tag carried by every visitor.
///
/// Visitors are built on the stack right before a traversal and dropped when
/// it returns. Adapters only ever borrow the visitors they wrap, so nothing in
/// this crate can keep a visitor alive past the frame that created it.
pub trait Visitor {}

/// Visits reference slots.
///
/// Both representations are required: the heap may store either one depending
/// on how it was configured. A visitor may read, rewrite or clear the slot.
pub trait ReferenceVisitor: Visitor {
    fn visit_oop(&mut self, slot: &mut Oop);
    fn visit_narrow_oop(&mut self, slot: &mut NarrowOop);
}

impl<V> Visitor for &mut V where V: Visitor + ?Sized {}

impl<V> ReferenceVisitor for &mut V
where
    V: ReferenceVisitor + ?Sized,
{
    #[inline]
    fn visit_oop(&mut self, slot: &mut Oop) {
        (**self).visit_oop(slot);
    }

    #[inline]
    fn visit_narrow_oop(&mut self, slot: &mut NarrowOop) {
        (**self).visit_narrow_oop(slot);
    }
}

/// Discards every slot it is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoOpVisitor;

/// Shared no-op visitor. Stateless, so it is usable through a shared reference.
pub static DO_NOTHING: NoOpVisitor = NoOpVisitor;

impl Visitor for NoOpVisitor {}

impl ReferenceVisitor for NoOpVisitor {
    #[inline]
    fn visit_oop(&mut self, _slot: &mut Oop) {}

    #[inline]
    fn visit_narrow_oop(&mut self, _slot: &mut NarrowOop) {}
}

impl Visitor for &NoOpVisitor {}

impl ReferenceVisitor for &NoOpVisitor {
    #[inline]
    fn visit_oop(&mut self, _slot: &mut Oop) {}

    #[inline]
    fn visit_narrow_oop(&mut self, _slot: &mut NarrowOop) {}
}

/// A callback that takes no arguments.
pub trait VoidVisitor: Visitor {
    fn run(&mut self);
}
