//! Region-granularity visitors: heap spaces and the monitor cache.

use crate::oop::{Address, MemRegion, Oop};
use crate::visitor::Visitor;

/// A contiguous heap region. Owned by the heap.
pub trait Space {
    /// The whole reserved extent.
    fn region(&self) -> MemRegion;

    /// The allocated prefix of the extent.
    fn used_region(&self) -> MemRegion;
}

/// A space that supports sliding objects down in place.
pub trait CompactibleSpace: Space {
    /// Where the next compacted object will land.
    fn compaction_top(&self) -> Address;

    fn set_compaction_top(&mut self, top: Address);
}

pub trait SpaceVisitor: Visitor {
    fn visit_space(&mut self, space: &mut dyn Space);
}

pub trait CompactibleSpaceVisitor: Visitor {
    fn visit_compactible_space(&mut self, space: &mut dyn CompactibleSpace);
}

/// An entry in the lock-record cache.
pub trait ObjectMonitor {
    /// The object this monitor is inflated for.
    fn object(&self) -> Oop;

    fn object_slot(&mut self) -> &mut Oop;
}

pub trait MonitorVisitor: Visitor {
    fn visit_monitor(&mut self, monitor: &mut dyn ObjectMonitor);
}
