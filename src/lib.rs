//! Visitor traits and traversal glue for a tracing garbage collector.
//!
//! Collectors express "do this to every reference" as a [`ReferenceVisitor`];
//! drivers such as [`FieldIterator`] walk objects, code units, class-loader
//! nodes and spaces, and hand every slot they find to the visitor. Whether a
//! call is resolved on the concrete visitor type or through a trait object is
//! picked per driver by a [`Dispatch`] parameter.
//!
//! The crate owns no heap. Objects, code units, loaders and spaces are the
//! caller's; the traits here only say how to look inside them.

pub mod code;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod iterate;
pub mod metadata;
pub mod object;
pub mod oop;
pub mod serialize;
pub mod space;
pub mod symbol;
pub mod trace;
pub mod visitor;

#[cfg(test)]
mod dispatch_equivalence_tests;

pub use code::{CodeToReferences, DedupCodeToReferences, FIX_RELOCATIONS};
pub use config::{CompressedReferences, TraversalConfig};
pub use dispatch::{Dispatch, Dynamic, Static};
pub use error::{fatal, VisitError};
pub use iterate::FieldIterator;
pub use metadata::{ClassLoaderDataToReferences, MetadataAware};
pub use object::{HeapObject, ObjectToReferences};
pub use oop::{Address, MemRegion, NarrowOop, Oop};
pub use trace::{NoHeaderVisitor, ReferenceIterationMode, ReferenceType, TracingVisitor};
pub use visitor::{ReferenceVisitor, Visitor, DO_NOTHING};
