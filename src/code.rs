//! Visitors over compiled-code units.
//!
//! Code units reach a collector from the code cache and from thread stacks,
//! often both. [`CodeToReferences`] traces the references a unit embeds;
//! [`DedupCodeToReferences`] does the same but at most once per unit per pass.

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::config::TraversalConfig;
use crate::oop::Address;
use crate::visitor::{ReferenceVisitor, Visitor};

/// Pass to the adapters when the wrapped visitor moves objects.
pub const FIX_RELOCATIONS: bool = true;

/// A unit in the code cache. Owned by the code cache.
pub trait CodeBlob {
    /// Start of the unit; used as its identity within a pass.
    fn address(&self) -> Address;

    /// The unit as executable code with embedded references, if it is one.
    fn as_compiled_code(&mut self) -> Option<&mut dyn CompiledCode>;
}

/// Executable code that embeds references in its instructions.
pub trait CompiledCode {
    /// Applies `visitor` to every embedded reference slot, including the
    /// unit's out-of-line reference table.
    fn references_do(&mut self, visitor: &mut dyn ReferenceVisitor);

    /// Re-patches the instructions from the current slot values.
    fn fix_reference_relocations(&mut self);
}

pub trait CodeVisitor: Visitor {
    fn visit_code(&mut self, blob: &mut dyn CodeBlob);
}

/// Applies a reference visitor to the references embedded in code units.
///
/// With `fix_relocations`, the wrapped visitor must move objects to their new
/// location as it visits them: the unit's instructions are patched right
/// after, from whatever the slots then hold.
///
/// The adapter borrows its visitor, so it cannot outlive the frame that
/// owns the visitor:
///
/// ```compile_fail
/// use gc_visitor::code::CodeToReferences;
/// use gc_visitor::visitor::NoOpVisitor;
///
/// fn escape() -> CodeToReferences<'static, NoOpVisitor> {
///     let mut visitor = NoOpVisitor;
///     CodeToReferences::new(&mut visitor, false)
/// }
/// ```
pub struct CodeToReferences<'a, V>
where
    V: ReferenceVisitor + ?Sized,
{
    visitor: &'a mut V,
    fix_relocations: bool,
}

impl<'a, V> CodeToReferences<'a, V>
where
    V: ReferenceVisitor + ?Sized,
{
    pub fn new(visitor: &'a mut V, fix_relocations: bool) -> Self {
        Self {
            visitor,
            fix_relocations,
        }
    }

    pub fn fix_relocations(&self) -> bool {
        self.fix_relocations
    }

    pub fn visit_compiled(&mut self, code: &mut dyn CompiledCode) {
        // 先访问引用再修补指令，否则会用旧地址修补代码
        code.references_do(&mut self.visitor);
        if self.fix_relocations {
            code.fix_reference_relocations();
        }
    }
}

impl<V> Visitor for CodeToReferences<'_, V> where V: ReferenceVisitor + ?Sized {}

impl<V> CodeVisitor for CodeToReferences<'_, V>
where
    V: ReferenceVisitor + ?Sized,
{
    fn visit_code(&mut self, blob: &mut dyn CodeBlob) {
        if let Some(code) = blob.as_compiled_code() {
            self.visit_compiled(code);
        }
    }
}

/// Records which code units a pass has already visited.
///
/// Not synchronized. Concurrent scanners each need their own store, or one
/// that does its own locking behind this interface.
pub trait VisitedMarks {
    /// Marks `blob`; returns true if it was already marked.
    fn test_and_set(&mut self, blob: Address) -> bool;

    fn clear(&mut self);
}

impl VisitedMarks for FxHashSet<Address> {
    fn test_and_set(&mut self, blob: Address) -> bool {
        !self.insert(blob)
    }

    fn clear(&mut self) {
        FxHashSet::clear(self);
    }
}

/// [`CodeToReferences`] that visits each distinct unit at most once per pass.
pub struct DedupCodeToReferences<'a, V, M = FxHashSet<Address>>
where
    V: ReferenceVisitor + ?Sized,
    M: VisitedMarks,
{
    inner: CodeToReferences<'a, V>,
    marks: M,
    passes: usize,
}

impl<'a, V> DedupCodeToReferences<'a, V>
where
    V: ReferenceVisitor + ?Sized,
{
    pub fn new(visitor: &'a mut V, fix_relocations: bool) -> Self {
        Self::new_with_marks(visitor, fix_relocations, FxHashSet::default())
    }

    pub fn new_with_config(
        visitor: &'a mut V,
        fix_relocations: bool,
        config: &TraversalConfig,
    ) -> Self {
        let marks =
            FxHashSet::with_capacity_and_hasher(config.code_marks_capacity, Default::default());
        Self::new_with_marks(visitor, fix_relocations, marks)
    }
}

#[allow(dead_code)]
impl<'a, V, M> DedupCodeToReferences<'a, V, M>
where
    V: ReferenceVisitor + ?Sized,
    M: VisitedMarks,
{
    pub fn new_with_marks(visitor: &'a mut V, fix_relocations: bool, marks: M) -> Self {
        Self {
            inner: CodeToReferences::new(visitor, fix_relocations),
            marks,
            passes: 0,
        }
    }

    /// 清空已访问标记，每一轮扫描开始时调用
    pub fn begin_pass(&mut self) {
        self.marks.clear();
        self.passes += 1;
        debug!(pass = self.passes, "code unit pass started");
    }

    /// 已开始的扫描轮数
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn fix_relocations(&self) -> bool {
        self.inner.fix_relocations()
    }

    pub fn into_marks(self) -> M {
        self.marks
    }
}

impl<V, M> Visitor for DedupCodeToReferences<'_, V, M>
where
    V: ReferenceVisitor + ?Sized,
    M: VisitedMarks,
{
}

impl<V, M> CodeVisitor for DedupCodeToReferences<'_, V, M>
where
    V: ReferenceVisitor + ?Sized,
    M: VisitedMarks,
{
    fn visit_code(&mut self, blob: &mut dyn CodeBlob) {
        let addr = blob.address();
        if let Some(code) = blob.as_compiled_code() {
            if self.marks.test_and_set(addr) {
                trace!(blob = ?addr, "code unit already visited this pass");
                return;
            }
            self.inner.visit_compiled(code);
        }
    }
}
