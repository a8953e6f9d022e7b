use thiserror::Error;

/// Contract violations raised while traversing the heap.
///
/// None of these are recoverable: they mean either a caller broke a visitor
/// contract or a persisted stream is corrupt. They reach callers through
/// [`fatal`], which never returns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisitError {
    #[error("{what} invoked on a visitor that does not visit metadata")]
    UnreachableMetadata { what: &'static str },

    #[error("call visit_block_careful instead")]
    CarefulOnly,

    #[error("serialized tag mismatch: expected {expected}, found {found}")]
    TagMismatch { expected: i32, found: i32 },

    #[error("serialized stream truncated: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("reference {address:#x} is not a well-formed reference")]
    MalformedReference { address: usize },

    #[error("symbol address {address:#x} collides with the slot tag bit")]
    MisalignedSymbol { address: usize },

    #[error("reference {address:#x} cannot be encoded relative to base {base:#x}")]
    ReferenceOutOfRange { address: usize, base: usize },

    #[error("encoded reference {raw:#x} overflows the address space above base {base:#x}")]
    EncodedOutOfRange { raw: u64, base: usize },
}

/// Halts the traversal on a contract violation.
#[cold]
#[track_caller]
pub fn fatal(err: VisitError) -> ! {
    tracing::error!(error = %err, "heap traversal contract violated");
    panic!("{}", err)
}
