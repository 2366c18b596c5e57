//! Errors raised while emitting memory-management code.
//!
//! The core runs after region and type resolution has succeeded, so every
//! error here is an internal-compiler-error class fault or an unsupported
//! target. None is recoverable: the caller aborts the compilation unit.

use cone_types::LiteralError;

/// Result alias for memory codegen.
pub type MemResult<T> = Result<T, MemError>;

/// A fatal memory codegen error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MemError {
    /// A borrowed reference reached an operation that owns memory.
    #[error("internal error: `{op}` called on borrowed reference type `{ty}`")]
    BorrowedRegion { op: &'static str, ty: String },

    /// A count adjustment on a reference that has no counter.
    #[error("internal error: reference type `{ty}` is not reference-counted")]
    NotCounted { ty: String },

    #[error("internal error: reference count adjustment of zero")]
    ZeroDelta,

    #[error("internal error: `{ty}` is not a reference type")]
    NotAReference { ty: String },

    /// A record contains itself by value.
    #[error("internal error: `{ty}` contains itself by value and has no finite size")]
    InfiniteSize { ty: String },

    /// The target cannot link heap allocation primitives.
    #[error("target environment provides no heap allocation primitives")]
    HeapUnavailable,

    #[error(transparent)]
    Literal(#[from] LiteralError),

    /// The function builder has no open block to emit into.
    #[error("internal error: no insertion point for memory codegen")]
    NoInsertionPoint,
}
