//! Heap primitive declarations.
//!
//! The memory core allocates and frees through two external symbols the
//! target links (by default libc `malloc` and `free`). They are declared
//! lazily, at most once per module: the first allocation or release in a
//! unit declares both, every later request reuses them.

use cone_types::Idx;

use crate::ir::ExternId;
use crate::{MemError, MemModule, MemResult, TargetConfig};

/// The declared heap primitives of one module.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapDecls {
    /// `fn(usize) -> ptr`
    pub alloc: ExternId,
    /// `fn(ptr)`
    pub free: ExternId,
}

impl MemModule {
    /// Declare the heap primitives if absent and return them.
    ///
    /// A symbol the module already declares under the same name is reused
    /// rather than redeclared.
    pub fn heap(&mut self, target: &TargetConfig) -> MemResult<HeapDecls> {
        if let Some(decls) = self.heap {
            return Ok(decls);
        }
        let Some(symbols) = &target.heap else {
            return Err(MemError::HeapUnavailable);
        };

        let alloc = self.declare_extern(&symbols.alloc, &[Idx::USIZE], Idx::PTR);
        let free = self.declare_extern(&symbols.free, &[Idx::PTR], Idx::UNIT);
        tracing::debug!(
            module = self.name(),
            alloc = %symbols.alloc,
            free = %symbols.free,
            "declared heap primitives"
        );

        let decls = HeapDecls { alloc, free };
        self.heap = Some(decls);
        Ok(decls)
    }

    /// Heap primitives, if this module declared them.
    pub fn heap_decls(&self) -> Option<HeapDecls> {
        self.heap
    }
}
