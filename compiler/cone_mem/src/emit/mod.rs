//! Memory-management code emission.
//!
//! `MemEmitter` emits allocation, reference-count adjustment, release, and
//! scope cleanup into the function a [`FunctionBuilder`] is building. It
//! borrows the per-unit state: the layout table, configuration, and the
//! [`MemModule`] that memoizes heap primitives and dealias functions.
//!
//! # Operations
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`allocate`](MemEmitter::allocate) | allocate a block, set count to 1 for `rc`, store the initial value |
//! | [`adjust_count`](MemEmitter::adjust_count) | load-add-store on the count; free on zero after a decrement |
//! | [`release`](MemEmitter::release) | give up one reference according to its region |
//! | [`dealias_fields`](MemEmitter::dealias_fields) | release every owning field of a value |
//! | [`close_scope`](MemEmitter::close_scope) | release a scope's owned variables |
//!
//! Field releases run in a per-type dealias function (`void(ptr)`), emitted
//! on demand by [`MemModule::emit_pending_glue`]. The function is registered
//! before its body exists, so a recursive type reuses its own function.
//!
//! Generated code is non-atomic and assumes single-threaded access.

mod alloc;
mod dealias;
mod glue;
mod rc;

pub use alloc::InitValue;

use cone_types::{Idx, Pool};

use crate::builder::FunctionBuilder;
use crate::ir::{BlockId, Const, Operand, TrapKind};
use crate::layout::LayoutTable;
use crate::{MemConfig, MemError, MemModule, MemResult};

/// Emits memory-management code into one function.
pub struct MemEmitter<'a> {
    pool: &'a Pool,
    layouts: &'a LayoutTable<'a>,
    config: &'a MemConfig,
    module: &'a mut MemModule,
    builder: &'a mut FunctionBuilder,
}

impl<'a> MemEmitter<'a> {
    pub fn new(
        layouts: &'a LayoutTable<'a>,
        config: &'a MemConfig,
        module: &'a mut MemModule,
        builder: &'a mut FunctionBuilder,
    ) -> Self {
        MemEmitter {
            pool: layouts.pool(),
            layouts,
            config,
            module,
            builder,
        }
    }

    /// The builder, for emitting the surrounding non-memory code.
    pub fn builder(&mut self) -> &mut FunctionBuilder {
        self.builder
    }

    pub fn module(&self) -> &MemModule {
        self.module
    }

    pub fn pool(&self) -> &'a Pool {
        self.pool
    }

    pub fn layouts(&self) -> &'a LayoutTable<'a> {
        self.layouts
    }

    pub(crate) fn insertion_point(&self) -> MemResult<BlockId> {
        self.builder
            .insertion_block()
            .ok_or(MemError::NoInsertionPoint)
    }

    fn display(&self, ty: Idx) -> String {
        self.pool.display(ty)
    }

    /// `value` as a word constant, two's complement, masked to the target width.
    fn word_const(&self, value: i64) -> Operand {
        let bits = u64::from_ne_bytes(value.to_ne_bytes());
        Const::Usize(bits & self.config.target.pointer_width.mask()).into()
    }

    /// Branch to a trap block when `cond` holds; continue in a fresh block.
    fn trap_if(&mut self, cond: impl Into<Operand>, kind: TrapKind, continue_label: &str) {
        let trap_bb = self.builder.append_block(kind.as_str());
        let cont_bb = self.builder.append_block(continue_label);
        self.builder.cond_br(cond, trap_bb, cont_bb);
        self.builder.position_at_end(trap_bb);
        self.builder.trap(kind);
        self.builder.position_at_end(cont_bb);
    }
}
