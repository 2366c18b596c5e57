//! Reference-count adjustment.

use cone_types::{Idx, Region};

use super::MemEmitter;
use crate::ir::{CmpPred, Const, Operand, TrapKind};
use crate::layout::RefLayout;
use crate::{MemError, MemResult, RcChecks};

impl MemEmitter<'_> {
    /// Add `delta` to the count of the counted block `reference` points into.
    ///
    /// Non-atomic load, add, store. After a decrement the new count is
    /// compared with zero: on zero the block's fields are dealiased and the
    /// block is freed from its header address. Emission continues in the
    /// join block either way.
    ///
    /// With [`RcChecks::Trap`], a decrement below zero or an increment that
    /// wraps the word traps instead of storing.
    pub fn adjust_count(
        &mut self,
        reference: impl Into<Operand>,
        delta: i64,
        ref_ty: Idx,
    ) -> MemResult<()> {
        let reference = reference.into();
        if delta == 0 {
            return Err(MemError::ZeroDelta);
        }
        let layout = self.counted_layout(ref_ty)?;
        self.insertion_point()?;
        let heap = if delta < 0 {
            Some(self.module.heap(&self.config.target)?)
        } else {
            None
        };
        let checked = self.config.rc_checks == RcChecks::Trap;

        let counter = self.builder.offset(reference, layout.count_offset());
        let old = self.builder.load(Idx::USIZE, counter);

        if checked && delta < 0 {
            let amount = self.word_const(delta.saturating_neg());
            let underflow = self.builder.cmp(CmpPred::Ult, Idx::USIZE, old, amount);
            self.trap_if(underflow, TrapKind::RcUnderflow, "rc.dec");
        }

        let step = self.word_const(delta);
        let new = self.builder.add(Idx::USIZE, old, step);

        if checked && delta > 0 {
            let wrapped = self.builder.cmp(CmpPred::Ult, Idx::USIZE, new, old);
            self.trap_if(wrapped, TrapKind::RcOverflow, "rc.inc");
        }

        self.builder.store(Idx::USIZE, new, counter);
        tracing::trace!(ty = %self.display(ref_ty), delta, checked, "adjust count");

        if let Some(heap) = heap {
            let is_zero = self.builder.cmp(CmpPred::Eq, Idx::USIZE, new, Const::Usize(0));
            let free_bb = self.builder.append_block("rc.free");
            let live_bb = self.builder.append_block("rc.live");
            self.builder.cond_br(is_zero, free_bb, live_bb);

            self.builder.position_at_end(free_bb);
            self.dealias_fields(reference, layout.pointee)?;
            self.builder.call_extern_void(heap.free, &[counter.into()]);
            self.builder.br(live_bb);

            self.builder.position_at_end(live_bb);
        }
        Ok(())
    }

    fn counted_layout(&self, ref_ty: Idx) -> MemResult<RefLayout> {
        let layout = self.layouts.ref_layout(ref_ty)?;
        match layout.region {
            Region::Counted => Ok(layout),
            Region::Owning => Err(MemError::NotCounted {
                ty: self.display(ref_ty),
            }),
            Region::Borrowed => Err(MemError::BorrowedRegion {
                op: "adjust_count",
                ty: self.display(ref_ty),
            }),
        }
    }
}
