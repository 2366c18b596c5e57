//! Release and field dealiasing.

use cone_types::{Idx, Region};

use super::MemEmitter;
use crate::ir::Operand;
use crate::layout::{DealiasPlan, FieldAction, FieldRelease};
use crate::MemResult;

impl MemEmitter<'_> {
    /// Give up one reference of type `ref_ty`.
    ///
    /// - `own`: dealias the pointee's fields, then free the block.
    /// - `rc`: decrement the count by one.
    /// - `borrow`: nothing.
    pub fn release(&mut self, reference: impl Into<Operand>, ref_ty: Idx) -> MemResult<()> {
        let reference = reference.into();
        let layout = self.layouts.ref_layout(ref_ty)?;
        match layout.region {
            Region::Owning => {
                self.insertion_point()?;
                let heap = self.module.heap(&self.config.target)?;
                self.dealias_fields(reference, layout.pointee)?;
                self.builder.call_extern_void(heap.free, &[reference]);
                Ok(())
            }
            Region::Counted => self.adjust_count(reference, -1, ref_ty),
            Region::Borrowed => Ok(()),
        }
    }

    /// Release every owning or counted reference field of the `value_ty`
    /// at `reference`, in declaration order, descending into records held
    /// by value. Borrowed fields and non-record values need nothing.
    pub fn dealias_fields(&mut self, reference: impl Into<Operand>, value_ty: Idx) -> MemResult<()> {
        let plan = self.layouts.dealias_plan(value_ty)?;
        match &*plan {
            DealiasPlan::Trivial => Ok(()),
            DealiasPlan::Fields(_) => {
                self.insertion_point()?;
                let config = self.config;
                let glue = self
                    .module
                    .glue_fn(value_ty, || format!("{}{}", config.glue_prefix, value_ty.raw()));
                self.builder.call_void(glue, &[reference.into()]);
                Ok(())
            }
        }
    }

    /// Release each field in `fields` of the `record` at `base`. Inline
    /// records are dealiased in place, at the field's address.
    pub(super) fn release_fields(
        &mut self,
        base: Operand,
        record: Idx,
        fields: &[FieldRelease],
    ) -> MemResult<()> {
        for field in fields {
            let addr = self
                .builder
                .field_addr(base, record, field.index, field.offset);
            tracing::trace!(
                record = %self.display(record),
                field = self.pool.lookup(field.name),
                action = ?field.action,
                "release field"
            );
            match field.action {
                FieldAction::Release(_) => {
                    let value = self.builder.load(field.ty, addr);
                    self.release(value, field.ty)?;
                }
                FieldAction::Dealias => self.dealias_fields(addr, field.ty)?,
            }
        }
        Ok(())
    }
}
