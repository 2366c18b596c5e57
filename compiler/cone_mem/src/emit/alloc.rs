//! Heap allocation.

use cone_types::{check_record_literal, FieldInit, Idx, Region};

use super::MemEmitter;
use crate::ir::{Const, Operand, ValueId};
use crate::{MemError, MemResult};

/// Initial contents of a new heap block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitValue {
    /// A complete value of the pointee type.
    Value(Operand),
    /// Positional record literal. Missing trailing fields take their
    /// declared defaults.
    Fields(Vec<Operand>),
}

impl MemEmitter<'_> {
    /// Allocate a block for reference type `ref_ty` and initialize it.
    ///
    /// The block is `header + value` bytes. For a counted region the count
    /// word is set to 1 and the returned reference points past the header.
    /// The result is typed `ref_ty`.
    pub fn allocate(&mut self, ref_ty: Idx, init: InitValue) -> MemResult<ValueId> {
        let layout = self.layouts.ref_layout(ref_ty)?;
        match layout.region {
            Region::Owning | Region::Counted => {}
            Region::Borrowed => {
                return Err(MemError::BorrowedRegion {
                    op: "allocate",
                    ty: self.display(ref_ty),
                });
            }
        }
        self.insertion_point()?;
        let heap = self.module.heap(&self.config.target)?;

        let size = layout.alloc_size();
        let block = self
            .builder
            .call_extern(heap.alloc, &[Const::Usize(size).into()], Idx::PTR);

        let payload = if layout.has_counter() {
            let one = self.word_const(1);
            self.builder.store(Idx::USIZE, one, block);
            self.builder.offset(block, -layout.count_offset())
        } else {
            block
        };
        let reference = self.builder.cast(ref_ty, payload);

        tracing::debug!(
            ty = %self.display(ref_ty),
            size,
            header = layout.header.size,
            "allocate"
        );

        match init {
            InitValue::Value(value) => self.builder.store(layout.pointee, value, reference),
            InitValue::Fields(values) => self.store_record_literal(reference, layout.pointee, &values)?,
        }
        Ok(reference)
    }

    /// Store a positional literal into the record at `base`, field by field.
    fn store_record_literal(
        &mut self,
        base: ValueId,
        record: Idx,
        values: &[Operand],
    ) -> MemResult<()> {
        let arg_types: Vec<Idx> = values
            .iter()
            .map(|&v| self.builder.operand_type(v))
            .collect();
        let inits = check_record_literal(self.pool, record, &arg_types)?;
        let layout = self.layouts.record_layout(record)?;

        for (slot, init) in layout.fields.iter().zip(inits) {
            let value = match init {
                FieldInit::Provided(i) => values[i],
                FieldInit::Default(lit) => Const::from(lit).into(),
            };
            let addr = self.builder.field_addr(base, record, slot.index, slot.offset);
            self.builder.store(slot.ty, value, addr);
        }
        Ok(())
    }
}
