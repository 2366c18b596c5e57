//! Instruction builder for [`MemFunction`] bodies.
//!
//! `FunctionBuilder` owns the function under construction and an insertion
//! point. Every emit method appends to the current block and returns the
//! defined [`ValueId`]. Emitting without an open block is an internal error:
//! it is logged, counted in [`FunctionBuilder::error_count`], and the
//! instruction is dropped.
//!
//! | Category | Methods |
//! |----------|---------|
//! | Memory | `alloca`, `load`, `store`, `field_addr`, `offset`, `cast` |
//! | Arithmetic | `add`, `cmp` |
//! | Calls | `call_extern`, `call_extern_void`, `call`, `call_void` |
//! | Control flow | `br`, `cond_br`, `ret`, `trap` |
//! | Blocks | `append_block`, `position_at_end`, `current_block`, ... |

use smallvec::SmallVec;

use cone_types::{Idx, Name};

use crate::ir::{
    BlockId, CmpPred, ExternId, FuncId, MemBlock, MemFunction, MemInstr, MemTerminator, Operand,
    TrapKind, ValueId,
};

pub struct FunctionBuilder {
    func: MemFunction,
    current: Option<BlockId>,
    errors: u32,
}

impl FunctionBuilder {
    /// Start a function with an `entry` block and position at its end.
    pub fn new(name: &str, param_types: &[Idx], return_type: Idx) -> Self {
        let mut builder = FunctionBuilder {
            func: MemFunction::declaration(name, param_types, return_type),
            current: None,
            errors: 0,
        };
        let entry = builder.append_block("entry");
        builder.position_at_end(entry);
        builder
    }

    /// The `i`th parameter.
    pub fn param(&self, i: usize) -> ValueId {
        self.func.params.get(i).copied().unwrap_or(ValueId::NONE)
    }

    pub fn function(&self) -> &MemFunction {
        &self.func
    }

    pub fn value_type(&self, value: ValueId) -> Idx {
        self.func.value_type(value)
    }

    pub fn operand_type(&self, operand: Operand) -> Idx {
        self.func.operand_type(operand)
    }

    /// Number of emits dropped for lack of an open block.
    pub fn error_count(&self) -> u32 {
        self.errors
    }

    pub fn finish(self) -> MemFunction {
        if self.errors > 0 {
            tracing::warn!(func = %self.func.name, errors = self.errors, "finished with codegen errors");
        }
        self.func
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    pub fn append_block(&mut self, label: &str) -> BlockId {
        let id = BlockId::from_index(self.func.blocks.len());
        self.func.blocks.push(MemBlock {
            label: label.to_owned(),
            body: Vec::new(),
            terminator: None,
        });
        id
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.current = Some(block);
    }

    #[inline]
    pub fn current_block(&self) -> Option<BlockId> {
        self.current
    }

    pub fn current_block_terminated(&self) -> bool {
        self.current
            .is_some_and(|id| self.func.block(id).terminator.is_some())
    }

    /// The open block, or `None` if unpositioned or already terminated.
    pub fn insertion_block(&self) -> Option<BlockId> {
        self.current.filter(|_| !self.current_block_terminated())
    }

    // -----------------------------------------------------------------------
    // Memory
    // -----------------------------------------------------------------------

    pub fn alloca(&mut self, ty: Idx, name: Name) -> ValueId {
        let dst = self.fresh(Idx::PTR);
        self.push(MemInstr::Alloca { dst, ty, name });
        dst
    }

    pub fn load(&mut self, ty: Idx, ptr: impl Into<Operand>) -> ValueId {
        let dst = self.fresh(ty);
        self.push(MemInstr::Load {
            dst,
            ty,
            ptr: ptr.into(),
        });
        dst
    }

    pub fn store(&mut self, ty: Idx, value: impl Into<Operand>, ptr: impl Into<Operand>) {
        self.push(MemInstr::Store {
            ty,
            value: value.into(),
            ptr: ptr.into(),
        });
    }

    pub fn field_addr(
        &mut self,
        base: impl Into<Operand>,
        record: Idx,
        field: u32,
        offset: u64,
    ) -> ValueId {
        let dst = self.fresh(Idx::PTR);
        self.push(MemInstr::FieldAddr {
            dst,
            base: base.into(),
            record,
            field,
            offset,
        });
        dst
    }

    pub fn offset(&mut self, base: impl Into<Operand>, bytes: i64) -> ValueId {
        let dst = self.fresh(Idx::PTR);
        self.push(MemInstr::Offset {
            dst,
            base: base.into(),
            bytes,
        });
        dst
    }

    pub fn cast(&mut self, ty: Idx, value: impl Into<Operand>) -> ValueId {
        let dst = self.fresh(ty);
        self.push(MemInstr::Cast {
            dst,
            ty,
            value: value.into(),
        });
        dst
    }

    // -----------------------------------------------------------------------
    // Arithmetic
    // -----------------------------------------------------------------------

    pub fn add(&mut self, ty: Idx, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> ValueId {
        let dst = self.fresh(ty);
        self.push(MemInstr::Add {
            dst,
            ty,
            lhs: lhs.into(),
            rhs: rhs.into(),
        });
        dst
    }

    pub fn cmp(
        &mut self,
        pred: CmpPred,
        ty: Idx,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> ValueId {
        let dst = self.fresh(Idx::BOOL);
        self.push(MemInstr::Cmp {
            dst,
            pred,
            ty,
            lhs: lhs.into(),
            rhs: rhs.into(),
        });
        dst
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Call an extern that returns a value of type `ret`.
    pub fn call_extern(&mut self, callee: ExternId, args: &[Operand], ret: Idx) -> ValueId {
        let dst = self.fresh(ret);
        self.push(MemInstr::CallExtern {
            dst: Some(dst),
            callee,
            args: SmallVec::from_slice(args),
        });
        dst
    }

    pub fn call_extern_void(&mut self, callee: ExternId, args: &[Operand]) {
        self.push(MemInstr::CallExtern {
            dst: None,
            callee,
            args: SmallVec::from_slice(args),
        });
    }

    pub fn call(&mut self, callee: FuncId, args: &[Operand], ret: Idx) -> ValueId {
        let dst = self.fresh(ret);
        self.push(MemInstr::Call {
            dst: Some(dst),
            callee,
            args: SmallVec::from_slice(args),
        });
        dst
    }

    pub fn call_void(&mut self, callee: FuncId, args: &[Operand]) {
        self.push(MemInstr::Call {
            dst: None,
            callee,
            args: SmallVec::from_slice(args),
        });
    }

    // -----------------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------------

    pub fn br(&mut self, target: BlockId) {
        self.terminate(MemTerminator::Jump(target));
    }

    pub fn cond_br(&mut self, cond: impl Into<Operand>, then_block: BlockId, else_block: BlockId) {
        self.terminate(MemTerminator::Branch {
            cond: cond.into(),
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<Operand>) {
        self.terminate(MemTerminator::Return(value));
    }

    pub fn trap(&mut self, kind: TrapKind) {
        self.terminate(MemTerminator::Trap(kind));
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn fresh(&mut self, ty: Idx) -> ValueId {
        let id = ValueId::from_index(self.func.value_types.len());
        self.func.value_types.push(ty);
        id
    }

    fn open_block(&mut self) -> Option<&mut MemBlock> {
        let Some(id) = self.insertion_block() else {
            tracing::error!(func = %self.func.name, current = ?self.current, "emit without an open block");
            self.errors += 1;
            return None;
        };
        Some(&mut self.func.blocks[id.index()])
    }

    fn push(&mut self, instr: MemInstr) {
        if let Some(block) = self.open_block() {
            block.body.push(instr);
        }
    }

    fn terminate(&mut self, term: MemTerminator) {
        if let Some(block) = self.open_block() {
            block.terminator = Some(term);
        }
    }
}
