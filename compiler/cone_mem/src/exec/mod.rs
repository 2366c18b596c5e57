//! Reference executor for memory IR.
//!
//! `Machine` interprets a [`MemModule`] against a simulated [`Heap`]. The
//! module's heap primitives are bound to the simulated `malloc`/`free`, and
//! every access is bounds- and liveness-checked, so tests observe leaks,
//! double frees, and use-after-free as values rather than crashes.

mod heap;
mod value;

pub use heap::{Heap, HeapStats};
pub use value::RtValue;

use cone_types::Idx;

use crate::ir::{
    CmpPred, ExternId, FuncId, MemFunction, MemInstr, MemTerminator, Operand, TrapKind, ValueId,
};
use crate::layout::LayoutTable;
use crate::{MemError, MemModule};

/// Default bound on executed instructions per [`Machine`].
pub const DEFAULT_STEP_LIMIT: usize = 1_000_000;

/// A fault observed while executing memory IR.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("double free of block at {addr:#x}")]
    DoubleFree { addr: u64 },

    #[error("free of {addr:#x}, which does not start a heap block")]
    InvalidFree { addr: u64 },

    #[error("access to freed memory at {addr:#x}")]
    UseAfterFree { addr: u64 },

    #[error("access of {len} bytes at {addr:#x} is out of bounds")]
    OutOfBounds { addr: u64, len: u64 },

    #[error("null pointer dereference")]
    NullDeref,

    #[error("trap: {}", .0.as_str())]
    Trap(TrapKind),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("call to `{0}`, which has no body")]
    MissingBody(String),

    #[error("unresolved external `{0}`")]
    UnknownExtern(String),

    #[error("use of undefined value %{0}")]
    UndefinedValue(u32),

    #[error("block {block} of `{func}` has no terminator")]
    Unterminated { func: String, block: u32 },

    #[error("step limit exceeded")]
    StepLimit,

    #[error(transparent)]
    Layout(#[from] MemError),
}

/// Values and stack slots of one activation.
struct Frame {
    values: Vec<Option<RtValue>>,
    slots: Vec<u64>,
}

impl Frame {
    fn eval(&self, operand: Operand) -> Result<RtValue, ExecError> {
        match operand {
            Operand::Const(c) => Ok(RtValue::from_const(c)),
            Operand::Value(v) => self
                .values
                .get(v.index())
                .and_then(Clone::clone)
                .ok_or(ExecError::UndefinedValue(v.raw())),
        }
    }

    fn define(&mut self, dst: ValueId, value: RtValue) {
        if let Some(slot) = self.values.get_mut(dst.index()) {
            *slot = Some(value);
        }
    }
}

pub struct Machine<'a> {
    module: &'a MemModule,
    layouts: &'a LayoutTable<'a>,
    heap: Heap,
    word_mask: u64,
    steps: usize,
    step_limit: usize,
}

impl<'a> Machine<'a> {
    pub fn new(module: &'a MemModule, layouts: &'a LayoutTable<'a>) -> Self {
        let word_mask = if layouts.word_size() == 4 {
            0xFFFF_FFFF
        } else {
            u64::MAX
        };
        Machine {
            module,
            layouts,
            heap: Heap::default(),
            word_mask,
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    #[must_use]
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Call the function named `name`.
    pub fn run(&mut self, name: &str, args: &[RtValue]) -> Result<Option<RtValue>, ExecError> {
        let id = self
            .module
            .function_named(name)
            .ok_or_else(|| ExecError::UnknownFunction(name.to_owned()))?;
        tracing::debug!(func = name, "run");
        self.call(id, args.to_vec())
    }

    /// Read a `ty` at `addr`.
    pub fn load(&self, ty: Idx, addr: u64) -> Result<RtValue, ExecError> {
        let size = self.layouts.value_layout(ty)?.size;
        let bytes = self.heap.read(addr, size)?;
        value::decode(self.layouts, ty, bytes)
    }

    /// Write `value` as a `ty` at `addr`.
    pub fn store(&mut self, ty: Idx, addr: u64, value: &RtValue) -> Result<(), ExecError> {
        let size = self.layouts.value_layout(ty)?.size;
        let len = usize::try_from(size).map_err(|_| ExecError::OutOfBounds { addr, len: size })?;
        let mut bytes = vec![0; len];
        value::encode(self.layouts, ty, value, &mut bytes)?;
        self.heap.write(addr, &bytes)
    }

    /// Current count of the counted block behind `reference`.
    pub fn ref_count(&self, ref_ty: Idx, reference: u64) -> Result<u64, ExecError> {
        let layout = self.layouts.ref_layout(ref_ty)?;
        let counter = reference.wrapping_add_signed(layout.count_offset());
        self.load(Idx::USIZE, counter)?.as_addr()
    }

    /// Block start of the allocation behind `reference`.
    pub fn block_of(&self, ref_ty: Idx, reference: u64) -> Result<u64, ExecError> {
        let layout = self.layouts.ref_layout(ref_ty)?;
        Ok(reference.wrapping_add_signed(layout.count_offset()))
    }

    fn call(&mut self, id: FuncId, args: Vec<RtValue>) -> Result<Option<RtValue>, ExecError> {
        let module = self.module;
        let func = module.function(id);
        if func.is_declaration() {
            return Err(ExecError::MissingBody(func.name.clone()));
        }
        tracing::trace!(func = %func.name, "call");

        let mut frame = Frame {
            values: vec![None; func.value_types.len()],
            slots: Vec::new(),
        };
        for (&param, arg) in func.params.iter().zip(args) {
            frame.define(param, arg);
        }
        let result = self.exec_body(func, &mut frame);
        self.heap.pop_frame(&frame.slots);
        result
    }

    fn exec_body(
        &mut self,
        func: &'a MemFunction,
        frame: &mut Frame,
    ) -> Result<Option<RtValue>, ExecError> {
        let Some(mut block) = func.entry() else {
            return Err(ExecError::MissingBody(func.name.clone()));
        };
        loop {
            let bb = func.block(block);
            for instr in &bb.body {
                self.tick()?;
                self.exec_instr(instr, frame)?;
            }
            match &bb.terminator {
                None => {
                    return Err(ExecError::Unterminated {
                        func: func.name.clone(),
                        block: block.raw(),
                    });
                }
                Some(MemTerminator::Jump(target)) => block = *target,
                Some(MemTerminator::Branch {
                    cond,
                    then_block,
                    else_block,
                }) => {
                    block = if frame.eval(*cond)?.as_bool()? {
                        *then_block
                    } else {
                        *else_block
                    };
                }
                Some(MemTerminator::Return(value)) => {
                    return (*value).map(|op| frame.eval(op)).transpose();
                }
                Some(MemTerminator::Trap(kind)) => {
                    tracing::debug!(func = %func.name, trap = kind.as_str(), "trap");
                    return Err(ExecError::Trap(*kind));
                }
            }
        }
    }

    fn exec_instr(&mut self, instr: &MemInstr, frame: &mut Frame) -> Result<(), ExecError> {
        match instr {
            MemInstr::Alloca { dst, ty, .. } => {
                let size = self.layouts.value_layout(*ty)?.size;
                let addr = self.heap.alloca(size);
                frame.slots.push(addr);
                frame.define(*dst, RtValue::Ptr(addr));
            }
            MemInstr::Load { dst, ty, ptr } => {
                let addr = frame.eval(*ptr)?.as_addr()?;
                let value = self.load(*ty, addr)?;
                frame.define(*dst, value);
            }
            MemInstr::Store { ty, value, ptr } => {
                let addr = frame.eval(*ptr)?.as_addr()?;
                let value = frame.eval(*value)?;
                self.store(*ty, addr, &value)?;
            }
            MemInstr::FieldAddr {
                dst, base, offset, ..
            } => {
                let addr = frame.eval(*base)?.as_addr()?;
                frame.define(*dst, RtValue::Ptr(addr.wrapping_add(*offset)));
            }
            MemInstr::Offset { dst, base, bytes } => {
                let addr = frame.eval(*base)?.as_addr()?;
                frame.define(*dst, RtValue::Ptr(addr.wrapping_add_signed(*bytes)));
            }
            MemInstr::Cast { dst, value, .. } => {
                let value = frame.eval(*value)?;
                frame.define(*dst, value);
            }
            MemInstr::Add { dst, lhs, rhs, .. } => {
                let sum = self.add(&frame.eval(*lhs)?, &frame.eval(*rhs)?)?;
                frame.define(*dst, sum);
            }
            MemInstr::Cmp {
                dst, pred, lhs, rhs, ..
            } => {
                let lhs = unsigned(&frame.eval(*lhs)?)?;
                let rhs = unsigned(&frame.eval(*rhs)?)?;
                let result = match pred {
                    CmpPred::Eq => lhs == rhs,
                    CmpPred::Ne => lhs != rhs,
                    CmpPred::Ult => lhs < rhs,
                };
                frame.define(*dst, RtValue::Bool(result));
            }
            MemInstr::CallExtern { dst, callee, args } => {
                let args = args
                    .iter()
                    .map(|&a| frame.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = self.call_extern(*callee, &args)?;
                if let Some(dst) = dst {
                    frame.define(*dst, result);
                }
            }
            MemInstr::Call { dst, callee, args } => {
                let args = args
                    .iter()
                    .map(|&a| frame.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = self.call(*callee, args)?;
                if let Some(dst) = dst {
                    frame.define(*dst, result.unwrap_or(RtValue::Unit));
                }
            }
        }
        Ok(())
    }

    fn call_extern(&mut self, callee: ExternId, args: &[RtValue]) -> Result<RtValue, ExecError> {
        let heap = self.module.heap_decls();
        match (heap, args) {
            (Some(decls), [size]) if decls.alloc == callee => {
                let size = size.as_addr()?;
                Ok(RtValue::Ptr(self.heap.malloc(size)))
            }
            (Some(decls), [ptr]) if decls.free == callee => {
                self.heap.free(ptr.as_addr()?)?;
                Ok(RtValue::Unit)
            }
            _ => Err(ExecError::UnknownExtern(
                self.module.extern_decl(callee).name.clone(),
            )),
        }
    }

    fn add(&self, lhs: &RtValue, rhs: &RtValue) -> Result<RtValue, ExecError> {
        let sum = match (lhs, rhs) {
            (RtValue::Usize(a), RtValue::Usize(b)) => RtValue::Usize(a.wrapping_add(*b) & self.word_mask),
            (RtValue::Int(a), RtValue::Int(b)) => RtValue::Int(a.wrapping_add(*b)),
            (RtValue::I32(a), RtValue::I32(b)) => RtValue::I32(a.wrapping_add(*b)),
            (RtValue::Byte(a), RtValue::Byte(b)) => RtValue::Byte(a.wrapping_add(*b)),
            (lhs, rhs) => {
                return Err(ExecError::TypeMismatch {
                    expected: lhs.kind(),
                    found: rhs.kind(),
                });
            }
        };
        Ok(sum)
    }

    fn tick(&mut self) -> Result<(), ExecError> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(ExecError::StepLimit);
        }
        Ok(())
    }
}

/// Integer value reinterpreted as unsigned bits.
fn unsigned(value: &RtValue) -> Result<u64, ExecError> {
    match value {
        RtValue::Usize(v) | RtValue::Ptr(v) => Ok(*v),
        RtValue::Int(v) => Ok(u64::from_ne_bytes(v.to_ne_bytes())),
        RtValue::I32(v) => Ok(u64::from(u32::from_ne_bytes(v.to_ne_bytes()))),
        RtValue::Byte(v) => Ok(u64::from(*v)),
        RtValue::Bool(v) => Ok(u64::from(*v)),
        other => Err(ExecError::TypeMismatch {
            expected: "integer",
            found: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests;
