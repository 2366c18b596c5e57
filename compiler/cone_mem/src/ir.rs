//! Target-neutral memory IR.
//!
//! The memory core emits a small SSA-style instruction set: stack slots,
//! loads and stores, address arithmetic, integer add/compare, calls, and
//! block terminators. It is the seam where a real backend lowers to
//! machine IR, and it is what [`Machine`](crate::Machine) executes in tests.
//!
//! All IR entities are referenced by `Copy` ID handles (`u32` indices).
//! A `NONE` sentinel (`u32::MAX`) marks an absent handle.

use smallvec::SmallVec;

use cone_types::{Idx, LitValue, Name};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

/// SSA value within one [`MemFunction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueId(u32);

/// Basic block within one [`MemFunction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(u32);

/// Function within a [`MemModule`](crate::MemModule).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(u32);

/// External symbol declared in a [`MemModule`](crate::MemModule).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExternId(u32);

macro_rules! id_impls {
    ($($id:ident),*) => {$(
        impl $id {
            /// Sentinel for "absent".
            pub const NONE: Self = Self(u32::MAX);

            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub const fn is_none(self) -> bool {
                self.0 == u32::MAX
            }

            #[inline]
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }

            #[expect(
                clippy::cast_possible_truncation,
                reason = "IR arenas never approach u32::MAX entries"
            )]
            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }
    )*};
}

id_impls!(ValueId, BlockId, FuncId, ExternId);

// ---------------------------------------------------------------------------
// Operands
// ---------------------------------------------------------------------------

/// An immediate constant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Const {
    Int(i64),
    I32(i32),
    /// Raw `f64` bits.
    Float(u64),
    Bool(bool),
    Byte(u8),
    /// Word-sized unsigned integer. Pre-masked to the target width.
    Usize(u64),
    Unit,
    Null,
}

impl Const {
    pub const fn ty(self) -> Idx {
        match self {
            Const::Int(_) => Idx::INT,
            Const::I32(_) => Idx::I32,
            Const::Float(_) => Idx::FLOAT,
            Const::Bool(_) => Idx::BOOL,
            Const::Byte(_) => Idx::BYTE,
            Const::Usize(_) => Idx::USIZE,
            Const::Unit => Idx::UNIT,
            Const::Null => Idx::PTR,
        }
    }
}

impl From<LitValue> for Const {
    fn from(lit: LitValue) -> Self {
        match lit {
            LitValue::Int(v) => Const::Int(v),
            LitValue::I32(v) => Const::I32(v),
            LitValue::Float(bits) => Const::Float(bits),
            LitValue::Bool(v) => Const::Bool(v),
            LitValue::Byte(v) => Const::Byte(v),
            LitValue::Usize(v) => Const::Usize(v),
            LitValue::Unit => Const::Unit,
        }
    }
}

/// An instruction input: an SSA value or an immediate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Value(ValueId),
    Const(Const),
}

impl From<ValueId> for Operand {
    fn from(value: ValueId) -> Self {
        Operand::Value(value)
    }
}

impl From<Const> for Operand {
    fn from(value: Const) -> Self {
        Operand::Const(value)
    }
}

/// Integer comparison predicate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CmpPred {
    Eq,
    Ne,
    /// Unsigned less-than.
    Ult,
}

impl CmpPred {
    pub const fn as_str(self) -> &'static str {
        match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Ult => "ult",
        }
    }
}

/// Why generated code aborts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrapKind {
    /// Decrement of a count that is already zero.
    RcUnderflow,
    /// Increment wrapped the count word.
    RcOverflow,
}

impl TrapKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            TrapKind::RcUnderflow => "rc_underflow",
            TrapKind::RcOverflow => "rc_overflow",
        }
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

pub type Args = SmallVec<[Operand; 2]>;

/// A non-terminating instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemInstr {
    /// Stack slot for one value of `ty`; `dst` is its address.
    Alloca { dst: ValueId, ty: Idx, name: Name },
    Load { dst: ValueId, ty: Idx, ptr: Operand },
    Store { ty: Idx, value: Operand, ptr: Operand },
    /// Address of field `field` of the `record` at `base`.
    FieldAddr {
        dst: ValueId,
        base: Operand,
        record: Idx,
        field: u32,
        offset: u64,
    },
    /// `base + bytes`.
    Offset { dst: ValueId, base: Operand, bytes: i64 },
    /// Reinterpret a pointer as `ty`. No runtime effect.
    Cast { dst: ValueId, ty: Idx, value: Operand },
    /// Wrapping integer add.
    Add {
        dst: ValueId,
        ty: Idx,
        lhs: Operand,
        rhs: Operand,
    },
    Cmp {
        dst: ValueId,
        pred: CmpPred,
        ty: Idx,
        lhs: Operand,
        rhs: Operand,
    },
    CallExtern {
        dst: Option<ValueId>,
        callee: ExternId,
        args: Args,
    },
    Call {
        dst: Option<ValueId>,
        callee: FuncId,
        args: Args,
    },
}

impl MemInstr {
    /// The value this instruction defines, if any.
    pub fn dst(&self) -> Option<ValueId> {
        match self {
            MemInstr::Alloca { dst, .. }
            | MemInstr::Load { dst, .. }
            | MemInstr::FieldAddr { dst, .. }
            | MemInstr::Offset { dst, .. }
            | MemInstr::Cast { dst, .. }
            | MemInstr::Add { dst, .. }
            | MemInstr::Cmp { dst, .. } => Some(*dst),
            MemInstr::CallExtern { dst, .. } | MemInstr::Call { dst, .. } => *dst,
            MemInstr::Store { .. } => None,
        }
    }
}

/// A block terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemTerminator {
    Jump(BlockId),
    Branch {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Return(Option<Operand>),
    Trap(TrapKind),
}

impl MemTerminator {
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            MemTerminator::Jump(target) => smallvec::smallvec![*target],
            MemTerminator::Branch {
                then_block,
                else_block,
                ..
            } => smallvec::smallvec![*then_block, *else_block],
            MemTerminator::Return(_) | MemTerminator::Trap(_) => SmallVec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemBlock {
    pub label: String,
    pub body: Vec<MemInstr>,
    /// `None` while the block is still open.
    pub terminator: Option<MemTerminator>,
}

/// A function body in memory IR.
///
/// A function with no blocks is a declaration whose body is not yet emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemFunction {
    pub name: String,
    pub params: Vec<ValueId>,
    pub return_type: Idx,
    pub blocks: Vec<MemBlock>,
    /// Type of every value, indexed by `ValueId`.
    pub value_types: Vec<Idx>,
}

impl MemFunction {
    /// A body-less function with the given signature.
    pub fn declaration(name: &str, param_types: &[Idx], return_type: Idx) -> Self {
        let params = (0..param_types.len()).map(ValueId::from_index).collect();
        MemFunction {
            name: name.to_owned(),
            params,
            return_type,
            blocks: Vec::new(),
            value_types: param_types.to_vec(),
        }
    }

    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry(&self) -> Option<BlockId> {
        (!self.blocks.is_empty()).then_some(BlockId(0))
    }

    pub fn block(&self, id: BlockId) -> &MemBlock {
        &self.blocks[id.index()]
    }

    /// Type of `value`, or `Idx::NONE` for a foreign ID.
    pub fn value_type(&self, value: ValueId) -> Idx {
        self.value_types
            .get(value.index())
            .copied()
            .unwrap_or(Idx::NONE)
    }

    pub fn operand_type(&self, operand: Operand) -> Idx {
        match operand {
            Operand::Value(v) => self.value_type(v),
            Operand::Const(c) => c.ty(),
        }
    }

    /// All instructions in block order.
    pub fn instrs(&self) -> impl Iterator<Item = &MemInstr> {
        self.blocks.iter().flat_map(|b| b.body.iter())
    }
}

/// An external symbol signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternDecl {
    pub name: String,
    pub params: Vec<Idx>,
    /// `Idx::UNIT` for procedures.
    pub ret: Idx,
}
