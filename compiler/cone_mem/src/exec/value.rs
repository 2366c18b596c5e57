//! Runtime values and their byte encoding.
//!
//! Values are stored little-endian at the sizes [`LayoutTable`] assigns.
//! Word-sized values (`usize`, `ptr`, references) occupy the target word
//! and are truncated to it.

use cone_types::{Idx, Tag};

use super::ExecError;
use crate::ir::Const;
use crate::layout::LayoutTable;

/// A value held by the executor.
#[derive(Clone, Debug, PartialEq)]
pub enum RtValue {
    Int(i64),
    I32(i32),
    Float(f64),
    Bool(bool),
    Byte(u8),
    Usize(u64),
    /// An address; also the value of every reference type.
    Ptr(u64),
    Unit,
    /// Field values in declaration order.
    Record(Vec<RtValue>),
}

impl RtValue {
    pub fn from_const(c: Const) -> Self {
        match c {
            Const::Int(v) => RtValue::Int(v),
            Const::I32(v) => RtValue::I32(v),
            Const::Float(bits) => RtValue::Float(f64::from_bits(bits)),
            Const::Bool(v) => RtValue::Bool(v),
            Const::Byte(v) => RtValue::Byte(v),
            Const::Usize(v) => RtValue::Usize(v),
            Const::Unit => RtValue::Unit,
            Const::Null => RtValue::Ptr(0),
        }
    }

    /// Address carried by a pointer or word value.
    pub fn as_addr(&self) -> Result<u64, ExecError> {
        match self {
            RtValue::Ptr(addr) | RtValue::Usize(addr) => Ok(*addr),
            other => Err(ExecError::TypeMismatch {
                expected: "ptr",
                found: other.kind(),
            }),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ExecError> {
        match self {
            RtValue::Bool(b) => Ok(*b),
            other => Err(ExecError::TypeMismatch {
                expected: "bool",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            RtValue::Int(_) => "int",
            RtValue::I32(_) => "i32",
            RtValue::Float(_) => "float",
            RtValue::Bool(_) => "bool",
            RtValue::Byte(_) => "byte",
            RtValue::Usize(_) => "usize",
            RtValue::Ptr(_) => "ptr",
            RtValue::Unit => "()",
            RtValue::Record(_) => "record",
        }
    }
}

/// Encode `value` as a `ty` into `out`, which is exactly the value's size.
pub(crate) fn encode(
    layouts: &LayoutTable<'_>,
    ty: Idx,
    value: &RtValue,
    out: &mut [u8],
) -> Result<(), ExecError> {
    let pool = layouts.pool();
    match (pool.tag(ty), value) {
        (Tag::Int, RtValue::Int(v)) => out.copy_from_slice(&v.to_le_bytes()),
        (Tag::I32, RtValue::I32(v)) => out.copy_from_slice(&v.to_le_bytes()),
        (Tag::Float, RtValue::Float(v)) => out.copy_from_slice(&v.to_bits().to_le_bytes()),
        (Tag::Bool, RtValue::Bool(v)) => out[0] = u8::from(*v),
        (Tag::Byte, RtValue::Byte(v)) => out[0] = *v,
        (Tag::Unit, RtValue::Unit) => {}
        (Tag::Usize | Tag::Ptr | Tag::Ref, RtValue::Usize(v) | RtValue::Ptr(v)) => {
            let len = out.len();
            out.copy_from_slice(&v.to_le_bytes()[..len]);
        }
        (Tag::Record, RtValue::Record(fields)) => {
            let layout = layouts.record_layout(ty)?;
            if fields.len() != layout.fields.len() {
                return Err(ExecError::TypeMismatch {
                    expected: "record of matching arity",
                    found: "record",
                });
            }
            for (slot, field) in layout.fields.iter().zip(fields) {
                let size = layouts.value_layout(slot.ty)?.size;
                let start = to_usize(slot.offset);
                encode(layouts, slot.ty, field, &mut out[start..start + to_usize(size)])?;
            }
        }
        (tag, value) => {
            return Err(ExecError::TypeMismatch {
                expected: tag_kind(tag),
                found: value.kind(),
            });
        }
    }
    Ok(())
}

/// Decode a `ty` from `bytes`, which is exactly the value's size.
pub(crate) fn decode(layouts: &LayoutTable<'_>, ty: Idx, bytes: &[u8]) -> Result<RtValue, ExecError> {
    let pool = layouts.pool();
    let value = match pool.tag(ty) {
        Tag::Int => RtValue::Int(i64::from_le_bytes(array(bytes))),
        Tag::I32 => RtValue::I32(i32::from_le_bytes(array(bytes))),
        Tag::Float => RtValue::Float(f64::from_bits(u64::from_le_bytes(array(bytes)))),
        Tag::Bool => RtValue::Bool(bytes.first().is_some_and(|&b| b != 0)),
        Tag::Byte => RtValue::Byte(bytes.first().copied().unwrap_or(0)),
        Tag::Unit => RtValue::Unit,
        Tag::Usize => RtValue::Usize(word(bytes)),
        Tag::Ptr | Tag::Ref => RtValue::Ptr(word(bytes)),
        Tag::Record => {
            let layout = layouts.record_layout(ty)?;
            let mut fields = Vec::with_capacity(layout.fields.len());
            for slot in &layout.fields {
                let size = layouts.value_layout(slot.ty)?.size;
                let start = to_usize(slot.offset);
                fields.push(decode(layouts, slot.ty, &bytes[start..start + to_usize(size)])?);
            }
            RtValue::Record(fields)
        }
    };
    Ok(value)
}

fn tag_kind(tag: Tag) -> &'static str {
    match tag {
        Tag::Int => "int",
        Tag::Float => "float",
        Tag::Bool => "bool",
        Tag::Byte => "byte",
        Tag::I32 => "i32",
        Tag::Unit => "()",
        Tag::Usize => "usize",
        Tag::Ptr | Tag::Ref => "ptr",
        Tag::Record => "record",
    }
}

/// Zero-extend up to `N` little-endian bytes.
fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

fn word(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(array(bytes))
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "simulated value sizes fit in usize"
)]
fn to_usize(value: u64) -> usize {
    value as usize
}
