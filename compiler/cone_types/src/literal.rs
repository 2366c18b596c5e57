//! Literal constants and the record-literal initializer check.
//!
//! A record literal initializes fields positionally. Before the allocator
//! stores a literal into freshly allocated payload memory, each initializer
//! is matched against its field: the types must agree, omitted trailing
//! fields take their declared default, and surplus or missing values are
//! rejected. Full type inference happens upstream; this is only the narrow
//! check needed to lay the values out field by field.

use crate::{Idx, Pool, Tag};

/// A literal constant, e.g. a field default.
///
/// Floats are stored as raw bits so literals stay `Eq + Hash`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LitValue {
    Int(i64),
    I32(i32),
    Float(u64),
    Bool(bool),
    Byte(u8),
    Usize(u64),
    Unit,
}

impl LitValue {
    /// Build a float literal from an `f64`.
    pub fn float(value: f64) -> Self {
        LitValue::Float(value.to_bits())
    }

    /// The primitive type of this literal.
    pub const fn ty(self) -> Idx {
        match self {
            LitValue::Int(_) => Idx::INT,
            LitValue::I32(_) => Idx::I32,
            LitValue::Float(_) => Idx::FLOAT,
            LitValue::Bool(_) => Idx::BOOL,
            LitValue::Byte(_) => Idx::BYTE,
            LitValue::Usize(_) => Idx::USIZE,
            LitValue::Unit => Idx::UNIT,
        }
    }
}

/// How one field of a record literal is initialized.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldInit {
    /// From the literal's argument at this position.
    Provided(usize),
    /// From the field's declared default.
    Default(LitValue),
}

/// A record literal that does not fit its record type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LiteralError {
    #[error("`{ty}` is not a record type")]
    NotARecord { ty: String },

    #[error("literal for `{record}` may not be empty")]
    Empty { record: String },

    #[error("literal value for field `{field}` has type `{found}`, expected `{expected}`")]
    Mismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("not enough values for `{record}`: field `{field}` has no default")]
    NotEnough { record: String, field: String },

    #[error("too many values for `{record}`: expected at most {expected}, found {found}")]
    TooMany {
        record: String,
        expected: usize,
        found: usize,
    },
}

/// Match positional initializer types against a record's fields.
///
/// Returns one [`FieldInit`] per field, in declaration order.
pub fn check_record_literal(
    pool: &Pool,
    record: Idx,
    arg_types: &[Idx],
) -> Result<Vec<FieldInit>, LiteralError> {
    if pool.tag(record) != Tag::Record {
        return Err(LiteralError::NotARecord {
            ty: pool.display(record),
        });
    }
    let record_name = || pool.display(record);

    if arg_types.is_empty() {
        return Err(LiteralError::Empty {
            record: record_name(),
        });
    }

    let fields = pool.record_fields(record);
    let mut inits = Vec::with_capacity(fields.len());

    for (i, field) in fields.iter().enumerate() {
        if let Some(&found) = arg_types.get(i) {
            if found != field.ty {
                return Err(LiteralError::Mismatch {
                    field: pool.lookup(field.name).to_owned(),
                    expected: pool.display(field.ty),
                    found: pool.display(found),
                });
            }
            inits.push(FieldInit::Provided(i));
        } else if let Some(default) = field.default {
            if default.ty() != field.ty {
                return Err(LiteralError::Mismatch {
                    field: pool.lookup(field.name).to_owned(),
                    expected: pool.display(field.ty),
                    found: pool.display(default.ty()),
                });
            }
            inits.push(FieldInit::Default(default));
        } else {
            return Err(LiteralError::NotEnough {
                record: record_name(),
                field: pool.lookup(field.name).to_owned(),
            });
        }
    }

    if arg_types.len() > fields.len() {
        return Err(LiteralError::TooMany {
            record: record_name(),
            expected: fields.len(),
            found: arg_types.len(),
        });
    }

    Ok(inits)
}

#[cfg(test)]
mod tests;
