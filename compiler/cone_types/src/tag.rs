//! Type tags: the kind of each entry in the pool.

/// Kind of a pooled type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    Int,
    Float,
    Bool,
    Byte,
    I32,
    Unit,
    Usize,
    Ptr,
    /// Structural record with ordered, named fields.
    Record,
    /// Reference with a region and a pointee type.
    Ref,
}

impl Tag {
    /// `true` for fixed-width scalars (everything except records and references).
    #[inline]
    pub const fn is_primitive(self) -> bool {
        !matches!(self, Tag::Record | Tag::Ref)
    }
}
