//! Unified type index handle.
//!
//! All types live in a [`Pool`](crate::Pool) and are referenced by a 32-bit
//! index. Primitive types have fixed indices so they can be named without a
//! pool; records and references are allocated dynamically.

use std::fmt;

/// A 32-bit index into the type pool.
///
/// Types are compared by index equality. Reference types are interned per
/// (region, pointee) pair, so two `rc Point` types always share an `Idx`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Idx(u32);

impl Idx {
    // === Primitive Types (indices 0-7) ===

    /// `int`: 64-bit signed integer.
    pub const INT: Self = Self(0);
    /// `float`: 64-bit floating point.
    pub const FLOAT: Self = Self(1);
    /// `bool`: one byte, 0 or 1.
    pub const BOOL: Self = Self(2);
    /// `byte`: 8-bit unsigned integer.
    pub const BYTE: Self = Self(3);
    /// `i32`: 32-bit signed integer.
    pub const I32: Self = Self(4);
    /// The unit type `()`. Zero-sized.
    pub const UNIT: Self = Self(5);
    /// `usize`: the target's native word. Reference counters use this width.
    pub const USIZE: Self = Self(6);
    /// Raw, untyped address. Produced by heap primitives and address arithmetic.
    pub const PTR: Self = Self(7);

    /// First index for dynamically allocated types. Indices from
    /// `PRIMITIVE_COUNT` up to here are reserved for future primitives.
    pub const FIRST_DYNAMIC: u32 = 16;

    /// Number of pre-interned primitive types.
    pub const PRIMITIVE_COUNT: u32 = 8;

    /// Sentinel value indicating no type.
    pub const NONE: Self = Self(u32::MAX);

    /// Create an index from a raw u32 value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is a pre-interned primitive.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::PRIMITIVE_COUNT
    }

    /// Check if this is the NONE sentinel.
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// Human-readable name for primitives, `None` for dynamic types.
    #[inline]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("int"),
            1 => Some("float"),
            2 => Some("bool"),
            3 => Some("byte"),
            4 => Some("i32"),
            5 => Some("()"),
            6 => Some("usize"),
            7 => Some("ptr"),
            _ => None,
        }
    }
}

impl fmt::Debug for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Idx::NONE")
        } else if let Some(name) = self.name() {
            write!(f, "Idx({name})")
        } else {
            write!(f, "Idx({})", self.0)
        }
    }
}

impl Default for Idx {
    fn default() -> Self {
        Self::NONE
    }
}
