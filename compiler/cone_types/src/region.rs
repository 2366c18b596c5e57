//! Region tags for reference types.
//!
//! Every reference type carries a region decided during type checking. The
//! region is the static ownership discipline of the reference and drives
//! every memory decision the code generator makes:
//!
//! | Region     | Keyword  | Owns target | Hidden header  |
//! |------------|----------|-------------|----------------|
//! | `Owning`   | `own`    | yes         | none           |
//! | `Counted`  | `rc`     | shared      | counter word   |
//! | `Borrowed` | `borrow` | no          | none           |
//!
//! Matches over `Region` are exhaustive everywhere, so adding a region kind
//! forces the allocator, count engine and cascade to be revisited.

use std::fmt;

/// The static ownership discipline of a reference type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// Sole owner of its target. Releasing it always frees the target.
    Owning,
    /// Shares ownership through a runtime count stored ahead of the payload.
    Counted,
    /// Never owns its target; never allocates or releases.
    Borrowed,
}

impl Region {
    /// The ownership kind a variable of this region's reference type has.
    #[inline]
    pub const fn owned_kind(self) -> OwnedKind {
        match self {
            Region::Owning => OwnedKind::Owning,
            Region::Counted => OwnedKind::Counted,
            Region::Borrowed => OwnedKind::None,
        }
    }

    /// `true` for regions whose references give up ownership on release.
    #[inline]
    pub const fn is_owning(self) -> bool {
        matches!(self, Region::Owning | Region::Counted)
    }

    /// Source-level keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            Region::Owning => "own",
            Region::Counted => "rc",
            Region::Borrowed => "borrow",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Ownership kind of a declared variable, derived from its type's region.
///
/// Plain values and borrowed references are `None`: scope exit never
/// releases them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum OwnedKind {
    #[default]
    None,
    Owning,
    Counted,
    /// A record held by value with owning or counted fields. Scope exit
    /// releases those fields in place.
    Embedded,
}

impl OwnedKind {
    /// `true` if scope exit must release a variable of this kind.
    #[inline]
    pub const fn needs_release(self) -> bool {
        !matches!(self, OwnedKind::None)
    }
}
