//! Type pool and region tags for the Cone compiler.
//!
//! The memory-management core consumes fully resolved types: every reference
//! type already carries its [`Region`], and every record has a fixed field
//! order. This crate holds those finished types:
//!
//! - [`Idx`] / [`Pool`]: interned type handles; primitives have fixed
//!   indices, records and references are pooled.
//! - [`Region`] / [`OwnedKind`]: the static ownership discipline of a
//!   reference (`own`, `rc`, `borrow`).
//! - [`check_record_literal`]: the positional field check used when a
//!   record literal initializes an allocation.

mod idx;
pub mod literal;
mod name;
mod pool;
mod region;
mod tag;

pub use idx::Idx;
pub use literal::{check_record_literal, FieldInit, LitValue, LiteralError};
pub use name::{Name, StringInterner};
pub use pool::{FieldDef, Pool, RecordDef};
pub use region::{OwnedKind, Region};
pub use tag::Tag;
