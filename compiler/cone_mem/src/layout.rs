//! Memory layouts for the heap.
//!
//! [`LayoutTable`] answers three questions about resolved types:
//!
//! - how large a value is and how it aligns ([`ValueLayout`], [`RecordLayout`]);
//! - where the reference count sits relative to the address a reference
//!   holds ([`RefLayout`], [`HeaderLayout`]);
//! - which fields a block must release before it is freed ([`DealiasPlan`]).
//!
//! A counted block is `[count | payload]`. The reference points at the
//! payload, so the count is reached by a negative offset and the whole
//! block is freed from the header address. Owning and borrowed references
//! have an empty header and point at the start of their block.
//!
//! All queries are memoized. Self-containing records are detected while
//! sizing and reported as [`MemError::InfiniteSize`].

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use cone_types::{Idx, Name, Pool, Region, Tag};

use crate::{MemError, MemResult, TargetConfig};

/// Size and alignment of a value, in bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValueLayout {
    pub size: u64,
    pub align: u64,
}

impl ValueLayout {
    pub const fn new(size: u64, align: u64) -> Self {
        Self { size, align }
    }
}

/// Placement of one record field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldSlot {
    /// Position in declaration order.
    pub index: u32,
    pub name: Name,
    pub ty: Idx,
    pub offset: u64,
}

/// Field placement of a record, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    pub fields: Vec<FieldSlot>,
    pub size: u64,
    pub align: u64,
}

impl RecordLayout {
    pub fn value(&self) -> ValueLayout {
        ValueLayout::new(self.size, self.align)
    }
}

/// The hidden prefix of a heap block.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HeaderLayout {
    /// Bytes between the block start and the payload. Zero when the
    /// region keeps no per-block metadata.
    pub size: u64,
}

/// Heap shape of the block behind a reference type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RefLayout {
    pub region: Region,
    pub pointee: Idx,
    pub value: ValueLayout,
    pub header: HeaderLayout,
}

impl RefLayout {
    /// Bytes requested from the allocator.
    #[inline]
    pub fn alloc_size(&self) -> u64 {
        self.header.size + self.value.size
    }

    /// Offset from the block start to the payload.
    #[inline]
    pub fn payload_offset(&self) -> u64 {
        self.header.size
    }

    /// Offset from the payload back to the count word. Equal to
    /// `-payload_offset()`: the count occupies the start of the header.
    #[inline]
    #[expect(
        clippy::cast_possible_wrap,
        reason = "header sizes are a few bytes and always fit in i64"
    )]
    pub fn count_offset(&self) -> i64 {
        -(self.header.size as i64)
    }

    #[inline]
    pub fn has_counter(&self) -> bool {
        self.region == Region::Counted
    }
}

/// How a dealias pass gives up one field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldAction {
    /// Load the reference and release it. `Owning` or `Counted`, never
    /// `Borrowed`.
    Release(Region),
    /// The field is a record stored inline; dealias its fields in place.
    Dealias,
}

/// One field released by a dealias pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldRelease {
    pub index: u32,
    pub name: Name,
    pub offset: u64,
    /// The field's type: a reference for `Release`, a record for `Dealias`.
    pub ty: Idx,
    pub action: FieldAction,
}

/// What must be released inside a value before its block is freed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DealiasPlan {
    /// No field owns anything. Freeing the block is enough.
    Trivial,
    /// Owning or counted reference fields and inline records holding
    /// them, in declaration order.
    Fields(Vec<FieldRelease>),
}

impl DealiasPlan {
    #[inline]
    pub fn is_trivial(&self) -> bool {
        matches!(self, DealiasPlan::Trivial)
    }
}

/// Memoized layout queries over a [`Pool`] for one target.
pub struct LayoutTable<'pool> {
    pool: &'pool Pool,
    word: u64,
    values: RefCell<FxHashMap<Idx, ValueLayout>>,
    records: RefCell<FxHashMap<Idx, Rc<RecordLayout>>>,
    plans: RefCell<FxHashMap<Idx, Rc<DealiasPlan>>>,
    /// Records currently being sized, for self-containment detection.
    sizing: RefCell<FxHashSet<Idx>>,
}

impl<'pool> LayoutTable<'pool> {
    pub fn new(pool: &'pool Pool, target: &TargetConfig) -> Self {
        LayoutTable {
            pool,
            word: target.word_size(),
            values: RefCell::new(FxHashMap::default()),
            records: RefCell::new(FxHashMap::default()),
            plans: RefCell::new(FxHashMap::default()),
            sizing: RefCell::new(FxHashSet::default()),
        }
    }

    pub fn pool(&self) -> &'pool Pool {
        self.pool
    }

    /// Target word size in bytes.
    pub fn word_size(&self) -> u64 {
        self.word
    }

    /// Size and alignment of a value of type `ty`.
    pub fn value_layout(&self, ty: Idx) -> MemResult<ValueLayout> {
        if let Some(layout) = self.primitive_layout(ty) {
            return Ok(layout);
        }
        if let Some(&cached) = self.values.borrow().get(&ty) {
            return Ok(cached);
        }

        let layout = match self.pool.tag(ty) {
            Tag::Record => self.record_layout(ty)?.value(),
            Tag::Ref => ValueLayout::new(self.word, self.word),
            // Primitive tags on dynamic indices do not occur; size by tag.
            tag => self.tag_layout(tag),
        };
        self.values.borrow_mut().insert(ty, layout);
        Ok(layout)
    }

    /// Field placement of record `ty`. Non-records yield an empty layout.
    pub fn record_layout(&self, ty: Idx) -> MemResult<Rc<RecordLayout>> {
        if let Some(cached) = self.records.borrow().get(&ty) {
            return Ok(Rc::clone(cached));
        }

        if !self.sizing.borrow_mut().insert(ty) {
            return Err(MemError::InfiniteSize {
                ty: self.pool.display(ty),
            });
        }
        let result = self.compute_record_layout(ty);
        self.sizing.borrow_mut().remove(&ty);

        let layout = Rc::new(result?);
        self.records.borrow_mut().insert(ty, Rc::clone(&layout));
        Ok(layout)
    }

    fn compute_record_layout(&self, ty: Idx) -> MemResult<RecordLayout> {
        let mut offset = 0;
        let mut align = 1;
        let mut fields = Vec::new();

        for (index, field) in (0u32..).zip(self.pool.record_fields(ty)) {
            let layout = self.value_layout(field.ty)?;
            offset = round_up(offset, layout.align);
            fields.push(FieldSlot {
                index,
                name: field.name,
                ty: field.ty,
                offset,
            });
            offset += layout.size;
            align = align.max(layout.align);
        }

        Ok(RecordLayout {
            fields,
            size: round_up(offset, align),
            align,
        })
    }

    /// Heap shape of the block behind reference type `ref_ty`.
    pub fn ref_layout(&self, ref_ty: Idx) -> MemResult<RefLayout> {
        let Some((region, pointee)) = self.pool.ref_parts(ref_ty) else {
            return Err(MemError::NotAReference {
                ty: self.pool.display(ref_ty),
            });
        };
        let value = self.value_layout(pointee)?;
        let header = match region {
            Region::Counted => HeaderLayout {
                size: round_up(self.word, value.align),
            },
            Region::Owning | Region::Borrowed => HeaderLayout::default(),
        };
        Ok(RefLayout {
            region,
            pointee,
            value,
            header,
        })
    }

    /// Fields of `value_ty` that own memory, in declaration order.
    ///
    /// Only records have fields. Borrowed reference fields are skipped. A
    /// field holding a record by value is included when that record's own
    /// plan is not trivial; self-containment is rejected while sizing, so
    /// the nesting is finite.
    pub fn dealias_plan(&self, value_ty: Idx) -> MemResult<Rc<DealiasPlan>> {
        if let Some(cached) = self.plans.borrow().get(&value_ty) {
            return Ok(Rc::clone(cached));
        }

        let plan = if self.pool.tag(value_ty) == Tag::Record {
            let layout = self.record_layout(value_ty)?;
            let mut releases = Vec::new();
            for slot in &layout.fields {
                let action = match self.pool.ref_region(slot.ty) {
                    Some(region @ (Region::Owning | Region::Counted)) => {
                        FieldAction::Release(region)
                    }
                    Some(Region::Borrowed) => continue,
                    None if self.pool.tag(slot.ty) == Tag::Record => {
                        if self.dealias_plan(slot.ty)?.is_trivial() {
                            continue;
                        }
                        FieldAction::Dealias
                    }
                    None => continue,
                };
                releases.push(FieldRelease {
                    index: slot.index,
                    name: slot.name,
                    offset: slot.offset,
                    ty: slot.ty,
                    action,
                });
            }
            if releases.is_empty() {
                DealiasPlan::Trivial
            } else {
                DealiasPlan::Fields(releases)
            }
        } else {
            DealiasPlan::Trivial
        };

        tracing::trace!(ty = %self.pool.display(value_ty), ?plan, "dealias plan");
        let plan = Rc::new(plan);
        self.plans.borrow_mut().insert(value_ty, Rc::clone(&plan));
        Ok(plan)
    }

    fn primitive_layout(&self, ty: Idx) -> Option<ValueLayout> {
        if !ty.is_primitive() {
            return None;
        }
        let tag = match ty {
            Idx::INT => Tag::Int,
            Idx::FLOAT => Tag::Float,
            Idx::BOOL => Tag::Bool,
            Idx::BYTE => Tag::Byte,
            Idx::I32 => Tag::I32,
            Idx::UNIT => Tag::Unit,
            Idx::USIZE => Tag::Usize,
            Idx::PTR => Tag::Ptr,
            _ => return None,
        };
        Some(self.tag_layout(tag))
    }

    fn tag_layout(&self, tag: Tag) -> ValueLayout {
        match tag {
            Tag::Int | Tag::Float => ValueLayout::new(8, 8),
            Tag::I32 => ValueLayout::new(4, 4),
            Tag::Bool | Tag::Byte => ValueLayout::new(1, 1),
            Tag::Unit => ValueLayout::new(0, 1),
            Tag::Usize | Tag::Ptr | Tag::Ref => ValueLayout::new(self.word, self.word),
            Tag::Record => ValueLayout::new(0, 1),
        }
    }
}

/// Round `value` up to a multiple of `align` (a power of two).
#[inline]
pub(crate) fn round_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}
