//! The type pool.
//!
//! Stores record definitions and reference types behind [`Idx`] handles.
//! Primitive types are implicit (fixed indices); everything else is pushed
//! into the dynamic table starting at [`Idx::FIRST_DYNAMIC`].
//!
//! Reference types are interned: `reference(Counted, point)` returns the same
//! `Idx` every time, so downstream caches keyed by `Idx` are effectively
//! keyed by (region, pointee).
//!
//! Records support two-phase definition (`declare_record` then
//! `define_record`) so a record may hold a reference to itself, e.g. the
//! `next: own Node` field of a linked list.

use rustc_hash::FxHashMap;

use crate::literal::LitValue;
use crate::name::{Name, StringInterner};
use crate::{Idx, Region, Tag};

/// A field of a record type.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: Name,
    pub ty: Idx,
    /// Value used when a record literal omits this field.
    pub default: Option<LitValue>,
}

impl FieldDef {
    pub fn new(name: Name, ty: Idx) -> Self {
        Self {
            name,
            ty,
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: LitValue) -> Self {
        self.default = Some(value);
        self
    }
}

/// A record type: a name and its fields in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordDef {
    pub name: Name,
    pub fields: Vec<FieldDef>,
}

#[derive(Clone, Debug)]
enum Item {
    Record(RecordDef),
    Ref { region: Region, pointee: Idx },
}

/// Unified storage for all non-primitive types of a compilation unit.
pub struct Pool {
    interner: StringInterner,
    items: Vec<Item>,
    refs: FxHashMap<(Region, Idx), Idx>,
    records_by_name: FxHashMap<Name, Idx>,
}

impl Pool {
    pub fn new() -> Self {
        Self {
            interner: StringInterner::new(),
            items: Vec::new(),
            refs: FxHashMap::default(),
            records_by_name: FxHashMap::default(),
        }
    }

    /// The interner used for record and field names.
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Intern a name.
    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// Text of an interned name.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    fn push(&mut self, item: Item) -> Idx {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "pool size is bounded far below u32::MAX"
        )]
        let idx = Idx::from_raw(Idx::FIRST_DYNAMIC + self.items.len() as u32);
        self.items.push(item);
        idx
    }

    fn item(&self, idx: Idx) -> Option<&Item> {
        if idx.is_none() {
            return None;
        }
        let raw = idx.raw().checked_sub(Idx::FIRST_DYNAMIC)?;
        self.items.get(raw as usize)
    }

    // Records

    /// Declare a record with no fields yet. Fill it in with [`define_record`](Self::define_record).
    pub fn declare_record(&mut self, name: &str) -> Idx {
        let name = self.name(name);
        let idx = self.push(Item::Record(RecordDef {
            name,
            fields: Vec::new(),
        }));
        self.records_by_name.insert(name, idx);
        idx
    }

    /// Set the fields of a declared record.
    ///
    /// Returns `false` (and changes nothing) if `idx` is not a record.
    pub fn define_record(&mut self, idx: Idx, fields: Vec<FieldDef>) -> bool {
        let Some(raw) = idx.raw().checked_sub(Idx::FIRST_DYNAMIC) else {
            return false;
        };
        match self.items.get_mut(raw as usize) {
            Some(Item::Record(def)) => {
                def.fields = fields;
                true
            }
            _ => false,
        }
    }

    /// Declare and define a record from `(field name, field type)` pairs.
    pub fn record(&mut self, name: &str, fields: &[(&str, Idx)]) -> Idx {
        let defs = fields
            .iter()
            .map(|&(field, ty)| FieldDef::new(self.name(field), ty))
            .collect();
        self.record_with_fields(name, defs)
    }

    /// Declare and define a record from full field definitions.
    pub fn record_with_fields(&mut self, name: &str, fields: Vec<FieldDef>) -> Idx {
        let idx = self.declare_record(name);
        self.define_record(idx, fields);
        idx
    }

    /// Look up a record by name.
    pub fn record_named(&self, name: &str) -> Option<Idx> {
        self.records_by_name.get(&self.name(name)).copied()
    }

    /// Record definition, or `None` if `idx` is not a record.
    pub fn record_def(&self, idx: Idx) -> Option<&RecordDef> {
        match self.item(idx)? {
            Item::Record(def) => Some(def),
            Item::Ref { .. } => None,
        }
    }

    /// Fields of a record in declaration order; empty for non-records.
    pub fn record_fields(&self, idx: Idx) -> &[FieldDef] {
        self.record_def(idx).map_or(&[], |def| def.fields.as_slice())
    }

    // References

    /// Intern the reference type `region pointee`.
    pub fn reference(&mut self, region: Region, pointee: Idx) -> Idx {
        if let Some(&idx) = self.refs.get(&(region, pointee)) {
            return idx;
        }
        let idx = self.push(Item::Ref { region, pointee });
        self.refs.insert((region, pointee), idx);
        idx
    }

    /// Region and pointee if `idx` is a reference type.
    pub fn ref_parts(&self, idx: Idx) -> Option<(Region, Idx)> {
        match self.item(idx)? {
            Item::Ref { region, pointee } => Some((*region, *pointee)),
            Item::Record(_) => None,
        }
    }

    /// Region of a reference type.
    pub fn ref_region(&self, idx: Idx) -> Option<Region> {
        self.ref_parts(idx).map(|(region, _)| region)
    }

    /// Pointee of a reference type.
    pub fn ref_pointee(&self, idx: Idx) -> Option<Idx> {
        self.ref_parts(idx).map(|(_, pointee)| pointee)
    }

    // Queries

    /// Tag of a type. Unknown indices are reported as `Unit`.
    pub fn tag(&self, idx: Idx) -> Tag {
        match idx {
            Idx::INT => Tag::Int,
            Idx::FLOAT => Tag::Float,
            Idx::BOOL => Tag::Bool,
            Idx::BYTE => Tag::Byte,
            Idx::I32 => Tag::I32,
            Idx::UNIT => Tag::Unit,
            Idx::USIZE => Tag::Usize,
            Idx::PTR => Tag::Ptr,
            _ => match self.item(idx) {
                Some(Item::Record(_)) => Tag::Record,
                Some(Item::Ref { .. }) => Tag::Ref,
                None => {
                    tracing::warn!(idx = idx.raw(), "tag query for unknown type index");
                    Tag::Unit
                }
            },
        }
    }

    /// Render a type for printing: `int`, `Point`, `rc Point`, `own own int`.
    pub fn display(&self, idx: Idx) -> String {
        if let Some(name) = idx.name() {
            return name.to_owned();
        }
        match self.item(idx) {
            Some(Item::Record(def)) => self.lookup(def.name).to_owned(),
            Some(Item::Ref { region, pointee }) => {
                format!("{region} {}", self.display(*pointee))
            }
            None => "<unknown>".to_owned(),
        }
    }

    /// Number of dynamic types in the pool.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
