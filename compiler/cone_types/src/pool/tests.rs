use pretty_assertions::assert_eq;

use super::*;

#[test]
fn primitive_tags() {
    let pool = Pool::new();
    assert_eq!(pool.tag(Idx::INT), Tag::Int);
    assert_eq!(pool.tag(Idx::USIZE), Tag::Usize);
    assert_eq!(pool.tag(Idx::PTR), Tag::Ptr);
    assert_eq!(pool.tag(Idx::UNIT), Tag::Unit);
    assert!(pool.is_empty());
}

#[test]
fn dynamic_types_start_past_reserved_indices() {
    let mut pool = Pool::new();
    let first = pool.record("First", &[]);

    assert_eq!(first.raw(), Idx::FIRST_DYNAMIC);
    let reserved = Idx::from_raw(Idx::PRIMITIVE_COUNT);
    assert!(!reserved.is_primitive());
    assert_eq!(reserved.name(), None);
    assert_eq!(pool.ref_parts(reserved), None);
    assert!(pool.record_fields(reserved).is_empty());
}

#[test]
fn references_are_interned_per_region_and_pointee() {
    let mut pool = Pool::new();
    let a = pool.reference(Region::Counted, Idx::INT);
    let b = pool.reference(Region::Counted, Idx::INT);
    let c = pool.reference(Region::Owning, Idx::INT);

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(pool.tag(a), Tag::Ref);
    assert_eq!(pool.ref_parts(a), Some((Region::Counted, Idx::INT)));
    assert_eq!(pool.ref_region(c), Some(Region::Owning));
    assert_eq!(pool.ref_pointee(c), Some(Idx::INT));
    assert_eq!(pool.len(), 2);
}

#[test]
fn records_keep_declaration_order() {
    let mut pool = Pool::new();
    let r = pool.record("Pair", &[("b", Idx::BYTE), ("a", Idx::INT)]);

    let names: Vec<_> = pool
        .record_fields(r)
        .iter()
        .map(|f| pool.lookup(f.name))
        .collect();
    assert_eq!(names, vec!["b", "a"]);
    assert_eq!(pool.tag(r), Tag::Record);
    assert_eq!(pool.record_named("Pair"), Some(r));
}

#[test]
fn self_referential_record_via_two_phase_definition() {
    let mut pool = Pool::new();
    let node = pool.declare_record("Node");
    let next = pool.reference(Region::Owning, node);
    let fields = vec![
        FieldDef::new(pool.name("value"), Idx::INT),
        FieldDef::new(pool.name("next"), next),
    ];
    assert!(pool.define_record(node, fields));

    assert_eq!(pool.record_fields(node).len(), 2);
    assert_eq!(pool.record_fields(node)[1].ty, next);
    assert_eq!(pool.display(next), "own Node");
}

#[test]
fn define_record_rejects_non_records() {
    let mut pool = Pool::new();
    let r = pool.reference(Region::Owning, Idx::INT);
    assert!(!pool.define_record(r, Vec::new()));
    assert!(!pool.define_record(Idx::INT, Vec::new()));
}

#[test]
fn non_reference_queries_return_none() {
    let mut pool = Pool::new();
    let r = pool.record("Unit", &[]);
    assert_eq!(pool.ref_parts(r), None);
    assert_eq!(pool.ref_parts(Idx::INT), None);
    assert!(pool.record_def(Idx::INT).is_none());
    assert!(pool.record_fields(Idx::INT).is_empty());
}

#[test]
fn display_nested_references() {
    let mut pool = Pool::new();
    let inner = pool.reference(Region::Owning, Idx::INT);
    let outer = pool.reference(Region::Borrowed, inner);
    assert_eq!(pool.display(outer), "borrow own int");
    assert_eq!(pool.display(Idx::NONE), "<unknown>");
}
