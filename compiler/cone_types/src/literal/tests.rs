use pretty_assertions::assert_eq;

use crate::{FieldDef, Region};

use super::*;

fn point(pool: &mut Pool) -> Idx {
    pool.record("Point", &[("x", Idx::INT), ("y", Idx::INT)])
}

#[test]
fn exact_literal_provides_every_field() {
    let mut pool = Pool::new();
    let p = point(&mut pool);

    let inits = check_record_literal(&pool, p, &[Idx::INT, Idx::INT]);
    assert_eq!(
        inits,
        Ok(vec![FieldInit::Provided(0), FieldInit::Provided(1)])
    );
}

#[test]
fn missing_trailing_field_uses_default() {
    let mut pool = Pool::new();
    let fields = vec![
        FieldDef::new(pool.name("len"), Idx::USIZE),
        FieldDef::new(pool.name("flag"), Idx::BOOL).with_default(LitValue::Bool(true)),
    ];
    let r = pool.record_with_fields("Buf", fields);

    let inits = check_record_literal(&pool, r, &[Idx::USIZE]);
    assert_eq!(
        inits,
        Ok(vec![
            FieldInit::Provided(0),
            FieldInit::Default(LitValue::Bool(true))
        ])
    );
}

#[test]
fn missing_field_without_default_is_rejected() {
    let mut pool = Pool::new();
    let p = point(&mut pool);

    let err = check_record_literal(&pool, p, &[Idx::INT]);
    assert_eq!(
        err,
        Err(LiteralError::NotEnough {
            record: "Point".to_owned(),
            field: "y".to_owned(),
        })
    );
}

#[test]
fn surplus_values_are_rejected() {
    let mut pool = Pool::new();
    let p = point(&mut pool);

    let err = check_record_literal(&pool, p, &[Idx::INT, Idx::INT, Idx::INT]);
    assert_eq!(
        err,
        Err(LiteralError::TooMany {
            record: "Point".to_owned(),
            expected: 2,
            found: 3,
        })
    );
}

#[test]
fn type_mismatch_names_the_field() {
    let mut pool = Pool::new();
    let p = point(&mut pool);

    let err = check_record_literal(&pool, p, &[Idx::INT, Idx::FLOAT]);
    assert_eq!(
        err,
        Err(LiteralError::Mismatch {
            field: "y".to_owned(),
            expected: "int".to_owned(),
            found: "float".to_owned(),
        })
    );
}

#[test]
fn reference_fields_must_match_region() {
    let mut pool = Pool::new();
    let own_int = pool.reference(Region::Owning, Idx::INT);
    let borrow_int = pool.reference(Region::Borrowed, Idx::INT);
    let r = pool.record("Holder", &[("x", own_int)]);

    assert!(check_record_literal(&pool, r, &[own_int]).is_ok());
    let err = check_record_literal(&pool, r, &[borrow_int]);
    assert!(matches!(err, Err(LiteralError::Mismatch { .. })));
}

#[test]
fn empty_literal_is_rejected() {
    let mut pool = Pool::new();
    let p = point(&mut pool);

    assert_eq!(
        check_record_literal(&pool, p, &[]),
        Err(LiteralError::Empty {
            record: "Point".to_owned()
        })
    );
}

#[test]
fn non_record_is_rejected() {
    let pool = Pool::new();
    let err = check_record_literal(&pool, Idx::INT, &[Idx::INT]);
    assert_eq!(
        err,
        Err(LiteralError::NotARecord {
            ty: "int".to_owned()
        })
    );
}

#[test]
fn error_messages_render() {
    let err = LiteralError::TooMany {
        record: "Point".to_owned(),
        expected: 2,
        found: 3,
    };
    assert_eq!(
        err.to_string(),
        "too many values for `Point`: expected at most 2, found 3"
    );
}
