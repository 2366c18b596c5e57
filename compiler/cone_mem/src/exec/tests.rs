#![expect(clippy::unwrap_used, reason = "tests unwrap well-formed execution")]

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use cone_types::{Idx, Pool, Region};

use super::*;
use crate::ir::Const;
use crate::test_helpers::{build_fn, pool_with_types};
use crate::{FunctionBuilder, InitValue, MemConfig, PointerWidth, TargetConfig};

/// Module with one function `drop(ptr)` that frees its argument `frees` times.
fn freeing_module(frees: usize) -> MemModule {
    let mut module = MemModule::new("unit");
    let heap = module.heap(&TargetConfig::default()).unwrap();
    let mut builder = FunctionBuilder::new("drop", &[Idx::PTR], Idx::UNIT);
    let p = builder.param(0);
    for _ in 0..frees {
        builder.call_extern_void(heap.free, &[p.into()]);
    }
    builder.ret(None);
    module.add_function(builder.finish());
    module
}

// ---------------------------------------------------------------------------
// Heap
// ---------------------------------------------------------------------------

#[test]
fn heap_blocks_are_zeroed_and_writable() {
    let mut heap = Heap::default();
    let a = heap.malloc(16);
    let b = heap.malloc(4);

    assert!(b > a + 16);
    assert_eq!(heap.read(a, 16).unwrap(), &[0; 16]);
    heap.write(a + 8, &[1, 2, 3]).unwrap();
    assert_eq!(heap.read(a + 8, 3).unwrap(), &[1, 2, 3]);
    assert_eq!(heap.live_blocks(), 2);
}

#[test]
fn heap_detects_invalid_accesses() {
    let mut heap = Heap::default();
    let a = heap.malloc(8);

    assert_eq!(heap.read(0, 8), Err(ExecError::NullDeref));
    assert_eq!(
        heap.read(a + 4, 8),
        Err(ExecError::OutOfBounds { addr: a + 4, len: 8 })
    );
    assert_eq!(heap.free(a + 4), Err(ExecError::InvalidFree { addr: a + 4 }));

    heap.free(a).unwrap();
    assert_eq!(heap.read(a, 8), Err(ExecError::UseAfterFree { addr: a }));
    assert_eq!(heap.free(a), Err(ExecError::DoubleFree { addr: a }));
    assert_eq!(heap.stats().frees, 1);
}

#[test]
fn freeing_null_is_a_no_op() {
    let mut heap = Heap::default();
    heap.free(0).unwrap();
    assert_eq!(heap.stats().frees, 0);
    assert!(heap.free_log().is_empty());
}

#[test]
fn addresses_are_never_reused() {
    let mut heap = Heap::default();
    let a = heap.malloc(8);
    heap.free(a).unwrap();
    let b = heap.malloc(8);

    assert_ne!(a, b);
    assert!(!heap.is_live(a));
    assert!(heap.is_live(b));
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

#[test]
fn freeing_an_unknown_address_is_invalid() {
    let pool = Pool::new();
    let layouts = LayoutTable::new(&pool, &TargetConfig::default());
    let module = freeing_module(1);
    let mut machine = Machine::new(&module, &layouts);

    assert_eq!(
        machine.run("drop", &[RtValue::Ptr(0x1000_0000)]),
        Err(ExecError::InvalidFree { addr: 0x1000_0000 })
    );
}

#[test]
fn freeing_twice_in_one_body_is_a_double_free() {
    let pool = Pool::new();
    let layouts = LayoutTable::new(&pool, &TargetConfig::default());
    let module = freeing_module(2);
    let mut machine = Machine::new(&module, &layouts);
    let block = machine.heap.malloc(8);

    assert_eq!(
        machine.run("drop", &[RtValue::Ptr(block)]),
        Err(ExecError::DoubleFree { addr: block })
    );
}

#[test]
fn second_release_of_owned_block_is_a_double_free() {
    let (pool, types) = pool_with_types();
    let config = MemConfig::default();
    let layouts = LayoutTable::new(&pool, &config.target);
    let mut module = MemModule::new("unit");
    let own_int = types.own_int;
    build_fn(&layouts, &config, &mut module, "make", &[], own_int, |em, _| {
        let r = em.allocate(own_int, InitValue::Value(Const::Int(5).into()))?;
        Ok(Some(r.into()))
    })
    .unwrap();
    build_fn(&layouts, &config, &mut module, "release", &[own_int], Idx::UNIT, |em, p| {
        em.release(p[0], own_int)?;
        Ok(None)
    })
    .unwrap();

    let mut machine = Machine::new(&module, &layouts);
    let Some(RtValue::Ptr(r)) = machine.run("make", &[]).unwrap() else {
        panic!("expected a pointer");
    };
    machine.run("release", &[RtValue::Ptr(r)]).unwrap();

    assert_eq!(
        machine.run("release", &[RtValue::Ptr(r)]),
        Err(ExecError::DoubleFree { addr: r })
    );
    assert_eq!(machine.load(Idx::INT, r), Err(ExecError::UseAfterFree { addr: r }));
}

#[test]
fn stack_slots_die_with_their_frame() {
    let pool = Pool::new();
    let layouts = LayoutTable::new(&pool, &TargetConfig::default());
    let mut module = MemModule::new("unit");
    let mut builder = FunctionBuilder::new("leak_slot", &[], Idx::PTR);
    let slot = builder.alloca(Idx::INT, pool.name("x"));
    builder.store(Idx::INT, Const::Int(3), slot);
    builder.ret(Some(slot.into()));
    module.add_function(builder.finish());

    let mut machine = Machine::new(&module, &layouts);
    let Some(RtValue::Ptr(addr)) = machine.run("leak_slot", &[]).unwrap() else {
        panic!("expected a pointer");
    };

    assert_eq!(machine.load(Idx::INT, addr), Err(ExecError::UseAfterFree { addr }));
    assert_eq!(machine.heap().live_blocks(), 0);
}

#[test]
fn runaway_loop_hits_step_limit() {
    let pool = Pool::new();
    let layouts = LayoutTable::new(&pool, &TargetConfig::default());
    let mut module = MemModule::new("unit");
    let mut builder = FunctionBuilder::new("spin", &[], Idx::UNIT);
    let body = builder.append_block("loop");
    builder.br(body);
    builder.position_at_end(body);
    builder.add(Idx::INT, Const::Int(1), Const::Int(1));
    builder.br(body);
    module.add_function(builder.finish());

    let mut machine = Machine::new(&module, &layouts).with_step_limit(100);
    assert_eq!(machine.run("spin", &[]), Err(ExecError::StepLimit));
}

#[test]
fn call_resolution_errors() {
    let pool = Pool::new();
    let layouts = LayoutTable::new(&pool, &TargetConfig::default());
    let mut module = MemModule::new("unit");
    module.add_function(MemFunction::declaration("external", &[], Idx::UNIT));
    let puts = module.declare_extern("puts", &[Idx::PTR], Idx::UNIT);
    let mut builder = FunctionBuilder::new("greet", &[], Idx::UNIT);
    builder.call_extern_void(puts, &[Const::Null.into()]);
    builder.ret(None);
    module.add_function(builder.finish());
    module.add_function(FunctionBuilder::new("open", &[], Idx::UNIT).finish());

    let mut machine = Machine::new(&module, &layouts);
    assert_eq!(
        machine.run("missing", &[]),
        Err(ExecError::UnknownFunction("missing".to_owned()))
    );
    assert_eq!(
        machine.run("external", &[]),
        Err(ExecError::MissingBody("external".to_owned()))
    );
    assert_eq!(
        machine.run("greet", &[]),
        Err(ExecError::UnknownExtern("puts".to_owned()))
    );
    assert_eq!(
        machine.run("open", &[]),
        Err(ExecError::Unterminated {
            func: "open".to_owned(),
            block: 0
        })
    );
}

#[test]
fn records_round_trip_through_memory() {
    let (pool, types) = pool_with_types();
    let target = TargetConfig::default().with_pointer_width(PointerWidth::W32);
    let layouts = LayoutTable::new(&pool, &target);
    let module = MemModule::new("unit");
    let mut machine = Machine::new(&module, &layouts);
    let size = layouts.value_layout(types.pair).unwrap().size;
    assert_eq!(size, 12);

    let addr = machine.heap.malloc(size);
    let pair = RtValue::Record(vec![
        RtValue::Ptr(0x1234),
        RtValue::Ptr(0x5678),
        RtValue::Ptr(0x1234),
    ]);
    machine.store(types.pair, addr, &pair).unwrap();

    assert_eq!(machine.load(types.pair, addr).unwrap(), pair);
    assert_eq!(
        machine.heap().read(addr, 4).unwrap(),
        &0x1234_u32.to_le_bytes()
    );
}

#[test]
fn store_rejects_mismatched_values() {
    let (pool, types) = pool_with_types();
    let layouts = LayoutTable::new(&pool, &TargetConfig::default());
    let module = MemModule::new("unit");
    let mut machine = Machine::new(&module, &layouts);
    let addr = machine.heap.malloc(16);

    assert_eq!(
        machine.store(Idx::INT, addr, &RtValue::Bool(true)),
        Err(ExecError::TypeMismatch {
            expected: "int",
            found: "bool"
        })
    );
    assert_eq!(
        machine.store(types.point, addr, &RtValue::Record(vec![RtValue::Int(1)])),
        Err(ExecError::TypeMismatch {
            expected: "record of matching arity",
            found: "record"
        })
    );
}

// ---------------------------------------------------------------------------
// Count lifecycle
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn block_freed_exactly_on_last_release(extra in 0_usize..24) {
        let mut pool = Pool::new();
        let rc_int = pool.reference(Region::Counted, Idx::INT);
        let config = MemConfig::default();
        let layouts = LayoutTable::new(&pool, &config.target);
        let mut module = MemModule::new("unit");
        build_fn(&layouts, &config, &mut module, "make", &[], rc_int, |em, _| {
            let r = em.allocate(rc_int, InitValue::Value(Const::Int(0).into()))?;
            Ok(Some(r.into()))
        })
        .unwrap();
        build_fn(&layouts, &config, &mut module, "retain", &[rc_int], Idx::UNIT, |em, p| {
            em.adjust_count(p[0], 1, rc_int)?;
            Ok(None)
        })
        .unwrap();
        build_fn(&layouts, &config, &mut module, "release", &[rc_int], Idx::UNIT, |em, p| {
            em.release(p[0], rc_int)?;
            Ok(None)
        })
        .unwrap();

        let mut machine = Machine::new(&module, &layouts);
        let Some(RtValue::Ptr(r)) = machine.run("make", &[]).unwrap() else {
            panic!("expected a pointer");
        };
        let block = machine.block_of(rc_int, r).unwrap();
        for _ in 0..extra {
            machine.run("retain", &[RtValue::Ptr(r)]).unwrap();
        }
        prop_assert_eq!(machine.ref_count(rc_int, r).unwrap(), extra as u64 + 1);

        for _ in 0..extra {
            machine.run("release", &[RtValue::Ptr(r)]).unwrap();
            prop_assert!(machine.heap().is_live(block));
        }
        machine.run("release", &[RtValue::Ptr(r)]).unwrap();

        prop_assert!(!machine.heap().is_live(block));
        prop_assert_eq!(machine.heap().free_log(), &[block][..]);
    }
}
