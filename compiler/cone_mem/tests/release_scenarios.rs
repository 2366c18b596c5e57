#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end release scenarios, run through the reference executor.
//!
//! Each test emits a small unit with the public emitter API, generates the
//! pending dealias functions, and checks the simulated heap afterwards.

use pretty_assertions::assert_eq;

use cone_mem::exec::HeapStats;
use cone_mem::ir::{Const, FuncId, Operand, ValueId};
use cone_mem::{
    init_tracing, FunctionBuilder, InitValue, LayoutTable, Machine, MemConfig, MemEmitter,
    MemModule, MemResult, RtValue, ScopeVars,
};
use cone_types::{Idx, Pool, Region};

fn emit(
    layouts: &LayoutTable<'_>,
    config: &MemConfig,
    module: &mut MemModule,
    name: &str,
    params: &[Idx],
    ret: Idx,
    body: impl FnOnce(&mut MemEmitter<'_>, &[ValueId]) -> MemResult<Option<Operand>>,
) -> FuncId {
    let mut builder = FunctionBuilder::new(name, params, ret);
    let args: Vec<ValueId> = (0..params.len()).map(|i| builder.param(i)).collect();
    let result = {
        let mut em = MemEmitter::new(layouts, config, module, &mut builder);
        body(&mut em, &args).expect("emission succeeds")
    };
    builder.ret(result);
    module.add_function(builder.finish())
}

fn ptr(value: Option<RtValue>) -> u64 {
    match value {
        Some(RtValue::Ptr(addr)) => addr,
        other => panic!("expected a pointer, got {other:?}"),
    }
}

/// A counted `Holder { x: own int, y: borrow int }` shared twice, then
/// released twice: the first release only drops the count, the second frees
/// `x` and then the holder. The borrowed target is never touched.
#[test]
fn shared_holder_frees_owned_field_then_itself() {
    init_tracing();
    let mut pool = Pool::new();
    let own_int = pool.reference(Region::Owning, Idx::INT);
    let borrow_int = pool.reference(Region::Borrowed, Idx::INT);
    let holder = pool.record("Holder", &[("x", own_int), ("y", borrow_int)]);
    let rc_holder = pool.reference(Region::Counted, holder);

    let config = MemConfig::default();
    let layouts = LayoutTable::new(&pool, &config.target);
    let mut module = MemModule::new("scenario");

    emit(&layouts, &config, &mut module, "target", &[], own_int, |em, _| {
        let t = em.allocate(own_int, InitValue::Value(Const::Int(42).into()))?;
        Ok(Some(t.into()))
    });
    emit(&layouts, &config, &mut module, "make", &[own_int], rc_holder, |em, p| {
        let x = em.allocate(own_int, InitValue::Value(Const::Int(7).into()))?;
        let y = em.builder().cast(borrow_int, p[0]);
        let h = em.allocate(rc_holder, InitValue::Fields(vec![x.into(), y.into()]))?;
        Ok(Some(h.into()))
    });
    emit(&layouts, &config, &mut module, "share", &[rc_holder], Idx::UNIT, |em, p| {
        em.adjust_count(p[0], 1, rc_holder)?;
        Ok(None)
    });
    emit(&layouts, &config, &mut module, "release", &[rc_holder], Idx::UNIT, |em, p| {
        em.release(p[0], rc_holder)?;
        Ok(None)
    });
    assert_eq!(module.emit_pending_glue(&layouts, &config).unwrap(), 1);

    let mut machine = Machine::new(&module, &layouts);
    let target = ptr(machine.run("target", &[]).unwrap());
    let h = ptr(machine.run("make", &[RtValue::Ptr(target)]).unwrap());
    let holder_block = machine.block_of(rc_holder, h).unwrap();
    let RtValue::Record(fields) = machine.load(holder, h).unwrap() else {
        panic!("expected a record");
    };
    let x = fields[0].as_addr().unwrap();
    assert_eq!(fields[1], RtValue::Ptr(target));

    machine.run("share", &[RtValue::Ptr(h)]).unwrap();
    assert_eq!(machine.ref_count(rc_holder, h).unwrap(), 2);

    machine.run("release", &[RtValue::Ptr(h)]).unwrap();
    assert_eq!(machine.ref_count(rc_holder, h).unwrap(), 1);
    assert!(machine.heap().free_log().is_empty());

    machine.run("release", &[RtValue::Ptr(h)]).unwrap();
    assert_eq!(machine.heap().free_log(), &[x, holder_block]);
    assert!(machine.heap().is_live(target));
    assert_eq!(machine.load(Idx::INT, target).unwrap(), RtValue::Int(42));
}

/// Three owned locals released at scope exit, first-declared first.
#[test]
fn scope_exit_releases_locals_in_declaration_order() {
    init_tracing();
    let mut pool = Pool::new();
    let own_int = pool.reference(Region::Owning, Idx::INT);
    let config = MemConfig::default();
    let layouts = LayoutTable::new(&pool, &config.target);
    let mut module = MemModule::new("scenario");

    emit(&layouts, &config, &mut module, "body", &[], Idx::UNIT, |em, _| {
        let mut scope = ScopeVars::new();
        for (name, v) in [("a", 1), ("b", 2), ("c", 3)] {
            let r = em.allocate(own_int, InitValue::Value(Const::Int(v).into()))?;
            let name = em.pool().name(name);
            em.declare_local(&mut scope, name, own_int, Some(r.into()))?;
        }
        em.close_scope(&scope)?;
        Ok(None)
    });

    let mut machine = Machine::new(&module, &layouts);
    machine.run("body", &[]).unwrap();

    let log = machine.heap().free_log();
    assert_eq!(log.len(), 3);
    assert!(log.windows(2).all(|w| w[0] < w[1]), "free order {log:x?}");
    assert_eq!(machine.heap().live_blocks(), 0);
}

/// Releasing a borrowed reference performs no heap operation at all.
#[test]
fn borrowed_release_touches_nothing() {
    let mut pool = Pool::new();
    let borrow_int = pool.reference(Region::Borrowed, Idx::INT);
    let config = MemConfig::default();
    let layouts = LayoutTable::new(&pool, &config.target);
    let mut module = MemModule::new("scenario");
    emit(&layouts, &config, &mut module, "release", &[borrow_int], Idx::UNIT, |em, p| {
        em.release(p[0], borrow_int)?;
        Ok(None)
    });

    let mut machine = Machine::new(&module, &layouts);
    machine.run("release", &[RtValue::Ptr(0x1234)]).unwrap();

    assert_eq!(machine.heap().stats(), HeapStats::default());
    assert!(module.heap_decls().is_none());
}
