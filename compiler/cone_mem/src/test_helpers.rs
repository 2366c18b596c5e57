//! Shared fixtures for unit tests.

use cone_types::{FieldDef, Idx, Pool, Region};

use crate::ir::{FuncId, Operand, ValueId};
use crate::{FunctionBuilder, LayoutTable, MemConfig, MemEmitter, MemModule, MemResult};

/// Types used across tests.
pub(crate) struct Types {
    /// `Point { x: int, y: int }`
    pub point: Idx,
    pub rc_point: Idx,
    pub own_point: Idx,
    pub borrow_point: Idx,
    pub rc_int: Idx,
    pub own_int: Idx,
    pub borrow_int: Idx,
    /// `Node { value: int, next: own Node }`
    pub node: Idx,
    pub own_node: Idx,
    /// `Pair { a: rc int, b: own int, view: borrow int }`
    pub pair: Idx,
    pub own_pair: Idx,
    pub rc_pair: Idx,
}

pub(crate) fn pool_with_types() -> (Pool, Types) {
    let mut pool = Pool::new();
    let point = pool.record("Point", &[("x", Idx::INT), ("y", Idx::INT)]);
    let rc_point = pool.reference(Region::Counted, point);
    let own_point = pool.reference(Region::Owning, point);
    let borrow_point = pool.reference(Region::Borrowed, point);
    let rc_int = pool.reference(Region::Counted, Idx::INT);
    let own_int = pool.reference(Region::Owning, Idx::INT);
    let borrow_int = pool.reference(Region::Borrowed, Idx::INT);

    let node = pool.declare_record("Node");
    let own_node = pool.reference(Region::Owning, node);
    let node_fields = vec![
        FieldDef::new(pool.name("value"), Idx::INT),
        FieldDef::new(pool.name("next"), own_node),
    ];
    pool.define_record(node, node_fields);

    let pair = pool.record("Pair", &[("a", rc_int), ("b", own_int), ("view", borrow_int)]);
    let own_pair = pool.reference(Region::Owning, pair);
    let rc_pair = pool.reference(Region::Counted, pair);

    let types = Types {
        point,
        rc_point,
        own_point,
        borrow_point,
        rc_int,
        own_int,
        borrow_int,
        node,
        own_node,
        pair,
        own_pair,
        rc_pair,
    };
    (pool, types)
}

/// Build a function whose body `body` emits, returning its optional result.
pub(crate) fn build_fn(
    layouts: &LayoutTable<'_>,
    config: &MemConfig,
    module: &mut MemModule,
    name: &str,
    params: &[Idx],
    ret: Idx,
    body: impl FnOnce(&mut MemEmitter<'_>, &[ValueId]) -> MemResult<Option<Operand>>,
) -> MemResult<FuncId> {
    let mut builder = FunctionBuilder::new(name, params, ret);
    let param_ids: Vec<ValueId> = (0..params.len()).map(|i| builder.param(i)).collect();
    let result = {
        let mut em = MemEmitter::new(layouts, config, module, &mut builder);
        body(&mut em, &param_ids)?
    };
    builder.ret(result);
    Ok(module.add_function(builder.finish()))
}
