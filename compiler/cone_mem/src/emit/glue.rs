//! Dealias function bodies.
//!
//! A dealias function `void(ptr)` releases the owning fields of one record
//! type. Calls to it are emitted first and registered in the module; the
//! bodies are generated here afterwards. Generating a body can request
//! further dealias functions, so the queue is drained until empty.

use cone_types::Idx;

use super::MemEmitter;
use crate::builder::FunctionBuilder;
use crate::layout::{DealiasPlan, LayoutTable};
use crate::{MemConfig, MemModule, MemResult};

impl MemModule {
    /// Generate bodies for every dealias function declared so far.
    ///
    /// Returns the number of bodies generated.
    pub fn emit_pending_glue(
        &mut self,
        layouts: &LayoutTable<'_>,
        config: &MemConfig,
    ) -> MemResult<usize> {
        let mut emitted = 0;
        while let Some((value_ty, func_id)) = self.pop_pending_glue() {
            let plan = layouts.dealias_plan(value_ty)?;
            let name = self.function(func_id).name.clone();
            let mut builder = FunctionBuilder::new(&name, &[Idx::PTR], Idx::UNIT);
            let target = builder.param(0);

            if let DealiasPlan::Fields(fields) = &*plan {
                let mut emitter = MemEmitter::new(layouts, config, self, &mut builder);
                emitter.release_fields(target.into(), value_ty, fields)?;
            }
            builder.ret(None);

            tracing::debug!(func = %name, ty = %layouts.pool().display(value_ty), "dealias function");
            self.define_function(func_id, builder.finish());
            emitted += 1;
        }
        Ok(emitted)
    }
}
