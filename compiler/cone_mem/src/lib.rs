//! Region-based memory management codegen for the Cone compiler.
//!
//! Every reference type carries one of three regions:
//!
//! - **`own`** (single owner): the block is freed when its owner releases it.
//! - **`rc`** (reference-counted): the block carries a hidden count word in
//!   front of the payload and is freed when the count drops to zero.
//! - **`borrow`**: a non-owning view. Releasing it does nothing.
//!
//! This crate emits the code that enforces those lifetimes into a small
//! target-neutral IR:
//!
//! - [`LayoutTable`]: value sizes, counted-block headers, dealias plans.
//! - [`MemEmitter`]: allocation, count adjustment, release, field dealiasing.
//! - [`ScopeVars`] / [`ScopeStack`]: owned locals released at scope exit,
//!   in declaration order.
//! - [`MemModule`]: one unit's functions, with heap primitives and dealias
//!   functions declared once per unit.
//! - [`Machine`]: executes the IR over a checked simulated heap.
//!
//! # Usage
//!
//! ```ignore
//! let layouts = LayoutTable::new(&pool, &config.target);
//! let mut module = MemModule::new("unit");
//! let mut builder = FunctionBuilder::new("make", &[], rc_point);
//! let mut em = MemEmitter::new(&layouts, &config, &mut module, &mut builder);
//! let p = em.allocate(rc_point, InitValue::Fields(vec![x, y]))?;
//! em.builder().ret(Some(p.into()));
//! module.add_function(builder.finish());
//! module.emit_pending_glue(&layouts, &config)?;
//! ```
//!
//! Generated reference counting is non-atomic: values must not be shared
//! across threads.

mod builder;
mod config;
mod emit;
mod error;
pub mod exec;
pub mod ir;
mod layout;
mod module;
mod print;
mod runtime_decl;
mod scope;

#[cfg(test)]
mod test_helpers;

pub use builder::FunctionBuilder;
pub use config::{HeapSymbols, MemConfig, PointerWidth, RcChecks, TargetConfig};
pub use emit::{InitValue, MemEmitter};
pub use error::{MemError, MemResult};
pub use exec::{ExecError, Machine, RtValue};
pub use layout::{
    DealiasPlan, FieldAction, FieldRelease, FieldSlot, HeaderLayout, LayoutTable, RecordLayout, RefLayout,
    ValueLayout,
};
pub use module::MemModule;
pub use print::{FunctionDisplay, ModuleDisplay};
pub use runtime_decl::HeapDecls;
pub use scope::{DeclaredVar, ScopeStack, ScopeVars, VarIdx};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize the tracing subscriber for debug output.
///
/// Does nothing unless `RUST_LOG` is set, e.g.
/// `RUST_LOG=cone_mem=trace cargo test -p cone_mem`. Safe to call more
/// than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true).with_test_writer())
                .with(filter)
                .try_init();
        }
    });
}
