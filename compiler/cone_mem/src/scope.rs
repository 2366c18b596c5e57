//! Scope-exit cleanup.
//!
//! Each lexical scope records the variables declared in it, in declaration
//! order. At scope exit every variable whose type owns memory and that was
//! not moved out is released. Releases run in declaration order (not
//! reverse): a variable declared earlier is released first. A record held
//! by value in its slot has its owning fields released in place.
//!
//! [`ScopeVars`] is an index-stable list: registering never moves earlier
//! entries, so a [`VarIdx`] stays valid while the front end marks moves.

use cone_types::{Idx, Name, OwnedKind, Tag};

use crate::emit::MemEmitter;
use crate::ir::{Operand, ValueId};
use crate::MemResult;

/// A variable declared in a scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeclaredVar {
    pub name: Name,
    pub ty: Idx,
    /// Stack slot holding the variable.
    pub slot: ValueId,
    pub kind: OwnedKind,
    /// Ownership was transferred out; scope exit skips it.
    pub moved: bool,
}

impl DeclaredVar {
    /// `true` if scope exit must release this variable.
    #[inline]
    pub fn needs_release(&self) -> bool {
        self.kind.needs_release() && !self.moved
    }
}

/// Position of a variable within its [`ScopeVars`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VarIdx(u32);

impl VarIdx {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Variables of one lexical scope, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct ScopeVars {
    vars: Vec<DeclaredVar>,
}

impl ScopeVars {
    pub fn new() -> Self {
        Self::default()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "a scope never declares u32::MAX variables"
    )]
    pub fn register(&mut self, var: DeclaredVar) -> VarIdx {
        let idx = VarIdx(self.vars.len() as u32);
        self.vars.push(var);
        idx
    }

    pub fn get(&self, idx: VarIdx) -> Option<&DeclaredVar> {
        self.vars.get(idx.0 as usize)
    }

    /// Record that ownership of `idx` was transferred out.
    pub fn mark_moved(&mut self, idx: VarIdx) {
        if let Some(var) = self.vars.get_mut(idx.0 as usize) {
            var.moved = true;
        }
    }

    /// The most recent declaration of `name`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "indices come from register()"
    )]
    pub fn find(&self, name: Name) -> Option<VarIdx> {
        self.vars
            .iter()
            .rposition(|v| v.name == name)
            .map(|i| VarIdx(i as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclaredVar> {
        self.vars.iter()
    }

    /// Variables scope exit releases, in release order.
    pub fn pending_releases(&self) -> impl Iterator<Item = &DeclaredVar> {
        self.vars.iter().filter(|v| v.needs_release())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// The enclosing scopes of the current program point, outermost first.
#[derive(Clone, Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<ScopeVars>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a scope. Returns its depth.
    pub fn push(&mut self) -> usize {
        self.scopes.push(ScopeVars::new());
        self.scopes.len() - 1
    }

    pub fn pop(&mut self) -> Option<ScopeVars> {
        self.scopes.pop()
    }

    pub fn current(&self) -> Option<&ScopeVars> {
        self.scopes.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut ScopeVars> {
        self.scopes.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Innermost-first declaration of `name` across all scopes.
    pub fn lookup(&self, name: Name) -> Option<(usize, VarIdx)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, scope)| scope.find(name).map(|idx| (depth, idx)))
    }

    pub fn mark_moved(&mut self, depth: usize, idx: VarIdx) {
        if let Some(scope) = self.scopes.get_mut(depth) {
            scope.mark_moved(idx);
        }
    }

    /// Scopes left when jumping out to `depth`, innermost first.
    pub fn exiting(&self, depth: usize) -> impl Iterator<Item = &ScopeVars> {
        self.scopes.iter().skip(depth).rev()
    }
}

impl MemEmitter<'_> {
    /// Declare a local of type `ty` in `scope`: a stack slot, an optional
    /// initializing store, and the scope entry.
    pub fn declare_local(
        &mut self,
        scope: &mut ScopeVars,
        name: Name,
        ty: Idx,
        init: Option<Operand>,
    ) -> MemResult<VarIdx> {
        self.insertion_point()?;
        let kind = self.owned_kind(ty)?;
        let builder = self.builder();
        let slot = builder.alloca(ty, name);
        if let Some(value) = init {
            builder.store(ty, value, slot);
        }
        Ok(scope.register(DeclaredVar {
            name,
            ty,
            slot,
            kind,
            moved: false,
        }))
    }

    /// Release the owned, unmoved variables of `scope` in declaration order.
    pub fn close_scope(&mut self, scope: &ScopeVars) -> MemResult<()> {
        for var in scope.pending_releases() {
            if var.kind == OwnedKind::Embedded {
                self.dealias_fields(var.slot, var.ty)?;
            } else {
                let value = self.builder().load(var.ty, var.slot);
                self.release(value, var.ty)?;
            }
        }
        Ok(())
    }

    /// Reference types take their region's kind. A record held by value is
    /// `Embedded` when it has fields to release.
    fn owned_kind(&self, ty: Idx) -> MemResult<OwnedKind> {
        let pool = self.pool();
        if let Some(region) = pool.ref_region(ty) {
            return Ok(region.owned_kind());
        }
        if pool.tag(ty) == Tag::Record && !self.layouts().dealias_plan(ty)?.is_trivial() {
            return Ok(OwnedKind::Embedded);
        }
        Ok(OwnedKind::None)
    }

    /// Close every scope of `stack` deeper than or at `depth`, innermost
    /// first. Used for early exits (`return` closes to depth 0).
    pub fn close_scopes(&mut self, stack: &ScopeStack, depth: usize) -> MemResult<()> {
        for scope in stack.exiting(depth) {
            self.close_scope(scope)?;
        }
        Ok(())
    }
}
