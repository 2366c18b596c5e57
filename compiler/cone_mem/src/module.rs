//! One compilation unit of memory IR.
//!
//! Besides functions and extern declarations, a module memoizes the two
//! per-unit artifacts of the memory core: the heap primitive declarations
//! (see `runtime_decl`) and the out-of-line dealias functions, keyed by
//! the pointee type they release.

use rustc_hash::FxHashMap;

use cone_types::Idx;

use crate::ir::{ExternDecl, ExternId, FuncId, MemFunction};
use crate::runtime_decl::HeapDecls;

pub struct MemModule {
    name: String,
    externs: Vec<ExternDecl>,
    functions: Vec<MemFunction>,
    pub(crate) heap: Option<HeapDecls>,
    /// Pointee type -> dealias function. Inserted before the body exists.
    glue: FxHashMap<Idx, FuncId>,
    /// Dealias functions declared but not yet given a body.
    pending_glue: Vec<(Idx, FuncId)>,
}

impl MemModule {
    pub fn new(name: &str) -> Self {
        MemModule {
            name: name.to_owned(),
            externs: Vec::new(),
            functions: Vec::new(),
            heap: None,
            glue: FxHashMap::default(),
            pending_glue: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare an external symbol, or return the existing declaration of
    /// the same name.
    pub fn declare_extern(&mut self, name: &str, params: &[Idx], ret: Idx) -> ExternId {
        if let Some(id) = self.find_extern(name) {
            return id;
        }
        let id = ExternId::from_index(self.externs.len());
        self.externs.push(ExternDecl {
            name: name.to_owned(),
            params: params.to_vec(),
            ret,
        });
        id
    }

    pub fn find_extern(&self, name: &str) -> Option<ExternId> {
        self.externs
            .iter()
            .position(|e| e.name == name)
            .map(ExternId::from_index)
    }

    pub fn extern_decl(&self, id: ExternId) -> &ExternDecl {
        &self.externs[id.index()]
    }

    pub fn externs(&self) -> &[ExternDecl] {
        &self.externs
    }

    /// Add a finished function.
    pub fn add_function(&mut self, func: MemFunction) -> FuncId {
        let id = FuncId::from_index(self.functions.len());
        self.functions.push(func);
        id
    }

    /// Replace the body of a previously declared function.
    pub fn define_function(&mut self, id: FuncId, func: MemFunction) {
        self.functions[id.index()] = func;
    }

    pub fn function(&self, id: FuncId) -> &MemFunction {
        &self.functions[id.index()]
    }

    pub fn function_named(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(FuncId::from_index)
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &MemFunction)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId::from_index(i), f))
    }

    /// The dealias function for `pointee`, declaring it on first request.
    ///
    /// The function is cached before its body is generated, so a type whose
    /// fields reach back to itself resolves to the same function.
    pub(crate) fn glue_fn(&mut self, pointee: Idx, name: impl FnOnce() -> String) -> FuncId {
        if let Some(&id) = self.glue.get(&pointee) {
            return id;
        }
        let id = self.add_function(MemFunction::declaration(&name(), &[Idx::PTR], Idx::UNIT));
        self.glue.insert(pointee, id);
        self.pending_glue.push((pointee, id));
        id
    }

    pub fn glue_for(&self, pointee: Idx) -> Option<FuncId> {
        self.glue.get(&pointee).copied()
    }

    pub(crate) fn pop_pending_glue(&mut self) -> Option<(Idx, FuncId)> {
        self.pending_glue.pop()
    }

    pub fn has_pending_glue(&self) -> bool {
        !self.pending_glue.is_empty()
    }
}
