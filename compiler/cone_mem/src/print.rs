//! Textual dump of memory IR, for tracing output and test assertions.
//!
//! ```text
//! fn make(%0: int) -> rc Point {
//! entry:
//!   %1 = call @malloc(24usize)
//!   store usize 1usize, %1
//!   %2 = offset %1, 8
//!   %3 = cast %2 to rc Point
//!   ...
//! }
//! ```

use std::fmt::{self, Write as _};

use cone_types::{Idx, Pool};

use crate::ir::{Const, MemFunction, MemInstr, MemTerminator, Operand};
use crate::MemModule;

pub struct FunctionDisplay<'a> {
    func: &'a MemFunction,
    module: &'a MemModule,
    pool: &'a Pool,
}

pub struct ModuleDisplay<'a> {
    module: &'a MemModule,
    pool: &'a Pool,
}

impl MemFunction {
    pub fn display<'a>(&'a self, module: &'a MemModule, pool: &'a Pool) -> FunctionDisplay<'a> {
        FunctionDisplay {
            func: self,
            module,
            pool,
        }
    }
}

impl MemModule {
    pub fn display<'a>(&'a self, pool: &'a Pool) -> ModuleDisplay<'a> {
        ModuleDisplay { module: self, pool }
    }
}

impl fmt::Display for ModuleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.module.name())?;
        for decl in self.module.externs() {
            let params: Vec<String> = decl.params.iter().map(|&p| self.pool.display(p)).collect();
            writeln!(
                f,
                "declare @{}({}) -> {}",
                decl.name,
                params.join(", "),
                self.pool.display(decl.ret)
            )?;
        }
        for (_, func) in self.module.functions() {
            writeln!(f)?;
            write!(f, "{}", func.display(self.module, self.pool))?;
        }
        Ok(())
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.func;
        let params: Vec<String> = func
            .params
            .iter()
            .map(|&p| format!("%{}: {}", p.raw(), self.ty(func.value_type(p))))
            .collect();
        write!(
            f,
            "fn {}({}) -> {}",
            func.name,
            params.join(", "),
            self.ty(func.return_type)
        )?;
        if func.is_declaration() {
            return writeln!(f, ";");
        }
        writeln!(f, " {{")?;
        for (i, block) in func.blocks.iter().enumerate() {
            writeln!(f, "{}:", self.block_label(i))?;
            for instr in &block.body {
                writeln!(f, "  {}", self.instr(instr))?;
            }
            match &block.terminator {
                Some(term) => writeln!(f, "  {}", self.terminator(term))?,
                None => writeln!(f, "  <unterminated>")?,
            }
        }
        writeln!(f, "}}")
    }
}

impl FunctionDisplay<'_> {
    fn ty(&self, ty: Idx) -> String {
        self.pool.display(ty)
    }

    fn block_label(&self, index: usize) -> String {
        let label = &self.func.blocks[index].label;
        if index == 0 {
            label.clone()
        } else {
            format!("{label}.{index}")
        }
    }

    fn operand(&self, operand: Operand) -> String {
        match operand {
            Operand::Value(v) => format!("%{}", v.raw()),
            Operand::Const(c) => match c {
                Const::Int(v) => v.to_string(),
                Const::I32(v) => format!("{v}i32"),
                Const::Float(bits) => format!("{:?}", f64::from_bits(bits)),
                Const::Bool(v) => v.to_string(),
                Const::Byte(v) => format!("{v}u8"),
                Const::Usize(v) => format!("{v}usize"),
                Const::Unit => "()".to_owned(),
                Const::Null => "null".to_owned(),
            },
        }
    }

    fn args(&self, args: &[Operand]) -> String {
        let args: Vec<String> = args.iter().map(|&a| self.operand(a)).collect();
        args.join(", ")
    }

    fn instr(&self, instr: &MemInstr) -> String {
        let mut out = String::new();
        if let Some(dst) = instr.dst() {
            let _ = write!(out, "%{} = ", dst.raw());
        }
        let _ = match instr {
            MemInstr::Alloca { ty, name, .. } => {
                write!(out, "alloca {} \"{}\"", self.ty(*ty), self.pool.lookup(*name))
            }
            MemInstr::Load { ty, ptr, .. } => write!(out, "load {}, {}", self.ty(*ty), self.operand(*ptr)),
            MemInstr::Store { ty, value, ptr } => write!(
                out,
                "store {} {}, {}",
                self.ty(*ty),
                self.operand(*value),
                self.operand(*ptr)
            ),
            MemInstr::FieldAddr {
                base,
                record,
                field,
                offset,
                ..
            } => {
                let name = self
                    .pool
                    .record_fields(*record)
                    .get(*field as usize)
                    .map_or("?", |f| self.pool.lookup(f.name));
                write!(
                    out,
                    "fieldaddr {}, {}.{} (+{})",
                    self.operand(*base),
                    self.ty(*record),
                    name,
                    offset
                )
            }
            MemInstr::Offset { base, bytes, .. } => {
                write!(out, "offset {}, {}", self.operand(*base), bytes)
            }
            MemInstr::Cast { ty, value, .. } => {
                write!(out, "cast {} to {}", self.operand(*value), self.ty(*ty))
            }
            MemInstr::Add { ty, lhs, rhs, .. } => write!(
                out,
                "add {} {}, {}",
                self.ty(*ty),
                self.operand(*lhs),
                self.operand(*rhs)
            ),
            MemInstr::Cmp {
                pred, ty, lhs, rhs, ..
            } => write!(
                out,
                "cmp {} {} {}, {}",
                pred.as_str(),
                self.ty(*ty),
                self.operand(*lhs),
                self.operand(*rhs)
            ),
            MemInstr::CallExtern { callee, args, .. } => write!(
                out,
                "call @{}({})",
                self.module.extern_decl(*callee).name,
                self.args(args)
            ),
            MemInstr::Call { callee, args, .. } => write!(
                out,
                "call {}({})",
                self.module.function(*callee).name,
                self.args(args)
            ),
        };
        out
    }

    fn terminator(&self, term: &MemTerminator) -> String {
        match term {
            MemTerminator::Jump(target) => format!("jmp {}", self.block_label(target.index())),
            MemTerminator::Branch {
                cond,
                then_block,
                else_block,
            } => format!(
                "br {}, {}, {}",
                self.operand(*cond),
                self.block_label(then_block.index()),
                self.block_label(else_block.index())
            ),
            MemTerminator::Return(None) => "ret".to_owned(),
            MemTerminator::Return(Some(value)) => format!("ret {}", self.operand(*value)),
            MemTerminator::Trap(kind) => format!("trap {}", kind.as_str()),
        }
    }
}
