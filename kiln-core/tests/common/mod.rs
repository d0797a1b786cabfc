use std::cell::RefCell;
use std::rc::Rc;

use kiln_core::ast::{Expr, ModuleNode, Param, Stmt, StmtKind};
use kiln_core::context::Context;
use kiln_core::diagnostic::Diagnostics;
use kiln_core::error::{CompileError, StageError};
use kiln_core::parser::PreparsedModules;
use kiln_core::pipeline::{PassProvider, Passthrough, PipelineValue, StageId, Transform};
use kiln_core::span::{FileId, Span};
use kiln_core::CompileOptions;

/// Position in the unit under test.
#[allow(dead_code)]
pub fn at(line: u32) -> Span {
    Span::new(FileId(1), line, 0)
}

#[allow(dead_code)]
pub fn expr_stmt(expr: Expr, line: u32) -> Stmt {
    Stmt::new(StmtKind::Expr(expr), at(line))
}

#[allow(dead_code)]
pub fn assign(target: &str, value: Expr, line: u32) -> Stmt {
    Stmt::new(
        StmtKind::Assign {
            target: target.to_string(),
            value,
        },
        at(line),
    )
}

#[allow(dead_code)]
pub fn func_decl(name: &str, arity: usize, is_extern: bool, line: u32) -> Stmt {
    Stmt::new(
        StmtKind::FuncDecl {
            name: name.to_string(),
            params: (0..arity).map(|i| Param::new(format!("a{i}"))).collect(),
            is_extern,
        },
        at(line),
    )
}

#[allow(dead_code)]
pub fn func_def(name: &str, arity: usize, body: Vec<Stmt>, line: u32) -> Stmt {
    Stmt::new(
        StmtKind::FuncDef {
            name: name.to_string(),
            params: (0..arity).map(|i| Param::new(format!("a{i}"))).collect(),
            body,
        },
        at(line),
    )
}

/// `kiln.a.b...` as an attribute chain.
#[allow(dead_code)]
pub fn kiln(path: &[&str], line: u32) -> Expr {
    path.iter()
        .fold(Expr::name("kiln", at(line)), |base, part| Expr::attr(base, *part))
}

#[allow(dead_code)]
pub fn context(options: CompileOptions, trees: PreparsedModules) -> Context {
    Context::new(options, Box::new(trees)).expect("context")
}

#[allow(dead_code)]
pub fn single_module(name: &str, body: Vec<Stmt>) -> PreparsedModules {
    PreparsedModules::new().with(name, ModuleNode::new(body))
}

/// Records every external stage it runs and fails at one of them.
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct RecordingPasses {
    pub log: Rc<RefCell<Vec<StageId>>>,
    pub fail_at: Option<StageId>,
}

#[allow(dead_code)]
#[derive(Debug)]
struct Recording {
    id: StageId,
    log: Rc<RefCell<Vec<StageId>>>,
    fail: bool,
}

impl Transform for Recording {
    fn id(&self) -> StageId {
        self.id
    }

    fn apply(
        &self,
        ctx: &mut Context,
        diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        self.log.borrow_mut().push(self.id);
        if self.fail {
            return Err(CompileError::at(at(1), format!("{} rejected the unit", self.id)).into());
        }
        Passthrough(self.id).apply(ctx, diag, data)
    }
}

impl PassProvider for RecordingPasses {
    fn provide(&self, id: StageId) -> Option<Box<dyn Transform>> {
        Some(Box::new(Recording {
            id,
            log: Rc::clone(&self.log),
            fail: self.fail_at == Some(id),
        }))
    }
}
