//! Syntax tree threaded through the pipeline.
//!
//! The parser collaborator builds it; every stage rewrites it in place.
//! Only the node kinds the in-core stages inspect are modelled
//! explicitly.

use crate::span::Span;
use crate::utility::{UtilityId, UtilitySink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Number(i64),
    Name(String),
    Attribute { base: Box<Expr>, attr: String },
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// A name resolved into the builtin namespace.
    Builtin(BuiltinRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinRef {
    /// Dotted path below the namespace root, e.g. `["view", "contig"]`.
    pub path: Vec<String>,
    pub cname: String,
    pub utility: Option<UtilityId>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    pub fn number(value: i64, span: Span) -> Self {
        Expr::new(ExprKind::Number(value), span)
    }

    pub fn name(name: impl Into<String>, span: Span) -> Self {
        Expr::new(ExprKind::Name(name.into()), span)
    }

    pub fn attr(base: Expr, attr: impl Into<String>) -> Self {
        let span = base.span;
        Expr::new(
            ExprKind::Attribute {
                base: Box::new(base),
                attr: attr.into(),
            },
            span,
        )
    }

    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        let span = func.span;
        Expr::new(
            ExprKind::Call {
                func: Box::new(func),
                args,
            },
            span,
        )
    }

    /// Call of a plain name, as operators are represented.
    pub fn op(name: &str, args: Vec<Expr>, span: Span) -> Self {
        Expr::call(Expr::name(name, span), args)
    }

    pub fn as_number(&self) -> Option<i64> {
        match self.kind {
            ExprKind::Number(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_call(&self, name: &str) -> bool {
        matches!(&self.kind, ExprKind::Call { func, .. }
            if matches!(&func.kind, ExprKind::Name(n) if n == name))
    }

    /// `a.b.c` as `["a", "b", "c"]`, if the expression is a plain dotted name.
    pub fn dotted_path(&self) -> Option<Vec<&str>> {
        match &self.kind {
            ExprKind::Name(name) => Some(vec![name.as_str()]),
            ExprKind::Attribute { base, attr } => {
                let mut path = base.dotted_path()?;
                path.push(attr.as_str());
                Some(path)
            }
            _ => None,
        }
    }

    /// Visit this expression and all its subexpressions, children first.
    pub fn walk_mut<E>(&mut self, f: &mut impl FnMut(&mut Expr) -> Result<(), E>) -> Result<(), E> {
        match &mut self.kind {
            ExprKind::Attribute { base, .. } => base.walk_mut(&mut *f)?,
            ExprKind::Call { func, args } => {
                func.walk_mut(&mut *f)?;
                for arg in args {
                    arg.walk_mut(&mut *f)?;
                }
            }
            ExprKind::Number(_) | ExprKind::Name(_) | ExprKind::Builtin(_) => {}
        }
        f(self)
    }

    pub fn walk(&self, f: &mut impl FnMut(&Expr)) {
        match &self.kind {
            ExprKind::Attribute { base, .. } => base.walk(&mut *f),
            ExprKind::Call { func, args } => {
                func.walk(&mut *f);
                for arg in args {
                    arg.walk(&mut *f);
                }
            }
            ExprKind::Number(_) | ExprKind::Name(_) | ExprKind::Builtin(_) => {}
        }
        f(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Option<Expr>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            ty: None,
        }
    }

    pub fn typed(name: impl Into<String>, ty: Expr) -> Self {
        Param {
            name: name.into(),
            ty: Some(ty),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Expr(Expr),
    Assign { target: String, value: Expr },
    /// Function signature without a body.
    FuncDecl {
        name: String,
        params: Vec<Param>,
        is_extern: bool,
    },
    FuncDef {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    VarDecl { name: String, ty: Expr },
    /// In-source compiler directive, e.g. `# kiln: boundscheck=False`.
    Directive { name: String, value: bool },
    Block(Vec<Stmt>),
    Pass,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }

    /// True for statements that only declare names.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::FuncDecl { .. }
                | StmtKind::VarDecl { .. }
                | StmtKind::Directive { .. }
                | StmtKind::Pass
        )
    }

    /// Visit every expression owned by this statement or nested statements.
    pub fn exprs_mut<E>(&mut self, f: &mut impl FnMut(&mut Expr) -> Result<(), E>) -> Result<(), E> {
        match &mut self.kind {
            StmtKind::Expr(expr) | StmtKind::Assign { value: expr, .. } => f(expr),
            StmtKind::VarDecl { ty, .. } => f(ty),
            StmtKind::FuncDecl { params, .. } => params_exprs_mut(params, f),
            StmtKind::FuncDef { params, body, .. } => {
                params_exprs_mut(params, &mut *f)?;
                body_exprs_mut(body, f)
            }
            StmtKind::Block(body) => body_exprs_mut(body, f),
            StmtKind::Directive { .. } | StmtKind::Pass => Ok(()),
        }
    }

    pub fn exprs(&self, f: &mut impl FnMut(&Expr)) {
        match &self.kind {
            StmtKind::Expr(expr) | StmtKind::Assign { value: expr, .. } => f(expr),
            StmtKind::VarDecl { ty, .. } => f(ty),
            StmtKind::FuncDecl { params, .. } => {
                for ty in params.iter().filter_map(|p| p.ty.as_ref()) {
                    f(ty);
                }
            }
            StmtKind::FuncDef { params, body, .. } => {
                for ty in params.iter().filter_map(|p| p.ty.as_ref()) {
                    f(ty);
                }
                for stmt in body {
                    stmt.exprs(&mut *f);
                }
            }
            StmtKind::Block(body) => {
                for stmt in body {
                    stmt.exprs(&mut *f);
                }
            }
            StmtKind::Directive { .. } | StmtKind::Pass => {}
        }
    }
}

fn body_exprs_mut<E>(
    body: &mut [Stmt],
    f: &mut impl FnMut(&mut Expr) -> Result<(), E>,
) -> Result<(), E> {
    for stmt in body {
        stmt.exprs_mut(&mut *f)?;
    }
    Ok(())
}

fn params_exprs_mut<E>(
    params: &mut [Param],
    f: &mut impl FnMut(&mut Expr) -> Result<(), E>,
) -> Result<(), E> {
    params
        .iter_mut()
        .filter_map(|p| p.ty.as_mut())
        .try_for_each(|ty| f(ty))
}

/// Declarations merged in from a loaded declaration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedDeclarations {
    pub module: String,
    pub body: Vec<Stmt>,
}

/// Root of one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct ModuleNode {
    pub body: Vec<Stmt>,
    pub imported: Vec<ImportedDeclarations>,
    /// Utility code materialized for this module.
    pub utility: UtilitySink,
}

impl ModuleNode {
    pub fn new(body: Vec<Stmt>) -> Self {
        ModuleNode {
            body,
            ..Self::default()
        }
    }

    pub fn has_imported(&self, module: &str) -> bool {
        self.imported.iter().any(|decls| decls.module == module)
    }

    /// Names of all functions defined with a body, at any nesting depth.
    pub fn defined_functions(&self) -> Vec<(&str, usize, Span)> {
        let mut out = Vec::new();
        collect_defs(&self.body, &mut out);
        out
    }
}

fn collect_defs<'a>(body: &'a [Stmt], out: &mut Vec<(&'a str, usize, Span)>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::FuncDef { name, params, body } => {
                out.push((name.as_str(), params.len(), stmt.span));
                collect_defs(body, out);
            }
            StmtKind::Block(inner) => collect_defs(inner, out),
            _ => {}
        }
    }
}
