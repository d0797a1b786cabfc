//! The code generation seam and a plain-text emitter.
//!
//! Native code emission is owned by a back end implementing
//! [`CodeGenerator`]. [`TextEmitter`] renders a readable C-like listing;
//! it is what a context uses when no back end is supplied.

use std::fmt;

use crate::ast::{Expr, ExprKind, Param, Stmt, StmtKind};
use crate::builtins::BuiltinScope;
use crate::error::CompileError;
use crate::pipeline::{CompilationHandle, EmissionResult};

pub trait CodeGenerator: fmt::Debug {
    /// Emit the finished unit. The module's utility sink already holds
    /// every referenced template, deduplicated and in reference order.
    fn generate(
        &self,
        unit: &CompilationHandle,
        builtins: &BuiltinScope,
    ) -> Result<EmissionResult, CompileError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextEmitter;

impl CodeGenerator for TextEmitter {
    fn generate(
        &self,
        unit: &CompilationHandle,
        _builtins: &BuiltinScope,
    ) -> Result<EmissionResult, CompileError> {
        let mut out = format!("/* module {} */\n", unit.module_name);
        for (name, value) in &unit.directives {
            out.push_str(&format!("/* directive {name}={value} */\n"));
        }

        for fragment in unit.tree.utility.fragments() {
            out.push_str(&format!("\n/* utility: {} */\n", fragment.name));
            out.push_str(&fragment.code);
        }

        for imported in &unit.tree.imported {
            out.push_str(&format!("\n/* declarations from {} */\n", imported.module));
            for stmt in &imported.body {
                emit_stmt(&mut out, stmt, 0);
            }
        }

        out.push('\n');
        for stmt in &unit.tree.body {
            emit_stmt(&mut out, stmt, 0);
        }

        Ok(EmissionResult {
            module_name: unit.module_name.clone(),
            code: out,
            utilities: unit.tree.utility.fragments().iter().map(|f| f.id).collect(),
        })
    }
}

fn emit_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    let indent = "    ".repeat(depth);
    match &stmt.kind {
        StmtKind::Expr(expr) => out.push_str(&format!("{indent}{};\n", render(expr))),
        StmtKind::Assign { target, value } => {
            out.push_str(&format!("{indent}{target} = {};\n", render(value)))
        }
        StmtKind::FuncDecl {
            name,
            params,
            is_extern,
        } => {
            let storage = if *is_extern { "extern " } else { "" };
            out.push_str(&format!(
                "{indent}{storage}kiln_object *{name}({});\n",
                render_params(params)
            ));
        }
        StmtKind::FuncDef { name, params, body } => {
            out.push_str(&format!(
                "{indent}kiln_object *{name}({}) {{\n",
                render_params(params)
            ));
            for inner in body {
                emit_stmt(out, inner, depth + 1);
            }
            out.push_str(&format!("{indent}}}\n"));
        }
        StmtKind::VarDecl { name, ty } => {
            out.push_str(&format!("{indent}{} {name};\n", render(ty)))
        }
        StmtKind::Directive { name, value } => {
            out.push_str(&format!("{indent}/* directive {name}={value} */\n"))
        }
        StmtKind::Block(body) => {
            for inner in body {
                emit_stmt(out, inner, depth);
            }
        }
        StmtKind::Pass => {}
    }
}

fn render_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|param| match &param.ty {
            Some(ty) => format!("{} {}", render(ty), param.name),
            None => format!("kiln_object *{}", param.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Number(value) => value.to_string(),
        ExprKind::Name(name) => name.clone(),
        ExprKind::Attribute { base, attr } => format!("{}.{attr}", render(base)),
        ExprKind::Call { func, args } => {
            let args: Vec<_> = args.iter().map(render).collect();
            format!("{}({})", render(func), args.join(", "))
        }
        ExprKind::Builtin(builtin) => builtin.cname.clone(),
    }
}
