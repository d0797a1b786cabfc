//! Stages implemented inside the core.

use super::fold::fold_expr;
use super::{CompilationHandle, DeclarationUnit, PipelineValue, StageId, Transform};
use crate::ast::{BuiltinRef, Expr, ExprKind, ImportedDeclarations, Stmt, StmtKind};
use crate::builtins::{BUILTIN_MODULE, BuiltinScope};
use crate::config::is_known_directive;
use crate::context::Context;
use crate::diagnostic::Diagnostics;
use crate::error::{CompileError, InternalError, StageError};
use crate::utility::UtilityId;

/// The in-core implementation of `id`, if it has one.
pub fn builtin(id: StageId) -> Option<Box<dyn Transform>> {
    let stage: Box<dyn Transform> = match id {
        StageId::Parse => Box::new(Parse { declaration: false }),
        StageId::ParseDeclaration => Box::new(Parse { declaration: true }),
        StageId::NormalizeTree => Box::new(NormalizeTree),
        StageId::DeclarationPostParse => Box::new(DeclarationPostParse),
        StageId::InterpretCompilerDirectives => Box::new(InterpretCompilerDirectives),
        StageId::AlignFunctionDefinitions => Box::new(AlignFunctionDefinitions),
        StageId::ConstantFolding => Box::new(ConstantFolding),
        StageId::AnalyseDeclarations => Box::new(AnalyseDeclarations),
        StageId::CheckDeclarations => Box::new(CheckDeclarations),
        StageId::TreeAssertions => Box::new(TreeAssertions),
        StageId::InjectDeclarations => Box::new(InjectDeclarations),
        StageId::InjectUtilityCode => Box::new(InjectUtilityCode),
        StageId::AbortOnErrors => Box::new(AbortOnErrors),
        StageId::GenerateCode => Box::new(GenerateCode),
        StageId::ExtractDeclarations => Box::new(ExtractDeclarations),
        _ => return None,
    };
    Some(stage)
}

fn unit(data: &mut PipelineValue, stage: StageId) -> Result<&mut CompilationHandle, InternalError> {
    let kind = data.kind();
    data.as_unit_mut()
        .ok_or_else(|| InternalError::new(format!("{stage} expects a compilation unit, got {kind}")))
}

/// Stop the run if this stage reported errors of its own. The pipeline
/// then ends with the first of them.
fn abort_if_reported(diag: &Diagnostics, before: usize, stage: StageId) -> Result<(), StageError> {
    let reported = diag.error_count() - before;
    if reported > 0 {
        return Err(InternalError::new(format!("{stage} reported {reported} error(s)")).into());
    }
    Ok(())
}

#[derive(Debug)]
pub struct Parse {
    declaration: bool,
}

impl Transform for Parse {
    fn id(&self) -> StageId {
        if self.declaration {
            StageId::ParseDeclaration
        } else {
            StageId::Parse
        }
    }

    fn apply(
        &self,
        ctx: &mut Context,
        diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let kind = data.kind();
        let PipelineValue::Source(input) = data else {
            return Err(
                InternalError::new(format!("{} expects a source, got {kind}", self.id())).into(),
            );
        };
        let baseline = diag.error_count();
        let tree = ctx
            .parser()
            .parse(&input.source, &input.module_name, self.declaration, diag)?;
        tracing::debug!(
            module = %input.module_name,
            file = %input.source.display_name(),
            statements = tree.body.len(),
            "parsed unit"
        );
        let mut handle = CompilationHandle::new(
            tree,
            input.module_name.clone(),
            input.source.clone(),
            self.declaration,
        );
        handle.error_baseline = baseline;
        *data = PipelineValue::Unit(handle);
        Ok(())
    }
}

/// Splice nested statement blocks into their parent body.
#[derive(Debug)]
pub struct NormalizeTree;

fn flatten(body: Vec<Stmt>) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(body.len());
    for stmt in body {
        match stmt.kind {
            StmtKind::Block(inner) => out.extend(flatten(inner)),
            StmtKind::FuncDef { name, params, body } => out.push(Stmt::new(
                StmtKind::FuncDef {
                    name,
                    params,
                    body: flatten(body),
                },
                stmt.span,
            )),
            kind => out.push(Stmt::new(kind, stmt.span)),
        }
    }
    out
}

impl Transform for NormalizeTree {
    fn id(&self) -> StageId {
        StageId::NormalizeTree
    }

    fn apply(
        &self,
        _ctx: &mut Context,
        _diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        let body = std::mem::take(&mut handle.tree.body);
        handle.tree.body = flatten(body);
        Ok(())
    }
}

/// Declaration files hold declarations only.
#[derive(Debug)]
pub struct DeclarationPostParse;

impl Transform for DeclarationPostParse {
    fn id(&self) -> StageId {
        StageId::DeclarationPostParse
    }

    fn apply(
        &self,
        _ctx: &mut Context,
        diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        let before = diag.error_count();
        for stmt in &handle.tree.body {
            match &stmt.kind {
                StmtKind::FuncDef { name, .. } => diag.error(
                    Some(stmt.span),
                    format!("function definition '{name}' not allowed in a declaration file"),
                ),
                StmtKind::Expr(_) | StmtKind::Assign { .. } => diag.error(
                    Some(stmt.span),
                    "executable statement not allowed in a declaration file",
                ),
                _ => {}
            }
        }
        abort_if_reported(diag, before, self.id())
    }
}

/// Merge configured and in-source directives into the handle.
#[derive(Debug)]
pub struct InterpretCompilerDirectives;

impl Transform for InterpretCompilerDirectives {
    fn id(&self) -> StageId {
        StageId::InterpretCompilerDirectives
    }

    fn apply(
        &self,
        ctx: &mut Context,
        diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        let before = diag.error_count();

        for (name, value) in &ctx.options().directives {
            if is_known_directive(name) {
                handle.directives.insert(name.clone(), *value);
            } else {
                diag.error(
                    Some(handle.source.start()),
                    format!("unknown compiler directive '{name}' in configuration"),
                );
            }
        }

        handle.tree.body.retain(|stmt| {
            let StmtKind::Directive { name, value } = &stmt.kind else {
                return true;
            };
            if is_known_directive(name) {
                handle.directives.insert(name.clone(), *value);
            } else {
                diag.error(Some(stmt.span), format!("unknown compiler directive '{name}'"));
            }
            false
        });

        abort_if_reported(diag, before, self.id())
    }
}

/// Legacy dialect: a definition must agree with its loaded declaration.
#[derive(Debug)]
pub struct AlignFunctionDefinitions;

impl Transform for AlignFunctionDefinitions {
    fn id(&self) -> StageId {
        StageId::AlignFunctionDefinitions
    }

    fn apply(
        &self,
        ctx: &mut Context,
        _diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        let Some(declared) = ctx.declaration_unit(&handle.module_name) else {
            return Ok(());
        };
        for (name, arity, span) in handle.tree.defined_functions() {
            let Some(decl) = declared.function(name) else {
                continue;
            };
            if decl.arity != arity {
                return Err(CompileError::at(
                    span,
                    format!(
                        "function '{name}' takes {arity} argument(s) but is declared with {}",
                        decl.arity
                    ),
                )
                .into());
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ConstantFolding;

impl Transform for ConstantFolding {
    fn id(&self) -> StageId {
        StageId::ConstantFolding
    }

    fn apply(
        &self,
        _ctx: &mut Context,
        _diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        for stmt in &mut handle.tree.body {
            stmt.exprs_mut(&mut |expr: &mut Expr| expr.walk_mut(&mut fold_expr))?;
        }
        Ok(())
    }
}

/// Resolve `kiln.X` references against the builtin namespace.
#[derive(Debug)]
pub struct AnalyseDeclarations;

impl Transform for AnalyseDeclarations {
    fn id(&self) -> StageId {
        StageId::AnalyseDeclarations
    }

    fn apply(
        &self,
        ctx: &mut Context,
        diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        let before = diag.error_count();
        let builtins = ctx.builtins();
        let mut refs = Vec::new();

        for stmt in &mut handle.tree.body {
            stmt.exprs_mut(&mut |expr: &mut Expr| -> Result<(), StageError> {
                resolve_builtins(expr, builtins, diag, &mut refs);
                Ok(())
            })?;
        }
        for id in refs {
            handle.reference_utility(id);
        }
        abort_if_reported(diag, before, self.id())
    }
}

fn resolve_builtins(
    expr: &mut Expr,
    builtins: &BuiltinScope,
    diag: &mut Diagnostics,
    refs: &mut Vec<UtilityId>,
) {
    if let Some(path) = expr.dotted_path() {
        if path.len() > 1 && path[0] == BUILTIN_MODULE {
            let path: Vec<String> = path[1..].iter().map(|part| part.to_string()).collect();
            let parts: Vec<&str> = path.iter().map(String::as_str).collect();
            match builtins.resolve_path(&parts, expr.span) {
                Ok(entry) => {
                    if let Some(id) = entry.utility {
                        refs.push(id);
                    }
                    tracing::trace!(path = ?parts, cname = %entry.cname, "resolved builtin");
                    expr.kind = ExprKind::Builtin(BuiltinRef {
                        cname: entry.cname.clone(),
                        utility: entry.utility,
                        path,
                    });
                }
                Err(err) => diag.report(&CompileError::from(err)),
            }
        }
        return;
    }
    match &mut expr.kind {
        ExprKind::Attribute { base, .. } => resolve_builtins(base, builtins, diag, refs),
        ExprKind::Call { func, args } => {
            resolve_builtins(func, builtins, diag, refs);
            for arg in args {
                resolve_builtins(arg, builtins, diag, refs);
            }
        }
        ExprKind::Number(_) | ExprKind::Name(_) | ExprKind::Builtin(_) => {}
    }
}

/// Every non-extern declaration needs a definition in the same unit.
#[derive(Debug)]
pub struct CheckDeclarations;

impl Transform for CheckDeclarations {
    fn id(&self) -> StageId {
        StageId::CheckDeclarations
    }

    fn apply(
        &self,
        _ctx: &mut Context,
        diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        let before = diag.error_count();
        let defined = handle.tree.defined_functions();
        for stmt in &handle.tree.body {
            if let StmtKind::FuncDecl {
                name,
                is_extern: false,
                ..
            } = &stmt.kind
            {
                if !defined.iter().any(|(def, _, _)| *def == name.as_str()) {
                    diag.error(
                        Some(stmt.span),
                        format!("function '{name}' declared but not defined"),
                    );
                }
            }
        }
        abort_if_reported(diag, before, self.id())
    }
}

/// Post-analysis invariants. A violation is a compiler bug.
#[derive(Debug)]
pub struct TreeAssertions;

fn assert_tree(body: &[Stmt]) -> Result<(), InternalError> {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Block(_) => {
                return Err(InternalError::new(format!(
                    "nested block survived normalization at {}",
                    stmt.span
                )));
            }
            StmtKind::FuncDef { body, .. } => assert_tree(body)?,
            _ => {}
        }
        let mut unresolved = None;
        stmt.exprs(&mut |expr: &Expr| {
            expr.walk(&mut |sub: &Expr| {
                if unresolved.is_none()
                    && sub
                        .dotted_path()
                        .is_some_and(|path| path.len() > 1 && path[0] == BUILTIN_MODULE)
                {
                    unresolved = Some(sub.span);
                }
            })
        });
        if let Some(span) = unresolved {
            return Err(InternalError::new(format!(
                "unresolved builtin reference at {span}"
            )));
        }
    }
    Ok(())
}

impl Transform for TreeAssertions {
    fn id(&self) -> StageId {
        StageId::TreeAssertions
    }

    fn apply(
        &self,
        _ctx: &mut Context,
        _diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        assert_tree(&handle.tree.body)?;
        Ok(())
    }
}

/// Merge loaded declaration units into the module, once each.
#[derive(Debug)]
pub struct InjectDeclarations;

impl Transform for InjectDeclarations {
    fn id(&self) -> StageId {
        StageId::InjectDeclarations
    }

    fn apply(
        &self,
        ctx: &mut Context,
        _diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        for decls in ctx.declarations() {
            if handle.tree.has_imported(&decls.module_name) {
                continue;
            }
            let mut refs = Vec::new();
            for stmt in &decls.body {
                stmt.exprs(&mut |expr: &Expr| {
                    expr.walk(&mut |sub: &Expr| {
                        if let ExprKind::Builtin(BuiltinRef {
                            utility: Some(id), ..
                        }) = &sub.kind
                        {
                            refs.push(*id);
                        }
                    })
                });
            }
            for id in refs {
                handle.reference_utility(id);
            }
            tracing::debug!(module = %handle.module_name, from = %decls.module_name, "injected declarations");
            handle.tree.imported.push(ImportedDeclarations {
                module: decls.module_name.clone(),
                body: decls.body.clone(),
            });
        }
        Ok(())
    }
}

/// Materialize every referenced template into the module.
#[derive(Debug)]
pub struct InjectUtilityCode;

impl Transform for InjectUtilityCode {
    fn id(&self) -> StageId {
        StageId::InjectUtilityCode
    }

    fn apply(
        &self,
        ctx: &mut Context,
        _diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        let registry = ctx.builtins().utilities();
        for id in &handle.utility_refs {
            registry.materialize(*id, &mut handle.tree.utility)?;
        }
        Ok(())
    }
}

/// Stop before emission if errors were reported against this unit.
#[derive(Debug)]
pub struct AbortOnErrors;

impl Transform for AbortOnErrors {
    fn id(&self) -> StageId {
        StageId::AbortOnErrors
    }

    fn apply(
        &self,
        _ctx: &mut Context,
        diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        let reported = handle.errors_reported(diag);
        if reported > 0 {
            return Err(InternalError::new(format!("aborting after {reported} error(s)")).into());
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct GenerateCode;

impl Transform for GenerateCode {
    fn id(&self) -> StageId {
        StageId::GenerateCode
    }

    fn apply(
        &self,
        ctx: &mut Context,
        _diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        let result = ctx.codegen().generate(handle, ctx.builtins())?;
        tracing::debug!(
            module = %result.module_name,
            bytes = result.code.len(),
            utilities = result.utilities.len(),
            "generated code"
        );
        *data = PipelineValue::Emitted(result);
        Ok(())
    }
}

/// Turn a declaration unit into reusable declarations held by the context.
#[derive(Debug)]
pub struct ExtractDeclarations;

impl Transform for ExtractDeclarations {
    fn id(&self) -> StageId {
        StageId::ExtractDeclarations
    }

    fn apply(
        &self,
        ctx: &mut Context,
        _diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError> {
        let handle = unit(data, self.id())?;
        if !handle.is_declaration() {
            return Err(InternalError::new(format!(
                "{} run on implementation unit '{}'",
                self.id(),
                handle.module_name
            ))
            .into());
        }
        let declarations = DeclarationUnit::from_handle(handle);
        ctx.add_declarations(declarations.clone());
        *data = PipelineValue::Declaration(declarations);
        Ok(())
    }
}
