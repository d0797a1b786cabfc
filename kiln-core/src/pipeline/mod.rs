//! The stage pipeline that carries a unit from parse tree to emitted code.
//!
//! A [`Pipeline`] is a fixed, mode-dependent list of [`Stage`]s. Stages a
//! mode does not need stay in the list as [`Stage::Skip`] markers so that
//! positions are identical across modes. [`run_pipeline`] threads a
//! [`PipelineValue`] through the list and applies the error protocol:
//!
//!   - a [`CompileError`] is reported and stops the run;
//!   - an [`InternalError`] is returned to the caller, unless an error was
//!     already reported, in which case it is taken as a consequence of that
//!     error and the run ends with the first reported error instead.

mod fold;
pub mod stages;
pub mod transforms;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

pub use transforms::{DefaultPasses, PassProvider, Passthrough};

use crate::ast::{ModuleNode, Stmt, StmtKind};
use crate::config::CompileOptions;
use crate::context::Context;
use crate::diagnostic::Diagnostics;
use crate::error::{CompileError, InternalError, StageError};
use crate::span::{FileId, Span};
use crate::utility::UtilityId;

/// Identifier of every stage slot a pipeline can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Parse,
    ParseDeclaration,
    NormalizeTree,
    PostParse,
    DeclarationPostParse,
    InterpretCompilerDirectives,
    AlignFunctionDefinitions,
    ConstantFolding,
    FlattenInList,
    WithStatement,
    Decorators,
    AnalyseDeclarations,
    AutoTestDict,
    EmbedSignature,
    MarkAssignments,
    TransformBuiltinMethods,
    IntroduceBufferAuxiliaryVars,
    CheckDeclarations,
    AnalyseExpressions,
    OptimizeBuiltinCalls,
    IterationTransform,
    SwitchTransform,
    DropRefcounting,
    FinalOptimizePhase,
    GilCheck,
    TreeAssertions,
    InjectDeclarations,
    InjectUtilityCode,
    AbortOnErrors,
    GenerateCode,
    ExtractDeclarations,
}

impl StageId {
    pub const fn name(self) -> &'static str {
        match self {
            StageId::Parse => "Parse",
            StageId::ParseDeclaration => "ParseDeclaration",
            StageId::NormalizeTree => "NormalizeTree",
            StageId::PostParse => "PostParse",
            StageId::DeclarationPostParse => "DeclarationPostParse",
            StageId::InterpretCompilerDirectives => "InterpretCompilerDirectives",
            StageId::AlignFunctionDefinitions => "AlignFunctionDefinitions",
            StageId::ConstantFolding => "ConstantFolding",
            StageId::FlattenInList => "FlattenInList",
            StageId::WithStatement => "WithStatement",
            StageId::Decorators => "Decorators",
            StageId::AnalyseDeclarations => "AnalyseDeclarations",
            StageId::AutoTestDict => "AutoTestDict",
            StageId::EmbedSignature => "EmbedSignature",
            StageId::MarkAssignments => "MarkAssignments",
            StageId::TransformBuiltinMethods => "TransformBuiltinMethods",
            StageId::IntroduceBufferAuxiliaryVars => "IntroduceBufferAuxiliaryVars",
            StageId::CheckDeclarations => "CheckDeclarations",
            StageId::AnalyseExpressions => "AnalyseExpressions",
            StageId::OptimizeBuiltinCalls => "OptimizeBuiltinCalls",
            StageId::IterationTransform => "IterationTransform",
            StageId::SwitchTransform => "SwitchTransform",
            StageId::DropRefcounting => "DropRefcounting",
            StageId::FinalOptimizePhase => "FinalOptimizePhase",
            StageId::GilCheck => "GilCheck",
            StageId::TreeAssertions => "TreeAssertions",
            StageId::InjectDeclarations => "InjectDeclarations",
            StageId::InjectUtilityCode => "InjectUtilityCode",
            StageId::AbortOnErrors => "AbortOnErrors",
            StageId::GenerateCode => "GenerateCode",
            StageId::ExtractDeclarations => "ExtractDeclarations",
        }
    }

    /// Stages whose implementation comes from a [`PassProvider`].
    pub const fn is_external(self) -> bool {
        matches!(
            self,
            StageId::PostParse
                | StageId::FlattenInList
                | StageId::WithStatement
                | StageId::Decorators
                | StageId::AutoTestDict
                | StageId::EmbedSignature
                | StageId::MarkAssignments
                | StageId::TransformBuiltinMethods
                | StageId::IntroduceBufferAuxiliaryVars
                | StageId::AnalyseExpressions
                | StageId::OptimizeBuiltinCalls
                | StageId::IterationTransform
                | StageId::SwitchTransform
                | StageId::DropRefcounting
                | StageId::FinalOptimizePhase
                | StageId::GilCheck
        )
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One tree transformation.
///
/// A stage receives the context and the diagnostics handle explicitly and
/// rewrites the in-flight value in place. [`run_pipeline`] restores the
/// value a failing stage started from, so partial rewrites never escape.
pub trait Transform: fmt::Debug {
    fn id(&self) -> StageId;

    fn name(&self) -> &str {
        self.id().name()
    }

    fn apply(
        &self,
        ctx: &mut Context,
        diag: &mut Diagnostics,
        data: &mut PipelineValue,
    ) -> Result<(), StageError>;
}

#[derive(Debug)]
pub enum Stage {
    Run(Box<dyn Transform>),
    /// Keeps the slot of a stage the current mode does not run.
    Skip(StageId),
}

impl Stage {
    pub fn id(&self) -> StageId {
        match self {
            Stage::Run(transform) => transform.id(),
            Stage::Skip(id) => *id,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Stage::Skip(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineMode {
    /// Implementation files.
    Source,
    /// Declaration-only files (`*.kd`).
    Declaration,
    /// Implementation files of the legacy dialect.
    Legacy,
}

#[derive(Debug)]
pub struct Pipeline {
    mode: PipelineMode,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Assemble the full stage list for `mode`.
    pub fn build(mode: PipelineMode, options: &CompileOptions, passes: &dyn PassProvider) -> Self {
        let core = core_stages(mode, passes);
        let mut stages = Vec::with_capacity(core.len() + 6);
        match mode {
            PipelineMode::Declaration => {
                stages.push(stage(StageId::ParseDeclaration, passes));
                stages.extend(core);
                stages.push(stage(StageId::ExtractDeclarations, passes));
            }
            PipelineMode::Source | PipelineMode::Legacy => {
                stages.push(stage(StageId::Parse, passes));
                stages.extend(core);
                stages.push(enabled(
                    StageId::TreeAssertions,
                    options.evaluate_tree_assertions,
                    passes,
                ));
                stages.push(stage(StageId::InjectDeclarations, passes));
                stages.push(stage(StageId::InjectUtilityCode, passes));
                stages.push(stage(StageId::AbortOnErrors, passes));
                stages.push(stage(StageId::GenerateCode, passes));
            }
        }
        Pipeline { mode, stages }
    }

    /// A pipeline with a caller-chosen stage list.
    pub fn from_stages(mode: PipelineMode, stages: Vec<Stage>) -> Self {
        Pipeline { mode, stages }
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn ids(&self) -> Vec<StageId> {
        self.stages.iter().map(Stage::id).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// The mode-independent middle of every pipeline. Its length and slot
/// positions are the same for all modes.
pub fn core_stages(mode: PipelineMode, passes: &dyn PassProvider) -> Vec<Stage> {
    use StageId::*;

    let declaration = mode == PipelineMode::Declaration;
    vec![
        stage(NormalizeTree, passes),
        stage(PostParse, passes),
        enabled(DeclarationPostParse, declaration, passes),
        stage(InterpretCompilerDirectives, passes),
        enabled(AlignFunctionDefinitions, mode == PipelineMode::Legacy, passes),
        stage(ConstantFolding, passes),
        stage(FlattenInList, passes),
        stage(WithStatement, passes),
        stage(Decorators, passes),
        stage(AnalyseDeclarations, passes),
        stage(AutoTestDict, passes),
        stage(EmbedSignature, passes),
        stage(MarkAssignments, passes),
        stage(TransformBuiltinMethods, passes),
        stage(IntroduceBufferAuxiliaryVars, passes),
        enabled(CheckDeclarations, !declaration, passes),
        stage(AnalyseExpressions, passes),
        stage(OptimizeBuiltinCalls, passes),
        stage(IterationTransform, passes),
        stage(SwitchTransform, passes),
        stage(DropRefcounting, passes),
        stage(FinalOptimizePhase, passes),
        stage(GilCheck, passes),
    ]
}

fn stage(id: StageId, passes: &dyn PassProvider) -> Stage {
    let transform = if id.is_external() {
        passes.provide(id)
    } else {
        stages::builtin(id)
    };
    match transform {
        Some(transform) => Stage::Run(transform),
        None => Stage::Skip(id),
    }
}

fn enabled(id: StageId, on: bool, passes: &dyn PassProvider) -> Stage {
    if on { stage(id, passes) } else { Stage::Skip(id) }
}

// ---------------------------------------------------------------------
// Values threaded through the pipeline
// ---------------------------------------------------------------------

/// Where a unit's text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub file: FileId,
    pub path: Option<PathBuf>,
    pub text: String,
}

impl SourceDescriptor {
    pub fn start(&self) -> Span {
        Span::file_start(self.file)
    }

    pub fn display_name(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => format!("<string #{}>", self.file.0),
        }
    }
}

/// Input of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationSource {
    pub module_name: String,
    pub source: SourceDescriptor,
}

/// The in-flight tree plus what the stages learn about it.
#[derive(Debug, Clone)]
pub struct CompilationHandle {
    pub tree: ModuleNode,
    /// The module owning the tree.
    pub module_name: String,
    pub source: SourceDescriptor,
    is_declaration: bool,
    pub directives: BTreeMap<String, bool>,
    utility_refs: Vec<UtilityId>,
    referenced: HashSet<UtilityId>,
    /// Error count of the diagnostics handle when this unit was parsed.
    error_baseline: usize,
}

impl CompilationHandle {
    pub fn new(
        tree: ModuleNode,
        module_name: impl Into<String>,
        source: SourceDescriptor,
        is_declaration: bool,
    ) -> Self {
        CompilationHandle {
            tree,
            module_name: module_name.into(),
            source,
            is_declaration,
            directives: BTreeMap::new(),
            utility_refs: Vec::new(),
            referenced: HashSet::new(),
            error_baseline: 0,
        }
    }

    /// Fixed at parse time.
    pub fn is_declaration(&self) -> bool {
        self.is_declaration
    }

    pub fn directive(&self, name: &str) -> Option<bool> {
        self.directives.get(name).copied()
    }

    /// Record a template reference; repeats keep the first position.
    pub fn reference_utility(&mut self, id: UtilityId) {
        if self.referenced.insert(id) {
            self.utility_refs.push(id);
        }
    }

    /// Templates the tree references, in first-reference order.
    pub fn utility_refs(&self) -> &[UtilityId] {
        &self.utility_refs
    }

    pub fn references_utility(&self, id: UtilityId) -> bool {
        self.referenced.contains(&id)
    }

    /// Errors reported against this unit since it was parsed.
    pub fn errors_reported(&self, diag: &Diagnostics) -> usize {
        diag.error_count().saturating_sub(self.error_baseline)
    }
}

/// What code generation hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionResult {
    pub module_name: String,
    pub code: String,
    /// Templates merged into `code`, in emission order.
    pub utilities: Vec<UtilityId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredFunction {
    pub name: String,
    pub arity: usize,
    pub is_extern: bool,
    pub span: Span,
}

/// The declarations a declaration file contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationUnit {
    pub module_name: String,
    pub functions: Vec<DeclaredFunction>,
    pub body: Vec<Stmt>,
}

impl DeclarationUnit {
    pub fn from_handle(handle: &CompilationHandle) -> Self {
        let functions = handle
            .tree
            .body
            .iter()
            .filter_map(|stmt| match &stmt.kind {
                StmtKind::FuncDecl {
                    name,
                    params,
                    is_extern,
                } => Some(DeclaredFunction {
                    name: name.clone(),
                    arity: params.len(),
                    is_extern: *is_extern,
                    span: stmt.span,
                }),
                _ => None,
            })
            .collect();
        DeclarationUnit {
            module_name: handle.module_name.clone(),
            functions,
            body: handle.tree.body.clone(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&DeclaredFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub enum PipelineValue {
    Source(CompilationSource),
    Unit(CompilationHandle),
    Emitted(EmissionResult),
    Declaration(DeclarationUnit),
}

impl PipelineValue {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineValue::Source(_) => "source",
            PipelineValue::Unit(_) => "compilation unit",
            PipelineValue::Emitted(_) => "emission result",
            PipelineValue::Declaration(_) => "declaration unit",
        }
    }

    pub fn as_unit(&self) -> Option<&CompilationHandle> {
        match self {
            PipelineValue::Unit(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_unit_mut(&mut self) -> Option<&mut CompilationHandle> {
        match self {
            PipelineValue::Unit(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn into_emitted(self) -> Option<EmissionResult> {
        match self {
            PipelineValue::Emitted(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_declaration(self) -> Option<DeclarationUnit> {
        match self {
            PipelineValue::Declaration(unit) => Some(unit),
            _ => None,
        }
    }
}

/// Result of a run that did not hit an unexplained internal error.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// First error of the run, if it stopped early.
    pub error: Option<CompileError>,
    /// Value left by the last stage that completed.
    pub output: PipelineValue,
}

impl PipelineOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Run every stage of `pipeline` in order over `input`.
pub fn run_pipeline(
    pipeline: &Pipeline,
    ctx: &mut Context,
    diag: &mut Diagnostics,
    input: PipelineValue,
) -> Result<PipelineOutcome, InternalError> {
    let start = diag.len();
    let trace = ctx.options().trace_pipeline;
    let mut data = input;

    for stage in pipeline.stages() {
        let transform = match stage {
            Stage::Run(transform) => transform,
            Stage::Skip(_) => continue,
        };
        if trace {
            tracing::info!(stage = transform.name(), "entering stage");
        } else {
            tracing::trace!(stage = transform.name(), "entering stage");
        }

        let previous = data.clone();
        let result = transform.apply(ctx, diag, &mut data);
        if result.is_err() {
            data = previous;
        }
        match result {
            Ok(()) => {}
            Err(StageError::Compile(err)) => {
                diag.report(&err);
                tracing::debug!(stage = transform.name(), error = %err, "stage failed");
                return Ok(PipelineOutcome {
                    error: Some(err),
                    output: data,
                });
            }
            Err(StageError::Internal(err)) => {
                if !diag.has_errors() {
                    return Err(err);
                }
                tracing::debug!(
                    stage = transform.name(),
                    error = %err,
                    "internal error after reported errors; keeping the reported one"
                );
                let first = diag.errors_since(start).next().or_else(|| diag.first_error());
                return Ok(PipelineOutcome {
                    error: first,
                    output: data,
                });
            }
        }
    }

    Ok(PipelineOutcome {
        error: None,
        output: data,
    })
}
