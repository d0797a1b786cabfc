//! Per-compilation context.
//!
//! A [`Context`] owns everything that outlives a single pipeline run: the
//! options, the populated builtin namespace, the collaborators and the
//! declaration units loaded so far. Stages receive it explicitly.

use std::path::PathBuf;

use crate::builtins::BuiltinScope;
use crate::codegen::{CodeGenerator, TextEmitter};
use crate::config::CompileOptions;
use crate::declarations::load_declaration_files;
use crate::diagnostic::Diagnostics;
use crate::error::{CoreError, InternalError};
use crate::parser::SourceParser;
use crate::pipeline::{
    CompilationSource, DeclarationUnit, DefaultPasses, PassProvider, Pipeline, PipelineMode,
    PipelineOutcome, PipelineValue, SourceDescriptor, run_pipeline,
};
use crate::span::FileId;

#[derive(Debug)]
pub struct Context {
    options: CompileOptions,
    builtins: BuiltinScope,
    parser: Box<dyn SourceParser>,
    codegen: Box<dyn CodeGenerator>,
    passes: Box<dyn PassProvider>,
    declarations: Vec<DeclarationUnit>,
    next_file: u32,
}

impl Context {
    /// A context with the builtin namespace populated, the default
    /// passes and the text emitter.
    pub fn new(options: CompileOptions, parser: Box<dyn SourceParser>) -> Result<Self, InternalError> {
        Ok(Context {
            options,
            builtins: BuiltinScope::create()?,
            parser,
            codegen: Box::new(TextEmitter),
            passes: Box::new(DefaultPasses),
            declarations: Vec::new(),
            next_file: FileId::BUILTIN.0 + 1,
        })
    }

    pub fn with_codegen(mut self, codegen: Box<dyn CodeGenerator>) -> Self {
        self.codegen = codegen;
        self
    }

    pub fn with_passes(mut self, passes: Box<dyn PassProvider>) -> Self {
        self.passes = passes;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn builtins(&self) -> &BuiltinScope {
        &self.builtins
    }

    pub fn parser(&self) -> &dyn SourceParser {
        self.parser.as_ref()
    }

    pub fn codegen(&self) -> &dyn CodeGenerator {
        self.codegen.as_ref()
    }

    /// Declaration units in load order.
    pub fn declarations(&self) -> &[DeclarationUnit] {
        &self.declarations
    }

    pub fn declaration_unit(&self, module_name: &str) -> Option<&DeclarationUnit> {
        self.declarations.iter().find(|d| d.module_name == module_name)
    }

    /// Store a declaration unit. Reloading a module replaces it in place.
    pub fn add_declarations(&mut self, unit: DeclarationUnit) {
        match self
            .declarations
            .iter_mut()
            .find(|d| d.module_name == unit.module_name)
        {
            Some(existing) => *existing = unit,
            None => self.declarations.push(unit),
        }
    }

    pub fn create_pipeline(&self, mode: PipelineMode) -> Pipeline {
        Pipeline::build(mode, &self.options, self.passes.as_ref())
    }

    /// Wrap source text in a descriptor with a fresh file id.
    pub fn source(
        &mut self,
        module_name: impl Into<String>,
        path: Option<PathBuf>,
        text: impl Into<String>,
    ) -> CompilationSource {
        let file = FileId(self.next_file);
        self.next_file += 1;
        CompilationSource {
            module_name: module_name.into(),
            source: SourceDescriptor {
                file,
                path,
                text: text.into(),
            },
        }
    }

    /// Run one implementation unit through the pipeline for `mode`.
    pub fn compile(
        &mut self,
        mode: PipelineMode,
        source: CompilationSource,
        diag: &mut Diagnostics,
    ) -> Result<PipelineOutcome, InternalError> {
        let pipeline = self.create_pipeline(mode);
        tracing::debug!(module = %source.module_name, ?mode, stages = pipeline.len(), "compiling");
        run_pipeline(&pipeline, self, diag, PipelineValue::Source(source))
    }

    /// Run one declaration file through the declaration pipeline. On
    /// success the resulting unit is stored in the context.
    pub fn process_declaration(
        &mut self,
        source: CompilationSource,
        diag: &mut Diagnostics,
    ) -> Result<PipelineOutcome, InternalError> {
        self.compile(PipelineMode::Declaration, source, diag)
    }

    /// Load every declaration file under the configured roots.
    ///
    /// Returns the number of units loaded. A file that fails to compile
    /// leaves its errors in `diag` and is skipped.
    pub fn load_declarations(&mut self, diag: &mut Diagnostics) -> Result<usize, CoreError> {
        let roots = self.options.declaration_roots.clone();
        let mut loaded = 0;
        for root in &roots {
            for file in load_declaration_files(root)? {
                let source = self.source(
                    file.module_name.clone(),
                    Some(root.join(&file.path)),
                    file.contents,
                );
                let outcome = self.process_declaration(source, diag)?;
                match outcome.error {
                    None => loaded += 1,
                    Some(err) => {
                        tracing::warn!(module = %file.module_name, error = %err, "declaration file rejected")
                    }
                }
            }
        }
        tracing::info!(loaded, roots = roots.len(), "loaded declaration files");
        Ok(loaded)
    }
}
