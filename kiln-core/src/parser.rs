//! The parser seam.
//!
//! Tokenizing and parsing live outside the core. A front end implements
//! [`SourceParser`]; the `Parse` and `ParseDeclaration` stages call it.

use std::collections::HashMap;
use std::fmt;

use crate::ast::ModuleNode;
use crate::diagnostic::Diagnostics;
use crate::error::CompileError;
use crate::pipeline::SourceDescriptor;

pub trait SourceParser: fmt::Debug {
    /// Parse `source` as module `module_name`.
    ///
    /// Syntax errors that allow parsing to continue go to `diag`; the
    /// returned error is the one that stopped the parse.
    fn parse(
        &self,
        source: &SourceDescriptor,
        module_name: &str,
        is_declaration: bool,
        diag: &mut Diagnostics,
    ) -> Result<ModuleNode, CompileError>;
}

/// Serves trees built ahead of time, keyed by module name.
///
/// Useful for front ends that construct trees directly and for driving the
/// pipeline without a text parser.
#[derive(Debug, Default, Clone)]
pub struct PreparsedModules {
    trees: HashMap<String, ModuleNode>,
}

impl PreparsedModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module_name: impl Into<String>, tree: ModuleNode) {
        self.trees.insert(module_name.into(), tree);
    }

    pub fn with(mut self, module_name: impl Into<String>, tree: ModuleNode) -> Self {
        self.insert(module_name, tree);
        self
    }
}

impl SourceParser for PreparsedModules {
    fn parse(
        &self,
        source: &SourceDescriptor,
        module_name: &str,
        _is_declaration: bool,
        _diag: &mut Diagnostics,
    ) -> Result<ModuleNode, CompileError> {
        self.trees.get(module_name).cloned().ok_or_else(|| {
            CompileError::at(
                source.start(),
                format!("no tree available for module '{module_name}'"),
            )
        })
    }
}
