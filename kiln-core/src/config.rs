//! Compile options loaded from TOML.
//!
//! Two layouts are accepted. The sectioned form keeps everything under
//! `[kiln]` so the file can be shared with other tools:
//!
//! ```toml
//! [kiln]
//! trace_pipeline = true
//! declaration_roots = ["decls"]
//!
//! [kiln.directives]
//! boundscheck = false
//! ```
//!
//! The direct form puts the same keys at the top level.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::CoreError;

/// Directive names the directive interpreter accepts.
pub const KNOWN_DIRECTIVES: &[&str] = &[
    "boundscheck",
    "wraparound",
    "nonecheck",
    "cdivision",
    "embedsignature",
    "infer_types",
];

pub fn is_known_directive(name: &str) -> bool {
    KNOWN_DIRECTIVES.contains(&name)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RootConfig {
    kiln: Option<CompileOptions>,
    #[serde(flatten)]
    direct: CompileOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Log every stage name at info level right before it runs.
    pub trace_pipeline: bool,
    /// Run the post-analysis tree assertions stage.
    pub evaluate_tree_assertions: bool,
    /// Directories searched recursively for `*.kd` declaration files.
    pub declaration_roots: Vec<PathBuf>,
    /// Directive defaults applied to every compilation unit.
    pub directives: BTreeMap<String, bool>,
}

impl CompileOptions {
    /// Load options from a file. Relative declaration roots are resolved
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CoreError::SourceIo {
            path: path.to_path_buf(),
            source,
        })?;
        let mut options = parse(&contents).map_err(|source| CoreError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            for root in &mut options.declaration_roots {
                if root.is_relative() {
                    *root = base.join(&*root);
                }
            }
        }
        tracing::debug!(path = %path.display(), ?options, "loaded compile options");
        Ok(options)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        Ok(parse(contents)?)
    }

    pub fn with_directive(mut self, name: impl Into<String>, value: bool) -> Self {
        self.directives.insert(name.into(), value);
        self
    }

    pub fn with_declaration_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.declaration_roots.push(root.into());
        self
    }
}

fn parse(contents: &str) -> Result<CompileOptions, toml::de::Error> {
    let root: RootConfig = toml::from_str(contents)?;
    Ok(root.kiln.unwrap_or(root.direct))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_sectioned_format() {
        let options = CompileOptions::from_toml_str(
            r#"
            [kiln]
            trace_pipeline = true

            [kiln.directives]
            boundscheck = false
            "#,
        )
        .unwrap();
        assert!(options.trace_pipeline);
        assert!(!options.evaluate_tree_assertions);
        assert_eq!(options.directives.get("boundscheck"), Some(&false));
    }

    #[test]
    fn reads_direct_format() {
        let options = CompileOptions::from_toml_str(
            "evaluate_tree_assertions = true\ndeclaration_roots = [\"decls\"]\n",
        )
        .unwrap();
        assert!(options.evaluate_tree_assertions);
        assert_eq!(options.declaration_roots, [PathBuf::from("decls")]);
    }

    #[test]
    fn empty_input_gives_defaults() {
        assert_eq!(
            CompileOptions::from_toml_str("").unwrap(),
            CompileOptions::default()
        );
    }

    #[test]
    fn load_resolves_roots_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[kiln]\ndeclaration_roots = [\"decls\"]").unwrap();

        let options = CompileOptions::load(&path).unwrap();
        assert_eq!(options.declaration_roots, [dir.path().join("decls")]);
    }

    #[test]
    fn malformed_file_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[kiln\ntrace_pipeline = 1").unwrap();

        let err = CompileOptions::load(&path).unwrap_err();
        match &err {
            CoreError::ConfigFile { path: reported, .. } => assert_eq!(reported, &path),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let err = CompileOptions::from_toml_str("trace_pipeline = \"yes\"").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }
}
