use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::CoreError;

/// File extension of declaration files.
pub const DECLARATION_EXTENSION: &str = "kd";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationFile {
    /// Path relative to the root it was found under.
    pub path: PathBuf,
    /// Dotted module name derived from the relative path.
    pub module_name: String,
    pub contents: String,
}

/// Collect every declaration file under `root`, in file-name order.
pub fn load_declaration_files(root: impl AsRef<Path>) -> Result<Vec<DeclarationFile>, CoreError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(CoreError::MissingDeclarationRoot(root.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != DECLARATION_EXTENSION) {
            continue;
        }
        let contents = fs::read_to_string(path).map_err(|source| CoreError::SourceIo {
            path: path.to_path_buf(),
            source,
        })?;
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let module_name = module_name(&relative);
        tracing::trace!(path = %relative.display(), %module_name, "found declaration file");
        files.push(DeclarationFile {
            path: relative,
            module_name,
            contents,
        });
    }
    Ok(files)
}

/// `pkg/sub/mod.kd` becomes `pkg.sub.mod`.
pub fn module_name(relative: &Path) -> String {
    let stem = relative.with_extension("");
    stem.components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_nested_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/vec.kd"), "cdef int size()").unwrap();
        fs::write(dir.path().join("alpha.kd"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = load_declaration_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.module_name.as_str()).collect();
        assert_eq!(names, ["alpha", "pkg.vec"]);
        assert_eq!(files[1].contents, "cdef int size()");
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nowhere");
        let err = load_declaration_files(&missing).unwrap_err();
        assert!(matches!(err, CoreError::MissingDeclarationRoot(p) if p == missing));
    }
}
