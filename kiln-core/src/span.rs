//! Source positions for tree nodes and diagnostics.

use std::fmt;

/// Identifies one source descriptor within a compilation context.
///
/// Id 0 is reserved for positions inside the builtin namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FileId(pub u32);

impl FileId {
    pub const BUILTIN: FileId = FileId(0);
}

/// A line/column position in a source file (1-based line, 0-based column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub file: FileId,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub const fn new(file: FileId, line: u32, column: u32) -> Self {
        Span { file, line, column }
    }

    /// Position used for diagnostics raised by the builtin namespace itself.
    pub const fn builtin() -> Self {
        Span::new(FileId::BUILTIN, 0, 0)
    }

    /// Start of a file, where parse-level diagnostics are attributed.
    pub const fn file_start(file: FileId) -> Self {
        Span::new(file, 1, 0)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file == FileId::BUILTIN {
            write!(f, "<builtin>:{}:{}", self.line, self.column)
        } else {
            write!(f, "#{}:{}:{}", self.file.0, self.line, self.column)
        }
    }
}
