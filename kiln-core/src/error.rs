use std::path::PathBuf;

use thiserror::Error;

use crate::span::Span;

/// A user-facing diagnostic that aborts the current unit only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{message}", location_prefix(.span))]
pub struct CompileError {
    pub message: String,
    pub span: Option<Span>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        CompileError {
            message: message.into(),
            span: None,
        }
    }

    pub fn at(span: Span, message: impl Into<String>) -> Self {
        CompileError {
            message: message.into(),
            span: Some(span),
        }
    }
}

fn location_prefix(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!("{span}: "),
        None => String::new(),
    }
}

/// An invariant violation inside the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal compiler error: {message}")]
pub struct InternalError {
    pub message: String,
}

impl InternalError {
    pub fn new(message: impl Into<String>) -> Self {
        InternalError {
            message: message.into(),
        }
    }
}

/// The two error kinds a pipeline stage may raise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Failures of the stride, contiguity and buffer validation engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("empty shape for builtin array")]
    EmptyShape,
    #[error("invalid shape: extent {extent} in dimension {dim}")]
    InvalidShape { dim: usize, extent: isize },
    #[error("itemsize <= 0 for builtin array (got {0})")]
    InvalidItemSize(isize),
    #[error("invalid mode, expected 'c' or 'fortran', got '{0}'")]
    InvalidMode(String),
    #[error("unable to allocate {bytes} bytes for builtin array")]
    OutOfMemory { bytes: usize },
    #[error("can only create a buffer that is contiguous in memory")]
    NotContiguousExposure,
    #[error("invalid axis specifier in dimension {dim}: {reason}")]
    InvalidAxisSpec { dim: usize, reason: &'static str },
    #[error("buffer has wrong number of dimensions (expected {expected}, got {found})")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("buffer dtype mismatch (expected '{expected}', got '{found}')")]
    FormatMismatch { expected: String, found: String },
    #[error("item size of buffer ({found} bytes) does not match size of declared type ({expected} bytes)")]
    ItemSizeMismatch { expected: isize, found: isize },
    #[error("buffer does not provide stride information")]
    MissingStrides,
    #[error("buffer and memoryview are not contiguous in dimension {dim}")]
    NotContiguousInDimension { dim: usize },
    #[error("buffer stride {stride} in dimension {dim} is too small for a strided axis")]
    StrideTooSmall { dim: usize, stride: isize },
    #[error("buffer not compatible with direct access in dimension {dim}")]
    IndirectInDirectDimension { dim: usize },
    #[error("buffer is not indirectly accessible in dimension {dim}")]
    MissingSuboffsets { dim: usize },
    #[error("buffer is not indirectly accessible in dimension {dim} (suboffset {suboffset})")]
    NegativeSuboffset { dim: usize, suboffset: isize },
    #[error("buffer not row-major contiguous (mismatch in dimension {dim})")]
    NotRowMajorContiguous { dim: usize },
    #[error("buffer not column-major contiguous (mismatch in dimension {dim})")]
    NotColumnMajorContiguous { dim: usize },
}

impl BufferError {
    /// True for every failure caused by a buffer whose strides do not
    /// match the declared packing.
    pub fn is_contiguity_error(&self) -> bool {
        matches!(
            self,
            BufferError::NotContiguousInDimension { .. }
                | BufferError::NotRowMajorContiguous { .. }
                | BufferError::NotColumnMajorContiguous { .. }
                | BufferError::NotContiguousExposure
        )
    }

    /// Attach a source position, turning the failure into a diagnostic.
    pub fn at(self, span: Span) -> CompileError {
        CompileError::at(span, self.to_string())
    }
}

/// Lookup failures in the builtin namespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("{module}.{name} is not available")]
    NotAvailable {
        module: String,
        name: String,
        span: Span,
    },
}

impl From<ScopeError> for CompileError {
    fn from(err: ScopeError) -> Self {
        match &err {
            ScopeError::NotAvailable { span, .. } => CompileError::at(*span, err.to_string()),
        }
    }
}

impl From<ScopeError> for StageError {
    fn from(err: ScopeError) -> Self {
        StageError::Compile(err.into())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] toml::de::Error),
    #[error("declaration root was not found at {0}")]
    MissingDeclarationRoot(PathBuf),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}
