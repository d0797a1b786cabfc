//! Stride computation and contiguity classification.

use std::fmt;
use std::str::FromStr;

use crate::buffer::axis::AxisSpec;
use crate::error::BufferError;

/// Memory order of a builtin array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    /// Last dimension varies fastest (mode `"c"`).
    #[default]
    RowMajor,
    /// First dimension varies fastest (mode `"fortran"`).
    ColumnMajor,
}

impl Layout {
    pub const fn mode_name(self) -> &'static str {
        match self {
            Layout::RowMajor => "c",
            Layout::ColumnMajor => "fortran",
        }
    }
}

impl FromStr for Layout {
    type Err = BufferError;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "c" => Ok(Layout::RowMajor),
            "fortran" => Ok(Layout::ColumnMajor),
            other => Err(BufferError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode_name())
    }
}

/// Byte strides of every dimension plus the total byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strides {
    pub strides: Vec<isize>,
    pub len: usize,
}

/// Compute the byte strides of a dense array.
///
/// Row-major walks the dimensions last to first, column-major first to
/// last; the innermost stride is `itemsize` and each following stride is
/// the previous one times the previous extent. The final accumulated
/// value is the byte length.
pub fn compute_strides(
    shape: &[isize],
    itemsize: isize,
    layout: Layout,
) -> Result<Strides, BufferError> {
    if shape.is_empty() {
        return Err(BufferError::EmptyShape);
    }
    if itemsize <= 0 {
        return Err(BufferError::InvalidItemSize(itemsize));
    }
    if let Some((dim, &extent)) = shape.iter().enumerate().find(|(_, extent)| **extent <= 0) {
        return Err(BufferError::InvalidShape { dim, extent });
    }

    let mut strides = vec![0; shape.len()];
    let mut stride = itemsize;
    let mut step = |dim: usize| -> Result<(), BufferError> {
        strides[dim] = stride;
        stride = stride
            .checked_mul(shape[dim])
            .ok_or(BufferError::InvalidShape {
                dim,
                extent: shape[dim],
            })?;
        Ok(())
    };
    match layout {
        Layout::RowMajor => (0..shape.len()).rev().try_for_each(&mut step)?,
        Layout::ColumnMajor => (0..shape.len()).try_for_each(&mut step)?,
    }

    let len = usize::try_from(stride).map_err(|_| BufferError::InvalidShape {
        dim: 0,
        extent: shape[0],
    })?;
    Ok(Strides { strides, len })
}

/// Which dense layouts a set of axis specifiers claims.
///
/// Both flags may be false (a strided view); well-formed input never
/// sets both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Contiguity {
    pub row_major: bool,
    pub column_major: bool,
}

impl Contiguity {
    pub fn is_contiguous(self) -> bool {
        self.row_major || self.column_major
    }

    pub fn layout(self) -> Option<Layout> {
        match (self.row_major, self.column_major) {
            (true, _) => Some(Layout::RowMajor),
            (false, true) => Some(Layout::ColumnMajor),
            (false, false) => None,
        }
    }
}

/// Classify the packing implied by `axes`.
///
/// Row-major: the last axis is `contig` and every axis before it is
/// `follow`. Column-major: more than one axis, the first is `contig` and
/// every axis after it is `follow`.
pub fn classify(axes: &[AxisSpec]) -> Contiguity {
    let Some((last, leading)) = axes.split_last() else {
        return Contiguity::default();
    };
    let row_major = last.contains(AxisSpec::CONTIG)
        && leading.iter().all(|axis| axis.contains(AxisSpec::FOLLOW));

    let column_major = match axes.split_first() {
        Some((first, trailing)) if axes.len() > 1 => {
            first.contains(AxisSpec::CONTIG)
                && trailing.iter().all(|axis| axis.contains(AxisSpec::FOLLOW))
        }
        _ => false,
    };

    Contiguity {
        row_major,
        column_major,
    }
}
