//! Validated views over foreign buffers.
//!
//! [`MemoryViewSlice::from_buffer`] checks a [`BufferDescriptor`] against a
//! declared [`ViewSpec`] and, only when every check passes, copies the
//! per-dimension layout out of the descriptor. Structural checks (rank,
//! format, item size, strides present) run before any per-axis check,
//! since the latter index the shape and stride arrays.

use crate::buffer::axis::{AxisSpec, ViewSpec};
use crate::buffer::descriptor::{BufferDescriptor, BufferFlags, BufferOwner};
use crate::buffer::layout::{Contiguity, classify};
use crate::error::BufferError;

/// Layout of one dimension of a validated view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceDim {
    pub shape: isize,
    pub stride: isize,
    /// Present only when the source buffer carried suboffsets.
    pub suboffset: Option<isize>,
}

/// Per-dimension layout bound to one buffer's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryViewSlice<'a> {
    data: &'a [u8],
    dims: Vec<SliceDim>,
    itemsize: isize,
    contiguity: Contiguity,
}

impl<'a> MemoryViewSlice<'a> {
    pub fn from_buffer(
        spec: &ViewSpec,
        buf: &BufferDescriptor<'a>,
    ) -> Result<Self, BufferError> {
        let ndim = spec.ndim();
        if buf.ndim != ndim {
            return Err(BufferError::DimensionMismatch {
                expected: ndim,
                found: buf.ndim,
            });
        }
        if buf.shape.len() != ndim {
            return Err(BufferError::DimensionMismatch {
                expected: ndim,
                found: buf.shape.len(),
            });
        }
        if buf.format != spec.format() {
            return Err(BufferError::FormatMismatch {
                expected: spec.format().to_string(),
                found: buf.format.to_string(),
            });
        }
        if buf.itemsize != spec.itemsize() {
            return Err(BufferError::ItemSizeMismatch {
                expected: spec.itemsize(),
                found: buf.itemsize,
            });
        }
        let strides = match buf.strides {
            Some(strides) if strides.len() == ndim => strides,
            _ => return Err(BufferError::MissingStrides),
        };
        let suboffsets = match buf.suboffsets {
            Some(suboffsets) if suboffsets.len() == ndim => Some(suboffsets),
            Some(_) => {
                return Err(BufferError::DimensionMismatch {
                    expected: ndim,
                    found: buf.suboffsets.map_or(0, <[isize]>::len),
                });
            }
            None => None,
        };

        let contiguity = classify(spec.axes());

        for (dim, axis) in spec.axes().iter().enumerate() {
            check_axis(dim, *axis, buf.itemsize, strides[dim], suboffsets)?;
        }

        if contiguity.row_major {
            let mut expected = buf.itemsize;
            for dim in (0..ndim).rev() {
                if strides[dim] != expected {
                    return Err(BufferError::NotRowMajorContiguous { dim });
                }
                expected = expected.saturating_mul(buf.shape[dim]);
            }
        } else if contiguity.column_major {
            let mut expected = buf.itemsize;
            for dim in 0..ndim {
                if strides[dim] != expected {
                    return Err(BufferError::NotColumnMajorContiguous { dim });
                }
                expected = expected.saturating_mul(buf.shape[dim]);
            }
        }

        let dims = (0..ndim)
            .map(|dim| SliceDim {
                shape: buf.shape[dim],
                stride: strides[dim],
                suboffset: suboffsets.map(|s| s[dim]),
            })
            .collect();

        Ok(MemoryViewSlice {
            data: buf.data,
            dims,
            itemsize: buf.itemsize,
            contiguity,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn dims(&self) -> &[SliceDim] {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn itemsize(&self) -> isize {
        self.itemsize
    }

    pub fn contiguity(&self) -> Contiguity {
        self.contiguity
    }

    pub fn shape(&self) -> Vec<isize> {
        self.dims.iter().map(|d| d.shape).collect()
    }

    pub fn strides(&self) -> Vec<isize> {
        self.dims.iter().map(|d| d.stride).collect()
    }
}

fn check_axis(
    dim: usize,
    axis: AxisSpec,
    itemsize: isize,
    stride: isize,
    suboffsets: Option<&[isize]>,
) -> Result<(), BufferError> {
    if axis.contains(AxisSpec::CONTIG) && stride != itemsize {
        return Err(BufferError::NotContiguousInDimension { dim });
    }
    if axis.intersects(AxisSpec::STRIDED | AxisSpec::FOLLOW) && stride <= 1 {
        return Err(BufferError::StrideTooSmall { dim, stride });
    }
    if axis.contains(AxisSpec::DIRECT)
        && suboffsets.is_some_and(|s| s[dim] >= 0)
    {
        return Err(BufferError::IndirectInDirectDimension { dim });
    }
    if axis.intersects(AxisSpec::PTR | AxisSpec::FULL) {
        let Some(suboffsets) = suboffsets else {
            return Err(BufferError::MissingSuboffsets { dim });
        };
        if axis.contains(AxisSpec::PTR) && suboffsets[dim] < 0 {
            return Err(BufferError::NegativeSuboffset {
                dim,
                suboffset: suboffsets[dim],
            });
        }
    }
    Ok(())
}

/// A view object: a validated slice tied to the descriptor it came from.
///
/// Dropping the view releases the descriptor only when it names an owner;
/// descriptors exposed by the builtin array never do.
#[derive(Debug)]
pub struct MemoryView<'a> {
    descriptor: BufferDescriptor<'a>,
    slice: MemoryViewSlice<'a>,
}

impl<'a> MemoryView<'a> {
    /// Acquire a buffer from `owner` and validate it against `spec`.
    pub fn acquire(
        owner: &'a dyn BufferOwner,
        spec: &ViewSpec,
        flags: BufferFlags,
    ) -> Result<Self, BufferError> {
        let descriptor = owner.get_buffer(flags)?;
        MemoryView::from_descriptor(descriptor, spec)
    }

    pub fn from_descriptor(
        descriptor: BufferDescriptor<'a>,
        spec: &ViewSpec,
    ) -> Result<Self, BufferError> {
        match MemoryViewSlice::from_buffer(spec, &descriptor) {
            Ok(slice) => Ok(MemoryView { descriptor, slice }),
            Err(err) => {
                tracing::debug!(error = %err, "buffer rejected by memoryview");
                if let Some(owner) = descriptor.owner {
                    owner.release_buffer(&descriptor);
                }
                Err(err)
            }
        }
    }

    pub fn slice(&self) -> &MemoryViewSlice<'a> {
        &self.slice
    }

    pub fn descriptor(&self) -> &BufferDescriptor<'a> {
        &self.descriptor
    }
}

impl Drop for MemoryView<'_> {
    fn drop(&mut self) {
        if let Some(owner) = self.descriptor.owner {
            owner.release_buffer(&self.descriptor);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::buffer::array::ArrayBuffer;
    use crate::buffer::axis::AxisMode;
    use crate::buffer::layout::Layout;

    fn row_major_spec(format: &str, itemsize: isize) -> ViewSpec {
        ViewSpec::new(
            vec![AxisSpec::direct_follow(), AxisSpec::direct_contig()],
            format,
            itemsize,
        )
        .unwrap()
    }

    fn descriptor<'a>(
        data: &'a [u8],
        shape: &'a [isize],
        strides: Option<&'a [isize]>,
        suboffsets: Option<&'a [isize]>,
    ) -> BufferDescriptor<'a> {
        BufferDescriptor {
            data,
            ndim: shape.len(),
            shape,
            strides,
            suboffsets,
            itemsize: 4,
            format: "i",
            readonly: true,
            owner: None,
        }
    }

    #[test]
    fn validates_row_major_array() {
        let array = ArrayBuffer::new(&[2, 3], 4, "i", Layout::RowMajor).unwrap();
        let desc = array.expose(BufferFlags::C_CONTIGUOUS).unwrap();
        let slice = MemoryViewSlice::from_buffer(&row_major_spec("i", 4), &desc).unwrap();
        assert_eq!(slice.strides(), vec![12, 4]);
        assert_eq!(slice.shape(), vec![2, 3]);
        assert!(slice.contiguity().row_major);
        assert!(slice.dims().iter().all(|d| d.suboffset.is_none()));
        assert_eq!(slice.data().len(), 24);
    }

    #[test]
    fn rejects_column_major_claim_on_row_major_array() {
        let array = ArrayBuffer::new(&[2, 3], 4, "i", Layout::RowMajor).unwrap();
        let desc = array.expose(BufferFlags::ANY_CONTIGUOUS).unwrap();
        let spec = ViewSpec::new(
            vec![AxisSpec::direct_contig(), AxisSpec::direct_follow()],
            "i",
            4,
        )
        .unwrap();
        let err = MemoryViewSlice::from_buffer(&spec, &desc).unwrap_err();
        assert!(err.is_contiguity_error(), "unexpected error {err:?}");
    }

    #[test]
    fn item_size_is_checked_before_strides() {
        let data = [0u8; 8];
        let shape = [2];
        // stride 3 would fail the contig check, but the item size check wins.
        let strides = [3];
        let mut desc = descriptor(&data, &shape, Some(&strides), None);
        desc.itemsize = 2;
        let spec = ViewSpec::new(vec![AxisSpec::direct_contig()], "i", 4).unwrap();
        let err = MemoryViewSlice::from_buffer(&spec, &desc).unwrap_err();
        assert_eq!(
            err,
            BufferError::ItemSizeMismatch {
                expected: 4,
                found: 2
            }
        );
    }

    #[test]
    fn structural_checks_in_order() {
        let data = [0u8; 24];
        let shape = [2, 3];
        let strides = [12, 4];
        let spec = row_major_spec("i", 4);

        let mut desc = descriptor(&data, &shape, Some(&strides), None);
        desc.ndim = 3;
        assert!(matches!(
            MemoryViewSlice::from_buffer(&spec, &desc),
            Err(BufferError::DimensionMismatch { expected: 2, found: 3 })
        ));

        let mut desc = descriptor(&data, &shape, None, None);
        desc.format = "d";
        assert!(matches!(
            MemoryViewSlice::from_buffer(&spec, &desc),
            Err(BufferError::FormatMismatch { .. })
        ));

        let desc = descriptor(&data, &shape, None, None);
        assert_eq!(
            MemoryViewSlice::from_buffer(&spec, &desc),
            Err(BufferError::MissingStrides)
        );
    }

    #[test]
    fn strided_axis_rejects_unit_stride() {
        let data = [0u8; 4];
        let shape = [4];
        let strides = [1];
        let mut desc = descriptor(&data, &shape, Some(&strides), None);
        desc.itemsize = 1;
        let spec = ViewSpec::new(vec![AxisSpec::direct_strided()], "i", 1).unwrap();
        assert_eq!(
            MemoryViewSlice::from_buffer(&spec, &desc),
            Err(BufferError::StrideTooSmall { dim: 0, stride: 1 })
        );
    }

    #[test]
    fn strided_view_keeps_gapped_strides() {
        let data = [0u8; 64];
        let shape = [2, 2];
        let strides = [32, 8];
        let desc = descriptor(&data, &shape, Some(&strides), None);
        let spec = ViewSpec::new(
            vec![AxisSpec::direct_strided(), AxisSpec::direct_strided()],
            "i",
            4,
        )
        .unwrap();
        let slice = MemoryViewSlice::from_buffer(&spec, &desc).unwrap();
        assert_eq!(slice.strides(), vec![32, 8]);
        assert!(!slice.contiguity().is_contiguous());
    }

    #[test]
    fn row_major_claim_detects_padding() {
        let data = [0u8; 64];
        let shape = [2, 3];
        // padded rows: 16 bytes instead of 12
        let strides = [16, 4];
        let desc = descriptor(&data, &shape, Some(&strides), None);
        assert_eq!(
            MemoryViewSlice::from_buffer(&row_major_spec("i", 4), &desc),
            Err(BufferError::NotRowMajorContiguous { dim: 0 })
        );
    }

    #[test]
    fn suboffset_rules() {
        let data = [0u8; 64];
        let shape = [2, 3];
        let strides = [8, 4];

        let active = [0, -1];
        let desc = descriptor(&data, &shape, Some(&strides), Some(&active));
        let direct = ViewSpec::new(
            vec![AxisSpec::direct_strided(), AxisSpec::direct_strided()],
            "i",
            4,
        )
        .unwrap();
        assert_eq!(
            MemoryViewSlice::from_buffer(&direct, &desc),
            Err(BufferError::IndirectInDirectDimension { dim: 0 })
        );

        let ptr = ViewSpec::new(
            vec![
                AxisSpec::new(AxisMode::Ptr, AxisMode::Strided)
                    .unwrap(),
                AxisSpec::direct_strided(),
            ],
            "i",
            4,
        )
        .unwrap();
        let slice = MemoryViewSlice::from_buffer(&ptr, &desc).unwrap();
        assert_eq!(slice.dims()[0].suboffset, Some(0));
        assert_eq!(slice.dims()[1].suboffset, Some(-1));

        let inactive = [-1, -1];
        let desc = descriptor(&data, &shape, Some(&strides), Some(&inactive));
        assert_eq!(
            MemoryViewSlice::from_buffer(&ptr, &desc),
            Err(BufferError::NegativeSuboffset {
                dim: 0,
                suboffset: -1
            })
        );

        let desc = descriptor(&data, &shape, Some(&strides), None);
        assert_eq!(
            MemoryViewSlice::from_buffer(&ptr, &desc),
            Err(BufferError::MissingSuboffsets { dim: 0 })
        );
    }

    #[derive(Debug, Default)]
    struct CountingOwner {
        data: Vec<u8>,
        shape: Vec<isize>,
        strides: Vec<isize>,
        releases: Cell<usize>,
    }

    impl BufferOwner for CountingOwner {
        fn get_buffer(&self, _flags: BufferFlags) -> Result<BufferDescriptor<'_>, BufferError> {
            Ok(BufferDescriptor {
                data: &self.data,
                ndim: self.shape.len(),
                shape: &self.shape,
                strides: Some(self.strides.as_slice()),
                suboffsets: None,
                itemsize: 4,
                format: "i",
                readonly: true,
                owner: Some(self as &dyn BufferOwner),
            })
        }

        fn release_buffer(&self, _descriptor: &BufferDescriptor<'_>) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    #[test]
    fn owned_descriptor_is_released_once_on_drop() {
        let owner = CountingOwner {
            data: vec![0; 24],
            shape: vec![2, 3],
            strides: vec![12, 4],
            ..Default::default()
        };
        {
            let view =
                MemoryView::acquire(&owner, &row_major_spec("i", 4), BufferFlags::STRIDED)
                    .unwrap();
            assert_eq!(view.slice().strides(), vec![12, 4]);
            assert_eq!(owner.releases.get(), 0);
        }
        assert_eq!(owner.releases.get(), 1);
    }

    #[test]
    fn rejected_descriptor_is_released() {
        let owner = CountingOwner {
            data: vec![0; 24],
            shape: vec![2, 3],
            strides: vec![12, 4],
            ..Default::default()
        };
        let err = MemoryView::acquire(&owner, &row_major_spec("d", 4), BufferFlags::STRIDED)
            .unwrap_err();
        assert!(matches!(err, BufferError::FormatMismatch { .. }));
        assert_eq!(owner.releases.get(), 1);
    }

    #[test]
    fn array_views_never_release() {
        let array = ArrayBuffer::new(&[2, 3], 4, "i", Layout::RowMajor).unwrap();
        let view = MemoryView::acquire(&array, &row_major_spec("i", 4), BufferFlags::CONTIG)
            .unwrap();
        assert!(!view.descriptor().is_releasable());
        drop(view);
    }
}
