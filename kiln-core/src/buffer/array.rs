//! The compiler-synthesized owning array buffer.

use crate::buffer::descriptor::{BufferDescriptor, BufferFlags, BufferOwner};
use crate::buffer::layout::{Layout, compute_strides};
use crate::error::BufferError;

/// A dense N-dimensional buffer that owns its data, shape and strides.
///
/// All three allocations are made together in [`ArrayBuffer::new`] and
/// dropped together, so a half-built array is never observable.
#[derive(Debug)]
pub struct ArrayBuffer {
    data: Vec<u8>,
    shape: Vec<isize>,
    strides: Vec<isize>,
    itemsize: isize,
    format: String,
    layout: Layout,
}

impl ArrayBuffer {
    pub fn new(
        shape: &[isize],
        itemsize: isize,
        format: impl Into<String>,
        layout: Layout,
    ) -> Result<Self, BufferError> {
        let computed = compute_strides(shape, itemsize, layout)?;

        let mut data = Vec::new();
        data.try_reserve_exact(computed.len)
            .map_err(|_| BufferError::OutOfMemory {
                bytes: computed.len,
            })?;
        data.resize(computed.len, 0);

        let mut owned_shape = Vec::new();
        owned_shape
            .try_reserve_exact(shape.len())
            .map_err(|_| BufferError::OutOfMemory {
                bytes: shape.len() * size_of::<isize>(),
            })?;
        owned_shape.extend_from_slice(shape);

        tracing::trace!(?shape, itemsize, %layout, bytes = computed.len, "allocated builtin array");
        Ok(ArrayBuffer {
            data,
            shape: owned_shape,
            strides: computed.strides,
            itemsize,
            format: format.into(),
            layout,
        })
    }

    /// Construct from a textual mode (`"c"` or `"fortran"`).
    pub fn with_mode(
        shape: &[isize],
        itemsize: isize,
        format: impl Into<String>,
        mode: &str,
    ) -> Result<Self, BufferError> {
        ArrayBuffer::new(shape, itemsize, format, mode.parse()?)
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[isize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn itemsize(&self) -> isize {
        self.itemsize
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Byte length: product of the shape times the item size.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Flags a consumer must request (at least one of) to get a buffer.
    pub fn contiguity_flags(&self) -> BufferFlags {
        match self.layout {
            Layout::RowMajor => BufferFlags::C_CONTIGUOUS | BufferFlags::ANY_CONTIGUOUS,
            Layout::ColumnMajor => BufferFlags::F_CONTIGUOUS | BufferFlags::ANY_CONTIGUOUS,
        }
    }

    /// Expose the array's own storage as a buffer descriptor.
    ///
    /// The descriptor names no owner, so consumers never release it.
    pub fn expose(&self, flags: BufferFlags) -> Result<BufferDescriptor<'_>, BufferError> {
        if !flags.intersects(self.contiguity_flags()) {
            tracing::debug!(?flags, layout = %self.layout, "refused non-contiguous buffer request");
            return Err(BufferError::NotContiguousExposure);
        }
        Ok(BufferDescriptor {
            data: &self.data,
            ndim: self.ndim(),
            shape: &self.shape,
            strides: Some(self.strides.as_slice()),
            suboffsets: None,
            itemsize: self.itemsize,
            format: &self.format,
            readonly: false,
            owner: None,
        })
    }

    /// No-op: descriptors from [`ArrayBuffer::expose`] carry no owner.
    pub fn release(&self, _descriptor: &BufferDescriptor<'_>) {
        tracing::warn!("release called on a builtin array descriptor");
    }
}

impl BufferOwner for ArrayBuffer {
    fn get_buffer(&self, flags: BufferFlags) -> Result<BufferDescriptor<'_>, BufferError> {
        self.expose(flags)
    }

    fn release_buffer(&self, descriptor: &BufferDescriptor<'_>) {
        self.release(descriptor)
    }
}
