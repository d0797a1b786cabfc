//! Externally supplied buffer descriptions.

use std::fmt;

use crate::error::BufferError;

bitflags::bitflags! {
    /// What a consumer asks for when requesting a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        const WRITABLE = 1 << 0;
        const FORMAT = 1 << 1;
        const ND = 1 << 2;
        const STRIDES = 1 << 3;
        const C_CONTIGUOUS = 1 << 4;
        const F_CONTIGUOUS = 1 << 5;
        const ANY_CONTIGUOUS = 1 << 6;
        const INDIRECT = 1 << 7;

        const CONTIG = Self::ND.bits() | Self::ANY_CONTIGUOUS.bits();
        const STRIDED = Self::ND.bits() | Self::STRIDES.bits();
        const RECORDS = Self::STRIDED.bits() | Self::FORMAT.bits();
        const FULL = Self::RECORDS.bits() | Self::INDIRECT.bits();
    }
}

/// Anything that can lend a [`BufferDescriptor`] over its own storage.
pub trait BufferOwner: fmt::Debug {
    fn get_buffer(&self, flags: BufferFlags) -> Result<BufferDescriptor<'_>, BufferError>;

    /// Called when a consumer is done with a descriptor that names this
    /// owner in [`BufferDescriptor::owner`].
    fn release_buffer(&self, descriptor: &BufferDescriptor<'_>);
}

/// A non-owning description of a block of memory.
///
/// `ndim` is the dimension count the owner reports; it is checked
/// against the declared view rather than derived from `shape`.
#[derive(Clone, Copy)]
pub struct BufferDescriptor<'a> {
    pub data: &'a [u8],
    pub ndim: usize,
    pub shape: &'a [isize],
    pub strides: Option<&'a [isize]>,
    pub suboffsets: Option<&'a [isize]>,
    pub itemsize: isize,
    pub format: &'a str,
    pub readonly: bool,
    /// Owner to notify on release; `None` means the descriptor must not
    /// be released at all.
    pub owner: Option<&'a dyn BufferOwner>,
}

impl BufferDescriptor<'_> {
    pub fn has_suboffsets(&self) -> bool {
        self.suboffsets.is_some()
    }

    pub fn is_releasable(&self) -> bool {
        self.owner.is_some()
    }
}

impl fmt::Debug for BufferDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferDescriptor")
            .field("len", &self.data.len())
            .field("ndim", &self.ndim)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("suboffsets", &self.suboffsets)
            .field("itemsize", &self.itemsize)
            .field("format", &self.format)
            .field("readonly", &self.readonly)
            .field("releasable", &self.is_releasable())
            .finish()
    }
}
