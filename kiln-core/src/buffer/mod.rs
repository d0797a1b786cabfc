//! Strided buffers and the views validated over them.
//!
//! This is the runtime model behind the `kiln.array` and
//! `kiln.memoryview` builtins:
//!
//!   axis       per-dimension access/packing flags
//!   layout     stride computation and contiguity classification
//!   descriptor non-owning buffer description + owner protocol
//!   array      the owning, dense builtin array
//!   memview    cross-validation of a descriptor against a declared view

pub mod array;
pub mod axis;
pub mod descriptor;
pub mod layout;
pub mod memview;

pub use array::ArrayBuffer;
pub use axis::{AxisMode, AxisSpec, ViewSpec};
pub use descriptor::{BufferDescriptor, BufferFlags, BufferOwner};
pub use layout::{Contiguity, Layout, Strides, classify, compute_strides};
pub use memview::{MemoryView, MemoryViewSlice, SliceDim};
