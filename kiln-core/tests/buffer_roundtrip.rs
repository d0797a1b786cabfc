use kiln_core::buffer::{
    ArrayBuffer, AxisSpec, BufferDescriptor, BufferFlags, Layout, MemoryView, MemoryViewSlice,
    ViewSpec,
};
use kiln_core::error::BufferError;

fn row_major_2x3() -> ArrayBuffer {
    ArrayBuffer::new(&[2, 3], 4, "i", Layout::RowMajor).unwrap()
}

#[test]
fn row_major_array_validates_as_c_contiguous_view() {
    let array = row_major_2x3();
    let spec = ViewSpec::new(
        vec![AxisSpec::direct_follow(), AxisSpec::direct_contig()],
        "i",
        4,
    )
    .unwrap();

    let view = MemoryView::acquire(
        &array,
        &spec,
        BufferFlags::RECORDS | BufferFlags::C_CONTIGUOUS,
    )
    .unwrap();
    assert_eq!(view.slice().shape(), [2, 3]);
    assert_eq!(view.slice().strides(), [12, 4]);
    assert!(view.slice().contiguity().row_major);
    assert!(view.descriptor().owner.is_none());
}

#[test]
fn row_major_array_is_not_column_major() {
    let array = row_major_2x3();
    let spec = ViewSpec::new(
        vec![AxisSpec::direct_contig(), AxisSpec::direct_follow()],
        "i",
        4,
    )
    .unwrap();
    let desc = array
        .expose(BufferFlags::RECORDS | BufferFlags::C_CONTIGUOUS)
        .unwrap();

    let err = MemoryViewSlice::from_buffer(&spec, &desc).unwrap_err();
    assert!(err.is_contiguity_error(), "{err}");
}

#[test]
fn item_size_is_checked_before_any_axis() {
    let array = row_major_2x3();
    // axes that would fail the per-axis checks too
    let spec = ViewSpec::new(
        vec![AxisSpec::direct_contig(), AxisSpec::direct_contig()],
        "i",
        8,
    )
    .unwrap();
    let desc = array.expose(BufferFlags::RECORDS | BufferFlags::ANY_CONTIGUOUS).unwrap();

    let err = MemoryViewSlice::from_buffer(&spec, &desc).unwrap_err();
    assert_eq!(
        err,
        BufferError::ItemSizeMismatch {
            expected: 8,
            found: 4
        }
    );
}

#[test]
fn column_major_array_feeds_strided_view() {
    let array = ArrayBuffer::with_mode(&[2, 3], 8, "d", "fortran").unwrap();
    let spec = ViewSpec::new(
        vec![AxisSpec::direct_strided(), AxisSpec::direct_strided()],
        "d",
        8,
    )
    .unwrap();
    let view = MemoryView::acquire(
        &array,
        &spec,
        BufferFlags::RECORDS | BufferFlags::F_CONTIGUOUS,
    )
    .unwrap();

    assert_eq!(view.slice().strides(), [8, 16]);
    assert!(!view.slice().contiguity().is_contiguous());
}

#[test]
fn strided_request_without_contiguity_is_refused() {
    let array = row_major_2x3();
    let err = array.expose(BufferFlags::STRIDED).unwrap_err();
    assert_eq!(err, BufferError::NotContiguousExposure);
}

fn column_major_spec() -> ViewSpec {
    ViewSpec::new(
        vec![AxisSpec::direct_contig(), AxisSpec::direct_follow()],
        "d",
        8,
    )
    .unwrap()
}

#[test]
fn fortran_array_validates_as_column_major_view() {
    let array = ArrayBuffer::with_mode(&[2, 3], 8, "d", "fortran").unwrap();
    let view = MemoryView::acquire(
        &array,
        &column_major_spec(),
        BufferFlags::RECORDS | BufferFlags::F_CONTIGUOUS,
    )
    .unwrap();

    assert_eq!(view.slice().strides(), [8, 16]);
    let contiguity = view.slice().contiguity();
    assert!(contiguity.column_major && !contiguity.row_major);
}

#[test]
fn gapped_outer_stride_breaks_column_major_claim() {
    let data = [0u8; 64];
    let shape = [2, 3];
    let strides = [8, 24];
    let desc = BufferDescriptor {
        data: &data,
        ndim: 2,
        shape: &shape,
        strides: Some(&strides[..]),
        suboffsets: None,
        itemsize: 8,
        format: "d",
        readonly: true,
        owner: None,
    };

    let err = MemoryViewSlice::from_buffer(&column_major_spec(), &desc).unwrap_err();
    assert_eq!(err, BufferError::NotColumnMajorContiguous { dim: 1 });
    assert!(err.is_contiguity_error());
}
