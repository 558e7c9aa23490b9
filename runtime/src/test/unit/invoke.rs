use harrow_device::{AccessMode, Buffer, QueueOptions};
use harrow_dtype::ScalarValue;

use crate::test::host_session;
use crate::{Arg, Error, Extent, LocalScratch, Program};

const SCALE: &str = r#"
    __kernel void scale(float k, __global float* data) {
        int i = get_global_id(0);
        data[i] = data[i] * k;
    }
"#;

#[test]
fn argument_count_mismatch_fails_before_submission() {
    let (context, _, queue) = host_session(QueueOptions::default());
    let program = Program::build(&context, SCALE).unwrap();
    let kernel = program.kernel("scale").unwrap();

    let data: Vec<f32> = vec![1.0; 8];
    let buffer = Buffer::from_slice(&context, AccessMode::ReadWrite, &data).unwrap();

    let err = kernel
        .enqueue(&queue, Extent::d1(8), Extent::d1(8), &[Arg::Buffer(&buffer)])
        .unwrap_err();
    assert!(matches!(err, Error::ArgumentCount { expected: 2, actual: 1 }), "{err}");

    // Nothing was submitted: the buffer still holds its initial contents.
    assert_eq!(buffer.read_as::<f32>().unwrap(), data);
}

#[test]
fn scalar_byte_layout_must_match_exactly() {
    let (context, _, queue) = host_session(QueueOptions::default());
    let program = Program::build(&context, SCALE).unwrap();
    let kernel = program.kernel("scale").unwrap();

    let buffer = Buffer::from_slice(&context, AccessMode::ReadWrite, &[1.0f32; 4]).unwrap();

    // `double` where the kernel declares `float`: same family, wrong width.
    let err = kernel
        .enqueue(
            &queue,
            Extent::d1(4),
            Extent::d1(4),
            &[Arg::Scalar(ScalarValue::Double(5.0)), Arg::Buffer(&buffer)],
        )
        .unwrap_err();
    assert!(
        matches!(err, Error::ArgumentType { index: 0, .. }),
        "{err}"
    );
}

#[test]
fn buffer_where_scalar_expected_is_a_mismatch() {
    let (context, _, queue) = host_session(QueueOptions::default());
    let program = Program::build(&context, SCALE).unwrap();
    let kernel = program.kernel("scale").unwrap();

    let buffer = Buffer::from_slice(&context, AccessMode::ReadWrite, &[1.0f32; 4]).unwrap();

    let err = kernel
        .enqueue(&queue, Extent::d1(4), Extent::d1(4), &[Arg::Buffer(&buffer), Arg::Buffer(&buffer)])
        .unwrap_err();
    assert!(matches!(err, Error::ArgumentType { index: 0, .. }), "{err}");
}

#[test]
fn read_only_buffer_cannot_feed_a_writable_parameter() {
    let (context, _, queue) = host_session(QueueOptions::default());
    let program = Program::build(&context, SCALE).unwrap();
    let kernel = program.kernel("scale").unwrap();

    let buffer = Buffer::from_slice(&context, AccessMode::ReadOnly, &[1.0f32; 4]).unwrap();

    let err = kernel
        .enqueue(&queue, Extent::d1(4), Extent::d1(4), &[Arg::scalar(2.0f32), Arg::Buffer(&buffer)])
        .unwrap_err();
    assert!(matches!(err, Error::ArgumentType { index: 1, .. }), "{err}");
}

#[test]
fn local_scratch_must_be_whole_elements() {
    let (context, _, queue) = host_session(QueueOptions::default());
    let program = Program::build(
        &context,
        "__kernel void f(__local int* scratch) { scratch[0] = 1; }",
    )
    .unwrap();
    let kernel = program.kernel("f").unwrap();

    let err = kernel
        .enqueue(&queue, Extent::d1(4), Extent::d1(4), &[Arg::Local(LocalScratch::bytes(7))])
        .unwrap_err();
    assert!(matches!(err, Error::ArgumentType { index: 0, .. }), "{err}");

    kernel
        .enqueue(&queue, Extent::d1(4), Extent::d1(4), &[Arg::Local(LocalScratch::of::<i32>(4))])
        .unwrap()
        .wait()
        .unwrap();
}

#[test]
fn non_divisible_local_extent_is_an_invalid_work_group() {
    let (context, _, queue) = host_session(QueueOptions::default());
    let program = Program::build(&context, SCALE).unwrap();
    let kernel = program.kernel("scale").unwrap();

    let buffer = Buffer::from_slice(&context, AccessMode::ReadWrite, &[1.0f32; 10]).unwrap();

    // 10 work items cannot be tiled by groups of 4.
    let err = kernel
        .enqueue(&queue, Extent::d1(10), Extent::d1(4), &[Arg::scalar(2.0f32), Arg::Buffer(&buffer)])
        .unwrap_err();
    let Error::Device { source } = &err else { panic!("expected a device error, got {err}") };
    assert!(source.to_string().contains("not divisible"), "{source}");
}

#[test]
fn work_group_volume_is_bounded_by_the_device() {
    let (context, device, queue) = host_session(QueueOptions::default());
    let program = Program::build(&context, SCALE).unwrap();
    let kernel = program.kernel("scale").unwrap();

    let max = device.info().max_work_group_size;
    let oversized = max * 2;
    let buffer =
        Buffer::from_slice(&context, AccessMode::ReadWrite, &vec![1.0f32; oversized]).unwrap();

    let err = kernel
        .enqueue(
            &queue,
            Extent::d1(oversized),
            Extent::d1(oversized),
            &[Arg::scalar(2.0f32), Arg::Buffer(&buffer)],
        )
        .unwrap_err();
    let Error::Device { source } = &err else { panic!("expected a device error, got {err}") };
    assert!(source.to_string().contains("exceeds device maximum"), "{source}");
}

#[test]
fn dimensionality_of_global_and_local_must_agree() {
    let (context, _, queue) = host_session(QueueOptions::default());
    let program = Program::build(&context, SCALE).unwrap();
    let kernel = program.kernel("scale").unwrap();

    let buffer = Buffer::from_slice(&context, AccessMode::ReadWrite, &[1.0f32; 8]).unwrap();

    let err = kernel
        .enqueue(&queue, Extent::d1(8), Extent::d2(4, 2), &[Arg::scalar(2.0f32), Arg::Buffer(&buffer)])
        .unwrap_err();
    assert!(matches!(err, Error::Device { .. }), "{err}");
}

#[test]
fn zero_extent_is_rejected() {
    let (context, _, queue) = host_session(QueueOptions::default());
    let program = Program::build(&context, SCALE).unwrap();
    let kernel = program.kernel("scale").unwrap();

    let buffer = Buffer::from_slice(&context, AccessMode::ReadWrite, &[1.0f32; 8]).unwrap();

    let err = kernel
        .enqueue(&queue, Extent::d1(0), Extent::d1(0), &[Arg::scalar(2.0f32), Arg::Buffer(&buffer)])
        .unwrap_err();
    assert!(matches!(err, Error::Device { .. }), "{err}");
}
