use harrow_device::{AccessMode, Buffer, Error as DeviceError, QueueOptions};

use crate::test::host_session;
use crate::{Arg, Extent, LocalScratch, Program};

/// The classic two-vector sum: a = [1..25], b = [25..1], out = [26; 25].
#[test]
fn add_25_elements() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(
        &context,
        r#"
        __kernel void add(__global const float* a, __global const float* b, __global float* out) {
            int i = get_global_id(0);
            out[i] = a[i] + b[i];
        }
        "#,
    )
    .unwrap();
    let kernel = program.kernel("add").unwrap();

    let a: Vec<f32> = (1..=25).map(|i| i as f32).collect();
    let b: Vec<f32> = (1..=25).rev().map(|i| i as f32).collect();
    let buf_a = Buffer::from_slice(&context, AccessMode::ReadOnly, &a).unwrap();
    let buf_b = Buffer::from_slice(&context, AccessMode::ReadOnly, &b).unwrap();
    let buf_out = Buffer::new(&context, 25 * 4, AccessMode::WriteOnly).unwrap();

    kernel
        .enqueue(
            &queue,
            Extent::d1(25),
            Extent::d1(25),
            &[Arg::Buffer(&buf_a), Arg::Buffer(&buf_b), Arg::Buffer(&buf_out)],
        )
        .unwrap()
        .wait()
        .unwrap();

    let out = queue.enqueue_read(&buf_out).wait().unwrap();
    let out: Vec<f32> = out.chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect();
    assert_eq!(out, vec![26.0f32; 25]);
}

/// Elementwise transform round trip across representative sizes: 1, a small
/// prime, and larger grids with several work-groups.
#[test]
fn scale_round_trip_for_representative_sizes() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(
        &context,
        r#"
        __kernel void scale(float k, __global float* data) {
            int i = get_global_id(0);
            data[i] = data[i] * k;
        }
        "#,
    )
    .unwrap();
    let kernel = program.kernel("scale").unwrap();

    for (size, local) in [(1, 1), (13, 13), (100, 25), (96, 32)] {
        let data: Vec<f32> = (1..=size).map(|i| i as f32).collect();
        let buffer = Buffer::from_slice(&context, AccessMode::ReadWrite, &data).unwrap();

        kernel
            .enqueue(
                &queue,
                Extent::d1(size),
                Extent::d1(local),
                &[Arg::scalar(5.0f32), Arg::Buffer(&buffer)],
            )
            .unwrap()
            .wait()
            .unwrap();

        let expected: Vec<f32> = data.iter().map(|v| v * 5.0).collect();
        assert_eq!(buffer.read_as::<f32>().unwrap(), expected, "size {size}, local {local}");
    }
}

/// The read-back is chained after the launch on the same ordered queue, so
/// waiting on the read event alone is enough.
#[test]
fn read_back_observes_the_preceding_launch_without_an_explicit_kernel_wait() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(
        &context,
        r#"
        __kernel void fill(__global int* out) {
            int i = get_global_id(0);
            out[i] = i * 3;
        }
        "#,
    )
    .unwrap();

    let buffer = Buffer::new(&context, 64 * 4, AccessMode::WriteOnly).unwrap();
    let _launch = program
        .kernel("fill")
        .unwrap()
        .enqueue(&queue, Extent::d1(64), Extent::d1(16), &[Arg::Buffer(&buffer)])
        .unwrap();

    let bytes = queue.enqueue_read(&buffer).wait().unwrap();
    let out: Vec<i32> = bytes.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect();
    assert_eq!(out, (0..64).map(|i| i * 3).collect::<Vec<_>>());
}

/// Work-group reduction through local scratch and barriers: each group sums
/// its sixteen inputs.
#[test]
fn local_scratch_reduction_with_barriers() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(
        &context,
        r#"
        __kernel void group_sum(__global const int* in, __local int* scratch, __global int* out) {
            int l = get_local_id(0);
            int n = get_local_size(0);
            scratch[l] = in[get_global_id(0)];
            barrier(CLK_LOCAL_MEM_FENCE);
            for (int stride = n / 2; stride > 0; stride = stride / 2) {
                if (l < stride) {
                    scratch[l] = scratch[l] + scratch[l + stride];
                }
                barrier(CLK_LOCAL_MEM_FENCE);
            }
            if (l == 0) {
                out[get_group_id(0)] = scratch[0];
            }
        }
        "#,
    )
    .unwrap();

    let input: Vec<i32> = (0..64).collect();
    let buf_in = Buffer::from_slice(&context, AccessMode::ReadOnly, &input).unwrap();
    let buf_out = Buffer::new(&context, 4 * 4, AccessMode::WriteOnly).unwrap();

    program
        .kernel("group_sum")
        .unwrap()
        .enqueue(
            &queue,
            Extent::d1(64),
            Extent::d1(16),
            &[Arg::Buffer(&buf_in), Arg::Local(LocalScratch::of::<i32>(16)), Arg::Buffer(&buf_out)],
        )
        .unwrap()
        .wait()
        .unwrap();

    let sums = buf_out.read_as::<i32>().unwrap();
    let expected: Vec<i32> = input.chunks(16).map(|chunk| chunk.iter().sum()).collect();
    assert_eq!(sums, expected);
}

/// A two-dimensional dispatch: transpose a 8x4 matrix.
#[test]
fn two_dimensional_grid() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(
        &context,
        r#"
        __kernel void transpose(__global const int* in, __global int* out, int rows, int cols) {
            int c = get_global_id(0);
            int r = get_global_id(1);
            out[c * rows + r] = in[r * cols + c];
        }
        "#,
    )
    .unwrap();

    let rows = 4usize;
    let cols = 8usize;
    let input: Vec<i32> = (0..(rows * cols) as i32).collect();
    let buf_in = Buffer::from_slice(&context, AccessMode::ReadOnly, &input).unwrap();
    let buf_out = Buffer::new(&context, rows * cols * 4, AccessMode::WriteOnly).unwrap();

    program
        .kernel("transpose")
        .unwrap()
        .enqueue(
            &queue,
            Extent::d2(cols, rows),
            Extent::d2(4, 2),
            &[
                Arg::Buffer(&buf_in),
                Arg::Buffer(&buf_out),
                Arg::scalar(rows as i32),
                Arg::scalar(cols as i32),
            ],
        )
        .unwrap()
        .wait()
        .unwrap();

    let out = buf_out.read_as::<i32>().unwrap();
    for r in 0..rows {
        for c in 0..cols {
            assert_eq!(out[c * rows + r], input[r * cols + c]);
        }
    }
}

/// An out-of-bounds store is a device fault: the event reports it, and the
/// queue, program, and context stay usable afterwards.
#[test]
fn out_of_bounds_access_faults_without_poisoning_the_session() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(
        &context,
        r#"
        __kernel void stray(__global int* out) {
            out[get_global_id(0) + 1000] = 1;
        }

        __kernel void tame(__global int* out) {
            out[get_global_id(0)] = 7;
        }
        "#,
    )
    .unwrap();

    let buffer = Buffer::new(&context, 4 * 4, AccessMode::ReadWrite).unwrap();

    let err = program
        .kernel("stray")
        .unwrap()
        .enqueue(&queue, Extent::d1(4), Extent::d1(4), &[Arg::Buffer(&buffer)])
        .unwrap()
        .wait()
        .unwrap_err();
    let DeviceError::Execution { reason } = &err else { panic!("expected a fault, got {err}") };
    assert!(reason.contains("out-of-bounds"), "{reason}");

    // The same queue accepts and completes further work.
    program
        .kernel("tame")
        .unwrap()
        .enqueue(&queue, Extent::d1(4), Extent::d1(4), &[Arg::Buffer(&buffer)])
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(buffer.read_as::<i32>().unwrap(), vec![7; 4]);
}

/// Integer division by zero inside a kernel is likewise a reported fault.
#[test]
fn division_by_zero_is_a_device_fault() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(
        &context,
        r#"
        __kernel void div(__global int* out, int divisor) {
            int i = get_global_id(0);
            out[i] = out[i] / divisor;
        }
        "#,
    )
    .unwrap();

    let buffer = Buffer::from_slice(&context, AccessMode::ReadWrite, &[6i32; 4]).unwrap();
    let err = program
        .kernel("div")
        .unwrap()
        .enqueue(&queue, Extent::d1(4), Extent::d1(4), &[Arg::Buffer(&buffer), Arg::scalar(0i32)])
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(err.to_string().contains("division by zero"), "{err}");
}

/// A faulting work item cancels its whole group, barriers included: the
/// dispatch ends with an error instead of deadlocking.
#[test]
fn fault_inside_a_barrier_group_cancels_cleanly() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(
        &context,
        r#"
        __kernel void lopsided(__global int* out, __local int* scratch) {
            int l = get_local_id(0);
            if (l == 3) {
                out[1000000] = 1;
            }
            scratch[l] = l;
            barrier(CLK_LOCAL_MEM_FENCE);
            out[get_global_id(0)] = scratch[0];
        }
        "#,
    )
    .unwrap();

    let buffer = Buffer::new(&context, 8 * 4, AccessMode::ReadWrite).unwrap();
    let err = program
        .kernel("lopsided")
        .unwrap()
        .enqueue(
            &queue,
            Extent::d1(8),
            Extent::d1(8),
            &[Arg::Buffer(&buffer), Arg::Local(LocalScratch::of::<i32>(8))],
        )
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(matches!(err, DeviceError::Execution { .. }), "{err}");
}

/// Scalar arguments of every width marshal by exact byte value.
#[test]
fn scalar_arguments_arrive_bit_exact() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(
        &context,
        r#"
        __kernel void store(__global long* out, char a, uint b, long c, double d) {
            out[0] = a;
            out[1] = b;
            out[2] = c;
            out[3] = (long)d;
        }
        "#,
    )
    .unwrap();

    let buffer = Buffer::new(&context, 4 * 8, AccessMode::WriteOnly).unwrap();
    program
        .kernel("store")
        .unwrap()
        .enqueue(
            &queue,
            Extent::d1(1),
            Extent::d1(1),
            &[
                Arg::Buffer(&buffer),
                Arg::scalar(-5i8),
                Arg::scalar(0xDEAD_BEEFu32),
                Arg::scalar(-(1i64 << 40)),
                Arg::scalar(2.5f64),
            ],
        )
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(buffer.read_as::<i64>().unwrap(), vec![-5, 0xDEAD_BEEF, -(1i64 << 40), 2]);
}
