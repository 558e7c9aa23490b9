use harrow_device::{AccessMode, Buffer, QueueOptions};

use crate::test::host_session;
use crate::{Arg, Extent, Program};

const FILL: &str = r#"
    __kernel void fill(__global int* out, int value) {
        int i = get_global_id(0);
        out[i] = value;
    }
"#;

#[test]
fn profiled_launches_expose_ordered_timestamps() {
    let (context, _, queue) = host_session(QueueOptions { profiling: true });

    let program = Program::build(&context, FILL).unwrap();
    let kernel = program.kernel("fill").unwrap();
    let buffer = Buffer::new(&context, 256 * 4, AccessMode::ReadWrite).unwrap();

    let launch = kernel
        .enqueue(&queue, Extent::d1(256), Extent::d1(64), &[Arg::Buffer(&buffer), Arg::scalar(9i32)])
        .unwrap();
    let read = queue.enqueue_read(&buffer);

    launch.wait().unwrap();
    read.wait().unwrap();

    let launch_profile = launch.profile().expect("profiling enabled");
    let read_profile = read.profile().expect("profiling enabled");

    // Within a command: queued -> started -> finished never goes backwards.
    assert!(launch_profile.started_at >= launch_profile.queued_at);
    assert!(launch_profile.finished_at >= launch_profile.started_at);
    assert!(read_profile.started_at >= read_profile.queued_at);
    assert!(read_profile.finished_at >= read_profile.started_at);

    // Across commands on one ordered queue: the read starts after the
    // launch finished.
    assert!(read_profile.started_at >= launch_profile.finished_at);
}

#[test]
fn unprofiled_queue_records_nothing() {
    let (context, _, queue) = host_session(QueueOptions::default());

    let program = Program::build(&context, FILL).unwrap();
    let kernel = program.kernel("fill").unwrap();
    let buffer = Buffer::new(&context, 16 * 4, AccessMode::ReadWrite).unwrap();

    let event = kernel
        .enqueue(&queue, Extent::d1(16), Extent::d1(16), &[Arg::Buffer(&buffer), Arg::scalar(1i32)])
        .unwrap();
    event.wait().unwrap();
    assert!(event.profile().is_none());
}

#[test]
fn profile_is_absent_until_completion() {
    let (context, _, queue) = host_session(QueueOptions { profiling: true });

    let program = Program::build(&context, FILL).unwrap();
    let kernel = program.kernel("fill").unwrap();
    let buffer = Buffer::new(&context, 16 * 4, AccessMode::ReadWrite).unwrap();

    let event = kernel
        .enqueue(&queue, Extent::d1(16), Extent::d1(16), &[Arg::Buffer(&buffer), Arg::scalar(1i32)])
        .unwrap();

    // Completed-or-not, `profile` never panics; after wait it must be there.
    let _ = event.profile();
    event.wait().unwrap();
    assert!(event.profile().is_some());
}
