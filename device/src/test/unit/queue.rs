use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::test::stub::{StubDriver, stub_context};
use crate::{AccessMode, Buffer, CommandQueue, Context, Error, QueueOptions};

fn queue_with(options: QueueOptions) -> (Context, CommandQueue) {
    let context = stub_context();
    let device = context.devices()[0].clone();
    let queue = CommandQueue::new(&context, &device, options).unwrap();
    (context, queue)
}

#[test]
fn commands_run_in_submission_order() {
    let (_context, queue) = queue_with(QueueOptions::default());

    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let events: Vec<_> = (0..16)
        .map(|i| {
            let order = Arc::clone(&order);
            queue.submit(move || {
                order.lock().push(i);
                Ok(())
            })
        })
        .collect();

    for event in &events {
        event.wait().unwrap();
    }
    assert_eq!(*order.lock(), (0..16).collect::<Vec<_>>());
}

#[test]
fn write_then_read_round_trips() {
    let (context, queue) = queue_with(QueueOptions::default());
    let buffer = Buffer::new(&context, 8, AccessMode::ReadWrite).unwrap();

    let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
    queue.enqueue_write(&buffer, &data).unwrap().wait().unwrap();

    let back = queue.enqueue_read(&buffer).wait().unwrap();
    assert_eq!(back, data);
}

#[test]
fn copy_between_buffers() {
    let (context, queue) = queue_with(QueueOptions::default());
    let src = Buffer::from_host(&context, AccessMode::ReadOnly, &[9u8; 16]).unwrap();
    let dst = Buffer::new(&context, 16, AccessMode::ReadWrite).unwrap();

    queue.enqueue_copy(&src, &dst).unwrap().wait().unwrap();
    assert_eq!(queue.enqueue_read(&dst).wait().unwrap(), vec![9u8; 16]);
}

#[test]
fn mismatched_write_fails_before_submission() {
    let (context, queue) = queue_with(QueueOptions::default());
    let buffer = Buffer::new(&context, 8, AccessMode::ReadWrite).unwrap();

    let err = queue.enqueue_write(&buffer, &[0u8; 4]).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch { expected: 8, actual: 4 }), "{err}");
}

#[test]
fn foreign_device_queue_is_rejected() {
    let context = stub_context();
    let other = crate::platform::Platform::new(StubDriver::with_devices(1)).devices().unwrap();

    let err = CommandQueue::new(&context, &other[0], QueueOptions::default()).unwrap_err();
    assert!(matches!(err, Error::ForeignDevice { .. }), "{err}");
}

#[test]
fn profiled_commands_expose_monotonic_timestamps() {
    let (_context, queue) = queue_with(QueueOptions { profiling: true });
    assert!(queue.profiling_enabled());

    let events: Vec<_> = (0..4).map(|_| queue.submit(|| Ok(()))).collect();

    let mut last_finish = 0u64;
    for event in &events {
        event.wait().unwrap();
        let profile = event.profile().expect("profiling enabled");
        assert!(profile.started_at >= profile.queued_at);
        assert!(profile.finished_at >= profile.started_at);
        // FIFO: a later command starts no earlier than its predecessor ended.
        assert!(profile.started_at >= last_finish);
        last_finish = profile.finished_at;
    }
}

#[test]
fn unprofiled_commands_have_no_profile() {
    let (_context, queue) = queue_with(QueueOptions::default());
    let event = queue.submit(|| Ok(()));
    event.wait().unwrap();
    assert!(event.profile().is_none());
}

#[test]
fn fault_completes_event_but_not_the_queue() {
    let (_context, queue) = queue_with(QueueOptions::default());

    let failing = queue.submit::<(), _>(|| {
        crate::error::ExecutionSnafu { reason: "synthetic fault" }.fail()
    });
    assert!(matches!(failing.wait().unwrap_err(), Error::Execution { .. }));

    // The queue keeps serving commands after a fault.
    queue.submit(|| Ok(())).wait().unwrap();
}

#[test]
fn drop_drains_pending_commands() {
    let (_context, queue) = queue_with(QueueOptions::default());

    let counter = Arc::new(AtomicUsize::new(0));
    let events: Vec<_> = (0..32)
        .map(|_| {
            let counter = Arc::clone(&counter);
            queue.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();

    drop(queue);

    for event in &events {
        event.wait().unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 32);
}

#[test]
fn wait_from_another_thread() {
    let (_context, queue) = queue_with(QueueOptions::default());
    let event = queue.submit(|| Ok(42u32));

    let waiter = std::thread::spawn(move || event.wait().unwrap());
    assert_eq!(waiter.join().unwrap(), 42);
}
