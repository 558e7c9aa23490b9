use crate::platform::Platform;
use crate::test::stub::StubDriver;
use crate::{Context, Error};

#[test]
fn context_over_platform_devices() {
    let platform = Platform::new(StubDriver::with_devices(2));
    let devices = platform.devices().unwrap();

    let context = Context::new(&devices).unwrap();
    assert_eq!(context.devices().len(), 2);
    assert!(context.contains(&devices[0]));
    assert!(context.contains(&devices[1]));
}

#[test]
fn empty_device_set_is_rejected() {
    let err = Context::new(&[]).unwrap_err();
    assert!(matches!(err, Error::ContextCreation { .. }), "{err}");
}

#[test]
fn mixed_platform_devices_are_rejected() {
    let a = Platform::new(StubDriver::with_devices(1)).devices().unwrap();
    let b = Platform::new(StubDriver::with_devices(1)).devices().unwrap();

    let err = Context::new(&[a[0].clone(), b[0].clone()]).unwrap_err();
    assert!(matches!(err, Error::ContextCreation { .. }), "{err}");
}

#[test]
fn foreign_device_is_not_contained() {
    let a = Platform::new(StubDriver::with_devices(1)).devices().unwrap();
    let b = Platform::new(StubDriver::with_devices(1)).devices().unwrap();

    let context = Context::new(&a).unwrap();
    assert!(!context.contains(&b[0]));
}

#[test]
fn zero_devices_reported_as_no_device_found() {
    let platform = Platform::new(StubDriver::with_devices(0));
    let err = platform.devices().unwrap_err();
    assert!(matches!(err, Error::NoDeviceFound { .. }), "{err}");
}
