use harrow_device::QueueOptions;

use crate::test::host_session;
use crate::{BuildOutcome, Error, Program};

const ARITH: &str = r#"
    __kernel void add(__global const float* a, __global const float* b, __global float* out) {
        int i = get_global_id(0);
        out[i] = a[i] + b[i];
    }

    __kernel void multiply(__global float* data, float k) {
        int i = get_global_id(0);
        data[i] = data[i] * k;
    }
"#;

#[test]
fn valid_source_builds_and_exposes_entry_points() {
    let (context, _, _) = host_session(QueueOptions::default());

    let program = Program::build(&context, ARITH).unwrap();
    assert_eq!(program.entry_points(), vec!["add", "multiply"]);

    let kernel = program.kernel("multiply").unwrap();
    assert_eq!(kernel.name(), "multiply");
    assert_eq!(kernel.signature().params.len(), 2);
}

#[test]
fn missing_entry_point_is_entry_not_found() {
    let (context, _, _) = host_session(QueueOptions::default());
    let program = Program::build(&context, ARITH).unwrap();

    let err = program.kernel("divide").unwrap_err();
    assert!(matches!(err, Error::EntryNotFound { ref name } if name == "divide"), "{err}");
}

#[test]
fn invalid_source_fails_with_nonempty_log() {
    let (context, _, _) = host_session(QueueOptions::default());

    let BuildOutcome::Failed { log } =
        Program::try_build(&context, "__kernel void broken( { }")
    else {
        panic!("expected a failed build");
    };
    assert!(!log.is_empty());
    assert!(log.contains("<kernel-source>:"), "log must carry positions:\n{log}");
}

#[test]
fn build_error_variant_carries_the_log() {
    let (context, _, _) = host_session(QueueOptions::default());

    let err = Program::build(&context, "not a kernel at all").unwrap_err();
    let Error::Build { log } = &err else { panic!("expected a build error, got {err}") };
    assert!(log.contains("error"), "{log}");
}

#[test]
fn diagnostics_reference_the_supplied_source_not_a_prior_build() {
    let (context, _, _) = host_session(QueueOptions::default());

    let BuildOutcome::Failed { log: first } =
        Program::try_build(&context, "__kernel void f(__global float* o) { o[0] = alpha; }")
    else {
        panic!("expected a failed build");
    };
    let BuildOutcome::Failed { log: second } =
        Program::try_build(&context, "__kernel void f(__global float* o) { o[0] = omega; }")
    else {
        panic!("expected a failed build");
    };

    assert!(first.contains("alpha") && !first.contains("omega"), "{first}");
    assert!(second.contains("omega") && !second.contains("alpha"), "{second}");
}

#[test]
fn empty_source_fails_instead_of_building_nothing() {
    let (context, _, _) = host_session(QueueOptions::default());

    let BuildOutcome::Failed { log } = Program::try_build(&context, "") else {
        panic!("expected a failed build");
    };
    assert!(log.contains("empty"), "{log}");
}

#[test]
fn rebuilding_corrected_source_succeeds() {
    let (context, _, _) = host_session(QueueOptions::default());

    // A failed program is terminal; recovery is a fresh build from source.
    assert!(Program::build(&context, "__kernel void f() { bogus; }").is_err());
    assert!(Program::build(&context, "__kernel void f() { return; }").is_ok());
}
