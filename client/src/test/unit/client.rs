use veld_backend::{BuildOptions, Computation, GpuOptions, Op, Platform};
use veld_shape::{ArrayShape, ElementType, Shape};

use crate::client::Client;
use crate::error::Error;

fn identity_computation() -> (Computation, Vec<ArrayShape>) {
    let parameter = ArrayShape::new(ElementType::F32, [4]);
    let computation =
        Computation::new("identity", vec![parameter.clone()], Op::parameter(0));
    (computation, vec![parameter])
}

#[test]
fn factories_report_their_platform() {
    assert_eq!(Client::cpu().unwrap().platform(), Platform::Cpu);
    assert_eq!(Client::gpu(GpuOptions::default()).unwrap().platform(), Platform::Gpu);
    assert_eq!(Client::tpu().unwrap().platform(), Platform::Tpu);
}

#[test]
fn gpu_factory_propagates_bad_options() {
    let options = GpuOptions::builder().memory_fraction(2.0).build();
    assert!(matches!(Client::gpu(options), Err(Error::Backend { .. })));
}

#[test]
fn unresolvable_device_id_is_invalid_argument() {
    let client = Client::cpu().unwrap();
    assert!(matches!(
        client.resolve_device(Some(7)),
        Err(Error::InvalidArgument { .. })
    ));
    // The default assignment is device 0.
    assert_eq!(client.resolve_device(None).unwrap().id(), 0);
}

#[test]
fn buffer_creation_rejects_tuple_shapes() {
    let client = Client::cpu().unwrap();
    let shape = Shape::tuple([
        Shape::array(ElementType::F32, [2]),
        Shape::array(ElementType::F32, [2]),
    ]);
    assert!(matches!(
        client.buffer_from_host_bytes(&[0u8; 16], &shape, 0, false),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn buffer_creation_rejects_size_mismatch() {
    let client = Client::cpu().unwrap();
    let shape = Shape::array(ElementType::F32, [4]);
    assert!(matches!(
        client.buffer_from_host_bytes(&[0u8; 3], &shape, 0, false),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn buffer_creation_rejects_unknown_device() {
    let client = Client::cpu().unwrap();
    let shape = Shape::array(ElementType::U8, [4]);
    assert!(matches!(
        client.buffer_from_host_bytes(&[0u8; 4], &shape, 9, false),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn compile_strips_caller_layouts() {
    let client = Client::cpu().unwrap();
    let (computation, shapes) = identity_computation();

    // Caller-supplied layouts are a suggestion the compiler ignores.
    let annotated: Vec<ArrayShape> = shapes
        .iter()
        .map(|shape| {
            shape
                .clone()
                .with_layout(veld_shape::Layout::column_major(shape.rank()))
                .unwrap()
        })
        .collect();

    let executable = client
        .compile(&computation, &annotated, BuildOptions::default(), true)
        .unwrap();
    assert_eq!(executable.name(), "identity");
}

#[test]
fn compile_failure_passes_through() {
    let client = Client::cpu().unwrap();
    let (computation, _) = identity_computation();
    // Wrong argument count is a backend compiler rejection, not a client one.
    let result = client.compile(&computation, &[], BuildOptions::default(), true);
    assert!(matches!(result, Err(Error::Backend { .. })));
}

#[test]
fn fingerprints_follow_backend_support() {
    let (computation, shapes) = identity_computation();

    let cpu = Client::cpu().unwrap();
    let first = cpu
        .compile(&computation, &shapes, BuildOptions::default(), true)
        .unwrap();
    let second = cpu
        .compile(&computation, &shapes, BuildOptions::default(), true)
        .unwrap();
    assert!(first.fingerprint().is_some());
    assert_eq!(first.fingerprint(), second.fingerprint());

    let gpu = Client::gpu(GpuOptions::default()).unwrap();
    let on_gpu = gpu
        .compile(&computation, &shapes, BuildOptions::default(), true)
        .unwrap();
    assert_ne!(first.fingerprint(), on_gpu.fingerprint());

    let tpu = Client::tpu().unwrap();
    let on_tpu = tpu
        .compile(&computation, &shapes, BuildOptions::default(), true)
        .unwrap();
    assert!(on_tpu.fingerprint().is_none());
}
