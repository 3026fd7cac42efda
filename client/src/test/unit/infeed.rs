use veld_backend::{BuildOptions, Computation, Op};
use veld_shape::{ArrayShape, ElementType, Shape};

use crate::client::Client;
use crate::error::Error;
use crate::executable::{RunOptions, RunValue};

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_ne_bytes()).collect()
}

fn f32_values(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_ne_bytes(chunk.try_into().unwrap()))
        .collect()
}

#[test]
fn nested_tuple_is_rejected_before_any_transfer() {
    let client = Client::cpu().unwrap();
    let device = client.resolve_device(None).unwrap();
    let shape = Shape::tuple([
        Shape::array(ElementType::F32, [2]),
        Shape::tuple([Shape::array(ElementType::F32, [2])]),
    ]);

    let payload = f32_bytes(&[1.0, 2.0]);
    let result =
        client.transfer_to_infeed(&[&payload, &payload], &shape, 0);

    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    assert!(device.infeed().is_empty());
}

#[test]
fn one_level_tuple_enqueues_components_in_order() {
    let client = Client::cpu().unwrap();
    let device = client.resolve_device(None).unwrap();
    let shape = Shape::tuple([
        Shape::array(ElementType::F32, [2]),
        Shape::array(ElementType::F32, [1]),
    ]);

    let first = f32_bytes(&[1.0, 2.0]);
    let second = f32_bytes(&[3.0]);
    client.transfer_to_infeed(&[&first, &second], &shape, 0).unwrap();

    assert_eq!(device.infeed().len(), 2);
    assert_eq!(device.infeed().try_pop().unwrap().bytes(), first.as_slice());
    assert_eq!(device.infeed().try_pop().unwrap().bytes(), second.as_slice());
}

#[test]
fn tuple_component_count_mismatch_is_rejected() {
    let client = Client::cpu().unwrap();
    let device = client.resolve_device(None).unwrap();
    let shape = Shape::tuple([
        Shape::array(ElementType::F32, [2]),
        Shape::array(ElementType::F32, [2]),
    ]);

    let payload = f32_bytes(&[1.0, 2.0]);
    let result = client.transfer_to_infeed(&[&payload], &shape, 0);
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    assert!(device.infeed().is_empty());
}

#[test]
fn non_tuple_shape_requires_one_payload() {
    let client = Client::cpu().unwrap();
    let shape = Shape::array(ElementType::F32, [2]);

    let result = client.transfer_to_infeed(&[], &shape, 0);
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));

    let payload = f32_bytes(&[1.0, 2.0]);
    client.transfer_to_infeed(&[&payload], &shape, 0).unwrap();
}

#[test]
fn infeed_payload_size_mismatch_is_invalid_argument() {
    let client = Client::cpu().unwrap();
    let shape = Shape::array(ElementType::F32, [4]);
    let short = f32_bytes(&[1.0]);
    assert!(matches!(
        client.transfer_to_infeed(&[&short], &shape, 0),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn streamed_data_flows_through_a_running_program() {
    let client = Client::cpu().unwrap();
    let element = ArrayShape::new(ElementType::F32, [2]);
    let computation = Computation::new(
        "stream",
        vec![],
        Op::outfeed(Op::neg(Op::infeed(element))),
    );
    let executable = client
        .compile(&computation, &[], BuildOptions::default(), true)
        .unwrap();

    let shape = Shape::array(ElementType::F32, [2]);
    let payload = f32_bytes(&[1.0, -4.0]);
    client.transfer_to_infeed(&[&payload], &shape, 0).unwrap();

    let outcome = executable.run(vec![], &RunOptions::default()).unwrap();
    match &outcome.outputs[0] {
        RunValue::Bytes(bytes) => assert_eq!(f32_values(bytes), vec![-1.0, 4.0]),
        RunValue::Buffer(_) => panic!("expected host bytes"),
    }

    let streamed = client.transfer_from_outfeed(0, &shape).unwrap();
    assert_eq!(f32_values(&streamed), vec![-1.0, 4.0]);
}

#[test]
fn outfeed_rejects_tuple_shapes() {
    let client = Client::cpu().unwrap();
    let shape = Shape::tuple([Shape::array(ElementType::F32, [2])]);
    assert!(matches!(
        client.transfer_from_outfeed(0, &shape),
        Err(Error::InvalidArgument { .. })
    ));
}
