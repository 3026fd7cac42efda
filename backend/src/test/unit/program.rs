use veld_shape::{ArrayShape, ElementType, Literal};

use crate::backend::{Backend, CpuBackend};
use crate::computation::{BuildOptions, CompileOptions, Computation, Op};

fn options_for(computation: &Computation) -> CompileOptions {
    CompileOptions {
        argument_layouts: computation.parameters().to_vec(),
        portable: true,
        build: BuildOptions::default(),
    }
}

fn f32_param(elements: usize) -> ArrayShape {
    ArrayShape::new(ElementType::F32, [elements])
}

#[test]
fn add_two_parameters() {
    let backend = CpuBackend::new().unwrap();
    let device = backend.device(0).unwrap();

    let computation = Computation::new(
        "add",
        vec![f32_param(3), f32_param(3)],
        Op::add(Op::parameter(0), Op::parameter(1)),
    );
    let program = backend.compile(&computation, &options_for(&computation)).unwrap();

    let lhs = Literal::from_slice(&[1.0f32, 2.0, 3.0], &[3]).unwrap();
    let rhs = Literal::from_slice(&[10.0f32, 20.0, 30.0], &[3]).unwrap();
    let lhs_arg = device.transfer_to_device(lhs.bytes(), lhs.shape()).unwrap();
    let rhs_arg = device.transfer_to_device(rhs.bytes(), rhs.shape()).unwrap();

    let results = program.execute(&device, &[lhs_arg, rhs_arg]).unwrap();
    assert_eq!(results.len(), 1);

    let (memory, shape) = &results[0];
    let value = device.transfer_from_device(memory, shape).unwrap();
    assert_eq!(value.to_vec::<f32>(), vec![11.0, 22.0, 33.0]);
}

#[test]
fn tuple_root_is_untupled() {
    let backend = CpuBackend::new().unwrap();
    let device = backend.device(0).unwrap();

    let computation = Computation::new(
        "three",
        vec![f32_param(2)],
        Op::tuple([
            Op::parameter(0),
            Op::neg(Op::parameter(0)),
            Op::mul(Op::parameter(0), Op::parameter(0)),
        ]),
    );
    let program = backend.compile(&computation, &options_for(&computation)).unwrap();

    let input = Literal::from_slice(&[2.0f32, -3.0], &[2]).unwrap();
    let argument = device.transfer_to_device(input.bytes(), input.shape()).unwrap();

    let results = program.execute(&device, &[argument]).unwrap();
    assert_eq!(results.len(), 3);

    let values: Vec<Vec<f32>> = results
        .iter()
        .map(|(memory, shape)| {
            device.transfer_from_device(memory, shape).unwrap().to_vec::<f32>()
        })
        .collect();
    assert_eq!(values[0], vec![2.0, -3.0]);
    assert_eq!(values[1], vec![-2.0, 3.0]);
    assert_eq!(values[2], vec![4.0, 9.0]);
}

#[test]
fn integer_arithmetic_wraps() {
    let backend = CpuBackend::new().unwrap();
    let device = backend.device(0).unwrap();

    let parameter = ArrayShape::new(ElementType::U8, [1]);
    let computation = Computation::new(
        "wrap",
        vec![parameter.clone(), parameter],
        Op::add(Op::parameter(0), Op::parameter(1)),
    );
    let program = backend.compile(&computation, &options_for(&computation)).unwrap();

    let lhs = Literal::from_slice(&[250u8], &[1]).unwrap();
    let rhs = Literal::from_slice(&[10u8], &[1]).unwrap();
    let lhs_arg = device.transfer_to_device(lhs.bytes(), lhs.shape()).unwrap();
    let rhs_arg = device.transfer_to_device(rhs.bytes(), rhs.shape()).unwrap();

    let results = program.execute(&device, &[lhs_arg, rhs_arg]).unwrap();
    let value = device.transfer_from_device(&results[0].0, &results[0].1).unwrap();
    assert_eq!(value.to_vec::<u8>(), vec![4]);
}

#[test]
fn compile_rejects_parameter_count_mismatch() {
    let backend = CpuBackend::new().unwrap();
    let computation =
        Computation::new("one", vec![f32_param(2)], Op::parameter(0));
    let options = CompileOptions {
        argument_layouts: vec![],
        portable: true,
        build: BuildOptions::default(),
    };
    assert!(backend.compile(&computation, &options).is_err());
}

#[test]
fn compile_rejects_nested_tuple_root() {
    let backend = CpuBackend::new().unwrap();
    let computation = Computation::new(
        "nested",
        vec![f32_param(2)],
        Op::tuple([Op::tuple([Op::parameter(0)])]),
    );
    assert!(backend.compile(&computation, &options_for(&computation)).is_err());
}

#[test]
fn compile_rejects_operand_mismatch() {
    let backend = CpuBackend::new().unwrap();
    let computation = Computation::new(
        "mismatch",
        vec![f32_param(2), f32_param(3)],
        Op::add(Op::parameter(0), Op::parameter(1)),
    );
    assert!(backend.compile(&computation, &options_for(&computation)).is_err());
}

#[test]
fn execute_rejects_argument_count_mismatch() {
    let backend = CpuBackend::new().unwrap();
    let device = backend.device(0).unwrap();

    let computation =
        Computation::new("identity", vec![f32_param(2)], Op::parameter(0));
    let program = backend.compile(&computation, &options_for(&computation)).unwrap();
    assert!(program.execute(&device, &[]).is_err());
}

#[test]
fn infeed_and_outfeed_ops() {
    let backend = CpuBackend::new().unwrap();
    let device = backend.device(0).unwrap();

    let infeed_shape = ArrayShape::new(ElementType::F32, [2]);
    let computation = Computation::new(
        "stream",
        vec![],
        Op::outfeed(Op::neg(Op::infeed(infeed_shape))),
    );
    let program = backend.compile(&computation, &options_for(&computation)).unwrap();

    device.infeed().push(Literal::from_slice(&[1.0f32, -2.0], &[2]).unwrap());

    let results = program.execute(&device, &[]).unwrap();
    assert_eq!(results.len(), 1);
    assert!(device.infeed().is_empty());

    let streamed = device.outfeed().pop_blocking();
    assert_eq!(streamed.to_vec::<f32>(), vec![-1.0, 2.0]);
}

#[test]
fn constants_participate() {
    let backend = CpuBackend::new().unwrap();
    let device = backend.device(0).unwrap();

    let bias = Literal::from_slice(&[100i32, 200], &[2]).unwrap();
    let computation = Computation::new(
        "bias",
        vec![ArrayShape::new(ElementType::S32, [2])],
        Op::add(Op::parameter(0), Op::constant(bias)),
    );
    let program = backend.compile(&computation, &options_for(&computation)).unwrap();

    let input = Literal::from_slice(&[1i32, 2], &[2]).unwrap();
    let argument = device.transfer_to_device(input.bytes(), input.shape()).unwrap();

    let results = program.execute(&device, &[argument]).unwrap();
    let value = device.transfer_from_device(&results[0].0, &results[0].1).unwrap();
    assert_eq!(value.to_vec::<i32>(), vec![101, 202]);
}
