//! Compiled programs and the interpreter that backs every platform.
//!
//! The [`Program`] trait is the seam a real accelerator lowering would slot
//! into; here all three backends share [`InterpreterProgram`], which
//! evaluates the computation in host-canonical layout and writes results
//! through the executing device's layout convention.

use std::sync::Arc;

use veld_shape::{ArrayShape, ElementType, Layout, Literal, NativeType};

use crate::computation::{CompileOptions, Computation, Op};
use crate::device::Device;
use crate::error::{ExecutionSnafu, Result};
use crate::memory::DeviceMemory;

/// A compiled, repeatedly executable program.
///
/// Results are always untupled: a top-level tuple root yields one entry per
/// component, in declaration order. Argument shape checking is relaxed —
/// element type and element count must match the compiled parameter, layout
/// and dimension grouping may differ.
pub trait Program: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Stable structural digest of the source computation; backends derive
    /// executable fingerprints from it.
    fn digest(&self) -> u64;

    fn execute(
        &self,
        device: &Arc<Device>,
        arguments: &[(DeviceMemory, ArrayShape)],
    ) -> Result<Vec<(DeviceMemory, ArrayShape)>>;
}

/// The shared interpreter implementation of [`Program`].
#[derive(Debug)]
pub struct InterpreterProgram {
    name: String,
    parameters: Vec<ArrayShape>,
    root: Op,
    digest: u64,
}

/// Validate and "compile" a computation for interpretation.
pub(crate) fn compile_interpreter(
    computation: &Computation,
    options: &CompileOptions,
) -> Result<Arc<dyn Program>> {
    computation.validate(&options.argument_layouts)?;

    let name = options
        .build
        .program_name
        .clone()
        .unwrap_or_else(|| computation.name().to_string());

    tracing::debug!(
        program = %name,
        parameters = computation.parameters().len(),
        portable = options.portable,
        num_replicas = options.build.num_replicas,
        "computation compiled"
    );

    Ok(Arc::new(InterpreterProgram {
        name,
        parameters: computation.parameters().to_vec(),
        root: computation.root().clone(),
        digest: computation.structural_digest(),
    }))
}

impl Program for InterpreterProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn digest(&self) -> u64 {
        self.digest
    }

    fn execute(
        &self,
        device: &Arc<Device>,
        arguments: &[(DeviceMemory, ArrayShape)],
    ) -> Result<Vec<(DeviceMemory, ArrayShape)>> {
        snafu::ensure!(
            arguments.len() == self.parameters.len(),
            ExecutionSnafu {
                reason: format!(
                    "program '{}' takes {} arguments, got {}",
                    self.name,
                    self.parameters.len(),
                    arguments.len()
                ),
            }
        );

        // Materialize arguments into canonical row-major values. Shape
        // checking is relaxed: type and element count only.
        let mut bound = Vec::with_capacity(arguments.len());
        for ((memory, shape), parameter) in arguments.iter().zip(&self.parameters) {
            snafu::ensure!(
                shape.element_type() == parameter.element_type()
                    && shape.element_count() == parameter.element_count(),
                ExecutionSnafu {
                    reason: format!(
                        "argument {:?} incompatible with parameter {:?}",
                        shape, parameter
                    ),
                }
            );
            let literal = device.transfer_from_device(memory, shape)?;
            let canonical = literal
                .relayout(&Layout::row_major(shape.rank()))
                .map_err(|source| crate::error::Error::Shape { source })?;
            bound.push(canonical);
        }

        let values = match &self.root {
            Op::Tuple(elements) => elements
                .iter()
                .map(|element| self.eval(element, device, &bound))
                .collect::<Result<Vec<_>>>()?,
            other => vec![self.eval(other, device, &bound)?],
        };

        // Write results back through the device's layout convention.
        let mut results = Vec::with_capacity(values.len());
        for value in values {
            let device_layout = device.device_layout(value.shape().rank());
            let on_device = value
                .relayout(&device_layout)
                .map_err(|source| crate::error::Error::Shape { source })?;

            let memory = device.allocator().alloc(on_device.size_in_bytes())?;
            memory.fill_from(on_device.bytes())?;
            memory.ready().set_ready();
            results.push((memory, on_device.shape().clone()));
        }

        tracing::debug!(
            program = %self.name,
            device = device.id(),
            results = results.len(),
            "program executed"
        );

        Ok(results)
    }
}

impl InterpreterProgram {
    fn eval(&self, op: &Op, device: &Arc<Device>, bound: &[Literal]) -> Result<Literal> {
        match op {
            Op::Parameter(index) => Ok(bound[*index].clone()),
            Op::Constant(literal) => literal
                .relayout(&Layout::row_major(literal.shape().rank()))
                .map_err(|source| crate::error::Error::Shape { source }),
            Op::Add(lhs, rhs) => {
                let lhs = self.eval(lhs, device, bound)?;
                let rhs = self.eval(rhs, device, bound)?;
                let bytes =
                    add_bytes(lhs.shape().element_type(), lhs.bytes(), rhs.bytes())?;
                Literal::new(lhs.shape().clone(), bytes)
                    .map_err(|source| crate::error::Error::Shape { source })
            }
            Op::Mul(lhs, rhs) => {
                let lhs = self.eval(lhs, device, bound)?;
                let rhs = self.eval(rhs, device, bound)?;
                let bytes =
                    mul_bytes(lhs.shape().element_type(), lhs.bytes(), rhs.bytes())?;
                Literal::new(lhs.shape().clone(), bytes)
                    .map_err(|source| crate::error::Error::Shape { source })
            }
            Op::Neg(operand) => {
                let operand = self.eval(operand, device, bound)?;
                let bytes = neg_bytes(operand.shape().element_type(), operand.bytes())?;
                Literal::new(operand.shape().clone(), bytes)
                    .map_err(|source| crate::error::Error::Shape { source })
            }
            Op::Infeed(shape) => {
                let literal = device.infeed().pop_blocking();
                snafu::ensure!(
                    literal.shape().element_type() == shape.element_type()
                        && literal.shape().dimensions() == shape.dimensions(),
                    ExecutionSnafu {
                        reason: format!(
                            "infeed produced {:?}, program expected {:?}",
                            literal.shape(),
                            shape
                        ),
                    }
                );
                literal
                    .relayout(&Layout::row_major(shape.rank()))
                    .map_err(|source| crate::error::Error::Shape { source })
            }
            Op::Outfeed(operand) => {
                let value = self.eval(operand, device, bound)?;
                device.outfeed().push(value.clone());
                Ok(value)
            }
            Op::Tuple(_) => ExecutionSnafu {
                reason: "tuple is only supported as the computation root".to_string(),
            }
            .fail(),
        }
    }
}

fn zip_map<T: NativeType>(lhs: &[u8], rhs: &[u8], op: impl Fn(T, T) -> T) -> Vec<u8> {
    let size = T::ELEMENT_TYPE.size_in_bytes();
    lhs.chunks_exact(size)
        .zip(rhs.chunks_exact(size))
        .flat_map(|(a, b)| op(T::from_ne_bytes(a), T::from_ne_bytes(b)).to_ne_bytes())
        .collect()
}

fn map<T: NativeType>(operand: &[u8], op: impl Fn(T) -> T) -> Vec<u8> {
    let size = T::ELEMENT_TYPE.size_in_bytes();
    operand.chunks_exact(size).flat_map(|a| op(T::from_ne_bytes(a)).to_ne_bytes()).collect()
}

fn add_bytes(element_type: ElementType, lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>> {
    Ok(match element_type {
        ElementType::S8 => zip_map::<i8>(lhs, rhs, i8::wrapping_add),
        ElementType::S16 => zip_map::<i16>(lhs, rhs, i16::wrapping_add),
        ElementType::S32 => zip_map::<i32>(lhs, rhs, i32::wrapping_add),
        ElementType::S64 => zip_map::<i64>(lhs, rhs, i64::wrapping_add),
        ElementType::U8 => zip_map::<u8>(lhs, rhs, u8::wrapping_add),
        ElementType::U16 => zip_map::<u16>(lhs, rhs, u16::wrapping_add),
        ElementType::U32 => zip_map::<u32>(lhs, rhs, u32::wrapping_add),
        ElementType::U64 => zip_map::<u64>(lhs, rhs, u64::wrapping_add),
        ElementType::F32 => zip_map::<f32>(lhs, rhs, |a, b| a + b),
        ElementType::F64 => zip_map::<f64>(lhs, rhs, |a, b| a + b),
        ElementType::Pred => {
            return ExecutionSnafu { reason: "arithmetic on Pred".to_string() }.fail();
        }
    })
}

fn mul_bytes(element_type: ElementType, lhs: &[u8], rhs: &[u8]) -> Result<Vec<u8>> {
    Ok(match element_type {
        ElementType::S8 => zip_map::<i8>(lhs, rhs, i8::wrapping_mul),
        ElementType::S16 => zip_map::<i16>(lhs, rhs, i16::wrapping_mul),
        ElementType::S32 => zip_map::<i32>(lhs, rhs, i32::wrapping_mul),
        ElementType::S64 => zip_map::<i64>(lhs, rhs, i64::wrapping_mul),
        ElementType::U8 => zip_map::<u8>(lhs, rhs, u8::wrapping_mul),
        ElementType::U16 => zip_map::<u16>(lhs, rhs, u16::wrapping_mul),
        ElementType::U32 => zip_map::<u32>(lhs, rhs, u32::wrapping_mul),
        ElementType::U64 => zip_map::<u64>(lhs, rhs, u64::wrapping_mul),
        ElementType::F32 => zip_map::<f32>(lhs, rhs, |a, b| a * b),
        ElementType::F64 => zip_map::<f64>(lhs, rhs, |a, b| a * b),
        ElementType::Pred => {
            return ExecutionSnafu { reason: "arithmetic on Pred".to_string() }.fail();
        }
    })
}

fn neg_bytes(element_type: ElementType, operand: &[u8]) -> Result<Vec<u8>> {
    Ok(match element_type {
        ElementType::S8 => map::<i8>(operand, i8::wrapping_neg),
        ElementType::S16 => map::<i16>(operand, i16::wrapping_neg),
        ElementType::S32 => map::<i32>(operand, i32::wrapping_neg),
        ElementType::S64 => map::<i64>(operand, i64::wrapping_neg),
        ElementType::U8 => map::<u8>(operand, u8::wrapping_neg),
        ElementType::U16 => map::<u16>(operand, u16::wrapping_neg),
        ElementType::U32 => map::<u32>(operand, u32::wrapping_neg),
        ElementType::U64 => map::<u64>(operand, u64::wrapping_neg),
        ElementType::F32 => map::<f32>(operand, |a| -a),
        ElementType::F64 => map::<f64>(operand, |a| -a),
        ElementType::Pred => {
            return ExecutionSnafu { reason: "arithmetic on Pred".to_string() }.fail();
        }
    })
}
