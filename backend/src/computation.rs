//! Abstract computation descriptions and compile options.
//!
//! A [`Computation`] is the unit handed to [`Backend::compile`]
//! (crate::Backend::compile): a named expression over parameters, with an
//! optional top-level tuple root for multi-result programs. The client
//! layer treats it as opaque; validation lives here, with the backends.

use veld_shape::{ArrayShape, Literal};

use crate::error::{CompilationSnafu, Result};

/// Expression node. Elementwise ops require operand shapes to agree in
/// element type and dimensions; `Tuple` is only legal as the root.
#[derive(Debug, Clone)]
pub enum Op {
    /// Reference to the i-th parameter.
    Parameter(usize),
    Constant(Literal),
    Add(Box<Op>, Box<Op>),
    Mul(Box<Op>, Box<Op>),
    Neg(Box<Op>),
    /// Pop one value of the given shape from the executing device's infeed
    /// queue.
    Infeed(ArrayShape),
    /// Push the operand's value to the executing device's outfeed queue and
    /// yield it through.
    Outfeed(Box<Op>),
    /// Multi-result root; flattened into its components at execution time.
    Tuple(Vec<Op>),
}

impl Op {
    pub fn parameter(index: usize) -> Self {
        Op::Parameter(index)
    }

    pub fn constant(literal: Literal) -> Self {
        Op::Constant(literal)
    }

    pub fn add(lhs: Op, rhs: Op) -> Self {
        Op::Add(Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(lhs: Op, rhs: Op) -> Self {
        Op::Mul(Box::new(lhs), Box::new(rhs))
    }

    pub fn neg(operand: Op) -> Self {
        Op::Neg(Box::new(operand))
    }

    pub fn infeed(shape: ArrayShape) -> Self {
        Op::Infeed(shape)
    }

    pub fn outfeed(operand: Op) -> Self {
        Op::Outfeed(Box::new(operand))
    }

    pub fn tuple(elements: impl IntoIterator<Item = Op>) -> Self {
        Op::Tuple(elements.into_iter().collect())
    }
}

/// A named computation over typed parameters.
#[derive(Debug, Clone)]
pub struct Computation {
    name: String,
    parameters: Vec<ArrayShape>,
    root: Op,
}

impl Computation {
    pub fn new(name: impl Into<String>, parameters: Vec<ArrayShape>, root: Op) -> Self {
        Self { name: name.into(), parameters, root }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[ArrayShape] {
        &self.parameters
    }

    pub fn root(&self) -> &Op {
        &self.root
    }

    /// Type-check against the declared argument layouts and return the
    /// untupled result shapes, in declaration order.
    ///
    /// This is the "backend compiler" front half; its failures surface to
    /// the client verbatim as compilation errors.
    pub fn validate(&self, argument_layouts: &[ArrayShape]) -> Result<Vec<ArrayShape>> {
        snafu::ensure!(
            argument_layouts.len() == self.parameters.len(),
            CompilationSnafu {
                reason: format!(
                    "computation '{}' declares {} parameters, {} argument layouts supplied",
                    self.name,
                    self.parameters.len(),
                    argument_layouts.len()
                ),
            }
        );
        for (index, (parameter, layout)) in
            self.parameters.iter().zip(argument_layouts).enumerate()
        {
            snafu::ensure!(
                parameter.element_type() == layout.element_type()
                    && parameter.dimensions() == layout.dimensions(),
                CompilationSnafu {
                    reason: format!(
                        "parameter {index} of '{}' is {:?}, argument layout is {:?}",
                        self.name, parameter, layout
                    ),
                }
            );
        }

        match &self.root {
            Op::Tuple(elements) => {
                elements.iter().map(|element| self.infer(element)).collect()
            }
            other => Ok(vec![self.infer(other)?]),
        }
    }

    /// Shape inference for non-tuple subtrees.
    fn infer(&self, op: &Op) -> Result<ArrayShape> {
        match op {
            Op::Parameter(index) => {
                self.parameters.get(*index).cloned().ok_or_else(|| {
                    CompilationSnafu {
                        reason: format!(
                            "parameter index {index} out of bounds in '{}' ({} parameters)",
                            self.name,
                            self.parameters.len()
                        ),
                    }
                    .build()
                })
            }
            Op::Constant(literal) => Ok(literal.shape().clone().without_layout()),
            Op::Add(lhs, rhs) | Op::Mul(lhs, rhs) => {
                let lhs = self.infer(lhs)?;
                let rhs = self.infer(rhs)?;
                snafu::ensure!(
                    lhs.element_type() == rhs.element_type()
                        && lhs.dimensions() == rhs.dimensions(),
                    CompilationSnafu {
                        reason: format!("elementwise operand mismatch: {lhs:?} vs {rhs:?}"),
                    }
                );
                snafu::ensure!(
                    lhs.element_type().is_numeric(),
                    CompilationSnafu {
                        reason: format!("arithmetic on non-numeric {}", lhs.element_type()),
                    }
                );
                Ok(lhs)
            }
            Op::Neg(operand) => {
                let shape = self.infer(operand)?;
                snafu::ensure!(
                    shape.element_type().is_numeric(),
                    CompilationSnafu {
                        reason: format!("negation of non-numeric {}", shape.element_type()),
                    }
                );
                Ok(shape)
            }
            Op::Infeed(shape) => Ok(shape.clone().without_layout()),
            Op::Outfeed(operand) => self.infer(operand),
            Op::Tuple(_) => CompilationSnafu {
                reason: "tuple is only supported as the computation root".to_string(),
            }
            .fail(),
        }
    }

    /// Stable structural digest, the seed of executable fingerprints.
    /// Identical computations digest identically across processes.
    pub fn structural_digest(&self) -> u64 {
        let mut hash = Fnv1a::new();
        hash.write_usize(self.parameters.len());
        for parameter in &self.parameters {
            hash_shape(&mut hash, parameter);
        }
        hash_op(&mut hash, &self.root);
        hash.finish()
    }
}

fn hash_shape(hash: &mut Fnv1a, shape: &ArrayShape) {
    hash.write_usize(shape.element_type() as usize);
    hash.write_usize(shape.rank());
    for &dim in shape.dimensions() {
        hash.write_usize(dim);
    }
}

fn hash_op(hash: &mut Fnv1a, op: &Op) {
    match op {
        Op::Parameter(index) => {
            hash.write_usize(0);
            hash.write_usize(*index);
        }
        Op::Constant(literal) => {
            hash.write_usize(1);
            hash_shape(hash, literal.shape());
            hash.write_bytes(literal.bytes());
        }
        Op::Add(lhs, rhs) => {
            hash.write_usize(2);
            hash_op(hash, lhs);
            hash_op(hash, rhs);
        }
        Op::Mul(lhs, rhs) => {
            hash.write_usize(3);
            hash_op(hash, lhs);
            hash_op(hash, rhs);
        }
        Op::Neg(operand) => {
            hash.write_usize(4);
            hash_op(hash, operand);
        }
        Op::Infeed(shape) => {
            hash.write_usize(5);
            hash_shape(hash, shape);
        }
        Op::Outfeed(operand) => {
            hash.write_usize(6);
            hash_op(hash, operand);
        }
        Op::Tuple(elements) => {
            hash.write_usize(7);
            hash.write_usize(elements.len());
            for element in elements {
                hash_op(hash, element);
            }
        }
    }
}

/// FNV-1a, 64-bit. Enough for identity digests; not cryptographic.
struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(0x100_0000_01b3);
        }
    }

    fn write_usize(&mut self, value: usize) {
        self.write_bytes(&value.to_le_bytes());
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// Build-time options forwarded to the backend compiler.
#[derive(Debug, Clone, bon::Builder)]
pub struct BuildOptions {
    /// Replica count requested at build time. Only single-group execution
    /// is implemented; values above 1 are accepted and recorded.
    #[builder(default = 1)]
    pub num_replicas: u32,

    /// Override for the compiled program's name.
    pub program_name: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Everything a backend needs to compile a computation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Required parameter layouts. The client clears caller layouts before
    /// compilation; layout here is a backend decision.
    pub argument_layouts: Vec<ArrayShape>,
    /// Compile for single-device portable execution.
    pub portable: bool,
    pub build: BuildOptions,
}
