//! Deferred interval tensors.
//!
//! A [`SymbolicInterval`] is a node in a shared expression graph. Building
//! one only records the operation and checks shapes; bounds are computed
//! when an [`Evaluator`] resolves the graph against concrete [`Bindings`].
//! Nodes reached by several paths are evaluated once per evaluator.

use crate::broadcast::broadcast_shapes;
use crate::interval::Interval;
use crate::kernels::{self, ConvParams};
use crate::BoundedTensor;
use derest_core::{
    shape_mismatch_err, DerestError, Exponent, Fill, IntervalConfig, LrnParams, PoolMode,
    PoolParams, Result,
};
use ndarray::{Array2, ArrayD};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Concrete values for the named inputs of a symbolic graph.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, BoundedTensor>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: BoundedTensor) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: BoundedTensor) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&BoundedTensor> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum UnaryOp {
    AddScalar(f64),
    Scale(f64),
    Reciprocal,
    Neg,
    Exp,
    Square,
    Power(Exponent),
    MaxScalar(f64),
    Abs,
    Reshape,
}

#[derive(Debug, Clone, Copy)]
enum BinaryOp {
    Add,
    Sub,
    Antiadd,
    Mul,
    Div,
    Max,
}

#[derive(Debug, Clone, Copy)]
enum ArrayOp {
    Add,
    Mul,
    Div,
}

#[derive(Debug, Clone)]
enum KernelOp {
    Softmax,
    Norm(LrnParams),
    Conv(Arc<ConvParams>),
    Pool(PoolParams, PoolMode),
    DRelu,
    DMaxPool(PoolParams),
    DAvgPool(Vec<usize>, PoolParams),
    DNorm(LrnParams),
    DConv(Vec<usize>, Arc<ConvParams>),
}

#[derive(Debug)]
enum Node {
    Input(String),
    Constant(BoundedTensor),
    Unary(UnaryOp, SymbolicInterval),
    Binary(BinaryOp, SymbolicInterval, SymbolicInterval),
    WithArray(ArrayOp, SymbolicInterval, Arc<ArrayD<f64>>),
    Dot(SymbolicInterval, Arc<Array2<f64>>),
    /// Kernels take the tensor being transformed first, then any activation.
    Kernel(KernelOp, Vec<SymbolicInterval>),
}

/// A lazily evaluated interval tensor with a statically known shape.
#[derive(Debug, Clone)]
pub struct SymbolicInterval {
    node: Arc<Node>,
    shape: Vec<usize>,
}

impl SymbolicInterval {
    fn with_node(node: Node, shape: Vec<usize>) -> Self {
        Self {
            node: Arc::new(node),
            shape,
        }
    }

    /// A named input, resolved from the bindings at evaluation time.
    pub fn input(name: impl Into<String>, shape: &[usize]) -> Self {
        Self::with_node(Node::Input(name.into()), shape.to_vec())
    }

    pub fn constant(value: BoundedTensor) -> Self {
        let shape = value.shape().to_vec();
        Self::with_node(Node::Constant(value), shape)
    }

    /// Number of distinct nodes reachable from this one.
    pub fn node_count(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![self];
        while let Some(s) = stack.pop() {
            if !seen.insert(s.key()) {
                continue;
            }
            stack.extend(s.children());
        }
        seen.len()
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.node) as usize
    }

    fn children(&self) -> Vec<&SymbolicInterval> {
        match self.node.as_ref() {
            Node::Input(_) | Node::Constant(_) => Vec::new(),
            Node::Unary(_, a) | Node::WithArray(_, a, _) | Node::Dot(a, _) => vec![a],
            Node::Binary(_, a, b) => vec![a, b],
            Node::Kernel(_, args) => args.iter().collect(),
        }
    }

    fn unary(&self, op: UnaryOp) -> Self {
        Self::with_node(Node::Unary(op, self.clone()), self.shape.clone())
    }

    fn binary(&self, op: BinaryOp, other: &Self) -> Result<Self> {
        let shape = broadcast_shapes(&self.shape, &other.shape)?;
        Ok(Self::with_node(
            Node::Binary(op, self.clone(), other.clone()),
            shape,
        ))
    }

    fn with_array(&self, op: ArrayOp, array: &ArrayD<f64>) -> Result<Self> {
        let shape = broadcast_shapes(&self.shape, array.shape())?;
        Ok(Self::with_node(
            Node::WithArray(op, self.clone(), Arc::new(array.clone())),
            shape,
        ))
    }

    fn kernel(op: KernelOp, args: Vec<SymbolicInterval>, shape: Vec<usize>) -> Self {
        Self::with_node(Node::Kernel(op, args), shape)
    }
}

/// Evaluates symbolic graphs, caching each node's bounds.
///
/// One evaluator shares work across every tensor it evaluates; use a fresh
/// one per set of bindings.
pub struct Evaluator<'a> {
    bindings: &'a Bindings,
    cache: HashMap<usize, BoundedTensor>,
}

impl<'a> Evaluator<'a> {
    pub fn new(bindings: &'a Bindings) -> Self {
        Self {
            bindings,
            cache: HashMap::new(),
        }
    }

    /// Number of nodes evaluated so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn eval(&mut self, s: &SymbolicInterval) -> Result<BoundedTensor> {
        if let Some(hit) = self.cache.get(&s.key()) {
            return Ok(hit.clone());
        }
        let value = self.compute(s)?;
        self.cache.insert(s.key(), value.clone());
        Ok(value)
    }

    fn compute(&mut self, s: &SymbolicInterval) -> Result<BoundedTensor> {
        let value = match s.node.as_ref() {
            Node::Input(name) => {
                let bound = self
                    .bindings
                    .get(name)
                    .ok_or_else(|| DerestError::UnboundInput(name.clone()))?;
                if bound.shape() != s.shape.as_slice() {
                    return Err(shape_mismatch_err!(s.shape.clone(), bound.shape().to_vec()));
                }
                trace!(input = %name, shape = ?s.shape, "resolved symbolic input");
                bound.clone()
            }
            Node::Constant(value) => value.clone(),
            Node::Unary(op, arg) => {
                let a = self.eval(arg)?;
                match *op {
                    UnaryOp::AddScalar(v) => a.add_scalar(v),
                    UnaryOp::Scale(f) => a.scale(f),
                    UnaryOp::Reciprocal => a.reciprocal(),
                    UnaryOp::Neg => a.neg(),
                    UnaryOp::Exp => a.exp(),
                    UnaryOp::Square => a.square(),
                    UnaryOp::Power(e) => a.power(e),
                    UnaryOp::MaxScalar(v) => a.max_scalar(v),
                    UnaryOp::Abs => a.abs(),
                    UnaryOp::Reshape => Interval::reshape(&a, &s.shape)?,
                }
            }
            Node::Binary(op, lhs, rhs) => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                match op {
                    BinaryOp::Add => a.add(&b)?,
                    BinaryOp::Sub => a.sub(&b)?,
                    BinaryOp::Antiadd => a.antiadd(&b)?,
                    BinaryOp::Mul => a.mul(&b)?,
                    BinaryOp::Div => a.div(&b)?,
                    BinaryOp::Max => Interval::max(&a, &b)?,
                }
            }
            Node::WithArray(op, arg, array) => {
                let a = self.eval(arg)?;
                match op {
                    ArrayOp::Add => a.add_array(array)?,
                    ArrayOp::Mul => a.mul_array(array)?,
                    ArrayOp::Div => a.div_array(array)?,
                }
            }
            Node::Dot(arg, weights) => self.eval(arg)?.dot(weights)?,
            Node::Kernel(op, args) => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>>>()?;
                let x = &values[0];
                match op {
                    KernelOp::Softmax => kernels::softmax(x)?,
                    KernelOp::Norm(p) => kernels::norm_forward(x, p)?,
                    KernelOp::Conv(conv) => kernels::conv_forward(x, conv)?,
                    KernelOp::Pool(pool, mode) => kernels::pool_forward(x, pool, *mode)?,
                    KernelOp::DRelu => kernels::d_relu(x, &values[1])?,
                    KernelOp::DMaxPool(pool) => kernels::max_pool_backward(x, &values[1], pool)?,
                    KernelOp::DAvgPool(shape, pool) => kernels::avg_pool_backward(x, shape, pool)?,
                    KernelOp::DNorm(p) => kernels::norm_backward(x, &values[1], p)?,
                    KernelOp::DConv(shape, conv) => kernels::conv_backward(x, shape, conv)?,
                }
            }
        };
        Ok(value)
    }
}

/// Evaluate several symbolic tensors against one set of bindings, sharing
/// the work of common subgraphs.
pub fn eval_many(items: &[&SymbolicInterval], bindings: &Bindings) -> Result<Vec<BoundedTensor>> {
    let mut evaluator = Evaluator::new(bindings);
    let out = items
        .iter()
        .map(|s| evaluator.eval(s))
        .collect::<Result<Vec<_>>>()?;
    trace!(tensors = items.len(), nodes = evaluator.cached(), "evaluated symbolic batch");
    Ok(out)
}

/// Shape of a backward result: `dout`'s batch with the input's other axes.
fn batched_input_shape(dout: &[usize], input_shape: &[usize]) -> Vec<usize> {
    let mut shape = input_shape.to_vec();
    if let (Some(first), Some(&batch)) = (shape.first_mut(), dout.first()) {
        *first = batch;
    }
    shape
}

impl Interval for SymbolicInterval {
    fn from_arrays(
        lower: ArrayD<f64>,
        upper: ArrayD<f64>,
        config: &IntervalConfig,
    ) -> Result<Self> {
        Ok(Self::constant(BoundedTensor::new_with_config(lower, upper, config)?))
    }

    fn from_shape(
        shape: &[usize],
        fill: Fill,
        lower: Option<f64>,
        upper: Option<f64>,
        config: &IntervalConfig,
    ) -> Result<Self> {
        Ok(Self::constant(BoundedTensor::from_shape(
            shape, fill, lower, upper, config,
        )?))
    }

    fn derest_output(n_outputs: usize) -> Self {
        Self::constant(BoundedTensor::derest_output(n_outputs))
    }

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn add(&self, other: &Self) -> Result<Self> {
        self.binary(BinaryOp::Add, other)
    }

    fn add_array(&self, other: &ArrayD<f64>) -> Result<Self> {
        self.with_array(ArrayOp::Add, other)
    }

    fn add_scalar(&self, value: f64) -> Self {
        self.unary(UnaryOp::AddScalar(value))
    }

    fn sub(&self, other: &Self) -> Result<Self> {
        self.binary(BinaryOp::Sub, other)
    }

    fn antiadd(&self, other: &Self) -> Result<Self> {
        self.binary(BinaryOp::Antiadd, other)
    }

    fn mul(&self, other: &Self) -> Result<Self> {
        self.binary(BinaryOp::Mul, other)
    }

    fn mul_array(&self, other: &ArrayD<f64>) -> Result<Self> {
        self.with_array(ArrayOp::Mul, other)
    }

    fn scale(&self, factor: f64) -> Self {
        self.unary(UnaryOp::Scale(factor))
    }

    fn div(&self, other: &Self) -> Result<Self> {
        self.binary(BinaryOp::Div, other)
    }

    fn div_array(&self, other: &ArrayD<f64>) -> Result<Self> {
        self.with_array(ArrayOp::Div, other)
    }

    fn reciprocal(&self) -> Self {
        self.unary(UnaryOp::Reciprocal)
    }

    fn neg(&self) -> Self {
        self.unary(UnaryOp::Neg)
    }

    fn exp(&self) -> Self {
        self.unary(UnaryOp::Exp)
    }

    fn square(&self) -> Self {
        self.unary(UnaryOp::Square)
    }

    fn power(&self, exponent: Exponent) -> Self {
        self.unary(UnaryOp::Power(exponent))
    }

    fn dot(&self, weights: &Array2<f64>) -> Result<Self> {
        let (n_in, n_out) = weights.dim();
        let shape = match self.shape.as_slice() {
            &[n] if n == n_in => vec![n_out],
            &[rows, n] if n == n_in => vec![rows, n_out],
            &[_] | &[_, _] => {
                let mut expected = self.shape.clone();
                if let Some(last) = expected.last_mut() {
                    *last = n_in;
                }
                return Err(shape_mismatch_err!(expected, self.shape.clone()));
            }
            _ => {
                return Err(DerestError::RankMismatch {
                    expected: 2,
                    got: self.shape.clone(),
                })
            }
        };
        Ok(Self::with_node(
            Node::Dot(self.clone(), Arc::new(weights.clone())),
            shape,
        ))
    }

    fn max(&self, other: &Self) -> Result<Self> {
        self.binary(BinaryOp::Max, other)
    }

    fn max_scalar(&self, value: f64) -> Self {
        self.unary(UnaryOp::MaxScalar(value))
    }

    fn abs(&self) -> Self {
        self.unary(UnaryOp::Abs)
    }

    fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let n: usize = shape.iter().product();
        let have: usize = self.shape.iter().product();
        if n != have {
            return Err(shape_mismatch_err!(shape.to_vec(), self.shape.clone()));
        }
        Ok(Self::with_node(
            Node::Unary(UnaryOp::Reshape, self.clone()),
            shape.to_vec(),
        ))
    }

    fn eval(&self, bindings: &Bindings) -> Result<BoundedTensor> {
        Evaluator::new(bindings).eval(self)
    }

    fn eval_many(items: &[&Self], bindings: &Bindings) -> Result<Vec<BoundedTensor>> {
        eval_many(items, bindings)
    }

    fn op_softmax(&self) -> Result<Self> {
        if self.shape.is_empty() {
            return Err(DerestError::RankMismatch {
                expected: 1,
                got: Vec::new(),
            });
        }
        Ok(Self::kernel(KernelOp::Softmax, vec![self.clone()], self.shape.clone()))
    }

    fn op_norm(&self, params: &LrnParams) -> Result<Self> {
        params.validate()?;
        if self.shape.len() != 4 {
            return Err(DerestError::RankMismatch {
                expected: 4,
                got: self.shape.clone(),
            });
        }
        Ok(Self::kernel(KernelOp::Norm(*params), vec![self.clone()], self.shape.clone()))
    }

    fn op_conv(&self, conv: &ConvParams) -> Result<Self> {
        let shape = conv.output_shape(&self.shape)?;
        Ok(Self::kernel(
            KernelOp::Conv(Arc::new(conv.clone())),
            vec![self.clone()],
            shape,
        ))
    }

    fn op_pool(&self, pool: &PoolParams, mode: PoolMode) -> Result<Self> {
        let shape = kernels::pool_output_shape(&self.shape, pool)?;
        Ok(Self::kernel(KernelOp::Pool(*pool, mode), vec![self.clone()], shape))
    }

    fn op_d_relu(&self, activation: &Self) -> Result<Self> {
        let shape = broadcast_shapes(&self.shape, &activation.shape)?;
        if shape != self.shape {
            return Err(shape_mismatch_err!(self.shape.clone(), activation.shape.clone()));
        }
        Ok(Self::kernel(
            KernelOp::DRelu,
            vec![self.clone(), activation.clone()],
            shape,
        ))
    }

    fn op_d_max_pool(&self, activation: &Self, pool: &PoolParams) -> Result<Self> {
        check_pooled(&self.shape, &activation.shape, pool)?;
        let shape = batched_input_shape(&self.shape, &activation.shape);
        Ok(Self::kernel(
            KernelOp::DMaxPool(*pool),
            vec![self.clone(), activation.clone()],
            shape,
        ))
    }

    fn op_d_avg_pool(&self, input_shape: &[usize], pool: &PoolParams) -> Result<Self> {
        check_pooled(&self.shape, input_shape, pool)?;
        let shape = batched_input_shape(&self.shape, input_shape);
        Ok(Self::kernel(
            KernelOp::DAvgPool(input_shape.to_vec(), *pool),
            vec![self.clone()],
            shape,
        ))
    }

    fn op_d_norm(&self, activation: &Self, params: &LrnParams) -> Result<Self> {
        params.validate()?;
        if self.shape.len() != 4 {
            return Err(DerestError::RankMismatch {
                expected: 4,
                got: self.shape.clone(),
            });
        }
        if activation.shape.len() != 4 || self.shape[1..] != activation.shape[1..] {
            return Err(shape_mismatch_err!(self.shape.clone(), activation.shape.clone()));
        }
        Ok(Self::kernel(
            KernelOp::DNorm(*params),
            vec![self.clone(), activation.clone()],
            self.shape.clone(),
        ))
    }

    fn op_d_conv(&self, input_shape: &[usize], conv: &ConvParams) -> Result<Self> {
        let expected = conv.output_shape(input_shape)?;
        if self.shape.len() != 4 || self.shape[1..] != expected[1..] {
            return Err(shape_mismatch_err!(expected, self.shape.clone()));
        }
        Ok(Self::kernel(
            KernelOp::DConv(input_shape.to_vec(), Arc::new(conv.clone())),
            vec![self.clone()],
            batched_input_shape(&self.shape, input_shape),
        ))
    }
}

fn check_pooled(dout: &[usize], input_shape: &[usize], pool: &PoolParams) -> Result<()> {
    let expected = kernels::pool_output_shape(input_shape, pool)?;
    if dout.len() != 4 || dout[1..] != expected[1..] {
        return Err(shape_mismatch_err!(expected, dout.to_vec()));
    }
    Ok(())
}
