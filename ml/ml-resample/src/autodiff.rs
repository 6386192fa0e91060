//! Minimal reverse-mode autodiff over 4-D (and scalar) `f32` tensors.
//!
//! This is deliberately not a general autodiff engine. It is the small
//! tagged-operation layer the differentiable sampler needs: a [`Var`]
//! tensor handle, a [`GradNode`] trait for operations, and a reverse
//! traversal. What makes higher-order gradients possible is that
//! [`GradNode::differentiate`] consumes and produces `Var`s rather than raw
//! arrays, so a backward pass can itself extend the graph when asked to.
//!
//! `Var` is a single-threaded shared handle (`Rc<RefCell<..>>`). The crate
//! defines no concurrency model; the sampler participates in whatever the
//! surrounding training loop imposes.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use ndarray::{ArrayD, IxDyn};

use crate::error::{ResampleError, Result};

/// A differentiable operation recorded in the graph.
///
/// `differentiate` receives one gradient slot per output (in output order;
/// `None` where no gradient flowed) and returns one gradient slot per
/// parent. With `higher_order` set, returned gradients must themselves be
/// graph-connected `Var`s so they can be differentiated again.
pub trait GradNode {
    /// Operation name, for diagnostics.
    fn name(&self) -> &'static str;

    /// The input `Var`s this operation was applied to.
    fn parents(&self) -> Vec<Var>;

    /// Number of output tensors.
    fn num_outputs(&self) -> usize {
        1
    }

    /// Computes gradients with respect to the parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the incoming gradients violate the operation's
    /// shape contract.
    fn differentiate(&self, grads_out: &[Option<Var>], higher_order: bool)
    -> Result<Vec<Option<Var>>>;
}

/// Shared handle to a recorded operation.
#[derive(Clone)]
pub struct GradFn(Rc<dyn GradNode>);

impl GradFn {
    /// Wraps an operation node.
    pub fn new<N: GradNode + 'static>(node: N) -> Self {
        Self(Rc::new(node))
    }

    /// Identity key for graph traversal maps.
    fn key(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    fn parents(&self) -> Vec<Var> {
        self.0.parents()
    }

    fn num_outputs(&self) -> usize {
        self.0.num_outputs()
    }

    fn differentiate(
        &self,
        grads_out: &[Option<Var>],
        higher_order: bool,
    ) -> Result<Vec<Option<Var>>> {
        self.0.differentiate(grads_out, higher_order)
    }
}

struct Inner {
    data: ArrayD<f32>,
    requires_grad: bool,
    grad: Option<Var>,
    grad_fn: Option<GradFn>,
    out_index: usize,
}

/// Shared tensor handle participating in the autodiff graph.
///
/// # Example
///
/// ```
/// use ml_resample::Var;
///
/// let a = Var::from_elem(&[2, 2], 3.0).requires_grad(true);
/// let b = Var::from_elem(&[2, 2], 4.0);
///
/// let y = a.mul(&b).unwrap().sum();
/// y.backward().unwrap();
///
/// let grad = a.grad().unwrap();
/// assert_eq!(grad.data().iter().copied().collect::<Vec<_>>(), [4.0; 4]);
/// ```
#[derive(Clone)]
pub struct Var(Rc<RefCell<Inner>>);

impl Var {
    /// Creates a variable from an array, with gradients disabled.
    #[must_use]
    pub fn from_array(data: ArrayD<f32>) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            data,
            requires_grad: false,
            grad: None,
            grad_fn: None,
            out_index: 0,
        })))
    }

    /// Creates a variable filled with one value.
    #[must_use]
    pub fn from_elem(shape: &[usize], value: f32) -> Self {
        Self::from_array(ArrayD::from_elem(IxDyn(shape), value))
    }

    /// Creates a zero-filled variable.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        Self::from_elem(shape, 0.0)
    }

    /// Creates a one-filled variable.
    #[must_use]
    pub fn ones(shape: &[usize]) -> Self {
        Self::from_elem(shape, 1.0)
    }

    /// Creates a scalar (0-dimensional) variable.
    #[must_use]
    pub fn scalar(value: f32) -> Self {
        Self::from_elem(&[], value)
    }

    /// Enables or disables leaf gradient accumulation for this variable.
    #[must_use]
    pub fn requires_grad(self, flag: bool) -> Self {
        self.0.borrow_mut().requires_grad = flag;
        self
    }

    /// Returns a copy of the tensor data.
    #[must_use]
    pub fn data(&self) -> ArrayD<f32> {
        self.0.borrow().data.clone()
    }

    /// Returns the tensor shape.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.0.borrow().data.shape().to_vec()
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.0.borrow().data.ndim()
    }

    /// Returns the accumulated gradient, if any.
    #[must_use]
    pub fn grad(&self) -> Option<Var> {
        self.0.borrow().grad.clone()
    }

    /// Clears the accumulated gradient.
    pub fn zero_grad(&self) {
        self.0.borrow_mut().grad = None;
    }

    /// Returns a copy of the data cut loose from the graph.
    #[must_use]
    pub fn detached(&self) -> Var {
        Self::from_array(self.data())
    }

    /// Checks whether gradients flow through this variable: either a leaf
    /// that accumulates, or an operation output.
    #[must_use]
    pub fn tracks(&self) -> bool {
        let inner = self.0.borrow();
        inner.requires_grad || inner.grad_fn.is_some()
    }

    pub(crate) fn attach(&self, grad_fn: GradFn, out_index: usize) {
        let mut inner = self.0.borrow_mut();
        inner.grad_fn = Some(grad_fn);
        inner.out_index = out_index;
    }

    /// Elementwise sum of two equal-shaped variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the shapes differ.
    pub fn add(&self, other: &Var) -> Result<Var> {
        apply_add(self, other, true)
    }

    /// Elementwise (Hadamard) product of two equal-shaped variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the shapes differ.
    pub fn mul(&self, other: &Var) -> Result<Var> {
        apply_mul(self, other, true)
    }

    /// Sum of all elements as a scalar variable.
    #[must_use]
    pub fn sum(&self) -> Var {
        apply_sum(self, true)
    }

    /// Backpropagates from this variable with a ones seed, producing
    /// first-order gradients on the graph's leaves.
    ///
    /// # Errors
    ///
    /// Returns an error if a recorded operation rejects its gradients.
    pub fn backward(&self) -> Result<()> {
        self.backward_with(None, false)
    }

    /// Backpropagates while keeping the gradients graph-connected, so they
    /// can be differentiated again for second- and higher-order use.
    ///
    /// # Errors
    ///
    /// Returns an error if a recorded operation rejects its gradients.
    pub fn backward_higher_order(&self) -> Result<()> {
        self.backward_with(None, true)
    }

    /// Backpropagates from this variable.
    ///
    /// `seed` is the incoming gradient with respect to this variable
    /// (defaults to ones). With `higher_order`, accumulated gradients stay
    /// connected to the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed shape differs from this variable's
    /// shape, or if a recorded operation rejects its gradients.
    pub fn backward_with(&self, seed: Option<Var>, higher_order: bool) -> Result<()> {
        let seed = match seed {
            Some(seed) => {
                if seed.shape() != self.shape() {
                    return Err(ResampleError::shape_mismatch(
                        "seed",
                        &self.shape(),
                        &seed.shape(),
                    ));
                }
                seed
            }
            None => Var::ones(&self.shape()),
        };

        let mut topo = Vec::new();
        let mut visited = HashSet::new();
        collect(self, &mut topo, &mut visited);

        let mut pending: HashMap<usize, Vec<Option<Var>>> = HashMap::new();
        accumulate(self, seed, higher_order, &mut pending)?;

        for grad_fn in topo.into_iter().rev() {
            let Some(grads_out) = pending.remove(&grad_fn.key()) else {
                continue;
            };
            if grads_out.iter().all(Option::is_none) {
                continue;
            }

            let grads_in = grad_fn.differentiate(&grads_out, higher_order)?;
            for (parent, grad) in grad_fn.parents().into_iter().zip(grads_in) {
                if let Some(grad) = grad {
                    let grad = if higher_order { grad } else { grad.detached() };
                    accumulate(&parent, grad, higher_order, &mut pending)?;
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Var")
            .field("shape", &inner.data.shape())
            .field("requires_grad", &inner.requires_grad)
            .field("op", &inner.grad_fn.as_ref().map(|g| g.0.name()))
            .finish()
    }
}

/// Post-order graph collection; reversed, this is a valid topological order.
fn collect(var: &Var, topo: &mut Vec<GradFn>, visited: &mut HashSet<usize>) {
    let Some(grad_fn) = var.0.borrow().grad_fn.clone() else {
        return;
    };
    if !visited.insert(grad_fn.key()) {
        return;
    }
    for parent in grad_fn.parents() {
        collect(&parent, topo, visited);
    }
    topo.push(grad_fn);
}

/// Routes a gradient into a variable: leaves accumulate into `grad`,
/// operation outputs queue per-slot gradients for their node.
fn accumulate(
    var: &Var,
    grad: Var,
    higher_order: bool,
    pending: &mut HashMap<usize, Vec<Option<Var>>>,
) -> Result<()> {
    let (grad_fn, out_index, is_leaf) = {
        let inner = var.0.borrow();
        (
            inner.grad_fn.clone(),
            inner.out_index,
            inner.requires_grad && inner.grad_fn.is_none(),
        )
    };

    if is_leaf {
        let existing = var.0.borrow().grad.clone();
        let updated = match existing {
            Some(old) => apply_add(&old, &grad, higher_order)?,
            None => grad.clone(),
        };
        var.0.borrow_mut().grad = Some(updated);
    }

    if let Some(grad_fn) = grad_fn {
        let slots = pending
            .entry(grad_fn.key())
            .or_insert_with(|| vec![None; grad_fn.num_outputs()]);
        slots[out_index] = Some(match slots[out_index].take() {
            Some(prev) => apply_add(&prev, &grad, higher_order)?,
            None => grad,
        });
    }

    Ok(())
}

struct AddOp {
    a: Var,
    b: Var,
}

impl GradNode for AddOp {
    fn name(&self) -> &'static str {
        "add"
    }

    fn parents(&self) -> Vec<Var> {
        vec![self.a.clone(), self.b.clone()]
    }

    fn differentiate(
        &self,
        grads_out: &[Option<Var>],
        _higher_order: bool,
    ) -> Result<Vec<Option<Var>>> {
        let Some(go) = grads_out.first().and_then(Option::as_ref) else {
            return Ok(vec![None, None]);
        };
        Ok(vec![Some(go.clone()), Some(go.clone())])
    }
}

struct MulOp {
    a: Var,
    b: Var,
}

impl GradNode for MulOp {
    fn name(&self) -> &'static str {
        "mul"
    }

    fn parents(&self) -> Vec<Var> {
        vec![self.a.clone(), self.b.clone()]
    }

    fn differentiate(
        &self,
        grads_out: &[Option<Var>],
        higher_order: bool,
    ) -> Result<Vec<Option<Var>>> {
        let Some(go) = grads_out.first().and_then(Option::as_ref) else {
            return Ok(vec![None, None]);
        };
        Ok(vec![
            Some(apply_mul(go, &self.b, higher_order)?),
            Some(apply_mul(go, &self.a, higher_order)?),
        ])
    }
}

struct SumOp {
    a: Var,
}

impl GradNode for SumOp {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn parents(&self) -> Vec<Var> {
        vec![self.a.clone()]
    }

    fn differentiate(
        &self,
        grads_out: &[Option<Var>],
        higher_order: bool,
    ) -> Result<Vec<Option<Var>>> {
        let Some(go) = grads_out.first().and_then(Option::as_ref) else {
            return Ok(vec![None]);
        };
        Ok(vec![Some(apply_broadcast(
            go,
            &self.a.shape(),
            higher_order,
        ))])
    }
}

struct BroadcastOp {
    scalar: Var,
}

impl GradNode for BroadcastOp {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn parents(&self) -> Vec<Var> {
        vec![self.scalar.clone()]
    }

    fn differentiate(
        &self,
        grads_out: &[Option<Var>],
        higher_order: bool,
    ) -> Result<Vec<Option<Var>>> {
        let Some(go) = grads_out.first().and_then(Option::as_ref) else {
            return Ok(vec![None]);
        };
        Ok(vec![Some(apply_sum(go, higher_order))])
    }
}

pub(crate) fn apply_add(a: &Var, b: &Var, track: bool) -> Result<Var> {
    let (da, db) = (a.data(), b.data());
    if da.shape() != db.shape() {
        return Err(ResampleError::operand_mismatch(da.shape(), db.shape()));
    }
    let out = Var::from_array(&da + &db);
    if track && (a.tracks() || b.tracks()) {
        out.attach(
            GradFn::new(AddOp {
                a: a.clone(),
                b: b.clone(),
            }),
            0,
        );
    }
    Ok(out)
}

pub(crate) fn apply_mul(a: &Var, b: &Var, track: bool) -> Result<Var> {
    let (da, db) = (a.data(), b.data());
    if da.shape() != db.shape() {
        return Err(ResampleError::operand_mismatch(da.shape(), db.shape()));
    }
    let out = Var::from_array(&da * &db);
    if track && (a.tracks() || b.tracks()) {
        out.attach(
            GradFn::new(MulOp {
                a: a.clone(),
                b: b.clone(),
            }),
            0,
        );
    }
    Ok(out)
}

pub(crate) fn apply_sum(a: &Var, track: bool) -> Var {
    let out = Var::scalar(a.data().sum());
    if track && a.tracks() {
        out.attach(GradFn::new(SumOp { a: a.clone() }), 0);
    }
    out
}

pub(crate) fn apply_broadcast(scalar: &Var, shape: &[usize], track: bool) -> Var {
    let value = scalar.data().sum();
    let out = Var::from_elem(shape, value);
    if track && scalar.tracks() {
        out.attach(
            GradFn::new(BroadcastOp {
                scalar: scalar.clone(),
            }),
            0,
        );
    }
    out
}
