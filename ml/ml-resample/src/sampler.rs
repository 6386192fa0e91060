//! Differentiable grid sampling and sampler strategy negotiation.
//!
//! The custom path chains two graph nodes, mirroring how the sampling math
//! actually factors:
//!
//! - `GridSampleOp` evaluates the forward kernel and retains the image
//!   and grid. Its derivative is the fixed backward primitive, applied as a
//!   differentiable operation.
//! - `GridSampleBackwardOp` wraps that primitive and retains the grid.
//!   Its own derivative with respect to the image-gradient output is a
//!   further bilinear sample of the incoming gradient against the retained
//!   grid, so the chain recurses and supports arbitrary gradient order. The
//!   two remaining second-order slots carry no gradient.
//!
//! The builtin path uses the same kernels through a node whose gradients
//! are never graph-connected: identical forward and first-order behavior,
//! but second-order requests stop there.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::autodiff::{GradFn, GradNode, Var};
use crate::backend::BackendInfo;
use crate::error::Result;
use crate::kernel;

/// Samples `image` at `grid` locations through the custom differentiable
/// path (bilinear, zero padding, corner-unaligned).
///
/// Both arguments must be 4-dimensional: image `(N, C, H, W)`, grid
/// `(N, Ho, Wo, 2)`. Gradients of any order flow to both arguments.
///
/// # Errors
///
/// Returns an error if either tensor violates the shape contract.
pub fn grid_sample(image: &Var, grid: &Var) -> Result<Var> {
    apply_grid_sample(image, grid, true)
}

pub(crate) fn apply_grid_sample(image: &Var, grid: &Var, track: bool) -> Result<Var> {
    let out = Var::from_array(kernel::grid_sample_2d(&image.data(), &grid.data())?);
    if track && (image.tracks() || grid.tracks()) {
        out.attach(
            GradFn::new(GridSampleOp {
                image: image.clone(),
                grid: grid.clone(),
            }),
            0,
        );
    }
    Ok(out)
}

fn apply_grid_sample_backward(
    grad_output: &Var,
    image: &Var,
    grid: &Var,
    track: bool,
) -> Result<(Var, Var)> {
    let (grad_image, grad_grid) =
        kernel::grid_sample_2d_backward(&grad_output.data(), &image.data(), &grid.data())?;
    let grad_image = Var::from_array(grad_image);
    let grad_grid = Var::from_array(grad_grid);

    if track && (grad_output.tracks() || image.tracks() || grid.tracks()) {
        let grad_fn = GradFn::new(GridSampleBackwardOp {
            grad_output: grad_output.clone(),
            image: image.clone(),
            grid: grid.clone(),
        });
        grad_image.attach(grad_fn.clone(), 0);
        grad_grid.attach(grad_fn, 1);
    }

    Ok((grad_image, grad_grid))
}

/// Forward sampling node. Retains the image and grid for its backward.
struct GridSampleOp {
    image: Var,
    grid: Var,
}

impl GradNode for GridSampleOp {
    fn name(&self) -> &'static str {
        "grid_sample_2d"
    }

    fn parents(&self) -> Vec<Var> {
        vec![self.image.clone(), self.grid.clone()]
    }

    fn differentiate(
        &self,
        grads_out: &[Option<Var>],
        higher_order: bool,
    ) -> Result<Vec<Option<Var>>> {
        let Some(go) = grads_out.first().and_then(Option::as_ref) else {
            return Ok(vec![None, None]);
        };
        let (grad_image, grad_grid) =
            apply_grid_sample_backward(go, &self.image, &self.grid, higher_order)?;
        Ok(vec![Some(grad_image), Some(grad_grid)])
    }
}

/// Backward-of-forward node wrapping the fixed backward primitive.
/// Retains the grid for the second-order pass.
struct GridSampleBackwardOp {
    grad_output: Var,
    image: Var,
    grid: Var,
}

impl GradNode for GridSampleBackwardOp {
    fn name(&self) -> &'static str {
        "grid_sample_2d_backward"
    }

    fn parents(&self) -> Vec<Var> {
        vec![
            self.grad_output.clone(),
            self.image.clone(),
            self.grid.clone(),
        ]
    }

    fn num_outputs(&self) -> usize {
        2
    }

    fn differentiate(
        &self,
        grads_out: &[Option<Var>],
        higher_order: bool,
    ) -> Result<Vec<Option<Var>>> {
        // The image-gradient output is itself a bilinear sampling operation
        // against the retained grid, so its derivative with respect to the
        // upstream gradient is one more forward sample. The image and grid
        // slots carry no second-order gradient.
        let Some(gg_image) = grads_out.first().and_then(Option::as_ref) else {
            return Ok(vec![None, None, None]);
        };
        let grad_grad_output = apply_grid_sample(gg_image, &self.grid, higher_order)?;
        Ok(vec![Some(grad_grad_output), None, None])
    }
}

/// First-order-only sampling node used by the builtin strategy. Its
/// gradients are never graph-connected, so second-order requests stop here.
struct BuiltinGridSampleOp {
    image: Var,
    grid: Var,
}

impl GradNode for BuiltinGridSampleOp {
    fn name(&self) -> &'static str {
        "grid_sample_2d_builtin"
    }

    fn parents(&self) -> Vec<Var> {
        vec![self.image.clone(), self.grid.clone()]
    }

    fn differentiate(
        &self,
        grads_out: &[Option<Var>],
        _higher_order: bool,
    ) -> Result<Vec<Option<Var>>> {
        let Some(go) = grads_out.first().and_then(Option::as_ref) else {
            return Ok(vec![None, None]);
        };
        let (grad_image, grad_grid) =
            kernel::grid_sample_2d_backward(&go.data(), &self.image.data(), &self.grid.data())?;
        Ok(vec![
            Some(Var::from_array(grad_image)),
            Some(Var::from_array(grad_grid)),
        ])
    }
}

fn builtin_grid_sample(image: &Var, grid: &Var) -> Result<Var> {
    let out = Var::from_array(kernel::grid_sample_2d(&image.data(), &grid.data())?);
    if image.tracks() || grid.tracks() {
        out.attach(
            GradFn::new(BuiltinGridSampleOp {
                image: image.clone(),
                grid: grid.clone(),
            }),
            0,
        );
    }
    Ok(out)
}

/// Configuration for the resampler, set by the caller before pipeline start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Whether to attempt the custom higher-order gradient path.
    pub custom_gradfix: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            custom_gradfix: true,
        }
    }
}

impl SamplerConfig {
    /// Sets whether the custom gradient path is attempted.
    #[must_use]
    pub const fn with_custom_gradfix(mut self, enabled: bool) -> Self {
        self.custom_gradfix = enabled;
        self
    }
}

/// The sampling implementation selected at negotiation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerStrategy {
    /// Custom path with higher-order gradient support.
    Custom,

    /// Backend default: identical forward and first-order behavior, no
    /// higher-order gradients.
    Builtin,
}

/// Grid sampler with a strategy fixed at startup.
///
/// Replaces a process-global enable flag and per-call version sniffing:
/// the caller negotiates once against its configuration and backend, then
/// threads the sampler to wherever sampling happens.
///
/// # Example
///
/// ```
/// use ml_resample::{BackendInfo, GridSampler, SamplerConfig, SamplerStrategy, Var};
///
/// let sampler = GridSampler::negotiate(&SamplerConfig::default(), &BackendInfo::ndarray());
/// assert_eq!(sampler.strategy(), SamplerStrategy::Custom);
///
/// let image = Var::from_elem(&[1, 1, 2, 2], 1.0);
/// let grid = Var::zeros(&[1, 1, 1, 2]);
/// let out = sampler.sample(&image, &grid).unwrap();
/// assert_eq!(out.shape(), [1, 1, 1, 1]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSampler {
    strategy: SamplerStrategy,
}

impl GridSampler {
    /// Selects the sampling strategy for a configuration and backend.
    ///
    /// Disabling the custom path always yields the builtin strategy. With
    /// the custom path enabled, it is used only when the backend version is
    /// on the validated list; otherwise a warning is logged and the builtin
    /// strategy is used.
    #[must_use]
    pub fn negotiate(config: &SamplerConfig, backend: &BackendInfo) -> Self {
        let strategy = if !config.custom_gradfix {
            SamplerStrategy::Builtin
        } else if backend.supports_custom_gradfix() {
            SamplerStrategy::Custom
        } else {
            warn!(
                %backend,
                "custom grid-sample gradfix is not validated on this backend, \
                 falling back to the builtin sampler"
            );
            SamplerStrategy::Builtin
        };
        Self { strategy }
    }

    /// Creates a sampler with an explicit strategy.
    #[must_use]
    pub const fn with_strategy(strategy: SamplerStrategy) -> Self {
        Self { strategy }
    }

    /// Returns the negotiated strategy.
    #[must_use]
    pub const fn strategy(&self) -> SamplerStrategy {
        self.strategy
    }

    /// Samples `image` at `grid` locations.
    ///
    /// # Errors
    ///
    /// Returns an error if either tensor violates the 4-D shape contract.
    pub fn sample(&self, image: &Var, grid: &Var) -> Result<Var> {
        match self.strategy {
            SamplerStrategy::Custom => apply_grid_sample(image, grid, true),
            SamplerStrategy::Builtin => builtin_grid_sample(image, grid),
        }
    }
}
