//! CPU kernels for 2-D bilinear grid sampling.
//!
//! Both kernels implement the fixed convention the rest of the crate is
//! built around: bilinear interpolation, zero padding for out-of-bounds
//! samples, and corner-unaligned coordinates (`align_corners=false`), where
//! a normalized coordinate `g` in `[-1, 1]` maps to the pixel-space
//! coordinate `((g + 1) * size - 1) / 2`.
//!
//! Tensor layouts:
//! - image: `(N, C, H, W)`
//! - grid: `(N, Ho, Wo, 2)` with `(x, y)` pairs innermost
//! - output: `(N, C, Ho, Wo)`
//!
//! The backward kernel is the crate's one fixed numerical primitive; the
//! autodiff layer treats it as opaque and never re-derives its math.

// Grid indices are small and bounds-checked before casting.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

use ndarray::{ArrayD, IxDyn};

use crate::error::{ResampleError, Result};

/// Validated shapes of an image/grid pair.
#[derive(Debug, Clone, Copy)]
struct PairShape {
    n: usize,
    c: usize,
    h: usize,
    w: usize,
    ho: usize,
    wo: usize,
}

fn check_pair(input: &ArrayD<f32>, grid: &ArrayD<f32>) -> Result<PairShape> {
    if input.ndim() != 4 {
        return Err(ResampleError::not_four_dimensional("image", input.ndim()));
    }
    if grid.ndim() != 4 {
        return Err(ResampleError::not_four_dimensional("grid", grid.ndim()));
    }

    let (is, gs) = (input.shape(), grid.shape());
    if gs[3] != 2 {
        return Err(ResampleError::BadGridAxis(gs[3]));
    }
    if is[0] != gs[0] {
        return Err(ResampleError::BatchMismatch {
            image: is[0],
            grid: gs[0],
        });
    }

    Ok(PairShape {
        n: is[0],
        c: is[1],
        h: is[2],
        w: is[3],
        ho: gs[1],
        wo: gs[2],
    })
}

/// Fetches a texel, treating out-of-bounds coordinates as zero.
#[inline]
fn texel(input: &ArrayD<f32>, b: usize, ch: usize, y: i64, x: i64, h: i64, w: i64) -> f32 {
    if x < 0 || y < 0 || x >= w || y >= h {
        0.0
    } else {
        input[[b, ch, y as usize, x as usize]]
    }
}

/// Maps a normalized coordinate to pixel space (corner-unaligned).
#[inline]
fn unnormalize(g: f32, size: usize) -> f32 {
    ((g + 1.0) * size as f32 - 1.0) * 0.5
}

/// Samples `input` at the locations given by `grid`.
///
/// Returns an `(N, C, Ho, Wo)` tensor. Out-of-bounds samples contribute
/// zero.
///
/// # Errors
///
/// Returns an error if either tensor is not 4-dimensional, the batch sizes
/// differ, or the grid's innermost axis does not have extent 2.
pub fn grid_sample_2d(input: &ArrayD<f32>, grid: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    let s = check_pair(input, grid)?;
    let (hi, wi) = (s.h as i64, s.w as i64);
    let mut out = ArrayD::<f32>::zeros(IxDyn(&[s.n, s.c, s.ho, s.wo]));

    for b in 0..s.n {
        for oy in 0..s.ho {
            for ox in 0..s.wo {
                let x = unnormalize(grid[[b, oy, ox, 0]], s.w);
                let y = unnormalize(grid[[b, oy, ox, 1]], s.h);

                let x0 = x.floor() as i64;
                let y0 = y.floor() as i64;
                let (x1, y1) = (x0 + 1, y0 + 1);
                let tx = x - x0 as f32;
                let ty = y - y0 as f32;

                let w00 = (1.0 - tx) * (1.0 - ty);
                let w10 = tx * (1.0 - ty);
                let w01 = (1.0 - tx) * ty;
                let w11 = tx * ty;

                for ch in 0..s.c {
                    let v = w00 * texel(input, b, ch, y0, x0, hi, wi)
                        + w10 * texel(input, b, ch, y0, x1, hi, wi)
                        + w01 * texel(input, b, ch, y1, x0, hi, wi)
                        + w11 * texel(input, b, ch, y1, x1, hi, wi);
                    out[[b, ch, oy, ox]] = v;
                }
            }
        }
    }

    Ok(out)
}

/// Backward of [`grid_sample_2d`]: gradients with respect to the image and
/// the grid, given the gradient with respect to the output.
///
/// This is the fixed primitive the differentiable sampler chains around.
/// `grad_input` is the transpose-scatter of `grad_output` through the
/// bilinear weights; `grad_grid` applies the weight derivatives, scaled by
/// the `W/2` and `H/2` factors of the corner-unaligned coordinate mapping.
///
/// # Errors
///
/// Returns an error under the same shape contract as [`grid_sample_2d`],
/// or if `grad_output` does not have shape `(N, C, Ho, Wo)`.
pub fn grid_sample_2d_backward(
    grad_output: &ArrayD<f32>,
    input: &ArrayD<f32>,
    grid: &ArrayD<f32>,
) -> Result<(ArrayD<f32>, ArrayD<f32>)> {
    let s = check_pair(input, grid)?;
    let expected = [s.n, s.c, s.ho, s.wo];
    if grad_output.shape() != expected {
        return Err(ResampleError::shape_mismatch(
            "grad_output",
            &expected,
            grad_output.shape(),
        ));
    }

    let (hi, wi) = (s.h as i64, s.w as i64);
    let mut grad_input = ArrayD::<f32>::zeros(IxDyn(input.shape()));
    let mut grad_grid = ArrayD::<f32>::zeros(IxDyn(grid.shape()));

    for b in 0..s.n {
        for oy in 0..s.ho {
            for ox in 0..s.wo {
                let x = unnormalize(grid[[b, oy, ox, 0]], s.w);
                let y = unnormalize(grid[[b, oy, ox, 1]], s.h);

                let x0 = x.floor() as i64;
                let y0 = y.floor() as i64;
                let (x1, y1) = (x0 + 1, y0 + 1);
                let tx = x - x0 as f32;
                let ty = y - y0 as f32;

                let w00 = (1.0 - tx) * (1.0 - ty);
                let w10 = tx * (1.0 - ty);
                let w01 = (1.0 - tx) * ty;
                let w11 = tx * ty;

                let mut gx = 0.0f32;
                let mut gy = 0.0f32;

                for ch in 0..s.c {
                    let go = grad_output[[b, ch, oy, ox]];

                    // Scatter into the in-bounds corners.
                    for (yy, xx, weight) in [
                        (y0, x0, w00),
                        (y0, x1, w10),
                        (y1, x0, w01),
                        (y1, x1, w11),
                    ] {
                        if xx >= 0 && yy >= 0 && xx < wi && yy < hi {
                            grad_input[[b, ch, yy as usize, xx as usize]] += weight * go;
                        }
                    }

                    let v00 = texel(input, b, ch, y0, x0, hi, wi);
                    let v10 = texel(input, b, ch, y0, x1, hi, wi);
                    let v01 = texel(input, b, ch, y1, x0, hi, wi);
                    let v11 = texel(input, b, ch, y1, x1, hi, wi);

                    gx += go * ((v10 - v00) * (1.0 - ty) + (v11 - v01) * ty);
                    gy += go * ((v01 - v00) * (1.0 - tx) + (v11 - v10) * tx);
                }

                grad_grid[[b, oy, ox, 0]] = gx * 0.5 * s.w as f32;
                grad_grid[[b, oy, ox, 1]] = gy * 0.5 * s.h as f32;
            }
        }
    }

    Ok((grad_input, grad_grid))
}
