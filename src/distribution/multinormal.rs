use crate::distribution::Distribution;
use crate::error::ClusterError;
use crate::utils::mirror_upper_triangle;
use anyhow::{ensure, Result};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::cmp::Ordering;
use std::f64::consts::PI;

/// Largest ratio between the biggest and smallest eigenvalue that is left uncorrected.
const MAX_CONDITION: f64 = 1.0e14;

/// Eigenvalue floor used when the covariance has collapsed to zero or to a scale
/// where `largest / MAX_CONDITION` is no longer a normal float.
const COLLAPSED_VARIANCE: f64 = 1.0e-12;

/// Multivariate normal distribution evaluated in the eigenbasis of its covariance.
///
/// The covariance is never inverted. Densities are computed from the projections
/// of the centered point onto the eigenvectors, scaled by the eigenvalues, after
/// the spectrum has been lifted far enough to keep the condition number below
/// `1e14`. This keeps degenerate clusters (collinear members, a constant band)
/// from producing infinite or NaN densities.
#[derive(Debug, Clone)]
pub struct MultinormalDistribution {
    mean: Array1<f64>,
    covariance: Array2<f64>,
    eigenvalues: Array1<f64>,
    eigenvectors: Array2<f64>,
    log_norm_factor: f64,
}

impl MultinormalDistribution {
    /// Only the upper triangle of `covariance` is read, the lower one is
    /// overwritten with its mirror image.
    pub fn new(mean: Array1<f64>, mut covariance: Array2<f64>) -> Result<Self> {
        let n = mean.len();
        ensure!(
            n > 0,
            ClusterError::InvalidArgument("mean vector must not be empty".to_string())
        );
        ensure!(
            covariance.nrows() == n,
            ClusterError::DimensionMismatch { expected: n, actual: covariance.nrows() }
        );
        ensure!(
            covariance.ncols() == n,
            ClusterError::DimensionMismatch { expected: n, actual: covariance.ncols() }
        );

        mirror_upper_triangle(&mut covariance);
        ensure!(
            mean.iter().chain(covariance.iter()).all(|x| x.is_finite()),
            ClusterError::InvalidArgument("mean and covariance must be finite".to_string())
        );

        let (mut eigenvalues, eigenvectors) = symmetric_eigen(covariance.view());

        let floor = match eigenvalues[0] / MAX_CONDITION {
            floor if floor.is_normal() && floor > 0.0 => floor,
            _ => COLLAPSED_VARIANCE,
        };
        let correction = floor - eigenvalues[n - 1];
        if correction > 0.0 {
            eigenvalues.mapv_inplace(|lambda| lambda + correction);
            covariance.diag_mut().mapv_inplace(|c| c + correction);
        }

        let log_determinant: f64 = eigenvalues.iter().map(|lambda| lambda.ln()).sum();
        let log_norm_factor = -0.5 * (n as f64 * (2.0 * PI).ln() + log_determinant);

        Ok(Self {
            mean,
            covariance,
            eigenvalues,
            eigenvectors,
            log_norm_factor,
        })
    }

    pub fn dimension_count(&self) -> usize {
        self.mean.len()
    }

    /// The symmetric covariance, including any ill-conditioning correction.
    pub fn covariance(&self) -> ArrayView2<f64> {
        self.covariance.view()
    }

    /// Eigenvalues in descending order.
    pub fn eigenvalues(&self) -> ArrayView1<f64> {
        self.eigenvalues.view()
    }

    /// Eigenvectors as rows, in the order of [`Self::eigenvalues`].
    pub fn eigenvectors(&self) -> ArrayView2<f64> {
        self.eigenvectors.view()
    }
}

impl Distribution for MultinormalDistribution {
    fn log_density(&self, point: ArrayView1<f64>) -> f64 {
        debug_assert_eq!(point.len(), self.mean.len());

        let mahalanobis: f64 = self
            .eigenvectors
            .axis_iter(Axis(0))
            .zip(self.eigenvalues.iter())
            .map(|(eigenvector, lambda)| {
                let projection: f64 = eigenvector
                    .iter()
                    .zip(point.iter().zip(self.mean.iter()))
                    .map(|(v, (y, m))| v * (y - m))
                    .sum();
                projection * projection / lambda
            })
            .sum();

        self.log_norm_factor - 0.5 * mahalanobis
    }

    fn mean(&self) -> ArrayView1<f64> {
        self.mean.view()
    }
}

fn symmetric_eigen(matrix: ArrayView2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let eigen = DMatrix::from_fn(n, n, |i, j| matrix[[i, j]]).symmetric_eigen();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(Ordering::Equal)
    });

    let eigenvalues: Array1<f64> = order.iter().map(|&k| eigen.eigenvalues[k]).collect();
    let eigenvectors = Array2::from_shape_fn((n, n), |(row, i)| eigen.eigenvectors[(i, order[row])]);

    (eigenvalues, eigenvectors)
}
