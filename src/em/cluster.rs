use crate::distribution::{Distribution, MultinormalDistribution};
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use ndarray_stats::QuantileExt;
use std::cmp::Ordering;

/// A mixture component: a density together with its prior probability.
#[derive(Debug, Clone)]
pub struct Cluster<D: Distribution = MultinormalDistribution> {
    distribution: D,
    prior_probability: f64,
}

impl<D: Distribution> Cluster<D> {
    pub fn new(distribution: D, prior_probability: f64) -> Self {
        Self {
            distribution,
            prior_probability,
        }
    }

    pub fn distribution(&self) -> &D {
        &self.distribution
    }

    pub fn prior_probability(&self) -> f64 {
        self.prior_probability
    }

    pub fn mean(&self) -> ArrayView1<f64> {
        self.distribution.mean()
    }

    /// Prior times density, the unnormalized responsibility of this cluster for `point`.
    pub fn posterior_contribution(&self, point: ArrayView1<f64>) -> f64 {
        self.prior_probability * self.distribution.density(point)
    }
}

impl Cluster<MultinormalDistribution> {
    pub fn covariance(&self) -> ArrayView2<f64> {
        self.distribution.covariance()
    }
}

/// Orders clusters from the largest to the smallest prior probability.
pub fn descending_prior<D: Distribution>(a: &Cluster<D>, b: &Cluster<D>) -> Ordering {
    b.prior_probability
        .partial_cmp(&a.prior_probability)
        .unwrap_or(Ordering::Equal)
}

/// Immutable, ordered set of clusters produced by a trained [`crate::EmClusterer`].
///
/// Queries take `&self` only, so a single set can be shared between any number
/// of threads classifying pixels at once.
#[derive(Debug, Clone)]
pub struct ClusterSet<D: Distribution = MultinormalDistribution> {
    clusters: Vec<Cluster<D>>,
}

impl<D: Distribution> ClusterSet<D> {
    /// Builds a set ordered by descending prior probability.
    pub fn new(clusters: Vec<Cluster<D>>) -> Self {
        Self::with_ordering(clusters, descending_prior)
    }

    pub fn with_ordering<F>(mut clusters: Vec<Cluster<D>>, ordering: F) -> Self
    where
        F: FnMut(&Cluster<D>, &Cluster<D>) -> Ordering,
    {
        clusters.sort_by(ordering);
        Self { clusters }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn cluster(&self, index: usize) -> Option<&Cluster<D>> {
        self.clusters.get(index)
    }

    pub fn clusters(&self) -> &[Cluster<D>] {
        &self.clusters
    }

    /// Cluster means as rows, in set order.
    pub fn means(&self) -> Array2<f64> {
        let dimension_count = self.clusters.first().map_or(0, |c| c.mean().len());
        Array2::from_shape_fn((self.clusters.len(), dimension_count), |(k, i)| {
            self.clusters[k].mean()[i]
        })
    }

    pub fn priors(&self) -> Array1<f64> {
        self.clusters.iter().map(|c| c.prior_probability).collect()
    }

    /// Probability of each cluster having generated `point`; the values sum to one.
    pub fn posterior_probabilities(&self, point: ArrayView1<f64>) -> Array1<f64> {
        let mut posteriors = Array1::zeros(self.clusters.len());
        fill_posteriors(&self.clusters, point, posteriors.view_mut());
        posteriors
    }

    /// Index of the cluster with the highest posterior probability for `point`.
    pub fn most_probable_cluster(&self, point: ArrayView1<f64>) -> usize {
        self.posterior_probabilities(point).argmax().unwrap_or(0)
    }

    /// Posterior probabilities of every row of `points`, one row of output per point.
    pub fn posterior_probabilities_batch(&self, points: ArrayView2<f64>) -> Array2<f64> {
        let mut posteriors = Array2::zeros((points.nrows(), self.clusters.len()));
        Zip::from(posteriors.rows_mut())
            .and(points.rows())
            .par_for_each(|h, point| {
                fill_posteriors(&self.clusters, point, h);
            });
        posteriors
    }

    pub fn classify(&self, points: ArrayView2<f64>) -> Vec<usize> {
        points
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|point| self.most_probable_cluster(point))
            .collect()
    }
}

/// Writes the normalized responsibilities of `clusters` for `point`.
///
/// When every prior-weighted density underflows to zero (or their sum overflows)
/// the responsibilities are recomputed from differences of log-densities, which
/// stay representable far away from all means. Returns whether that log-space
/// path was taken.
pub(crate) fn fill_posteriors<D: Distribution>(
    clusters: &[Cluster<D>],
    point: ArrayView1<f64>,
    mut posteriors: ArrayViewMut1<f64>,
) -> bool {
    for (h, cluster) in posteriors.iter_mut().zip(clusters) {
        *h = cluster.posterior_contribution(point);
    }

    let mut sum = posteriors.sum();
    let log_space = !(sum > 0.0 && sum.is_finite());
    if log_space {
        let log_densities: Vec<f64> = clusters
            .iter()
            .map(|c| c.distribution.log_density(point))
            .collect();

        for (k, h) in posteriors.iter_mut().enumerate() {
            let prior = clusters[k].prior_probability;
            if prior <= 0.0 {
                *h = 0.0;
                continue;
            }
            let others: f64 = clusters
                .iter()
                .zip(log_densities.iter())
                .enumerate()
                .filter(|(j, (c, _))| *j != k && c.prior_probability > 0.0)
                .map(|(_, (c, l))| (c.prior_probability / prior) * (l - log_densities[k]).exp())
                .sum();
            *h = 1.0 / (1.0 + others);
        }
        sum = posteriors.sum();
    }

    posteriors.mapv_inplace(|h| h / sum);
    log_space
}
