mod cluster;

pub use cluster::{descending_prior, Cluster, ClusterSet};

use crate::distribution::MultinormalDistribution;
use crate::error::ClusterError;
use crate::parameters::EmParameters;
use anyhow::{ensure, Result};
use cluster::fill_posteriors;
use log::{debug, warn};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::ops::ControlFlow;

/// Expectation-maximization trainer for a mixture of multinormal clusters.
///
/// The trainer owns its point sample. Every [`EmClusterer::iterate`] call is one
/// full pass over that sample; convergence is left to the caller, who usually
/// runs a fixed iteration budget and then takes an immutable [`ClusterSet`].
pub struct EmClusterer {
    points: Array2<f64>,
    clusters: Vec<Cluster>,
    /// Responsibilities, one row per point and one column per cluster.
    responsibilities: Array2<f64>,
    iterations: usize,
}

impl EmClusterer {
    /// Seeds `cluster_count` clusters at distinct randomly drawn points, with unit
    /// covariance and equal (unnormalized) priors.
    pub fn new(points: Array2<f64>, cluster_count: usize, seed: u64) -> Result<Self> {
        let (point_count, dimension_count) = points.dim();
        ensure!(
            point_count > 0,
            ClusterError::InvalidArgument("point sample must not be empty".to_string())
        );
        ensure!(
            dimension_count > 0,
            ClusterError::InvalidArgument("points must have at least one dimension".to_string())
        );
        ensure!(
            cluster_count > 0,
            ClusterError::InvalidArgument("cluster count must be positive".to_string())
        );
        ensure!(
            cluster_count <= point_count,
            ClusterError::InvalidArgument(format!(
                "cluster count {} exceeds point count {}",
                cluster_count, point_count
            ))
        );
        ensure!(
            points.iter().all(|x| x.is_finite()),
            ClusterError::InvalidArgument("points must be finite".to_string())
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let seeds = rand::seq::index::sample(&mut rng, point_count, cluster_count);

        let mut clusters = Vec::with_capacity(cluster_count);
        for i in seeds.iter() {
            let distribution =
                MultinormalDistribution::new(points.row(i).to_owned(), Array2::eye(dimension_count))?;
            clusters.push(Cluster::new(distribution, 1.0));
        }

        Ok(Self {
            responsibilities: Array2::zeros((point_count, cluster_count)),
            points,
            clusters,
            iterations: 0,
        })
    }

    pub fn with_parameters(points: Array2<f64>, parameters: &EmParameters) -> Result<Self> {
        Self::new(points, parameters.cluster_count, parameters.seed)
    }

    /// Trains on `points` for the configured number of iterations.
    pub fn train(points: Array2<f64>, parameters: &EmParameters) -> Result<ClusterSet> {
        let mut clusterer = Self::with_parameters(points, parameters)?;
        clusterer.run(parameters.iteration_count);
        Ok(clusterer.clusters())
    }

    pub fn point_count(&self) -> usize {
        self.points.nrows()
    }

    pub fn dimension_count(&self) -> usize {
        self.points.ncols()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Number of completed iterations.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Performs one expectation step followed by one maximization step.
    pub fn iterate(&mut self) {
        self.expectation_step();
        self.maximization_step();
        self.iterations += 1;
        debug!("EM iteration {} finished", self.iterations);
    }

    pub fn run(&mut self, iteration_count: usize) {
        self.run_with(iteration_count, |_| ControlFlow::Continue(()));
    }

    /// Runs up to `iteration_count` iterations, handing the number of the finished
    /// iteration to `observer` after each one. Returns the iterations performed.
    pub fn run_with<F>(&mut self, iteration_count: usize, mut observer: F) -> usize
    where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        for performed in 1..=iteration_count {
            self.iterate();
            if observer(self.iterations).is_break() {
                return performed;
            }
        }
        iteration_count
    }

    /// Snapshot of the current model, ordered by descending prior probability.
    pub fn clusters(&self) -> ClusterSet {
        ClusterSet::new(self.clusters.clone())
    }

    pub fn clusters_by<F>(&self, ordering: F) -> ClusterSet
    where
        F: FnMut(&Cluster, &Cluster) -> Ordering,
    {
        ClusterSet::with_ordering(self.clusters.clone(), ordering)
    }

    fn expectation_step(&mut self) {
        let mut underflows = 0;
        for (point, h) in self
            .points
            .axis_iter(Axis(0))
            .zip(self.responsibilities.axis_iter_mut(Axis(0)))
        {
            if fill_posteriors(&self.clusters, point, h) {
                underflows += 1;
            }
        }

        if underflows > 0 {
            debug!("{} points fell back to log-space responsibilities", underflows);
        }
    }

    fn maximization_step(&mut self) {
        let point_count = self.point_count();
        let dimension_count = self.dimension_count();

        for (k, weights) in self.responsibilities.axis_iter(Axis(1)).enumerate() {
            let weight_sum = weights.sum();
            if !(weight_sum > 0.0) {
                warn!("Cluster {} lost all responsibility, keeping its previous distribution", k);
                let distribution = self.clusters[k].distribution().clone();
                self.clusters[k] = Cluster::new(distribution, 0.0);
                continue;
            }

            let mean: Array1<f64> = weights.dot(&self.points) / weight_sum;

            let mut covariance = Array2::<f64>::zeros((dimension_count, dimension_count));
            for (point, &w) in self.points.axis_iter(Axis(0)).zip(weights.iter()) {
                for i in 0..dimension_count {
                    let d_i = point[i] - mean[i];
                    for j in i..dimension_count {
                        covariance[[i, j]] += w * d_i * (point[j] - mean[j]);
                    }
                }
            }
            covariance /= weight_sum;

            match MultinormalDistribution::new(mean, covariance) {
                Ok(distribution) => {
                    self.clusters[k] = Cluster::new(distribution, weight_sum / point_count as f64);
                }
                Err(e) => {
                    warn!("Could not refit cluster {}: {}", k, e);
                    let distribution = self.clusters[k].distribution().clone();
                    self.clusters[k] = Cluster::new(distribution, weight_sum / point_count as f64);
                }
            }
        }
    }
}
