mod cluster;
mod source;
#[cfg(test)]
mod tests;

pub use cluster::{KMeansCluster, KMeansClusterSet};
pub use source::RandomPointSource;

use crate::error::ClusterError;
use crate::parameters::KMeansParameters;
use crate::utils::{closest_mean, LibData};
use anyhow::{ensure, Result};
use log::debug;
use ndarray::{Array1, Array2, ArrayView2, Axis};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Constructed,
    Initialized,
    Accumulating,
}

/// K-means clusterer that never holds the data set.
///
/// Only the current means and one pass worth of per-cluster sums and counts are
/// kept, so a pass may be fed chunk by chunk (one raster tile at a time):
///
/// ```text
/// initialize(seed points)
/// loop {
///     start_iteration()
///     accumulate_chunk(tile) for every tile
///     if end_iteration() { break }
/// }
/// ```
pub struct KMeansClusterer<A: LibData = f64> {
    means: Array2<A>,
    sums: Array2<A>,
    member_counts: Vec<usize>,
    convergence_tolerance: A,
    max_seed_draws: usize,
    iterations: usize,
    state: State,
}

impl<A: LibData> KMeansClusterer<A> {
    pub fn new(cluster_count: usize, dimension_count: usize) -> Result<Self> {
        Self::with_parameters(
            dimension_count,
            &KMeansParameters {
                cluster_count,
                ..Default::default()
            },
        )
    }

    pub fn with_parameters(dimension_count: usize, parameters: &KMeansParameters) -> Result<Self> {
        let cluster_count = parameters.cluster_count;
        ensure!(
            cluster_count > 0,
            ClusterError::InvalidArgument("cluster count must be positive".to_string())
        );
        ensure!(
            dimension_count > 0,
            ClusterError::InvalidArgument("points must have at least one dimension".to_string())
        );
        let convergence_tolerance = A::from_f64(parameters.convergence_tolerance)
            .filter(|t| *t >= A::zero())
            .ok_or_else(|| {
                ClusterError::InvalidArgument("convergence tolerance must be non-negative".to_string())
            })?;

        Ok(Self {
            means: Array2::zeros((cluster_count, dimension_count)),
            sums: Array2::zeros((cluster_count, dimension_count)),
            member_counts: vec![0; cluster_count],
            convergence_tolerance,
            max_seed_draws: parameters.max_seed_draws,
            iterations: 0,
            state: State::Constructed,
        })
    }

    /// Clusters an in-memory sample: seeds from random rows, then runs up to the
    /// configured number of passes over `points` as a single chunk.
    pub fn train(points: ArrayView2<A>, parameters: &KMeansParameters) -> Result<KMeansClusterSet<A>> {
        let mut clusterer = Self::with_parameters(points.ncols(), parameters)?;
        clusterer.initialize(RandomPointSource::new(points, parameters.seed))?;
        clusterer.train_chunked(parameters.iteration_count, || std::iter::once(points))?;
        Ok(clusterer.clusters())
    }

    pub fn cluster_count(&self) -> usize {
        self.means.nrows()
    }

    pub fn dimension_count(&self) -> usize {
        self.means.ncols()
    }

    /// Number of completed passes.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn means(&self) -> ArrayView2<A> {
        self.means.view()
    }

    /// Takes the initial means from `source`, skipping points equal to an already
    /// chosen mean.
    ///
    /// Fails with [`ClusterError::SourceExhausted`] if the source runs dry and with
    /// [`ClusterError::InsufficientDistinctPoints`] once `max_seed_draws` points
    /// have been drawn without finding enough distinct ones. Non-finite points are
    /// rejected. On failure the clusterer keeps its previous means and state.
    pub fn initialize<I>(&mut self, source: I) -> Result<()>
    where
        I: IntoIterator<Item = Array1<A>>,
    {
        let requested = self.cluster_count();
        let dimension_count = self.dimension_count();
        let mut seeds = Array2::zeros((requested, dimension_count));
        let mut source = source.into_iter();
        let mut found = 0;
        let mut draws = 0;

        while found < requested {
            if draws >= self.max_seed_draws {
                return Err(ClusterError::InsufficientDistinctPoints {
                    requested,
                    found,
                    draws,
                }
                .into());
            }
            let candidate = source
                .next()
                .ok_or(ClusterError::SourceExhausted { requested, found })?;
            draws += 1;

            ensure!(
                candidate.len() == dimension_count,
                ClusterError::DimensionMismatch {
                    expected: dimension_count,
                    actual: candidate.len(),
                }
            );
            ensure!(
                candidate.iter().all(|x| x.is_finite()),
                ClusterError::InvalidArgument("seed points must be finite".to_string())
            );
            if seeds
                .axis_iter(Axis(0))
                .take(found)
                .any(|seed| seed == candidate)
            {
                continue;
            }

            seeds.row_mut(found).assign(&candidate);
            found += 1;
        }

        debug!("Seeded {} k-means clusters after {} draws", requested, draws);
        self.means = seeds;
        self.state = State::Initialized;
        Ok(())
    }

    /// Resets the per-pass sums and member counts.
    pub fn start_iteration(&mut self) -> Result<()> {
        ensure!(self.state != State::Constructed, ClusterError::NotInitialized);

        self.sums.fill(A::zero());
        self.member_counts.iter_mut().for_each(|count| *count = 0);
        self.state = State::Accumulating;
        Ok(())
    }

    /// Adds every row of `points` to the sums of its nearest mean. A chunk holding
    /// a non-finite value is rejected as a whole, so no-data pixels must be masked
    /// out beforehand.
    pub fn accumulate_chunk(&mut self, points: ArrayView2<A>) -> Result<()> {
        ensure!(self.state == State::Accumulating, ClusterError::NoIterationStarted);
        ensure!(
            points.ncols() == self.dimension_count(),
            ClusterError::DimensionMismatch {
                expected: self.dimension_count(),
                actual: points.ncols(),
            }
        );

        ensure!(
            points.iter().all(|x| x.is_finite()),
            ClusterError::InvalidArgument("points must be finite".to_string())
        );

        for point in points.axis_iter(Axis(0)) {
            let k = closest_mean(point, self.means.view());
            let mut sum = self.sums.row_mut(k);
            sum += &point;
            self.member_counts[k] += 1;
        }
        Ok(())
    }

    /// Moves every non-empty cluster's mean to the average of its members and
    /// reports whether the pass converged.
    pub fn end_iteration(&mut self) -> Result<bool> {
        ensure!(self.state == State::Accumulating, ClusterError::NoIterationStarted);

        let mut diff = A::zero();
        for ((mut mean, sum), &count) in self
            .means
            .axis_iter_mut(Axis(0))
            .zip(self.sums.axis_iter(Axis(0)))
            .zip(self.member_counts.iter())
        {
            if count == 0 {
                continue;
            }
            let count = A::from_usize(count).unwrap_or_else(A::max_value);
            for (m, s) in mean.iter_mut().zip(sum.iter()) {
                let updated = *s / count;
                diff += (updated - *m) * (updated - *m);
                *m = updated;
            }
        }

        self.iterations += 1;
        self.state = State::Initialized;
        let converged = diff <= self.convergence_tolerance;
        debug!(
            "k-means pass {} moved means by {} (converged: {})",
            self.iterations, diff, converged
        );
        Ok(converged)
    }

    /// Runs up to `iteration_count` passes; `chunks` is called once per pass and
    /// must yield the whole data set. Stops after the first converged pass and
    /// returns the number of passes run.
    pub fn train_chunked<'a, F, I>(&mut self, iteration_count: usize, mut chunks: F) -> Result<usize>
    where
        A: 'a,
        F: FnMut() -> I,
        I: IntoIterator<Item = ArrayView2<'a, A>>,
    {
        for pass in 1..=iteration_count {
            self.start_iteration()?;
            for chunk in chunks() {
                self.accumulate_chunk(chunk)?;
            }
            if self.end_iteration()? {
                return Ok(pass);
            }
        }
        Ok(iteration_count)
    }

    /// Snapshot of the current means with the member counts of the last pass.
    pub fn clusters(&self) -> KMeansClusterSet<A> {
        let clusters = self
            .means
            .axis_iter(Axis(0))
            .zip(self.member_counts.iter())
            .map(|(mean, &count)| KMeansCluster::new(mean.to_owned(), count))
            .collect();
        KMeansClusterSet::new(clusters)
    }
}
