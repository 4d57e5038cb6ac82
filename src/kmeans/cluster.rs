use crate::utils::{closest_mean, LibData};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansCluster<A: LibData = f64> {
    mean: Array1<A>,
    member_count: usize,
}

impl<A: LibData> KMeansCluster<A> {
    pub fn new(mean: Array1<A>, member_count: usize) -> Self {
        Self { mean, member_count }
    }

    pub fn mean(&self) -> ArrayView1<A> {
        self.mean.view()
    }

    /// Points assigned to this cluster during the last completed pass.
    pub fn member_count(&self) -> usize {
        self.member_count
    }
}

/// Immutable result of a k-means run, ordered by descending member count.
#[derive(Debug, Clone)]
pub struct KMeansClusterSet<A: LibData = f64> {
    clusters: Vec<KMeansCluster<A>>,
    means: Array2<A>,
}

impl<A: LibData> KMeansClusterSet<A> {
    pub fn new(mut clusters: Vec<KMeansCluster<A>>) -> Self {
        clusters.sort_by(|a, b| b.member_count.cmp(&a.member_count));

        let dimension_count = clusters.first().map_or(0, |c| c.mean.len());
        let means = Array2::from_shape_fn((clusters.len(), dimension_count), |(k, i)| clusters[k].mean[i]);
        Self { clusters, means }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn cluster(&self, index: usize) -> Option<&KMeansCluster<A>> {
        self.clusters.get(index)
    }

    pub fn clusters(&self) -> &[KMeansCluster<A>] {
        &self.clusters
    }

    /// Cluster means as rows, in set order.
    pub fn means(&self) -> ArrayView2<A> {
        self.means.view()
    }

    pub fn member_counts(&self) -> Vec<usize> {
        self.clusters.iter().map(|c| c.member_count).collect()
    }

    /// Index of the cluster whose mean is closest to `point` in squared euclidean
    /// distance; ties go to the lower index.
    pub fn nearest_cluster(&self, point: ArrayView1<A>) -> usize {
        closest_mean(point, self.means.view())
    }

    /// Nearest cluster of every row of `points`.
    pub fn classify(&self, points: ArrayView2<A>) -> Vec<usize> {
        (0..points.nrows())
            .into_par_iter()
            .map(|i| self.nearest_cluster(points.row(i)))
            .collect()
    }
}
