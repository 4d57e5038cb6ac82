//! Unsupervised clustering of multispectral pixel data.
//!
//! Two trainers are provided: [`EmClusterer`] fits a mixture of multinormal
//! clusters to an in-memory sample by expectation-maximization, and
//! [`KMeansClusterer`] runs k-means over data fed chunk by chunk, so a scene
//! never has to fit in memory. Both hand out immutable cluster sets that can be
//! queried from many threads, optionally through a [`TrainedModel`] that trains
//! the set exactly once.

mod cache;
pub mod distribution;
pub mod em;
mod error;
pub mod kmeans;
mod parameters;
#[cfg(test)]
mod test_utils;
mod utils;

pub use cache::TrainedModel;
pub use distribution::{Distribution, MultinormalDistribution};
pub use em::{Cluster, ClusterSet, EmClusterer};
pub use error::ClusterError;
pub use kmeans::{KMeansCluster, KMeansClusterSet, KMeansClusterer, RandomPointSource};
pub use parameters::{EmParameters, KMeansParameters};
pub use utils::LibData;
