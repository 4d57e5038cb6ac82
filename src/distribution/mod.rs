use ndarray::ArrayView1;

pub mod multinormal;

pub use multinormal::MultinormalDistribution;

/// A probability distribution over points of a fixed dimension.
///
/// `density` is derived from `log_density` so that both always agree exactly;
/// implementors only override it when they can guarantee the same value.
pub trait Distribution: Send + Sync {
    fn log_density(&self, point: ArrayView1<f64>) -> f64;

    fn density(&self, point: ArrayView1<f64>) -> f64 {
        self.log_density(point).exp()
    }

    fn mean(&self) -> ArrayView1<f64>;
}
