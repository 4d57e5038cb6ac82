#[derive(Debug, Clone)]
pub struct EmParameters {
    pub cluster_count: usize,
    pub iteration_count: usize,
    pub seed: u64,
}

impl Default for EmParameters {
    fn default() -> Self {
        Self {
            cluster_count: 14,
            iteration_count: 30,
            seed: 31415,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansParameters {
    pub cluster_count: usize,
    pub iteration_count: usize,
    pub seed: u64,
    /// A pass converges when the summed squared movement of all means is at
    /// most this value. Zero demands that no mean moved at all.
    pub convergence_tolerance: f64,
    /// Upper bound on draws from the seed source while looking for distinct
    /// initial means.
    pub max_seed_draws: usize,
}

impl Default for KMeansParameters {
    fn default() -> Self {
        Self {
            cluster_count: 14,
            iteration_count: 30,
            seed: 31415,
            convergence_tolerance: 0.0,
            max_seed_draws: 10_000,
        }
    }
}
