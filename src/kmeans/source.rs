use crate::utils::LibData;
use ndarray::{Array1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Endless stream of rows drawn uniformly at random, with replacement, from a
/// point sample. Serves as the seed source of [`crate::KMeansClusterer::initialize`].
pub struct RandomPointSource<'a, A: LibData> {
    points: ArrayView2<'a, A>,
    rng: StdRng,
}

impl<'a, A: LibData> RandomPointSource<'a, A> {
    pub fn new(points: ArrayView2<'a, A>, seed: u64) -> Self {
        Self {
            points,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<'a, A: LibData> Iterator for RandomPointSource<'a, A> {
    type Item = Array1<A>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.points.nrows() == 0 {
            return None;
        }
        let i = self.rng.gen_range(0..self.points.nrows());
        Some(self.points.row(i).to_owned())
    }
}
