use kdtree::distance::squared_euclidean;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, ScalarOperand};
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::AddAssign;

/// Element type of the k-means engine, implemented for `f32` and `f64`.
pub trait LibData:
    'static
    + Clone
    + Send
    + Default
    + Sync
    + Debug
    + Float
    + FromPrimitive
    + Sum
    + AddAssign
    + ScalarOperand
    + Display
{
}

impl LibData for f32 {}

impl LibData for f64 {}

pub(crate) fn squared_distance<A: LibData>(point_a: ArrayView1<A>, point_b: ArrayView1<A>) -> A {
    match (point_a.as_slice(), point_b.as_slice()) {
        (Some(a), Some(b)) => squared_euclidean(a, b),
        _ => point_a
            .iter()
            .zip(point_b.iter())
            .map(|(a_, b_)| (*a_ - *b_) * (*a_ - *b_))
            .fold(A::zero(), |sum, x| sum + x),
    }
}

/// Index of the mean closest to `point`. Ties resolve to the lowest index.
pub(crate) fn closest_mean<A: LibData>(point: ArrayView1<A>, means: ArrayView2<A>) -> usize {
    means
        .axis_iter(Axis(0))
        .map(|mean| squared_distance(point, mean))
        .enumerate()
        .fold((0, A::infinity()), |(min_i, min), (i, x)| {
            if x < min {
                (i, x)
            } else {
                (min_i, min)
            }
        })
        .0
}

/// Copies the upper triangle of a square matrix onto its lower triangle.
pub(crate) fn mirror_upper_triangle(matrix: &mut Array2<f64>) {
    let n = matrix.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            matrix[[j, i]] = matrix[[i, j]];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_closest_mean_prefers_first_on_ties() {
        let means = arr2(&[[0.0, 0.0], [2.0, 0.0], [1.0, 5.0]]);

        assert_eq!(closest_mean(arr1(&[1.0, 0.0]).view(), means.view()), 0);
        assert_eq!(closest_mean(arr1(&[1.5, 0.0]).view(), means.view()), 1);
        assert_eq!(closest_mean(arr1(&[1.0, 4.0]).view(), means.view()), 2);
    }

    #[test]
    fn test_squared_distance_non_contiguous() {
        let data = arr2(&[[1.0f32, 4.0], [2.0, 6.0]]);
        let column_a = data.column(0);
        let column_b = data.column(1);

        assert_eq!(squared_distance(column_a, column_b), 9.0 + 16.0);
        assert_eq!(
            squared_distance(column_a, column_b),
            squared_distance(column_a.to_owned().view(), column_b.to_owned().view())
        );
    }

    #[test]
    fn test_mirror_upper_triangle() {
        let mut matrix = arr2(&[[1.0, 2.0, 3.0], [-7.0, 4.0, 5.0], [-8.0, -9.0, 6.0]]);
        mirror_upper_triangle(&mut matrix);

        assert_eq!(matrix, arr2(&[[1.0, 2.0, 3.0], [2.0, 4.0, 5.0], [3.0, 5.0, 6.0]]));
    }
}
