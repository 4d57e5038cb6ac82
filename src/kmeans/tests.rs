use crate::error::ClusterError;
use crate::kmeans::{KMeansClusterer, RandomPointSource};
use crate::parameters::KMeansParameters;
use crate::test_utils::{close_l1, init_logging, two_gaussians};
use ndarray::{arr1, arr2, s, Array1, Array2, Axis};

fn cluster_error<T>(result: anyhow::Result<T>) -> Option<ClusterError> {
    result.err().and_then(|e| e.downcast::<ClusterError>().ok())
}

#[test]
fn test_kmeans_separates_two_gaussians() {
    init_logging();
    let (points, labels) = two_gaussians();

    let mut clusterer = KMeansClusterer::<f64>::new(2, 2).unwrap();
    clusterer
        .initialize(RandomPointSource::new(points.view(), 31415))
        .unwrap();
    for _ in 0..10 {
        clusterer.start_iteration().unwrap();
        clusterer.accumulate_chunk(points.view()).unwrap();
        if clusterer.end_iteration().unwrap() {
            break;
        }
    }
    let clusters = clusterer.clusters();

    let assigned = clusters.classify(points.view());
    let agreeing = assigned.iter().zip(labels.iter()).filter(|(a, l)| a == l).count();
    let matching = agreeing.max(points.nrows() - agreeing);
    assert!(matching as f64 >= 0.95 * points.nrows() as f64);

    for (i, point) in points.axis_iter(Axis(0)).enumerate() {
        assert_eq!(assigned[i], clusters.nearest_cluster(point));
    }
    assert_eq!(clusters.member_counts().iter().sum::<usize>(), points.nrows());
}

#[test]
fn test_converges_with_exact_equality() {
    let (points, _) = two_gaussians();
    let mut clusterer = KMeansClusterer::<f64>::new(2, 2).unwrap();
    clusterer
        .initialize(points.axis_iter(Axis(0)).map(|p| p.to_owned()))
        .unwrap();

    let passes = clusterer.train_chunked(50, || std::iter::once(points.view())).unwrap();
    let means = clusterer.means().to_owned();

    assert!(passes < 50);
    assert_eq!(clusterer.iterations(), passes);

    clusterer.start_iteration().unwrap();
    clusterer.accumulate_chunk(points.view()).unwrap();
    assert!(clusterer.end_iteration().unwrap());
    assert_eq!(clusterer.means(), means.view());
}

#[test]
fn test_chunked_accumulation_matches_single_chunk() {
    let (points, _) = two_gaussians();
    let seeds = || vec![points.row(0).to_owned(), points.row(1).to_owned(), points.row(2).to_owned()];

    let mut whole = KMeansClusterer::<f64>::new(3, 2).unwrap();
    whole.initialize(seeds()).unwrap();
    let mut tiled = KMeansClusterer::<f64>::new(3, 2).unwrap();
    tiled.initialize(seeds()).unwrap();

    for _ in 0..4 {
        whole.start_iteration().unwrap();
        whole.accumulate_chunk(points.view()).unwrap();
        let whole_converged = whole.end_iteration().unwrap();

        tiled.start_iteration().unwrap();
        tiled.accumulate_chunk(points.slice(s![..100, ..])).unwrap();
        tiled.accumulate_chunk(points.slice(s![100..101, ..])).unwrap();
        tiled.accumulate_chunk(points.slice(s![101.., ..])).unwrap();
        let tiled_converged = tiled.end_iteration().unwrap();

        assert_eq!(whole_converged, tiled_converged);
        assert_eq!(whole.means(), tiled.means());
    }
    assert_eq!(whole.clusters().member_counts(), tiled.clusters().member_counts());
}

#[test]
fn test_exactly_cluster_count_distinct_points() {
    let distinct = arr2(&[[1.0, 1.0], [4.0, 2.0], [-3.0, 0.5]]);
    let points = Array2::from_shape_fn((90, 2), |(i, j)| distinct[[i % 3, j]]);

    let mut clusterer = KMeansClusterer::<f64>::new(3, 2).unwrap();
    clusterer
        .initialize(RandomPointSource::new(points.view(), 31415))
        .unwrap();

    for row in distinct.axis_iter(Axis(0)) {
        let selected = clusterer
            .means()
            .axis_iter(Axis(0))
            .filter(|mean| *mean == row)
            .count();
        assert_eq!(selected, 1);
    }
}

#[test]
fn test_too_few_distinct_points() {
    let points = Array2::from_shape_fn((50, 2), |(i, _)| (i % 2) as f64);

    let mut clusterer = KMeansClusterer::<f64>::with_parameters(
        2,
        &KMeansParameters {
            cluster_count: 3,
            max_seed_draws: 200,
            ..Default::default()
        },
    )
    .unwrap();
    let error = cluster_error(clusterer.initialize(RandomPointSource::new(points.view(), 31415)));

    assert_eq!(
        error,
        Some(ClusterError::InsufficientDistinctPoints {
            requested: 3,
            found: 2,
            draws: 200
        })
    );
}

#[test]
fn test_exhausted_source() {
    let mut clusterer = KMeansClusterer::<f64>::new(3, 1).unwrap();
    let seeds = vec![arr1(&[1.0]), arr1(&[1.0]), arr1(&[2.0]), arr1(&[2.0])];

    assert_eq!(
        cluster_error(clusterer.initialize(seeds)),
        Some(ClusterError::SourceExhausted { requested: 3, found: 2 })
    );
}

#[test]
fn test_failed_reinitialization_keeps_previous_seeds() {
    let mut clusterer = KMeansClusterer::<f64>::new(3, 1).unwrap();
    clusterer
        .initialize(vec![arr1(&[1.0]), arr1(&[2.0]), arr1(&[3.0])])
        .unwrap();

    assert_eq!(
        cluster_error(clusterer.initialize(vec![arr1(&[50.0]), arr1(&[50.0])])),
        Some(ClusterError::SourceExhausted { requested: 3, found: 1 })
    );
    assert_eq!(clusterer.means(), arr2(&[[1.0], [2.0], [3.0]]).view());

    let parameters = KMeansParameters {
        cluster_count: 3,
        max_seed_draws: 4,
        ..Default::default()
    };
    let mut capped = KMeansClusterer::<f64>::with_parameters(1, &parameters).unwrap();
    assert_eq!(
        cluster_error(capped.initialize(std::iter::repeat(arr1(&[5.0])))),
        Some(ClusterError::InsufficientDistinctPoints { requested: 3, found: 1, draws: 4 })
    );
    assert_eq!(cluster_error(capped.start_iteration()), Some(ClusterError::NotInitialized));
}

#[test]
fn test_non_finite_points_are_rejected() {
    let mut clusterer = KMeansClusterer::<f64>::new(2, 2).unwrap();
    let seeds = vec![arr1(&[f64::NAN, 0.0]), arr1(&[0.0, 0.0]), arr1(&[1.0, 1.0])];

    assert!(matches!(
        cluster_error(clusterer.initialize(seeds)),
        Some(ClusterError::InvalidArgument(_))
    ));
    assert_eq!(cluster_error(clusterer.start_iteration()), Some(ClusterError::NotInitialized));

    clusterer
        .initialize(vec![arr1(&[0.0, 0.0]), arr1(&[1.0, 1.0])])
        .unwrap();
    clusterer.start_iteration().unwrap();
    assert!(matches!(
        cluster_error(clusterer.accumulate_chunk(arr2(&[[0.5, 0.5], [f64::INFINITY, 0.0]]).view())),
        Some(ClusterError::InvalidArgument(_))
    ));
    clusterer.accumulate_chunk(arr2(&[[0.0, 0.0], [1.0, 1.0]]).view()).unwrap();
    assert!(clusterer.end_iteration().unwrap());
    assert_eq!(clusterer.means(), arr2(&[[0.0, 0.0], [1.0, 1.0]]).view());
}

#[test]
fn test_sequential_seeds_skip_duplicates() {
    let mut clusterer = KMeansClusterer::<f64>::new(2, 1).unwrap();
    clusterer
        .initialize(vec![arr1(&[3.0]), arr1(&[3.0]), arr1(&[3.0]), arr1(&[7.0]), arr1(&[9.0])])
        .unwrap();

    assert_eq!(clusterer.means(), arr2(&[[3.0], [7.0]]).view());
}

#[test]
fn test_call_order_is_enforced() {
    let points = arr2(&[[0.0, 0.0], [1.0, 1.0]]);
    let mut clusterer = KMeansClusterer::<f64>::new(2, 2).unwrap();

    assert_eq!(cluster_error(clusterer.start_iteration()), Some(ClusterError::NotInitialized));
    assert_eq!(
        cluster_error(clusterer.accumulate_chunk(points.view())),
        Some(ClusterError::NoIterationStarted)
    );

    clusterer
        .initialize(points.axis_iter(Axis(0)).map(|p| p.to_owned()))
        .unwrap();
    assert_eq!(cluster_error(clusterer.end_iteration()), Some(ClusterError::NoIterationStarted));

    clusterer.start_iteration().unwrap();
    assert_eq!(
        cluster_error(clusterer.accumulate_chunk(Array2::zeros((4, 3)).view())),
        Some(ClusterError::DimensionMismatch { expected: 2, actual: 3 })
    );
    clusterer.accumulate_chunk(points.view()).unwrap();
    assert!(clusterer.end_iteration().unwrap());
    assert_eq!(cluster_error(clusterer.end_iteration()), Some(ClusterError::NoIterationStarted));
}

#[test]
fn test_empty_cluster_keeps_its_mean() {
    let mut clusterer = KMeansClusterer::<f64>::new(2, 1).unwrap();
    clusterer.initialize(vec![arr1(&[0.0]), arr1(&[100.0])]).unwrap();

    clusterer.start_iteration().unwrap();
    clusterer.accumulate_chunk(arr2(&[[1.0], [3.0]]).view()).unwrap();
    assert!(!clusterer.end_iteration().unwrap());

    assert_eq!(clusterer.means(), arr2(&[[2.0], [100.0]]).view());
    let clusters = clusterer.clusters();
    assert_eq!(clusters.member_counts(), vec![2, 0]);
    assert_eq!(clusters.cluster(1).unwrap().mean(), arr1(&[100.0]).view());
}

#[test]
fn test_tolerance_accepts_small_movements() {
    let mut clusterer = KMeansClusterer::<f64>::with_parameters(
        1,
        &KMeansParameters {
            cluster_count: 1,
            convergence_tolerance: 0.5,
            ..Default::default()
        },
    )
    .unwrap();
    clusterer.initialize(vec![arr1(&[0.0])]).unwrap();

    clusterer.start_iteration().unwrap();
    clusterer.accumulate_chunk(arr2(&[[0.4], [0.8]]).view()).unwrap();
    assert!(clusterer.end_iteration().unwrap());
    assert!(close_l1(clusterer.means()[[0, 0]], 0.6, 1e-12));
}

#[test]
fn test_construction_errors() {
    assert!(matches!(
        cluster_error(KMeansClusterer::<f64>::new(0, 2)),
        Some(ClusterError::InvalidArgument(_))
    ));
    assert!(matches!(
        cluster_error(KMeansClusterer::<f64>::new(2, 0)),
        Some(ClusterError::InvalidArgument(_))
    ));
    assert!(matches!(
        cluster_error(KMeansClusterer::<f64>::with_parameters(
            2,
            &KMeansParameters {
                convergence_tolerance: -1.0,
                ..Default::default()
            }
        )),
        Some(ClusterError::InvalidArgument(_))
    ));
}

#[test]
fn test_train_single_precision() {
    let (points, labels) = two_gaussians();
    let points = points.mapv(|x| x as f32);

    let clusters = KMeansClusterer::train(
        points.view(),
        &KMeansParameters {
            cluster_count: 2,
            iteration_count: 10,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(clusters.len(), 2);
    let first: Array1<f32> = clusters.cluster(0).unwrap().mean().to_owned();
    let label_of_first = labels[clusters
        .classify(points.view())
        .iter()
        .position(|&c| c == 0)
        .unwrap()];
    let center = if label_of_first == 0 { 0.0 } else { 10.0 };
    assert!((first[0] - center).abs() < 0.5);
    assert!((first[1] - center).abs() < 0.5);
}
