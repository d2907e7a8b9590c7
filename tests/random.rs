use kdindex::{euclidean, AffineTransform, BuildMode, Coords, Extent, IndexKd, IndexOptions, Metric};
use rand::{rngs::StdRng, Rng, SeedableRng};

const METRICS: [Metric; 4] = [
    Metric::Manhattan,
    Metric::Euclidean,
    Metric::Chebyshev,
    Metric::Minkowski(3.0),
];

fn random_coords(rng: &mut StdRng, n: usize, dim: usize) -> Coords {
    let data = (0..n * dim).map(|_| rng.gen_range(-100.0..100.0)).collect();
    Coords::new(data, dim).expect("valid coordinates")
}

fn random_point(rng: &mut StdRng, dim: usize) -> Vec<f64> {
    (0..dim).map(|_| rng.gen_range(-110.0..110.0)).collect()
}

fn brute_ball(coords: &Coords, point: &[f64], radius: f64, metric: Metric) -> Vec<usize> {
    (0..coords.len())
        .filter(|&id| metric.distance(point, coords.point(id)) <= radius)
        .collect()
}

fn brute_knn(coords: &Coords, point: &[f64], k: usize, metric: Metric) -> Vec<(usize, f64)> {
    let mut all: Vec<(usize, f64)> = (0..coords.len())
        .map(|id| (id, metric.distance(point, coords.point(id))))
        .collect();
    all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    all.truncate(k);
    all
}

#[test]
fn test_random_balls() {
    let mut rng = StdRng::seed_from_u64(0);
    for dim in [1, 2, 3] {
        for mode in [BuildMode::QuickBuild, BuildMode::QuickQuery] {
            let coords = random_coords(&mut rng, 500, dim);
            let options = IndexOptions::default().with_leaf_size(8).with_build_mode(mode);
            let index = IndexKd::new(coords.clone(), options).expect("valid index");

            for _ in 0..50 {
                let point = random_point(&mut rng, dim);
                let radius = rng.gen_range(1.0..40.0);
                for metric in METRICS {
                    let expected = brute_ball(&coords, &point, radius, metric);
                    let actual = index.ball_with(&point, radius, metric).expect("valid query");
                    assert_eq!(expected, actual);

                    let queries = Coords::new(point.clone(), dim).expect("valid query point");
                    let counts = index.ball_count(&queries, radius, metric).expect("valid query");
                    assert_eq!(counts, vec![expected.len()]);
                }
            }
        }
    }
}

#[test]
fn test_random_neighbours() {
    let mut rng = StdRng::seed_from_u64(1);
    for dim in [2, 3] {
        for mode in [BuildMode::QuickBuild, BuildMode::QuickQuery] {
            let coords = random_coords(&mut rng, 400, dim);
            let options = IndexOptions::default().with_leaf_size(4).with_build_mode(mode);
            let index = IndexKd::new(coords.clone(), options).expect("valid index");

            for _ in 0..50 {
                let point = random_point(&mut rng, dim);
                let k = rng.gen_range(1..=30);
                for metric in METRICS {
                    let expected = brute_knn(&coords, &point, k, metric);
                    let actual = index.knn_with(&point, k, metric).expect("valid query");
                    assert_eq!(actual.iter().collect::<Vec<_>>(), expected);
                }
            }
        }
    }
}

#[test]
fn test_random_closest() {
    let mut rng = StdRng::seed_from_u64(2);
    let coords = random_coords(&mut rng, 300, 2);
    let index = IndexKd::new(coords.clone(), IndexOptions::default()).expect("valid index");
    let nn = index.nn().expect("enough points");

    for id in 0..coords.len() {
        let expected = (0..coords.len())
            .filter(|&other| other != id)
            .map(|other| (euclidean(coords.point(id), coords.point(other)), other))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .expect("other points exist");
        assert_eq!(index.closest(id).expect("existing point"), expected);
        assert_eq!((nn.distances[id], nn.ids[id]), expected);
    }
}

#[test]
fn test_random_boxes() {
    let mut rng = StdRng::seed_from_u64(3);
    for dim in [1, 2, 3] {
        let coords = random_coords(&mut rng, 1000, dim);
        let index = IndexKd::new(coords.clone(), IndexOptions::default()).expect("valid index");

        for _ in 0..100 {
            let (min, max): (Vec<f64>, Vec<f64>) = (0..dim)
                .map(|_| {
                    let a = rng.gen_range(-120.0..120.0);
                    let b = rng.gen_range(-120.0..120.0);
                    (f64::min(a, b), f64::max(a, b))
                })
                .unzip();
            let expected: Vec<usize> = (0..coords.len())
                .filter(|&id| {
                    let point = coords.point(id);
                    (0..dim).all(|axis| min[axis] <= point[axis] && point[axis] <= max[axis])
                })
                .collect();

            let extent = Extent::new(min, max).expect("valid extent");
            assert_eq!(index.box_query(&extent).expect("valid query"), expected);
            assert_eq!(index.box_count(&extent).expect("valid query"), expected.len());
        }
    }
}

#[test]
fn test_random_slices() {
    let mut rng = StdRng::seed_from_u64(4);
    let coords = random_coords(&mut rng, 1000, 3);
    let index = IndexKd::new(coords.clone(), IndexOptions::default()).expect("valid index");

    for _ in 0..100 {
        let axis = rng.gen_range(0..3);
        let a = rng.gen_range(-120.0..120.0);
        let b = rng.gen_range(-120.0..120.0);
        let (min_th, max_th) = (f64::min(a, b), f64::max(a, b));
        let expected: Vec<usize> = (0..coords.len())
            .filter(|&id| (min_th..=max_th).contains(&coords.value(id, axis)))
            .collect();
        let axis = isize::try_from(axis).expect("small axis");
        assert_eq!(index.slice(min_th, max_th, axis).expect("valid query"), expected);
    }

    // A threshold pair that pins a stored value exactly.
    let value = coords.value(17, 2);
    assert!(index.slice_last(value, value).expect("valid query").contains(&17));
}

#[test]
fn test_random_shells() {
    let mut rng = StdRng::seed_from_u64(5);
    let coords = random_coords(&mut rng, 500, 2);
    let index = IndexKd::new(coords.clone(), IndexOptions::default()).expect("valid index");

    for _ in 0..100 {
        let center = random_point(&mut rng, 2);
        let r_min = rng.gen_range(1.0..20.0);
        let r_max = r_min + rng.gen_range(0.5..20.0);
        let inner = brute_ball(&coords, &center, r_min, Metric::Euclidean);
        let expected: Vec<usize> = brute_ball(&coords, &center, r_max, Metric::Euclidean)
            .into_iter()
            .filter(|id| !inner.contains(id))
            .collect();
        assert_eq!(index.shell(&center, r_min, r_max).expect("valid query"), expected);
    }
}

#[test]
fn test_random_transformed_index() {
    let mut rng = StdRng::seed_from_u64(6);
    let coords = random_coords(&mut rng, 500, 3);
    let transform = AffineTransform::rotation(3, 0, 2, 0.7)
        .and_then(|rotation| rotation.then(&AffineTransform::translation(&[5.0, -3.0, 1.0])?))
        .expect("valid transform");
    let index = IndexKd::with_transform(coords.clone(), transform.clone(), IndexOptions::default())
        .expect("valid index");

    for id in 0..coords.len() {
        assert_eq!(index.coords().point(id), transform.apply(coords.point(id)).as_slice());
    }

    // Queries go through the same transform as the stored points, so the
    // brute force runs on the stored coordinates.
    for _ in 0..50 {
        let point = random_point(&mut rng, 3);
        let projected = transform.apply(&point);
        let radius = rng.gen_range(5.0..40.0);
        let expected = brute_ball(index.coords(), &projected, radius, Metric::Euclidean);
        assert_eq!(index.ball(&point, radius).expect("valid query"), expected);

        let expected = brute_knn(index.coords(), &projected, 10, Metric::Euclidean);
        let actual = index.knn(&point, 10).expect("valid query");
        assert_eq!(actual.iter().collect::<Vec<_>>(), expected);
    }
}
