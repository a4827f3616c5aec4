// Unit tests for density clustering on hand-built 2-D layouts.

use std::collections::BTreeSet;
use std::time::Duration;

use review_topics::clustering::kdtree::core_distances;
use review_topics::clustering::{Hdbscan, HdbscanConfig, NOISE};
use review_topics::deadline::Deadline;
use review_topics::error::PipelineError;

/// A `side` x `side` lattice with spacing 0.1, anchored at `origin`.
fn lattice(origin: [f64; 2], side: usize) -> Vec<[f64; 2]> {
    (0..side * side)
        .map(|i| {
            [
                origin[0] + (i % side) as f64 * 0.1,
                origin[1] + (i / side) as f64 * 0.1,
            ]
        })
        .collect()
}

fn clusterer(min_cluster_size: usize) -> Hdbscan {
    Hdbscan::new(HdbscanConfig {
        min_samples: 4,
        min_cluster_size,
    })
}

#[test]
fn two_far_lattices_are_two_clusters() {
    let mut points = lattice([0.0, 0.0], 10);
    points.extend(lattice([500.0, 500.0], 10));

    let labels = clusterer(20).cluster(&points, &Deadline::unbounded()).unwrap();
    assert_eq!(labels.len(), 200);

    let first: BTreeSet<i32> = labels[..100].iter().copied().collect();
    let second: BTreeSet<i32> = labels[100..].iter().copied().collect();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first, second);
    assert!(!first.contains(&NOISE) && !second.contains(&NOISE));
}

#[test]
fn every_point_gets_noise_or_a_dense_id() {
    let mut points = lattice([0.0, 0.0], 8);
    points.extend(lattice([40.0, 0.0], 8));
    points.extend(lattice([0.0, 40.0], 8));
    points.push([-300.0, 300.0]);

    let labels = clusterer(16).cluster(&points, &Deadline::unbounded()).unwrap();
    assert_eq!(labels.len(), points.len());
    assert_eq!(labels[points.len() - 1], NOISE);

    let ids: BTreeSet<i32> = labels.iter().copied().filter(|&l| l != NOISE).collect();
    let expected: BTreeSet<i32> = (0..ids.len() as i32).collect();
    assert_eq!(ids, expected);
    assert_eq!(ids.len(), 3);
}

#[test]
fn groups_smaller_than_min_cluster_size_are_noise() {
    let mut points = lattice([0.0, 0.0], 3);
    points.extend(lattice([50.0, 50.0], 3));
    let labels = clusterer(20).cluster(&points, &Deadline::unbounded()).unwrap();
    assert!(labels.iter().all(|&l| l == NOISE));
}

#[test]
fn expired_deadline_is_a_timeout() {
    let points = lattice([0.0, 0.0], 10);
    let deadline = Deadline::new(Duration::ZERO);
    std::thread::sleep(Duration::from_millis(2));
    let err = clusterer(20).cluster(&points, &deadline).unwrap_err();
    assert!(matches!(err, PipelineError::Timeout { stage: "clustering", .. }));
}

#[test]
fn core_distance_on_a_line() {
    let points: Vec<[f64; 2]> = (0..5).map(|i| [i as f64, 0.0]).collect();
    // second-nearest other point
    let core = core_distances(&points, 2);
    assert_eq!(core, vec![2.0, 1.0, 1.0, 1.0, 2.0]);
}
