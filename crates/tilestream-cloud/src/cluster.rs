use crate::SpatialGrid;

use std::collections::VecDeque;
use tilestream_core::glam::Vec3A;

/// Progress is reported after every this many seed points.
pub const CLUSTER_PROGRESS_INTERVAL: usize = 10;

/// Splits `points` into connected components, where two points are connected iff their distance is strictly less than
/// `distance_threshold`. Components with fewer than `min_cluster_size` points are dropped.
///
/// A threshold that is not positive connects nothing, so every point is its own component before the size filter.
///
/// Clusters come out in the order of their first point, each in breadth-first order from that point.
/// `on_progress(processed, total)` is called every [`CLUSTER_PROGRESS_INTERVAL`] seed points.
pub fn cluster_points(
    points: &[Vec3A],
    distance_threshold: f32,
    min_cluster_size: usize,
    mut on_progress: impl FnMut(usize, usize),
) -> Vec<Vec<Vec3A>> {
    // Any neighbor within the threshold lies in one of the 27 cells around a point.
    let grid = (distance_threshold > 0.0).then(|| SpatialGrid::build(points, 1.5 * distance_threshold));
    let threshold_sq = distance_threshold * distance_threshold;

    let mut visited = vec![false; points.len()];
    let mut clusters = Vec::new();
    let mut frontier = VecDeque::new();

    for seed in 0..points.len() {
        if seed % CLUSTER_PROGRESS_INTERVAL == 0 {
            on_progress(seed, points.len());
        }
        if visited[seed] {
            continue;
        }

        visited[seed] = true;
        frontier.push_back(seed);
        let mut cluster = Vec::new();
        while let Some(i) = frontier.pop_front() {
            let p = points[i];
            cluster.push(p);
            let Some(grid) = grid.as_ref() else {
                continue;
            };
            for j in grid.neighborhood(p) {
                let j = j as usize;
                if !visited[j] && p.distance_squared(points[j]) < threshold_sq {
                    visited[j] = true;
                    frontier.push_back(j);
                }
            }
        }

        if cluster.len() >= min_cluster_size {
            clusters.push(cluster);
        }
    }
    log::debug!(
        "Clustered {} points into {} clusters",
        points.len(),
        clusters.len()
    );

    clusters
}
