use nalgebra::Point3;
use parry3d::shape::ConvexPolyhedron;
use std::panic::{self, UnwindSafe};
use thiserror::Error;
use tilestream_core::glam::Vec3A;
use tilestream_core::mesh::IndexedMesh;

/// Hulls enclosing less than this fraction of the cube on their longest side count as flat.
const MIN_RELATIVE_VOLUME: f32 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum HullError {
    #[error("need at least 4 points for a convex hull, got {0}")]
    TooFewPoints(usize),
    #[error("points are degenerate (coplanar, collinear or coincident)")]
    Degenerate,
    #[error("hull computation panicked: {0}")]
    Panicked(String),
}

/// Triangulated convex hull of `points`.
///
/// Only solids are accepted: points spanning fewer than 3 dimensions give [`HullError::Degenerate`], and a panic inside
/// the hull algorithm is caught and returned as [`HullError::Panicked`].
pub fn convex_hull_mesh(points: &[Vec3A]) -> Result<IndexedMesh, HullError> {
    if points.len() < 4 {
        return Err(HullError::TooFewPoints(points.len()));
    }
    let points: Vec<Point3<f32>> = points.iter().map(|p| Point3::new(p.x, p.y, p.z)).collect();

    let (vertices, indices) = catch_panic(|| {
        let hull = ConvexPolyhedron::from_convex_hull(&points).ok_or(HullError::Degenerate)?;
        Ok(hull.to_trimesh())
    })?;
    if indices.is_empty() {
        return Err(HullError::Degenerate);
    }

    let mesh = IndexedMesh::new(
        vertices.iter().map(|v| [v.x, v.y, v.z]).collect(),
        indices,
    );
    let size = mesh.aabb().extent().max_element();
    if !(enclosed_volume(&mesh) > MIN_RELATIVE_VOLUME * size * size * size) {
        return Err(HullError::Degenerate);
    }

    Ok(mesh)
}

/// Volume enclosed by a closed, consistently wound triangle mesh.
fn enclosed_volume(mesh: &IndexedMesh) -> f32 {
    if mesh.vertex_count() == 0 {
        return 0.0;
    }
    // Relative to a vertex, so that far-away meshes keep their precision.
    let origin = mesh.position(0);
    let six_volume: f32 = (0..mesh.triangle_count())
        .filter_map(|t| mesh.triangle(t))
        .map(|[a, b, c]| (a - origin).dot((b - origin).cross(c - origin)))
        .sum();

    six_volume.abs() / 6.0
}

fn catch_panic<R>(f: impl FnOnce() -> Result<R, HullError> + UnwindSafe) -> Result<R, HullError> {
    panic::catch_unwind(f).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        Err(HullError::Panicked(message))
    })
}

#[cfg(test)]
mod test {
    use super::*;

    use tilestream_core::approx::assert_relative_eq;
    use tilestream_core::geometry::Aabb;

    fn cube_corners() -> Vec<Vec3A> {
        let mut points = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    points.push(Vec3A::new(x, y, z));
                }
            }
        }
        points
    }

    #[test]
    fn cube_corners_make_a_closed_hull() {
        let mut points = cube_corners();
        // An interior point does not change the hull.
        points.push(Vec3A::splat(0.5));

        let mesh = convex_hull_mesh(&points).unwrap();

        assert!(mesh.triangle_count() >= 12);
        assert_eq!(mesh.aabb(), Aabb::new(Vec3A::ZERO, Vec3A::ONE));
        assert_relative_eq!(enclosed_volume(&mesh), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn too_few_points_fail() {
        let points = [Vec3A::ZERO, Vec3A::X, Vec3A::Y];
        assert!(matches!(
            convex_hull_mesh(&points),
            Err(HullError::TooFewPoints(3))
        ));
    }

    #[test]
    fn flat_point_sets_fail() {
        let plane: Vec<_> = (0..25)
            .map(|i| Vec3A::new((i % 5) as f32, 0.0, (i / 5) as f32))
            .collect();
        assert_eq!(convex_hull_mesh(&plane), Err(HullError::Degenerate));

        let line: Vec<_> = (0..10).map(|i| Vec3A::new(i as f32 * 0.1, 0.0, 0.0)).collect();
        assert!(convex_hull_mesh(&line).is_err());

        assert!(convex_hull_mesh(&[Vec3A::ONE; 6]).is_err());
    }

    #[test]
    fn panics_become_errors() {
        let result: Result<(), _> = catch_panic(|| panic!("bad input"));
        assert_eq!(result, Err(HullError::Panicked("bad input".to_owned())));

        assert_eq!(catch_panic(|| Ok(7)), Ok(7));
    }
}
