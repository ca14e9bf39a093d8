use tilestream_core::glam::Vec3A;
use tilestream_core::SmallKeyHashSet;

/// Integer coordinates of a grid cell.
pub type CellKey = [i64; 3];

/// The grid cell containing `p`.
///
/// Keys are 64-bit so that georeferenced coordinates over fine cells stay distinct. Float to integer casts saturate, so
/// a key is always defined, but cells beyond `i64` range merge.
pub fn cell_of(p: Vec3A, cell_size: f32) -> CellKey {
    let c = (p / cell_size).floor();
    [c.x as i64, c.y as i64, c.z as i64]
}

/// Keeps the first point of every occupied `resolution`-sized grid cell, in input order.
///
/// Applying it again at the same resolution returns the same points. A non-positive resolution keeps every point.
pub fn downsample_points(points: &[Vec3A], resolution: f32) -> Vec<Vec3A> {
    if resolution <= 0.0 {
        return points.to_vec();
    }

    let mut occupied = SmallKeyHashSet::default();
    points
        .iter()
        .copied()
        .filter(|&p| occupied.insert(cell_of(p, resolution)))
        .collect()
}
