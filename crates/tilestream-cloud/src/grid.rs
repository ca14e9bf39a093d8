use crate::{cell_of, CellKey};

use itertools::iproduct;
use tilestream_core::glam::Vec3A;
use tilestream_core::SmallKeyHashMap;

/// A uniform 3D grid of point indices for fixed-radius neighbor queries.
///
/// Points are stored as indices into the slice the grid was built from.
pub struct SpatialGrid {
    cell_size: f32,
    cells: SmallKeyHashMap<CellKey, Vec<u32>>,
}

impl SpatialGrid {
    pub fn build(points: &[Vec3A], cell_size: f32) -> Self {
        let cell_size = cell_size.max(f32::MIN_POSITIVE);
        let mut cells: SmallKeyHashMap<CellKey, Vec<u32>> = SmallKeyHashMap::default();
        for (i, &p) in points.iter().enumerate() {
            cells.entry(cell_of(p, cell_size)).or_default().push(i as u32);
        }

        Self { cell_size, cells }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Indices of every point in the cell containing `p` and the 26 cells around it.
    ///
    /// This is a superset of the points within `cell_size` of `p`; callers must check distances themselves.
    pub fn neighborhood(&self, p: Vec3A) -> impl Iterator<Item = u32> + '_ {
        let [x, y, z] = cell_of(p, self.cell_size);
        // Offsets past the end of the key range name no cell.
        iproduct!(-1..=1, -1..=1, -1..=1)
            .filter_map(move |(dx, dy, dz)| Some([x.checked_add(dx)?, y.checked_add(dy)?, z.checked_add(dz)?]))
            .filter_map(move |cell| self.cells.get(&cell))
            .flatten()
            .copied()
    }

    pub fn point_count(&self) -> usize {
        self.cells.values().map(|v| v.len()).sum()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
