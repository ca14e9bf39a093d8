use crate::TileSet;

use tilestream_core::glam::Affine3A;
use tilestream_core::mesh::IndexedMesh;

/// Merges the world-space triangles of every visible mesh under the groups of `tile_sets` into one static, position-only
/// mesh.
///
/// Returns `None` when no tile set has a visible mesh. A mesh hidden directly or through any ancestor is skipped.
pub fn merge_visible_geometry<'a, T: TileSet>(
    tile_sets: impl IntoIterator<Item = &'a T>,
) -> Option<IndexedMesh> {
    let mut merged = IndexedMesh::default();
    let mut num_meshes = 0;

    for tile_set in tile_sets {
        tile_set
            .group()
            .visit_visible_meshes(&Affine3A::IDENTITY, &mut |mesh, to_world| {
                merged.append_transformed(mesh, to_world);
                num_meshes += 1;
            });
    }

    if num_meshes == 0 {
        return None;
    }
    log::debug!(
        "Merged {} tile meshes into {} triangles",
        num_meshes,
        merged.triangle_count()
    );

    Some(merged)
}
