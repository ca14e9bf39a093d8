use crate::TileSet;

use tilestream_core::geometry::{rotation_between_directions, Sphere, Transform, UP};
use tilestream_core::glam::Vec3;

/// Rotates and translates `root` so that `sphere` (given in the root's local frame) ends up centered on the world origin.
///
/// Geographic datasets are positioned relative to the center of the earth. The rotation maps the direction from the
/// ellipsoid center to the sphere's center onto the up axis, after which the dataset sits "on top" of the ellipsoid at
/// distance `|center|`, and the translation moves it down by that distance.
pub fn reorient_to_origin(root: &mut Transform, sphere: &Sphere) {
    let center = Vec3::from(sphere.center);
    let distance_to_ellipsoid_center = center.length();

    root.rotation = rotation_between_directions(center, UP);
    root.translation = -UP * distance_to_ellipsoid_center;
}

/// Applies [`reorient_to_origin`] to a loaded tile set. Returns `false` (and leaves the root untouched) when the tile set
/// has no bounding volume yet.
pub fn reset_tile_set_to_origin<T: TileSet>(tile_set: &mut T) -> bool {
    let Some(sphere) = tile_set.bounding_sphere() else {
        log::warn!("Cannot reset {} to origin: no bounding sphere", tile_set.url());
        return false;
    };
    log::debug!(
        "Resetting {} to origin from {:?}",
        tile_set.url(),
        sphere.center
    );
    reorient_to_origin(&mut tile_set.group_mut().transform, &sphere);

    true
}
