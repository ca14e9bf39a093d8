use crate::glam::{Affine3A, Quat, Vec3, Vec3A};

use serde::{Deserialize, Serialize};

/// The world "up" axis used by the editor.
pub const UP: Vec3 = Vec3::Y;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub start: Vec3A,
    velocity: Vec3A,
    inverse_velocity: Vec3A,
}

impl Ray {
    pub fn new(start: Vec3A, velocity: Vec3A) -> Self {
        Self {
            start,
            velocity,
            inverse_velocity: 1.0 / velocity,
        }
    }

    pub fn velocity(&self) -> Vec3A {
        self.velocity
    }

    pub fn inverse_velocity(&self) -> Vec3A {
        self.inverse_velocity
    }

    pub fn position_at(&self, t: f32) -> Vec3A {
        self.start + t * self.velocity
    }

    /// If the ray intersects box `aabb`, returns `(tmin, tmax)`, the entrance and exit times of the ray.
    ///
    /// Implemented as branchless, vectorized "slab method". Does not attempt to handle NaNs properly.
    ///
    /// Refer to [this reference](https://tavianator.com/2015/ray_box_nan.html).
    pub fn cast_at_aabb(&self, aabb: &Aabb) -> Option<[f32; 2]> {
        let t1 = (aabb.min - self.start) * self.inverse_velocity;
        let t2 = (aabb.max - self.start) * self.inverse_velocity;

        let tmin = t1.min(t2).max_element();
        let tmax = t1.max(t2).min_element();

        (tmax >= tmin.max(0.0)).then(|| [tmin, tmax])
    }

    /// Möller–Trumbore ray/triangle intersection. Returns the ray time of the hit, ignoring hits behind the start.
    pub fn cast_at_triangle(&self, [a, b, c]: [Vec3A; 3]) -> Option<f32> {
        const EPSILON: f32 = 1e-7;

        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.velocity.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            // Parallel to the triangle's plane.
            return None;
        }
        let inv_det = 1.0 / det;

        let s = self.start - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.velocity.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        (t >= 0.0).then(|| t)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3A,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3A, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, other: &Self) -> bool {
        let dist = self.center.distance(other.center);
        dist + other.radius < self.radius
    }

    pub fn intersects(&self, other: &Self) -> bool {
        let dist = self.center.distance(other.center);
        dist - other.radius < self.radius
    }

    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let closest = self.center.clamp(aabb.min, aabb.max);
        closest.distance_squared(self.center) <= self.radius * self.radius
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(
            self.center - Vec3A::splat(self.radius),
            self.center + Vec3A::splat(self.radius),
        )
    }
}

/// An axis-aligned box given by inclusive corners. The default value is empty (inverted) so it can be grown point by point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3A,
    pub max: Vec3A,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3A::splat(f32::INFINITY),
        max: Vec3A::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3A, max: Vec3A) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3A>) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.expand_point(p);
        }
        aabb
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn expand_point(&mut self, p: Vec3A) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn expand_aabb(&mut self, other: &Self) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn center(&self) -> Vec3A {
        0.5 * (self.min + self.max)
    }

    pub fn extent(&self) -> Vec3A {
        self.max - self.min
    }

    /// The smallest sphere centered on the box that contains it.
    pub fn bounding_sphere(&self) -> Sphere {
        Sphere::new(self.center(), 0.5 * self.extent().length())
    }
}

/// A decomposed rigid transform (plus scale), the "root transform" of a tile set or the local transform of a scene node.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Returns the shortest rotation taking direction `from` onto direction `to`. Inputs need not be normalized.
///
/// Uses the half-angle construction `normalize(w = 1 + from·to, xyz = from × to)`. That construction degenerates for
/// antiparallel inputs (the cross product vanishes and `w` goes to zero), so in that case we rotate half a turn about an
/// arbitrary axis perpendicular to `from`. Zero-length inputs yield the identity.
pub fn rotation_between_directions(from: Vec3, to: Vec3) -> Quat {
    const ANTIPARALLEL_EPSILON: f32 = 1e-6;

    let (Some(from), Some(to)) = (from.try_normalize(), to.try_normalize()) else {
        return Quat::IDENTITY;
    };

    let w = 1.0 + from.dot(to);
    if w < ANTIPARALLEL_EPSILON {
        return Quat::from_axis_angle(any_orthogonal(from), std::f32::consts::PI);
    }

    let axis = from.cross(to);
    Quat::from_xyzw(axis.x, axis.y, axis.z, w).normalize()
}

/// Some unit vector orthogonal to the unit vector `v`.
fn any_orthogonal(v: Vec3) -> Vec3 {
    // Cross with whichever basis vector is least aligned with `v`.
    let other = if v.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    v.cross(other).normalize()
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use approx::assert_relative_eq;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn cast_ray_at_aabb_misses() {
        let ray = Ray::new(Vec3A::ONE, Vec3A::new(1.0, 0.0, 0.0));

        let aabb = Aabb::new(Vec3A::splat(1.1), Vec3A::splat(2.0));

        assert_eq!(ray.cast_at_aabb(&aabb), None);
    }

    #[test]
    fn cast_ray_at_aabb_hits() {
        let ray = Ray::new(Vec3A::ONE, Vec3A::new(1.0, 1.0, 1.0));

        let aabb = Aabb::new(Vec3A::splat(1.1), Vec3A::splat(2.0));

        let [tmin, tmax] = ray.cast_at_aabb(&aabb).unwrap();
        assert_relative_eq!(tmin, 0.1, epsilon = 1e-6);
        assert_relative_eq!(tmax, 1.0);
    }

    #[test]
    fn cast_ray_at_triangle() {
        let tri = [
            Vec3A::new(-1.0, 0.0, -1.0),
            Vec3A::new(1.0, 0.0, -1.0),
            Vec3A::new(0.0, 0.0, 1.0),
        ];

        let down = Ray::new(Vec3A::new(0.0, 5.0, 0.0), Vec3A::new(0.0, -1.0, 0.0));
        assert_relative_eq!(down.cast_at_triangle(tri).unwrap(), 5.0);

        let up = Ray::new(Vec3A::new(0.0, 5.0, 0.0), Vec3A::new(0.0, 1.0, 0.0));
        assert_eq!(up.cast_at_triangle(tri), None);

        let beside = Ray::new(Vec3A::new(3.0, 5.0, 0.0), Vec3A::new(0.0, -1.0, 0.0));
        assert_eq!(beside.cast_at_triangle(tri), None);
    }

    #[test]
    fn sphere_aabb_overlap() {
        let aabb = Aabb::new(Vec3A::ZERO, Vec3A::ONE);

        assert!(Sphere::new(Vec3A::new(1.5, 0.5, 0.5), 0.6).intersects_aabb(&aabb));
        assert!(!Sphere::new(Vec3A::new(1.5, 0.5, 0.5), 0.4).intersects_aabb(&aabb));
    }

    #[test]
    fn rotation_maps_from_onto_to() {
        let from = Vec3::new(1.0, 2.0, -3.0);
        let q = rotation_between_directions(from, UP);

        assert_vec_eq(q * from.normalize(), UP);
    }

    #[test]
    fn rotation_between_parallel_directions_is_identity() {
        let q = rotation_between_directions(Vec3::new(0.0, 4.0, 0.0), UP);

        assert_vec_eq(q * Vec3::X, Vec3::X);
    }

    #[test]
    fn rotation_between_antiparallel_directions_is_half_turn() {
        for from in [-UP, -Vec3::X, Vec3::new(0.0, 0.0, 2.0)] {
            let q = rotation_between_directions(from, -from);

            assert!(q.is_finite());
            assert_relative_eq!(q.length(), 1.0, epsilon = 1e-5);
            assert_vec_eq(q * from.normalize(), -from.normalize());
        }
    }

    #[test]
    fn rotation_with_zero_input_is_identity() {
        assert_eq!(rotation_between_directions(Vec3::ZERO, UP), Quat::IDENTITY);
    }
}
