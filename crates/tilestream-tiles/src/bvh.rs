use tilestream_core::geometry::{Aabb, Ray, Sphere};
use tilestream_core::glam::Vec3A;
use tilestream_core::mesh::IndexedMesh;

use smallvec::SmallVec;

/// A bounding volume hierarchy over the triangles of one static [`IndexedMesh`].
///
/// Built top-down with median splits along the longest axis of the triangle centroids, then stored flat with the left
/// child of every internal node immediately following its parent. The hierarchy does not own the mesh; queries take the
/// mesh it was built from.
#[derive(Clone, Debug, Default)]
pub struct TriangleBvh {
    nodes: Vec<BvhNode>,
    /// Triangle indices, reordered so that every leaf covers a contiguous range.
    triangles: Vec<u32>,
}

#[derive(Clone, Copy, Debug)]
struct BvhNode {
    aabb: Aabb,
    /// Internal: index of the right child. Leaf: first entry in `triangles`.
    offset: u32,
    /// Zero for internal nodes.
    count: u32,
}

impl BvhNode {
    fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Ray time of the hit; world distance if the ray velocity is normalized.
    pub distance: f32,
    pub triangle: u32,
    pub point: Vec3A,
}

impl TriangleBvh {
    pub fn build(mesh: &IndexedMesh, max_leaf_triangles: usize) -> Self {
        let max_leaf_triangles = max_leaf_triangles.max(1);

        let mut prims: Vec<BuildPrim> = (0..mesh.triangle_count())
            .filter_map(|tri| {
                let corners = mesh.triangle(tri)?;
                let aabb = Aabb::from_points(corners);
                Some(BuildPrim {
                    triangle: tri as u32,
                    centroid: aabb.center(),
                    aabb,
                })
            })
            .collect();

        let mut bvh = Self {
            nodes: Vec::with_capacity(2 * prims.len() / max_leaf_triangles + 1),
            triangles: Vec::with_capacity(prims.len()),
        };
        if !prims.is_empty() {
            bvh.build_recursive(&mut prims, max_leaf_triangles);
        }

        bvh
    }

    fn build_recursive(&mut self, prims: &mut [BuildPrim], max_leaf_triangles: usize) -> u32 {
        let mut aabb = Aabb::EMPTY;
        let mut centroid_bounds = Aabb::EMPTY;
        for p in prims.iter() {
            aabb.expand_aabb(&p.aabb);
            centroid_bounds.expand_point(p.centroid);
        }

        let node_index = self.nodes.len() as u32;
        if prims.len() <= max_leaf_triangles {
            self.nodes.push(BvhNode {
                aabb,
                offset: self.triangles.len() as u32,
                count: prims.len() as u32,
            });
            self.triangles.extend(prims.iter().map(|p| p.triangle));
            return node_index;
        }

        // Placeholder, patched once the right child's index is known.
        self.nodes.push(BvhNode {
            aabb,
            offset: 0,
            count: 0,
        });

        let axis = longest_axis(centroid_bounds.extent());
        let mid = prims.len() / 2;
        prims.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));
        let (left, right) = prims.split_at_mut(mid);

        self.build_recursive(left, max_leaf_triangles);
        let right_index = self.build_recursive(right, max_leaf_triangles);
        self.nodes[node_index as usize].offset = right_index;

        node_index
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn aabb(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |n| n.aabb)
    }

    /// The nearest intersection of `ray` with `mesh`, which must be the mesh this hierarchy was built from.
    pub fn cast_ray(&self, mesh: &IndexedMesh, ray: &Ray) -> Option<RayHit> {
        let mut nearest: Option<RayHit> = None;
        let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
        if !self.nodes.is_empty() {
            stack.push(0);
        }

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            let Some([tmin, _]) = ray.cast_at_aabb(&node.aabb) else {
                continue;
            };
            if nearest.map_or(false, |hit| tmin > hit.distance) {
                continue;
            }

            if node.is_leaf() {
                for &tri in self.leaf_triangles(node) {
                    let Some(corners) = mesh.triangle(tri as usize) else {
                        continue;
                    };
                    if let Some(t) = ray.cast_at_triangle(corners) {
                        if nearest.map_or(true, |hit| t < hit.distance) {
                            nearest = Some(RayHit {
                                distance: t,
                                triangle: tri,
                                point: ray.position_at(t),
                            });
                        }
                    }
                }
            } else {
                stack.push(node.offset);
                stack.push(index + 1);
            }
        }

        nearest
    }

    /// Visits every triangle whose bounding box overlaps `sphere`. Callers needing exact contact must test the triangle.
    pub fn visit_sphere_overlaps(&self, sphere: &Sphere, mut visitor: impl FnMut(u32)) {
        let mut stack: SmallVec<[u32; 64]> = SmallVec::new();
        if !self.nodes.is_empty() {
            stack.push(0);
        }

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !sphere.intersects_aabb(&node.aabb) {
                continue;
            }
            if node.is_leaf() {
                for &tri in self.leaf_triangles(node) {
                    visitor(tri);
                }
            } else {
                stack.push(node.offset);
                stack.push(index + 1);
            }
        }
    }

    fn leaf_triangles(&self, node: &BvhNode) -> &[u32] {
        let start = node.offset as usize;
        &self.triangles[start..start + node.count as usize]
    }
}

struct BuildPrim {
    triangle: u32,
    centroid: Vec3A,
    aabb: Aabb,
}

fn longest_axis(extent: Vec3A) -> usize {
    if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
