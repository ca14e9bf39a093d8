use crate::geometry::Aabb;
use crate::glam::{Affine3A, Vec3, Vec3A};

/// Indexed triangle geometry with positions only. Triangles wind counter-clockwise when seen from outside.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexedMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<[u32; 3]>,
}

impl IndexedMesh {
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<[u32; 3]>) -> Self {
        Self { positions, indices }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn position(&self, i: u32) -> Vec3A {
        Vec3A::from(self.positions[i as usize])
    }

    /// Returns `None` if the triangle or any of its vertices is out of range.
    pub fn triangle(&self, tri: usize) -> Option<[Vec3A; 3]> {
        let [a, b, c] = *self.indices.get(tri)?;
        let get = |i: u32| self.positions.get(i as usize).map(|p| Vec3A::from(*p));
        Some([get(a)?, get(b)?, get(c)?])
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().map(|p| Vec3A::from(*p)))
    }

    /// Appends `other` with every vertex mapped through `transform`.
    pub fn append_transformed(&mut self, other: &IndexedMesh, transform: &Affine3A) {
        let offset = self.positions.len() as u32;
        self.positions.extend(
            other
                .positions
                .iter()
                .map(|p| transform.transform_point3(Vec3::from(*p)).to_array()),
        );
        self.indices.extend(
            other
                .indices
                .iter()
                .map(|[a, b, c]| [a + offset, b + offset, c + offset]),
        );
    }

    /// Raw vertex bytes, ready for upload into a GPU buffer by the host.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MaterialKind {
    /// Physically based "standard" shading.
    Standard,
    Basic,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    /// Linear RGB in `[0, 1]`.
    pub color: [f32; 3],
    pub flat_shading: bool,
    pub double_sided: bool,
}

impl Material {
    pub fn flat_standard(color: [f32; 3]) -> Self {
        Self {
            kind: MaterialKind::Standard,
            color,
            flat_shading: true,
            double_sided: true,
        }
    }
}
