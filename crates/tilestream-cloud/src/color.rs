use tilestream_core::glam::Vec3A;
use tilestream_core::SmallKeyHashMap;

/// A color quantized to buckets of `tolerance` on the 0-255 scale.
///
/// Each channel rounds to the nearest multiple of the tolerance. A channel exactly halfway between two multiples rounds
/// up.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ColorKey {
    buckets: [i32; 3],
}

impl ColorKey {
    pub fn quantize(color: Vec3A, tolerance: f32) -> Self {
        let tolerance = tolerance.max(f32::EPSILON);
        let scaled = color * 255.0 / tolerance;
        let buckets = (scaled + Vec3A::splat(0.5)).floor().as_ivec3();

        Self {
            buckets: buckets.to_array(),
        }
    }

    pub fn buckets(&self) -> [i32; 3] {
        self.buckets
    }

    /// The bucket's representative color in `[0, 1]`.
    pub fn to_color(&self, tolerance: f32) -> [f32; 3] {
        self.buckets
            .map(|b| (b as f32 * tolerance / 255.0).clamp(0.0, 1.0))
    }
}

#[derive(Clone, Debug)]
pub struct ColorGroup {
    pub key: ColorKey,
    pub points: Vec<Vec3A>,
}

/// Points partitioned by [`ColorKey`]. Groups iterate in the order their first point was inserted.
#[derive(Clone, Debug, Default)]
pub struct ColorGroups {
    groups: Vec<ColorGroup>,
    index: SmallKeyHashMap<ColorKey, usize>,
}

impl ColorGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ColorKey, point: Vec3A) {
        let groups = &mut self.groups;
        let i = *self.index.entry(key).or_insert_with(|| {
            groups.push(ColorGroup {
                key,
                points: Vec::new(),
            });
            groups.len() - 1
        });
        self.groups[i].points.push(point);
    }

    pub fn get(&self, key: ColorKey) -> Option<&ColorGroup> {
        self.index.get(&key).map(|&i| &self.groups[i])
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColorGroup> {
        self.groups.iter()
    }

    pub fn as_slice(&self) -> &[ColorGroup] {
        &self.groups
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.index.clear();
    }
}
