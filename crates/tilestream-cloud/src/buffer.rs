use tilestream_core::glam::Vec3A;

/// Flat vertex attributes of a point cloud, three components per point.
#[derive(Clone, Debug, Default)]
pub struct GeometryBuffer {
    pub position: Option<Vec<f32>>,
    /// Linear RGB in `[0, 1]`, paired with `position` by index.
    pub color: Option<Vec<f32>>,
}

impl GeometryBuffer {
    pub fn new(position: Vec<f32>, color: Option<Vec<f32>>) -> Self {
        Self {
            position: Some(position),
            color,
        }
    }

    /// Number of whole points in the position channel.
    pub fn point_count(&self) -> usize {
        self.position.as_ref().map_or(0, |p| p.len() / 3)
    }

    pub fn points(&self) -> Vec<Vec3A> {
        self.position
            .as_deref()
            .map(triples)
            .unwrap_or_default()
    }

    /// One color per point. White when the color channel is absent or does not match the position channel.
    pub fn colors(&self) -> Vec<Vec3A> {
        let n = self.point_count();
        match self.color.as_deref() {
            Some(color) if color.len() / 3 == n => triples(color),
            Some(color) => {
                log::warn!(
                    "Ignoring color channel with {} values for {} points",
                    color.len(),
                    n
                );
                vec![Vec3A::ONE; n]
            }
            None => vec![Vec3A::ONE; n],
        }
    }
}

fn triples(values: &[f32]) -> Vec<Vec3A> {
    values
        .chunks_exact(3)
        .map(|c| Vec3A::new(c[0], c[1], c[2]))
        .collect()
}
