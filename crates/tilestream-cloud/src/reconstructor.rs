use crate::{cluster_points, ColorGroups, ColorKey, GeometryBuffer, ReconstructionConfig, ReconstructionJob};

use std::rc::Rc;
use tilestream_core::clock::Clock;
use tilestream_core::glam::Vec3A;
use tilestream_core::scene::SceneNode;

/// `on_progress(percent, message)`, with `percent` in `[0, 100]`.
pub type ProgressCallback = Box<dyn FnMut(f32, &str)>;

/// Progress is reported after every this many points while grouping by color.
pub const GROUPING_PROGRESS_INTERVAL: usize = 100;

/// Rebuilds a colored point cloud as a set of convex solids, one per spatially connected cluster of similarly colored
/// points.
///
/// ```text
/// process_geometry ─► group_by_semantic_color ─► per group: downsample_points ─► spatial_clustering ─► convex hulls
/// ```
///
/// [`PointCloudReconstructor::reconstruct`] runs the whole pipeline as a [`ReconstructionJob`] that the host advances one
/// frame at a time.
#[derive(Default)]
pub struct PointCloudReconstructor {
    pub config: ReconstructionConfig,
    points: Vec<Vec3A>,
    colors: Vec<Vec3A>,
    groups: ColorGroups,
    on_progress: Option<ProgressCallback>,
}

impl PointCloudReconstructor {
    pub fn new(config: ReconstructionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Copies the points and colors out of `buffer`. A buffer without positions leaves the reconstructor empty.
    pub fn process_geometry(&mut self, buffer: &GeometryBuffer) {
        self.groups.clear();
        if buffer.position.is_none() {
            log::warn!("Geometry has no position attribute; nothing to reconstruct");
            self.points.clear();
            self.colors.clear();
            return;
        }
        self.points = buffer.points();
        self.colors = buffer.colors();
        log::debug!("Loaded {} points", self.points.len());
    }

    pub fn points(&self) -> &[Vec3A] {
        &self.points
    }

    pub fn colors(&self) -> &[Vec3A] {
        &self.colors
    }

    pub fn groups(&self) -> &ColorGroups {
        &self.groups
    }

    pub fn set_progress_callback(&mut self, on_progress: impl FnMut(f32, &str) + 'static) {
        self.on_progress = Some(Box::new(on_progress));
    }

    /// Partitions the points by [`ColorKey`], reporting progress within 0-20%.
    pub fn group_by_semantic_color(&mut self) -> &ColorGroups {
        self.group_colors(0.0, 20.0);
        &self.groups
    }

    pub(crate) fn group_colors(&mut self, from_percent: f32, to_percent: f32) {
        self.groups.clear();
        let tolerance = self.config.color_tolerance;
        let n = self.points.len();
        for (i, (&p, &c)) in self.points.iter().zip(self.colors.iter()).enumerate() {
            if i % GROUPING_PROGRESS_INTERVAL == 0 {
                let percent = lerp(from_percent, to_percent, i as f32 / n as f32);
                report(&mut self.on_progress, percent, "Grouping points by color");
            }
            self.groups.insert(ColorKey::quantize(c, tolerance), p);
        }
        log::debug!("Grouped {} points into {} colors", n, self.groups.len());
        self.report_progress(to_percent, "Grouped points by color");
    }

    /// Clusters one color group's points, reporting progress within 20-50% every
    /// [`CLUSTER_PROGRESS_INTERVAL`](crate::CLUSTER_PROGRESS_INTERVAL) seed points.
    pub fn spatial_clustering(&mut self, points: &[Vec3A]) -> Vec<Vec<Vec3A>> {
        let ReconstructionConfig {
            distance_threshold,
            min_cluster_size,
            ..
        } = self.config;
        let on_progress = &mut self.on_progress;

        cluster_points(points, distance_threshold, min_cluster_size, |processed, total| {
            let percent = lerp(20.0, 50.0, processed as f32 / total as f32);
            report(on_progress, percent, "Clustering points");
        })
    }

    /// Starts the full pipeline. Nothing happens until the returned job is ticked.
    ///
    /// `on_progress` replaces the current progress callback. `on_complete(group, count)` is called exactly once, after
    /// progress reached 100, with a group holding the `count` reconstructed solids. It is not called if the job is
    /// cancelled.
    pub fn reconstruct<'a>(
        &'a mut self,
        on_progress: impl FnMut(f32, &str) + 'static,
        on_complete: impl FnOnce(SceneNode, usize) + 'a,
        clock: Rc<dyn Clock>,
    ) -> ReconstructionJob<'a> {
        self.set_progress_callback(on_progress);

        ReconstructionJob::new(self, Box::new(on_complete), clock)
    }

    /// Drops the points, colors, groups and progress callback. Meshes already handed out are unaffected.
    pub fn dispose(&mut self) {
        self.points = Vec::new();
        self.colors = Vec::new();
        self.groups = ColorGroups::new();
        self.on_progress = None;
    }

    pub(crate) fn report_progress(&mut self, percent: f32, message: &str) {
        report(&mut self.on_progress, percent, message);
    }
}

fn report(on_progress: &mut Option<ProgressCallback>, percent: f32, message: &str) {
    if let Some(on_progress) = on_progress.as_mut() {
        on_progress(percent, message);
    }
}

pub(crate) fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}
