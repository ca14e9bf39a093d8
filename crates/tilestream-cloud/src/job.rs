use crate::reconstructor::lerp;
use crate::{cluster_points, convex_hull_mesh, downsample_points, ColorKey, PointCloudReconstructor};

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tilestream_core::clock::Clock;
use tilestream_core::frame_budget::FrameBudget;
use tilestream_core::glam::Vec3A;
use tilestream_core::mesh::Material;
use tilestream_core::scene::{NodeFlags, NodeRole, SceneNode};

/// Requests that a [`ReconstructionJob`] stop at its next tick. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobStatus {
    Pending,
    Complete,
    Cancelled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Stage {
    Grouping,
    Clustering { group: usize },
    Batching,
    Complete,
    Cancelled,
}

/// One cluster waiting to become a convex solid.
struct ReconstructionTask {
    key: ColorKey,
    points: Vec<Vec3A>,
}

/// A reconstruction in progress. Each [`ReconstructionJob::tick`] does one frame's worth of work:
///
/// - grouping all points by color (0-10%)
/// - downsampling and clustering one color group (10-50%, split evenly between groups)
/// - building one batch of convex hulls (50-100%)
///
/// The hull batch grows with the time elapsed since the previous tick, so a host that is already falling behind spends
/// more of each frame catching up.
///
/// A cluster whose hull fails, including one whose hull computation panics, is logged and skipped.
pub struct ReconstructionJob<'a> {
    reconstructor: &'a mut PointCloudReconstructor,
    on_complete: Option<Box<dyn FnOnce(SceneNode, usize) + 'a>>,
    clock: Rc<dyn Clock>,
    cancel: CancellationToken,

    stage: Stage,
    tasks: Vec<ReconstructionTask>,
    num_clusters: usize,
    next_task: usize,
    budget: FrameBudget,
    last_tick: Option<Duration>,

    group: SceneNode,
    num_reconstructed: usize,
}

impl<'a> ReconstructionJob<'a> {
    pub(crate) fn new(
        reconstructor: &'a mut PointCloudReconstructor,
        on_complete: Box<dyn FnOnce(SceneNode, usize) + 'a>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let batch = reconstructor.config.batch;
        Self {
            reconstructor,
            on_complete: Some(on_complete),
            clock,
            cancel: CancellationToken::new(),
            stage: Stage::Grouping,
            tasks: Vec::new(),
            num_clusters: 0,
            next_task: 0,
            budget: FrameBudget::new(batch.time_per_task(), batch.min_tasks, batch.max_tasks),
            last_tick: None,
            group: SceneNode::group("reconstruction").with_flags(NodeFlags {
                role: NodeRole::ReconstructionGroup,
                ..NodeFlags::content()
            }),
            num_reconstructed: 0,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn status(&self) -> JobStatus {
        match self.stage {
            Stage::Complete => JobStatus::Complete,
            Stage::Cancelled => JobStatus::Cancelled,
            _ => JobStatus::Pending,
        }
    }

    /// Clusters found so far. Final once the job reaches the hull stage.
    pub fn num_tasks(&self) -> usize {
        self.num_clusters
    }

    pub fn num_reconstructed(&self) -> usize {
        self.num_reconstructed
    }

    /// Does one frame of work. Ticking a finished job does nothing.
    pub fn tick(&mut self) -> JobStatus {
        if self.status() != JobStatus::Pending {
            return self.status();
        }
        if self.cancel.is_cancelled() {
            self.discard();
            return JobStatus::Cancelled;
        }

        let now = self.clock.now();
        let frame_elapsed = self
            .last_tick
            .replace(now)
            .map_or(Duration::ZERO, |last| now.saturating_sub(last));

        match self.stage {
            Stage::Grouping => {
                self.reconstructor.group_colors(0.0, 10.0);
                self.stage = if self.reconstructor.groups().is_empty() {
                    Stage::Batching
                } else {
                    Stage::Clustering { group: 0 }
                };
            }
            Stage::Clustering { group } => self.cluster_group(group),
            Stage::Batching => self.build_batch(frame_elapsed),
            Stage::Complete | Stage::Cancelled => {}
        }

        self.status()
    }

    /// Ticks until the job completes or is cancelled.
    pub fn run_to_completion(&mut self) -> JobStatus {
        loop {
            let status = self.tick();
            if status != JobStatus::Pending {
                return status;
            }
        }
    }

    fn cluster_group(&mut self, group: usize) {
        let reconstructor = &mut *self.reconstructor;
        let config = reconstructor.config;
        let num_groups = reconstructor.groups().len();

        if let Some(color_group) = reconstructor.groups().as_slice().get(group) {
            let key = color_group.key;
            let sampled = downsample_points(&color_group.points, config.downsample_resolution);
            let clusters = cluster_points(
                &sampled,
                config.distance_threshold,
                config.min_cluster_size,
                |_, _| {},
            );
            log::debug!(
                "Color group {:?}: {} points, {} after downsampling, {} clusters",
                key.buckets(),
                color_group.points.len(),
                sampled.len(),
                clusters.len()
            );
            self.num_clusters += clusters.len();
            self.tasks
                .extend(clusters.into_iter().map(|points| ReconstructionTask { key, points }));
        }

        let percent = lerp(10.0, 50.0, (group + 1) as f32 / num_groups as f32);
        reconstructor.report_progress(percent, "Clustering color groups");

        self.stage = if group + 1 < num_groups {
            Stage::Clustering { group: group + 1 }
        } else {
            Stage::Batching
        };
    }

    fn build_batch(&mut self, frame_elapsed: Duration) {
        let batch_size = self.budget.items_for_frame(frame_elapsed) as usize;
        let end = (self.next_task + batch_size).min(self.tasks.len());
        let tolerance = self.reconstructor.config.color_tolerance;

        self.budget.reset_timer();
        for task in &self.tasks[self.next_task..end] {
            let start = self.clock.now();
            match convex_hull_mesh(&task.points) {
                Ok(mesh) => {
                    self.num_reconstructed += 1;
                    self.group.add_child(SceneNode::mesh(
                        format!("reconstructed-{}", self.num_reconstructed),
                        Rc::new(mesh),
                        Some(Material::flat_standard(task.key.to_color(tolerance))),
                    ));
                }
                Err(e) => log::warn!("Skipping cluster of {} points: {}", task.points.len(), e),
            }
            self.budget.complete_item(self.clock.now().saturating_sub(start));
        }
        log::debug!(
            "Built {} hulls in {:?} (avg {:?} us)",
            end - self.next_task,
            frame_elapsed,
            self.budget.measured_item_time_us()
        );
        self.next_task = end;

        if self.next_task < self.tasks.len() {
            let percent = lerp(50.0, 100.0, self.next_task as f32 / self.tasks.len() as f32);
            self.reconstructor
                .report_progress(percent, "Reconstructing objects");
        } else {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.reconstructor
            .report_progress(100.0, "Reconstruction complete");
        log::debug!("Reconstructed {} of {} clusters", self.num_reconstructed, self.num_clusters);

        self.stage = Stage::Complete;
        self.tasks = Vec::new();
        let group = std::mem::take(&mut self.group);
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(group, self.num_reconstructed);
        }
    }

    fn discard(&mut self) {
        log::debug!(
            "Reconstruction cancelled after {} of {} clusters",
            self.next_task,
            self.tasks.len()
        );
        self.stage = Stage::Cancelled;
        self.tasks = Vec::new();
        self.group = SceneNode::default();
        self.on_complete = None;
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
