use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Width of a color bucket on the 0-255 scale, per channel.
    pub color_tolerance: f32,
    /// Points closer than this (strictly) belong to the same cluster.
    pub distance_threshold: f32,
    /// Smaller clusters are dropped.
    pub min_cluster_size: usize,
    /// Cell size of the decimation grid applied to each color group before clustering.
    pub downsample_resolution: f32,
    pub batch: BatchConfig,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            color_tolerance: 5.0,
            distance_threshold: 0.3,
            min_cluster_size: 10,
            downsample_resolution: 0.05,
            batch: BatchConfig::default(),
        }
    }
}

/// Sizing of the per-frame hull batches.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub min_tasks: u32,
    pub max_tasks: u32,
    /// Frame time granted to each task. A frame that took `n * time_per_task_ms` gets `n` tasks.
    pub time_per_task_ms: f32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_tasks: 1,
            max_tasks: 10,
            time_per_task_ms: 5.0,
        }
    }
}

impl BatchConfig {
    pub fn time_per_task(&self) -> Duration {
        Duration::from_secs_f32(self.time_per_task_ms.max(0.0) / 1000.0)
    }
}
