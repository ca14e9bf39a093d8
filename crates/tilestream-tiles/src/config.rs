use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TilesConfig {
    /// Quiet period after the last "tiles finished loading" event before the merged mesh is rebuilt.
    pub rebuild_debounce_ms: u64,
    /// Concurrency limits for the queues handed to tile sets created with [`TileQueues::with_config`].
    ///
    /// [`TileQueues::with_config`]: crate::TileQueues::with_config
    pub max_download_jobs: usize,
    pub max_parse_jobs: usize,
    pub max_process_jobs: usize,
    /// Triangles per BVH leaf of the merged mesh.
    pub bvh_max_leaf_triangles: usize,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            rebuild_debounce_ms: 50,
            max_download_jobs: 25,
            max_parse_jobs: 5,
            max_process_jobs: 25,
            bvh_max_leaf_triangles: 4,
        }
    }
}

impl TilesConfig {
    pub fn rebuild_debounce(&self) -> Duration {
        Duration::from_millis(self.rebuild_debounce_ms)
    }
}
