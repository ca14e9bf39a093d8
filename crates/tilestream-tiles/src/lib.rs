//! Coordination of streamed hierarchical tile sets (e.g. 3D Tiles).
//!
//! # Shared Queues
//!
//! Every tile renderer schedules its downloads, parses and node processing through three [`PriorityQueue`]s. When many
//! tile sets are open at once they must compete for the same concurrency limits, so the [`TilesManager`] makes the first
//! tile set's queues the shared [`TileQueues`] for every tile set added after it.
//!
//! # Reset to Origin
//!
//! Geographic datasets sit on the surface of the earth, millions of units from the origin. A tile set flagged with
//! [`TileSet::reset_to_origin`] is rotated and translated once its root loads so that its bounding sphere is centered at
//! the origin with local "up" along +Y. See [`reorient_to_origin`].
//!
//! # Merged Mesh
//!
//! Collision and picking want one static mesh instead of thousands of streaming tiles. [`TilesManager::merge_mesh`] bakes
//! all visible tile meshes into a [`MergedMesh`] with a [`TriangleBvh`]. Tile loads change what is visible, so the merged
//! mesh is rebuilt after a short quiet period (see [`Debouncer`]), or immediately when a tile set is removed.

mod bvh;
mod config;
mod manager;
mod merge;
mod queue;
mod rebuild;
mod reorient;
mod tile_set;

pub use bvh::*;
pub use config::*;
pub use manager::*;
pub use merge::*;
pub use queue::*;
pub use rebuild::*;
pub use reorient::*;
pub use tile_set::*;
