//! Streaming tile set coordination and point cloud reconstruction for a 3D scene editor.
//!
//! - [`tilestream_tiles`]: shares download queues between streamed tile sets, moves geographic datasets to the origin, and keeps a
//!   merged collision mesh of everything visible
//! - [`tilestream_cloud`]: turns colored point clouds into convex solids without stalling the host's frame loop
//!
//! Both run on the host's single UI thread and never block it for long. The host owns the scene; it is reached only
//! through [`SceneGraph`].

mod config;

pub use config::Config;

pub use tilestream_cloud;
pub use tilestream_core;
pub use tilestream_tiles;

pub use tilestream_cloud::{PointCloudReconstructor, ReconstructionConfig, ReconstructionJob};
pub use tilestream_core::scene::{Scene, SceneGraph, SceneNode};
pub use tilestream_tiles::{MergedMesh, TileSet, TilesConfig, TilesManager};
