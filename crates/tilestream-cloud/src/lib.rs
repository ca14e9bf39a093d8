//! Reconstruction of colored point clouds as convex solids.
//!
//! Points are partitioned by quantized color, decimated on a grid, split into spatially connected clusters, and each
//! cluster becomes the convex hull of its points. The expensive hull stage runs in frame-sized batches so that the host
//! stays responsive; see [`ReconstructionJob`].

mod buffer;
mod cluster;
mod color;
mod config;
mod downsample;
mod grid;
mod hull;
mod job;
mod reconstructor;

pub use buffer::*;
pub use cluster::*;
pub use color::*;
pub use config::*;
pub use downsample::*;
pub use grid::*;
pub use hull::*;
pub use job::*;
pub use reconstructor::*;
