//! Shared primitives for the tilestream crates.
//!
//! Everything here is single-threaded: the editor drives all work from its render loop, so shared
//! state is expressed with `Rc`, `RefCell` and `Cell` instead of locks.

pub mod clock;
pub mod events;
pub mod frame_budget;
pub mod geometry;
pub mod mesh;
pub mod registry;
pub mod scene;

use ahash::{AHashMap, AHashSet};
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;
pub type SmallKeyHashSet<K> = AHashSet<K>;

// Re-exports.
pub use approx;
pub use bytemuck;
pub use glam;
pub use static_assertions;
