use crate::TileQueues;

use tilestream_core::geometry::Sphere;
use tilestream_core::registry::RegistryId;
use tilestream_core::scene::SceneNode;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Identifies one tracked tile set instance.
///
/// Unique for the lifetime of the manager that issued it. The manager's slot may be reused after removal, but the serial
/// is not, so an id kept after [`TilesManager::remove_tile_set`](crate::TilesManager::remove_tile_set) never refers to a
/// tile set added later.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TileSetId {
    pub(crate) slot: RegistryId,
    pub(crate) serial: u64,
}

/// Events raised by a tile set renderer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TileSetEvent {
    /// The root tile set description finished loading; the bounding volume is known from here on.
    LoadTileSet,
    /// Every tile requested so far has finished loading.
    TilesLoadEnd,
    /// Content changed and the view should be redrawn.
    NeedsUpdate,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A streamed hierarchical level-of-detail dataset (e.g. 3D Tiles) rendered by the host's tile renderer.
///
/// The manager never fetches or parses anything itself. It only shares the renderer's queues, listens to its events,
/// adjusts its root transform, and reads the meshes currently visible under its group.
pub trait TileSet: 'static {
    /// The source URL. Several instances may share one.
    fn url(&self) -> &str;

    /// Whether the tile set should be moved from its geographic position to the world origin once it loads.
    fn reset_to_origin(&self) -> bool {
        false
    }

    /// Called once when a manager starts tracking the tile set. Jobs the renderer pushes to the shared queues should
    /// carry `id`, so the manager can drop them when this instance is removed.
    fn attach(&mut self, _id: TileSetId) {}

    fn queues(&self) -> TileQueues;

    /// Replaces (not merges) the renderer's queues.
    fn set_queues(&mut self, queues: TileQueues);

    /// Takes the next event raised since the last poll.
    fn poll_event(&mut self) -> Option<TileSetEvent>;

    /// `None` until the root tile set has loaded.
    fn bounding_sphere(&self) -> Option<Sphere>;

    /// The render root. Its transform is the tile set's root transform.
    fn group(&self) -> &SceneNode;

    fn group_mut(&mut self) -> &mut SceneNode;

    /// Per-frame, camera-driven level-of-detail update.
    fn update(&mut self);

    fn set_resolution(&mut self, viewport: Viewport);

    fn dispose(&mut self);
}

#[derive(Default)]
struct LoadState {
    loaded: Cell<Option<TileSetId>>,
    waker: RefCell<Option<Waker>>,
}

/// Resolves with the tile set's id on its first [`TileSetEvent::TilesLoadEnd`].
///
/// A tile set removed before it finishes loading never resolves its signal.
pub struct LoadSignal {
    state: Rc<LoadState>,
}

pub(crate) struct LoadResolver {
    state: Rc<LoadState>,
}

impl LoadSignal {
    pub(crate) fn new() -> (Self, LoadResolver) {
        let state = Rc::new(LoadState::default());
        (
            Self {
                state: state.clone(),
            },
            LoadResolver { state },
        )
    }

    pub fn is_loaded(&self) -> bool {
        self.state.loaded.get().is_some()
    }
}

impl LoadResolver {
    pub(crate) fn resolve(self, id: TileSetId) {
        self.state.loaded.set(Some(id));
        if let Some(waker) = self.state.waker.borrow_mut().take() {
            waker.wake();
        }
    }
}

impl Future for LoadSignal {
    type Output = TileSetId;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.state.loaded.get() {
            Some(id) => Poll::Ready(id),
            None => {
                *self.state.waker.borrow_mut() = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
