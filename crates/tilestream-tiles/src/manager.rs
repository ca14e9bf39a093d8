use crate::{
    merge_visible_geometry, reset_tile_set_to_origin, Debouncer, LoadSignal, RayHit, TileQueues, TileSet, TileSetEvent,
    TileSetId, TilesConfig, TriangleBvh, Viewport,
};

use tilestream_core::clock::Clock;
use tilestream_core::events::{EventSource, ListenerControl, Subscription};
use tilestream_core::geometry::{Ray, Sphere};
use tilestream_core::mesh::IndexedMesh;
use tilestream_core::registry::Registry32;
use tilestream_core::scene::{NodeFlags, NodeId, NodeRole, SceneGraph, SceneNode};
use tilestream_core::SmallKeyHashMap;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

const MERGED_NODE_NAME: &str = "tiles-collision-proxy";

/// The union of every visible tile mesh, in world space, with a hierarchy for spatial queries.
///
/// A snapshot: once the manager rebuilds, it hands out a new `MergedMesh` with a higher generation and removes this one's
/// node from the scene.
pub struct MergedMesh {
    generation: u64,
    mesh: Rc<IndexedMesh>,
    bvh: TriangleBvh,
    node: NodeId,
}

impl MergedMesh {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mesh(&self) -> &IndexedMesh {
        &self.mesh
    }

    pub fn bvh(&self) -> &TriangleBvh {
        &self.bvh
    }

    /// The invisible collision proxy node in the scene.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        self.bvh.cast_ray(&self.mesh, ray)
    }

    /// Triangles whose bounds overlap `sphere`, in no particular order.
    pub fn sphere_overlaps(&self, sphere: &Sphere) -> Vec<u32> {
        let mut triangles = Vec::new();
        self.bvh.visit_sphere_overlaps(sphere, |t| triangles.push(t));
        triangles
    }
}

struct TrackedTileSet<T> {
    serial: u64,
    tile_set: T,
    events: EventSource<TileSetEvent, T>,
    /// Load signal, reset-to-origin and redraw listeners. Live until the tile set is removed.
    lifetime_subscriptions: Vec<Subscription>,
    /// Present iff the manager has a merged mesh.
    rebuild_subscription: Option<Subscription>,
}

impl<T: TileSet> TrackedTileSet<T> {
    /// Runs the listeners of every event the tile set raised since the last pump.
    fn pump_events(&mut self) {
        while let Some(event) = self.tile_set.poll_event() {
            self.events.dispatch(event, &mut self.tile_set);
        }
    }

    fn unsubscribe_rebuild(&mut self) {
        if let Some(subscription) = self.rebuild_subscription.take() {
            self.events.unsubscribe(subscription);
        }
    }

    fn unsubscribe_all(&mut self) {
        self.unsubscribe_rebuild();
        for subscription in self.lifetime_subscriptions.drain(..) {
            // One-shot listeners that already fired are stale.
            self.events.unsubscribe(subscription);
        }
        self.events.clear();
    }
}

/// Coordinates any number of streamed tile sets.
///
/// - every tile set shares one set of download/parse/process queues, donated by the first tile set ever added
/// - tile sets flagged for it are moved to the world origin once their root loads
/// - a merged collision mesh of all visible tile content is built on first request, then kept fresh: adding a tile set
///   or finishing a tile load schedules a debounced rebuild, removing one rebuilds immediately
///
/// Tile set events are pulled, never pushed. [`TilesManager::update`] pumps each tile set's events right after its own
/// update, so no listener runs while the manager is in the middle of a mutation.
pub struct TilesManager<T: TileSet> {
    config: TilesConfig,
    scene: Rc<RefCell<dyn SceneGraph>>,
    clock: Rc<dyn Clock>,

    tile_sets: Registry32<TrackedTileSet<T>>,
    next_serial: u64,
    urls: SmallKeyHashMap<String, Vec<TileSetId>>,
    queues: Option<TileQueues>,

    merged: Option<Rc<MergedMesh>>,
    next_generation: u64,
    rebuild: Rc<Debouncer>,

    needs_render: Rc<Cell<bool>>,
}

impl<T: TileSet> TilesManager<T> {
    pub fn new(config: TilesConfig, scene: Rc<RefCell<dyn SceneGraph>>, clock: Rc<dyn Clock>) -> Self {
        Self {
            rebuild: Rc::new(Debouncer::new(config.rebuild_debounce())),
            config,
            scene,
            clock,
            tile_sets: Registry32::new(),
            next_serial: 0,
            urls: SmallKeyHashMap::default(),
            queues: None,
            merged: None,
            next_generation: 0,
            needs_render: Rc::new(Cell::new(false)),
        }
    }

    pub fn config(&self) -> &TilesConfig {
        &self.config
    }

    /// Starts tracking `tile_set`. The returned signal resolves on the tile set's first [`TileSetEvent::TilesLoadEnd`].
    pub fn add_tile_set(&mut self, mut tile_set: T) -> (TileSetId, LoadSignal) {
        match self.queues.as_ref() {
            Some(shared) => tile_set.set_queues(shared.clone()),
            None => self.queues = Some(tile_set.queues()),
        }

        let url = tile_set.url().to_owned();
        let reset_to_origin = tile_set.reset_to_origin();
        let serial = self.next_serial;
        self.next_serial += 1;
        let slot = self.tile_sets.insert(TrackedTileSet {
            serial,
            tile_set,
            events: EventSource::new(),
            lifetime_subscriptions: Vec::new(),
            rebuild_subscription: None,
        });
        let id = TileSetId { slot, serial };
        self.urls.entry(url.clone()).or_default().push(id);
        self.tile_sets[slot].tile_set.attach(id);

        let (signal, resolver) = LoadSignal::new();
        let needs_render = self.needs_render.clone();
        let merged_exists = self.merged.is_some();
        let rebuild_trigger = self.rebuild_trigger();

        let tracked = &mut self.tile_sets[slot];
        let mut subscriptions = vec![
            tracked
                .events
                .subscribe_once(TileSetEvent::TilesLoadEnd, move |_| resolver.resolve(id)),
            tracked.events.subscribe(TileSetEvent::NeedsUpdate, move |_| {
                needs_render.set(true);
                ListenerControl::Keep
            }),
        ];
        if reset_to_origin {
            subscriptions.push(
                tracked
                    .events
                    .subscribe_once(TileSetEvent::LoadTileSet, |tile_set: &mut T| {
                        reset_tile_set_to_origin(tile_set);
                    }),
            );
        }
        tracked.lifetime_subscriptions = subscriptions;

        if merged_exists {
            tracked.rebuild_subscription = Some(
                tracked
                    .events
                    .subscribe(TileSetEvent::TilesLoadEnd, rebuild_trigger),
            );
            self.schedule_rebuild();
        }
        log::debug!("Added tile set {:?} from {}", id, url);

        (id, signal)
    }

    /// Stops tracking and disposes the tile set. Returns `false` if `id` is not tracked.
    pub fn remove_tile_set(&mut self, id: TileSetId) -> bool {
        if self.tracked(id).is_none() {
            return false;
        }
        let Some(mut tracked) = self.tile_sets.remove(id.slot) else {
            return false;
        };

        let url = tracked.tile_set.url();
        if let Some(bucket) = self.urls.get_mut(url) {
            bucket.retain(|&other| other != id);
            if bucket.is_empty() {
                self.urls.remove(url);
            }
        }
        tracked.unsubscribe_all();

        if self.merged.is_some() {
            self.rebuild.cancel();
            self.recompute_merged_mesh();
        }
        log::debug!("Removed tile set {:?} from {}", id, tracked.tile_set.url());

        tracked.tile_set.dispose();
        if let Some(queues) = self.queues.as_ref() {
            let num_dropped = queues.remove_jobs_of(id);
            if num_dropped > 0 {
                log::debug!("Dropped {} queued jobs of tile set {:?}", num_dropped, id);
            }
        }

        true
    }

    /// The merged mesh of all visible tile content, built now if absent. `None` when nothing is visible.
    pub fn merge_mesh(&mut self) -> Option<Rc<MergedMesh>> {
        if self.merged.is_none() {
            self.recompute_merged_mesh();
        } else {
            self.subscribe_all_rebuilds();
        }

        self.merged.clone()
    }

    /// The merged mesh, without building it.
    pub fn merged_mesh_if_built(&self) -> Option<&Rc<MergedMesh>> {
        self.merged.as_ref()
    }

    /// Requests a rebuild of the merged mesh once no further request arrives within the configured debounce period.
    pub fn schedule_rebuild(&self) {
        self.rebuild.schedule(self.clock.now());
    }

    pub fn is_rebuild_pending(&self) -> bool {
        self.rebuild.is_pending()
    }

    /// Runs the debounced rebuild if its deadline has passed. Returns `true` if the merged mesh was recomputed.
    pub fn poll_rebuild(&mut self) -> bool {
        if !self.rebuild.take_due(self.clock.now()) {
            return false;
        }
        self.recompute_merged_mesh();

        true
    }

    /// Rebuilds the merged mesh from scratch, replacing its collision proxy in the scene.
    pub fn recompute_merged_mesh(&mut self) {
        self.remove_merged_mesh();

        let Some(mesh) = merge_visible_geometry(self.tile_sets.iter().map(|(_, t)| &t.tile_set)) else {
            log::debug!("No visible tile meshes; merged mesh cleared");
            self.unsubscribe_all_rebuilds();
            return;
        };

        let bvh = TriangleBvh::build(&mesh, self.config.bvh_max_leaf_triangles);
        let mesh = Rc::new(mesh);
        let node = self.scene.borrow_mut().insert(
            SceneNode::mesh(MERGED_NODE_NAME, mesh.clone(), None)
                .with_visible(false)
                .with_flags(NodeFlags::synthetic(NodeRole::CollisionProxy)),
        );

        let generation = self.next_generation;
        self.next_generation += 1;
        log::debug!(
            "Rebuilt merged mesh #{}: {} triangles, {} BVH nodes",
            generation,
            mesh.triangle_count(),
            bvh.node_count()
        );
        self.merged = Some(Rc::new(MergedMesh {
            generation,
            mesh,
            bvh,
            node,
        }));

        self.subscribe_all_rebuilds();
    }

    /// Advances every tile set, runs the listeners of the events they raised, then runs a due rebuild.
    ///
    /// Returns `true` if any tile set asked for a redraw since the last call.
    pub fn update(&mut self) -> bool {
        for (_, tracked) in self.tile_sets.iter_mut() {
            tracked.tile_set.update();
            tracked.pump_events();
        }
        self.poll_rebuild();

        self.needs_render.replace(false)
    }

    /// Runs the listeners of pending tile set events without advancing the tile sets.
    pub fn pump_events(&mut self) {
        for (_, tracked) in self.tile_sets.iter_mut() {
            tracked.pump_events();
        }
    }

    pub fn resize(&mut self, viewport: Viewport) {
        for (_, tracked) in self.tile_sets.iter_mut() {
            tracked.tile_set.set_resolution(viewport);
        }
    }

    /// Tears everything down: pending rebuild, merged mesh, subscriptions, tile sets and shared queues. Calling it again
    /// does nothing.
    pub fn dispose(&mut self) {
        self.rebuild.cancel();
        self.remove_merged_mesh();

        let num_tile_sets = self.tile_sets.len();
        for mut tracked in self.tile_sets.drain() {
            tracked.unsubscribe_all();
            tracked.tile_set.dispose();
        }
        self.urls.clear();
        self.queues = None;
        self.needs_render.set(false);

        if num_tile_sets > 0 {
            log::debug!("Disposed {} tile sets", num_tile_sets);
        }
    }

    pub fn tile_set(&self, id: TileSetId) -> Option<&T> {
        self.tracked(id).map(|t| &t.tile_set)
    }

    pub fn tile_set_mut(&mut self, id: TileSetId) -> Option<&mut T> {
        self.tile_sets
            .get_mut(id.slot)
            .filter(|t| t.serial == id.serial)
            .map(|t| &mut t.tile_set)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileSetId, &T)> {
        self.tile_sets.iter().map(|(slot, t)| {
            (
                TileSetId {
                    slot,
                    serial: t.serial,
                },
                &t.tile_set,
            )
        })
    }

    /// Instances sharing `url`, in the order they were added.
    pub fn tile_sets_for_url(&self, url: &str) -> &[TileSetId] {
        self.urls.get(url).map_or(&[], |ids| ids.as_slice())
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.urls.keys().map(|url| url.as_str())
    }

    pub fn len(&self) -> usize {
        self.tile_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tile_sets.is_empty()
    }

    /// `None` until the first tile set is added, and again after [`TilesManager::dispose`].
    pub fn shared_queues(&self) -> Option<&TileQueues> {
        self.queues.as_ref()
    }

    /// Whether finishing a tile load in this tile set triggers a rebuild of the merged mesh.
    pub fn is_subscribed(&self, id: TileSetId) -> bool {
        self.tracked(id).map_or(false, |tracked| {
            tracked
                .rebuild_subscription
                .as_ref()
                .map_or(false, |s| tracked.events.is_subscribed(s))
        })
    }

    /// Casts `ray` at the merged mesh, building it first if needed.
    pub fn raycast(&mut self, ray: &Ray) -> Option<RayHit> {
        self.merge_mesh()?.raycast(ray)
    }

    /// Triangles of the merged mesh near `sphere`, building the mesh first if needed.
    pub fn sphere_overlaps(&mut self, sphere: &Sphere) -> Vec<u32> {
        self.merge_mesh()
            .map(|merged| merged.sphere_overlaps(sphere))
            .unwrap_or_default()
    }

    /// `None` if `id` was removed, even when its slot now holds another tile set.
    fn tracked(&self, id: TileSetId) -> Option<&TrackedTileSet<T>> {
        self.tile_sets.get(id.slot).filter(|t| t.serial == id.serial)
    }

    fn remove_merged_mesh(&mut self) {
        if let Some(merged) = self.merged.take() {
            self.scene.borrow_mut().remove(merged.node);
        }
    }

    fn rebuild_trigger(&self) -> impl FnMut(&mut T) -> ListenerControl + 'static {
        let rebuild = self.rebuild.clone();
        let clock = self.clock.clone();
        move |_| {
            rebuild.schedule(clock.now());
            ListenerControl::Keep
        }
    }

    fn subscribe_all_rebuilds(&mut self) {
        let mut num_subscribed = 0;
        for id in self.tile_sets.ids() {
            if self.tile_sets[id].rebuild_subscription.is_some() {
                continue;
            }
            let trigger = self.rebuild_trigger();
            let tracked = &mut self.tile_sets[id];
            tracked.rebuild_subscription = Some(tracked.events.subscribe(TileSetEvent::TilesLoadEnd, trigger));
            num_subscribed += 1;
        }
        if num_subscribed > 0 {
            log::debug!("Subscribed {} tile sets to merged mesh rebuilds", num_subscribed);
        }
    }

    fn unsubscribe_all_rebuilds(&mut self) {
        for (_, tracked) in self.tile_sets.iter_mut() {
            tracked.unsubscribe_rebuild();
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;
    use crate::TileJob;

    use tilestream_core::approx::assert_relative_eq;
    use tilestream_core::clock::ManualClock;
    use tilestream_core::geometry::Transform;
    use tilestream_core::glam::{Vec3, Vec3A};
    use tilestream_core::scene::Scene;

    use futures_lite::future;
    use std::collections::VecDeque;

    /// Stands in for a streaming tile renderer: events are raised by hand, content is one unit quad.
    struct MockTileSet {
        url: String,
        reset_to_origin: bool,
        queues: TileQueues,
        pending_events: VecDeque<TileSetEvent>,
        sphere: Option<Sphere>,
        group: SceneNode,
        num_updates: u32,
        viewport: Option<Viewport>,
        disposed: Rc<Cell<bool>>,
        id: Option<TileSetId>,
    }

    impl MockTileSet {
        /// A unit quad on the XZ plane, offset by `x` along the X axis.
        fn new(url: &str, x: f32) -> Self {
            let quad = IndexedMesh::new(
                vec![
                    [0.0, 0.0, 0.0],
                    [1.0, 0.0, 0.0],
                    [1.0, 0.0, 1.0],
                    [0.0, 0.0, 1.0],
                ],
                vec![[0, 2, 1], [0, 3, 2]],
            );
            let mut group = SceneNode::group(url)
                .with_transform(Transform::from_translation(Vec3::new(x, 0.0, 0.0)))
                .with_flags(NodeFlags::synthetic(NodeRole::TilesGroup));
            group.add_child(SceneNode::mesh("tile", Rc::new(quad), None));

            Self {
                url: url.to_owned(),
                reset_to_origin: false,
                queues: TileQueues::default(),
                pending_events: VecDeque::new(),
                sphere: None,
                group,
                num_updates: 0,
                viewport: None,
                disposed: Rc::new(Cell::new(false)),
                id: None,
            }
        }

        fn raise(&mut self, event: TileSetEvent) {
            self.pending_events.push_back(event);
        }

        fn request_tile(&self, tile: u64) {
            let tile_set = self.id.expect("attached");
            self.queues.download.borrow_mut().push(TileJob { tile_set, tile }, 0.0);
        }
    }

    impl TileSet for MockTileSet {
        fn url(&self) -> &str {
            &self.url
        }

        fn attach(&mut self, id: TileSetId) {
            self.id = Some(id);
        }

        fn reset_to_origin(&self) -> bool {
            self.reset_to_origin
        }

        fn queues(&self) -> TileQueues {
            self.queues.clone()
        }

        fn set_queues(&mut self, queues: TileQueues) {
            self.queues = queues;
        }

        fn poll_event(&mut self) -> Option<TileSetEvent> {
            self.pending_events.pop_front()
        }

        fn bounding_sphere(&self) -> Option<Sphere> {
            self.sphere
        }

        fn group(&self) -> &SceneNode {
            &self.group
        }

        fn group_mut(&mut self) -> &mut SceneNode {
            &mut self.group
        }

        fn update(&mut self) {
            self.num_updates += 1;
        }

        fn set_resolution(&mut self, viewport: Viewport) {
            self.viewport = Some(viewport);
        }

        fn dispose(&mut self) {
            self.disposed.set(true);
        }
    }

    struct Fixture {
        scene: Rc<RefCell<Scene>>,
        clock: ManualClock,
        manager: TilesManager<MockTileSet>,
    }

    impl Fixture {
        fn new() -> Self {
            let scene = Rc::new(RefCell::new(Scene::new()));
            let clock = ManualClock::new();
            let manager = TilesManager::new(TilesConfig::default(), scene.clone(), Rc::new(clock.clone()));

            Self { scene, clock, manager }
        }

        fn add(&mut self, url: &str, x: f32) -> TileSetId {
            self.manager.add_tile_set(MockTileSet::new(url, x)).0
        }

        fn raise(&mut self, id: TileSetId, event: TileSetEvent) {
            self.manager.tile_set_mut(id).unwrap().raise(event);
        }

        fn generation(&self) -> Option<u64> {
            self.manager.merged_mesh_if_built().map(|m| m.generation())
        }
    }

    #[test]
    fn removed_id_never_refers_to_a_later_tile_set() {
        let mut f = Fixture::new();
        let a = f.add("a", 0.0);
        assert!(f.manager.remove_tile_set(a));

        let second = MockTileSet::new("b", 2.0);
        let disposed = second.disposed.clone();
        let b = f.manager.add_tile_set(second).0;
        assert_ne!(a, b);

        assert!(!f.manager.remove_tile_set(a));
        assert!(f.manager.tile_set(a).is_none());
        assert!(f.manager.tile_set_mut(a).is_none());
        assert!(!f.manager.is_subscribed(a));

        assert!(!disposed.get());
        assert_eq!(f.manager.len(), 1);
        assert!(f.manager.tile_set(b).is_some());
        assert_eq!(f.manager.tile_sets_for_url("b"), &[b]);
        assert_eq!(f.manager.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn first_tile_set_donates_queues_to_all_later_ones() {
        let mut f = Fixture::new();
        let first = MockTileSet::new("a", 0.0);
        let donated = first.queues();
        let a = f.manager.add_tile_set(first).0;
        let b = f.add("b", 2.0);

        assert!(f.manager.tile_set(b).unwrap().queues().ptr_eq(&donated));

        f.manager.remove_tile_set(a);
        f.manager.remove_tile_set(b);
        assert!(f.manager.is_empty());

        // The queues outlive the registry becoming empty.
        let c = f.add("c", 4.0);
        assert!(f.manager.tile_set(c).unwrap().queues().ptr_eq(&donated));
        assert!(f.manager.shared_queues().unwrap().ptr_eq(&donated));
    }

    #[test]
    fn removal_drops_only_that_instances_queued_jobs() {
        let mut f = Fixture::new();
        let a = f.add("city.json", 0.0);
        let b = f.add("city.json", 2.0);
        for tile in 0..3 {
            f.manager.tile_set(a).unwrap().request_tile(tile);
            f.manager.tile_set(b).unwrap().request_tile(tile);
        }
        let queues = f.manager.shared_queues().unwrap().clone();
        assert_eq!(queues.queued_jobs(), 6);

        assert!(f.manager.remove_tile_set(a));

        assert_eq!(queues.queued_jobs(), 3);
        assert_eq!(queues.download.borrow().peek().map(|job| job.tile_set), Some(b));
    }

    #[test]
    fn instances_share_url_bucket_until_last_removed() {
        let mut f = Fixture::new();
        let a = f.add("city.json", 0.0);
        let b = f.add("city.json", 2.0);
        assert_eq!(f.manager.tile_sets_for_url("city.json"), &[a, b]);

        assert!(f.manager.remove_tile_set(a));
        assert_eq!(f.manager.tile_sets_for_url("city.json"), &[b]);

        assert!(f.manager.remove_tile_set(b));
        assert!(f.manager.tile_sets_for_url("city.json").is_empty());
        assert_eq!(f.manager.urls().count(), 0);
    }

    #[test]
    fn merged_mesh_is_cached_and_subscribes_every_tile_set() {
        let mut f = Fixture::new();
        let a = f.add("a", 0.0);
        let b = f.add("b", 2.0);
        assert!(!f.manager.is_subscribed(a));

        let first = f.manager.merge_mesh().unwrap();
        let second = f.manager.merge_mesh().unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.mesh().triangle_count(), 4);
        assert!(f.manager.is_subscribed(a));
        assert!(f.manager.is_subscribed(b));
    }

    #[test]
    fn merged_mesh_is_in_world_space() {
        let mut f = Fixture::new();
        f.add("a", 10.0);

        let merged = f.manager.merge_mesh().unwrap();
        let aabb = merged.mesh().aabb();

        assert_eq!(aabb.min, Vec3A::new(10.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vec3A::new(11.0, 0.0, 1.0));
    }

    #[test]
    fn collision_proxy_is_an_invisible_synthetic_node() {
        let mut f = Fixture::new();
        f.add("a", 0.0);
        let merged = f.manager.merge_mesh().unwrap();

        let scene = f.scene.borrow();
        let node = scene.get(merged.node()).unwrap();
        assert!(!node.visible);
        assert_eq!(node.flags.role, NodeRole::CollisionProxy);
        assert!(node.flags.is_ignored());
        assert_eq!(scene.listed().count(), 0);
    }

    #[test]
    fn removal_rebuilds_immediately() {
        let mut f = Fixture::new();
        let a = f.add("a", 0.0);
        let b = f.add("b", 2.0);
        let first = f.manager.merge_mesh().unwrap();

        f.manager.schedule_rebuild();
        assert!(f.manager.remove_tile_set(a));

        let second = f.manager.merged_mesh_if_built().unwrap().clone();
        assert_ne!(first.generation(), second.generation());
        assert_eq!(second.mesh().triangle_count(), 2);
        assert!(!f.manager.is_rebuild_pending());
        // Only the current proxy remains in the scene.
        assert_eq!(f.scene.borrow().len(), 1);

        assert!(f.manager.remove_tile_set(b));
        assert!(f.manager.merged_mesh_if_built().is_none());
        assert!(f.scene.borrow().is_empty());
    }

    #[test]
    fn burst_of_load_ends_rebuilds_once() {
        let mut f = Fixture::new();
        let a = f.add("a", 0.0);
        f.manager.merge_mesh();
        let start = f.generation().unwrap();

        for _ in 0..5 {
            f.raise(a, TileSetEvent::TilesLoadEnd);
            f.manager.update();
            f.clock.advance_ms(10);
        }
        // Last request at 40 ms, now at 50 ms.
        assert_eq!(f.generation(), Some(start));
        assert!(f.manager.is_rebuild_pending());

        f.clock.advance_ms(39);
        f.manager.update();
        assert_eq!(f.generation(), Some(start));

        f.clock.advance_ms(1);
        f.manager.update();
        assert_eq!(f.generation(), Some(start + 1));

        f.clock.advance_ms(1000);
        f.manager.update();
        assert_eq!(f.generation(), Some(start + 1));
    }

    #[test]
    fn adding_to_a_merged_manager_schedules_rebuild() {
        let mut f = Fixture::new();
        f.add("a", 0.0);
        f.manager.merge_mesh();

        let c = f.add("c", 4.0);
        assert!(f.manager.is_subscribed(c));
        assert!(f.manager.is_rebuild_pending());

        f.clock.advance_ms(50);
        assert!(f.manager.poll_rebuild());
        assert_eq!(f.manager.merged_mesh_if_built().unwrap().mesh().triangle_count(), 4);
    }

    #[test]
    fn nothing_visible_means_no_merged_mesh_and_no_subscriptions() {
        let mut f = Fixture::new();
        let mut hidden = MockTileSet::new("a", 0.0);
        hidden.group.children[0].visible = false;
        let a = f.manager.add_tile_set(hidden).0;

        assert!(f.manager.merge_mesh().is_none());
        assert!(!f.manager.is_subscribed(a));
        assert!(f.scene.borrow().is_empty());
    }

    #[test]
    fn load_signal_resolves_on_first_load_end() {
        let mut f = Fixture::new();
        let (id, mut signal) = f.manager.add_tile_set(MockTileSet::new("a", 0.0));

        assert_eq!(future::block_on(future::poll_once(&mut signal)), None);

        f.raise(id, TileSetEvent::TilesLoadEnd);
        f.manager.update();

        assert!(signal.is_loaded());
        assert_eq!(future::block_on(future::poll_once(&mut signal)), Some(id));
    }

    #[test]
    fn reset_to_origin_happens_once_on_load() {
        let mut f = Fixture::new();
        let mut tile_set = MockTileSet::new("geo", 0.0);
        tile_set.reset_to_origin = true;
        tile_set.sphere = Some(Sphere::new(Vec3A::new(100.0, 0.0, 0.0), 1.0));
        let id = f.manager.add_tile_set(tile_set).0;

        f.raise(id, TileSetEvent::LoadTileSet);
        f.manager.update();

        let root = f.manager.tile_set(id).unwrap().group.transform;
        assert_relative_eq!(root.translation.y, -100.0, epsilon = 1e-4);
        let moved = root.to_affine().transform_point3(Vec3::new(100.0, 0.0, 0.0));
        assert_relative_eq!(moved.length(), 0.0, epsilon = 1e-3);

        let tile_set = f.manager.tile_set_mut(id).unwrap();
        tile_set.group.transform = Transform::IDENTITY;
        tile_set.raise(TileSetEvent::LoadTileSet);
        f.manager.update();
        assert_eq!(f.manager.tile_set(id).unwrap().group.transform, Transform::IDENTITY);
    }

    #[test]
    fn needs_render_is_latched_until_update() {
        let mut f = Fixture::new();
        let a = f.add("a", 0.0);
        assert!(!f.manager.update());

        f.raise(a, TileSetEvent::NeedsUpdate);
        assert!(f.manager.update());
        assert!(!f.manager.update());
        assert_eq!(f.manager.tile_set(a).unwrap().num_updates, 3);
    }

    #[test]
    fn resize_reaches_every_tile_set() {
        let mut f = Fixture::new();
        let a = f.add("a", 0.0);
        let b = f.add("b", 2.0);

        let viewport = Viewport {
            width: 1920,
            height: 1080,
        };
        f.manager.resize(viewport);

        assert_eq!(f.manager.tile_set(a).unwrap().viewport, Some(viewport));
        assert_eq!(f.manager.tile_set(b).unwrap().viewport, Some(viewport));
    }

    #[test]
    fn raycast_hits_merged_content() {
        let mut f = Fixture::new();
        f.add("a", 10.0);

        let ray = Ray::new(Vec3A::new(10.5, 5.0, 0.3), Vec3A::new(0.0, -1.0, 0.0));
        let hit = f.manager.raycast(&ray).unwrap();
        assert_relative_eq!(hit.distance, 5.0, epsilon = 1e-5);

        let miss = Ray::new(Vec3A::new(0.5, 5.0, 0.3), Vec3A::new(0.0, -1.0, 0.0));
        assert!(f.manager.raycast(&miss).is_none());

        let near = f.manager.sphere_overlaps(&Sphere::new(Vec3A::new(10.5, 0.1, 0.5), 0.5));
        assert_eq!(near.len(), 2);
    }

    #[test]
    fn dispose_is_safe_to_repeat() {
        let mut f = Fixture::new();
        let first = MockTileSet::new("a", 0.0);
        let disposed = first.disposed.clone();
        let a = f.manager.add_tile_set(first).0;
        f.add("b", 2.0);
        f.manager.merge_mesh();
        f.manager.schedule_rebuild();

        assert!(f.manager.remove_tile_set(a));
        assert!(!f.manager.remove_tile_set(a));
        assert!(disposed.get());

        f.manager.dispose();
        f.manager.dispose();

        assert!(f.manager.is_empty());
        assert!(f.manager.merged_mesh_if_built().is_none());
        assert!(!f.manager.is_rebuild_pending());
        assert!(f.manager.shared_queues().is_none());
        assert!(f.scene.borrow().is_empty());

        f.clock.advance_ms(1000);
        assert!(!f.manager.poll_rebuild());
    }
}
