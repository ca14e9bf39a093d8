use crate::{TileSetId, TilesConfig};

use float_ord::FloatOrd;
use std::cell::RefCell;
use std::collections::BinaryHeap;
use std::rc::Rc;

/// A tile waiting in one of the streaming queues.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TileJob {
    /// The instance that requested the job, as told by [`TileSet::attach`](crate::TileSet::attach).
    pub tile_set: TileSetId,
    /// Renderer-specific tile identifier.
    pub tile: u64,
}

/// A priority queue with FIFO ordering among equal priorities and a limit on concurrently running jobs.
///
/// Higher priority values are popped first.
pub struct PriorityQueue<J> {
    heap: BinaryHeap<QueueEntry<J>>,
    next_seq: u64,
    max_jobs: usize,
    active_jobs: usize,
}

impl<J> PriorityQueue<J> {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            max_jobs: max_jobs.max(1),
            active_jobs: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    pub fn set_max_jobs(&mut self, max_jobs: usize) {
        self.max_jobs = max_jobs.max(1);
    }

    pub fn active_jobs(&self) -> usize {
        self.active_jobs
    }

    pub fn push(&mut self, job: J, priority: f32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueEntry {
            priority: FloatOrd(priority),
            seq,
            job,
        });
    }

    pub fn peek(&self) -> Option<&J> {
        self.heap.peek().map(|e| &e.job)
    }

    /// Pops the next job regardless of the concurrency limit.
    pub fn pop(&mut self) -> Option<J> {
        self.heap.pop().map(|e| e.job)
    }

    /// Pops the next job if fewer than `max_jobs` are running, and counts it as running. Call [`Self::complete`] when it
    /// finishes.
    pub fn try_start(&mut self) -> Option<J> {
        if self.active_jobs >= self.max_jobs {
            return None;
        }
        let job = self.pop()?;
        self.active_jobs += 1;
        Some(job)
    }

    pub fn complete(&mut self) {
        self.active_jobs = self.active_jobs.saturating_sub(1);
    }

    /// Removes every queued job matching `pred`. Returns how many were removed.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&J) -> bool) -> usize {
        let before = self.heap.len();
        self.heap.retain(|e| !pred(&e.job));
        before - self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

struct QueueEntry<J> {
    priority: FloatOrd<f32>,
    seq: u64,
    job: J,
}

impl<J> PartialEq for QueueEntry<J> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl<J> Eq for QueueEntry<J> {}

impl<J> PartialOrd for QueueEntry<J> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<J> Ord for QueueEntry<J> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap on priority, then earliest insertion first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub type SharedQueue<J> = Rc<RefCell<PriorityQueue<J>>>;

/// The download, parse and process-node queues of a tile set. Cloning shares the same queue instances.
#[derive(Clone)]
pub struct TileQueues {
    pub download: SharedQueue<TileJob>,
    pub parse: SharedQueue<TileJob>,
    pub process_node: SharedQueue<TileJob>,
}

impl TileQueues {
    pub fn with_config(config: &TilesConfig) -> Self {
        Self {
            download: Rc::new(RefCell::new(PriorityQueue::new(config.max_download_jobs))),
            parse: Rc::new(RefCell::new(PriorityQueue::new(config.max_parse_jobs))),
            process_node: Rc::new(RefCell::new(PriorityQueue::new(config.max_process_jobs))),
        }
    }

    /// True iff all three queues are the very same instances.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.download, &other.download)
            && Rc::ptr_eq(&self.parse, &other.parse)
            && Rc::ptr_eq(&self.process_node, &other.process_node)
    }

    pub fn queued_jobs(&self) -> usize {
        self.download.borrow().len() + self.parse.borrow().len() + self.process_node.borrow().len()
    }

    /// Drops every queued job of `tile_set` from all three queues. Jobs of other instances, including ones loading the
    /// same URL, stay queued. Returns how many were removed.
    pub fn remove_jobs_of(&self, tile_set: TileSetId) -> usize {
        [&self.download, &self.parse, &self.process_node]
            .into_iter()
            .map(|queue| queue.borrow_mut().remove_where(|job| job.tile_set == tile_set))
            .sum()
    }
}

impl Default for TileQueues {
    fn default() -> Self {
        Self::with_config(&TilesConfig::default())
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

    use tilestream_core::registry::Registry32;

    fn tile_set_ids(n: usize) -> Vec<TileSetId> {
        let mut slots = Registry32::new();
        (0..n)
            .map(|i| TileSetId {
                slot: slots.insert(()),
                serial: i as u64,
            })
            .collect()
    }

    #[test]
    fn pops_by_priority_then_fifo() {
        let mut queue = PriorityQueue::new(4);
        queue.push("low", 1.0);
        queue.push("high-first", 5.0);
        queue.push("mid", 3.0);
        queue.push("high-second", 5.0);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(order, vec!["high-first", "high-second", "mid", "low"]);
    }

    #[test]
    fn try_start_respects_job_limit() {
        let mut queue = PriorityQueue::new(2);
        for i in 0..4 {
            queue.push(i, 0.0);
        }

        assert_eq!(queue.try_start(), Some(0));
        assert_eq!(queue.try_start(), Some(1));
        assert_eq!(queue.try_start(), None);

        queue.complete();
        assert_eq!(queue.try_start(), Some(2));
        assert_eq!(queue.active_jobs(), 2);
    }

    #[test]
    fn remove_where_drops_matching_jobs() {
        let mut queue = PriorityQueue::new(1);
        for i in 0..6 {
            queue.push(i, i as f32);
        }

        assert_eq!(queue.remove_where(|j| j % 2 == 0), 3);
        let rest: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(rest, vec![5, 3, 1]);
    }

    #[test]
    fn cloned_queues_are_shared() {
        let queues = TileQueues::default();
        let clone = queues.clone();
        clone.download.borrow_mut().push(
            TileJob {
                tile_set: tile_set_ids(1)[0],
                tile: 7,
            },
            1.0,
        );

        assert!(queues.ptr_eq(&clone));
        assert!(!queues.ptr_eq(&TileQueues::default()));
        assert_eq!(queues.queued_jobs(), 1);
    }

    #[test]
    fn remove_jobs_of_keeps_other_instances() {
        let ids = tile_set_ids(2);
        let queues = TileQueues::default();
        for tile in 0..3 {
            for &tile_set in &ids {
                queues.download.borrow_mut().push(TileJob { tile_set, tile }, 1.0);
            }
        }
        queues.parse.borrow_mut().push(TileJob { tile_set: ids[0], tile: 9 }, 1.0);

        assert_eq!(queues.remove_jobs_of(ids[0]), 4);
        assert_eq!(queues.queued_jobs(), 3);
        assert!(std::iter::from_fn(|| queues.download.borrow_mut().pop()).all(|job| job.tile_set == ids[1]));
    }
}
