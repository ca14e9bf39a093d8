use std::convert::TryInto;
use std::time::Duration;

/// Decides how many work items fit into one frame.
///
/// The batch size scales with the wall-clock time that elapsed since the previous frame: a host that is running smoothly
/// gets small batches, a host that is already stalling gets larger ones so the job still finishes in bounded time. The
/// result is always clamped to `[min_items, max_items]`.
pub struct FrameBudget {
    item_time_estimate_us: u32,
    min_items: u32,
    max_items: u32,
    /// Time spent and items completed since the last [`FrameBudget::reset_timer`], if it was ever called.
    batch: Option<(Duration, u32)>,
}

impl FrameBudget {
    pub fn new(item_time_estimate: Duration, min_items: u32, max_items: u32) -> Self {
        let min_items = min_items.max(1);
        Self {
            item_time_estimate_us: (item_time_estimate.as_micros() as u32).max(1),
            min_items,
            max_items: max_items.max(min_items),
            batch: None,
        }
    }

    pub fn items_for_frame(&self, frame_elapsed: Duration) -> u32 {
        let elapsed_us = frame_elapsed.as_micros() as f64;
        let items = (elapsed_us / self.item_time_estimate_us as f64).round();

        (items as u32).clamp(self.min_items, self.max_items)
    }

    pub fn reset_timer(&mut self) {
        self.batch = Some((Duration::ZERO, 0));
    }

    /// Records the time spent on one item. Does nothing until [`Self::reset_timer`] has been called.
    pub fn complete_item(&mut self, item_time: Duration) {
        if let Some((total, items)) = self.batch.as_mut() {
            *total += item_time;
            *items += 1;
        }
    }

    /// The average item time measured since the last timer reset, if any item completed.
    pub fn measured_item_time_us(&self) -> Option<u32> {
        let (total, items) = self.batch.filter(|&(_, items)| items > 0)?;
        let total_us: u32 = total.as_micros().try_into().unwrap_or(u32::MAX);

        Some(total_us / items)
    }
}
