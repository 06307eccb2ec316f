//! Tick-boundary deferred destruction queue, grounded on spec §4.L
//! ("Destroy queue") and `original_source/include/voxen/gfx/vk/vk_device.hpp`'s
//! `enqueueDestroy`.
//!
//! Generic over the destroyed item type so the timeline bookkeeping (the
//! interesting, testable part) is decoupled from the actual `ash` destroy
//! calls, which [`super::device::Device`] supplies as a closure.

/// One pending destruction, tagged with the three per-queue timeline values
/// that were current when it was enqueued. It becomes safe to destroy once
/// every one of those values has been signaled complete.
struct Pending<T> {
    item: T,
    submitted_timelines: [u64; 3],
}

/// Queue index order matches [`super::device::Queue`]'s three logical queues.
#[derive(Default)]
pub struct DestroyQueue<T> {
    pending: Vec<Pending<T>>,
}

impl<T> DestroyQueue<T> {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    pub fn enqueue(&mut self, item: T, submitted_timelines: [u64; 3]) {
        self.pending.push(Pending { item, submitted_timelines });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Destroys every pending item whose recorded timelines have all
    /// completed, given the latest per-queue completed timeline values.
    pub fn process(&mut self, completed: [u64; 3], mut destroy: impl FnMut(T)) {
        let mut remaining = Vec::with_capacity(self.pending.len());
        for entry in self.pending.drain(..) {
            let ready = entry.submitted_timelines.iter().zip(completed.iter()).all(|(&submitted, &done)| submitted <= done);
            if ready {
                destroy(entry.item);
            } else {
                remaining.push(entry);
            }
        }
        self.pending = remaining;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_is_destroyed_only_once_all_three_timelines_complete() {
        let mut queue: DestroyQueue<u32> = DestroyQueue::new();
        queue.enqueue(1, [5, 2, 0]);

        let mut destroyed = Vec::new();
        queue.process([5, 1, 0], |item| destroyed.push(item));
        assert!(destroyed.is_empty(), "dma queue (index 1) hasn't reached 2 yet");

        queue.process([5, 2, 0], |item| destroyed.push(item));
        assert_eq!(destroyed, vec![1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn independent_items_complete_on_their_own_schedule() {
        let mut queue: DestroyQueue<&'static str> = DestroyQueue::new();
        queue.enqueue("early", [1, 1, 1]);
        queue.enqueue("late", [10, 10, 10]);

        let mut destroyed = Vec::new();
        queue.process([1, 1, 1], |item| destroyed.push(item));
        assert_eq!(destroyed, vec!["early"]);
        assert_eq!(queue.len(), 1);
    }
}
