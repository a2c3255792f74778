use crate::train::{Direction, Train};
use std::collections::VecDeque;

/// The four directional wait queues. Trains are FIFO within a
/// direction; a train lives in exactly one queue from enqueue until
/// the scheduler removes it. All access goes through the shared lock
/// in `state`, so the scheduler always sees a consistent snapshot of
/// all four sizes.
#[derive(Debug, Default)]
pub struct QueueStore {
    queues: [VecDeque<Train>; 4],
}

impl QueueStore {
    pub fn new() -> QueueStore {
        QueueStore::default()
    }

    pub fn enqueue(&mut self, direction: Direction, train: Train) {
        self.queues[direction.index()].push_back(train);
    }

    pub fn dequeue(&mut self, direction: Direction) -> Option<Train> {
        self.queues[direction.index()].pop_front()
    }

    pub fn size(&self, direction: Direction) -> usize {
        self.queues[direction.index()].len()
    }

    pub fn total_size(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Ids of every waiting train across all queues, ascending.
    pub fn waiting_ids(&self) -> Vec<u64> {
        let mut ids = self
            .queues
            .iter()
            .flat_map(|q| q.iter().map(|t| t.id))
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Selection policy: the direction with the strictly largest queue
    /// wins; ties go to the earliest direction in precedence order
    /// (A, then B, then E, then F). None when every queue is empty.
    pub fn select(&self) -> Option<Direction> {
        let mut best: Option<(Direction, usize)> = None;
        for &direction in Direction::ALL.iter() {
            let size = self.size(direction);
            if size > best.map_or(0, |(_, max)| max) {
                best = Some((direction, size));
            }
        }
        best.map(|(direction, _)| direction)
    }
}
