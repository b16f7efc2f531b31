//! Priority queues for HNSW search, with total ordering over f32 distances.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A graph node handle paired with its distance to the current query.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub distance: f32,
    pub handle: usize,
}

impl Candidate {
    pub fn new(handle: usize, distance: f32) -> Self {
        Self { distance, handle }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Larger distance compares greater; equal distances fall back to the older
// (smaller) handle being "closer".
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.handle.cmp(&other.handle))
    }
}

/// Max-heap of candidates (furthest on top). Used as the result set bounded by ef.
#[derive(Default)]
pub struct MaxHeap {
    heap: BinaryHeap<Candidate>,
}

impl MaxHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push, then drop the furthest entry if the heap exceeds `limit`.
    pub fn push_bounded(&mut self, c: Candidate, limit: usize) {
        self.heap.push(c);
        if self.heap.len() > limit {
            self.heap.pop();
        }
    }

    pub fn furthest(&self) -> Option<&Candidate> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into a Vec sorted closest first.
    pub fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

/// Min-heap of candidates (closest on top). Used as the exploration frontier.
#[derive(Default)]
pub struct MinHeap {
    heap: BinaryHeap<std::cmp::Reverse<Candidate>>,
}

impl MinHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, c: Candidate) {
        self.heap.push(std::cmp::Reverse(c));
    }

    pub fn pop(&mut self) -> Option<Candidate> {
        self.heap.pop().map(|r| r.0)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_heap_ordering() {
        let mut heap = MinHeap::new();
        heap.push(Candidate::new(0, 3.0));
        heap.push(Candidate::new(1, 1.0));
        heap.push(Candidate::new(2, 2.0));

        assert_eq!(heap.pop().unwrap().distance, 1.0);
        assert_eq!(heap.pop().unwrap().distance, 2.0);
        assert_eq!(heap.pop().unwrap().distance, 3.0);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_bounded_push_keeps_closest() {
        let mut heap = MaxHeap::new();
        heap.push_bounded(Candidate::new(0, 5.0), 2);
        heap.push_bounded(Candidate::new(1, 1.0), 2);
        heap.push_bounded(Candidate::new(2, 3.0), 2);

        assert_eq!(heap.len(), 2);
        assert_eq!(heap.furthest().unwrap().distance, 3.0);
        let sorted = heap.into_sorted_vec();
        assert_eq!(sorted[0].handle, 1);
        assert_eq!(sorted[1].handle, 2);
    }

    #[test]
    fn test_equal_distance_orders_by_handle() {
        let mut heap = MaxHeap::new();
        heap.push_bounded(Candidate::new(7, -1.0), 10);
        heap.push_bounded(Candidate::new(3, -1.0), 10);
        heap.push_bounded(Candidate::new(5, -2.0), 10);

        let handles: Vec<usize> = heap.into_sorted_vec().iter().map(|c| c.handle).collect();
        assert_eq!(handles, vec![5, 3, 7]);
    }
}
