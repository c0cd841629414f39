use std::cmp::Ordering;

/// Anything that can live in a [`MinHeap`].
///
/// Nodes are ordered by `sort_index`, ties broken by the smaller `id`.
pub trait HeapNode {
    fn id(&self) -> u64;
    fn sort_index(&self) -> f64;
}

fn compare<T: HeapNode>(a: &T, b: &T) -> Ordering {
    a.sort_index()
        .total_cmp(&b.sort_index())
        .then_with(|| a.id().cmp(&b.id()))
}

/// Array-backed binary min-heap.
///
/// No arbitrary removal: callers that need to drop a node mark it dead and
/// let it surface through `pop`.
#[derive(Debug, Clone)]
pub struct MinHeap<T> {
    nodes: Vec<T>,
}

impl<T> Default for MinHeap<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T: HeapNode> MinHeap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: T) {
        self.nodes.push(node);
        self.sift_up(self.nodes.len() - 1);
    }

    pub fn peek(&self) -> Option<&T> {
        self.nodes.first()
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.nodes.is_empty() {
            return None;
        }
        let first = self.nodes.swap_remove(0);
        if !self.nodes.is_empty() {
            self.sift_down(0);
        }
        Some(first)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) >> 1;
            if compare(&self.nodes[parent], &self.nodes[index]) == Ordering::Greater {
                self.nodes.swap(parent, index);
                index = parent;
            } else {
                return;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let length = self.nodes.len();
        let half = length >> 1;
        while index < half {
            let left = 2 * index + 1;
            let right = left + 1;

            // Swap with the smaller child, if either is smaller.
            let smaller = if right < length
                && compare(&self.nodes[right], &self.nodes[left]) == Ordering::Less
            {
                right
            } else {
                left
            };

            if compare(&self.nodes[smaller], &self.nodes[index]) == Ordering::Less {
                self.nodes.swap(index, smaller);
                index = smaller;
            } else {
                return;
            }
        }
    }
}
