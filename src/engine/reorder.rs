// Wed Jan 14 2026 - Alex

use crate::engine::result::RunCounter;
use crate::record::Tagged;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;

pub const DEFAULT_SLACK: usize = 3;

struct Pending<T> {
    origin: u64,
    value: T,
}

impl<T> PartialEq for Pending<T> {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin
    }
}

impl<T> Eq for Pending<T> {}

impl<T> PartialOrd for Pending<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// reversed so the heap pops the smallest origin first
impl<T> Ord for Pending<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.origin.cmp(&self.origin)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorderStats {
    pub emitted: u64,
    pub peak_buffered: usize,
    pub forced_jumps: u64,
    pub late: u64,
}

/// Restores origin order with a bounded lookahead.
///
/// Items ahead of the expected origin wait in a min-heap. When the heap reaches
/// `bound` entries the smallest one is emitted anyway and the expected origin
/// jumps past it; anything older that arrives afterwards is emitted as soon as it
/// shows up.
pub struct ReorderBuffer<T> {
    expected: u64,
    heap: BinaryHeap<Pending<T>>,
    bound: usize,
    stats: ReorderStats,
}

impl<T> ReorderBuffer<T> {
    pub fn new(bound: usize) -> Self {
        Self {
            expected: 0,
            heap: BinaryHeap::new(),
            bound: bound.max(1),
            stats: ReorderStats::default(),
        }
    }

    pub fn for_workers(max_workers: usize, slack: usize) -> Self {
        Self::new(max_workers + slack)
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn stats(&self) -> ReorderStats {
        self.stats
    }

    pub fn push(&mut self, origin: u64, value: T, out: &mut VecDeque<Tagged<T>>) {
        if origin < self.expected {
            self.stats.late += 1;
            self.stats.emitted += 1;
            out.push_back(Tagged::new(origin, value));
            return;
        }

        if origin == self.expected {
            self.emit(origin, value, out);
        } else {
            self.heap.push(Pending { origin, value });
            self.stats.peak_buffered = self.stats.peak_buffered.max(self.heap.len());
        }

        self.release_ready(out);

        if self.heap.len() >= self.bound {
            if let Some(Pending { origin, value }) = self.heap.pop() {
                log::debug!(
                    "Reorder buffer full ({} entries), jumping from origin {} to {}",
                    self.bound,
                    self.expected,
                    origin
                );
                self.stats.forced_jumps += 1;
                self.expected = origin;
                self.emit(origin, value, out);
                self.release_ready(out);
            }
        }
    }

    /// Emits everything still buffered in ascending origin order.
    pub fn finish(&mut self, out: &mut VecDeque<Tagged<T>>) {
        while let Some(Pending { origin, value }) = self.heap.pop() {
            self.emit(origin, value, out);
        }
    }

    fn emit(&mut self, origin: u64, value: T, out: &mut VecDeque<Tagged<T>>) {
        self.expected = self.expected.max(origin + 1);
        self.stats.emitted += 1;
        out.push_back(Tagged::new(origin, value));
    }

    fn release_ready(&mut self, out: &mut VecDeque<Tagged<T>>) {
        while self.heap.peek().map(|p| p.origin) == Some(self.expected) {
            if let Some(Pending { origin, value }) = self.heap.pop() {
                self.emit(origin, value, out);
            }
        }
    }
}

pub struct Reordered<I, T> {
    inner: I,
    buffer: ReorderBuffer<T>,
    ready: VecDeque<Tagged<T>>,
    drained: bool,
    counter: Option<Arc<RunCounter>>,
}

impl<I, T> Reordered<I, T>
where
    I: Iterator<Item = Tagged<T>>,
{
    pub fn new(inner: I, buffer: ReorderBuffer<T>) -> Self {
        Self {
            inner,
            buffer,
            ready: VecDeque::new(),
            drained: false,
            counter: None,
        }
    }

    pub fn with_counter(mut self, counter: Arc<RunCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn stats(&self) -> ReorderStats {
        self.buffer.stats()
    }
}

impl<I, T> Iterator for Reordered<I, T>
where
    I: Iterator<Item = Tagged<T>>,
{
    type Item = Tagged<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }

            if self.drained {
                return None;
            }

            match self.inner.next() {
                Some(Tagged { origin, value }) => self.buffer.push(origin, value, &mut self.ready),
                None => {
                    self.buffer.finish(&mut self.ready);
                    self.drained = true;

                    if let Some(counter) = &self.counter {
                        counter.record_reorder(&self.buffer.stats());
                    }
                }
            }
        }
    }
}
