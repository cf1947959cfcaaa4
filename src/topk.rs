//! Top-K selection
//!
//! Cuts a ranking down to a batch without sorting every entry: a bounded
//! binary heap keeps the best K seen so far, O(N log K). Ties keep input
//! order, so selection is deterministic.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::Error;

/// Top-K selection over a slice
pub trait TopKSelection<T> {
    /// Select the K items with the smallest `key`, smallest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `k` is zero.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use synth_planner::topk::TopKSelection;
    ///
    /// let energies = [-12.0_f64, -80.5, 3.0, -40.0];
    /// let best = energies.top_k_by_key(2, |e| (*e * 1000.0) as i64)?;
    /// assert_eq!(best, vec![&-80.5, &-40.0]);
    /// # Ok::<(), synth_planner::Error>(())
    /// ```
    fn top_k_by_key<K: Ord, F: Fn(&T) -> K>(&self, k: usize, key: F) -> crate::Result<Vec<&T>>;
}

impl<T> TopKSelection<T> for [T] {
    fn top_k_by_key<K: Ord, F: Fn(&T) -> K>(&self, k: usize, key: F) -> crate::Result<Vec<&T>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be greater than 0".to_string()));
        }

        // Max-heap of the K smallest (largest kept key on top)
        let mut heap: BinaryHeap<HeapItem<K>> = BinaryHeap::with_capacity(k);
        for (index, item) in self.iter().enumerate() {
            let value = key(item);
            if heap.len() < k {
                heap.push(HeapItem { value, index });
            } else if heap.peek().is_some_and(|top| value < top.value) {
                heap.pop();
                heap.push(HeapItem { value, index });
            }
        }
        let mut kept = heap.into_vec();
        kept.sort();

        Ok(kept.into_iter().map(|item| &self[item.index]).collect())
    }
}

/// Heap item ordered by (value, index)
struct HeapItem<V> {
    value: V,
    index: usize,
}

impl<V: Ord> PartialEq for HeapItem<V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<V: Ord> Eq for HeapItem<V> {}

impl<V: Ord> Ord for HeapItem<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value).then(self.index.cmp(&other.index))
    }
}

impl<V: Ord> PartialOrd for HeapItem<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
