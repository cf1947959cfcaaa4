//! Chemical primitives: elements, compositions, phases
//!
//! Everything above this module talks in [`Phase`]s; compositions only
//! surface where mass balance is computed.

mod composition;
mod element;
mod phase;

pub use composition::Composition;
pub use element::Element;
pub use phase::{Phase, PrecursorSet};

/// All `k`-element combinations of `items`, in lexicographic index order.
pub(crate) fn combinations<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        out.push(indices.iter().map(|&i| items[i].clone()).collect());

        // Advance the rightmost index that still has room.
        let Some(pos) = (0..k).rev().find(|&i| indices[i] != i + n - k) else {
            return out;
        };
        indices[pos] += 1;
        for j in pos + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}
