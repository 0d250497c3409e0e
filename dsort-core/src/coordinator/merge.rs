//! Merging of sorted chunks
//!
//! Two-way merge, folded left across chunks to build the final order.

use tracing::debug;

/// Merge two sorted sequences into one.
///
/// Stable with left preference: when heads compare equal, the element from
/// `left` is emitted first.
pub fn merge<T: Ord>(left: Vec<T>, right: Vec<T>) -> Vec<T> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l <= r,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }

    merged
}

/// Left-fold [`merge`] over chunks in the order given
pub fn merge_all<T, I>(chunks: I) -> Vec<T>
where
    T: Ord,
    I: IntoIterator<Item = Vec<T>>,
{
    let mut folded = 0usize;
    let merged = chunks.into_iter().fold(Vec::new(), |acc, chunk| {
        folded += 1;
        merge(acc, chunk)
    });
    debug!("Merged {} chunks into {} items", folded, merged.len());
    merged
}
