use std::iter::FusedIterator;
use std::ops::Range;

type ChunkQuery<'a, T> = Box<dyn FnMut(Range<usize>) -> Vec<T> + Send + 'a>;

/// Lazily produces one result per query point, in input order.
///
/// Query points are processed `bulk` at a time, so at most one chunk of
/// results is held in memory. The sequence is finite and cannot be restarted;
/// collecting it gives exactly the eager batch result.
pub struct BulkIter<'a, T> {
    num_queries: usize,
    bulk: usize,
    next_query: usize,
    query: ChunkQuery<'a, T>,
    buffered: std::vec::IntoIter<T>,
}

impl<'a, T> BulkIter<'a, T> {
    /// `query` must return exactly one result per index of the range it is
    /// handed, in order.
    pub(crate) fn new<F>(num_queries: usize, bulk: usize, query: F) -> Self
    where
        F: FnMut(Range<usize>) -> Vec<T> + Send + 'a,
    {
        debug_assert!(bulk > 0);
        BulkIter {
            num_queries,
            bulk,
            next_query: 0,
            query: Box::new(query),
            buffered: Vec::new().into_iter(),
        }
    }

    /// Number of query points per chunk.
    #[must_use]
    pub fn bulk(&self) -> usize {
        self.bulk
    }
}

impl<T> Iterator for BulkIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if let Some(result) = self.buffered.next() {
            return Some(result);
        }
        if self.next_query >= self.num_queries {
            return None;
        }
        let chunk = self.next_query..self.num_queries.min(self.next_query + self.bulk);
        tracing::trace!(start = chunk.start, end = chunk.end, "querying chunk");
        self.next_query = chunk.end;
        self.buffered = (self.query)(chunk).into_iter();
        self.buffered.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffered.len() + (self.num_queries - self.next_query);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for BulkIter<'_, T> {}

impl<T> FusedIterator for BulkIter<'_, T> {}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn chunks_are_fetched_lazily() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut iter = BulkIter::new(7, 3, move |range: Range<usize>| {
            counter.fetch_add(1, Ordering::SeqCst);
            range.map(|i| i * 10).collect()
        });
        assert_eq!(iter.len(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(iter.next(), Some(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(iter.len(), 6);

        let rest: Vec<usize> = iter.by_ref().collect();
        assert_eq!(rest, vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn empty_batch() {
        let mut iter = BulkIter::new(0, 5, |range: Range<usize>| range.collect::<Vec<_>>());
        assert_eq!(iter.next(), None);
    }
}
