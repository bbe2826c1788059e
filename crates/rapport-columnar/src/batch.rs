//! Scoped result batches.
//!
//! A scan hands each `Batch` to its callback by value. The batch is released
//! when it is dropped, which happens exactly once on every exit path of the
//! callback. Tracked batches decrement their store's outstanding count on drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arrow::record_batch::RecordBatch;

/// Counts batches handed out and not yet released.
#[derive(Debug, Clone, Default)]
pub struct BatchTracker {
    live: Arc<AtomicUsize>,
}

impl BatchTracker {
    pub fn track(&self, record: RecordBatch) -> Batch {
        self.live.fetch_add(1, Ordering::AcqRel);
        Batch {
            record,
            live: Some(self.live.clone()),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct Batch {
    record: RecordBatch,
    live: Option<Arc<AtomicUsize>>,
}

impl Batch {
    /// An untracked batch, for engines and tests that build batches by hand.
    pub fn new(record: RecordBatch) -> Self {
        Self { record, live: None }
    }

    pub fn record(&self) -> &RecordBatch {
        &self.record
    }

    pub fn num_rows(&self) -> usize {
        self.record.num_rows()
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    fn record() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap()
    }

    #[test]
    fn tracked_batches_release_on_drop() {
        let tracker = BatchTracker::default();
        let a = tracker.track(record());
        let b = tracker.track(record());
        assert_eq!(tracker.outstanding(), 2);
        assert_eq!(a.num_rows(), 3);

        drop(a);
        assert_eq!(tracker.outstanding(), 1);
        drop(b);
        assert_eq!(tracker.outstanding(), 0);
    }

    #[test]
    fn untracked_batches_do_not_touch_counters() {
        let tracker = BatchTracker::default();
        drop(Batch::new(record()));
        assert_eq!(tracker.outstanding(), 0);
    }
}
