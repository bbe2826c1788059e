use std::sync::Arc;

use rapport_columnar::{Batch, ColumnStore, ColumnarTable, EngineError, ExecContext, Predicate};
use rapport_types::{Direction, InteractionRecord};
use tracing::{debug, error, info, warn};

use crate::decode::BatchDecoder;
use crate::error::StoreError;
use crate::filter::build_direction_filter;
use crate::schema::{TABLE_NAME, interaction_schema, to_row};

/// Records from a query plus how many rows were dropped by decoding.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanReport {
    pub records: Vec<InteractionRecord>,
    pub rows_scanned: usize,
    pub rows_skipped: usize,
}

impl ScanReport {
    /// True when no row was dropped.
    pub fn is_complete(&self) -> bool {
        self.rows_skipped == 0
    }

    fn absorb(&mut self, batch: &Batch) {
        let decoder = BatchDecoder::new(batch.record());
        for row in 0..decoder.num_rows() {
            self.rows_scanned += 1;
            match decoder.decode_row(row) {
                Ok(record) => self.records.push(record),
                Err(e) => {
                    warn!("Skipping row {} of batch: {}", row, e);
                    self.rows_skipped += 1;
                }
            }
        }
    }
}

/// Append-only interaction storage. Cheap to clone; clones share the table.
#[derive(Clone)]
pub struct InteractionStore {
    table: Arc<dyn ColumnarTable>,
}

impl InteractionStore {
    /// Create (or reopen) the interaction table. Failure here is fatal for the
    /// process.
    pub fn open(engine: &ColumnStore) -> Result<Self, StoreError> {
        let schema = interaction_schema().map_err(|source| StoreError::Setup { source })?;
        let table = engine
            .create_table(TABLE_NAME, schema)
            .map_err(|source| StoreError::Setup { source })?;
        Ok(Self::new(table))
    }

    pub fn new(table: Arc<dyn ColumnarTable>) -> Self {
        Self { table }
    }

    /// Write one record as one row. No retries.
    ///
    /// The call returns only once the engine has decided the write, so an
    /// error always means the row was not stored.
    pub async fn append(
        &self,
        record: InteractionRecord,
        ctx: &ExecContext,
    ) -> Result<(), StoreError> {
        let table = self.table.clone();
        let row = to_row(&record);

        let result = run_to_completion(ctx, move |ctx| table.append(&ctx, row))
            .await
            .and_then(|r| r.map_err(StoreError::write));

        match &result {
            Ok(()) => info!(
                "Stored {} from {} to {} at {}",
                record.kind, record.actor_id, record.target_id, record.timestamp
            ),
            Err(e) => error!("Error writing interaction: {}", e),
        }
        result
    }

    /// Every decodable record matching `filter`, in engine scan order.
    pub async fn query(
        &self,
        filter: Option<Predicate>,
        ctx: &ExecContext,
    ) -> Result<Vec<InteractionRecord>, StoreError> {
        self.query_with_report(filter, ctx)
            .await
            .map(|report| report.records)
    }

    /// Like [`query`](Self::query), but also reports rows dropped by decoding.
    pub async fn query_with_report(
        &self,
        filter: Option<Predicate>,
        ctx: &ExecContext,
    ) -> Result<ScanReport, StoreError> {
        let table = self.table.clone();

        let result = run_blocking(ctx, move |ctx| {
            let mut report = ScanReport::default();
            table.scan(&ctx, filter.as_ref(), &mut |batch| {
                report.absorb(&batch);
                Ok(())
            })?;
            Ok(report)
        })
        .await
        .and_then(|r| r.map_err(StoreError::query));

        match &result {
            Ok(report) => debug!(
                "Query returned {} records ({} rows skipped)",
                report.records.len(),
                report.rows_skipped
            ),
            Err(e) => error!("Error executing query: {}", e),
        }
        result
    }

    /// Interactions initiated by (`Sent`) or aimed at (`Received`) `user_id`.
    pub async fn interactions_for(
        &self,
        user_id: &str,
        direction: Direction,
        ctx: &ExecContext,
    ) -> Result<Vec<InteractionRecord>, StoreError> {
        self.query(Some(build_direction_filter(user_id, direction)), ctx)
            .await
    }
}

/// Run a blocking engine call off the async runtime and wait for its outcome.
/// The engine observes the context and reports interrupts itself.
async fn run_to_completion<T, F>(
    ctx: &ExecContext,
    op: F,
) -> Result<Result<T, EngineError>, StoreError>
where
    F: FnOnce(ExecContext) -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    let task_ctx = ctx.clone();
    tokio::task::spawn_blocking(move || op(task_ctx))
        .await
        .map_err(|e| StoreError::Join(e.to_string()))
}

/// Like [`run_to_completion`], but returns early when the context is
/// cancelled or its deadline passes. Only for side-effect free calls: the
/// abandoned task stops at its next context check.
async fn run_blocking<T, F>(
    ctx: &ExecContext,
    op: F,
) -> Result<Result<T, EngineError>, StoreError>
where
    F: FnOnce(ExecContext) -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    let task_ctx = ctx.clone();
    let task = tokio::task::spawn_blocking(move || op(task_ctx));

    let deadline = async {
        match ctx.deadline() {
            Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        joined = task => joined.map_err(|e| StoreError::Join(e.to_string())),
        _ = ctx.cancellation_token().cancelled() => Err(StoreError::Cancelled),
        _ = deadline => Err(StoreError::DeadlineExceeded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use arrow::array::{ArrayRef, DictionaryArray, Int64Array, StringArray};
    use arrow::datatypes::{Field, Int32Type, Schema};
    use arrow::record_batch::RecordBatch;
    use rapport_columnar::{BatchTracker, EngineConfig, EngineResult, Row, TableSchema, col};
    use rapport_types::InteractionKind;

    fn memory_store(granule_rows: usize) -> (ColumnStore, InteractionStore) {
        let engine = ColumnStore::open(
            EngineConfig::new("test").with_wal(false).with_granule_rows(granule_rows),
        )
        .unwrap();
        let store = InteractionStore::open(&engine).unwrap();
        (engine, store)
    }

    /// Serves fixed batches and refuses writes.
    struct FixedTable {
        schema: TableSchema,
        batches: Vec<RecordBatch>,
        tracker: BatchTracker,
    }

    impl ColumnarTable for FixedTable {
        fn name(&self) -> &str {
            "fixed"
        }

        fn schema(&self) -> &TableSchema {
            &self.schema
        }

        fn append(&self, _ctx: &ExecContext, _row: Row) -> EngineResult<()> {
            Err(EngineError::RowShape {
                table: "fixed".into(),
                reason: "read only".into(),
            })
        }

        fn scan(
            &self,
            ctx: &ExecContext,
            _filter: Option<&Predicate>,
            on_batch: &mut dyn FnMut(Batch) -> EngineResult<()>,
        ) -> EngineResult<()> {
            for batch in &self.batches {
                ctx.check()?;
                on_batch(self.tracker.track(batch.clone()))?;
            }
            Ok(())
        }
    }

    fn fixed(batches: Vec<RecordBatch>) -> (BatchTracker, InteractionStore) {
        let tracker = BatchTracker::default();
        let table = FixedTable {
            schema: interaction_schema().unwrap(),
            batches,
            tracker: tracker.clone(),
        };
        (tracker, InteractionStore::new(Arc::new(table)))
    }

    fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, a)| a).collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    fn plain(values: Vec<&str>) -> ArrayRef {
        Arc::new(StringArray::from(values))
    }

    fn ints(values: Vec<i64>) -> ArrayRef {
        Arc::new(Int64Array::from(values))
    }

    fn good_batch() -> RecordBatch {
        let actors: ArrayRef =
            Arc::new(vec!["u1"].into_iter().collect::<DictionaryArray<Int32Type>>());
        batch(vec![
            ("actorId", actors),
            ("targetId", plain(vec!["u2"])),
            ("kind", plain(vec!["like"])),
            ("message", plain(vec![""])),
            ("timestamp", ints(vec![5])),
        ])
    }

    #[tokio::test]
    async fn report_is_found_by_sender_and_recipient_only() {
        let (_engine, store) = memory_store(8192);
        let ctx = ExecContext::background();
        let record = InteractionRecord::report("u1", "u2", "spam", 1_000);
        store.append(record.clone(), &ctx).await.unwrap();

        let sent = store.interactions_for("u1", Direction::Sent, &ctx).await.unwrap();
        assert_eq!(sent, vec![record.clone()]);

        let received = store
            .interactions_for("u1", Direction::Received, &ctx)
            .await
            .unwrap();
        assert!(received.is_empty());

        let received = store
            .interactions_for("u2", Direction::Received, &ctx)
            .await
            .unwrap();
        assert_eq!(received, vec![record]);
    }

    #[tokio::test]
    async fn duplicate_appends_are_kept() {
        let (_engine, store) = memory_store(8192);
        let ctx = ExecContext::background();
        let like = InteractionRecord::like("a", "b", 7);
        store.append(like.clone(), &ctx).await.unwrap();
        store.append(like.clone(), &ctx).await.unwrap();

        let all = store.query(None, &ctx).await.unwrap();
        assert_eq!(all, vec![like.clone(), like]);
    }

    #[tokio::test]
    async fn queries_decode_sealed_and_active_granules() {
        let (engine, store) = memory_store(4);
        let ctx = ExecContext::background();
        let mut written = Vec::new();
        for i in 0..10 {
            let record = match i % 3 {
                0 => InteractionRecord::report("u1", "u2", format!("m{}", i), i),
                1 => InteractionRecord::like("u1", "u3", i),
                _ => InteractionRecord::dislike("u2", "u1", i),
            };
            store.append(record.clone(), &ctx).await.unwrap();
            written.push(record);
        }

        let mut sent = store.interactions_for("u1", Direction::Sent, &ctx).await.unwrap();
        sent.sort_by_key(|r| r.timestamp);
        let expected: Vec<_> = written.iter().filter(|r| r.actor_id == "u1").cloned().collect();
        assert_eq!(sent, expected);

        let received = store
            .interactions_for("u1", Direction::Received, &ctx)
            .await
            .unwrap();
        assert_eq!(received.len(), 3);
        assert!(received.iter().all(|r| r.kind == InteractionKind::Dislike));

        // Sent and received for one user share no rows unless actor == target.
        assert!(sent.iter().all(|s| !received.contains(s)));
        assert_eq!(engine.outstanding_batches(), 0);
    }

    #[tokio::test]
    async fn self_interaction_appears_in_both_directions() {
        let (_engine, store) = memory_store(8192);
        let ctx = ExecContext::background();
        let own = InteractionRecord::like("u9", "u9", 3);
        store.append(own.clone(), &ctx).await.unwrap();

        let sent = store.interactions_for("u9", Direction::Sent, &ctx).await.unwrap();
        let received = store
            .interactions_for("u9", Direction::Received, &ctx)
            .await
            .unwrap();
        assert_eq!(sent, vec![own.clone()]);
        assert_eq!(received, vec![own]);
    }

    #[tokio::test]
    async fn bad_timestamp_batch_only_reduces_results() {
        let corrupt = batch(vec![
            ("actorId", plain(vec!["u1"])),
            ("timestamp", plain(vec!["not-a-number"])),
        ]);
        let (tracker, store) = fixed(vec![corrupt, good_batch()]);

        let report = store
            .query_with_report(None, &ExecContext::background())
            .await
            .unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0], InteractionRecord::like("u1", "u2", 5));
        assert_eq!(report.rows_scanned, 2);
        assert_eq!(report.rows_skipped, 1);
        assert!(!report.is_complete());
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test]
    async fn bad_row_does_not_abort_its_batch() {
        let mixed = batch(vec![
            ("actorId", plain(vec!["u1", "u1"])),
            ("kind", plain(vec!["poke", "dislike"])),
            ("timestamp", ints(vec![1, 2])),
        ]);
        let (_tracker, store) = fixed(vec![mixed]);

        let records = store.query(None, &ExecContext::background()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, InteractionKind::Dislike);
        assert_eq!(records[0].timestamp, 2);
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let (_tracker, store) = fixed(vec![]);
        let err = store
            .append(InteractionRecord::like("a", "b", 1), &ExecContext::background())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert!(err.to_string().starts_with("engine write failed"));
    }

    #[tokio::test]
    async fn query_failure_aborts_the_whole_query() {
        let (_engine, store) = memory_store(8192);
        let ctx = ExecContext::background();
        store.append(InteractionRecord::like("a", "b", 1), &ctx).await.unwrap();

        let err = store
            .query(Some(col("nope").eq("a")), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Query { .. }));
    }

    #[tokio::test]
    async fn cancelled_context_fails_fast() {
        let (_engine, store) = memory_store(8192);
        let ctx = ExecContext::background();
        ctx.cancel();

        let err = store
            .append(InteractionRecord::like("a", "b", 1), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));

        let err = store.query(None, &ctx).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }

    #[tokio::test]
    async fn expired_deadline_fails_fast() {
        let (_engine, store) = memory_store(8192);
        let ctx = ExecContext::with_timeout(Duration::ZERO);

        let err = store.query(None, &ctx).await.unwrap_err();
        assert!(matches!(err, StoreError::DeadlineExceeded));
    }

    /// Commits each row after a fixed delay, optionally re-checking the
    /// context first.
    struct SlowTable {
        schema: TableSchema,
        delay: Duration,
        recheck: bool,
        rows: std::sync::Mutex<Vec<Row>>,
    }

    impl SlowTable {
        fn new(recheck: bool) -> Arc<Self> {
            Arc::new(Self {
                schema: interaction_schema().unwrap(),
                delay: Duration::from_millis(300),
                recheck,
                rows: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn stored(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    impl ColumnarTable for SlowTable {
        fn name(&self) -> &str {
            "slow"
        }

        fn schema(&self) -> &TableSchema {
            &self.schema
        }

        fn append(&self, ctx: &ExecContext, row: Row) -> EngineResult<()> {
            ctx.check()?;
            std::thread::sleep(self.delay);
            if self.recheck {
                ctx.check()?;
            }
            self.rows.lock().unwrap().push(row);
            Ok(())
        }

        fn scan(
            &self,
            ctx: &ExecContext,
            _filter: Option<&Predicate>,
            _on_batch: &mut dyn FnMut(Batch) -> EngineResult<()>,
        ) -> EngineResult<()> {
            ctx.check()
        }
    }

    #[tokio::test]
    async fn write_committed_after_deadline_reports_success() {
        let table = SlowTable::new(false);
        let store = InteractionStore::new(table.clone());
        let ctx = ExecContext::with_timeout(Duration::from_millis(50));

        let result = store.append(InteractionRecord::like("a", "b", 1), &ctx).await;
        assert!(result.is_ok());
        assert_eq!(table.stored(), 1);
    }

    #[tokio::test]
    async fn write_abandoned_after_deadline_reports_error() {
        let table = SlowTable::new(true);
        let store = InteractionStore::new(table.clone());
        let ctx = ExecContext::with_timeout(Duration::from_millis(50));

        let err = store
            .append(InteractionRecord::like("a", "b", 1), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DeadlineExceeded));
        assert_eq!(table.stored(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_and_readers() {
        const WRITERS: i64 = 8;
        const PER_WRITER: i64 = 25;

        let (engine, store) = memory_store(3);

        let mut writers = Vec::new();
        for w in 0..WRITERS {
            let store = store.clone();
            writers.push(tokio::spawn(async move {
                let ctx = ExecContext::background();
                for i in 0..PER_WRITER {
                    let record = InteractionRecord::like(format!("u{}", w), "target", w * 1000 + i);
                    store.append(record, &ctx).await.unwrap();
                }
            }));
        }

        let mut readers = Vec::new();
        for w in 0..WRITERS {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                let ctx = ExecContext::background();
                for _ in 0..10 {
                    let sent = store
                        .interactions_for(&format!("u{}", w), Direction::Sent, &ctx)
                        .await
                        .unwrap();
                    assert!(sent.len() <= PER_WRITER as usize);
                    assert!(sent.iter().all(|r| r.actor_id == format!("u{}", w)));
                }
            }));
        }

        for handle in writers.into_iter().chain(readers) {
            handle.await.unwrap();
        }

        let report = store
            .query_with_report(None, &ExecContext::background())
            .await
            .unwrap();
        assert!(report.is_complete());

        let mut timestamps: Vec<i64> = report.records.iter().map(|r| r.timestamp).collect();
        timestamps.sort_unstable();
        let expected: Vec<i64> = (0..WRITERS)
            .flat_map(|w| (0..PER_WRITER).map(move |i| w * 1000 + i))
            .collect();
        assert_eq!(timestamps, expected);

        let received = store
            .interactions_for("target", Direction::Received, &ExecContext::background())
            .await
            .unwrap();
        assert_eq!(received.len(), (WRITERS * PER_WRITER) as usize);
        assert_eq!(engine.outstanding_batches(), 0);
    }
}
