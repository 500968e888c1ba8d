use async_trait::async_trait;
use jforward::codec::{Codec, ZstdCodec};
use jforward::delivery::{
    flush_pending, DeliveryCycle, DeliveryOutcome, DeliveryWorker, Transport, TransportError,
};
use jforward::harvest::{CycleOutcome, HarvestError, Harvester};
use jforward::runtime::{EngineContext, LoopExit, Scheduler, SchedulerConfig, SchedulerState};
use jforward::source::{LogSource, ResumeMode, SourceError};
use jforward::storage::{BatchStore, CursorStore};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

const URL: &str = "http://receiver.test/v1/http/token";
const THRESHOLD: usize = 900 * 1024;

enum Step {
    Output(Vec<u8>),
    Fail,
}

/// Replays scripted outputs, then returns empty output forever
#[derive(Default)]
struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<ResumeMode>>,
}

impl ScriptedSource {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<ResumeMode> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogSource for ScriptedSource {
    async fn read(&self, mode: &ResumeMode) -> Result<Vec<u8>, SourceError> {
        self.calls.lock().unwrap().push(mode.clone());
        match self.steps.lock().unwrap().pop_front() {
            Some(Step::Output(raw)) => Ok(raw),
            Some(Step::Fail) => Err(SourceError::Spawn {
                program: "journalctl".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Accepts everything unless told to reject the next attempts
#[derive(Default)]
struct RecordingTransport {
    rejections: AtomicUsize,
    attempts: Mutex<Vec<PathBuf>>,
    delivered: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl RecordingTransport {
    fn rejecting(count: usize) -> Arc<Self> {
        let transport = Self::default();
        transport.rejections.store(count, Ordering::SeqCst);
        Arc::new(transport)
    }

    fn attempts(&self) -> Vec<PathBuf> {
        self.attempts.lock().unwrap().clone()
    }

    fn delivered_names(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| file_name(path))
            .collect()
    }

    fn delivered_text(&self) -> String {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| String::from_utf8(zstd::stream::decode_all(&body[..]).unwrap()).unwrap())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(&self, batch: &Path, _url: &str, _category: Option<&str>) -> DeliveryOutcome {
        self.attempts.lock().unwrap().push(batch.to_path_buf());

        let rejected = self
            .rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return DeliveryOutcome::Retriable(TransportError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }

        match std::fs::read(batch) {
            Ok(body) => {
                let bytes = body.len() as u64;
                self.delivered.lock().unwrap().push((batch.to_path_buf(), body));
                DeliveryOutcome::Delivered { bytes }
            }
            Err(_) => DeliveryOutcome::Delivered { bytes: 0 },
        }
    }
}

/// Compresses the first `succeed` batches, then fails
struct FailingCodec {
    succeed: AtomicUsize,
}

impl Codec for FailingCodec {
    fn encode(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self
            .succeed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(_) => ZstdCodec::default().encode(data),
            Err(_) => Err(std::io::Error::new(std::io::ErrorKind::Other, "encoder broke")),
        }
    }

    fn content_encoding(&self) -> &'static str {
        "zstd"
    }
}

struct Engine {
    dir: TempDir,
    ctx: EngineContext,
}

impl Engine {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let ctx = EngineContext::new(BatchStore::new(dir.path()));
        Self { dir, ctx }
    }

    fn harvester(&self, source: Arc<dyn LogSource>) -> Harvester {
        self.harvester_with(source, Arc::new(ZstdCodec::default()))
    }

    fn harvester_with(&self, source: Arc<dyn LogSource>, codec: Arc<dyn Codec>) -> Harvester {
        Harvester::new(
            self.ctx.clone(),
            source,
            codec,
            CursorStore::new(self.dir.path()),
            THRESHOLD,
        )
    }

    fn worker(&self, transport: Arc<dyn Transport>) -> DeliveryWorker {
        DeliveryWorker::new(self.ctx.clone(), transport, URL.to_string(), None)
    }

    fn cursor(&self) -> Option<String> {
        std::fs::read_to_string(self.dir.path().join("jforward-cursor")).ok()
    }

    fn batch_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("batch-"))
            .collect();
        names.sort();
        names
    }

    fn queued_names(&self) -> Vec<String> {
        self.ctx.queue.snapshot().iter().map(|p| file_name(p)).collect()
    }

    fn write_batch(&self, sequence: u64, text: &str) {
        let encoded = ZstdCodec::default().encode(text.as_bytes()).unwrap();
        std::fs::write(
            self.dir.path().join(format!("batch-{}.zst.jfwd", sequence)),
            encoded,
        )
        .unwrap();
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

fn journal_output(lines: &[&str], cursor: &str) -> Vec<u8> {
    let mut raw = String::new();
    for line in lines {
        raw.push_str(line);
        raw.push('\n');
    }
    raw.push_str("-- cursor: ");
    raw.push_str(cursor);
    raw.push('\n');
    raw.into_bytes()
}

#[tokio::test]
async fn test_large_lines_split_into_two_batches() {
    let engine = Engine::new();
    let lines: Vec<String> = ["a", "b", "c"].iter().map(|c| c.repeat(400 * 1024)).collect();
    let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let source = ScriptedSource::new(vec![Step::Output(journal_output(&line_refs, "XYZ"))]);
    let mut harvester = engine.harvester(source);

    let outcome = harvester.run_cycle().await.unwrap();

    match outcome {
        CycleOutcome::Committed { lines, batches, cursor } => {
            assert_eq!(lines, 3);
            assert_eq!(batches.len(), 2);
            assert_eq!(cursor, "XYZ");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(
        engine.batch_names(),
        vec!["batch-1000001.zst.jfwd", "batch-1000002.zst.jfwd"]
    );
    assert_eq!(engine.queued_names(), engine.batch_names());
    assert_eq!(engine.cursor().as_deref(), Some("XYZ"));

    let first = std::fs::read(engine.dir.path().join("batch-1000001.zst.jfwd")).unwrap();
    let first = zstd::stream::decode_all(&first[..]).unwrap();
    assert_eq!(first, format!("{}\n{}\n", lines[0], lines[1]).into_bytes());
}

#[tokio::test]
async fn test_retriable_failure_keeps_batch_at_front() {
    let engine = Engine::new();
    let source = ScriptedSource::new(vec![Step::Output(journal_output(&["one"], "c1"))]);
    engine.harvester(source).run_cycle().await.unwrap();
    engine.write_batch(1_000_002, "two\n");
    engine.harvester(ScriptedSource::new(vec![])).reconcile().await.unwrap();

    let transport = RecordingTransport::rejecting(1);
    let worker = engine.worker(transport.clone());

    let cycle = worker.run_cycle().await;
    assert!(matches!(cycle, DeliveryCycle::Requeued(ref p) if file_name(p) == "batch-1000001.zst.jfwd"));
    assert_eq!(
        engine.queued_names(),
        vec!["batch-1000001.zst.jfwd", "batch-1000002.zst.jfwd"]
    );
    assert!(engine.dir.path().join("batch-1000001.zst.jfwd").exists());

    worker.run_cycle().await;
    worker.run_cycle().await;
    assert_eq!(
        transport.delivered_names(),
        vec!["batch-1000001.zst.jfwd", "batch-1000002.zst.jfwd"]
    );
    assert!(engine.batch_names().is_empty());
    assert!(engine.ctx.queue.is_empty());
    assert_eq!(engine.ctx.stats.snapshot().delivery_failures, 1);
}

#[tokio::test]
async fn test_restart_delivers_leftovers_before_reading() {
    let engine = Engine::new();
    std::fs::write(engine.dir.path().join("jforward-cursor"), "ABC").unwrap();
    engine.write_batch(1_000_001, "old one\n");
    engine.write_batch(1_000_002, "old two\n");

    let source = ScriptedSource::new(vec![Step::Output(journal_output(&["new"], "DEF"))]);
    let mut harvester = engine.harvester(source.clone());
    let worker = engine.worker(Arc::new(RecordingTransport::default()));

    let outcome = harvester.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Backpressure { pending: 2 });
    assert!(source.calls().is_empty());
    assert_eq!(engine.cursor().as_deref(), Some("ABC"));

    worker.run_cycle().await;
    worker.run_cycle().await;
    assert!(engine.batch_names().is_empty());

    harvester.run_cycle().await.unwrap();
    assert_eq!(source.calls(), vec![ResumeMode::AfterCursor("ABC".to_string())]);
    assert_eq!(engine.cursor().as_deref(), Some("DEF"));
}

#[tokio::test]
async fn test_trailer_only_output_advances_cursor() {
    let engine = Engine::new();
    std::fs::write(engine.dir.path().join("jforward-cursor"), "OLD").unwrap();
    let source = ScriptedSource::new(vec![Step::Output(b"\n-- cursor: XYZ".to_vec())]);

    let outcome = engine.harvester(source).run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Committed {
            lines: 0,
            batches: vec![],
            cursor: "XYZ".to_string()
        }
    );
    assert_eq!(engine.cursor().as_deref(), Some("XYZ"));
    assert!(engine.batch_names().is_empty());
}

#[tokio::test]
async fn test_first_read_starts_at_process_start() {
    let engine = Engine::new();
    let source = ScriptedSource::new(vec![]);
    let mut harvester = engine.harvester(source.clone());

    let outcome = harvester.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::NoOutput);
    assert_eq!(source.calls(), vec![ResumeMode::Since(harvester.started_at())]);
    assert_eq!(engine.cursor(), None);
}

#[tokio::test]
async fn test_source_failure_leaves_state_untouched() {
    let engine = Engine::new();
    std::fs::write(engine.dir.path().join("jforward-cursor"), "KEEP").unwrap();
    let source = ScriptedSource::new(vec![
        Step::Fail,
        Step::Output(b"record without trailer\nanother\n".to_vec()),
    ]);
    let mut harvester = engine.harvester(source);

    assert!(matches!(harvester.run_cycle().await, Err(HarvestError::Source(_))));
    assert!(matches!(harvester.run_cycle().await, Err(HarvestError::Protocol(_))));
    assert_eq!(engine.cursor().as_deref(), Some("KEEP"));
    assert!(engine.batch_names().is_empty());
}

#[tokio::test]
async fn test_persist_failure_does_not_advance_cursor() {
    let engine = Engine::new();
    std::fs::write(engine.dir.path().join("jforward-cursor"), "BEFORE").unwrap();
    let lines: Vec<String> = ["x", "y"].iter().map(|c| c.repeat(600 * 1024)).collect();
    let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let source = ScriptedSource::new(vec![Step::Output(journal_output(&line_refs, "AFTER"))]);
    let codec = Arc::new(FailingCodec {
        succeed: AtomicUsize::new(1),
    });
    let mut harvester = engine.harvester_with(source.clone(), codec);

    assert!(matches!(harvester.run_cycle().await, Err(HarvestError::Compress(_))));
    assert_eq!(engine.cursor().as_deref(), Some("BEFORE"));
    assert_eq!(engine.batch_names(), vec!["batch-1000001.zst.jfwd"]);

    // the partial batch blocks further reads until it is delivered
    let outcome = harvester.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Backpressure { pending: 1 });
    assert_eq!(source.calls().len(), 1);
}

#[tokio::test]
async fn test_sequence_restarts_every_cycle() {
    let engine = Engine::new();
    let source = ScriptedSource::new(vec![
        Step::Output(journal_output(&["first"], "c1")),
        Step::Output(journal_output(&["second"], "c2")),
    ]);
    let mut harvester = engine.harvester(source);
    let transport = Arc::new(RecordingTransport::default());
    let worker = engine.worker(transport.clone());

    harvester.run_cycle().await.unwrap();
    worker.run_cycle().await;
    harvester.run_cycle().await.unwrap();
    worker.run_cycle().await;

    assert_eq!(
        transport.delivered_names(),
        vec!["batch-1000001.zst.jfwd", "batch-1000001.zst.jfwd"]
    );
    assert_eq!(transport.delivered_text(), "first\nsecond\n");
    assert_eq!(engine.cursor().as_deref(), Some("c2"));
}

#[tokio::test]
async fn test_flush_stops_at_first_failure() {
    let engine = Engine::new();
    engine.write_batch(1_000_001, "one\n");
    engine.write_batch(1_000_002, "two\n");
    let store = BatchStore::new(engine.dir.path());

    let transport = RecordingTransport::rejecting(1);
    assert!(flush_pending(&store, transport.as_ref(), URL, None).await.is_err());
    assert_eq!(transport.attempts().len(), 1);
    assert_eq!(engine.batch_names().len(), 2);

    let delivered = flush_pending(&store, transport.as_ref(), URL, None).await.unwrap();
    assert_eq!(delivered, 2);
    assert_eq!(transport.delivered_text(), "one\ntwo\n");
    assert!(engine.batch_names().is_empty());
}

#[tokio::test]
async fn test_scheduler_delivers_in_order_and_drains() {
    let engine = Engine::new();
    engine.write_batch(1_000_001, "left over\n");
    let source = ScriptedSource::new(vec![
        Step::Output(journal_output(&["alpha", "beta"], "c1")),
        Step::Output(journal_output(&["gamma"], "c2")),
    ]);
    let transport = RecordingTransport::rejecting(1);

    let scheduler = Scheduler::new(
        engine.ctx.clone(),
        engine.harvester(source),
        engine.worker(transport.clone()),
        SchedulerConfig {
            read_interval: Duration::from_millis(10),
            upload_interval: Duration::from_millis(10),
            drain_timeout: Duration::from_secs(5),
        },
    );
    let mut state = scheduler.subscribe();
    assert_eq!(*state.borrow(), SchedulerState::Idle);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));
    state.wait_for(|s| *s == SchedulerState::Running).await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        while engine.cursor().as_deref() != Some("c2") || !engine.batch_names().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("engine did not catch up");

    shutdown.cancel();
    let report = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*state.borrow(), SchedulerState::Stopped);
    assert_eq!(report.harvest, LoopExit::Completed);
    assert_eq!(report.delivery, LoopExit::Completed);
    assert_eq!(report.undelivered, 0);
    assert_eq!(report.stats.lines_read, 3);
    assert_eq!(report.stats.delivery_failures, 1);
    assert_eq!(transport.delivered_text(), "left over\nalpha\nbeta\ngamma\n");
}

#[tokio::test]
async fn test_drain_aborts_stuck_delivery() {
    struct StuckTransport;

    #[async_trait]
    impl Transport for StuckTransport {
        async fn deliver(&self, _: &Path, _: &str, _: Option<&str>) -> DeliveryOutcome {
            std::future::pending().await
        }
    }

    let engine = Engine::new();
    engine.write_batch(1_000_001, "stuck\n");
    let scheduler = Scheduler::new(
        engine.ctx.clone(),
        engine.harvester(ScriptedSource::new(vec![])),
        engine.worker(Arc::new(StuckTransport)),
        SchedulerConfig {
            read_interval: Duration::from_millis(10),
            upload_interval: Duration::from_millis(10),
            drain_timeout: Duration::from_millis(100),
        },
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.ctx.queue.in_flight() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    shutdown.cancel();
    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.harvest, LoopExit::Completed);
    assert_eq!(report.delivery, LoopExit::Aborted);
    assert_eq!(report.undelivered, 1);
    assert_eq!(engine.batch_names(), vec!["batch-1000001.zst.jfwd"]);
}

#[tokio::test]
async fn test_stale_queue_entry_does_not_reorder_next_cycle() {
    let engine = Engine::new();
    // left behind when an upload finished between a scan and its enqueue
    engine
        .ctx
        .queue
        .enqueue(engine.dir.path().join("batch-1000002.zst.jfwd"));
    let lines: Vec<String> = ["x", "y"].iter().map(|c| c.repeat(600 * 1024)).collect();
    let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let source = ScriptedSource::new(vec![Step::Output(journal_output(&line_refs, "C"))]);

    engine.harvester(source).run_cycle().await.unwrap();

    assert_eq!(
        engine.queued_names(),
        vec!["batch-1000001.zst.jfwd", "batch-1000002.zst.jfwd"]
    );
}

#[tokio::test]
async fn test_upload_in_flight_blocks_reading() {
    let engine = Engine::new();
    let stale = engine.dir.path().join("batch-1000001.zst.jfwd");
    engine.ctx.queue.enqueue(stale.clone());
    assert_eq!(engine.ctx.queue.dequeue(), Some(stale.clone()));

    let source = ScriptedSource::new(vec![Step::Output(journal_output(&["new"], "C"))]);
    let mut harvester = engine.harvester(source.clone());

    let outcome = harvester.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Backpressure { pending: 1 });
    assert!(source.calls().is_empty());

    engine.ctx.queue.complete(&stale);
    harvester.run_cycle().await.unwrap();
    assert_eq!(engine.queued_names(), vec!["batch-1000001.zst.jfwd"]);
}

#[tokio::test]
async fn test_missing_batch_is_not_counted_as_delivered() {
    let engine = Engine::new();
    engine
        .ctx
        .queue
        .enqueue(engine.dir.path().join("batch-1000001.zst.jfwd"));
    let transport = Arc::new(RecordingTransport::default());

    let cycle = engine.worker(transport.clone()).run_cycle().await;

    assert!(matches!(cycle, DeliveryCycle::Delivered(_)));
    assert!(engine.ctx.queue.is_empty());
    assert_eq!(engine.ctx.queue.in_flight(), 0);
    assert_eq!(engine.ctx.stats.snapshot().batches_delivered, 0);
    assert!(transport.delivered_names().is_empty());
}

/// Blocks inside `deliver` until released
#[derive(Default)]
struct GatedTransport {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl Transport for GatedTransport {
    async fn deliver(&self, batch: &Path, _url: &str, _category: Option<&str>) -> DeliveryOutcome {
        self.entered.notify_one();
        self.release.notified().await;
        let bytes = std::fs::metadata(batch).map(|m| m.len()).unwrap_or(0);
        DeliveryOutcome::Delivered { bytes }
    }
}

/// Blocks inside `read` until released, then returns its output
struct GatedSource {
    entered: Notify,
    release: Notify,
    output: Vec<u8>,
}

#[async_trait]
impl LogSource for GatedSource {
    async fn read(&self, _mode: &ResumeMode) -> Result<Vec<u8>, SourceError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.output.clone())
    }
}

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        read_interval: Duration::from_millis(10),
        upload_interval: Duration::from_millis(10),
        drain_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_shutdown_lets_running_delivery_finish() {
    let engine = Engine::new();
    engine.write_batch(1_000_001, "in flight\n");
    let transport = Arc::new(GatedTransport::default());
    let scheduler = Scheduler::new(
        engine.ctx.clone(),
        engine.harvester(ScriptedSource::new(vec![])),
        engine.worker(transport.clone()),
        fast_config(),
    );
    let mut state = scheduler.subscribe();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));
    tokio::time::timeout(Duration::from_secs(5), transport.entered.notified())
        .await
        .unwrap();

    shutdown.cancel();
    state.wait_for(|s| *s == SchedulerState::Draining).await.unwrap();
    transport.release.notify_one();

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.delivery, LoopExit::Completed);
    assert_eq!(report.harvest, LoopExit::Completed);
    assert_eq!(report.undelivered, 0);
    assert_eq!(report.stats.batches_delivered, 1);
    assert!(engine.batch_names().is_empty());
}

#[tokio::test]
async fn test_shutdown_lets_running_harvest_commit() {
    let engine = Engine::new();
    let source = Arc::new(GatedSource {
        entered: Notify::new(),
        release: Notify::new(),
        output: journal_output(&["late record"], "LAST"),
    });
    let scheduler = Scheduler::new(
        engine.ctx.clone(),
        engine.harvester(source.clone()),
        engine.worker(Arc::new(RecordingTransport::default())),
        fast_config(),
    );
    let mut state = scheduler.subscribe();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));
    tokio::time::timeout(Duration::from_secs(5), source.entered.notified())
        .await
        .unwrap();

    shutdown.cancel();
    state.wait_for(|s| *s == SchedulerState::Draining).await.unwrap();
    source.release.notify_one();

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.harvest, LoopExit::Completed);
    assert_eq!(report.delivery, LoopExit::Completed);
    assert_eq!(report.stats.lines_read, 1);
    assert_eq!(engine.cursor().as_deref(), Some("LAST"));
    assert_eq!(engine.batch_names(), vec!["batch-1000001.zst.jfwd"]);
}
