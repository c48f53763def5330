use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

use beadview_core::{Classification, Column, Record};
use beadview_detector::WriteMarkerDetector;
use beadview_live::{
    join_scheduler, CommandExecutor, DetectionMode, FetchError, FetchErrorKind, LiveError,
    MutationIntent, SchedulerHandle, SchedulerOptions, StatusNotice, SyncEvent, SyncScheduler,
};
use beadview_sync::{FilterSpec, LiveView, Predicate, ViewMutation, ViewPipeline};

// ---------------------------------------------------------------------------
// Fake bd
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeBd {
    records: Mutex<Vec<Record>>,
    failure: Mutex<Option<FetchError>>,
    gate: Mutex<Option<std_mpsc::Receiver<()>>>,
    fetches: AtomicUsize,
    mutations: Mutex<Vec<MutationIntent>>,
}

impl FakeBd {
    fn with_records(records: Vec<Record>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            ..Self::default()
        })
    }

    /// Block every fetch until the returned sender sends or is dropped.
    fn gate(&self) -> std_mpsc::Sender<()> {
        let (tx, rx) = std_mpsc::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn set_status(&self, id: &str, status: &str, revision: &str) {
        let mut records = self.records.lock().unwrap();
        for record in records.iter_mut().filter(|r| r.id.0 == id) {
            record.status = status.to_string();
            record.revision = revision.into();
        }
    }
}

impl CommandExecutor for FakeBd {
    fn fetch_all(&self) -> Result<Vec<Record>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            let _ = gate.recv();
        }
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.records.lock().unwrap().clone())
    }

    fn mutate(&self, intent: &MutationIntent) -> Result<String, FetchError> {
        self.mutations.lock().unwrap().push(intent.clone());
        if let MutationIntent::Close { id, .. } = intent {
            self.set_status(&id.0, "closed", "closed-rev");
            return Ok(format!("closed {id}"));
        }
        Ok(String::new())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    handle: SchedulerHandle,
    events: UnboundedReceiver<SyncEvent>,
    task: JoinHandle<Result<(), LiveError>>,
}

fn two_issues() -> Vec<Record> {
    vec![
        Record::new("bd-1", "r1").with_status("open").with_title("first"),
        Record::new("bd-2", "r1").with_status("open").with_title("second"),
    ]
}

fn slow_options() -> SchedulerOptions {
    SchedulerOptions {
        watch: false,
        detect_interval: Duration::from_secs(60),
        fallback_interval: Duration::from_secs(60),
        poll_interval: Duration::from_secs(60),
        debounce: Duration::from_millis(10),
    }
}

fn fast_poll_options() -> SchedulerOptions {
    SchedulerOptions {
        poll_interval: Duration::from_millis(20),
        debounce: Duration::from_millis(5),
        ..slow_options()
    }
}

fn spawn(bd: Arc<FakeBd>, root: Option<PathBuf>, options: SchedulerOptions) -> Harness {
    let detector = WriteMarkerDetector::new(root, &Classification::default(), 3);
    let view = LiveView::new(
        ViewPipeline::new(FilterSpec::all(), Default::default()),
        &[Column::Id, Column::Status, Column::Title],
    );
    let (scheduler, handle, events) = SyncScheduler::new(bd, detector, view, options);
    Harness {
        handle,
        events,
        task: scheduler.spawn(),
    }
}

async fn next_matching<F>(events: &mut UnboundedReceiver<SyncEvent>, mut pred: F) -> SyncEvent
where
    F: FnMut(&SyncEvent) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, events.recv()).await {
            Ok(Some(event)) if pred(&event) => return event,
            Ok(Some(_)) => continue,
            Ok(None) => panic!("event channel closed"),
            Err(_) => panic!("timed out waiting for event"),
        }
    }
}

async fn drain_for(events: &mut UnboundedReceiver<SyncEvent>, window: Duration) -> Vec<SyncEvent> {
    let deadline = Instant::now() + window;
    let mut seen = Vec::new();
    while let Ok(Some(event)) = timeout(deadline.saturating_duration_since(Instant::now()), events.recv()).await {
        seen.push(event);
    }
    seen
}

fn is_refreshed(event: &SyncEvent) -> bool {
    matches!(event, SyncEvent::Status(StatusNotice::Refreshed { .. }))
}

fn is_view(event: &SyncEvent) -> bool {
    matches!(event, SyncEvent::View(_))
}

async fn wait_until_busy(handle: &SchedulerHandle) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.state().await.unwrap().busy {
        assert!(Instant::now() < deadline, "scheduler never started a job");
        sleep(Duration::from_millis(5)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_rebuilds_and_reports_counts() {
    let bd = FakeBd::with_records(two_issues());
    let mut h = spawn(bd.clone(), None, slow_options());
    h.handle.start().unwrap();

    let started = next_matching(&mut h.events, |_| true).await;
    assert_eq!(
        started,
        SyncEvent::Status(StatusNotice::Started {
            mode: DetectionMode::Poll
        })
    );
    match next_matching(&mut h.events, |_| true).await {
        SyncEvent::View(ViewMutation::RebuildAll { rows }) => assert_eq!(rows.len(), 2),
        other => panic!("expected rebuild, got {other:?}"),
    }
    match next_matching(&mut h.events, |_| true).await {
        SyncEvent::Status(StatusNotice::Refreshed {
            shown, total, added, ..
        }) => assert_eq!((shown, total, added), (2, 2, 2)),
        other => panic!("expected refreshed, got {other:?}"),
    }
    assert_eq!(bd.fetch_count(), 1);
}

#[tokio::test]
async fn unchanged_poll_ticks_emit_no_view_mutations() {
    let bd = FakeBd::with_records(two_issues());
    let mut h = spawn(bd.clone(), None, fast_poll_options());
    h.handle.start().unwrap();
    next_matching(&mut h.events, is_refreshed).await;

    let later = drain_for(&mut h.events, Duration::from_millis(300)).await;
    assert!(bd.fetch_count() > 1, "poll mode should refetch on every tick");
    assert!(later.iter().any(is_refreshed));
    assert!(!later.iter().any(is_view), "unexpected mutations: {later:?}");
}

#[tokio::test]
async fn poll_tick_delivers_single_cell_update() {
    let bd = FakeBd::with_records(two_issues());
    let mut h = spawn(bd.clone(), None, fast_poll_options());
    h.handle.start().unwrap();
    next_matching(&mut h.events, is_refreshed).await;

    bd.set_status("bd-1", "closed", "r2");
    let update = next_matching(&mut h.events, is_view).await;
    assert_eq!(
        update,
        SyncEvent::View(ViewMutation::UpdateCell {
            id: "bd-1".into(),
            column: Column::Status,
            value: "closed".into(),
        })
    );
}

#[tokio::test]
async fn fetch_failure_keeps_view_and_reports() {
    let bd = FakeBd::with_records(two_issues());
    let mut h = spawn(bd.clone(), None, slow_options());
    h.handle.start().unwrap();
    next_matching(&mut h.events, is_refreshed).await;

    *bd.failure.lock().unwrap() = Some(FetchError::ExecutionFailed {
        detail: "database is locked".into(),
        status: 1,
    });
    h.handle.force_refresh().unwrap();
    let failed = next_matching(&mut h.events, |e| {
        matches!(e, SyncEvent::Status(StatusNotice::FetchFailed { .. }))
    })
    .await;
    assert_eq!(
        failed,
        SyncEvent::Status(StatusNotice::FetchFailed {
            kind: FetchErrorKind::ExecutionFailed,
            detail: "database is locked".into(),
        })
    );
    let state = h.handle.state().await.unwrap();
    assert_eq!((state.shown, state.total), (2, 2));
    assert!(state.pending);

    *bd.failure.lock().unwrap() = None;
    h.handle.force_refresh().unwrap();
    next_matching(&mut h.events, is_refreshed).await;
}

#[tokio::test]
async fn trigger_during_fetch_is_dropped_and_remembered() {
    let bd = FakeBd::with_records(two_issues());
    let release = bd.gate();
    let mut h = spawn(bd.clone(), None, slow_options());
    h.handle.start().unwrap();
    wait_until_busy(&h.handle).await;

    h.handle.force_refresh().unwrap();
    h.handle.force_refresh().unwrap();
    let state = h.handle.state().await.unwrap();
    assert_eq!(state.fetches, 1);
    assert!(state.pending);

    drop(release);
    next_matching(&mut h.events, is_refreshed).await;
    let state = h.handle.state().await.unwrap();
    assert_eq!(state.fetches, 1, "dropped triggers must not queue fetches");
    assert!(state.pending);
    assert_eq!(bd.fetch_count(), 1);
}

#[tokio::test]
async fn stop_discards_result_of_in_flight_fetch() {
    let bd = FakeBd::with_records(two_issues());
    let release = bd.gate();
    let mut h = spawn(bd.clone(), None, slow_options());
    h.handle.start().unwrap();
    wait_until_busy(&h.handle).await;

    h.handle.stop().unwrap();
    next_matching(&mut h.events, |e| {
        matches!(e, SyncEvent::Status(StatusNotice::Stopped))
    })
    .await;
    drop(release);

    let after_stop = drain_for(&mut h.events, Duration::from_millis(200)).await;
    assert!(after_stop.is_empty(), "stale fetch leaked: {after_stop:?}");
    let state = h.handle.state().await.unwrap();
    assert!(!state.running);
    assert!(!state.busy);
    assert_eq!(state.total, 0);

    h.handle.start().unwrap();
    let rebuild = next_matching(&mut h.events, is_view).await;
    assert!(matches!(rebuild, SyncEvent::View(ViewMutation::RebuildAll { .. })));
}

#[tokio::test]
async fn pause_suppresses_debounced_refresh() {
    let bd = FakeBd::with_records(two_issues());
    let mut h = spawn(bd.clone(), None, fast_poll_options());
    h.handle.start().unwrap();
    next_matching(&mut h.events, is_refreshed).await;

    h.handle.pause().unwrap();
    next_matching(&mut h.events, |e| {
        matches!(e, SyncEvent::Status(StatusNotice::Paused))
    })
    .await;
    let paused_at = bd.fetch_count();

    sleep(Duration::from_millis(200)).await;
    assert_eq!(bd.fetch_count(), paused_at);

    h.handle.resume().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while bd.fetch_count() <= paused_at {
        assert!(Instant::now() < deadline, "no refresh after resume");
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn resume_does_not_force_refresh() {
    let bd = FakeBd::with_records(two_issues());
    let mut h = spawn(bd.clone(), None, slow_options());
    h.handle.start().unwrap();
    next_matching(&mut h.events, is_refreshed).await;

    h.handle.pause().unwrap();
    h.handle.force_refresh().unwrap();
    let state = h.handle.state().await.unwrap();
    assert!(state.paused && state.pending);

    h.handle.resume().unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(bd.fetch_count(), 1);
}

#[tokio::test]
async fn marker_mode_ignores_reads_and_catches_writes() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("beads.db"), "db").unwrap();
    fs::create_dir_all(root.path().join("noms")).unwrap();
    fs::write(root.path().join("noms").join("journal"), "a").unwrap();
    fs::write(root.path().join("noms").join("LOCK"), "").unwrap();

    let bd = FakeBd::with_records(two_issues());
    let options = SchedulerOptions {
        detect_interval: Duration::from_millis(20),
        debounce: Duration::from_millis(20),
        ..slow_options()
    };
    let mut h = spawn(bd.clone(), Some(root.path().to_path_buf()), options);
    h.handle.start().unwrap();

    let started = next_matching(&mut h.events, |_| true).await;
    assert_eq!(
        started,
        SyncEvent::Status(StatusNotice::Started {
            mode: DetectionMode::Marker
        })
    );
    next_matching(&mut h.events, is_refreshed).await;

    // A reader touching the lock file is not a write.
    fs::write(root.path().join("noms").join("LOCK"), "held").unwrap();
    sleep(Duration::from_millis(200)).await;
    assert_eq!(bd.fetch_count(), 1);

    bd.set_status("bd-2", "in_progress", "r2");
    let mut journal = OpenOptions::new()
        .append(true)
        .open(root.path().join("noms").join("journal"))
        .unwrap();
    journal.write_all(b"b").unwrap();
    drop(journal);

    let update = next_matching(&mut h.events, is_view).await;
    assert_eq!(
        update,
        SyncEvent::View(ViewMutation::UpdateCell {
            id: "bd-2".into(),
            column: Column::Status,
            value: "in_progress".into(),
        })
    );
    assert_eq!(bd.fetch_count(), 2);
}

#[tokio::test]
async fn watch_mode_retries_failed_fetch_without_fs_events() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("beads.db"), "db").unwrap();

    let bd = FakeBd::with_records(two_issues());
    *bd.failure.lock().unwrap() = Some(FetchError::ExecutionFailed {
        detail: "database is locked".into(),
        status: 1,
    });
    let options = SchedulerOptions {
        watch: true,
        debounce: Duration::from_millis(20),
        ..slow_options()
    };
    let mut h = spawn(bd.clone(), Some(root.path().to_path_buf()), options);
    h.handle.start().unwrap();

    let started = next_matching(&mut h.events, |_| true).await;
    assert_eq!(
        started,
        SyncEvent::Status(StatusNotice::Started {
            mode: DetectionMode::Watch
        })
    );
    next_matching(&mut h.events, |e| {
        matches!(e, SyncEvent::Status(StatusNotice::FetchFailed { .. }))
    })
    .await;

    *bd.failure.lock().unwrap() = None;
    next_matching(&mut h.events, is_refreshed).await;
    assert!(bd.fetch_count() >= 2);
}

#[tokio::test]
async fn submitted_mutation_is_followed_by_refresh() {
    let bd = FakeBd::with_records(two_issues());
    let mut h = spawn(bd.clone(), None, slow_options());
    h.handle.start().unwrap();
    next_matching(&mut h.events, is_refreshed).await;

    let output = h
        .handle
        .submit(MutationIntent::Close {
            id: "bd-1".into(),
            reason: Some("done".into()),
        })
        .await
        .unwrap();
    assert_eq!(output, "closed bd-1");

    let update = next_matching(&mut h.events, is_view).await;
    assert_eq!(
        update,
        SyncEvent::View(ViewMutation::UpdateCell {
            id: "bd-1".into(),
            column: Column::Status,
            value: "closed".into(),
        })
    );
    assert_eq!(bd.mutations.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn filter_change_rebuilds_without_fetching() {
    let mut records = two_issues();
    records[1].status = "closed".into();
    let bd = FakeBd::with_records(records);
    let mut h = spawn(bd.clone(), None, slow_options());
    h.handle.start().unwrap();
    next_matching(&mut h.events, is_refreshed).await;

    h.handle
        .set_filter(FilterSpec::all().with(Predicate::status_in(["open"])))
        .unwrap();
    match next_matching(&mut h.events, is_view).await {
        SyncEvent::View(ViewMutation::RebuildAll { rows }) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].id.0, "bd-1");
        }
        other => panic!("expected rebuild, got {other:?}"),
    }
    let counts = next_matching(&mut h.events, |_| true).await;
    assert_eq!(
        counts,
        SyncEvent::Status(StatusNotice::Counts { shown: 1, total: 2 })
    );
    assert_eq!(bd.fetch_count(), 1);
}

#[tokio::test]
async fn select_reports_moves_and_unknown_rows() {
    let bd = FakeBd::with_records(two_issues());
    let mut h = spawn(bd.clone(), None, slow_options());
    h.handle.start().unwrap();
    next_matching(&mut h.events, is_refreshed).await;

    h.handle.select("bd-2").await.unwrap();
    assert_eq!(
        next_matching(&mut h.events, is_view).await,
        SyncEvent::View(ViewMutation::SelectionMoved {
            id: "bd-2".into(),
            index: 1,
        })
    );
    let err = h.handle.select("bd-404").await.unwrap_err();
    assert!(matches!(err, LiveError::Reconcile(_)));
}

#[tokio::test]
async fn shutdown_ends_the_task() {
    let bd = FakeBd::with_records(two_issues());
    let h = spawn(bd, None, slow_options());
    h.handle.shutdown().unwrap();
    join_scheduler(h.task).await.unwrap();
    assert!(matches!(
        h.handle.start(),
        Err(LiveError::ChannelClosed(_))
    ));
}
