//! The live refresh loop.
//!
//! One tokio task owns every piece of mutable state: the [`LiveView`], the
//! last write marker, the debouncer, the timers and the in-flight job. The
//! presentation side talks to it through a [`SchedulerHandle`] and receives
//! owned [`SyncEvent`]s on an unbounded channel.

use std::collections::VecDeque;
use std::future::pending;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

use beadview_core::{Column, Record, RecordId, ViewerConfig};
use beadview_detector::{Marker, WriteMarkerDetector};
use beadview_sync::{FilterSpec, LiveView, ReconcileError, SortSpec, ViewMutation};

use crate::debounce::Debouncer;
use crate::error::{FetchError, FetchErrorKind, LiveError};
use crate::executor::{CommandExecutor, MutationIntent};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Timer settings for one scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Try filesystem notifications before falling back to marker polling.
    pub watch: bool,
    pub detect_interval: Duration,
    pub fallback_interval: Duration,
    pub poll_interval: Duration,
    pub debounce: Duration,
}

impl SchedulerOptions {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            watch: config.watch,
            detect_interval: config.detect_interval(),
            fallback_interval: config.fallback_interval(),
            poll_interval: config.poll_interval(),
            debounce: config.debounce(),
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

/// How changes are being noticed. Chosen at every `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Filesystem notifications wake a marker probe; fallback tick as backup.
    Watch,
    /// Marker probe every detect interval; fallback tick as backup.
    Marker,
    /// No usable root: every poll tick refetches.
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusNotice {
    Started {
        mode: DetectionMode,
    },
    Refreshed {
        at: DateTime<Utc>,
        shown: usize,
        total: usize,
        added: usize,
        changed: usize,
        removed: usize,
    },
    /// Filter or sort changed the visible counts without a fetch.
    Counts {
        shown: usize,
        total: usize,
    },
    FetchFailed {
        kind: FetchErrorKind,
        detail: String,
    },
    Paused,
    Resumed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEvent {
    View(ViewMutation),
    Status(StatusNotice),
}

/// Point-in-time view of the scheduler's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerState {
    pub running: bool,
    pub paused: bool,
    /// A change was seen but not yet acted on.
    pub pending: bool,
    /// A fetch or mutation job is in flight.
    pub busy: bool,
    pub mode: Option<DetectionMode>,
    pub generation: u64,
    /// Fetch jobs started since construction.
    pub fetches: u64,
    pub queued_mutations: usize,
    pub shown: usize,
    pub total: usize,
}

type MutationReply = oneshot::Sender<Result<String, FetchError>>;

enum Control {
    Start,
    Stop,
    Pause,
    Resume,
    ForceRefresh,
    SetFilter(FilterSpec),
    SetSort(SortSpec),
    ToggleSort(Column),
    Select {
        id: RecordId,
        respond_to: oneshot::Sender<Result<(), ReconcileError>>,
    },
    Submit {
        intent: MutationIntent,
        respond_to: MutationReply,
    },
    Inspect {
        respond_to: oneshot::Sender<SchedulerState>,
    },
    Shutdown,
}

/// Cloneable control surface. Fire-and-forget calls return as soon as the
/// message is queued.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Control::Start => "start",
            Control::Stop => "stop",
            Control::Pause => "pause",
            Control::Resume => "resume",
            Control::ForceRefresh => "force_refresh",
            Control::SetFilter(_) => "set_filter",
            Control::SetSort(_) => "set_sort",
            Control::ToggleSort(_) => "toggle_sort",
            Control::Select { .. } => "select",
            Control::Submit { .. } => "submit",
            Control::Inspect { .. } => "inspect",
            Control::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

impl SchedulerHandle {
    fn send(&self, msg: Control) -> Result<(), LiveError> {
        self.tx
            .send(msg)
            .map_err(|_| LiveError::ChannelClosed("scheduler control"))
    }

    /// Arm detection and perform an initial refresh.
    pub fn start(&self) -> Result<(), LiveError> {
        self.send(Control::Start)
    }

    /// Cancel timers; a fetch still in flight is discarded when it lands.
    pub fn stop(&self) -> Result<(), LiveError> {
        self.send(Control::Stop)
    }

    pub fn pause(&self) -> Result<(), LiveError> {
        self.send(Control::Pause)
    }

    pub fn resume(&self) -> Result<(), LiveError> {
        self.send(Control::Resume)
    }

    pub fn force_refresh(&self) -> Result<(), LiveError> {
        self.send(Control::ForceRefresh)
    }

    pub fn set_filter(&self, filter: FilterSpec) -> Result<(), LiveError> {
        self.send(Control::SetFilter(filter))
    }

    pub fn set_sort(&self, sort: SortSpec) -> Result<(), LiveError> {
        self.send(Control::SetSort(sort))
    }

    pub fn toggle_sort(&self, key: Column) -> Result<(), LiveError> {
        self.send(Control::ToggleSort(key))
    }

    pub async fn select(&self, id: impl Into<RecordId>) -> Result<(), LiveError> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::Select {
            id: id.into(),
            respond_to: tx,
        })?;
        let outcome = rx
            .await
            .map_err(|_| LiveError::ChannelClosed("select response"))?;
        outcome.map_err(LiveError::from)
    }

    /// Run a write through the scheduler and wait for the command's output.
    /// A refresh follows automatically.
    pub async fn submit(&self, intent: MutationIntent) -> Result<String, LiveError> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::Submit {
            intent,
            respond_to: tx,
        })?;
        let outcome = rx
            .await
            .map_err(|_| LiveError::ChannelClosed("mutation response"))?;
        outcome.map_err(LiveError::from)
    }

    pub async fn state(&self) -> Result<SchedulerState, LiveError> {
        let (tx, rx) = oneshot::channel();
        self.send(Control::Inspect { respond_to: tx })?;
        rx.await
            .map_err(|_| LiveError::ChannelClosed("state response"))
    }

    /// End the scheduler task.
    pub fn shutdown(&self) -> Result<(), LiveError> {
        self.send(Control::Shutdown)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

enum JobOutput {
    Fetched(Result<Vec<Record>, FetchError>),
    Mutated(Result<String, FetchError>),
}

struct InFlight {
    handle: JoinHandle<JobOutput>,
    generation: u64,
    reply: Option<MutationReply>,
}

struct Probe {
    handle: JoinHandle<Option<Marker>>,
    generation: u64,
    baseline: bool,
}

pub struct SyncScheduler {
    executor: Arc<dyn CommandExecutor>,
    detector: WriteMarkerDetector,
    view: LiveView,
    options: SchedulerOptions,
    events: mpsc::UnboundedSender<SyncEvent>,
    control: mpsc::UnboundedReceiver<Control>,

    running: bool,
    paused: bool,
    pending: bool,
    generation: u64,
    fetches: u64,
    mode: Option<DetectionMode>,
    marker: Option<Marker>,
    debouncer: Debouncer,

    detect_tick: Option<Interval>,
    fallback_tick: Option<Interval>,
    watcher: Option<RecommendedWatcher>,
    fs_events: Option<mpsc::UnboundedReceiver<notify::Result<Event>>>,

    probe: Option<Probe>,
    reprobe: bool,
    in_flight: Option<InFlight>,
    /// `start()` found a stale job still running; refresh once it lands.
    refresh_after_job: bool,
    queued: VecDeque<(MutationIntent, MutationReply)>,
}

impl SyncScheduler {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        detector: WriteMarkerDetector,
        view: LiveView,
        options: SchedulerOptions,
    ) -> (Self, SchedulerHandle, mpsc::UnboundedReceiver<SyncEvent>) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::new(options.debounce);
        let scheduler = Self {
            executor,
            detector,
            view,
            options,
            events: event_tx,
            control: control_rx,
            running: false,
            paused: false,
            pending: false,
            generation: 0,
            fetches: 0,
            mode: None,
            marker: None,
            debouncer,
            detect_tick: None,
            fallback_tick: None,
            watcher: None,
            fs_events: None,
            probe: None,
            reprobe: false,
            in_flight: None,
            refresh_after_job: false,
            queued: VecDeque::new(),
        };
        (scheduler, SchedulerHandle { tx: control_tx }, event_rx)
    }

    /// Scheduler wired from a viewer config: detector on the resolved watch
    /// path, view with the configured columns and starting filter.
    pub fn from_config(
        config: &ViewerConfig,
        cwd: &std::path::Path,
        executor: Arc<dyn CommandExecutor>,
    ) -> (Self, SchedulerHandle, mpsc::UnboundedReceiver<SyncEvent>) {
        let root: Option<PathBuf> = Some(config.resolve_watch_path(cwd));
        let detector = WriteMarkerDetector::new(root, &config.classification, config.max_depth);
        Self::new(
            executor,
            detector,
            LiveView::from_config(config),
            SchedulerOptions::from_config(config),
        )
    }

    pub fn spawn(self) -> JoinHandle<Result<(), LiveError>> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> Result<(), LiveError> {
        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                msg = self.control.recv() => {
                    let Some(msg) = msg else { break };
                    if !self.on_control(msg) {
                        break;
                    }
                }
                _ = tick(&mut self.detect_tick) => self.on_detect_tick(),
                _ = tick(&mut self.fallback_tick) => self.on_fallback_tick(),
                _ = sleep_opt(deadline) => self.on_debounce_deadline(),
                event = recv_opt(&mut self.fs_events) => self.on_fs_event(event),
                probed = join_probe(&mut self.probe) => self.on_probe_done(probed),
                outcome = join_in_flight(&mut self.in_flight) => self.on_job_done(outcome),
            }
        }

        if self.running {
            self.halt();
            self.emit(SyncEvent::Status(StatusNotice::Stopped));
        }
        tracing::debug!("scheduler loop exited");
        Ok(())
    }

    // -- control ----------------------------------------------------------

    /// Returns false when the loop should exit.
    fn on_control(&mut self, msg: Control) -> bool {
        tracing::debug!(control = ?msg, "scheduler control");
        match msg {
            Control::Start => self.start(),
            Control::Stop => {
                if self.running {
                    self.halt();
                    self.emit(SyncEvent::Status(StatusNotice::Stopped));
                }
            }
            Control::Pause => {
                if !self.paused {
                    self.paused = true;
                    self.emit(SyncEvent::Status(StatusNotice::Paused));
                }
            }
            Control::Resume => {
                if self.paused {
                    self.paused = false;
                    self.emit(SyncEvent::Status(StatusNotice::Resumed));
                }
            }
            Control::ForceRefresh => {
                if !self.running {
                    tracing::debug!("force refresh ignored: scheduler not started");
                } else if self.paused {
                    self.pending = true;
                } else {
                    self.debouncer.cancel();
                    self.request_refresh("force");
                }
            }
            Control::SetFilter(filter) => {
                let mutations = self.view.set_filter(filter);
                self.emit_view_change(mutations);
            }
            Control::SetSort(sort) => {
                let mutations = self.view.set_sort(sort);
                self.emit_view_change(mutations);
            }
            Control::ToggleSort(key) => {
                let mutations = self.view.toggle_sort(key);
                self.emit_view_change(mutations);
            }
            Control::Select { id, respond_to } => {
                let outcome = self.view.select(&id).map(|mutations| {
                    for mutation in mutations {
                        self.emit(SyncEvent::View(mutation));
                    }
                });
                let _ = respond_to.send(outcome);
            }
            Control::Submit { intent, respond_to } => {
                self.queued.push_back((intent, respond_to));
                self.start_next_mutation();
            }
            Control::Inspect { respond_to } => {
                let _ = respond_to.send(self.state());
            }
            Control::Shutdown => return false,
        }
        true
    }

    fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.generation += 1;
        self.pending = false;
        self.marker = None;

        let mode = self.arm_detection();
        self.mode = Some(mode);
        tracing::info!(
            mode = ?mode,
            root = ?self.detector.root(),
            generation = self.generation,
            "live refresh started",
        );
        self.emit(SyncEvent::Status(StatusNotice::Started { mode }));

        if mode != DetectionMode::Poll {
            self.spawn_probe(true);
        }
        if self.in_flight.is_some() {
            self.refresh_after_job = true;
        } else {
            self.request_refresh("start");
        }
    }

    /// Pick a detection strategy and create its timers.
    fn arm_detection(&mut self) -> DetectionMode {
        if !self.detector.has_usable_root() {
            self.detect_tick = Some(periodic(self.options.poll_interval));
            self.fallback_tick = None;
            return DetectionMode::Poll;
        }

        self.fallback_tick = Some(periodic(self.options.fallback_interval));
        if self.options.watch {
            match self.create_watcher() {
                Ok(()) => {
                    self.detect_tick = None;
                    return DetectionMode::Watch;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "file watcher unavailable, polling write marker");
                }
            }
        }
        self.detect_tick = Some(periodic(self.options.detect_interval));
        DetectionMode::Marker
    }

    fn create_watcher(&mut self) -> Result<(), LiveError> {
        let Some(root) = self.detector.root().map(|p| p.to_path_buf()) else {
            return Err(notify::Error::generic("no watch root configured").into());
        };
        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::debug!(path = %root.display(), "watching store directory");
        self.watcher = Some(watcher);
        self.fs_events = Some(event_rx);
        Ok(())
    }

    /// Drop timers, watcher and debouncer; bump the generation so in-flight
    /// results are discarded.
    fn halt(&mut self) {
        self.running = false;
        self.generation += 1;
        self.pending = false;
        self.mode = None;
        self.debouncer.cancel();
        self.detect_tick = None;
        self.fallback_tick = None;
        self.watcher = None;
        self.fs_events = None;
        self.probe = None;
        self.reprobe = false;
        self.refresh_after_job = false;
        tracing::info!(generation = self.generation, "live refresh stopped");
    }

    fn state(&self) -> SchedulerState {
        SchedulerState {
            running: self.running,
            paused: self.paused,
            pending: self.pending,
            busy: self.in_flight.is_some(),
            mode: self.mode,
            generation: self.generation,
            fetches: self.fetches,
            queued_mutations: self.queued.len(),
            shown: self.view.order().len(),
            total: self.view.snapshot().len(),
        }
    }

    // -- detection --------------------------------------------------------

    fn on_detect_tick(&mut self) {
        self.rearm_if_pending();
        match self.mode {
            Some(DetectionMode::Poll) => self.debouncer.signal(Instant::now()),
            Some(DetectionMode::Marker) => {
                if self.probe.is_none() {
                    self.spawn_probe(false);
                }
            }
            _ => {}
        }
    }

    fn on_fallback_tick(&mut self) {
        tracing::debug!("fallback tick");
        self.pending = false;
        self.debouncer.signal(Instant::now());
    }

    fn rearm_if_pending(&mut self) {
        if self.pending && self.in_flight.is_none() {
            self.pending = false;
            self.debouncer.signal(Instant::now());
        }
    }

    fn on_fs_event(&mut self, event: Option<notify::Result<Event>>) {
        let Some(event) = event else {
            // Watcher dropped its sender; the fallback tick still runs.
            self.fs_events = None;
            return;
        };
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "watcher event error");
                return;
            }
        };
        if !is_relevant_event_kind(&event.kind) {
            return;
        }
        self.rearm_if_pending();
        if self.probe.is_some() {
            self.reprobe = true;
        } else {
            self.spawn_probe(false);
        }
    }

    fn spawn_probe(&mut self, baseline: bool) {
        let detector = self.detector.clone();
        let handle = tokio::task::spawn_blocking(move || detector.probe());
        self.probe = Some(Probe {
            handle,
            generation: self.generation,
            baseline,
        });
    }

    fn on_probe_done(&mut self, probed: Result<Option<Marker>, JoinError>) {
        let Some(probe) = self.probe.take() else {
            return;
        };
        if probe.generation != self.generation {
            return;
        }
        match probed {
            Ok(marker) => {
                if !probe.baseline
                    && WriteMarkerDetector::changed(self.marker.as_ref(), marker.as_ref())
                {
                    if let (Some(prev), Some(curr)) = (&self.marker, &marker) {
                        tracing::debug!(paths = ?prev.changed_paths(curr), "write marker changed");
                    }
                    self.debouncer.signal(Instant::now());
                }
                self.marker = marker;
            }
            Err(err) => tracing::error!(error = %err, "probe task failed"),
        }

        if self.reprobe {
            self.reprobe = false;
            self.spawn_probe(false);
        }
    }

    fn on_debounce_deadline(&mut self) {
        if !self.debouncer.fire_if_due(Instant::now()) {
            return;
        }
        if self.paused {
            tracing::debug!("refresh suppressed while paused");
            self.pending = true;
            return;
        }
        self.request_refresh("debounce");
    }

    // -- jobs -------------------------------------------------------------

    fn request_refresh(&mut self, reason: &'static str) {
        if self.in_flight.is_some() {
            tracing::debug!(reason, "refresh dropped: job in flight");
            self.pending = true;
            return;
        }
        self.fetches += 1;
        tracing::debug!(reason, fetch = self.fetches, "fetching snapshot");
        let executor = Arc::clone(&self.executor);
        let handle = tokio::task::spawn_blocking(move || JobOutput::Fetched(executor.fetch_all()));
        self.in_flight = Some(InFlight {
            handle,
            generation: self.generation,
            reply: None,
        });
    }

    fn start_next_mutation(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some((intent, reply)) = self.queued.pop_front() else {
            return;
        };
        tracing::info!(intent = ?intent, "applying mutation");
        let executor = Arc::clone(&self.executor);
        let handle = tokio::task::spawn_blocking(move || JobOutput::Mutated(executor.mutate(&intent)));
        self.in_flight = Some(InFlight {
            handle,
            generation: self.generation,
            reply: Some(reply),
        });
    }

    fn on_job_done(&mut self, outcome: Result<JobOutput, JoinError>) {
        let Some(job) = self.in_flight.take() else {
            return;
        };
        let current = job.generation == self.generation;

        match outcome {
            Ok(JobOutput::Fetched(result)) if current => self.apply_fetch(result),
            Ok(JobOutput::Fetched(_)) => {
                tracing::debug!(
                    generation = job.generation,
                    "discarding fetch from a stopped session"
                );
            }
            Ok(JobOutput::Mutated(result)) => {
                let succeeded = result.is_ok();
                if let Err(err) = &result {
                    tracing::warn!(error = %err, "mutation failed");
                }
                if let Some(reply) = job.reply {
                    let _ = reply.send(result);
                }
                if succeeded && self.running {
                    if self.paused {
                        self.pending = true;
                    } else {
                        self.request_refresh("mutation");
                    }
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "job task failed");
                if let Some(reply) = job.reply {
                    let _ = reply.send(Err(FetchError::ExecutionFailed {
                        detail: format!("task join failure: {err}"),
                        status: -1,
                    }));
                } else if current {
                    self.pending = true;
                }
            }
        }

        if self.refresh_after_job && self.running {
            self.refresh_after_job = false;
            self.request_refresh("start");
        }
        self.start_next_mutation();
        // Watch mode has no detect tick to retry a failed or dropped fetch.
        if self.mode == Some(DetectionMode::Watch) && self.running && !self.paused {
            self.rearm_if_pending();
        }
    }

    fn apply_fetch(&mut self, result: Result<Vec<Record>, FetchError>) {
        match result {
            Ok(records) => {
                let refresh = self.view.apply_fetch(records);
                tracing::info!(
                    shown = refresh.shown,
                    total = refresh.total,
                    added = refresh.changes.added.len(),
                    changed = refresh.changes.changed.len(),
                    removed = refresh.changes.removed.len(),
                    mutations = refresh.mutations.len(),
                    "refreshed",
                );
                for mutation in refresh.mutations {
                    self.emit(SyncEvent::View(mutation));
                }
                self.emit(SyncEvent::Status(StatusNotice::Refreshed {
                    at: Utc::now(),
                    shown: refresh.shown,
                    total: refresh.total,
                    added: refresh.changes.added.len(),
                    changed: refresh.changes.changed.len(),
                    removed: refresh.changes.removed.len(),
                }));
            }
            Err(err) => {
                tracing::warn!(kind = %err.kind(), error = %err, "fetch failed, keeping previous view");
                self.pending = true;
                self.emit(SyncEvent::Status(StatusNotice::FetchFailed {
                    kind: err.kind(),
                    detail: err.detail().to_string(),
                }));
            }
        }
    }

    // -- events -----------------------------------------------------------

    fn emit(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }

    fn emit_view_change(&self, mutations: Vec<ViewMutation>) {
        if mutations.is_empty() {
            return;
        }
        for mutation in mutations {
            self.emit(SyncEvent::View(mutation));
        }
        self.emit(SyncEvent::Status(StatusNotice::Counts {
            shown: self.view.order().len(),
            total: self.view.snapshot().len(),
        }));
    }
}

/// Await a scheduler task spawned with [`SyncScheduler::spawn`].
pub async fn join_scheduler(handle: JoinHandle<Result<(), LiveError>>) -> Result<(), LiveError> {
    match handle.await {
        Ok(inner) => inner,
        Err(err) => Err(LiveError::Join(err.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Select helpers
// ---------------------------------------------------------------------------

fn periodic(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn tick(interval: &mut Option<Interval>) -> Instant {
    match interval {
        Some(interval) => interval.tick().await,
        None => pending().await,
    }
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn recv_opt<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn join_probe(slot: &mut Option<Probe>) -> Result<Option<Marker>, JoinError> {
    match slot {
        Some(probe) => (&mut probe.handle).await,
        None => pending().await,
    }
}

async fn join_in_flight(slot: &mut Option<InFlight>) -> Result<JobOutput, JoinError> {
    match slot {
        Some(job) => (&mut job.handle).await,
        None => pending().await,
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn access_events_are_ignored() {
        assert!(!is_relevant_event_kind(&EventKind::Access(AccessKind::Any)));
        assert!(is_relevant_event_kind(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant_event_kind(&EventKind::Modify(ModifyKind::Any)));
    }

    #[test]
    fn options_follow_config() {
        let mut config = ViewerConfig::default();
        config.debounce_ms = 42;
        config.watch = false;
        let options = SchedulerOptions::from_config(&config);
        assert_eq!(options.debounce, Duration::from_millis(42));
        assert!(!options.watch);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn periodic_skips_the_immediate_tick() {
        let started = Instant::now();
        let mut interval = Some(periodic(Duration::from_millis(100)));
        let fired = tick(&mut interval).await;
        assert!(fired >= started + Duration::from_millis(100));
    }

    struct EmptyBd;

    impl CommandExecutor for EmptyBd {
        fn fetch_all(&self) -> Result<Vec<Record>, FetchError> {
            Ok(Vec::new())
        }

        fn mutate(&self, _intent: &MutationIntent) -> Result<String, FetchError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn join_failure_keeps_queued_rescan() {
        let (mut scheduler, _handle, _events) = SyncScheduler::new(
            Arc::new(EmptyBd),
            WriteMarkerDetector::new(None, &Default::default(), 1),
            LiveView::new(Default::default(), Column::DEFAULT),
            SchedulerOptions::from_config(&ViewerConfig::default()),
        );
        scheduler.probe = Some(Probe {
            handle: tokio::task::spawn_blocking(|| None),
            generation: scheduler.generation,
            baseline: false,
        });
        scheduler.reprobe = true;

        let join_err = tokio::spawn(async { panic!("marker scan panicked") })
            .await
            .unwrap_err();
        scheduler.on_probe_done(Err(join_err));

        assert!(!scheduler.reprobe);
        assert!(scheduler.probe.is_some(), "queued rescan was dropped");
    }

    #[test]
    fn absent_sources_never_resolve() {
        let mut idle_tick: Option<Interval> = None;
        let mut tick_fut = tokio_test::task::spawn(tick(&mut idle_tick));
        tokio_test::assert_pending!(tick_fut.poll());

        let mut deadline = tokio_test::task::spawn(sleep_opt(None));
        tokio_test::assert_pending!(deadline.poll());

        let mut no_events: Option<mpsc::UnboundedReceiver<u8>> = None;
        let mut recv = tokio_test::task::spawn(recv_opt(&mut no_events));
        tokio_test::assert_pending!(recv.poll());
    }

    #[tokio::test]
    async fn present_receiver_is_polled() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = Some(rx);
        tx.send(7u8).unwrap();
        assert_eq!(recv_opt(&mut slot).await, Some(7));
    }
}
