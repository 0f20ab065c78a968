//! Session Controller (spec §4.5, C5): owns the Ring Buffer, Driver, and
//! Sender exclusively with downward-only callbacks (Design Notes, "Cyclic
//! references"); drives the connect → stream → reconnect state machine;
//! exposes `start`/`stop` and a statistics snapshot.
//!
//! Shape borrowed from the teacher's `Pipeline` (state behind a
//! `std::sync::Mutex`, an `mpsc::unbounded_channel` of events consumed by
//! the caller, `tokio::spawn` for the long-running work) with the
//! command/event split generalized from `enscrypted-gecko`'s
//! `gecko_core::message::{Command, Event}` shape, since a resumable
//! multi-reconnect session needs more lifecycle events than the teacher's
//! single-recording-cycle `PipelineEvent`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::buffer::ring::{ring_buffer, Consumer, Producer};
use crate::chunker::{Chunk, Chunker};
use crate::config::AppConfig;
use crate::driver::{self, AudioConfig, Driver, ErrorSlot};
use crate::error::{CoreError, DeviceError};
use crate::sender::{InboundEvent, Sender};
use crate::vad::{GateEvent, VadDetector, VadGate};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Session lifecycle state (spec §3 Session, §4.5 state machine table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Reconnecting,
    Stopped,
}

/// Why the controller's background tasks finally wound down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// `stop()` was called by the user.
    UserRequested,
    /// Reconnect attempts were exhausted (`reconnect.max_retries`).
    PermanentFailure,
}

/// Lifecycle and diagnostic events forwarded to the caller (spec §4.5
/// statistics, §4.4 inbound replies, §7 structured event callback).
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StateChanged(SessionState),
    /// An opaque transcription reply forwarded verbatim (spec §4.4: "Reply
    /// parsing (JSON) is delegated to the sink").
    Reply(String),
    /// A recoverable error was handled locally; surfaced for logging only.
    Error(String),
    /// The network task's own run loop ended — either because `stop()`
    /// was already called, or because reconnect attempts were exhausted
    /// (spec §8 scenario 5). A caller that isn't already waiting on
    /// `stop()` (e.g. the CLI idling in its signal/test-duration select)
    /// needs this to learn the session ended on its own.
    Stopped(StopOutcome),
}

#[derive(Default)]
struct StatsInner {
    chunks_sent: AtomicU64,
    bytes_sent: AtomicU64,
    reconnects: AtomicU32,
    errors: AtomicU32,
    last_chunk_to_wire_ms: AtomicU64,
}

/// Point-in-time statistics snapshot (spec §4.5 Statistics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatsSnapshot {
    pub session_id: Option<String>,
    pub state: SessionState,
    pub uptime_ms: u64,
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub reconnects: u32,
    pub errors: u32,
    pub ring_fill_pct: f32,
    pub ring_overrun_bytes: u64,
    /// Most recently observed capture-timestamp-to-wire-send latency.
    /// Per-callback instrumentation is deliberately not attempted — adding
    /// timestamps to the real-time path would violate I1.
    pub last_chunk_to_wire_ms: u64,
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn new_session_id() -> String {
    let mut rng = rand::thread_rng();
    format!("sess-{:016x}", rng.gen::<u64>())
}

fn set_state(
    state: &Arc<Mutex<SessionState>>,
    event_tx: &mpsc::UnboundedSender<ControllerEvent>,
    new_state: SessionState,
) {
    let mut guard = state.lock().unwrap();
    if *guard != new_state {
        *guard = new_state;
        let _ = event_tx.send(ControllerEvent::StateChanged(new_state));
    }
}

/// Owns the whole ingestion pipeline for one session. One controller
/// instance drives exactly one session; a fresh `start()` on a
/// newly-constructed controller mints a new session id (spec: "a new
/// session is minted on user start, not on reconnect").
pub struct SessionController {
    config: AppConfig,
    state: Arc<Mutex<SessionState>>,
    stats: Arc<StatsInner>,
    session_id: Arc<Mutex<Option<String>>>,
    started_at: Arc<Mutex<Option<Instant>>>,
    ring_producer: Option<Arc<Producer>>,
    driver: Option<Arc<Mutex<Box<dyn Driver>>>>,
    stop_tx: Option<watch::Sender<bool>>,
    consumer_task: Option<JoinHandle<()>>,
    network_task: Option<JoinHandle<StopOutcome>>,
    device_watcher_task: Option<JoinHandle<()>>,
    event_tx: mpsc::UnboundedSender<ControllerEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<ControllerEvent>>,
    last_stop_outcome: Option<StopOutcome>,
}

impl SessionController {
    pub fn new(config: AppConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            config,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            stats: Arc::new(StatsInner::default()),
            session_id: Arc::new(Mutex::new(None)),
            started_at: Arc::new(Mutex::new(None)),
            ring_producer: None,
            driver: None,
            stop_tx: None,
            consumer_task: None,
            network_task: None,
            device_watcher_task: None,
            event_tx,
            event_rx: Some(event_rx),
            last_stop_outcome: None,
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<ControllerEvent>> {
        self.event_rx.take()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn last_stop_outcome(&self) -> Option<StopOutcome> {
        self.last_stop_outcome
    }

    pub fn stats(&self) -> SessionStatsSnapshot {
        let uptime_ms = self
            .started_at
            .lock()
            .unwrap()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let (ring_fill_pct, ring_overrun_bytes) = match &self.ring_producer {
            Some(producer) => {
                let stats = producer.stats();
                let capacity = self.config.ring_capacity_bytes().max(1) as f32;
                (
                    stats.current_fill_bytes as f32 / capacity * 100.0,
                    stats.bytes_overwritten,
                )
            }
            None => (0.0, 0),
        };
        SessionStatsSnapshot {
            session_id: self.session_id.lock().unwrap().clone(),
            state: self.state(),
            uptime_ms,
            chunks_sent: self.stats.chunks_sent.load(Ordering::Relaxed),
            bytes_sent: self.stats.bytes_sent.load(Ordering::Relaxed),
            reconnects: self.stats.reconnects.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            ring_fill_pct,
            ring_overrun_bytes,
            last_chunk_to_wire_ms: self.stats.last_chunk_to_wire_ms.load(Ordering::Relaxed),
        }
    }

    /// Starts a new session: builds the ring buffer, starts the device
    /// driver, and spawns the consumer, network, and device-watcher tasks.
    pub async fn start(&mut self) -> Result<(), CoreError> {
        self.config.validate()?;
        if !matches!(
            self.state(),
            SessionState::Idle | SessionState::Stopped
        ) {
            return Err(CoreError::Internal(
                "session is already running".to_string(),
            ));
        }

        let session_id = new_session_id();
        log::info!("starting session {session_id}");
        *self.session_id.lock().unwrap() = Some(session_id.clone());
        *self.started_at.lock().unwrap() = Some(Instant::now());
        self.last_stop_outcome = None;

        let vad_detector = if self.config.vad.enabled {
            Some(
                VadDetector::new(self.config.sample_rate, self.config.vad.clone())
                    .map_err(CoreError::Internal)?,
            )
        } else {
            None
        };
        let gate = VadGate::new(self.config.sample_rate, self.config.vad.clone(), vad_detector);
        // Flushing a chunk on every VAD segment boundary is only useful
        // when VAD gating is actually separating utterances; with VAD
        // disabled the chunker's own size-based emission is the only
        // boundary that matters (Open Question resolution, see DESIGN.md).
        let flush_on_boundary = self.config.vad.enabled;
        let chunker = Chunker::new(
            session_id.clone(),
            self.config.sample_rate,
            self.config.chunk_size_bytes(),
            flush_on_boundary,
        );

        let (producer, consumer) = ring_buffer(self.config.ring_capacity_bytes());
        let producer = Arc::new(producer);

        let mut driver = driver::factory::build(self.config.driver)?;
        let audio_config = AudioConfig::from_app_config(&self.config);
        let errors = ErrorSlot::new();
        let cb_producer = producer.clone();
        let on_frame = Arc::new(move |samples: &[i16]| {
            cb_producer.push_samples(samples);
        });
        driver.start(
            audio_config,
            self.config.device_id.as_deref(),
            on_frame,
            errors.clone(),
        )?;
        let driver = Arc::new(Mutex::new(driver));

        let (stop_tx, stop_rx) = watch::channel(false);
        let (chunk_tx, chunk_rx) = mpsc::channel::<Chunk>(8);

        let consumer_task = tokio::spawn(run_consumer(
            consumer,
            gate,
            chunker,
            chunk_tx,
            stop_rx.clone(),
        ));

        set_state(&self.state, &self.event_tx, SessionState::Connecting);
        let network_config = self.config.clone();
        let network_state = self.state.clone();
        let network_stats = self.stats.clone();
        let network_stop_rx = stop_rx.clone();
        let network_event_tx = self.event_tx.clone();
        let network_session_id = session_id.clone();
        let network_task = tokio::spawn(async move {
            let outcome = run_network(
                network_config,
                network_session_id,
                network_state,
                network_stats,
                chunk_rx,
                network_stop_rx,
                network_event_tx.clone(),
            )
            .await;
            // Surfaced so a caller that isn't already blocked inside
            // `stop()` (e.g. the CLI idling on ctrl_c/test-duration)
            // still learns the session ended on its own (spec §8
            // scenario 5: permanent failure must exit, not hang).
            let _ = network_event_tx.send(ControllerEvent::Stopped(outcome));
            outcome
        });

        let device_watcher_task = tokio::spawn(run_device_watcher(
            errors,
            driver.clone(),
            audio_config,
            self.config.device_id.clone(),
            producer.clone(),
            self.config.reconnect.clone(),
            self.stats.clone(),
            stop_rx,
        ));

        self.ring_producer = Some(producer);
        self.driver = Some(driver);
        self.stop_tx = Some(stop_tx);
        self.consumer_task = Some(consumer_task);
        self.network_task = Some(network_task);
        self.device_watcher_task = Some(device_watcher_task);
        Ok(())
    }

    /// Stops the session within `stop_timeout_ms` (spec §4.5
    /// Cancellation, I5). Idempotent: calling `stop()` on an idle or
    /// already-stopped controller is a no-op.
    pub async fn stop(&mut self) -> Result<(), CoreError> {
        if matches!(self.state(), SessionState::Idle | SessionState::Stopped) {
            return Ok(());
        }

        if let Some(tx) = &self.stop_tx {
            let _ = tx.send(true);
        }

        // Release the device before returning to the caller (I5), even if
        // the background tasks haven't wound down yet.
        if let Some(driver) = &self.driver {
            driver.lock().unwrap().stop();
        }

        let timeout = Duration::from_millis(self.config.stop_timeout_ms);
        let consumer_task = self.consumer_task.take();
        let network_task = self.network_task.take();
        let device_watcher_task = self.device_watcher_task.take();

        let joined = tokio::time::timeout(timeout, async {
            if let Some(handle) = consumer_task {
                let _ = handle.await;
            }
            let outcome = match network_task {
                Some(handle) => handle.await.ok(),
                None => None,
            };
            if let Some(handle) = device_watcher_task {
                let _ = handle.await;
            }
            outcome
        })
        .await;

        match joined {
            Ok(outcome) => self.last_stop_outcome = outcome,
            Err(_) => {
                log::warn!("stop timed out after {timeout:?}; abandoning background tasks");
                self.last_stop_outcome = Some(StopOutcome::UserRequested);
            }
        }

        set_state(&self.state, &self.event_tx, SessionState::Stopped);
        self.stop_tx = None;
        Ok(())
    }
}

/// Consumer task (spec §5): awaits bytes from the ring buffer, feeds the
/// VAD gate and chunker, and offers completed chunks to the network task.
/// Runs for the full lifetime of the session — unlike the transport,
/// which is rebuilt on every reconnect, the chunker here is not, so
/// sequence numbers stay monotone across reconnects (I3).
async fn run_consumer(
    mut consumer: Consumer,
    mut gate: VadGate,
    mut chunker: Chunker,
    chunk_tx: mpsc::Sender<Chunk>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            bytes = consumer.pop_up_to(8192) => {
                if bytes.is_empty() {
                    break;
                }
                feed(&mut gate, &mut chunker, &bytes, &chunk_tx).await;
            }
        }
    }

    // Drain whatever is left, then terminate the in-progress segment and
    // flush the final chunk (spec §4.3 edge case, §4.4(c)).
    consumer.close();
    let remaining = consumer.pop_up_to(usize::MAX).await;
    if !remaining.is_empty() {
        feed(&mut gate, &mut chunker, &remaining, &chunk_tx).await;
    }
    if let Some(output) = gate.flush() {
        if !output.bytes.is_empty() {
            for chunk in chunker.push(&output.bytes, now_unix_ms()) {
                let _ = chunk_tx.send(chunk).await;
            }
        }
    }
    if let Some(chunk) = chunker.finish(now_unix_ms()) {
        let _ = chunk_tx.send(chunk).await;
    }
}

async fn feed(gate: &mut VadGate, chunker: &mut Chunker, bytes: &[u8], chunk_tx: &mpsc::Sender<Chunk>) {
    for output in gate.push(bytes) {
        if !output.bytes.is_empty() {
            for chunk in chunker.push(&output.bytes, now_unix_ms()) {
                let _ = chunk_tx.send(chunk).await;
            }
        }
        if output.event == GateEvent::SegmentEnded {
            if let Some(chunk) = chunker.on_segment_boundary(now_unix_ms()) {
                let _ = chunk_tx.send(chunk).await;
            }
        }
    }
}

/// Network task (spec §4.5, §5): drives connect → stream → reconnect,
/// owns the transport exclusively, and forwards inbound replies. The
/// write half (chunks + heartbeats) and read half (inbound replies) run
/// concurrently off `Sender::split_mut`'s disjoint borrows — the spec's
/// "performs writes ... and reads inbound messages concurrently".
async fn run_network(
    config: AppConfig,
    session_id: String,
    state: Arc<Mutex<SessionState>>,
    stats: Arc<StatsInner>,
    mut chunk_rx: mpsc::Receiver<Chunk>,
    mut stop_rx: watch::Receiver<bool>,
    event_tx: mpsc::UnboundedSender<ControllerEvent>,
) -> StopOutcome {
    let mut attempt: u32 = 0;
    let heartbeat = Duration::from_millis(config.heartbeat_ms);

    'outer: loop {
        if *stop_rx.borrow() {
            break 'outer StopOutcome::UserRequested;
        }

        set_state(&state, &event_tx, SessionState::Connecting);
        let connect_result = tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break 'outer StopOutcome::UserRequested;
                }
                continue 'outer;
            }
            result = Sender::connect(&config.ws_url, CONNECT_TIMEOUT) => result,
        };
        let mut sender = match connect_result {
            Ok(sender) => {
                attempt = 0;
                log::info!("session {session_id} connected");
                sender
            }
            Err(e) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                let _ = event_tx.send(ControllerEvent::Error(e.to_string()));
                if config.reconnect.retries_exhausted(attempt) {
                    break 'outer StopOutcome::PermanentFailure;
                }
                set_state(&state, &event_tx, SessionState::Reconnecting);
                let delay = config.reconnect.delay_for_attempt(attempt);
                attempt += 1;
                stats.reconnects.fetch_add(1, Ordering::Relaxed);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break 'outer StopOutcome::UserRequested;
                        }
                    }
                }
                continue 'outer;
            }
        };

        set_state(&state, &event_tx, SessionState::Streaming);
        let mut last_activity = Instant::now();
        let (sink, stream) = sender.split_mut();

        let fault = 'inner: loop {
            let heartbeat_wait = heartbeat.saturating_sub(last_activity.elapsed());
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        // The consumer task only starts assembling the
                        // final chunk after it too observes this same
                        // stop signal (drain the ring buffer, flush the
                        // VAD gate, `Chunker::finish`), so it is very
                        // likely still in flight. Drain whatever arrives
                        // on `chunk_rx` — including that final chunk —
                        // before tearing down the transport, so P1's
                        // "exactly one chunk has `is_final=true`" holds
                        // across a stop too, not just a clean finish.
                        let mut drain_fault = None;
                        while let Some(chunk) = chunk_rx.recv().await {
                            let is_final = chunk.is_final;
                            let len = chunk.payload.len() as u64;
                            let captured_at = chunk.captured_at_unix_ms;
                            match Sender::send_chunk(sink, &chunk, SEND_TIMEOUT).await {
                                Ok(()) => {
                                    stats.chunks_sent.fetch_add(1, Ordering::Relaxed);
                                    stats.bytes_sent.fetch_add(len, Ordering::Relaxed);
                                    let now = now_unix_ms();
                                    stats
                                        .last_chunk_to_wire_ms
                                        .store(now.saturating_sub(captured_at), Ordering::Relaxed);
                                    if is_final {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    drain_fault = Some(e.to_string());
                                    break;
                                }
                            }
                        }
                        break 'inner drain_fault;
                    }
                }
                maybe_chunk = chunk_rx.recv() => {
                    match maybe_chunk {
                        Some(chunk) => {
                            let is_final = chunk.is_final;
                            let len = chunk.payload.len() as u64;
                            let captured_at = chunk.captured_at_unix_ms;
                            match Sender::send_chunk(sink, &chunk, SEND_TIMEOUT).await {
                                Ok(()) => {
                                    stats.chunks_sent.fetch_add(1, Ordering::Relaxed);
                                    stats.bytes_sent.fetch_add(len, Ordering::Relaxed);
                                    let now = now_unix_ms();
                                    stats
                                        .last_chunk_to_wire_ms
                                        .store(now.saturating_sub(captured_at), Ordering::Relaxed);
                                    last_activity = Instant::now();
                                    if is_final {
                                        break 'inner None;
                                    }
                                }
                                Err(e) => break 'inner Some(e.to_string()),
                            }
                        }
                        None => break 'inner None,
                    }
                }
                inbound = Sender::next_inbound(stream, READ_IDLE_TIMEOUT) => {
                    match inbound {
                        Ok(InboundEvent::Reply(text)) => {
                            let _ = event_tx.send(ControllerEvent::Reply(text));
                        }
                        Ok(InboundEvent::BinaryIgnored) => {}
                        Ok(InboundEvent::Closed) => break 'inner Some("peer closed connection".to_string()),
                        Err(e) => break 'inner Some(e.to_string()),
                    }
                }
                _ = tokio::time::sleep(heartbeat_wait) => {
                    if let Err(e) = Sender::send_heartbeat(sink).await {
                        break 'inner Some(e.to_string());
                    }
                    last_activity = Instant::now();
                }
            }
        };

        match fault {
            None if *stop_rx.borrow() => {
                let _ = sender.close(1001, "stopping").await;
                break 'outer StopOutcome::UserRequested;
            }
            None => {
                // Final chunk was sent to completion without a stop signal
                // racing in; treat as a clean end of the session.
                let _ = sender.close(1000, "done").await;
                break 'outer StopOutcome::UserRequested;
            }
            Some(reason) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                let _ = event_tx.send(ControllerEvent::Error(reason));
                let _ = sender.close(1011, "internal error").await;
                set_state(&state, &event_tx, SessionState::Reconnecting);
                if config.reconnect.retries_exhausted(attempt) {
                    break 'outer StopOutcome::PermanentFailure;
                }
                let delay = config.reconnect.delay_for_attempt(attempt);
                attempt += 1;
                stats.reconnects.fetch_add(1, Ordering::Relaxed);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break 'outer StopOutcome::UserRequested;
                        }
                    }
                }
            }
        }
    }
}

/// Watches the driver's single-slot error channel for mid-session device
/// faults (spec §7: "`DeviceLost` mid-session triggers reconnect-style
/// recovery (restart driver with backoff)"), distinct from transport
/// reconnects: only the driver is torn down and rebuilt here, the
/// network connection and chunker are untouched.
#[allow(clippy::too_many_arguments)]
async fn run_device_watcher(
    errors: ErrorSlot,
    driver: Arc<Mutex<Box<dyn Driver>>>,
    audio_config: AudioConfig,
    device_id: Option<String>,
    producer: Arc<Producer>,
    reconnect: crate::config::ReconnectConfig,
    stats: Arc<StatsInner>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    return;
                }
            }
            err = errors.recv() => {
                log::error!("device error mid-session, restarting driver: {err}");
                stats.errors.fetch_add(1, Ordering::Relaxed);
                driver.lock().unwrap().stop();

                let mut attempt = 0u32;
                loop {
                    if *stop_rx.borrow() {
                        return;
                    }
                    let delay = reconnect.delay_for_attempt(attempt);
                    attempt += 1;
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = stop_rx.changed() => {
                            if changed.is_err() || *stop_rx.borrow() {
                                return;
                            }
                        }
                    }

                    let cb_producer = producer.clone();
                    let on_frame = Arc::new(move |samples: &[i16]| {
                        cb_producer.push_samples(samples);
                    });
                    let restart = driver.lock().unwrap().start(
                        audio_config,
                        device_id.as_deref(),
                        on_frame,
                        errors.clone(),
                    );
                    match restart {
                        Ok(()) => {
                            stats.reconnects.fetch_add(1, Ordering::Relaxed);
                            break;
                        }
                        Err(e) => {
                            log::error!("driver restart attempt {attempt} failed: {e}");
                        }
                    }
                }
            }
        }
    }
}

/// Maps a [`DeviceError`] encountered at session start to the process
/// exit code documented in spec §6: every device-category failure at
/// startup is reported as "device unavailable".
pub fn device_error_exit_code(_err: &DeviceError) -> i32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_ids_are_distinct() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
        assert!(a.starts_with("sess-"));
    }

    #[tokio::test]
    async fn controller_starts_idle_and_rejects_double_start() {
        let mut config = AppConfig::default();
        config.ws_url = "ws://127.0.0.1:1".to_string();
        config.driver = crate::config::DriverKind::Synthetic;
        config.device_id = Some("silence".to_string());
        let controller = SessionController::new(config);
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn stats_snapshot_defaults_to_zero() {
        let mut config = AppConfig::default();
        config.ws_url = "ws://localhost".to_string();
        let controller = SessionController::new(config);
        let stats = controller.stats();
        assert_eq!(stats.chunks_sent, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.reconnects, 0);
        assert_eq!(stats.errors, 0);
    }
}
