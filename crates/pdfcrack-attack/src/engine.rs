//! Concurrent attack engine: one candidate source, N verification workers.
//!
//! A producer thread pulls candidates from the source into a bounded queue; workers pull from
//! the queue, verify, and count every attempt in one shared atomic counter. The first worker to
//! verify a candidate publishes it into a single-assignment cell and cancels the run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use pdfcrack_security::{
    BatchVerifier, EncryptionParameters, PasswordVerifier, SecurityError, StandardSecurityHandler,
};

use crate::cancel::CancellationToken;
use crate::source::{CandidateSource, SourceError};

pub const DEFAULT_QUEUE_DEPTH: usize = 10_000;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000;

/// Tunables for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackConfig {
    /// Worker threads; 0 means the available hardware parallelism.
    pub workers: usize,
    /// Capacity of the producer queue.
    pub queue_depth: usize,
    /// Emit a progress snapshot every this many attempts.
    pub progress_interval: u64,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl AttackConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Snapshot handed to progress observers.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub attempts: u64,
    /// Attempts per second since the run started.
    pub rate: f64,
    /// Most recently verified candidate, decoded lossily for display.
    pub current: String,
    pub elapsed: Duration,
}

pub type ProgressObserver = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Found,
    Exhausted,
    Cancelled,
    SourceFailed,
}

/// Result of one engine run.
#[derive(Debug, Clone)]
pub struct AttackOutcome {
    pub found: bool,
    /// The password bytes exactly as the source produced them.
    pub password: Option<Vec<u8>>,
    /// Every verification performed during the run, winners included.
    pub attempts: u64,
    pub elapsed: Duration,
    pub termination: Termination,
    /// Set when the source failed; candidates produced before the failure were still tried.
    pub error: Option<Arc<SourceError>>,
}

impl AttackOutcome {
    pub(crate) fn source_failed(error: SourceError) -> Self {
        Self {
            found: false,
            password: None,
            attempts: 0,
            elapsed: Duration::ZERO,
            termination: Termination::SourceFailed,
            error: Some(Arc::new(error)),
        }
    }

    /// Attempts per second over the whole run.
    pub fn rate(&self) -> f64 {
        attempts_per_second(self.attempts, self.elapsed)
    }
}

/// What a worker gets from [`CandidateQueue::pull`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pull {
    Candidate(Vec<u8>),
    /// The producer finished and the queue is drained.
    Exhausted,
    Cancelled,
}

/// Consumer side of the producer queue.
pub(crate) struct CandidateQueue {
    receiver: Receiver<Vec<u8>>,
    cancel: CancellationToken,
}

impl CandidateQueue {
    pub(crate) fn new(receiver: Receiver<Vec<u8>>, cancel: CancellationToken) -> Self {
        Self { receiver, cancel }
    }

    /// Block until a candidate is available, the producer is done, or the run is cancelled.
    pub(crate) fn pull(&self) -> Pull {
        if self.cancel.is_cancelled() {
            return Pull::Cancelled;
        }
        select! {
            recv(self.receiver) -> msg => match msg {
                Ok(candidate) => Pull::Candidate(candidate),
                Err(_) => Pull::Exhausted,
            },
            recv(self.cancel.signal()) -> _ => Pull::Cancelled,
        }
    }
}

fn produce<S: CandidateSource>(
    source: &mut S,
    sender: Sender<Vec<u8>>,
    cancel: &CancellationToken,
) -> Result<(), SourceError> {
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let Some(candidate) = source.next_candidate()? else {
            return Ok(());
        };
        select! {
            send(sender, candidate) -> sent => {
                if sent.is_err() {
                    return Ok(());
                }
            }
            recv(cancel.signal()) -> _ => return Ok(()),
        }
    }
}

/// Per-run shared state.
struct RunState {
    started: Instant,
    attempts: AtomicU64,
    winner: OnceLock<Vec<u8>>,
    finished: OnceLock<Duration>,
    progress_gate: Mutex<()>,
}

impl RunState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            attempts: AtomicU64::new(0),
            winner: OnceLock::new(),
            finished: OnceLock::new(),
            progress_gate: Mutex::new(()),
        }
    }

    /// First caller wins; later matches are counted but not reported.
    fn publish(&self, password: Vec<u8>) -> bool {
        if self.winner.set(password).is_ok() {
            let _ = self.finished.set(self.started.elapsed());
            true
        } else {
            false
        }
    }

    fn outcome(
        self,
        cancel: &CancellationToken,
        source_result: Result<(), SourceError>,
    ) -> AttackOutcome {
        let attempts = self.attempts.load(Ordering::SeqCst);
        let elapsed = self
            .finished
            .get()
            .copied()
            .unwrap_or_else(|| self.started.elapsed());
        let password = self.winner.into_inner();
        let error = source_result.err().map(Arc::new);
        let termination = if password.is_some() {
            Termination::Found
        } else if error.is_some() {
            Termination::SourceFailed
        } else if cancel.is_cancelled() {
            Termination::Cancelled
        } else {
            Termination::Exhausted
        };
        AttackOutcome {
            found: password.is_some(),
            password,
            attempts,
            elapsed,
            termination,
            error,
        }
    }
}

/// `attempts / elapsed`, or 0 when no time has passed.
pub fn attempts_per_second(attempts: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        attempts as f64 / secs
    } else {
        0.0
    }
}

/// Drives candidate sources through a pool of verification workers.
#[derive(Clone)]
pub struct AttackEngine {
    verifier: Arc<dyn PasswordVerifier>,
    config: AttackConfig,
    observer: Option<ProgressObserver>,
}

impl AttackEngine {
    pub fn new(verifier: Arc<dyn PasswordVerifier>, config: AttackConfig) -> Self {
        Self {
            verifier,
            config,
            observer: None,
        }
    }

    /// Engine over the Standard security handler for `params`; fails before any worker starts
    /// when the scheme is unsupported.
    pub fn for_parameters(
        params: &EncryptionParameters,
        config: AttackConfig,
    ) -> Result<Self, SecurityError> {
        let handler = StandardSecurityHandler::new(params)?;
        Ok(Self::new(Arc::new(handler), config))
    }

    /// Register a progress observer. Snapshots are dropped while a previous one is still being
    /// handled, so a slow observer never stalls the workers.
    pub fn on_progress<F>(mut self, observer: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn with_observer(mut self, observer: Option<ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &AttackConfig {
        &self.config
    }

    fn emit_progress(&self, state: &RunState, attempts: u64, current: &[u8]) {
        let Some(observer) = &self.observer else {
            return;
        };
        let Ok(_gate) = state.progress_gate.try_lock() else {
            return;
        };
        let elapsed = state.started.elapsed();
        observer(Progress {
            attempts,
            rate: attempts_per_second(attempts, elapsed),
            current: String::from_utf8_lossy(current).into_owned(),
            elapsed,
        });
    }

    fn work(&self, queue: &CandidateQueue, state: &RunState, cancel: &CancellationToken) {
        let interval = self.config.progress_interval.max(1);
        loop {
            let candidate = match queue.pull() {
                Pull::Candidate(candidate) => candidate,
                Pull::Exhausted | Pull::Cancelled => return,
            };
            let matched = self.verifier.verify(&candidate);
            let attempts = state.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if matched {
                if state.publish(candidate) {
                    log::info!("password found after {attempts} attempts");
                    cancel.cancel();
                }
                return;
            }
            if attempts % interval == 0 && !cancel.is_cancelled() {
                self.emit_progress(state, attempts, &candidate);
            }
        }
    }

    /// Run `source` to completion, first match, or cancellation of `cancel`.
    ///
    /// Workers and the producer are joined before returning, so `attempts` is final.
    pub fn run<S: CandidateSource>(&self, mut source: S, cancel: &CancellationToken) -> AttackOutcome {
        let run_token = cancel.child_token();
        let workers = self.config.resolved_workers();
        let state = RunState::new();
        let (sender, receiver) = bounded::<Vec<u8>>(self.config.queue_depth.max(1));
        log::debug!(
            "attack started with {workers} workers (queue depth {})",
            self.config.queue_depth
        );

        let queue = CandidateQueue::new(receiver, run_token.clone());

        let source_result = thread::scope(|scope| {
            let producer = {
                let run_token = &run_token;
                let source = &mut source;
                scope.spawn(move || produce(source, sender, run_token))
            };

            let mut spawned = 0usize;
            for id in 0..workers {
                let (queue, state, run_token) = (&queue, &state, &run_token);
                let spawn = thread::Builder::new()
                    .name(format!("pdfcrack-worker-{id}"))
                    .spawn_scoped(scope, move || self.work(queue, state, run_token));
                match spawn {
                    Ok(_) => spawned += 1,
                    Err(err) => log::warn!("failed to spawn worker {id}: {err}"),
                }
            }
            if spawned == 0 {
                log::error!("no attack workers could be started");
                run_token.cancel();
            }

            match producer.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });

        if let Err(err) = &source_result {
            log::error!("candidate source failed: {err}");
        }
        let outcome = state.outcome(&run_token, source_result);
        log::debug!(
            "attack finished: {:?} after {} attempts in {:.2?}",
            outcome.termination,
            outcome.attempts,
            outcome.elapsed
        );
        outcome
    }

    /// Run `source` through a batch verifier, `batch_size` candidates per call.
    ///
    /// Same outcome, progress and cancellation contract as [`AttackEngine::run`]. When a batch
    /// contains a match, the candidates up to and including it are counted.
    pub fn run_batched<S: CandidateSource>(
        &self,
        mut source: S,
        verifier: &dyn BatchVerifier,
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> AttackOutcome {
        let run_token = cancel.child_token();
        let state = RunState::new();
        let batch_size = batch_size.max(1);
        let interval = self.config.progress_interval.max(1);
        let mut batch: Vec<Vec<u8>> = Vec::with_capacity(batch_size);
        let mut source_result = Ok(());
        log::debug!(
            "batched attack started ({}, batch size {batch_size})",
            verifier.description()
        );

        'run: while !run_token.is_cancelled() {
            batch.clear();
            while batch.len() < batch_size {
                match source.next_candidate() {
                    Ok(Some(candidate)) => batch.push(candidate),
                    Ok(None) => break,
                    Err(err) => {
                        source_result = Err(err);
                        break;
                    }
                }
            }
            if batch.is_empty() {
                break;
            }

            let before = state.attempts.load(Ordering::SeqCst);
            match verifier.verify_batch(&batch) {
                Some(index) => {
                    let attempts = index as u64 + 1;
                    state.attempts.fetch_add(attempts, Ordering::SeqCst);
                    if state.publish(std::mem::take(&mut batch[index])) {
                        log::info!("password found after {} attempts", before + attempts);
                        run_token.cancel();
                    }
                    break 'run;
                }
                None => {
                    let attempts = state
                        .attempts
                        .fetch_add(batch.len() as u64, Ordering::SeqCst)
                        + batch.len() as u64;
                    if attempts / interval > before / interval {
                        if let Some(last) = batch.last() {
                            self.emit_progress(&state, attempts, last);
                        }
                    }
                }
            }
            if source_result.is_err() {
                break;
            }
        }

        if let Err(err) = &source_result {
            log::error!("candidate source failed: {err}");
        }
        state.outcome(&run_token, source_result)
    }
}
