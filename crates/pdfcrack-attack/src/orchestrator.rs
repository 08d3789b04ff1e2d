//! Several attack strategies at once, first success stops everyone.

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use pdfcrack_security::BatchVerifier;

use crate::cancel::CancellationToken;
use crate::engine::{AttackEngine, AttackOutcome, Termination};
use crate::source::{CandidateSource, SourceError};

type SourceFactory =
    Box<dyn FnOnce() -> Result<Box<dyn CandidateSource>, SourceError> + Send + 'static>;

/// One named attack: an engine plus the source it consumes.
///
/// The source is built lazily on the strategy's own thread so that opening it (for example a
/// large wordlist) does not delay the other strategies, and a failure affects only this one.
pub struct Strategy {
    name: String,
    engine: AttackEngine,
    factory: SourceFactory,
    batch: Option<(Box<dyn BatchVerifier>, usize)>,
}

impl Strategy {
    pub fn new<F, S>(name: impl Into<String>, engine: AttackEngine, factory: F) -> Self
    where
        F: FnOnce() -> Result<S, SourceError> + Send + 'static,
        S: CandidateSource + 'static,
    {
        Self {
            name: name.into(),
            engine,
            factory: Box::new(move || {
                factory().map(|source| Box::new(source) as Box<dyn CandidateSource>)
            }),
            batch: None,
        }
    }

    /// Drive this strategy through `verifier` instead of the engine's worker pool.
    pub fn with_batch_verifier(mut self, verifier: Box<dyn BatchVerifier>, batch_size: usize) -> Self {
        self.batch = Some((verifier, batch_size));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn execute(self, cancel: &CancellationToken) -> StrategyReport {
        let source = match (self.factory)() {
            Ok(source) => source,
            Err(err) => {
                log::error!("strategy {}: {err}", self.name);
                let outcome = AttackOutcome::source_failed(err);
                return StrategyReport {
                    name: self.name,
                    error: outcome.error.clone(),
                    outcome,
                };
            }
        };
        log::info!("strategy {} started", self.name);

        let outcome = match &self.batch {
            Some((verifier, batch_size)) => {
                self.engine
                    .run_batched(source, verifier.as_ref(), *batch_size, cancel)
            }
            None => self.engine.run(source, cancel),
        };
        log::info!(
            "strategy {} finished: {:?}, {} attempts",
            self.name,
            outcome.termination,
            outcome.attempts
        );
        StrategyReport {
            name: self.name,
            error: outcome.error.clone(),
            outcome,
        }
    }
}

/// Final state of one strategy.
#[derive(Debug, Clone)]
pub struct StrategyReport {
    pub name: String,
    pub outcome: AttackOutcome,
    /// Why the strategy's source failed, if it did.
    pub error: Option<Arc<SourceError>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub strategy: String,
    pub password: Vec<u8>,
}

/// Merged result of [`run_strategies`].
#[derive(Debug, Clone)]
pub struct CampaignOutcome {
    /// The first strategy to publish a password.
    pub winner: Option<Winner>,
    /// One report per strategy, in the order the strategies were given.
    pub reports: Vec<StrategyReport>,
    pub elapsed: Duration,
}

impl CampaignOutcome {
    pub fn found(&self) -> bool {
        self.winner.is_some()
    }

    pub fn total_attempts(&self) -> u64 {
        self.reports.iter().map(|r| r.outcome.attempts).sum()
    }
}

/// Run every strategy concurrently under one cancellation scope derived from `cancel`.
///
/// The first strategy to find the password cancels the scope; all strategies are joined before
/// returning, so every report is final. An empty strategy list returns immediately.
pub fn run_strategies(strategies: Vec<Strategy>, cancel: &CancellationToken) -> CampaignOutcome {
    let started = Instant::now();
    if strategies.is_empty() {
        log::warn!("no attack strategies enabled");
        return CampaignOutcome {
            winner: None,
            reports: Vec::new(),
            elapsed: started.elapsed(),
        };
    }

    let shared = cancel.child_token();
    let winner: OnceLock<Winner> = OnceLock::new();

    let reports = thread::scope(|scope| {
        let handles: Vec<_> = strategies
            .into_iter()
            .map(|strategy| {
                let token = shared.child_token();
                let (shared, winner) = (&shared, &winner);
                scope.spawn(move || {
                    let report = strategy.execute(&token);
                    if report.outcome.termination == Termination::Found {
                        if let Some(password) = &report.outcome.password {
                            let _ = winner.set(Winner {
                                strategy: report.name.clone(),
                                password: password.clone(),
                            });
                        }
                        shared.cancel();
                    }
                    report
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(report) => report,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect::<Vec<_>>()
    });

    CampaignOutcome {
        winner: winner.into_inner(),
        reports,
        elapsed: started.elapsed(),
    }
}
