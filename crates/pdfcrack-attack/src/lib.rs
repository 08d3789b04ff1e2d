//! Password-recovery attack machinery.
//!
//! [`AttackEngine`] drives one [`CandidateSource`] through a pool of verification workers with
//! first-match-wins semantics. [`run_strategies`] runs several engines concurrently under a shared
//! [`CancellationToken`] and merges their results.

mod cancel;
mod engine;
mod orchestrator;
pub mod source;

pub use crate::cancel::CancellationToken;
pub use crate::engine::{
    attempts_per_second, AttackConfig, AttackEngine, AttackOutcome, Progress, ProgressObserver,
    Termination, DEFAULT_PROGRESS_INTERVAL, DEFAULT_QUEUE_DEPTH,
};
pub use crate::orchestrator::{run_strategies, CampaignOutcome, Strategy, StrategyReport, Winner};
pub use crate::source::{
    estimate_combinations, CandidateSource, Charset, IncrementalConfig, IncrementalSource,
    RandomConfig, RandomSource, SourceError, VecSource, WordlistSource,
};
