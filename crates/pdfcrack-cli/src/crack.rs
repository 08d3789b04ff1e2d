use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use pdfcrack_attack::{
    estimate_combinations, run_strategies, AttackConfig, AttackEngine, CampaignOutcome,
    CancellationToken, Charset, IncrementalConfig, IncrementalSource, RandomConfig, RandomSource,
    Strategy, WordlistSource,
};
use pdfcrack_security::{open_batch_verifier, EncryptionParameters};

use crate::status::{display_password, format_duration, format_rate, StatusBoard};
use crate::EXIT_NOT_FOUND;

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .multiple(true)
        .args(["use_wordlist", "use_incremental", "use_random"])
))]
pub struct CrackArgs {
    /// Encrypted PDF file.
    #[arg(short, long)]
    file: PathBuf,

    /// Enable the dictionary attack (needs --wordlist-file).
    #[arg(short = 'W', long = "use-wordlist", requires = "wordlist")]
    use_wordlist: bool,

    /// Wordlist file, one candidate per line.
    #[arg(short = 'w', long = "wordlist-file", value_name = "PATH")]
    wordlist: Option<PathBuf>,

    /// Enable the incremental brute-force attack.
    #[arg(short = 'I', long = "use-incremental")]
    use_incremental: bool,

    /// Enable the random sampling attack.
    #[arg(short = 'R', long = "use-random")]
    use_random: bool,

    /// Character set: lower, upper, digits, special, alpha, alnum, all, or literal characters.
    #[arg(short, long, default_value = "alnum")]
    charset: Charset,

    /// Minimum generated password length.
    #[arg(short = 'm', long = "min", default_value_t = 1)]
    min_length: usize,

    /// Maximum generated password length (at most 16).
    #[arg(short = 'M', long = "max", default_value_t = 8)]
    max_length: usize,

    /// Worker threads per attack; 0 uses every core.
    #[arg(short = 't', long, default_value_t = 0)]
    workers: usize,

    /// Run the dictionary attack through the batch verifier when one is available.
    #[arg(long)]
    batch: bool,

    /// Candidates per batch-verifier call.
    #[arg(short = 'b', long = "batch-size", default_value_t = 10_000)]
    batch_size: usize,

    /// Seed for the random attack; 0 picks a fresh one.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Stop every attack after this many seconds.
    #[arg(long = "max-time", value_name = "SECS")]
    max_time: Option<u64>,
}

pub fn run(args: CrackArgs) -> Result<ExitCode> {
    let params = EncryptionParameters::from_path(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    params.ensure_supported()?;

    let config = AttackConfig::with_workers(args.workers);
    let workers = config.resolved_workers();
    let engine = AttackEngine::for_parameters(&params, config)?;

    let cancel = CancellationToken::new();
    let interrupted = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(&cancel, &interrupted);

    println!("File:       {}", args.file.display());
    println!("Encryption: {params}");

    let mut board = StatusBoard::new();
    let mut strategies = Vec::new();

    if args.use_wordlist {
        let path = args
            .wordlist
            .clone()
            .context("--use-wordlist requires --wordlist-file")?;
        let line = board.add("wordlist", None);
        let mut strategy = Strategy::new(
            "wordlist",
            engine.clone().on_progress(line.observer()),
            move || WordlistSource::open(path),
        );
        if args.batch {
            match open_batch_verifier(&params, args.workers) {
                Ok(verifier) => {
                    println!("Batch:      {}", verifier.description());
                    strategy = strategy.with_batch_verifier(verifier, args.batch_size);
                }
                Err(err) => {
                    log::warn!("batch verifier unavailable: {err}");
                    eprintln!("warning: {err}; falling back to the worker pool");
                }
            }
        }
        strategies.push(strategy);
    }

    if args.use_incremental {
        let incremental =
            IncrementalConfig::new(args.charset.clone(), args.min_length, args.max_length);
        let line = board.add("incremental", Some(estimate_combinations(&incremental)));
        strategies.push(Strategy::new(
            "incremental",
            engine.clone().on_progress(line.observer()),
            move || IncrementalSource::new(incremental),
        ));
    }

    if args.use_random {
        let random = RandomConfig {
            charset: args.charset.clone(),
            min_length: args.min_length,
            max_length: args.max_length,
            seed: args.seed,
        };
        let line = board.add("random", None);
        strategies.push(Strategy::new(
            "random",
            engine.clone().on_progress(line.observer()),
            move || RandomSource::new(random),
        ));
    }

    let names: Vec<&str> = strategies.iter().map(Strategy::name).collect();
    println!("Modes:      {}", names.join(" + "));
    println!("Workers:    {workers} per mode");
    println!();

    let timer = args.max_time.map(|secs| {
        let cancel = cancel.clone();
        thread::spawn(move || {
            if cancel.wait_timeout(Duration::from_secs(secs)) {
                return false;
            }
            log::info!("time limit of {secs}s reached, stopping attacks");
            cancel.cancel();
            true
        })
    });

    let outcome = run_strategies(strategies, &cancel);
    board.finish();

    // Releases the timer thread if it is still waiting.
    cancel.cancel();
    let timed_out = match timer {
        Some(handle) => handle.join().unwrap_or(false),
        None => false,
    };

    let stop = if interrupted.load(Ordering::SeqCst) {
        StopReason::Interrupted
    } else if timed_out {
        StopReason::TimeLimit
    } else {
        StopReason::Finished
    };
    print_report(&outcome, stop);
    Ok(if outcome.found() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NOT_FOUND)
    })
}

/// SIGINT/SIGTERM stop every attack through the shared token; the report is still printed.
fn install_interrupt_handler(cancel: &CancellationToken, interrupted: &Arc<AtomicBool>) {
    let cancel = cancel.clone();
    let interrupted = Arc::clone(interrupted);
    let installed = ctrlc::set_handler(move || {
        if !interrupted.swap(true, Ordering::SeqCst) {
            println!();
            println!("Interrupted - stopping all attacks...");
        }
        cancel.cancel();
    });
    if let Err(err) = installed {
        log::warn!("could not install interrupt handler: {err}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Finished,
    TimeLimit,
    Interrupted,
}

fn print_report(outcome: &CampaignOutcome, stop: StopReason) {
    println!("================================");
    println!("RESULTS");
    println!("================================");

    match &outcome.winner {
        Some(winner) => {
            let report = outcome.reports.iter().find(|r| r.name == winner.strategy);
            println!();
            println!("PASSWORD FOUND: {}", display_password(&winner.password));
            println!("Found by: {} attack", winner.strategy);
            if let Some(report) = report {
                println!("Time: {}", format_duration(report.outcome.elapsed));
                println!("Attempts: {}", report.outcome.attempts);
            }
        }
        None if stop == StopReason::TimeLimit => {
            println!();
            println!("Password not found (time limit reached).");
        }
        None if stop == StopReason::Interrupted => {
            println!();
            println!("Password not found (interrupted).");
        }
        None => {
            println!();
            println!("Password not found.");
        }
    }

    println!();
    println!("Per-mode statistics:");
    for report in &outcome.reports {
        match &report.error {
            Some(err) => println!("  {:<12}: failed: {err}", report.name),
            None => println!(
                "  {:<12}: {} attempts in {} ({} p/s)",
                report.name,
                report.outcome.attempts,
                format_duration(report.outcome.elapsed),
                format_rate(report.outcome.rate())
            ),
        }
    }
    println!();
    println!("Total attempts: {}", outcome.total_attempts());
    println!("Elapsed: {}", format_duration(outcome.elapsed));
}
