use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use pdfcrack_attack::{
    attempts_per_second, AttackConfig, AttackEngine, CancellationToken, VecSource,
};
use pdfcrack_security::{open_batch_verifier, EncryptionParameters};

use crate::status::{display_password, format_rate};

#[derive(Debug, Args)]
pub struct BenchArgs {
    /// Encrypted PDF file whose parameters are benchmarked.
    #[arg(short, long)]
    file: PathBuf,

    /// Worker threads; 0 uses every core.
    #[arg(short = 't', long, default_value_t = 0)]
    workers: usize,

    /// Number of synthetic candidates to verify.
    #[arg(short = 'n', long, default_value_t = 100_000)]
    count: usize,

    /// Also measure the batch verifier.
    #[arg(long)]
    batch: bool,
}

fn synthetic_candidates(count: usize) -> Vec<Vec<u8>> {
    (0..count).map(|i| format!("test{i}").into_bytes()).collect()
}

pub fn run(args: BenchArgs) -> Result<()> {
    let params = EncryptionParameters::from_path(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    params.ensure_supported()?;

    let config = AttackConfig::with_workers(args.workers);
    let workers = config.resolved_workers();
    let engine = AttackEngine::for_parameters(&params, config)?;
    println!("Encryption: {params}");
    println!("Benchmarking {} candidates with {workers} workers...", args.count);

    let candidates = synthetic_candidates(args.count);
    let outcome = engine.run(VecSource::new(candidates.clone()), &CancellationToken::new());
    if let Some(password) = &outcome.password {
        println!(
            "note: synthetic candidate {} is the password",
            display_password(password)
        );
    }
    println!("Worker pool: {} passwords/second", format_rate(outcome.rate()));

    if args.batch {
        match open_batch_verifier(&params, args.workers) {
            Ok(verifier) => {
                let started = Instant::now();
                let _ = verifier.verify_batch(&candidates);
                let rate = attempts_per_second(candidates.len() as u64, started.elapsed());
                println!(
                    "Batch ({}): {} passwords/second",
                    verifier.description(),
                    format_rate(rate)
                );
            }
            Err(err) => println!("Batch: unavailable ({err})"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::synthetic_candidates;

    #[test]
    fn synthetic_candidates_are_numbered() {
        assert_eq!(
            synthetic_candidates(3),
            vec![b"test0".to_vec(), b"test1".to_vec(), b"test2".to_vec()]
        );
        assert!(synthetic_candidates(0).is_empty());
    }
}
