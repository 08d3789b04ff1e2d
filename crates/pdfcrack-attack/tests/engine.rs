use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pdfcrack_attack::{
    AttackConfig, AttackEngine, CancellationToken, CandidateSource, Charset, RandomConfig,
    RandomSource, SourceError, Termination, VecSource, WordlistSource,
};
use pdfcrack_security::EncryptionParameters;

fn fixture(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(rel)
}

fn r3_params() -> EncryptionParameters {
    EncryptionParameters::from_path(fixture("encrypted/rc4-128-r3.pdf")).unwrap()
}

fn candidates_with_password_at(position: usize) -> Vec<String> {
    let mut words: Vec<String> = (0..100).map(|i| format!("wrong-{i}")).collect();
    words.insert(position, "secret".to_string());
    words
}

#[test]
fn finds_the_password_with_any_worker_count() {
    let params = r3_params();
    for workers in [1, 2, 8] {
        for position in [0, 37, 100] {
            let engine = AttackEngine::for_parameters(&params, AttackConfig::with_workers(workers))
                .unwrap();
            let outcome = engine.run(
                VecSource::new(candidates_with_password_at(position)),
                &CancellationToken::new(),
            );
            assert!(outcome.found, "workers={workers} position={position}");
            assert_eq!(outcome.password.as_deref(), Some(&b"secret"[..]));
            assert_eq!(outcome.termination, Termination::Found);
            assert!(
                outcome.attempts >= 1 && outcome.attempts <= 101,
                "workers={workers} position={position} attempts={}",
                outcome.attempts
            );
            if workers == 1 {
                assert_eq!(outcome.attempts, position as u64 + 1);
            }
        }
    }
}

#[test]
fn wordlist_fixture_cracks_r3_document() {
    let engine = AttackEngine::for_parameters(&r3_params(), AttackConfig::with_workers(2)).unwrap();
    let source = WordlistSource::open(fixture("wordlists/small.txt")).unwrap();
    let outcome = engine.run(source, &CancellationToken::new());
    assert_eq!(outcome.password.as_deref(), Some(&b"secret"[..]));
}

#[test]
fn wordlist_recovers_a_latin1_password() {
    let params =
        EncryptionParameters::from_path(fixture("encrypted/rc4-40-r2-latin1.pdf")).unwrap();
    let engine = AttackEngine::for_parameters(&params, AttackConfig::with_workers(2)).unwrap();

    let mut wordlist = tempfile::NamedTempFile::new().unwrap();
    wordlist.write_all(b"wrong\ncaf\xe9\nother\n").unwrap();
    let source = WordlistSource::open(wordlist.path()).unwrap();

    let outcome = engine.run(source, &CancellationToken::new());
    assert!(outcome.found, "attempts={}", outcome.attempts);
    assert_eq!(outcome.password.as_deref(), Some(&b"caf\xe9"[..]));
    assert_eq!(outcome.termination, Termination::Found);
}

#[test]
fn unsupported_revision_is_rejected_before_running() {
    let params = EncryptionParameters::from_path(fixture("encrypted/aes-256-r6.pdf")).unwrap();
    assert!(AttackEngine::for_parameters(&params, AttackConfig::default()).is_err());
}

#[test]
fn external_cancel_stops_an_infinite_source_promptly() {
    let verifier = |_: &[u8]| false;
    let engine = AttackEngine::new(Arc::new(verifier), AttackConfig::with_workers(4));
    let source = RandomSource::new(RandomConfig {
        charset: Charset::lower(),
        min_length: 4,
        max_length: 8,
        seed: 7,
    })
    .unwrap();

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let at = Instant::now();
            cancel.cancel();
            at
        })
    };

    let outcome = engine.run(source, &cancel);
    let returned = Instant::now();
    let cancelled_at = canceller.join().unwrap();

    assert!(!outcome.found);
    assert_eq!(outcome.termination, Termination::Cancelled);
    assert!(outcome.attempts > 0);
    assert!(returned.duration_since(cancelled_at) < Duration::from_secs(2));
}

#[test]
fn progress_snapshots_are_emitted_at_the_interval() {
    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(AtomicU64::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let verifier = |_: &[u8]| false;
    let config = AttackConfig {
        workers: 1,
        queue_depth: 16,
        progress_interval: 10,
    };
    let engine = AttackEngine::new(Arc::new(verifier), config).on_progress({
        let (calls, last, seen) = (calls.clone(), last.clone(), seen.clone());
        move |progress| {
            calls.fetch_add(1, Ordering::SeqCst);
            last.fetch_max(progress.attempts, Ordering::SeqCst);
            seen.lock().unwrap().push(progress.current.clone());
            assert!(progress.rate >= 0.0);
        }
    });

    let words: Vec<String> = (1..=500).map(|i| format!("c{i}")).collect();
    let outcome = engine.run(VecSource::new(words), &CancellationToken::new());

    assert_eq!(outcome.attempts, 500);
    assert_eq!(calls.load(Ordering::SeqCst), 50);
    assert_eq!(last.load(Ordering::SeqCst), 500);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.first().map(String::as_str), Some("c10"));
    assert_eq!(seen.last().map(String::as_str), Some("c500"));
}

struct FailingSource {
    remaining: usize,
}

impl CandidateSource for FailingSource {
    fn next_candidate(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        if self.remaining == 0 {
            return Err(SourceError::InvalidConfig("disk went away".to_string()));
        }
        self.remaining -= 1;
        Ok(Some(format!("candidate-{}", self.remaining).into_bytes()))
    }
}

#[test]
fn source_failure_is_reported_after_draining() {
    let verifier = |_: &[u8]| false;
    let engine = AttackEngine::new(Arc::new(verifier), AttackConfig::with_workers(2));
    let outcome = engine.run(FailingSource { remaining: 3 }, &CancellationToken::new());

    assert!(!outcome.found);
    assert_eq!(outcome.termination, Termination::SourceFailed);
    assert_eq!(outcome.attempts, 3);
    let error = outcome.error.expect("source error");
    assert!(error.to_string().contains("disk went away"));
}

#[cfg(feature = "parallel")]
mod batched {
    use super::*;
    use pdfcrack_security::open_batch_verifier;

    #[test]
    fn batched_run_finds_password_and_counts_up_to_match() {
        let params = r3_params();
        let engine = AttackEngine::for_parameters(&params, AttackConfig::with_workers(1)).unwrap();
        let verifier = open_batch_verifier(&params, 2).unwrap();

        let outcome = engine.run_batched(
            VecSource::new(candidates_with_password_at(57)),
            verifier.as_ref(),
            16,
            &CancellationToken::new(),
        );
        assert!(outcome.found);
        assert_eq!(outcome.password.as_deref(), Some(&b"secret"[..]));
        assert_eq!(outcome.attempts, 58);
    }

    #[test]
    fn batched_run_exhausts_and_honours_cancel() {
        let params = r3_params();
        let engine = AttackEngine::for_parameters(&params, AttackConfig::default()).unwrap();
        let verifier = open_batch_verifier(&params, 2).unwrap();

        let words: Vec<String> = (0..40).map(|i| format!("n{i}")).collect();
        let outcome = engine.run_batched(
            VecSource::new(words),
            verifier.as_ref(),
            7,
            &CancellationToken::new(),
        );
        assert_eq!(outcome.termination, Termination::Exhausted);
        assert_eq!(outcome.attempts, 40);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = engine.run_batched(
            VecSource::new(["secret"]),
            verifier.as_ref(),
            7,
            &cancel,
        );
        assert_eq!(outcome.termination, Termination::Cancelled);
        assert_eq!(outcome.attempts, 0);
    }
}
