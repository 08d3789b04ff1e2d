//! Throughput-oriented verification of many candidates per call (RC4 family only).
//!
//! A batch verifier answers the same question as [`StandardSecurityHandler::verify_password`]
//! for a whole slice of candidates and reports the lowest matching index. It is an optional
//! backend: when it cannot be opened callers fall back to per-candidate verification.

use thiserror::Error;

use crate::params::EncryptionParameters;
#[cfg(feature = "parallel")]
use crate::standard::StandardSecurityHandler;

/// Why no batch verifier is available. Never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchUnavailable {
    #[error("batch verifier is not compiled into this build (enable the `parallel` feature)")]
    NotCompiled,
    #[error("batch verifier only supports RC4-encrypted documents")]
    UnsupportedCipher,
    #[error("unsupported encryption: {0}")]
    UnsupportedScheme(String),
    #[error("failed to start batch verifier thread pool: {0}")]
    ThreadPool(String),
}

pub trait BatchVerifier: Send + Sync {
    /// Index of the first candidate that verifies, if any.
    fn verify_batch(&self, candidates: &[Vec<u8>]) -> Option<usize>;

    /// Short human-readable backend description.
    fn description(&self) -> String;
}

/// Open the best available batch verifier for `params`.
///
/// `threads == 0` uses `RAYON_NUM_THREADS` or the available hardware parallelism.
pub fn open_batch_verifier(
    params: &EncryptionParameters,
    threads: usize,
) -> Result<Box<dyn BatchVerifier>, BatchUnavailable> {
    params
        .ensure_supported()
        .map_err(|err| BatchUnavailable::UnsupportedScheme(err.to_string()))?;

    #[cfg(feature = "parallel")]
    {
        let handler = StandardSecurityHandler::new(params)
            .map_err(|err| BatchUnavailable::UnsupportedScheme(err.to_string()))?;
        if handler.uses_aes() {
            return Err(BatchUnavailable::UnsupportedCipher);
        }
        let verifier = parallel::ParallelBatchVerifier::new(handler, threads)?;
        log::debug!("opened {}", verifier.description());
        Ok(Box::new(verifier))
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = threads;
        if params.revision >= 4 && params.cipher == crate::params::Cipher::Aes {
            return Err(BatchUnavailable::UnsupportedCipher);
        }
        Err(BatchUnavailable::NotCompiled)
    }
}

#[cfg(feature = "parallel")]
mod parallel {
    use rayon::prelude::*;
    use rayon::ThreadPool;

    use super::{BatchUnavailable, BatchVerifier};
    use crate::standard::StandardSecurityHandler;

    fn desired_threads(requested: usize) -> usize {
        if requested > 0 {
            return requested;
        }
        std::env::var("RAYON_NUM_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }

    fn build_pool(requested: usize) -> Result<ThreadPool, BatchUnavailable> {
        let try_build = |n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .thread_name(|i| format!("pdfcrack-batch-{i}"))
                .build()
        };
        match try_build(requested) {
            Ok(pool) => Ok(pool),
            Err(err) if requested > 1 => {
                log::warn!("batch pool with {requested} threads failed ({err}); retrying with 1");
                try_build(1).map_err(|err| BatchUnavailable::ThreadPool(err.to_string()))
            }
            Err(err) => Err(BatchUnavailable::ThreadPool(err.to_string())),
        }
    }

    /// Data-parallel verifier: one crate-local rayon pool checks every candidate of a batch.
    pub(super) struct ParallelBatchVerifier {
        handler: StandardSecurityHandler,
        pool: ThreadPool,
    }

    impl ParallelBatchVerifier {
        pub(super) fn new(
            handler: StandardSecurityHandler,
            threads: usize,
        ) -> Result<Self, BatchUnavailable> {
            let pool = build_pool(desired_threads(threads))?;
            Ok(Self { handler, pool })
        }
    }

    impl BatchVerifier for ParallelBatchVerifier {
        fn verify_batch(&self, candidates: &[Vec<u8>]) -> Option<usize> {
            let handler = &self.handler;
            self.pool.install(|| {
                candidates
                    .par_iter()
                    .position_first(|candidate| handler.verify_password(candidate))
            })
        }

        fn description(&self) -> String {
            format!(
                "data-parallel RC4 R{} batch verifier ({} threads)",
                self.handler.revision(),
                self.pool.current_num_threads()
            )
        }
    }
}
