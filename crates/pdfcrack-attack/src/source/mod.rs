//! Candidate password sources.
//!
//! A source is a lazy, ordered stream of candidates. `Ok(None)` marks the end of the stream;
//! infinite sources never return it and rely on the engine's cancellation instead.
//!
//! Candidates are raw password bytes. Wordlists are passed through untouched, so Latin-1 or
//! PDFDocEncoding passwords reach the verifier exactly as they appear in the file.

mod charset;
mod incremental;
mod random;
mod wordlist;

use std::path::PathBuf;

use thiserror::Error;

pub use self::charset::Charset;
pub use self::incremental::{estimate_combinations, IncrementalConfig, IncrementalSource};
pub use self::random::{RandomConfig, RandomSource};
pub use self::wordlist::WordlistSource;

/// Longest candidate the enumerating sources will produce; longer passwords are truncated to 32
/// bytes by the key derivation anyway.
pub const MAX_GENERATED_LENGTH: usize = 16;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid candidate source configuration: {0}")]
    InvalidConfig(String),
}

pub trait CandidateSource: Send {
    /// The next candidate, `Ok(None)` once exhausted.
    fn next_candidate(&mut self) -> Result<Option<Vec<u8>>, SourceError>;

    /// Total number of candidates when known up front.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

impl<S: CandidateSource + ?Sized> CandidateSource for Box<S> {
    fn next_candidate(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        (**self).next_candidate()
    }

    fn size_hint(&self) -> Option<u64> {
        (**self).size_hint()
    }
}

/// In-memory candidates, yielded in order.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    candidates: std::vec::IntoIter<Vec<u8>>,
}

impl VecSource {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self {
            candidates: candidates
                .into_iter()
                .map(Into::into)
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }
}

impl CandidateSource for VecSource {
    fn next_candidate(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(self.candidates.next())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.candidates.len() as u64)
    }
}
