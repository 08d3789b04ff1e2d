use super::{CandidateSource, Charset, SourceError, MAX_GENERATED_LENGTH};

/// Exhaustive enumeration settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalConfig {
    pub charset: Charset,
    pub min_length: usize,
    pub max_length: usize,
}

impl IncrementalConfig {
    pub fn new(charset: Charset, min_length: usize, max_length: usize) -> Self {
        Self {
            charset,
            min_length,
            max_length,
        }
    }

    /// `(min, max)` after clamping: min at least 1, max within `[min, 16]`.
    pub fn length_range(&self) -> (usize, usize) {
        let min = self.min_length.clamp(1, MAX_GENERATED_LENGTH);
        let max = self.max_length.clamp(min, MAX_GENERATED_LENGTH);
        (min, max)
    }
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self::new(Charset::default(), 1, 8)
    }
}

/// Number of candidates an incremental run over `config` produces (saturating at `u64::MAX`).
pub fn estimate_combinations(config: &IncrementalConfig) -> u64 {
    let (min, max) = config.length_range();
    let base = config.charset.len() as u64;
    (min..=max).fold(0u64, |total, length| {
        let per_length = (0..length).fold(1u64, |acc, _| acc.saturating_mul(base));
        total.saturating_add(per_length)
    })
}

/// Every string over the charset, shortest first, odometer order within a length.
///
/// The last position varies fastest: over `ab` with lengths 1..=2 the sequence is
/// `a b aa ab ba bb`.
#[derive(Debug, Clone)]
pub struct IncrementalSource {
    chars: Vec<char>,
    max_length: usize,
    indices: Vec<usize>,
    total: u64,
    done: bool,
}

impl IncrementalSource {
    pub fn new(config: IncrementalConfig) -> Result<Self, SourceError> {
        if config.charset.is_empty() {
            return Err(SourceError::InvalidConfig("charset is empty".to_string()));
        }
        let (min, max) = config.length_range();
        if config.max_length > MAX_GENERATED_LENGTH {
            log::warn!(
                "incremental max length {} capped at {MAX_GENERATED_LENGTH}",
                config.max_length
            );
        }
        Ok(Self {
            total: estimate_combinations(&config),
            chars: config.charset.chars().to_vec(),
            max_length: max,
            indices: vec![0; min],
            done: false,
        })
    }

    fn current(&self) -> String {
        self.indices.iter().map(|&i| self.chars[i]).collect()
    }

    /// Step the odometer; grows to the next length after the last string of a length.
    fn advance(&mut self) {
        for pos in (0..self.indices.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.chars.len() {
                return;
            }
            self.indices[pos] = 0;
        }
        if self.indices.len() < self.max_length {
            self.indices = vec![0; self.indices.len() + 1];
        } else {
            self.done = true;
        }
    }
}

impl CandidateSource for IncrementalSource {
    fn next_candidate(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        if self.done {
            return Ok(None);
        }
        let candidate = self.current();
        self.advance();
        Ok(Some(candidate.into_bytes()))
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}
