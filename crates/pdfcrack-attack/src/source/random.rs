use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

use super::{CandidateSource, Charset, SourceError, MAX_GENERATED_LENGTH};

/// Random sampling settings. `seed == 0` draws a seed from the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomConfig {
    pub charset: Charset,
    pub min_length: usize,
    pub max_length: usize,
    pub seed: u64,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            charset: Charset::default(),
            min_length: 1,
            max_length: 8,
            seed: 0,
        }
    }
}

/// Infinite stream of uniformly random candidates.
#[derive(Debug)]
pub struct RandomSource {
    chars: Vec<char>,
    min_length: usize,
    max_length: usize,
    rng: StdRng,
}

impl RandomSource {
    pub fn new(config: RandomConfig) -> Result<Self, SourceError> {
        if config.charset.is_empty() {
            return Err(SourceError::InvalidConfig("charset is empty".to_string()));
        }
        let min_length = config.min_length.clamp(1, MAX_GENERATED_LENGTH);
        let max_length = config.max_length.clamp(min_length, MAX_GENERATED_LENGTH);
        let rng = match config.seed {
            0 => StdRng::from_os_rng(),
            seed => StdRng::seed_from_u64(seed),
        };
        Ok(Self {
            chars: config.charset.chars().to_vec(),
            min_length,
            max_length,
            rng,
        })
    }
}

impl CandidateSource for RandomSource {
    fn next_candidate(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let length = self.rng.random_range(self.min_length..=self.max_length);
        let candidate: String = (0..length)
            .map(|_| self.chars[self.rng.random_range(0..self.chars.len())])
            .collect();
        Ok(Some(candidate.into_bytes()))
    }
}
