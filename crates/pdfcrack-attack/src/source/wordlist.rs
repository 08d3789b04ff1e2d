use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::{CandidateSource, SourceError};

/// One candidate per line of a text file.
///
/// Line endings (`\n` or `\r\n`) are stripped and empty lines are kept as the empty password.
/// Every other byte is passed through unchanged; lines need not be UTF-8.
#[derive(Debug)]
pub struct WordlistSource {
    path: PathBuf,
    reader: BufReader<File>,
}

impl WordlistSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        log::debug!("opened wordlist {}", path.display());
        Ok(Self {
            path,
            reader: BufReader::with_capacity(64 * 1024, file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CandidateSource for WordlistSource {
    fn next_candidate(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let mut line = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut line)
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        if read == 0 {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}
