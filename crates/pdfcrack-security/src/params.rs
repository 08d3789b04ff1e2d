use std::fmt;
use std::path::Path;

use crate::error::SecurityError;
use crate::extract::extract_encryption_parameters;

/// Smallest and largest RC4/AES key length (in bytes) the Standard handler derives.
pub const MIN_KEY_LENGTH: usize = 5;
pub const MAX_KEY_LENGTH: usize = 16;

/// Content cipher declared by the document's crypt filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    Rc4,
    Aes,
}

impl Cipher {
    pub fn as_str(self) -> &'static str {
        match self {
            Cipher::Rc4 => "RC4",
            Cipher::Aes => "AES",
        }
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard security handler parameters read from a document's encryption dictionary.
///
/// Values are set once at load time and only ever read afterwards, so one instance can be shared
/// by any number of concurrent verifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionParameters {
    /// `/V`: algorithm version.
    pub version: u32,
    /// `/R`: security handler revision; selects the derivation variant.
    pub revision: u32,
    /// Nominal key length in bits.
    pub key_length_bits: u32,
    /// `/P`: access permission flags.
    pub permissions: i32,
    /// `/O`: owner verifier.
    pub owner_verifier: Vec<u8>,
    /// `/U`: user verifier.
    pub user_verifier: Vec<u8>,
    /// First element of the trailer `/ID` array.
    pub file_identifier: Vec<u8>,
    /// `/EncryptMetadata` (defaults to `true`).
    pub encrypt_metadata: bool,
    pub cipher: Cipher,
    /// Header version, e.g. `1.4`.
    pub pdf_version: Option<String>,
}

impl EncryptionParameters {
    /// Read and parse a PDF file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SecurityError> {
        let bytes = std::fs::read(path)?;
        extract_encryption_parameters(&bytes)
    }

    /// Parse the parameters out of an in-memory PDF.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        extract_encryption_parameters(bytes)
    }

    /// Derived key length in bytes, clamped into `[5, 16]`.
    pub fn key_length(&self) -> usize {
        ((self.key_length_bits / 8) as usize).clamp(MIN_KEY_LENGTH, MAX_KEY_LENGTH)
    }

    /// Fail fast on variants the verification engine does not implement.
    ///
    /// Callers run this once before looping over candidates; verification itself only ever
    /// answers `false` for parameters that would not pass here.
    pub fn ensure_supported(&self) -> Result<(), SecurityError> {
        if self.revision >= 5 {
            return Err(SecurityError::UnsupportedScheme(format!(
                "revision {} (SHA-256 based key derivation) is not supported",
                self.revision
            )));
        }
        if self.revision < 2 {
            return Err(SecurityError::UnsupportedScheme(format!(
                "unknown security handler revision {}",
                self.revision
            )));
        }
        Ok(())
    }

    /// Human-readable one-line summary, e.g. `PDF 1.4, V2 R3, 128-bit RC4`.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EncryptionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PDF {}, V{} R{}, {}-bit {}",
            self.pdf_version.as_deref().unwrap_or("?"),
            self.version,
            self.revision,
            self.key_length_bits,
            self.cipher
        )
    }
}
