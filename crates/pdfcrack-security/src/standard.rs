//! Standard security handler key derivation and user-password verification (revisions 2-4).

use md5::{Digest as _, Md5};
use subtle::ConstantTimeEq as _;
use zeroize::Zeroizing;

use crate::aes_cbc::{decrypt_aes128_cbc_in_place, AES_BLOCK_SIZE};
use crate::error::SecurityError;
use crate::params::{Cipher, EncryptionParameters, MAX_KEY_LENGTH};
use crate::rc4::{rc4_in_place, rc4_transform};

/// The 32-byte string used to pad passwords and as the plaintext of the user verifier.
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

const KEY_HASH_ROUNDS: usize = 50;
const USER_CHECK_ROUNDS: u8 = 19;

/// Verifier comparisons must not exit early on the first differing byte.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}

/// Truncate or pad `password` to exactly 32 bytes.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut out = PASSWORD_PADDING;
    let n = password.len().min(out.len());
    out[..n].copy_from_slice(&password[..n]);
    out[n..].copy_from_slice(&PASSWORD_PADDING[..32 - n]);
    out
}

/// A derived file key. The buffer is wiped when dropped.
pub struct DerivedKey {
    bytes: Zeroizing<[u8; MAX_KEY_LENGTH]>,
    len: usize,
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// Anything that can answer "is this the password?" for one document.
///
/// Candidates are raw password bytes: revision 2-4 passwords are PDFDocEncoding or Latin-1, not
/// necessarily UTF-8. Implementations must be pure: the same candidate always yields the same
/// answer, and calls from many threads at once are allowed.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, candidate: &[u8]) -> bool;
}

impl<F> PasswordVerifier for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn verify(&self, candidate: &[u8]) -> bool {
        self(candidate)
    }
}

/// Per-document verifier with everything that does not depend on the candidate precomputed.
#[derive(Clone)]
pub struct StandardSecurityHandler {
    revision: u32,
    key_length: usize,
    cipher: Cipher,
    /// `O || P (LE) || ID [|| FF FF FF FF]`, hashed after the padded password.
    hash_suffix: Vec<u8>,
    /// `MD5(padding || ID)`: the R3+ and AES user verifier plaintext.
    user_check: [u8; 16],
    user_verifier: Vec<u8>,
}

impl StandardSecurityHandler {
    /// Build a verifier, rejecting revisions the engine does not implement.
    pub fn new(params: &EncryptionParameters) -> Result<Self, SecurityError> {
        params.ensure_supported()?;
        Ok(Self::prepare(params))
    }

    fn prepare(params: &EncryptionParameters) -> Self {
        let mut hash_suffix = Vec::with_capacity(
            params.owner_verifier.len() + 4 + params.file_identifier.len() + 4,
        );
        hash_suffix.extend_from_slice(&params.owner_verifier);
        hash_suffix.extend_from_slice(&params.permissions.to_le_bytes());
        hash_suffix.extend_from_slice(&params.file_identifier);
        if params.revision >= 4 && !params.encrypt_metadata {
            hash_suffix.extend_from_slice(&[0xFF; 4]);
        }

        let mut hasher = Md5::new();
        hasher.update(PASSWORD_PADDING);
        hasher.update(&params.file_identifier);
        let mut user_check = [0u8; 16];
        user_check.copy_from_slice(&hasher.finalize());

        Self {
            revision: params.revision,
            key_length: params.key_length(),
            cipher: params.cipher,
            hash_suffix,
            user_check,
            user_verifier: params.user_verifier.clone(),
        }
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Whether verification goes through the AES-CBC branch.
    pub fn uses_aes(&self) -> bool {
        self.revision >= 4 && self.cipher == Cipher::Aes
    }

    /// Derive the file key a candidate password would produce.
    pub fn derive_key(&self, password: &[u8]) -> DerivedKey {
        let n = self.key_length;

        let mut hasher = Md5::new();
        hasher.update(pad_password(password));
        hasher.update(&self.hash_suffix);
        let mut digest = Zeroizing::new([0u8; 16]);
        digest.copy_from_slice(&hasher.finalize());

        if self.revision >= 3 {
            for _ in 0..KEY_HASH_ROUNDS {
                let next = Md5::digest(&digest[..n]);
                digest.copy_from_slice(&next);
            }
        }

        let mut bytes = Zeroizing::new([0u8; MAX_KEY_LENGTH]);
        bytes[..n].copy_from_slice(&digest[..n]);
        DerivedKey { bytes, len: n }
    }

    /// Check a derived key against the document's user verifier.
    pub fn check_key(&self, key: &[u8]) -> bool {
        if key.is_empty() {
            return false;
        }
        if self.uses_aes() {
            return self.check_key_aes(key);
        }
        if self.revision == 2 {
            if self.user_verifier.len() != PASSWORD_PADDING.len() {
                return false;
            }
            let encrypted = Zeroizing::new(rc4_transform(key, &PASSWORD_PADDING));
            return ct_eq(&encrypted, &self.user_verifier);
        }

        if self.user_verifier.len() < 16 {
            return false;
        }
        let mut buf = self.user_check;
        rc4_in_place(key, &mut buf);
        let mut round_key = Zeroizing::new([0u8; MAX_KEY_LENGTH]);
        for i in 1..=USER_CHECK_ROUNDS {
            for (dst, src) in round_key.iter_mut().zip(key) {
                *dst = src ^ i;
            }
            rc4_in_place(&round_key[..key.len()], &mut buf);
        }
        ct_eq(&buf, &self.user_verifier[..16])
    }

    fn check_key_aes(&self, key: &[u8]) -> bool {
        if self.user_verifier.len() < 2 * AES_BLOCK_SIZE {
            return false;
        }
        let mut aes_key = Zeroizing::new([0u8; 16]);
        let n = key.len().min(16);
        aes_key[..n].copy_from_slice(&key[..n]);

        let (iv, rest) = self.user_verifier.split_at(AES_BLOCK_SIZE);
        let mut block = [0u8; AES_BLOCK_SIZE];
        block.copy_from_slice(&rest[..AES_BLOCK_SIZE]);

        decrypt_aes128_cbc_in_place(aes_key.as_slice(), iv, &mut block).is_ok()
            && ct_eq(&block, &self.user_check)
    }

    /// Derive and check in one step.
    pub fn verify_password(&self, password: &[u8]) -> bool {
        let key = self.derive_key(password);
        self.check_key(key.as_bytes())
    }
}

impl PasswordVerifier for StandardSecurityHandler {
    fn verify(&self, candidate: &[u8]) -> bool {
        self.verify_password(candidate)
    }
}

/// Verify a candidate against `params` without a precomputed handler.
///
/// Returns `false` for revisions the engine does not implement rather than erroring, so it is
/// safe to call inside a candidate loop. Callers should still check
/// [`EncryptionParameters::ensure_supported`] once up front.
pub fn verify(candidate: &str, params: &EncryptionParameters) -> bool {
    verify_user_password(candidate.as_bytes(), params)
}

/// Byte-level form of [`verify`].
pub fn verify_user_password(password: &[u8], params: &EncryptionParameters) -> bool {
    if params.ensure_supported().is_err() {
        return false;
    }
    StandardSecurityHandler::prepare(params).verify_password(password)
}

/// Compute the file key for `password` (revisions 2-4 derivation).
pub fn compute_encryption_key(password: &[u8], params: &EncryptionParameters) -> DerivedKey {
    StandardSecurityHandler::prepare(params).derive_key(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests::r3_parameters;

    #[test]
    fn constant_time_compare() {
        assert!(ct_eq(b"", b""));
        assert!(ct_eq(&PASSWORD_PADDING[..4], &[0x28, 0xBF, 0x4E, 0x5E]));
        assert!(!ct_eq(b"abc", b"abx"));
        assert!(!ct_eq(&PASSWORD_PADDING[..16], &PASSWORD_PADDING));
    }

    #[test]
    fn pad_password_boundaries() {
        assert_eq!(pad_password(b""), PASSWORD_PADDING);

        let four = pad_password(b"test");
        assert_eq!(&four[..4], b"test");
        assert_eq!(&four[4..], &PASSWORD_PADDING[..28]);

        let exact = [b'x'; 32];
        assert_eq!(pad_password(&exact), exact);

        let long: Vec<u8> = (0u8..40).collect();
        assert_eq!(pad_password(&long)[..], long[..32]);
    }

    #[test]
    fn hash_suffix_includes_metadata_marker_only_for_r4_without_metadata() {
        let mut params = r3_parameters();
        params.encrypt_metadata = false;
        let r3 = StandardSecurityHandler::prepare(&params);
        assert_eq!(r3.hash_suffix.len(), 32 + 4 + 16);

        params.revision = 4;
        let r4 = StandardSecurityHandler::prepare(&params);
        assert_eq!(r4.hash_suffix.len(), 32 + 4 + 16 + 4);
        assert_eq!(&r4.hash_suffix[52..], &[0xFF; 4]);

        params.encrypt_metadata = true;
        let r4_meta = StandardSecurityHandler::prepare(&params);
        assert_eq!(r4_meta.hash_suffix.len(), 32 + 4 + 16);
    }

    #[test]
    fn permissions_are_little_endian() {
        let params = r3_parameters();
        let handler = StandardSecurityHandler::prepare(&params);
        assert_eq!(&handler.hash_suffix[32..36], &(-3904i32).to_le_bytes());
        assert_eq!(&handler.hash_suffix[32..36], &[0xC0, 0xF0, 0xFF, 0xFF]);
    }

    #[test]
    fn derived_key_length_follows_clamp() {
        let mut params = r3_parameters();
        params.key_length_bits = 40;
        assert_eq!(compute_encryption_key(b"x", &params).len(), 5);
        params.key_length_bits = 1024;
        assert_eq!(compute_encryption_key(b"x", &params).len(), 16);
    }

    #[test]
    fn malformed_user_verifier_fails_closed() {
        let mut params = r3_parameters();
        params.user_verifier = vec![0; 8];
        assert!(!verify("anything", &params));

        params.revision = 2;
        params.user_verifier = vec![0; 31];
        assert!(!verify("anything", &params));

        params.revision = 4;
        params.cipher = Cipher::Aes;
        params.user_verifier = vec![0; 20];
        assert!(!verify("anything", &params));
    }

    #[test]
    fn unsupported_revisions_fail_closed() {
        let mut params = r3_parameters();
        params.revision = 6;
        assert!(!verify("", &params));
        assert!(StandardSecurityHandler::new(&params).is_err());
    }

    #[test]
    fn aes_flag_needs_revision_four() {
        let mut params = r3_parameters();
        params.cipher = Cipher::Aes;
        assert!(!StandardSecurityHandler::prepare(&params).uses_aes());
        params.revision = 4;
        assert!(StandardSecurityHandler::prepare(&params).uses_aes());
    }
}
