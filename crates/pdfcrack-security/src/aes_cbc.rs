use aes::Aes128;
use cbc::Decryptor;
use cipher::block_padding::NoPadding;
use cipher::{BlockDecryptMut, KeyIvInit};
use thiserror::Error;

pub(crate) const AES_BLOCK_SIZE: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum AesCbcDecryptError {
    #[error("unsupported AES key length: {0} bytes (expected 16)")]
    UnsupportedKeyLength(usize),
    #[error("invalid AES-CBC IV length: {0} bytes (expected 16)")]
    InvalidIvLength(usize),
    #[error("ciphertext length is not a multiple of 16 bytes: {0}")]
    InvalidCiphertextLength(usize),
}

/// In-place AES-128-CBC decryption without padding removal.
///
/// The AESV2 user verifier is a single block, so no padding is ever present.
pub(crate) fn decrypt_aes128_cbc_in_place(
    key: &[u8],
    iv: &[u8],
    buf: &mut [u8],
) -> Result<(), AesCbcDecryptError> {
    if iv.len() != AES_BLOCK_SIZE {
        return Err(AesCbcDecryptError::InvalidIvLength(iv.len()));
    }
    let buf_len = buf.len();
    if buf_len % AES_BLOCK_SIZE != 0 {
        return Err(AesCbcDecryptError::InvalidCiphertextLength(buf_len));
    }
    if buf.is_empty() {
        return Ok(());
    }

    let dec = Decryptor::<Aes128>::new_from_slices(key, iv)
        .map_err(|_| AesCbcDecryptError::UnsupportedKeyLength(key.len()))?;
    dec.decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|_| AesCbcDecryptError::InvalidCiphertextLength(buf_len))?;
    Ok(())
}
