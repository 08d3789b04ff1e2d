//! PDF Standard security handler support for password recovery.
//!
//! - [`extract_encryption_parameters`] / [`EncryptionParameters::from_path`] read the encryption
//!   dictionary and trailer `/ID` out of a PDF.
//! - [`StandardSecurityHandler`] derives the file key for a candidate password and checks it
//!   against the user verifier (revisions 2, 3 and 4; RC4 and AESV2).
//! - [`open_batch_verifier`] returns an optional data-parallel backend for the RC4 family.
//!
//! Revision 5 and 6 documents (SHA-256 based derivation) are reported as unsupported.

mod aes_cbc;
mod batch;
mod error;
mod extract;
mod params;
mod rc4;
mod standard;

pub use crate::batch::{open_batch_verifier, BatchUnavailable, BatchVerifier};
pub use crate::error::SecurityError;
pub use crate::extract::extract_encryption_parameters;
pub use crate::params::{Cipher, EncryptionParameters, MAX_KEY_LENGTH, MIN_KEY_LENGTH};
pub use crate::rc4::{rc4_in_place, rc4_transform, Rc4};
pub use crate::standard::{
    compute_encryption_key, pad_password, verify, verify_user_password, DerivedKey,
    PasswordVerifier, StandardSecurityHandler, PASSWORD_PADDING,
};
