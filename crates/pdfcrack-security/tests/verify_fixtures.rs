use std::path::PathBuf;

use pdfcrack_security::{
    compute_encryption_key, pad_password, verify, verify_user_password, Cipher,
    EncryptionParameters, PasswordVerifier, StandardSecurityHandler,
};
use proptest::prelude::*;

const FILE_ID: &str = "7f3a9c52e1b04d8896a2c4e6f8011a3b";

fn fixture(rel: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(rel)
}

fn load(rel: &str) -> EncryptionParameters {
    EncryptionParameters::from_path(fixture(rel))
        .unwrap_or_else(|err| panic!("failed to load {rel}: {err}"))
}

fn params(
    version: u32,
    revision: u32,
    bits: u32,
    permissions: i32,
    owner: &str,
    user: &str,
) -> EncryptionParameters {
    EncryptionParameters {
        version,
        revision,
        key_length_bits: bits,
        permissions,
        owner_verifier: hex::decode(owner).unwrap(),
        user_verifier: hex::decode(user).unwrap(),
        file_identifier: hex::decode(FILE_ID).unwrap(),
        encrypt_metadata: true,
        cipher: Cipher::Rc4,
        pdf_version: None,
    }
}

#[test]
fn r2_forty_bit_known_answer() {
    let params = load("encrypted/rc4-40-r2.pdf");
    let key = compute_encryption_key(b"test", &params);
    assert_eq!(hex::encode(key.as_bytes()), "8bd24177d5");
    assert!(verify("test", &params));
    assert!(!verify("Test", &params));
    assert!(!verify("", &params));
}

#[test]
fn r3_known_answer() {
    let params = load("encrypted/rc4-128-r3.pdf");
    let key = compute_encryption_key(b"secret", &params);
    assert_eq!(hex::encode(key.as_bytes()), "e3312b12a9bd90936eba99ed0e01617d");
    assert!(verify("secret", &params));
    assert!(!verify("wrong", &params));
}

#[test]
fn r3_forty_bit_key_uses_five_byte_rounds() {
    let params = params(
        2,
        3,
        40,
        -4,
        "33417d38977ebfdb1974b696a0740839b9a05fcfb17bd8ef4450e8520aba1e92",
        "4dd1a383b3b68d7ad54063b1b07727cd000102030405060708090a0b0c0d0e0f",
    );
    let key = compute_encryption_key(b"zz9", &params);
    assert_eq!(hex::encode(key.as_bytes()), "e7cbca2adc");
    assert!(verify("zz9", &params));
    assert!(!verify("zz8", &params));
}

#[test]
fn passwords_longer_than_32_bytes_are_truncated() {
    let params = params(
        2,
        3,
        128,
        -3904,
        "1fb28549c5202abec051b575484bef32a568ac589de8a4b9eff27b098c4afbba",
        "5f23bb38b0af1e5b5a67ecf56afb3122000102030405060708090a0b0c0d0e0f",
    );
    let full = "abcdefghijklmnopqrstuvwxyz0123456789";
    assert!(verify(full, &params));
    assert!(verify(&full[..32], &params));
    assert!(verify(&format!("{}!!!", &full[..32]), &params));
    assert!(!verify(&full[..31], &params));
}

#[test]
fn r4_rc4_without_metadata_encryption_known_answer() {
    let params = load("encrypted/rc4-128-r4-nometadata.pdf");
    let key = compute_encryption_key(b"metadata", &params);
    assert_eq!(hex::encode(key.as_bytes()), "4d0f5c54190db246cea300ef1f5b894b");
    assert!(verify("metadata", &params));

    // The 0xFFFFFFFF marker is part of the key hash: flipping the flag breaks verification.
    let mut with_metadata = params.clone();
    with_metadata.encrypt_metadata = true;
    assert!(!verify("metadata", &with_metadata));
}

#[test]
fn r4_aes_known_answer() {
    let params = load("encrypted/aes-128-r4.pdf");
    let key = compute_encryption_key(b"aespass", &params);
    assert_eq!(hex::encode(key.as_bytes()), "42df1b1f2f44765c603e259b68a8a4b1");
    assert!(verify("aespass", &params));
    assert!(!verify("aespass ", &params));

    // The same parameters read as RC4 do not verify.
    let mut as_rc4 = params.clone();
    as_rc4.cipher = Cipher::Rc4;
    assert!(!verify("aespass", &as_rc4));
}

#[test]
fn aes_single_byte_flips_in_user_verifier_reject_the_password() {
    let params = load("encrypted/aes-128-r4.pdf");
    assert_eq!(params.user_verifier.len(), 32);
    for idx in 0..params.user_verifier.len() {
        let mut tampered = params.clone();
        tampered.user_verifier[idx] ^= 0x01;
        assert!(!verify("aespass", &tampered), "flip at byte {idx} still verified");
    }
}

#[test]
fn rc4_r3_only_compares_the_first_sixteen_bytes() {
    let params = load("encrypted/rc4-128-r3.pdf");
    let mut tail_changed = params.clone();
    tail_changed.user_verifier[20] ^= 0xFF;
    assert!(verify("secret", &tail_changed));

    let mut head_changed = params.clone();
    head_changed.user_verifier[3] ^= 0xFF;
    assert!(!verify("secret", &head_changed));
}

#[test]
fn handler_matches_free_function() {
    for (rel, password) in [
        ("encrypted/rc4-40-r2.pdf", "test"),
        ("encrypted/rc4-128-r3.pdf", "secret"),
        ("encrypted/rc4-128-r4-nometadata.pdf", "metadata"),
        ("encrypted/aes-128-r4.pdf", "aespass"),
    ] {
        let params = load(rel);
        let handler = StandardSecurityHandler::new(&params).unwrap();
        assert!(PasswordVerifier::verify(&handler, password.as_bytes()), "{rel}");
        assert!(!PasswordVerifier::verify(&handler, b"nope"), "{rel}");
    }
}

#[test]
fn latin1_password_is_verified_as_raw_bytes() {
    let params = load("encrypted/rc4-40-r2-latin1.pdf");
    assert!(verify_user_password(b"caf\xe9", &params));
    // The UTF-8 spelling is a different byte string.
    assert!(!verify("café", &params));
    assert!(!verify_user_password("caf\u{FFFD}".as_bytes(), &params));

    let handler = StandardSecurityHandler::new(&params).unwrap();
    assert!(PasswordVerifier::verify(&handler, b"caf\xe9"));
}

#[test]
fn revision_six_never_verifies() {
    let params = load("encrypted/aes-256-r6.pdf");
    assert!(StandardSecurityHandler::new(&params).is_err());
    assert!(!verify("", &params));
    assert!(!verify("anything", &params));
}

#[test]
fn pad_password_is_always_32_bytes() {
    for len in [0usize, 4, 32, 33, 100] {
        let password = vec![b'p'; len];
        let padded = pad_password(&password);
        assert_eq!(padded.len(), 32);
        let kept = len.min(32);
        assert!(padded[..kept].iter().all(|&b| b == b'p'));
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

    #[test]
    fn verification_is_deterministic(candidate in "[ -~]{0,32}") {
        let params = load("encrypted/rc4-128-r3.pdf");
        let first = verify(&candidate, &params);
        let second = verify(&candidate, &params);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first, candidate == "secret");
    }

    #[test]
    fn aes_verification_is_deterministic(candidate in "[a-z]{0,12}") {
        let params = load("encrypted/aes-128-r4.pdf");
        prop_assert_eq!(verify(&candidate, &params), verify(&candidate, &params));
    }
}
