//! # Upload Signatures
//!
//! A request is signed with a pre-shared key:
//!
//! ```text
//! signature = base64(SHA-256("u=<identity>,ts=<timestamp>,psk=<secret>"))
//! ```
//!
//! The digest is a shared-secret token, not a signature scheme with
//! non-repudiation. The timestamp is opaque and only bound into the digest.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::errors::{IngestError, IngestResult};
use super::registry::{UploaderConfig, UploaderRegistry};

/// Order-preserving pre-image for the digest.
pub fn canonical_string(identity: &str, timestamp: &str, secret: &str) -> String {
    format!("u={},ts={},psk={}", identity, timestamp, secret)
}

/// Expected signature for the given inputs (44 base64 characters).
pub fn compute_signature(identity: &str, timestamp: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_string(identity, timestamp, secret).as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Constant-time equality of two signatures
fn signatures_match(expected: &str, supplied: &str) -> bool {
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Authenticates a request against the registry.
///
/// The identity is looked up before any hashing, so unknown identities never
/// reach secret-dependent code.
///
/// # Errors
///
/// - `UnknownUploader` if the identity is not registered
/// - `SignatureMismatch` if the supplied signature differs
pub fn verify<'r>(
    registry: &'r UploaderRegistry,
    identity: &str,
    timestamp: &str,
    supplied: &str,
) -> IngestResult<&'r UploaderConfig> {
    let uploader = registry
        .get(identity)
        .ok_or_else(|| IngestError::UnknownUploader {
            uploader: identity.to_string(),
        })?;

    let expected = compute_signature(identity, timestamp, uploader.secret());
    if !signatures_match(&expected, supplied) {
        return Err(IngestError::SignatureMismatch {
            uploader: identity.to_string(),
        });
    }

    Ok(uploader)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> UploaderRegistry {
        let mut registry = UploaderRegistry::new();
        registry
            .register(
                UploaderConfig::new("acme", "s3cret", vec!["UUID".into(), "amount".into()])
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_canonical_string_layout() {
        assert_eq!(
            canonical_string("acme", "1700000000", "s3cret"),
            "u=acme,ts=1700000000,psk=s3cret"
        );
    }

    #[test]
    fn test_signature_is_deterministic_base64_sha256() {
        let a = compute_signature("acme", "1", "s3cret");
        let b = compute_signature("acme", "1", "s3cret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 44);
        assert!(a.ends_with('='));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            compute_signature("acme", "1", "s3cret"),
            "de1huqki7WSNb2g0NR4rJmYTjxRbFP18j8BIUH2GCn0="
        );
        assert_eq!(
            compute_signature("acme", "1700000000", "s3cret"),
            "7wvkP4IWvSVDGxL/CqiToN7Ic+E7vsuZ1XauUS2unyA="
        );
    }

    #[test]
    fn test_each_input_changes_signature() {
        let base = compute_signature("acme", "1", "s3cret");
        assert_ne!(base, compute_signature("acme2", "1", "s3cret"));
        assert_ne!(base, compute_signature("acme", "2", "s3cret"));
        assert_ne!(base, compute_signature("acme", "1", "s3cret!"));
    }

    #[test]
    fn test_verify_accepts_correct_signature() {
        let registry = registry();
        let signature = compute_signature("acme", "42", "s3cret");
        let uploader = verify(&registry, "acme", "42", &signature).unwrap();
        assert_eq!(uploader.identity(), "acme");
    }

    #[test]
    fn test_verify_unknown_uploader() {
        let registry = registry();
        let signature = compute_signature("globex", "42", "s3cret");
        let err = verify(&registry, "globex", "42", &signature).unwrap_err();
        assert!(matches!(err, IngestError::UnknownUploader { .. }));
    }

    #[test]
    fn test_verify_rejects_wrong_timestamp_or_garbage() {
        let registry = registry();
        let signature = compute_signature("acme", "42", "s3cret");

        let err = verify(&registry, "acme", "43", &signature).unwrap_err();
        assert!(matches!(err, IngestError::SignatureMismatch { .. }));

        let err = verify(&registry, "acme", "42", "").unwrap_err();
        assert!(matches!(err, IngestError::SignatureMismatch { .. }));
    }
}
