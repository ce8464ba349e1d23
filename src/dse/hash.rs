//! Spec-hash computation (spec.md §4.1, §5 "Hash stability", §9 "Spec-hash
//! as change detector"): SHA-256 over the canonical JSON encoding of any
//! serializable sub-spec, truncated to the first 16 hex chars for use as an
//! annotation value.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const SPEC_HASH_ANNOTATION: &str = "apps.example.com/spec-hash";

/// Hashes the canonical JSON encoding of `value`. Struct fields serialize in
/// declaration order and all maps in this crate's spec types are
/// `BTreeMap`s, so the JSON encoding — and therefore the hash — is stable
/// across processes regardless of map iteration order (spec.md §5).
pub fn spec_hash<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value).map_err(Error::SerializationError)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    Ok(format!("{digest:x}")[..16].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        a: i32,
        b: String,
    }

    #[test]
    fn hash_is_16_hex_chars() {
        let h = spec_hash(&Sample { a: 1, b: "x".into() }).unwrap();
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_is_deterministic_across_invocations() {
        let s = Sample { a: 42, b: "hello".into() };
        let h1 = spec_hash(&s).unwrap();
        let h2 = spec_hash(&s).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_changes_with_content() {
        let h1 = spec_hash(&Sample { a: 1, b: "x".into() }).unwrap();
        let h2 = spec_hash(&Sample { a: 2, b: "x".into() }).unwrap();
        assert_ne!(h1, h2);
    }
}
