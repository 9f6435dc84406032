//! Cache key and fingerprint derivation.
//!
//! The exact cache key binds the text, target language, model, and the
//! context fingerprint. The similarity fingerprint is derived solely from
//! the whitespace-normalized, lowercased text so that trivial formatting
//! differences land in the same equivalence class.

use sha2::{Digest, Sha256};

/// Truncated fingerprint length in hex characters.
const SHORT_HASH_LEN: usize = 16;

/// Full SHA-256 digest as lowercase hex.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Truncated SHA-256 for compact fingerprints.
pub fn short_hash(input: &str) -> String {
    let mut hex = sha256_hex(input);
    hex.truncate(SHORT_HASH_LEN);
    hex
}

/// Whitespace-normalize and lowercase text for similarity classing.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fingerprint of the normalized text. Deterministic across whitespace and
/// case variation.
pub fn similarity_fingerprint(text: &str) -> String {
    short_hash(&normalize_text(text))
}

/// Fingerprint of the surrounding context: the trailing window of the
/// previous block and the leading window of the next.
pub fn context_fingerprint(context_before: &str, context_after: &str, window_chars: usize) -> String {
    let tail: String = {
        let chars: Vec<char> = context_before.chars().collect();
        let start = chars.len().saturating_sub(window_chars);
        chars[start..].iter().collect()
    };
    let head: String = context_after.chars().take(window_chars).collect();
    short_hash(&format!("{tail}||{head}"))
}

/// Exact cache key for a translation request.
pub fn cache_key(text: &str, target_language: &str, model_name: &str, context_hash: &str) -> String {
    sha256_hex(&format!("{text}|{target_language}|{model_name}|{context_hash}"))
}
