//! Deterministic request fingerprints
//!
//! A fingerprint is a pure function of operation identity plus normalized
//! parameters: keys sorted, keys and values case-folded and trimmed, so
//! logically identical requests collide on the same cache entry.

/// Derive the cache key for an operation and its parameters
pub fn fingerprint(operation: &str, params: &[(&str, &str)]) -> String {
    let mut normalized: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| {
            (
                k.trim().to_ascii_lowercase(),
                v.trim().to_ascii_lowercase(),
            )
        })
        .collect();
    normalized.sort();

    let mut key = operation.trim().to_ascii_lowercase();
    for (k, v) in normalized {
        key.push('|');
        key.push_str(&k);
        key.push('=');
        key.push_str(&v);
    }
    key
}
