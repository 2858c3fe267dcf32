//! Stable request fingerprints used as response-cache keys.

/// Fingerprint of a request: blake3 over the upper-cased method and the full
/// URL, hex encoded.
///
/// ```rust
/// use zsdk_common::fingerprint::request_fingerprint;
///
/// let a = request_fingerprint("get", "https://api.example.com/users?page=1");
/// let b = request_fingerprint("GET", "https://api.example.com/users?page=1");
/// assert_eq!(a, b);
/// ```
pub fn request_fingerprint(method: &str, url: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}
