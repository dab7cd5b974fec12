/// Seed value of the DJB2 hash, returned unchanged for empty input.
pub const DJB2_SEED: u32 = 5381;

/// DJB2 fingerprint of a byte string.
///
/// Computes `h = h * 33 + c` for every byte, starting from [`DJB2_SEED`],
/// with wrapping arithmetic. Usable in const context so fixed strings can be
/// fingerprinted at compile time.
///
/// # Examples
///
/// ```
/// # use s3slim::hashing::{fingerprint_bytes, DJB2_SEED};
/// const SHOW: u32 = fingerprint_bytes(b"show");
/// assert_ne!(SHOW, DJB2_SEED);
/// assert_eq!(fingerprint_bytes(b""), DJB2_SEED);
/// ```
pub const fn fingerprint_bytes(bytes: &[u8]) -> u32 {
    let mut hash = DJB2_SEED;
    let mut i = 0;
    while i < bytes.len() {
        hash = (hash << 5).wrapping_add(hash).wrapping_add(bytes[i] as u32);
        i += 1;
    }
    hash
}

/// Fingerprints a text field. Empty text hashes to the seed.
pub fn fingerprint(text: &str) -> u32 {
    fingerprint_bytes(text.as_bytes())
}

/// Fingerprints an optional text field; an absent field hashes to the seed.
pub fn fingerprint_opt(text: Option<&str>) -> u32 {
    text.map_or(DJB2_SEED, fingerprint)
}

/// Returns the top-level path segment of an object key.
///
/// One leading `/` is skipped, then everything up to the next `/` is taken:
/// `/show/episode.mp3` and `show/episode.mp3` both yield `show`.
pub fn path_prefix(key: &str) -> &str {
    let rest = key.strip_prefix('/').unwrap_or(key);
    match rest.find('/') {
        Some(end) => &rest[..end],
        None => rest,
    }
}

/// Fingerprint of the top-level path segment of an object key.
///
/// Isolates the show name from keys shaped like `/show/episode.mp3`.
///
/// # Examples
///
/// ```
/// # use s3slim::hashing::{fingerprint, path_prefix_fingerprint};
/// assert_eq!(path_prefix_fingerprint("/show/ep1.mp3"), fingerprint("show"));
/// ```
pub fn path_prefix_fingerprint(key: &str) -> u32 {
    fingerprint(path_prefix(key))
}
