//! Revision tokens: `"<generation>-<hash>"`.
//!
//! The generation is a positive decimal counter; the hash suffix only makes
//! tokens unique and never participates in ordering. Comparisons look at
//! generations alone.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

static REV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-[a-z0-9]+$").expect("revision regex"));

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 output is ascii")
}

/// Parse the decimal generation before the first `-`. Returns `None` for
/// tokens that do not carry one.
pub fn generation(rev: &str) -> Option<u64> {
    rev.split_once('-')?.0.parse().ok()
}

/// Mint the next revision token. Without a predecessor the generation is 1;
/// otherwise the predecessor's generation plus one. A malformed predecessor
/// restarts at 1.
pub fn generate(prev: Option<&str>) -> String {
    let next_gen = prev
        .and_then(generation)
        .map_or(1, |g| g.saturating_add(1));
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u128;
    let salt: u64 = rand::rng().random();
    format!("{next_gen}-{}{}", to_base36(millis), to_base36(salt as u128))
}

/// `a` is newer than `b` iff its generation is strictly larger.
pub fn is_newer(a: &str, b: &str) -> bool {
    generation(a).unwrap_or(0) > generation(b).unwrap_or(0)
}

pub fn is_valid(rev: &str) -> bool {
    REV_RE.is_match(rev)
}
