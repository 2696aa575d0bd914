// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation helpers

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// Base-36 encoding of a millisecond timestamp, lowercase.
pub fn ts36(ms: u64) -> String {
    if ms == 0 {
        return "0".to_string();
    }
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = ms;
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    // DIGITS is ASCII, so the buffer is always valid UTF-8.
    String::from_utf8(out).unwrap_or_default()
}

/// Six random lowercase-alphanumeric characters.
pub fn rand6() -> String {
    const ALPHABET: [char; 36] = [
        '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h',
        'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ];
    nanoid::nanoid!(6, &ALPHABET)
}

/// Snapshot id: `snap_<ts36>_<rand6>`.
pub fn snapshot_id(epoch_ms: u64) -> String {
    format!("snap_{}_{}", ts36(epoch_ms), rand6())
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
