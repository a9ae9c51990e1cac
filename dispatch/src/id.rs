//! Request identifiers.
//!
//! An identifier is the current time in milliseconds written in base 62,
//! followed by a v4 UUID whose hex letters have their case flipped at random.
//! The time prefix keeps identifiers roughly sortable; uniqueness is enforced
//! downstream by whoever stores them.

use rand::Rng;
use rand::rngs::OsRng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Digits in ASCII order so that equal-length prefixes sort by time.
const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Generate a new request identifier.
pub fn generate_id() -> String {
    let mut id = encode_base62(now_millis());
    id.push_str(&mixed_case_uuid());
    id
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn encode_base62(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE62[(value % 62) as usize]);
        value /= 62;
    }
    digits.reverse();

    // Only ASCII digits were pushed
    String::from_utf8_lossy(&digits).into_owned()
}

fn mixed_case_uuid() -> String {
    let mut rng = OsRng;
    uuid::Uuid::new_v4()
        .hyphenated()
        .to_string()
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() && rng.gen_bool(0.5) {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}
