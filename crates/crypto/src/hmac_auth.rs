//! HMAC authentication for Node registration/update.
//!
//! `HMAC-SHA256(hmacKey, tntAddr || publicUri || "YYYYMMDDHHmm")`, verified
//! against the three minute-keyed values computed at `{-1, 0, +1}` minutes
//! UTC relative to the verification instant, to tolerate bounded clock skew.

use crate::error::CryptoError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

const MINUTE_FORMAT: &[FormatItem<'static>] =
format_description!("[year][month][day][hour repr:24][minute]");

/// Formats a timestamp as the `YYYYMMDDHHmm` string used in the HMAC
/// preimage.
pub fn format_minute(at: OffsetDateTime) -> String {
    at.format(MINUTE_FORMAT)
    .expect("static format description never fails")
}

/// Computes one HMAC value for the given address/uri/minute-string triple.
pub fn compute(hmac_key: &[u8], tnt_addr: &str, public_uri: &str, minute: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(hmac_key).expect("HMAC accepts any key length");
    mac.update(tnt_addr.as_bytes());
    mac.update(public_uri.as_bytes());
    mac.update(minute.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies `candidate` against the HMAC window `{t-1, t, t+1}` minutes
/// around `now`. Accepts if any of the three match.
pub fn verify_in_window(
    hmac_key: &[u8],
    tnt_addr: &str,
    public_uri: &str,
    now: OffsetDateTime,
    candidate: &str,
) -> Result<(), CryptoError> {
    for offset in [-1i64, 0, 1] {
        let at = now + time::Duration::minutes(offset);
        let minute = format_minute(at);
        let expected = compute(hmac_key, tnt_addr, public_uri, &minute);
        if constant_time_eq(&expected, candidate) {
            return Ok(());
        }
    }
    Err(CryptoError::InvalidSignature(
            "HMAC did not match any minute in the {-1,0,+1} window".into(),
    ))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn accepts_exact_minute() {
        let key = b"k".repeat(32);
        let now = datetime!(2024-01-01 12:30:00 UTC);
        let minute = format_minute(now);
        let mac = compute(&key, "addr", "uri", &minute);
        verify_in_window(&key, "addr", "uri", now, &mac).unwrap();
    }

    #[test]
    fn accepts_one_minute_skew_either_direction() {
        let key = b"k".repeat(32);
        let base = datetime!(2024-01-01 12:30:00 UTC);
        let minute = format_minute(base);
        let mac = compute(&key, "addr", "uri", &minute);
        verify_in_window(&key, "addr", "uri", base + time::Duration::minutes(1), &mac).unwrap();
        verify_in_window(&key, "addr", "uri", base - time::Duration::minutes(1), &mac).unwrap();
    }

    #[test]
    fn rejects_two_minute_skew() {
        let key = b"k".repeat(32);
        let base = datetime!(2024-01-01 12:30:00 UTC);
        let minute = format_minute(base);
        let mac = compute(&key, "addr", "uri", &minute);
        assert!(
            verify_in_window(&key, "addr", "uri", base + time::Duration::minutes(2), &mac)
            .is_err()
        );
    }
}
