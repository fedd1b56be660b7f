//! Booking codes: `BK` followed by exactly 12 digits.
//!
//! The code is what customers type into the bank transfer memo, so the
//! generator and the memo extraction pattern must change together.
//! Extraction from free text is best effort: banks truncate, reorder and
//! strip memo text, and an unmatched memo is simply skipped.

use std::sync::OnceLock;

use regex::Regex;

pub const PREFIX: &str = "BK";
const DIGITS: usize = 12;

pub fn generate() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 10u128.pow(DIGITS as u32);
    format!("{PREFIX}{n:012}")
}

fn memo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(BK\d{12})(?:\D|$)").expect("booking code pattern is valid")
    })
}

/// Pull the first booking code out of a transfer memo.
pub fn extract_from_memo(memo: &str) -> Option<String> {
    memo_pattern()
        .captures(memo)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

pub fn looks_like_code(s: &str) -> bool {
    s.len() == PREFIX.len() + DIGITS
        && s[..PREFIX.len()].eq_ignore_ascii_case(PREFIX)
        && s[PREFIX.len()..].bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_match_memo_pattern() {
        for _ in 0..50 {
            let code = generate();
            assert!(looks_like_code(&code), "{code}");
            let memo = format!("MBVCB.123456.{code}.CT tu 0123 toi 4567");
            assert_eq!(extract_from_memo(&memo), Some(code));
        }
    }

    #[test]
    fn test_extract_case_insensitive() {
        assert_eq!(
            extract_from_memo("thanh toan bk250601123456 phong 3"),
            Some("BK250601123456".to_string())
        );
    }

    #[test]
    fn test_extract_rejects_wrong_digit_count() {
        assert_eq!(extract_from_memo("BK12345678901"), None);
        assert_eq!(extract_from_memo("BK1234567890123"), None);
        assert_eq!(extract_from_memo("no code here"), None);
    }

    #[test]
    fn test_extract_at_end_of_memo() {
        assert_eq!(
            extract_from_memo("CK BK000000000042"),
            Some("BK000000000042".to_string())
        );
    }
}
