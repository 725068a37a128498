//! Waitlist referral codes.
//!
//! A code is the signup's email local part followed by four random base-36
//! characters, lower-cased: `jane.doe` becomes e.g. `jane.doek3x9`.

use rand::Rng;

use brnno_core::Email;

/// Number of random characters appended to the local part.
pub const SUFFIX_LEN: usize = 4;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a referral code for `email`.
#[must_use]
pub fn generate_referral_code(email: &Email) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            char::from(ALPHABET.get(idx).copied().unwrap_or(b'0'))
        })
        .collect();
    format!("{}{suffix}", email.local_part()).to_lowercase()
}

/// Normalize a code as received in a `?ref=` parameter.
#[must_use]
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_lowercase();
    (!code.is_empty()).then_some(code)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_code_shape() {
        let email = Email::parse("Jane.Doe@Example.com").unwrap();
        for _ in 0..50 {
            let code = generate_referral_code(&email);
            let suffix = code.strip_prefix("jane.doe").unwrap();
            assert_eq!(suffix.len(), SUFFIX_LEN);
            assert!(
                suffix
                    .chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
            );
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" JANE1234 "), Some("jane1234".to_owned()));
        assert_eq!(normalize_code("   "), None);
    }
}
