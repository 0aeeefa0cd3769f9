//! Webhook signing secret generation and masking.

/// Prefix carried by every webhook signing secret.
///
/// The prefix lets operators and log scrubbers tell a webhook secret apart
/// from other credential types at a glance.
pub const SECRET_PREFIX: &str = "whsec_";

/// Number of random bytes behind the hex portion of a secret.
const SECRET_RANDOM_BYTES: usize = 32;

/// Length of the hex portion of a secret.
pub const SECRET_HEX_LENGTH: usize = SECRET_RANDOM_BYTES * 2;

/// Filler character used when masking a secret for display.
const MASK_CHAR: char = '*';

/// Generate a new webhook signing secret.
///
/// Format: `whsec_` + 64 hex characters (32 random bytes).
///
/// SECURITY: Uses `OsRng` directly from the operating system's CSPRNG.
#[must_use]
pub fn generate_secret() -> String {
    use rand::rngs::OsRng;
    use rand::RngCore;
    let mut random_bytes = [0u8; SECRET_RANDOM_BYTES];
    OsRng.fill_bytes(&mut random_bytes);
    let hex_string = hex::encode(random_bytes);

    format!("{SECRET_PREFIX}{hex_string}")
}

/// The masked form shown by list/get responses.
///
/// The `whsec_` prefix stays visible so operators can recognize the
/// credential type in client tooling; the random portion is replaced with a
/// fixed filler and the live secret is never re-exposed after creation or
/// rotation.
#[must_use]
pub fn masked_secret() -> String {
    let mut masked = String::with_capacity(SECRET_PREFIX.len() + SECRET_HEX_LENGTH);
    masked.push_str(SECRET_PREFIX);
    for _ in 0..SECRET_HEX_LENGTH {
        masked.push(MASK_CHAR);
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_secret_has_prefix_and_length() {
        let secret = generate_secret();
        assert!(secret.starts_with(SECRET_PREFIX));
        assert_eq!(secret.len(), SECRET_PREFIX.len() + SECRET_HEX_LENGTH);
    }

    #[test]
    fn test_generated_secret_hex_portion_is_hex() {
        let secret = generate_secret();
        let hex_part = &secret[SECRET_PREFIX.len()..];
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_secrets_are_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
    }

    #[test]
    fn test_masked_secret_never_equals_a_real_secret() {
        let secret = generate_secret();
        let masked = masked_secret();
        assert_ne!(secret, masked);
        assert_eq!(masked.len(), secret.len());
        assert!(masked.starts_with(SECRET_PREFIX));
        assert!(masked[SECRET_PREFIX.len()..].chars().all(|c| c == '*'));
    }
}
