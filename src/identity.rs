//! Identity validation and username sanitization
//!
//! Pure functions, no I/O. Validation failure is a normal outcome: every
//! predicate returns `false` for empty or malformed input, never an error.

use crate::config::OnboardingRules;

/// Reduce a username to its record key.
///
/// Lowercases and keeps only ASCII alphanumerics, `-` and `_`. Everything else
/// is dropped, not escaped, so distinct usernames may map to the same key.
pub fn sanitize_username(username: &str) -> String {
    username
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Trim surrounding whitespace and one layer of matching quotes.
pub(crate) fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}

/// Chat-platform id: decimal digits only, length within the configured inclusive range.
pub fn is_valid_chat_id(raw: &str, rules: &OnboardingRules) -> bool {
    let id = unquote(raw);
    !id.is_empty()
        && id.chars().all(|c| c.is_ascii_digit())
        && (rules.discord_id_min_length..=rules.discord_id_max_length).contains(&id.len())
}

/// Wallet address: case-insensitive prefix, exact total length, hex body.
pub fn is_valid_wallet_address(raw: &str, rules: &OnboardingRules) -> bool {
    let wallet = unquote(raw);
    if wallet.len() != rules.wallet_length {
        return false;
    }
    let prefix_len = rules.wallet_prefix.len();
    let Some(prefix) = wallet.get(..prefix_len) else {
        return false;
    };
    if !prefix.eq_ignore_ascii_case(&rules.wallet_prefix) {
        return false;
    }
    let body = &wallet[prefix_len..];
    !body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit())
}

/// Both validity flags for a claimed identity, paired with the raw values.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IdentityCheck {
    pub discord_id: String,
    pub wallet_address: String,
    pub discord_valid: bool,
    pub wallet_valid: bool,
}

impl IdentityCheck {
    pub fn run(discord_id: &str, wallet_address: &str, rules: &OnboardingRules) -> Self {
        Self {
            discord_id: discord_id.to_string(),
            wallet_address: wallet_address.to_string(),
            discord_valid: is_valid_chat_id(discord_id, rules),
            wallet_valid: is_valid_wallet_address(wallet_address, rules),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.discord_valid && self.wallet_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WALLET: &str = "0x1234567890abcdef1234567890abcdef12345678";

    fn rules() -> OnboardingRules {
        OnboardingRules::default()
    }

    #[test]
    fn test_sanitize_drops_and_lowercases() {
        assert_eq!(sanitize_username("Alice"), "alice");
        assert_eq!(sanitize_username("alice!"), "alice");
        assert_eq!(sanitize_username("Bob_the-Builder[bot]"), "bob_the-builderbot");
        assert_eq!(sanitize_username("../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_username("çé"), "");
    }

    #[test]
    fn test_chat_id_bounds() {
        assert!(is_valid_chat_id("123456789012345678", &rules()));
        assert!(is_valid_chat_id("12345678901234567", &rules()));
        assert!(is_valid_chat_id("12345678901234567890", &rules()));
        assert!(!is_valid_chat_id("123456789012345678901", &rules()));
        assert!(!is_valid_chat_id("12345", &rules()));
    }

    #[test]
    fn test_chat_id_rejects_non_digits() {
        assert!(!is_valid_chat_id("abc12345678901234", &rules()));
        assert!(!is_valid_chat_id("", &rules()));
        assert!(!is_valid_chat_id("   ", &rules()));
        assert!(!is_valid_chat_id("1234567890123456-8", &rules()));
    }

    #[test]
    fn test_chat_id_unquotes_one_layer() {
        assert!(is_valid_chat_id("  \"123456789012345678\" ", &rules()));
        assert!(is_valid_chat_id("'123456789012345678'", &rules()));
        assert!(!is_valid_chat_id("\"\"123456789012345678\"\"", &rules()));
        assert!(!is_valid_chat_id("\"123456789012345678'", &rules()));
    }

    #[test]
    fn test_wallet_valid() {
        assert!(is_valid_wallet_address(WALLET, &rules()));
        assert!(is_valid_wallet_address(&format!("\"{WALLET}\""), &rules()));
    }

    #[test]
    fn test_wallet_prefix_case_insensitive() {
        let upper = WALLET.replacen("0x", "0X", 1);
        assert!(is_valid_wallet_address(&upper, &rules()));
    }

    #[test]
    fn test_wallet_wrong_length_or_body() {
        assert!(!is_valid_wallet_address(&WALLET[..40], &rules()));
        assert!(!is_valid_wallet_address(
            "0x1234567890abcdef1234567890abcdef1234567g",
            &rules()
        ));
        assert!(!is_valid_wallet_address(
            "1x1234567890abcdef1234567890abcdef12345678",
            &rules()
        ));
        assert!(!is_valid_wallet_address("", &rules()));
    }

    #[test]
    fn test_wallet_multibyte_input_does_not_panic() {
        let odd = "é".repeat(21);
        assert_eq!(odd.len(), 42);
        assert!(!is_valid_wallet_address(&odd, &rules()));
    }

    #[test]
    fn test_identity_check_pairs_flags_with_values() {
        let check = IdentityCheck::run("12345", WALLET, &rules());
        assert!(!check.discord_valid);
        assert!(check.wallet_valid);
        assert!(!check.is_valid());
        assert_eq!(check.discord_id, "12345");
    }

    proptest! {
        #[test]
        fn sanitize_charset(name in ".{0,40}") {
            let key = sanitize_username(&name);
            prop_assert!(key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
        }

        #[test]
        fn sanitize_idempotent(name in ".{0,40}") {
            let once = sanitize_username(&name);
            prop_assert_eq!(sanitize_username(&once), once.clone());
        }
    }
}
