//! Identity claim extraction from free-text comments
//!
//! Two labelled fields are recognised anywhere in the text, in either order:
//!
//! ```text
//! discord: "123456789012345678"
//! wallet: "0x1234567890abcdef1234567890abcdef12345678"
//! ```
//!
//! Labels are case-insensitive and quotes are optional. Both fields must be
//! present; a body with only one of them yields no claim. The wallet shape
//! follows the configured prefix and length; the chat id is always 17-20 digits.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::config::OnboardingRules;
use crate::error::{RegistryError, Result};

/// Digit-run length accepted after the `discord:` label. The configured
/// validator bounds are applied separately to the extracted value.
const CLAIM_DISCORD_DIGITS: (usize, usize) = (17, 20);

static DEFAULT_PARSER: LazyLock<ClaimParser> = LazyLock::new(|| {
    ClaimParser::new(&OnboardingRules::default()).expect("default claim patterns compile")
});

/// A (chat id, wallet) pair asserted in a comment. Values are raw, unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub discord_id: String,
    pub wallet: String,
}

/// Compiled label patterns for one set of onboarding rules.
#[derive(Debug, Clone)]
pub struct ClaimParser {
    discord_re: Regex,
    wallet_re: Regex,
}

impl ClaimParser {
    pub fn new(rules: &OnboardingRules) -> Result<Self> {
        let hex_len = rules.wallet_length.saturating_sub(rules.wallet_prefix.len());
        // Trailing group rejects longer digit/hex runs instead of truncating them.
        let (min_digits, max_digits) = CLAIM_DISCORD_DIGITS;
        let discord = format!(
            r#"(?i)discord:\s*(["']?)([0-9]{{{min_digits},{max_digits}}})(["']?)(?:[^0-9]|$)"#
        );
        let wallet = format!(
            r#"(?i)wallet:\s*(["']?)({}[0-9a-f]{{{}}})(["']?)(?:[^0-9a-f]|$)"#,
            regex::escape(&rules.wallet_prefix),
            hex_len
        );
        Ok(Self {
            discord_re: compile(&discord)?,
            wallet_re: compile(&wallet)?,
        })
    }

    /// Extract a claim, or `None` unless both fields are found.
    pub fn parse(&self, text: &str) -> Option<IdentityClaim> {
        let discord_id = first_quoted_match(&self.discord_re, text)?;
        let wallet = first_quoted_match(&self.wallet_re, text)?;
        Some(IdentityClaim { discord_id, wallet })
    }
}

/// Parse with the default onboarding rules.
pub fn parse_identity_claim(text: &str) -> Option<IdentityClaim> {
    DEFAULT_PARSER.parse(text)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| RegistryError::Configuration(format!("claim pattern rejected: {e}")))
}

/// First match whose closing quote (if any) matches the opening one.
fn first_quoted_match(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .find(quotes_balanced)
        .map(|caps| caps[2].to_string())
}

fn quotes_balanced(caps: &Captures<'_>) -> bool {
    let open = &caps[1];
    let close = &caps[3];
    close.is_empty() || open == close
}
