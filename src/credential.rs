//! Secret handling for registry and API credentials
//!
//! A `Credential` never appears in `Debug`/`Display` output. Any text that
//! might have seen the secret (git stderr, HTTP bodies, remote URLs) is passed
//! through [`Credential::redact`] before it reaches an error or a log line.

use std::fmt;

use url::Url;

use crate::error::{RegistryError, Result};

const REDACTED: &str = "***";

/// Access token supplied per invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, rejecting empty or whitespace-only values.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(RegistryError::Configuration(
                "credential must not be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Raw secret, for the single place that has to hand it to a transport.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replace every occurrence of the secret (and its URL-encoded form) in `text`.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.replace(&self.0, REDACTED);
        let encoded = encode_userinfo(&self.0);
        if encoded != self.0 {
            out = out.replace(&encoded, REDACTED);
        }
        out
    }

    /// Embed the credential as URL userinfo for https remotes.
    ///
    /// Other schemes and plain paths are returned unchanged.
    pub fn authenticated_url(&self, remote: &str) -> Result<String> {
        if !remote.starts_with("https://") {
            return Ok(remote.to_string());
        }
        let mut url = Url::parse(remote)
            .map_err(|e| RegistryError::Configuration(format!("invalid registry url: {e}")))?;
        url.set_username(&self.0).map_err(|_| {
            RegistryError::Configuration("registry url cannot carry a credential".to_string())
        })?;
        Ok(url.to_string())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Strip any userinfo from a URL for logging.
pub fn display_remote(remote: &str) -> String {
    match Url::parse(remote) {
        Ok(mut url) if url.has_authority() => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        _ => remote.to_string(),
    }
}

fn encode_userinfo(secret: &str) -> String {
    let mut url = match Url::parse("https://host.invalid/") {
        Ok(url) => url,
        Err(_) => return secret.to_string(),
    };
    if url.set_username(secret).is_err() {
        return secret.to_string();
    }
    url.username().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_hide_secret() {
        let cred = Credential::new("ghp_secretvalue").unwrap();
        assert!(!format!("{cred:?}").contains("ghp_secretvalue"));
        assert!(!format!("{cred}").contains("ghp_secretvalue"));
    }

    #[test]
    fn test_empty_credential_rejected() {
        assert!(matches!(
            Credential::new("   "),
            Err(RegistryError::Configuration(_))
        ));
    }

    #[test]
    fn test_authenticated_url_for_https() {
        let cred = Credential::new("ghp_abc").unwrap();
        let url = cred
            .authenticated_url("https://gist.github.com/0123abcd.git")
            .unwrap();
        assert_eq!(url, "https://ghp_abc@gist.github.com/0123abcd.git");
    }

    #[test]
    fn test_local_remote_left_untouched() {
        let cred = Credential::new("ghp_abc").unwrap();
        assert_eq!(
            cred.authenticated_url("/srv/registry.git").unwrap(),
            "/srv/registry.git"
        );
    }

    #[test]
    fn test_redact_removes_plain_and_encoded_forms() {
        let cred = Credential::new("tok@en").unwrap();
        let stderr = "fatal: could not read from https://tok%40en@github.com and tok@en";
        let redacted = cred.redact(stderr);
        assert!(!redacted.contains("tok@en"));
        assert!(!redacted.contains("tok%40en"));
        assert!(redacted.contains("***"));
    }

    #[test]
    fn test_display_remote_strips_userinfo() {
        assert_eq!(
            display_remote("https://ghp_abc@gist.github.com/x.git"),
            "https://gist.github.com/x.git"
        );
        assert_eq!(display_remote("/srv/registry.git"), "/srv/registry.git");
    }
}
