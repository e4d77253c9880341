//! Client identity and per-client state.

use std::fmt;

use liftlog_types::{CoachSettings, UserProfile};

use crate::error::{Result, SessionError};

/// Longest accepted client token.
const MAX_TOKEN_LEN: usize = 128;

/// Opaque identifier of one client, carried in a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientToken(String);

impl ClientToken {
    /// A fresh random token.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Accept a token presented by a client.
    ///
    /// Tokens are 1-128 characters of ASCII letters, digits, `-` or `_`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_TOKEN_LEN {
            return Err(SessionError::InvalidToken(format!(
                "length {} outside 1..={MAX_TOKEN_LEN}",
                raw.len()
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(SessionError::InvalidToken(format!(
                "unexpected character {bad:?}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything remembered about one client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    /// Chat session new questions go to.
    pub active_session: Option<String>,
    pub profile: UserProfile,
    pub settings: CoachSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_valid_and_unique() {
        let a = ClientToken::generate();
        let b = ClientToken::generate();
        assert_ne!(a, b);
        assert_eq!(ClientToken::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        assert!(ClientToken::parse("").is_err());
        assert!(ClientToken::parse("   ").is_err());
        assert!(ClientToken::parse("has space").is_err());
        assert!(ClientToken::parse("semi;colon").is_err());
        assert!(ClientToken::parse(&"a".repeat(129)).is_err());
        assert_eq!(ClientToken::parse(" abc-123_x ").unwrap().as_str(), "abc-123_x");
    }

    #[test]
    fn test_default_context() {
        let ctx = ClientContext::default();
        assert!(ctx.active_session.is_none());
        assert!(ctx.profile.is_empty());
        assert!(ctx.settings.show_calories);
    }
}
