//! Normalized email addresses.
//!
//! Accounts log in by email and collaborative purchases match participants
//! by email, so every address is trimmed and lowercased once, on the way in.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why an address was rejected by [`Email::parse`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email address is blank")]
    Blank,
    #[error("email address is longer than {0} characters")]
    TooLong(usize),
    #[error("email address must look like name@domain")]
    Malformed,
}

/// A trimmed, lowercased email address.
///
/// Only the shape `local@domain` is checked (one `@`, neither side empty).
/// Deliverability is left to the mail server.
///
/// ```
/// use best_wishes_core::Email;
///
/// let email = Email::parse(" Nimali@Gifts.Example ").unwrap();
/// assert_eq!(email.as_str(), "nimali@gifts.example");
/// assert!(Email::parse("nimali@").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Longest address accepted, per RFC 5321.
    pub const MAX_LEN: usize = 254;

    /// Normalize and check an address.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] for blank, oversized or malformed input.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Blank);
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(EmailError::TooLong(Self::MAX_LEN));
        }
        match trimmed.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(trimmed.to_lowercase()))
            }
            _ => Err(EmailError::Malformed),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_shapes() {
        for raw in [
            "guest@example.com",
            "first.last+gifts@shop.example.co.uk",
            "a@b.c",
        ] {
            assert!(Email::parse(raw).is_ok(), "{raw} should parse");
        }
    }

    #[test]
    fn test_normalizes_before_storing() {
        let email = Email::parse("  Guest.Friend@Gifts.EXAMPLE \n").unwrap();
        assert_eq!(email.as_str(), "guest.friend@gifts.example");
        assert_eq!(email, Email::parse("guest.friend@gifts.example").unwrap());
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(Email::parse(""), Err(EmailError::Blank));
        assert_eq!(Email::parse(" \t "), Err(EmailError::Blank));
    }

    #[test]
    fn test_length_limit() {
        let long = format!("{}@example.com", "x".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong(Email::MAX_LEN)));
    }

    #[test]
    fn test_malformed_addresses() {
        for raw in ["no-at-sign", "@example.com", "guest@", "a@b@c"] {
            assert_eq!(Email::parse(raw), Err(EmailError::Malformed), "{raw}");
        }
    }

    #[test]
    fn test_wire_form_is_plain_string() {
        let email: Email = "Guest@Example.com".parse().unwrap();
        assert_eq!(email.to_string(), "guest@example.com");
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"guest@example.com\"");
    }
}
