use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::LocatorError;

/// Reference to the source audio. The exact string is the job key; it is
/// validated as an absolute http(s) URL but never normalized.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn parse(raw: &str) -> Result<Self, LocatorError> {
        if raw.trim().is_empty() {
            return Err(LocatorError::Missing);
        }
        let url = url::Url::parse(raw).map_err(|e| LocatorError::Invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(Self(raw.to_owned())),
            other => Err(LocatorError::UnsupportedScheme(other.to_owned())),
        }
    }

    /// Wrap a string already known to be a valid locator (e.g. a stored key).
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(Locator::parse("https://cdn.example.com/talk.mp3").is_ok());
        assert!(Locator::parse("http://localhost:8080/a.wav?sig=abc").is_ok());
    }

    #[test]
    fn key_is_not_normalized() {
        let raw = "https://EXAMPLE.com/a%20b.mp3";
        assert_eq!(Locator::parse(raw).unwrap().as_str(), raw);
    }

    #[test]
    fn empty_is_missing() {
        assert_eq!(Locator::parse(""), Err(LocatorError::Missing));
        assert_eq!(Locator::parse("   "), Err(LocatorError::Missing));
    }

    #[test]
    fn relative_is_invalid() {
        assert!(matches!(
            Locator::parse("talk.mp3"),
            Err(LocatorError::Invalid(_))
        ));
    }

    #[test]
    fn other_schemes_rejected() {
        assert_eq!(
            Locator::parse("ftp://example.com/a.mp3"),
            Err(LocatorError::UnsupportedScheme("ftp".into()))
        );
    }
}
