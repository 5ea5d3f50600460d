use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted owner identifier length.
const MAX_OWNER_LEN: usize = 128;

/// Caller identity is missing or unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnauthorizedError {
    #[error("Caller identity is missing")]
    Missing,

    #[error("Caller identity is invalid")]
    Invalid,
}

/// Identity of the user owning a set of documents.
///
/// Every record query and blob path is scoped by this value, so it is
/// restricted to a path-safe alphabet (`[A-Za-z0-9_-]`, plus `.` inside).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn parse(raw: &str) -> Result<Self, UnauthorizedError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UnauthorizedError::Missing);
        }
        let valid_chars = trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid_chars || trimmed.len() > MAX_OWNER_LEN || trimmed.starts_with('.') {
            return Err(UnauthorizedError::Invalid);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = UnauthorizedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_identifiers() {
        assert_eq!(OwnerId::parse("user-42").unwrap().as_str(), "user-42");
        assert_eq!(OwnerId::parse("  j.doe_1 ").unwrap().as_str(), "j.doe_1");
    }

    #[test]
    fn empty_identity_is_missing() {
        assert_eq!(OwnerId::parse("   "), Err(UnauthorizedError::Missing));
    }

    #[test]
    fn path_like_identity_rejected() {
        assert_eq!(OwnerId::parse("../etc"), Err(UnauthorizedError::Invalid));
        assert_eq!(OwnerId::parse("a/b"), Err(UnauthorizedError::Invalid));
        assert_eq!(OwnerId::parse(".hidden"), Err(UnauthorizedError::Invalid));
        assert_eq!(OwnerId::parse(&"x".repeat(200)), Err(UnauthorizedError::Invalid));
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<OwnerId>("\"alice\"").is_ok());
        assert!(serde_json::from_str::<OwnerId>("\"a b\"").is_err());
    }
}
