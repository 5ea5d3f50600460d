//! Shared types for the API layer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::TokenGrant;
use crate::core_state::CoreState;
use crate::models::OwnerId;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub tokens: Arc<TokenRegistry>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>, tokens: TokenRegistry) -> Self {
        Self {
            core,
            tokens: Arc::new(tokens),
        }
    }
}

/// Authenticated caller, injected into request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct OwnerContext {
    pub owner: OwnerId,
}

// ═══════════════════════════════════════════════════════════
// Token registry
// ═══════════════════════════════════════════════════════════

/// Maps token hashes to owners. Plain tokens are never stored.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    owners: HashMap<[u8; 32], OwnerId>,
}

impl TokenRegistry {
    pub fn from_grants(grants: &[TokenGrant]) -> Self {
        Self {
            owners: grants
                .iter()
                .map(|g| (g.token_hash, g.owner.clone()))
                .collect(),
        }
    }

    pub fn resolve(&self, token: &str) -> Option<&OwnerId> {
        self.owners.get(&hash_token(token))
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_distinct() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn registry_resolves_known_tokens_only() {
        let alice = OwnerId::parse("alice").unwrap();
        let registry = TokenRegistry::from_grants(&[TokenGrant::new("s3cret", alice.clone())]);
        assert_eq!(registry.resolve("s3cret"), Some(&alice));
        assert_eq!(registry.resolve("S3CRET"), None);
        assert_eq!(registry.len(), 1);
    }
}
