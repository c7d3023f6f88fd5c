use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::sync::Cache;
use uuid::Uuid;

use crate::errors::{BrokerError, BrokerResult};
use crate::model::Credential;

use super::helper::{CredentialHelperConfig, fetch_token};
use super::store::CredentialStore;

/// Looks up the calling user's active secret for a bound Source.
/// Wraps a `CredentialStore` with a short TTL cache so a
/// Turn that fans out many tool calls against the same Source doesn't hit
/// storage per call — never shared across orgs or users.
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    cache: Cache<(Uuid, Uuid), Credential>,
    helper: Option<CredentialHelperConfig>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: Cache::builder().time_to_live(ttl).build(),
            helper: None,
        }
    }

    pub fn with_helper(mut self, helper: CredentialHelperConfig) -> Self {
        self.helper = Some(helper);
        self
    }

    /// Resolve the active Credential for (user, source). Falls back to the
    /// credential helper only when no stored row exists at all; a row that
    /// exists but is soft-deactivated is never masked by the helper.
    pub fn resolve(&self, user_id: Uuid, source_id: Uuid, source_name: &str) -> BrokerResult<Credential> {
        let key = (user_id, source_id);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        if let Some(credential) = self.store.find_active(user_id, source_id) {
            self.cache.insert(key, credential.clone());
            return Ok(credential);
        }

        if let Some(helper) = &self.helper
            && let Ok(token) = fetch_token(helper, user_id, source_id)
        {
            let credential = Credential {
                id: Uuid::new_v4(),
                user_id,
                source_id,
                token: Some(token),
                api_key: None,
                username: None,
                password: None,
                header_name: None,
                header_value: None,
                active: true,
                created_at: Utc::now(),
                rotated_at: None,
            };
            self.store.upsert(credential.clone());
            self.cache.insert(key, credential.clone());
            return Ok(credential);
        }

        Err(BrokerError::MissingCredentials {
            source_name: source_name.to_string(),
        })
    }

    pub fn invalidate(&self, user_id: Uuid, source_id: Uuid) {
        self.cache.invalidate(&(user_id, source_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::store::InMemoryCredentialStore;

    fn sample(user_id: Uuid, source_id: Uuid) -> Credential {
        Credential {
            id: Uuid::new_v4(),
            user_id,
            source_id,
            token: Some("tok".into()),
            api_key: None,
            username: None,
            password: None,
            header_name: None,
            header_value: None,
            active: true,
            created_at: Utc::now(),
            rotated_at: None,
        }
    }

    #[test]
    fn resolves_stored_credential() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let (user, source) = (Uuid::new_v4(), Uuid::new_v4());
        store.upsert(sample(user, source));
        let resolver = CredentialResolver::new(store, Duration::from_secs(60));
        let resolved = resolver.resolve(user, source, "stripe").unwrap();
        assert_eq!(resolved.user_id, user);
    }

    #[test]
    fn missing_credential_without_helper_errors() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let resolver = CredentialResolver::new(store, Duration::from_secs(60));
        let err = resolver
            .resolve(Uuid::new_v4(), Uuid::new_v4(), "stripe")
            .unwrap_err();
        assert_eq!(err.kind(), "missing_credentials");
    }

    #[test]
    fn helper_fallback_provisions_credential() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let resolver = CredentialResolver::new(store, Duration::from_secs(60)).with_helper(
            CredentialHelperConfig {
                command: "sh".into(),
                args: vec!["-c".into(), "echo '{\"value\":\"from-helper\"}'".into()],
            },
        );
        let (user, source) = (Uuid::new_v4(), Uuid::new_v4());
        let resolved = resolver.resolve(user, source, "stripe").unwrap();
        assert_eq!(resolved.token.as_deref(), Some("from-helper"));
    }

    #[test]
    fn cache_hides_subsequent_store_mutation() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let (user, source) = (Uuid::new_v4(), Uuid::new_v4());
        store.upsert(sample(user, source));
        let resolver = CredentialResolver::new(store.clone(), Duration::from_secs(60));
        let first = resolver.resolve(user, source, "stripe").unwrap();
        let mut deactivated = first.clone();
        deactivated.deactivate();
        store.upsert(deactivated);
        let second = resolver.resolve(user, source, "stripe").unwrap();
        assert!(second.active);
    }
}
