use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::model::Credential;

/// Storage seam for Credential rows. The broker ships an in-memory
/// implementation for tests and small deployments; a SQLite-backed one
/// would implement the same trait against the audit database's connection
/// pool. At most one active Credential per (user, Source) at a time.
pub trait CredentialStore: Send + Sync {
    fn find_active(&self, user_id: Uuid, source_id: Uuid) -> Option<Credential>;
    fn upsert(&self, credential: Credential);
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    rows: RwLock<HashMap<(Uuid, Uuid), Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn find_active(&self, user_id: Uuid, source_id: Uuid) -> Option<Credential> {
        self.rows
            .read()
            .unwrap()
            .get(&(user_id, source_id))
            .filter(|c| c.active)
            .cloned()
    }

    fn upsert(&self, credential: Credential) {
        self.rows
            .write()
            .unwrap()
            .insert((credential.user_id, credential.source_id), credential);
    }
}
