use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::redact_debug;

/// A per-user secret bound to a single Source. Never shared across users.
/// At most one *active* Credential per (user, Source) — enforced by the
/// resolver's lookup query (`credentials::resolver`), not by this type.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_id: Uuid,
    pub token: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub header_name: Option<String>,
    pub header_value: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

redact_debug!(
    Credential,
    id,
    user_id,
    source_id,
    redact_option(token),
    redact_option(api_key),
    username,
    redact_option(password),
    header_name,
    redact_option(header_value),
    active,
    created_at,
    rotated_at,
);

impl Credential {
    /// Deactivate without deleting — soft-deactivated, never removed.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn rotate_token(&mut self, new_token: String) {
        self.token = Some(new_token);
        self.rotated_at = Some(Utc::now());
    }
}
