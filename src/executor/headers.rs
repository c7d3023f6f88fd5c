use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use uuid::Uuid;

use crate::errors::{BrokerError, BrokerResult};
use crate::model::{AuthKind, Credential, Source};

/// Build the auth header(s) for a Source + Credential pair.
/// `Accept`/`Content-Type` are added by the caller, which knows
/// the adapter's content type; this only covers the `authKind` switch.
pub fn build_auth_headers(source: &Source, credential: &Credential) -> BrokerResult<HashMap<String, String>> {
    let mut headers = HashMap::new();

    match source.auth_kind {
        AuthKind::None | AuthKind::Passthrough => {}
        AuthKind::Bearer => {
            let token = credential.token.as_deref().ok_or_else(|| BrokerError::MissingCredentials {
                source_name: source.display_name.clone(),
            })?;
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
        AuthKind::ApiKey => {
            let api_key = credential.api_key.as_deref().ok_or_else(|| BrokerError::MissingCredentials {
                source_name: source.display_name.clone(),
            })?;
            let header_name = source
                .auth_config
                .as_ref()
                .and_then(|c| c.header_name.clone())
                .unwrap_or_else(|| "X-API-Key".to_string());
            headers.insert(header_name, api_key.to_string());
        }
        AuthKind::Basic => {
            let username = credential.username.as_deref().unwrap_or("");
            let password = credential.password.as_deref().ok_or_else(|| BrokerError::MissingCredentials {
                source_name: source.display_name.clone(),
            })?;
            let encoded = BASE64.encode(format!("{username}:{password}"));
            headers.insert("Authorization".to_string(), format!("Basic {encoded}"));
        }
        AuthKind::HeaderPair => {
            let header_name = credential.header_name.clone().ok_or_else(|| BrokerError::MissingCredentials {
                source_name: source.display_name.clone(),
            })?;
            let header_value = credential.header_value.as_deref().ok_or_else(|| BrokerError::MissingCredentials {
                source_name: source.display_name.clone(),
            })?;
            headers.insert(header_name, header_value.to_string());
        }
    }

    Ok(headers)
}

/// Mock-isolation header attached whenever a caller userId is present
///.
pub fn mock_user_header(user_id: Uuid) -> (String, String) {
    ("X-Mock-User".to_string(), user_id.to_string())
}
