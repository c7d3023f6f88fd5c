pub mod canonical_json;
pub mod redact;
pub mod tool_id;
pub mod truncate;
pub mod url_security;

pub use canonical_json::canonical_json;
pub use redact::tail;
pub use tool_id::{sanitize, short_id, tool_identifier};
pub use truncate::truncate_with_marker;
pub use url_security::validate_url;
