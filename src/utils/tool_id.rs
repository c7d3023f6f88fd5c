use uuid::Uuid;

/// Replace every byte that isn't alphanumeric or `_` with `_`, collapse
/// consecutive underscores, and cap to `max_len`.
pub fn sanitize(name: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(name.len().min(max_len));
    let mut last_was_underscore = false;
    for ch in name.chars() {
        let mapped = if ch.is_ascii_alphanumeric() { ch } else { '_' };
        if mapped == '_' && last_was_underscore {
            continue;
        }
        last_was_underscore = mapped == '_';
        out.push(mapped);
        if out.len() >= max_len {
            break;
        }
    }
    out.trim_matches('_').to_string()
}

/// First `n` hex characters of a UUID, used as the stable suffix that keeps
/// tool ids unique across operations sharing a display name.
pub fn short_id(id: Uuid, n: usize) -> String {
    let hex = id.simple().to_string();
    hex.chars().take(n).collect()
}

/// `sanitize(name, 55) + "_" + shortId(toolId, 8)`, bounded to 64 characters
/// total.
pub fn tool_identifier(name: &str, tool_id: Uuid) -> String {
    format!("{}_{}", sanitize(name, 55), short_id(tool_id, 8))
}
