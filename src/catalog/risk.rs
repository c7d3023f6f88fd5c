use crate::model::RiskLevel;

const DANGEROUS_KEYWORDS: &[&str] = &[
    "delete", "remove", "destroy", "drop", "truncate", "clear", "purge", "wipe", "reset",
    "revoke", "terminate", "kill", "cancel", "disable", "deactivate", "suspend", "ban", "block",
];

const SAFE_PREFIXES: &[&str] = &[
    "get", "list", "read", "fetch", "query", "search", "find", "show", "describe", "inspect",
    "view", "check",
];

const MODERATE_KEYWORDS: &[&str] = &[
    "update", "modify", "edit", "change", "set", "patch", "write", "create", "insert", "add",
    "post", "put", "send", "execute", "run", "trigger", "invoke",
];

/// Classify an Operation's risk from its name and description.
/// First matching rule wins: dangerous keyword anywhere, then a safe-verb
/// prefix on the name, then a moderate keyword, else safe.
pub fn classify(name: &str, description: &str) -> RiskLevel {
    let haystack = format!("{} {}", name.to_lowercase(), description.to_lowercase());

    if DANGEROUS_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
        return RiskLevel::Dangerous;
    }

    let lower_name = name.to_lowercase();
    if SAFE_PREFIXES.iter().any(|p| lower_name.starts_with(p)) {
        return RiskLevel::Safe;
    }

    if MODERATE_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
        return RiskLevel::Moderate;
    }

    RiskLevel::Safe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangerous_keyword_wins() {
        assert_eq!(classify("get_and_delete_user", "fetches then deletes"), RiskLevel::Dangerous);
    }

    #[test]
    fn safe_prefix() {
        assert_eq!(classify("list_invoices", "lists invoices for a customer"), RiskLevel::Safe);
    }

    #[test]
    fn moderate_keyword() {
        assert_eq!(classify("update_customer", "updates a customer record"), RiskLevel::Moderate);
    }

    #[test]
    fn default_safe() {
        assert_eq!(classify("ping", "health check"), RiskLevel::Safe);
    }

    #[test]
    fn dangerous_beats_safe_prefix() {
        assert_eq!(classify("cancel_subscription", "cancel a subscription"), RiskLevel::Dangerous);
    }
}
