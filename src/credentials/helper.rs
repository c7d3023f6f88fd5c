use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use uuid::Uuid;

/// An optional external command that supplies a Credential's secret value
/// at resolve time, for deployments backed by a secrets manager. Checked
/// only when no stored Credential row exists for (user, Source) — it's a
/// provisioning fallback, not a bypass of per-user scoping (SPEC_FULL.md §E).
#[derive(Debug, Clone, Default)]
pub struct CredentialHelperConfig {
    pub command: String,
    pub args: Vec<String>,
}

/// Fetch a token for (user_id, source_id) from the helper process, feeding
/// it a JSON request on stdin and expecting a JSON `{"value": "..."}` back.
pub fn fetch_token(helper: &CredentialHelperConfig, user_id: Uuid, source_id: Uuid) -> Result<String> {
    let stdin_data = serde_json::json!({
        "action": "get",
        "userId": user_id,
        "sourceId": source_id,
    })
    .to_string();

    let output = run_helper_process(&helper.command, &helper.args, &stdin_data)?;
    let parsed: serde_json::Value =
        serde_json::from_str(&output).context("credential helper returned invalid JSON")?;
    parsed["value"]
        .as_str()
        .map(str::to_string)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow::anyhow!("credential helper returned no value"))
}

fn run_helper_process(cmd: &str, args: &[String], stdin_data: &str) -> Result<String> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn credential helper '{cmd}'"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(stdin_data.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("credential helper exited with {}: {}", output.status, stderr.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_with_missing_command_errors() {
        let helper = CredentialHelperConfig {
            command: "definitely-not-a-real-binary-xyz".into(),
            args: vec![],
        };
        let result = fetch_token(&helper, Uuid::new_v4(), Uuid::new_v4());
        assert!(result.is_err());
    }

    #[test]
    fn helper_echoing_valid_json_returns_value() {
        // `cat` echoes stdin back to stdout; we feed JSON with "value" absent
        // from a cat passthrough directly, so round-trip via a tiny shell
        // command that rewrites into the expected shape instead.
        let helper = CredentialHelperConfig {
            command: "sh".into(),
            args: vec!["-c".into(), "echo '{\"value\":\"shhh\"}'".into()],
        };
        let result = fetch_token(&helper, Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert_eq!(result, "shhh");
    }
}
