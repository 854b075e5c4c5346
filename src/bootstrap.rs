//! Bootstrap helpers for WalletPilot.
//!
//! Provider-selection env vars are persisted to disk so the agent can start
//! before any settings file exists: `LLM_BASE_URL`, `LLM_API_KEY`,
//! `WALLET_BACKEND`, `WALLET_SERVICE_URL`.
//!
//! File: `~/.walletpilot/.env` (standard dotenvy format)

use std::path::PathBuf;

/// Path to the WalletPilot-specific `.env` file: `~/.walletpilot/.env`.
pub fn walletpilot_env_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".walletpilot")
        .join(".env")
}

/// Load env vars from `~/.walletpilot/.env` (in addition to the standard `.env`).
///
/// Call this **after** `dotenvy::dotenv()` so that the standard `./.env`
/// takes priority over `~/.walletpilot/.env`. dotenvy never overwrites
/// existing env vars, so the effective priority is:
///
///   explicit env vars > `./.env` > `~/.walletpilot/.env`
pub fn load_walletpilot_env() {
    let path = walletpilot_env_path();
    if path.exists() {
        let _ = dotenvy::from_path(&path);
    }
}

/// Write bootstrap vars to `~/.walletpilot/.env`.
///
/// Creates the parent directory if it doesn't exist. Values are double-quoted
/// so that `#` and other shell-special characters are preserved by dotenvy.
pub fn save_bootstrap_env(vars: &[(&str, &str)]) -> std::io::Result<()> {
    save_bootstrap_env_to(&walletpilot_env_path(), vars)
}

fn save_bootstrap_env_to(path: &std::path::Path, vars: &[(&str, &str)]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = String::new();
    for (key, value) in vars {
        // Escape backslashes and double quotes to prevent env var injection
        // (e.g. a value containing `"\nINJECTED="x` would break out of quotes).
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        content.push_str(&format!("{}=\"{}\"\n", key, escaped));
    }
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_path_lives_under_walletpilot() {
        let path = walletpilot_env_path();
        assert!(path.to_string_lossy().contains(".walletpilot"));
        assert!(path.to_string_lossy().ends_with(".env"));
    }

    #[test]
    fn saved_vars_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        save_bootstrap_env_to(
            &path,
            &[
                ("LLM_BASE_URL", "http://localhost:11434/v1"),
                ("LLM_API_KEY", "sk-test#with-hash"),
            ],
        )
        .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("LLM_BASE_URL=\"http://localhost:11434/v1\"\n"));
        assert!(content.contains("LLM_API_KEY=\"sk-test#with-hash\"\n"));
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        save_bootstrap_env_to(&path, &[("KEY", "a\"b\\c")]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "KEY=\"a\\\"b\\\\c\"\n");
    }

    #[test]
    fn injection_attempt_stays_inside_the_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        save_bootstrap_env_to(&path, &[("KEY", "x\"\nINJECTED=\"y")]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        // The whole payload must remain one quoted KEY line.
        assert_eq!(content.matches('\n').count(), 2);
        assert!(content.starts_with("KEY=\"x\\\""));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join(".env");
        save_bootstrap_env_to(&path, &[("A", "1")]).unwrap();
        assert!(path.exists());
    }
}
