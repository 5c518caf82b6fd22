//! Reads `<project>/<control>/hookgate.toml` and applies `HOOKGATE_*`
//! environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use hookgate_kernel::{ConfigError, GateConfig};
use tracing::warn;

pub const FILE_NAME: &str = "hookgate.toml";
const DEFAULT_CONTROL_DIR: &str = ".claude";

/// The control directory name, honouring `HOOKGATE_CONTROL_DIR`.
fn control_dir() -> String {
    std::env::var("HOOKGATE_CONTROL_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONTROL_DIR.to_string())
}

/// Path of the config file for the project at `project_root`.
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(control_dir()).join(FILE_NAME)
}

/// Load the config for `project_root`. Never fails: a missing file yields
/// defaults, an unreadable or invalid one yields defaults plus a warning.
pub fn load(project_root: &Path) -> GateConfig {
    let path = config_path(project_root);
    let mut cfg = match load_from(&path) {
        Ok(Some(cfg)) => cfg,
        Ok(None) => GateConfig::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring config file; using defaults");
            GateConfig::default()
        }
    };
    apply_env_overrides(&mut cfg);
    if let Err(e) = cfg.validate() {
        warn!(error = %e, "invalid configuration; using defaults");
        cfg = GateConfig::default();
        apply_env_overrides(&mut cfg);
    }
    cfg
}

/// Parse the file at `path`. `Ok(None)` when it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<GateConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: GateConfig = toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(Some(cfg))
}

/// Apply `HOOKGATE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HOOKGATE_CONTROL_DIR` | `control_dir` |
/// | `HOOKGATE_TDD_TTL_SECS` | `tdd.ttl_secs` |
/// | `HOOKGATE_RECITATION_WARN` | `recitation.warn_at` |
/// | `HOOKGATE_RECITATION_BLOCK` | `recitation.block_at` |
/// | `HOOKGATE_BUSY_TIMEOUT_MS` | `store.busy_timeout_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut GateConfig) {
    if let Ok(v) = std::env::var("HOOKGATE_CONTROL_DIR")
        && !v.trim().is_empty()
    {
        cfg.control_dir = v;
    }
    if let Some(v) = env_u64("HOOKGATE_TDD_TTL_SECS") {
        cfg.tdd.ttl_secs = v;
    }
    if let Some(v) = env_u64("HOOKGATE_RECITATION_WARN") {
        cfg.recitation.warn_at = v;
    }
    if let Some(v) = env_u64("HOOKGATE_RECITATION_BLOCK") {
        cfg.recitation.block_at = v;
    }
    if let Some(v) = env_u64("HOOKGATE_BUSY_TIMEOUT_MS") {
        cfg.store.busy_timeout_ms = v;
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(".claude").join(FILE_NAME);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("nope.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_config(
            dir.path(),
            r#"
[recitation]
warn_at = 2

[[dangerous_commands]]
pattern = 'terraform\s+destroy'
message = "Infrastructure teardown"
"#,
        );
        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.recitation.warn_at, 2);
        assert_eq!(cfg.recitation.block_at, 5);
        assert_eq!(cfg.dangerous_commands.len(), 1);
        assert_eq!(cfg.dangerous_commands[0].message, "Infrastructure teardown");
        assert_eq!(cfg.control_dir, ".claude");
        assert!(!cfg.restricted_files.is_empty());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_config(dir.path(), "recitation = [not toml");
        assert!(matches!(load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_falls_back_to_defaults_on_bad_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        write_config(dir.path(), "[[[");
        let cfg = load(dir.path());
        assert_eq!(cfg.context.warn_tokens, GateConfig::default().context.warn_tokens);
        assert_eq!(cfg.restricted_git.len(), GateConfig::default().restricted_git.len());
    }

    #[test]
    fn load_rejects_inverted_thresholds() {
        let dir = tempfile::tempdir().expect("tmp dir");
        write_config(dir.path(), "[recitation]\nwarn_at = 9\nblock_at = 2\n");
        let cfg = load(dir.path());
        assert_eq!(cfg.recitation.warn_at, 3);
        assert_eq!(cfg.recitation.block_at, 5);
    }

    #[test]
    fn apply_env_overrides_sets_thresholds_and_ignores_garbage() {
        // SAFETY: the only test in this crate touching these variables.
        unsafe {
            std::env::set_var("HOOKGATE_TDD_TTL_SECS", "60");
            std::env::set_var("HOOKGATE_BUSY_TIMEOUT_MS", "not-a-number");
        }
        let mut cfg = GateConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.tdd.ttl_secs, 60);
        assert_eq!(cfg.store.busy_timeout_ms, 250);
        unsafe {
            std::env::remove_var("HOOKGATE_TDD_TTL_SECS");
            std::env::remove_var("HOOKGATE_BUSY_TIMEOUT_MS");
        }
    }

    #[test]
    fn config_path_lives_in_control_dir() {
        let p = config_path(Path::new("/work/project"));
        assert!(p.ends_with(".claude/hookgate.toml"));
    }
}
