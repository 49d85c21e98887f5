use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine-wide settings. Tasks bring their own resource limits; these are
/// the knobs of the judging machinery itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory under which per-attempt scratch directories are created.
    #[serde(rename = "workspaceRoot")]
    pub workspace_root: PathBuf,
    /// Cadence of the suspend-sample-resume loop.
    #[serde(rename = "pollIntervalMs", default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Wall-clock time a process may spend making no CPU progress before
    /// it is treated as hung.
    #[serde(rename = "idleLimitMs", default = "default_idle_limit")]
    pub idle_limit_ms: u64,
}

fn default_poll_interval() -> u64 {
    20
}

fn default_idle_limit() -> u64 {
    5000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("attempts"),
            poll_interval_ms: default_poll_interval(),
            idle_limit_ms: default_idle_limit(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval_ms, 20);
        assert_eq!(config.idle_limit_ms, 5000);
    }

    #[test]
    fn from_file() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("engine.yaml");
        let mut file = fs::File::create(&path)?;
        writeln!(file, "workspaceRoot: /tmp/grader")?;
        writeln!(file, "pollIntervalMs: 10")?;

        let config = EngineConfig::from_file(path.to_str().unwrap())?;
        assert_eq!(config.workspace_root, PathBuf::from("/tmp/grader"));
        assert_eq!(config.poll_interval_ms, 10);
        // omitted fields fall back to defaults
        assert_eq!(config.idle_limit_ms, 5000);
        Ok(())
    }
}
