//! Shared helpers for the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Sample document with a nested directive node and a tuple node.
pub const FEATURES_YAML: &str = r#"
upstream:
  proxy:
    url: "http://{this:host}:{this:port}/"
    host: "{var:host}"
    port: "{int:port}"
  balance: ["{var:primary}", "{var:backup}"]
plain:
  greeting: hello
  empty: ""
"#;

/// Temporary directory holding configuration files for one test.
pub struct TestProject {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    project_dir: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let project_dir = temp_dir.path().to_path_buf();
        Ok(Self {
            _temp_dir: temp_dir,
            project_dir,
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    /// Write `content` to `name` inside the project and return its path.
    pub fn write_config(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.project_dir.join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// The `featgroup` binary, run inside the project with colors off.
    pub fn featgroup(&self) -> Command {
        let mut cmd = Command::cargo_bin("featgroup").unwrap();
        cmd.current_dir(&self.project_dir).env("NO_COLOR", "1").env_remove("FEATGROUP_LOG");
        cmd
    }
}
