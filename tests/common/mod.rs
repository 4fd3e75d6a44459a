// Shared test helpers for integration tests
#![allow(dead_code)]

use assert_cmd::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::{TempDir, tempdir};

/// Fails when a `fail` marker exists in the role directory, otherwise exits
/// with `$EXIT_CODE` (default 0).
pub const TEST_COMMAND: &str =
    r#"sh -c 'echo "running {id}"; if [ -f fail ]; then echo "marker found"; exit 3; fi; exit ${EXIT_CODE:-0}'"#;

/// A throwaway Ansible project plus an isolated config directory.
pub struct Project {
    pub root: TempDir,
    pub config_home: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let project = Self {
            root: tempdir().expect("Failed to create project directory"),
            config_home: tempdir().expect("Failed to create config directory"),
        };
        project.write_config(TEST_COMMAND, None);
        project
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_home.path().join("moltest/config.toml")
    }

    pub fn write_config(&self, command: &str, extra: Option<&str>) {
        let path = self.config_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut content = format!("roles_path = \"roles\"\ncommand = '''{command}'''\n");
        if let Some(extra) = extra {
            content.push_str(extra);
        }
        fs::write(path, content).expect("Failed to write config.toml");
    }

    /// Creates `roles/<role>/molecule/<scenario>/molecule.yml` and returns the
    /// scenario directory.
    pub fn add_scenario(&self, role: &str, scenario: &str) -> PathBuf {
        let dir = self
            .path()
            .join("roles")
            .join(role)
            .join("molecule")
            .join(scenario);
        fs::create_dir_all(&dir).expect("Failed to create scenario directory");
        fs::write(dir.join("molecule.yml"), "---\ndriver:\n  name: default\n").unwrap();
        dir
    }

    pub fn tag(&self, role: &str, scenario: &str, tags: &str) {
        let dir = self.add_scenario(role, scenario);
        fs::write(dir.join("moltest.tags"), tags).unwrap();
    }

    pub fn params(&self, role: &str, scenario: &str, yaml: &str) {
        let dir = self.add_scenario(role, scenario);
        fs::write(dir.join("moltest.params.yml"), yaml).unwrap();
    }

    pub fn mark_failing(&self, role: &str) {
        fs::write(self.path().join("roles").join(role).join("fail"), "").unwrap();
    }

    pub fn mark_passing(&self, role: &str) {
        let _ = fs::remove_file(self.path().join("roles").join(role).join("fail"));
    }

    pub fn cache_path(&self) -> PathBuf {
        self.path().join(".moltest_cache.json")
    }

    pub fn cache_json(&self) -> serde_json::Value {
        let content = fs::read_to_string(self.cache_path()).expect("cache file missing");
        serde_json::from_str(&content).expect("cache is not JSON")
    }

    /// `moltest --root <project> <args...>` with colors off, no dependency
    /// probing of the host and a closed stdin.
    pub fn moltest(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("moltest").expect("binary not built");
        cmd.env("XDG_CONFIG_HOME", self.config_home.path())
            .env("CI", "true")
            .env_remove("MOLTEST_LOG")
            .stdin(Stdio::null())
            .arg("--root")
            .arg(self.path())
            .args(args);
        if args.first() == Some(&"run") {
            cmd.arg("--skip-dependency-check");
        }
        cmd
    }
}
