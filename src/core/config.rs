//! # Configuration Module / 配置模块
//!
//! The per-user configuration file and the resolution of the roles path.
//!
//! The file lives at `$XDG_CONFIG_HOME/moltest/config.toml` (or the platform
//! config directory when `XDG_CONFIG_HOME` is unset):
//!
//! ```toml
//! roles_path = "~/src/ansible/roles"
//! command = "molecule test -s {scenario}"
//! parallel = 4
//!
//! [env]
//! MOLECULE_NO_LOG = "false"
//! ```
//!
//! 用户级配置文件以及角色路径的解析。

use anyhow::{Context, Result};
use dialoguer::{Input, theme::ColorfulTheme};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::execution::DEFAULT_COMMAND;
use crate::infra::fs;

pub const CONFIG_DIR_NAME: &str = "moltest";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_ROLES_PATH: &str = "roles";

/// Settings persisted between invocations.
/// 在多次调用之间持久化的设置。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles_path: Option<String>,
    /// Test command template; `{scenario}` and `{id}` are substituted per record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Default for `--parallel` when the flag is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
    /// Extra environment applied to every scenario.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl UserConfig {
    /// `$XDG_CONFIG_HOME/moltest/config.toml`, falling back to the platform
    /// config directory.
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::config_dir)?;
        Some(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the file at `path`. A missing file yields the defaults; so does an
    /// unparsable one, with a warning.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No user configuration loaded");
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring invalid configuration file");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let body = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::ensure_parent_dir(path)?;
        fs::atomic_write(path, body.as_bytes())
            .with_context(|| format!("Failed to write configuration to {}", path.display()))
    }

    pub fn command_template(&self) -> &str {
        self.command.as_deref().unwrap_or(DEFAULT_COMMAND)
    }
}

/// The loaded configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pub path: Option<PathBuf>,
    pub config: UserConfig,
}

impl ConfigStore {
    pub fn load() -> Self {
        let path = UserConfig::default_path();
        let config = path
            .as_deref()
            .map(UserConfig::load_from)
            .unwrap_or_default();
        Self { path, config }
    }

    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.config.save_to(path),
            None => {
                warn!("No configuration directory available; settings not saved");
                Ok(())
            }
        }
    }
}

/// Where the effective roles path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolesPathSource {
    CommandLine,
    Config,
    Prompt,
    Default,
}

/// Picks the roles path: command line, then configuration, then an
/// interactive prompt (only when `prompt` is given), then `roles`.
///
/// Values from the command line or the prompt are written back into `config`
/// when they differ from what was stored. Returns the raw (unexpanded) value,
/// its source and whether `config` changed.
///
/// 选择角色路径：命令行 > 配置 > 交互式提示 > 默认值 `roles`。
pub fn choose_roles_path<P>(
    cli: Option<&str>,
    config: &mut UserConfig,
    prompt: Option<P>,
) -> Result<(String, RolesPathSource, bool)>
where
    P: FnOnce() -> Result<String>,
{
    if let Some(value) = cli.filter(|v| !v.trim().is_empty()) {
        let changed = config.roles_path.as_deref() != Some(value);
        if changed {
            config.roles_path = Some(value.to_string());
        }
        return Ok((value.to_string(), RolesPathSource::CommandLine, changed));
    }

    if let Some(value) = config.roles_path.clone().filter(|v| !v.trim().is_empty()) {
        return Ok((value, RolesPathSource::Config, false));
    }

    if let Some(prompt) = prompt {
        let answer = prompt()?;
        let answer = answer.trim();
        if !answer.is_empty() {
            config.roles_path = Some(answer.to_string());
            return Ok((answer.to_string(), RolesPathSource::Prompt, true));
        }
    }

    Ok((DEFAULT_ROLES_PATH.to_string(), RolesPathSource::Default, false))
}

/// Asks for the roles path on the terminal.
pub fn prompt_roles_path() -> Result<String> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt("Path to your Ansible roles directory")
        .default(DEFAULT_ROLES_PATH.to_string())
        .interact_text()
        .context("Failed to read roles path from terminal")
}

/// Resolves the roles path against `root`, persisting new values to the
/// configuration file. The prompt is only offered when stdin is a terminal.
pub fn resolve_roles_path(cli: Option<&str>, store: &mut ConfigStore, root: &Path) -> Result<PathBuf> {
    let interactive = std::io::stdin().is_terminal();
    let prompt = interactive.then_some(prompt_roles_path);
    let (raw, source, changed) = choose_roles_path(cli, &mut store.config, prompt)?;

    if changed {
        if let Err(e) = store.save() {
            warn!(error = %e, "Could not persist roles path");
        }
    }

    let resolved = fs::resolve_path(&raw, root)?;
    info!(?source, path = %resolved.display(), "Resolved roles path");
    Ok(resolved)
}
