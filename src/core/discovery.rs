//! # Scenario Discovery Module / 场景发现模块
//!
//! Finds Molecule scenarios below a project root. A scenario is any
//! directory `<something>/molecule/<name>/` containing a `molecule.yml`.
//! Optional sidecar files next to `molecule.yml`:
//!
//! - `moltest.tags` - whitespace or comma separated tags
//! - `moltest.params.yml` / `.yaml` / `.json` - parameter sets, either a list
//!   of `{id, vars}` entries or a mapping with a `params` list
//!
//! 在项目根目录下查找 Molecule 场景。场景是包含 `molecule.yml` 的
//! `<something>/molecule/<name>/` 目录。

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::models::{ParameterSet, ScenarioDescriptor};

/// Virtual environment directories that are never searched, along with
/// hidden directories.
pub const VENV_NAMES: [&str; 3] = [".venv", "venv", "env"];
pub const TAGS_FILE: &str = "moltest.tags";
pub const PARAM_FILES: [&str; 3] = [
    "moltest.params.yml",
    "moltest.params.yaml",
    "moltest.params.json",
];

#[derive(Deserialize)]
#[serde(untagged)]
enum ParamsFile {
    List(Vec<RawParameterSet>),
    Wrapped { params: Vec<RawParameterSet> },
}

#[derive(Deserialize)]
struct RawParameterSet {
    #[serde(default)]
    id: Option<serde_yaml::Value>,
    #[serde(default)]
    vars: BTreeMap<String, serde_yaml::Value>,
}

/// Discovers all scenarios under `root`, sorted by id.
///
/// 发现 `root` 下的所有场景，并按 ID 排序。
pub fn discover_scenarios(root: &Path) -> Result<Vec<ScenarioDescriptor>> {
    let mut molecule_dirs = Vec::new();
    find_molecule_dirs(root, &mut molecule_dirs)
        .with_context(|| format!("Failed to scan '{}' for scenarios", root.display()))?;

    let mut scenarios = Vec::new();
    for molecule_dir in molecule_dirs {
        let listing = match fs::read_dir(&molecule_dir) {
            Ok(listing) => listing,
            Err(e) => {
                warn!(path = %molecule_dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };
        let mut entries: Vec<_> = listing
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && path.join("molecule.yml").is_file())
            .collect();
        entries.sort();
        for scenario_dir in entries {
            scenarios.push(parse_scenario(&scenario_dir)?);
        }
    }

    scenarios.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(count = scenarios.len(), "Scenario discovery finished");
    Ok(scenarios)
}

/// Collects `molecule` directories below `dir`. Only a failure to read `dir`
/// itself is an error; unreadable entries further down are logged and skipped.
fn find_molecule_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || VENV_NAMES.contains(&name.as_ref()) {
            continue;
        }
        if name == "molecule" {
            out.push(entry.path());
        } else if let Err(e) = find_molecule_dirs(&entry.path(), out) {
            warn!(path = %entry.path().display(), error = %e, "Skipping unreadable directory");
        }
    }
    Ok(())
}

fn parse_scenario(scenario_dir: &Path) -> Result<ScenarioDescriptor> {
    let scenario_name = file_name(scenario_dir);
    let molecule_dir = scenario_dir.parent().unwrap_or(scenario_dir);
    let execution_path = molecule_dir.parent().unwrap_or(molecule_dir);
    let execution_path = execution_path
        .canonicalize()
        .with_context(|| format!("Failed to resolve '{}'", execution_path.display()))?;

    let id = match role_name(&execution_path, scenario_dir) {
        Some(role) => format!("{role}:{scenario_name}"),
        None => scenario_name.clone(),
    };

    let parameters = load_parameters(scenario_dir);
    Ok(ScenarioDescriptor {
        id,
        scenario_name,
        execution_path,
        tags: load_tags(scenario_dir),
        parameters: if parameters.is_empty() {
            None
        } else {
            Some(parameters)
        },
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `roles/<role>/molecule/<scenario>` and
/// `ansible_collections/<ns>/<coll>/roles/<role>/molecule/<scenario>` carry a role name.
fn role_name(execution_path: &Path, scenario_dir: &Path) -> Option<String> {
    let parent_name = execution_path.parent().map(file_name);
    if parent_name.as_deref() == Some("roles") || file_name(execution_path) == "roles" {
        return Some(file_name(execution_path));
    }
    if parent_name.as_deref() == Some("ansible_collections") {
        let parts: Vec<String> = scenario_dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let roles_idx = parts.iter().position(|p| p == "roles")?;
        return parts.get(roles_idx + 1).cloned();
    }
    None
}

fn load_tags(scenario_dir: &Path) -> BTreeSet<String> {
    let Ok(content) = fs::read_to_string(scenario_dir.join(TAGS_FILE)) else {
        return BTreeSet::new();
    };
    content
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

/// Reads the first parameter file present. An unreadable or malformed file
/// yields no parameter sets.
fn load_parameters(scenario_dir: &Path) -> Vec<ParameterSet> {
    let Some(path) = PARAM_FILES
        .iter()
        .map(|name| scenario_dir.join(name))
        .find(|path| path.is_file())
    else {
        return Vec::new();
    };

    let parsed = fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|content| {
            if path.extension().is_some_and(|ext| ext == "json") {
                serde_json::from_str::<ParamsFile>(&content).map_err(anyhow::Error::from)
            } else {
                serde_yaml::from_str::<ParamsFile>(&content).map_err(anyhow::Error::from)
            }
        });

    let raw = match parsed {
        Ok(ParamsFile::List(list)) | Ok(ParamsFile::Wrapped { params: list }) => list,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring invalid parameter file");
            return Vec::new();
        }
    };

    raw.into_iter()
        .enumerate()
        .map(|(idx, param)| ParameterSet {
            id: param
                .id
                .as_ref()
                .map(value_to_string)
                .unwrap_or_else(|| idx.to_string()),
            vars: param
                .vars
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect(),
        })
        .collect()
}

fn value_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
