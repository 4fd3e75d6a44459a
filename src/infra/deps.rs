//! # Dependency Check Module / 依赖检查模块
//!
//! Verifies that the external tools a run shells out to are installed and
//! recent enough, before any scenario is touched.
//!
//! 在运行任何场景之前，验证所依赖的外部工具已安装且版本足够新。

use regex::Regex;
use std::cmp::Ordering;
use std::io::ErrorKind;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// An external tool and the minimum version required.
#[derive(Debug, Clone)]
pub struct ToolRequirement {
    pub name: &'static str,
    pub args: &'static [&'static str],
    /// Regex whose first capture group is the version string.
    pub version_pattern: &'static str,
    pub minimum: &'static str,
}

pub const REQUIREMENTS: [ToolRequirement; 2] = [
    ToolRequirement {
        name: "molecule",
        args: &["--version"],
        version_pattern: r"molecule\s+([0-9]+(?:\.[0-9]+)+)",
        minimum: "4.0.0",
    },
    ToolRequirement {
        name: "ansible",
        args: &["--version"],
        version_pattern: r"ansible \[core ([0-9]+(?:\.[0-9]+)+)",
        minimum: "2.15.0",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("{tool} command not found. Is it installed and in PATH?")]
    Missing { tool: String },
    #[error("{tool} version {found} is below required {required}")]
    TooOld {
        tool: String,
        found: String,
        required: String,
    },
    #[error("could not extract {tool} version from output: {output}")]
    Unparseable { tool: String, output: String },
    #[error("`{tool} --version` failed: {reason}")]
    Failed { tool: String, reason: String },
}

/// Removes ANSI color escape sequences.
pub fn strip_ansi(text: &str) -> String {
    // The pattern is a literal and always compiles.
    match Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]") {
        Ok(re) => re.replace_all(text, "").into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Compares dotted numeric versions; missing components count as zero and
/// non-numeric suffixes on a component are ignored (`2.15.0rc1` is `2.15.0`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    fn parts(v: &str) -> Vec<u64> {
        v.split('.')
            .map(|p| {
                let digits: String = p.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    }
    let (a, b) = (parts(a), parts(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let ord = a.get(i).unwrap_or(&0).cmp(b.get(i).unwrap_or(&0));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Checks one tool's `--version` output against its requirement.
pub fn evaluate_output(req: &ToolRequirement, output: &str) -> Result<String, DependencyError> {
    let clean = strip_ansi(output);
    let captured = Regex::new(req.version_pattern)
        .ok()
        .and_then(|re| re.captures(&clean))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let Some(found) = captured else {
        let snippet: String = clean.trim().chars().take(100).collect();
        return Err(DependencyError::Unparseable {
            tool: req.name.to_string(),
            output: snippet,
        });
    };

    if compare_versions(&found, req.minimum) == Ordering::Less {
        return Err(DependencyError::TooOld {
            tool: req.name.to_string(),
            found,
            required: req.minimum.to_string(),
        });
    }
    Ok(found)
}

async fn check_tool(req: &ToolRequirement) -> Result<String, DependencyError> {
    let output = match Command::new(req.name).args(req.args).output().await {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(DependencyError::Missing {
                tool: req.name.to_string(),
            });
        }
        Err(e) => {
            return Err(DependencyError::Failed {
                tool: req.name.to_string(),
                reason: e.to_string(),
            });
        }
    };
    if !output.status.success() {
        return Err(DependencyError::Failed {
            tool: req.name.to_string(),
            reason: format!("exit status {}", output.status),
        });
    }
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    evaluate_output(req, &text)
}

/// Runs every requirement check and collects all problems found.
///
/// 运行所有依赖检查并收集发现的全部问题。
pub async fn check_dependencies() -> Vec<DependencyError> {
    let mut issues = Vec::new();
    for req in &REQUIREMENTS {
        match check_tool(req).await {
            Ok(version) => debug!(tool = req.name, %version, "Dependency satisfied"),
            Err(e) => issues.push(e),
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        assert_eq!(compare_versions("4.0.0", "4.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("4.0", "4.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("2.9.27", "2.15.0"), Ordering::Less);
        assert_eq!(compare_versions("24.2.1", "4.0.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.16.0rc1", "2.15.0"), Ordering::Greater);
    }

    #[test]
    fn molecule_output_with_colors() {
        let out = "\x1b[1mmolecule\x1b[0m 24.2.0 using python 3.11\n    ansible:2.16.4";
        assert_eq!(evaluate_output(&REQUIREMENTS[0], out).unwrap(), "24.2.0");
    }

    #[test]
    fn old_ansible_is_rejected() {
        let out = "ansible [core 2.14.3]\n  config file = None";
        assert_eq!(
            evaluate_output(&REQUIREMENTS[1], out),
            Err(DependencyError::TooOld {
                tool: "ansible".into(),
                found: "2.14.3".into(),
                required: "2.15.0".into(),
            })
        );
    }

    #[test]
    fn garbage_output_is_unparseable() {
        assert!(matches!(
            evaluate_output(&REQUIREMENTS[1], "command not understood"),
            Err(DependencyError::Unparseable { .. })
        ));
    }
}
