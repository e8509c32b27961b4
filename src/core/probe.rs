//! Environment probe: verifies required external tools before anything on
//! disk is touched.

use std::path::PathBuf;

use crate::core::error::{MissingToolReport, SetupError};

/// An external tool the setup depends on. Several candidate binary names
/// may satisfy one requirement (`python3` vs `python`).
pub struct ToolRequirement {
    pub name: &'static str,
    pub candidates: &'static [&'static str],
    pub hint: &'static str,
}

pub const REQUIRED_TOOLS: &[ToolRequirement] = &[
    ToolRequirement {
        name: "git",
        candidates: &["git"],
        hint: "install from https://git-scm.com/downloads",
    },
    ToolRequirement {
        name: "python",
        candidates: PYTHON_CANDIDATES,
        hint: "install Python 3 from https://www.python.org/downloads/",
    },
];

#[cfg(target_os = "windows")]
pub const PYTHON_CANDIDATES: &[&str] = &["python"];

#[cfg(not(target_os = "windows"))]
pub const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

/// Resolve a requirement to the first candidate found on the PATH.
pub fn find_tool(requirement: &ToolRequirement) -> Option<PathBuf> {
    requirement
        .candidates
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
}

/// Resolve a Python interpreter suitable for bootstrapping the venv.
pub fn find_python() -> Result<PathBuf, SetupError> {
    PYTHON_CANDIDATES
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
        .ok_or_else(|| SetupError::MissingTool {
            tools: vec![MissingToolReport {
                name: "python".to_string(),
                hint: "install Python 3 from https://www.python.org/downloads/".to_string(),
            }],
        })
}

/// Check every requirement, reporting all missing tools at once.
pub fn probe_tools(tools: &[ToolRequirement]) -> Result<(), SetupError> {
    let missing: Vec<MissingToolReport> = tools
        .iter()
        .filter(|requirement| find_tool(requirement).is_none())
        .map(|requirement| MissingToolReport {
            name: requirement.name.to_string(),
            hint: requirement.hint.to_string(),
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SetupError::MissingTool { tools: missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_passes_with_no_requirements() {
        assert!(probe_tools(&[]).is_ok());
    }

    #[test]
    fn test_probe_reports_unfindable_tool_with_hint() {
        let tools = [ToolRequirement {
            name: "definitely-not-a-real-tool",
            candidates: &["definitely-not-a-real-tool-7c1f"],
            hint: "this tool does not exist",
        }];
        match probe_tools(&tools) {
            Err(SetupError::MissingTool { tools }) => {
                assert_eq!(tools.len(), 1);
                assert_eq!(tools[0].name, "definitely-not-a-real-tool");
                assert_eq!(tools[0].hint, "this tool does not exist");
            }
            other => panic!("expected MissingTool, got {other:?}"),
        }
    }

    #[test]
    fn test_find_tool_locates_a_shell() {
        // Every supported platform ships at least one of these.
        let requirement = ToolRequirement {
            name: "shell",
            candidates: &["sh", "cmd"],
            hint: "",
        };
        assert!(find_tool(&requirement).is_some());
    }
}
