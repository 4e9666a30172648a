use crate::error::{GuardError, Result};
use crate::io;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// GuardConfig (config.yaml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    /// Declared migration roots. Governed files outside them need no map entry.
    #[serde(default)]
    pub roots: Vec<String>,
    /// Worker cap for a run. Absent means the number of available CPUs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub strict: bool,
    /// Appended to the excludes of every scope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_dirs: Vec<String>,
}

fn default_version() -> u32 {
    1
}

fn default_timeout_seconds() -> u64 {
    60
}

impl GuardConfig {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            roots: Vec::new(),
            parallelism: None,
            timeout_seconds: default_timeout_seconds(),
            strict: false,
            exclude_dirs: Vec::new(),
        }
    }

    /// Load `config.yaml` from a control directory.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::load_file(&paths::config_path(dir))
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GuardError::NotInitialized(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: GuardConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        io::write_yaml(&paths::config_path(dir), self)
    }

    pub fn effective_parallelism(&self) -> usize {
        match self.parallelism {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Settings-level lint. Record-level checks live in `ControlPlane`.
    pub fn validate(&self, project_root: &Path) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.version != 1 {
            warnings.push(ConfigWarning::warning(format!(
                "unsupported config version {} (expected 1)",
                self.version
            )));
        }

        if self.parallelism == Some(0) {
            warnings.push(ConfigWarning::warning(
                "parallelism is 0; falling back to the available CPU count",
            ));
        }

        if self.timeout_seconds == 0 {
            warnings.push(ConfigWarning::error(
                "timeout_seconds is 0; every run would time out",
            ));
        }

        for root in &self.roots {
            let rel = paths::normalize_record_path(root);
            if !project_root.join(&rel).exists() {
                warnings.push(ConfigWarning::warning(format!(
                    "migration root '{root}' does not exist"
                )));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
