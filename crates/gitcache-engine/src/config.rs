use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use gitcache_core::Error;
use gitcache_vcs::DEFAULT_SIDECAR_EXTENSION;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub trigger: TriggerConfig,
    pub metadata: MetadataConfig,
    pub git: GitConfig,
    pub build: BuildConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub enabled: bool,
    /// Subtree whose commits invalidate the cached artifact.
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Sidecar suffix; `gopackager` reads sidecars written by older tooling.
    pub extension: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub program: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub program: String,
    /// `{source}`, `{destination}`, `{os}` and `{arch}` are substituted per request.
    pub args: Vec<String>,
    pub os_env: String,
    pub arch_env: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: ".".to_string(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_SIDECAR_EXTENSION.to_string(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            args: ["build", "-o", "{destination}", "{source}"]
                .into_iter()
                .map(String::from)
                .collect(),
            os_env: "GOOS".to_string(),
            arch_env: "GOARCH".to_string(),
        }
    }
}

impl Config {
    pub fn default_for_repo() -> Self {
        Self::default()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| "parse gitcache.toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load the repo config, falling back to defaults when none exists.
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let path = Self::config_path(repo_root);
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default_for_repo())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> gitcache_core::Result<()> {
        let ext = &self.metadata.extension;
        if ext.is_empty() || ext.contains(['/', '\\']) || ext.starts_with('.') {
            return Err(Error::InvalidConfig(format!("metadata.extension must be a bare suffix, got {ext:?}")));
        }
        if self.git.program.trim().is_empty() {
            return Err(Error::InvalidConfig("git.program is empty".to_string()));
        }
        if self.build.program.trim().is_empty() {
            return Err(Error::InvalidConfig("build.program is empty".to_string()));
        }
        Ok(())
    }

    pub fn trigger_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.trigger.path).as_ref())
    }

    pub fn git_program(&self) -> String {
        shellexpand::tilde(&self.git.program).to_string()
    }

    pub fn config_path(repo_root: &Path) -> PathBuf {
        repo_root.join(".gitcache").join("gitcache.toml")
    }
}
