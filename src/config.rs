use crate::policy::PolicyCatalogue;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::time::Duration;

const DEFAULT_CMDS: [&str; 5] = [
    "cluster",
    "kubeblocks",
    "clusterdefinition",
    "clusterversion",
    "playground",
];

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BuilderConfig {
    pub default_namespace: Option<String>,
    pub allowed: AllowedSpec,
    pub policy: Option<PolicyCatalogue>,
    pub runner: RunnerSpec,
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AllowedSpec {
    pub namespaces: Vec<String>,
    #[serde(alias = "resources")]
    pub cmds: Vec<String>,
}

impl Default for AllowedSpec {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            cmds: DEFAULT_CMDS.iter().map(|cmd| cmd.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSpec {
    pub binary: String,
    pub kubectl: String,
    #[serde(alias = "timeout", alias = "timeout_s")]
    pub timeout_secs: u64,
    pub kubeconfig: Option<PathBuf>,
}

impl Default for RunnerSpec {
    fn default() -> Self {
        Self {
            binary: "kbcli".to_string(),
            kubectl: "kubectl".to_string(),
            timeout_secs: default_runner_timeout_secs(),
            kubeconfig: None,
        }
    }
}

impl RunnerSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// `~/` is expanded against `$HOME`.
    pub fn kubeconfig_path(&self) -> Option<PathBuf> {
        let path = self.kubeconfig.as_ref()?;
        if let Ok(stripped) = path.strip_prefix("~")
            && let Ok(home) = std::env::var("HOME")
        {
            return Some(PathBuf::from(home).join(stripped));
        }
        Some(path.clone())
    }
}

impl BuilderConfig {
    /// Loads `explicit` when given, else the first discovered config file, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover_config_path(),
        };
        let Some(path) = path else {
            return Ok(Self::default());
        };
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read builder config {}", path.display()))?;
        // an empty document means "all defaults"
        let mut parsed: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse builder config {}", path.display()))?
        };
        parsed.source = Some(path.to_path_buf());
        Ok(parsed)
    }

    pub fn policy(&self) -> PolicyCatalogue {
        self.policy.clone().unwrap_or_default()
    }
}

fn default_runner_timeout_secs() -> u64 {
    20
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KBCRAFT_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kbcraft.yaml"),
        PathBuf::from("kbcraft.yml"),
        PathBuf::from(".kbcraft.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kbcraft/config.yaml"),
            PathBuf::from(&home).join(".config/kbcraft/config.yml"),
            PathBuf::from(&home).join(".kbcraft.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::BuilderConfig;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap_or_else(|err| panic!("temp file: {err}"));
        file.write_all(contents.as_bytes())
            .unwrap_or_else(|err| panic!("write config: {err}"));
        file
    }

    #[test]
    fn defaults_match_builtin_tables() {
        let config = BuilderConfig::default();

        assert_eq!(
            config.allowed.cmds,
            vec![
                "cluster",
                "kubeblocks",
                "clusterdefinition",
                "clusterversion",
                "playground",
            ]
        );
        assert!(config.allowed.namespaces.is_empty());
        assert_eq!(config.runner.binary, "kbcli");
        assert_eq!(config.runner.kubectl, "kubectl");
        assert_eq!(config.runner.timeout_secs, 20);
        assert!(config.policy().is_unsupported("playground"));
    }

    #[test]
    fn loads_partial_yaml_with_aliases() {
        let file = write_config(
            r#"
default_namespace: demo
allowed:
  resources: [cluster, kubeblocks]
  namespaces: [demo, prod]
runner:
  timeout: 5
"#,
        );

        let config = BuilderConfig::load(Some(file.path()))
            .unwrap_or_else(|err| panic!("config must load: {err:#}"));

        assert_eq!(config.default_namespace.as_deref(), Some("demo"));
        assert_eq!(config.allowed.cmds, vec!["cluster", "kubeblocks"]);
        assert_eq!(config.allowed.namespaces, vec!["demo", "prod"]);
        assert_eq!(config.runner.timeout_secs, 5);
        assert_eq!(config.runner.binary, "kbcli");
        assert_eq!(config.source.as_deref(), Some(file.path()));
        assert!(config.policy.is_none());
    }

    #[test]
    fn custom_policy_replaces_builtin_catalogue() {
        let file = write_config(
            r#"
policy:
  unsupported: [bench]
  resources:
    backup: { name: backups, namespaced: true }
  verbs:
    backup: [list, describe]
"#,
        );

        let config = BuilderConfig::load(Some(file.path()))
            .unwrap_or_else(|err| panic!("config must load: {err:#}"));
        let policy = config.policy();

        assert!(!policy.is_unsupported("playground"));
        assert!(policy.is_unsupported("bench"));
        assert_eq!(policy.verbs_for("backup").map(<[String]>::len), Some(2));
        assert_eq!(
            policy.resource_for("backup").map(|resource| resource.name.as_str()),
            Some("backups")
        );
        assert_eq!(policy.verbs_for("cluster"), None);
    }

    #[test]
    fn empty_file_means_defaults() {
        let file = write_config("");

        let config = BuilderConfig::load(Some(file.path()))
            .unwrap_or_else(|err| panic!("config must load: {err:#}"));

        assert_eq!(config.allowed.cmds.len(), 5);
    }

    #[test]
    fn broken_yaml_and_missing_file_are_errors() {
        let file = write_config("allowed: [not, a, map");
        assert!(BuilderConfig::load(Some(file.path())).is_err());

        let missing = PathBuf::from("/nonexistent/kbcraft/config.yaml");
        assert!(BuilderConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn absolute_kubeconfig_path_is_kept() {
        let file = write_config("runner:\n  kubeconfig: /etc/kube/config\n");

        let config = BuilderConfig::load(Some(file.path()))
            .unwrap_or_else(|err| panic!("config must load: {err:#}"));

        assert_eq!(
            config.runner.kubeconfig_path(),
            Some(PathBuf::from("/etc/kube/config"))
        );
    }
}
