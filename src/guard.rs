use crate::discovery::{DiscoveryReport, ResourceDescriptor, ResourceDiscovery};
use crate::policy::PolicyCatalogue;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("command not supported: {0}")]
    CmdNotSupported(String),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("while getting resource list from the cluster: {0}")]
    DiscoveryFailed(String),
}

/// A sub-command with its namespacing resolved for one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub namespaced: bool,
}

/// Name-keyed index of every resource kind the cluster serves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceCatalogue {
    resources: HashMap<String, ResourceDescriptor>,
}

impl ResourceCatalogue {
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.get(name)
    }
}

/// Decides which commands, verbs and resource kinds the builder may offer.
#[derive(Clone)]
pub struct CommandGuard {
    policy: Arc<PolicyCatalogue>,
    discovery: Arc<dyn ResourceDiscovery>,
}

impl CommandGuard {
    pub fn new(policy: PolicyCatalogue, discovery: Arc<dyn ResourceDiscovery>) -> Self {
        Self {
            policy: Arc::new(policy),
            discovery,
        }
    }

    /// Drops commands that cannot run interactively, keeping the input order.
    pub fn filter_supported_cmds(&self, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|cmd| !self.policy.is_unsupported(cmd))
            .cloned()
            .collect()
    }

    /// Verbs offered for `cmd`. Unknown commands and commands without verbs both yield
    /// `None`; the caller decides what that means.
    pub fn allowed_verbs_for_cmd(&self, cmd: &str) -> Option<&[String]> {
        self.policy.verbs_for(cmd)
    }

    /// Fixed resource kind for commands that operate on one, e.g. `cluster`.
    pub fn resource_for_cmd(&self, cmd: &str) -> Option<&ResourceDescriptor> {
        self.policy.resource_for(cmd)
    }

    /// Fails with [`GuardError::CmdNotSupported`] when a raw selection is not one of
    /// the allowed commands.
    pub fn ensure_allowed_cmd(&self, cmd: &str, allowed: &[String]) -> Result<(), GuardError> {
        if allowed.iter().any(|candidate| candidate == cmd) {
            return Ok(());
        }
        Err(GuardError::CmdNotSupported(cmd.to_string()))
    }

    /// Queries discovery once and indexes every served resource by name.
    ///
    /// Only the first occurrence of a name is kept (`pods` exists in `v1` and in
    /// `metrics.k8s.io/v1beta1`, for example). Per-group failures are tolerated only when
    /// every one of them is an empty response.
    pub async fn build_resource_catalogue(&self) -> Result<ResourceCatalogue, GuardError> {
        let report = self
            .discovery
            .discover_resources()
            .await
            .map_err(|err| GuardError::DiscoveryFailed(err.to_string()))?;

        if !report.failures.is_empty() {
            if !should_ignore_group_failures(&report) {
                return Err(GuardError::DiscoveryFailed(report.failures_summary()));
            }
            warn!(
                failures = %report.failures_summary(),
                "ignoring empty resource lists reported during discovery"
            );
        }

        let mut resources = HashMap::new();
        for group in report.groups {
            for resource in group.resources {
                if resources.contains_key(&resource.name) {
                    debug!(
                        resource = %resource.name,
                        group_version = %group.group_version,
                        "skipping resource with an already indexed name"
                    );
                    continue;
                }
                resources.insert(resource.name.clone(), resource);
            }
        }

        Ok(ResourceCatalogue { resources })
    }

    pub fn resolve_resource_descriptor(
        &self,
        name: &str,
        catalogue: &ResourceCatalogue,
    ) -> Result<ResourceDescriptor, GuardError> {
        catalogue
            .get(name)
            .cloned()
            .ok_or_else(|| GuardError::ResourceNotFound(name.to_string()))
    }

    /// Resolves namespacing for `cmd`, preferring the live catalogue over the static table.
    pub fn resolve_command(&self, cmd: &str, catalogue: Option<&ResourceCatalogue>) -> Command {
        let Some(fixed) = self.resource_for_cmd(cmd) else {
            return Command {
                name: cmd.to_string(),
                namespaced: false,
            };
        };

        let resolved = catalogue.map(|cat| self.resolve_resource_descriptor(&fixed.name, cat));
        let namespaced = match resolved {
            Some(Ok(live)) => live.namespaced,
            Some(Err(err)) => {
                debug!(cmd, error = %err, "falling back to static resource details");
                fixed.namespaced
            }
            None => fixed.namespaced,
        };

        Command {
            name: cmd.to_string(),
            namespaced,
        }
    }
}

fn should_ignore_group_failures(report: &DiscoveryReport) -> bool {
    report
        .failures
        .iter()
        .all(|failure| failure.is_empty_response())
}
