use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Namespacing metadata for one cluster resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Always plural, e.g. `pods`.
    pub name: String,
    #[serde(default)]
    pub namespaced: bool,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, namespaced: bool) -> Self {
        Self {
            name: name.into(),
            namespaced,
        }
    }
}

/// Resources served by one API group version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiGroupResources {
    pub group_version: String,
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupFailureKind {
    /// The group answered with no resources at all. Some extensions register groups
    /// like this on purpose.
    EmptyResponse,
    Failed(String),
}

/// A sub-error for a single API group version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDiscoveryFailure {
    pub group_version: String,
    pub kind: GroupFailureKind,
}

impl GroupDiscoveryFailure {
    pub fn empty_response(group_version: impl Into<String>) -> Self {
        Self {
            group_version: group_version.into(),
            kind: GroupFailureKind::EmptyResponse,
        }
    }

    pub fn failed(group_version: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            group_version: group_version.into(),
            kind: GroupFailureKind::Failed(reason.into()),
        }
    }

    pub fn is_empty_response(&self) -> bool {
        matches!(self.kind, GroupFailureKind::EmptyResponse)
    }
}

impl Display for GroupDiscoveryFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            GroupFailureKind::EmptyResponse => {
                write!(f, "got empty response for: {}", self.group_version)
            }
            GroupFailureKind::Failed(reason) => write!(f, "{}: {reason}", self.group_version),
        }
    }
}

/// Outcome of a discovery round: the groups that answered plus per-group failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub groups: Vec<ApiGroupResources>,
    pub failures: Vec<GroupDiscoveryFailure>,
}

impl DiscoveryReport {
    pub fn failures_summary(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Discovery could not produce any report, e.g. the group list itself was unreachable.
#[derive(Debug, Error)]
#[error("resource discovery failed: {0}")]
pub struct DiscoveryError(pub String);

/// Source of the live resource catalogue.
#[async_trait]
pub trait ResourceDiscovery: Send + Sync {
    async fn discover_resources(&self) -> Result<DiscoveryReport, DiscoveryError>;
}

/// Stand-in used when the builder runs without a cluster connection.
pub struct NoDiscovery;

#[async_trait]
impl ResourceDiscovery for NoDiscovery {
    async fn discover_resources(&self) -> Result<DiscoveryReport, DiscoveryError> {
        Err(DiscoveryError("no cluster connection".to_string()))
    }
}
