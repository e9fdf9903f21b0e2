use crate::discovery::ResourceDescriptor;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Static tables describing which sub-commands exist, which verbs they take and
/// which resource kind they operate on.
///
/// The catalogue is a plain value: it is built once (from the built-in tables or
/// from the `policy` section of the config file) and handed to the guard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyCatalogue {
    /// Sub-commands that cannot be driven from the interactive builder.
    unsupported: BTreeSet<String>,
    /// Fixed resource kind per sub-command, keyed by sub-command name.
    resources: BTreeMap<String, ResourceDescriptor>,
    /// Ordered verbs per sub-command. A missing entry means the sub-command takes no verb.
    verbs: BTreeMap<String, Vec<String>>,
}

impl PolicyCatalogue {
    pub fn new(
        unsupported: impl IntoIterator<Item = String>,
        resources: impl IntoIterator<Item = (String, ResourceDescriptor)>,
        verbs: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Self {
        Self {
            unsupported: unsupported.into_iter().collect(),
            resources: resources.into_iter().collect(),
            verbs: verbs.into_iter().collect(),
        }
    }

    pub fn is_unsupported(&self, cmd: &str) -> bool {
        self.unsupported.contains(cmd)
    }

    /// Returns `None` both for unknown commands and for commands configured with an
    /// empty verb list.
    pub fn verbs_for(&self, cmd: &str) -> Option<&[String]> {
        self.verbs
            .get(cmd)
            .map(Vec::as_slice)
            .filter(|verbs| !verbs.is_empty())
    }

    pub fn resource_for(&self, cmd: &str) -> Option<&ResourceDescriptor> {
        self.resources.get(cmd)
    }
}

impl Default for PolicyCatalogue {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|item| item.to_string()).collect::<Vec<_>>();

        Self::new(
            owned(&["playground", "bench"]),
            [(
                "cluster".to_string(),
                ResourceDescriptor::new("clusters", true),
            )],
            [
                ("cluster".to_string(), owned(CLUSTER_VERBS)),
                ("kubeblocks".to_string(), owned(KUBEBLOCKS_VERBS)),
                ("clusterdefinition".to_string(), owned(&["list"])),
                ("clusterversion".to_string(), owned(&["list"])),
            ],
        )
    }
}

const CLUSTER_VERBS: &[&str] = &[
    // basic
    "create",
    "connect",
    "describe",
    "list",
    "list-instances",
    "list-components",
    "list-events",
    "list-accounts",
    "delete",
    // operations
    "update",
    "restart",
    "upgrade",
    "volume-expand",
    "vscale",
    "hscale",
    "describe-ops",
    "list-ops",
    "delete-ops",
    "configure",
    "expose",
    "describe-configure",
    "explain-configure",
    "diff-configure",
    "stop",
    "start",
    // backup and restore
    "backup",
    "list-backups",
    "delete-backup",
    "restore",
    "list-restores",
    "delete-restore",
    // troubleshooting
    "logs",
    "list-logs",
];

const KUBEBLOCKS_VERBS: &[&str] = &[
    "install",
    "list-versions",
    "preflight",
    "status",
    "uninstall",
    "upgrade",
];
