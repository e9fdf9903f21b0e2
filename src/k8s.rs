use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use std::path::Path;
use tracing::debug;

use crate::discovery::{
    ApiGroupResources, DiscoveryError, DiscoveryReport, GroupDiscoveryFailure, ResourceDescriptor,
    ResourceDiscovery,
};

/// Lists namespace names, at most `page_limit` of them.
#[async_trait]
pub trait NamespaceLister: Send + Sync {
    async fn list_namespaces(&self, page_limit: usize) -> Result<Vec<String>>;
}

/// Used when the builder runs without a cluster connection.
pub struct NoNamespaces;

#[async_trait]
impl NamespaceLister for NoNamespaces {
    async fn list_namespaces(&self, _page_limit: usize) -> Result<Vec<String>> {
        anyhow::bail!("no cluster connection")
    }
}

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    default_namespace: String,
}

impl KubeGateway {
    /// Connects using `kubeconfig` when given, else the usual kubeconfig lookup with an
    /// in-cluster fallback.
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        let kubeconfig = match kubeconfig {
            Some(path) => Some(
                Kubeconfig::read_from(path)
                    .with_context(|| format!("failed to read kubeconfig {}", path.display()))?,
            ),
            None => Kubeconfig::read().ok(),
        };

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            Config::from_custom_kubeconfig(kubeconfig_value, &KubeConfigOptions::default())
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        let context = kubeconfig
            .and_then(|cfg| cfg.current_context)
            .unwrap_or_else(|| "in-cluster".to_string());

        Ok(Self {
            client,
            context,
            cluster,
            default_namespace,
        })
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Core `v1` versions plus the preferred version of every API group.
    async fn preferred_group_versions(&self) -> Result<Vec<(String, bool)>, DiscoveryError> {
        let core = self
            .client
            .list_core_api_versions()
            .await
            .map_err(|err| DiscoveryError(format!("failed to list core API versions: {err}")))?;
        let groups = self
            .client
            .list_api_groups()
            .await
            .map_err(|err| DiscoveryError(format!("failed to list API groups: {err}")))?;

        let mut versions = core
            .versions
            .into_iter()
            .map(|version| (version, true))
            .collect::<Vec<_>>();
        for group in groups.groups {
            let preferred = group
                .preferred_version
                .or_else(|| group.versions.into_iter().next());
            if let Some(preferred) = preferred {
                versions.push((preferred.group_version, false));
            }
        }
        Ok(versions)
    }
}

#[async_trait]
impl NamespaceLister for KubeGateway {
    async fn list_namespaces(&self, page_limit: usize) -> Result<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let limit = u32::try_from(page_limit).unwrap_or(u32::MAX);
        let list = namespaces
            .list(&ListParams::default().limit(limit))
            .await
            .context("failed to list namespaces")?;

        Ok(list.into_iter().map(|namespace| namespace.name_any()).collect())
    }
}

#[async_trait]
impl ResourceDiscovery for KubeGateway {
    async fn discover_resources(&self) -> Result<DiscoveryReport, DiscoveryError> {
        let versions = self.preferred_group_versions().await?;

        let listings = join_all(versions.into_iter().map(|(group_version, core)| async move {
            let listing = if core {
                self.client.list_core_api_resources(&group_version).await
            } else {
                self.client.list_api_group_resources(&group_version).await
            };
            (group_version, listing)
        }))
        .await;

        let mut report = DiscoveryReport::default();
        for (group_version, listing) in listings {
            match classify_group_listing(&group_version, listing) {
                Ok(group) => report.groups.push(group),
                Err(failure) => {
                    debug!(%failure, "group discovery failed");
                    report.failures.push(failure);
                }
            }
        }
        Ok(report)
    }
}

/// Turns one group listing into resources or a per-group failure. A missing body or an
/// empty resource list counts as an empty response.
fn classify_group_listing(
    group_version: &str,
    listing: kube::Result<APIResourceList>,
) -> Result<ApiGroupResources, GroupDiscoveryFailure> {
    let list = match listing {
        Ok(list) => list,
        Err(kube::Error::SerdeError(err)) if err.is_eof() => {
            return Err(GroupDiscoveryFailure::empty_response(group_version));
        }
        Err(err) => return Err(GroupDiscoveryFailure::failed(group_version, err.to_string())),
    };

    if list.resources.is_empty() {
        return Err(GroupDiscoveryFailure::empty_response(group_version));
    }

    let resources = list
        .resources
        .into_iter()
        // subresources such as `pods/log`
        .filter(|resource| !resource.name.contains('/'))
        .map(|resource| ResourceDescriptor::new(resource.name, resource.namespaced))
        .collect();

    Ok(ApiGroupResources {
        group_version: group_version.to_string(),
        resources,
    })
}

#[cfg(test)]
mod tests {
    use super::classify_group_listing;
    use crate::discovery::{GroupFailureKind, ResourceDescriptor};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};

    fn resource(name: &str, namespaced: bool) -> APIResource {
        APIResource {
            name: name.to_string(),
            namespaced,
            ..APIResource::default()
        }
    }

    #[test]
    fn listing_keeps_top_level_resources_only() {
        let listing = APIResourceList {
            group_version: "v1".to_string(),
            resources: vec![
                resource("pods", true),
                resource("pods/log", true),
                resource("namespaces", false),
            ],
        };

        let group = classify_group_listing("v1", Ok(listing));

        assert_eq!(
            group.map(|group| group.resources),
            Ok(vec![
                ResourceDescriptor::new("pods", true),
                ResourceDescriptor::new("namespaces", false),
            ])
        );
    }

    #[test]
    fn empty_listing_and_missing_body_are_empty_responses() {
        let empty = APIResourceList {
            group_version: "metrics.k8s.io/v1beta1".to_string(),
            resources: Vec::new(),
        };
        let failure = classify_group_listing("metrics.k8s.io/v1beta1", Ok(empty));
        assert!(failure.is_err_and(|failure| failure.is_empty_response()));

        let eof = serde_json::from_str::<serde_json::Value>("").err();
        let Some(eof) = eof else {
            panic!("empty input must not parse");
        };
        let failure = classify_group_listing(
            "external.metrics.k8s.io/v1beta1",
            Err(kube::Error::SerdeError(eof)),
        );
        assert!(failure.is_err_and(|failure| failure.is_empty_response()));
    }

    #[test]
    fn other_errors_are_real_failures() {
        let syntax = serde_json::from_str::<serde_json::Value>("{oops").err();
        let Some(syntax) = syntax else {
            panic!("broken input must not parse");
        };

        let failure = classify_group_listing(
            "apps.kubeblocks.io/v1alpha1",
            Err(kube::Error::SerdeError(syntax)),
        );

        assert!(matches!(
            failure.map_err(|failure| failure.kind),
            Err(GroupFailureKind::Failed(_))
        ));
    }
}
