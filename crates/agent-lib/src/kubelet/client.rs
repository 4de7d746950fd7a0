//! HTTP client for the kubelet pod-listing API

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{ContainerStatus, Pod, PodLister};

/// Configuration for the kubelet client
#[derive(Debug, Clone)]
pub struct KubeletConfig {
    /// Kubelet API endpoint
    pub endpoint: String,
    /// Service-account token file, sent as a bearer token when present
    pub token_path: PathBuf,
    /// Per-request deadline; a stalled kubelet must not stall resolution
    pub timeout: Duration,
}

impl Default for KubeletConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:10250".to_string(),
            token_path: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token"),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Pod lister backed by the kubelet `/pods` endpoint
pub struct KubeletClient {
    client: Client,
    pods_url: Url,
    token: Option<String>,
}

impl KubeletClient {
    pub fn new(config: KubeletConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            // the kubelet serves a self-signed per-node certificate
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to create kubelet HTTP client")?;

        let pods_url = Url::parse(&config.endpoint)
            .and_then(|base| base.join("/pods"))
            .context("Invalid kubelet endpoint")?;

        let token = match std::fs::read_to_string(&config.token_path) {
            Ok(token) => Some(token.trim().to_string()),
            Err(err) => {
                debug!(
                    path = %config.token_path.display(),
                    error = %err,
                    "No service-account token, querying kubelet unauthenticated"
                );
                None
            }
        };

        Ok(Self {
            client,
            pods_url,
            token,
        })
    }
}

#[async_trait]
impl PodLister for KubeletClient {
    async fn list_pods(&self) -> Result<Vec<Pod>> {
        let mut request = self.client.get(self.pods_url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach kubelet")?
            .error_for_status()
            .context("Kubelet rejected pod listing")?;

        let list: PodListWire = response
            .json()
            .await
            .context("Failed to parse kubelet pod list")?;

        Ok(list.items.into_iter().map(Pod::from).collect())
    }
}

// Wire types for the kubelet /pods response; only the fields the resolver
// needs are deserialized.

#[derive(Debug, Deserialize)]
struct PodListWire {
    #[serde(default)]
    items: Vec<PodWire>,
}

#[derive(Debug, Deserialize)]
struct PodWire {
    #[serde(default)]
    metadata: ObjectMetaWire,
    #[serde(default)]
    status: PodStatusWire,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMetaWire {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    uid: String,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatusWire {
    #[serde(default, rename = "initContainerStatuses")]
    init_container_statuses: Vec<ContainerStatusWire>,
    #[serde(default, rename = "containerStatuses")]
    container_statuses: Vec<ContainerStatusWire>,
    #[serde(default, rename = "ephemeralContainerStatuses")]
    ephemeral_container_statuses: Vec<ContainerStatusWire>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatusWire {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "containerID")]
    container_id: String,
}

impl From<ContainerStatusWire> for ContainerStatus {
    fn from(wire: ContainerStatusWire) -> Self {
        Self {
            name: wire.name,
            container_id: wire.container_id,
        }
    }
}

impl From<PodWire> for Pod {
    fn from(wire: PodWire) -> Self {
        Self {
            name: wire.metadata.name,
            namespace: wire.metadata.namespace,
            uid: wire.metadata.uid,
            init_containers: wire
                .status
                .init_container_statuses
                .into_iter()
                .map(ContainerStatus::from)
                .collect(),
            containers: wire
                .status
                .container_statuses
                .into_iter()
                .map(ContainerStatus::from)
                .collect(),
            ephemeral_containers: wire
                .status
                .ephemeral_container_statuses
                .into_iter()
                .map(ContainerStatus::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_pod_list_parsing() {
        let body = r#"{
            "items": [{
                "metadata": {"name": "myapp", "namespace": "default", "uid": "uid-1"},
                "status": {
                    "initContainerStatuses": [
                        {"name": "init", "containerID": "cri-o://aaa111"}
                    ],
                    "containerStatuses": [
                        {"name": "main", "containerID": "containerd://bbb222"}
                    ]
                }
            }]
        }"#;

        let list: PodListWire = serde_json::from_str(body).unwrap();
        let pods: Vec<Pod> = list.items.into_iter().map(Pod::from).collect();

        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].name, "myapp");
        assert_eq!(pods[0].namespace, "default");
        assert_eq!(pods[0].uid, "uid-1");
        assert_eq!(pods[0].init_containers[0].container_id, "cri-o://aaa111");
        assert_eq!(pods[0].containers[0].name, "main");
        assert!(pods[0].ephemeral_containers.is_empty());
    }

    #[test]
    fn test_wire_tolerates_missing_status() {
        let body = r#"{"items": [{"metadata": {"name": "pending", "uid": "uid-2"}}]}"#;
        let list: PodListWire = serde_json::from_str(body).unwrap();
        let pod = Pod::from(list.items.into_iter().next().unwrap());
        assert_eq!(pod.uid, "uid-2");
        assert_eq!(pod.all_statuses().count(), 0);
    }
}
