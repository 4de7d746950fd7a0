//! Kubelet pod-listing collaborator
//!
//! The resolution core only depends on the [`PodLister`] trait; the
//! concrete HTTP client lives in [`client`] and can be swapped out for a
//! mock in tests.

mod client;

pub use client::{KubeletClient, KubeletConfig};

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

/// Status of one container within a pod
///
/// `container_id` carries the runtime URI prefix the kubelet reports
/// (e.g. `cri-o://f93ee4...`); strip it before using the ID as a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub name: String,
    pub container_id: String,
}

/// A pod as reported by the kubelet, with all three container-status lists
#[derive(Debug, Clone, Default)]
pub struct Pod {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub init_containers: Vec<ContainerStatus>,
    pub containers: Vec<ContainerStatus>,
    pub ephemeral_containers: Vec<ContainerStatus>,
}

impl Pod {
    /// Iterate init, main, and ephemeral container statuses in order
    pub fn all_statuses(&self) -> impl Iterator<Item = &ContainerStatus> {
        self.init_containers
            .iter()
            .chain(self.containers.iter())
            .chain(self.ephemeral_containers.iter())
    }
}

/// Collaborator contract: list the pods currently on this node
#[async_trait]
pub trait PodLister: Send + Sync {
    async fn list_pods(&self) -> Result<Vec<Pod>>;
}

/// Set of pod UIDs currently reported by the kubelet
///
/// Consumed by the per-pod state garbage collector; a listing failure means
/// "no new information", not a fatal condition.
pub async fn alive_pod_uids(lister: &dyn PodLister) -> Result<HashSet<String>> {
    let pods = lister.list_pods().await?;
    Ok(pods.into_iter().map(|pod| pod.uid).collect())
}
