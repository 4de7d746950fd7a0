//! Agent configuration

use agent_lib::models::ResolutionMode;
use anyhow::Result;
use serde::Deserialize;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Kubelet API endpoint
    #[serde(default = "default_kubelet_endpoint")]
    pub kubelet_endpoint: String,

    /// Service-account token path for kubelet authentication
    #[serde(default = "default_kubelet_token_path")]
    pub kubelet_token_path: String,

    /// Kubelet request timeout in milliseconds
    #[serde(default = "default_kubelet_timeout_ms")]
    pub kubelet_timeout_ms: u64,

    /// Cgroup filesystem mount root
    #[serde(default = "default_cgroup_root")]
    pub cgroup_root: String,

    /// Proc filesystem root (PID-based resolution only)
    #[serde(default = "default_proc_root")]
    pub proc_root: String,

    /// Identity resolution mode: "cgroup-id" or "pid"
    #[serde(default = "default_resolution_mode")]
    pub resolution_mode: String,

    /// Deadline for one cgroup filesystem walk, in milliseconds
    #[serde(default = "default_walk_timeout_ms")]
    pub walk_timeout_ms: u64,

    /// Interval between alive-pod GC passes, in seconds
    #[serde(default = "default_pod_gc_interval")]
    pub pod_gc_interval_secs: u64,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_kubelet_endpoint() -> String {
    "https://localhost:10250".to_string()
}

fn default_kubelet_token_path() -> String {
    "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string()
}

fn default_kubelet_timeout_ms() -> u64 {
    5000
}

fn default_cgroup_root() -> String {
    "/sys/fs/cgroup".to_string()
}

fn default_proc_root() -> String {
    "/proc".to_string()
}

fn default_resolution_mode() -> String {
    "cgroup-id".to_string()
}

fn default_walk_timeout_ms() -> u64 {
    2000
}

fn default_pod_gc_interval() -> u64 {
    60
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            kubelet_endpoint: default_kubelet_endpoint(),
            kubelet_token_path: default_kubelet_token_path(),
            kubelet_timeout_ms: default_kubelet_timeout_ms(),
            cgroup_root: default_cgroup_root(),
            proc_root: default_proc_root(),
            resolution_mode: default_resolution_mode(),
            walk_timeout_ms: default_walk_timeout_ms(),
            pod_gc_interval_secs: default_pod_gc_interval(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment and config file
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Parse the configured resolution mode, defaulting to cgroup-ID
    pub fn mode(&self) -> ResolutionMode {
        match self.resolution_mode.as_str() {
            "pid" => ResolutionMode::Pid,
            _ => ResolutionMode::CgroupId,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.cgroup_root, "/sys/fs/cgroup");
        assert_eq!(config.mode(), ResolutionMode::CgroupId);
        assert_eq!(config.walk_timeout_ms, 2000);
    }

    #[test]
    fn test_pid_mode_parsing() {
        let config = AgentConfig {
            resolution_mode: "pid".to_string(),
            ..AgentConfig::default()
        };
        assert_eq!(config.mode(), ResolutionMode::Pid);
    }
}
