// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Fleet description and metrics template, and the per node configuration
//! derived from them.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpu::CpuConfig;
use crate::network::NetworkConfig;
use crate::storage::{Disk, FileFlags, StorageConfig};
use crate::sweep::OneOrMany;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {0}")]
    Io(PathBuf, #[source] io::Error),
    #[error("cannot parse {0}")]
    Json(PathBuf, #[source] serde_json::Error),
    #[error("node '{0}' not found in resources")]
    NodeNotFound(String),
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let file = File::open(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ConfigError::Json(path.to_path_buf(), e))
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NodeResources {
    pub node_name: String,
    /// Device names relative to `/dev`.
    pub disks: Vec<String>,
    pub network_interfaces: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Resources {
    pub nodes: Vec<NodeResources>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageTemplate {
    pub blocksizes: OneOrMany<String>,
    pub workloads: OneOrMany<String>,
    pub threads: OneOrMany<u32>,
    pub flags: OneOrMany<FileFlags>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NetworkTemplate {
    #[serde(default = "default_network_threads")]
    pub threads: OneOrMany<u32>,
    #[serde(default)]
    pub workloads: OneOrMany<String>,
}

fn default_network_threads() -> OneOrMany<u32> {
    NetworkConfig::default().threads
}

impl Default for NetworkTemplate {
    fn default() -> Self {
        NetworkTemplate {
            threads: default_network_threads(),
            workloads: OneOrMany::default(),
        }
    }
}

/// Benchmark parameters shared by every node of the fleet.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsTemplate {
    pub storage: StorageTemplate,
    pub network: NetworkTemplate,
    pub cpu: CpuConfig,
}

/// What one node benchmarks: the template plus its own disks and interfaces,
/// with every other node as a network peer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NodeConfig {
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub cpu: CpuConfig,
}

impl NodeConfig {
    pub fn derive(
        template: &MetricsTemplate,
        resources: &Resources,
        node_name: &str,
    ) -> Result<Self, ConfigError> {
        let node = resources
            .nodes
            .iter()
            .find(|n| n.node_name == node_name)
            .ok_or_else(|| ConfigError::NodeNotFound(node_name.to_string()))?;

        let peers: Vec<String> = resources
            .nodes
            .iter()
            .filter(|n| n.node_name != node_name)
            .map(|n| n.node_name.clone())
            .collect();
        let disks: Vec<Disk> = node
            .disks
            .iter()
            .map(|d| Disk {
                path: format!("/dev/{d}"),
            })
            .collect();

        let storage = &template.storage;
        let network = &template.network;
        Ok(NodeConfig {
            storage: StorageConfig {
                disks: disks.into(),
                blocksizes: storage.blocksizes.clone(),
                workloads: storage.workloads.clone(),
                threads: storage.threads.clone(),
                flags: storage.flags.clone(),
            },
            network: NetworkConfig {
                interfaces: node.network_interfaces.clone().into(),
                peers: peers.into(),
                workloads: network.workloads.clone(),
                threads: network.threads.clone(),
            },
            cpu: template.cpu.clone(),
        })
    }

    pub fn has_storage(&self) -> bool {
        !self.storage.disks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use vmm_sys_util::tempdir::TempDir;

    use super::*;

    const METRICS: &str = r#"{
        "storage": {
            "blocksizes": ["4k", "16k"],
            "workloads": ["seqrd", "seqwr"],
            "threads": [1, 2],
            "flags": ["sync", {"file-extra-flags": "direct"}]
        },
        "network": {"threads": [1, 2], "workloads": ["ping", "iperf"]},
        "cpu": {"parameters": [{"threads": [1, 2], "cpu-max-prime": 10000}]}
    }"#;

    const RESOURCES: &str = r#"{
        "nodes": [
            {"node_name": "node1", "disks": ["sda", "sdb"], "network_interfaces": ["eth0", "eth1"]},
            {"node_name": "node2", "disks": ["sdc"], "network_interfaces": ["eth2"]},
            {"node_name": "node3", "disks": [], "network_interfaces": ["eth3"]}
        ]
    }"#;

    fn inputs() -> (MetricsTemplate, Resources) {
        (
            serde_json::from_str(METRICS).unwrap(),
            serde_json::from_str(RESOURCES).unwrap(),
        )
    }

    #[test]
    fn test_derive_node_config() {
        let (template, resources) = inputs();
        let config = NodeConfig::derive(&template, &resources, "node1").unwrap();

        assert_eq!(
            config.storage.disks.as_slice(),
            [
                Disk {
                    path: "/dev/sda".to_string()
                },
                Disk {
                    path: "/dev/sdb".to_string()
                }
            ]
        );
        assert_eq!(config.storage.blocksizes.to_vec(), vec!["4k", "16k"]);
        assert_eq!(
            config
                .storage
                .flags
                .as_slice()
                .iter()
                .map(|f| f.file_extra_flags.as_str())
                .collect::<Vec<_>>(),
            vec!["sync", "direct"]
        );
        assert_eq!(config.network.interfaces.to_vec(), vec!["eth0", "eth1"]);
        assert_eq!(config.network.peers.to_vec(), vec!["node2", "node3"]);
        assert_eq!(config.network.threads.to_vec(), vec![1, 2]);
        assert_eq!(config.cpu, template.cpu);
        assert!(config.has_storage());

        let config = NodeConfig::derive(&template, &resources, "node3").unwrap();
        assert!(!config.has_storage());
        assert_eq!(config.network.peers.to_vec(), vec!["node1", "node2"]);
    }

    #[test]
    fn test_node_not_found() {
        let (template, resources) = inputs();
        let err = NodeConfig::derive(&template, &resources, "node4").unwrap_err();
        assert!(matches!(err, ConfigError::NodeNotFound(ref n) if n == "node4"));
        assert_eq!(err.to_string(), "node 'node4' not found in resources");

        let err = NodeConfig::derive(&template, &Resources::default(), "node1").unwrap_err();
        assert!(matches!(err, ConfigError::NodeNotFound(_)));
    }

    #[test]
    fn test_node_fields_are_required() {
        let r = serde_json::from_str::<Resources>(r#"{"nodes": [{"node_name": "node1"}]}"#);
        assert!(r.is_err());
    }

    #[test]
    fn test_template_defaults() {
        let template: MetricsTemplate = serde_json::from_str("{}").unwrap();
        assert!(template.storage.blocksizes.is_empty());
        assert_eq!(template.network.threads.to_vec(), vec![1]);
        assert!(template.cpu.parameters.is_empty());
    }

    #[test]
    fn test_load_json() {
        let tmp_dir = TempDir::new_with_prefix("/tmp/node-bench-config").unwrap();
        let path = tmp_dir.as_path().join("resources.json");
        File::create(&path)
            .unwrap()
            .write_all(RESOURCES.as_bytes())
            .unwrap();
        let resources: Resources = load_json(&path).unwrap();
        assert_eq!(resources.nodes.len(), 3);
        assert_eq!(resources.nodes[1].disks, vec!["sdc"]);

        let missing = tmp_dir.as_path().join("metrics.json");
        assert!(matches!(
            load_json::<MetricsTemplate>(&missing),
            Err(ConfigError::Io(..))
        ));

        File::create(&missing)
            .unwrap()
            .write_all(b"{\"storage\": ")
            .unwrap();
        assert!(matches!(
            load_json::<MetricsTemplate>(&missing),
            Err(ConfigError::Json(p, _)) if p == missing
        ));
    }
}
