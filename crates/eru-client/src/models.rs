//! Core data models for the ERU API

use serde::{Deserialize, Serialize};

/// A running container as reported by the inventory endpoints.
///
/// Containers are owned by the server; this client only reads snapshots
/// of them and issues mutation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub container_id: String,
    #[serde(default)]
    pub appname: String,
    /// Deployment revision, from git.
    pub version: String,
    /// Named process the container was launched to run.
    pub entrypoint: String,
    /// Environment name, like `prod` or `test`.
    pub env: String,
    pub podname: String,
    #[serde(default)]
    pub hostname: String,
    /// Creation timestamp as reported by the server.
    #[serde(default)]
    pub created: String,
    /// Set once the server has started tearing the container down.
    /// Such containers are invisible to the scale planners.
    #[serde(default, deserialize_with = "flag_from_any")]
    pub in_removal: bool,
    #[serde(default)]
    pub networks: Vec<NetworkAttachment>,
    #[serde(default)]
    pub cores: CoreAllocation,
}

/// A network attached to a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAttachment {
    #[serde(default)]
    pub name: String,
    /// CIDR-style address inside the network, e.g. `10.200.1.5/16`.
    pub vlan_address: String,
}

/// Cores allocated to a container, as core labels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreAllocation {
    #[serde(default)]
    pub full: Vec<String>,
    #[serde(default)]
    pub part: Vec<String>,
}

/// Envelope returned by the deploy endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResult {
    pub r: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub tasks: Vec<i64>,
    #[serde(default)]
    pub watch_keys: Vec<String>,
}

impl DeployResult {
    /// The server accepted the deploy.
    pub fn is_ok(&self) -> bool {
        self.r == 0
    }
}

/// Envelope returned by the container removal endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalResult {
    pub r: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub tasks: Vec<i64>,
    #[serde(default)]
    pub watch_keys: Vec<String>,
}

impl RemovalResult {
    pub fn is_ok(&self) -> bool {
        self.r == 0
    }
}

/// Grouping key for the scale planners: containers sharing all three
/// fields are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CohortKey {
    pub version: String,
    pub entrypoint: String,
    pub env: String,
}

/// Per-cohort record of a scale-out attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleOutReport {
    pub cohort: CohortKey,
    pub podname: String,
    pub outcome: ScaleOutcome,
}

impl ScaleOutReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ScaleOutcome::Deployed { .. })
    }
}

/// What happened to one cohort during scale-out.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScaleOutcome {
    /// The deploy request was issued and accepted.
    Deployed { added: u64, result: DeployResult },
    /// The cohort was already at or beyond the ceiling; no request sent.
    AtCeiling { current: usize, ceiling: u64 },
    /// The deploy request failed, or the server reported an error.
    Failed { added: u64, error: String },
}

/// ERU emits `in_removal` as either a bool or a 0/1 integer depending on
/// the server version.
fn flag_from_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_removal_flag_accepts_int_and_bool() {
        let as_int: Container = serde_json::from_str(
            r#"{"container_id": "c1", "version": "v1", "entrypoint": "web",
                "env": "prod", "podname": "intra", "in_removal": 1}"#,
        )
        .unwrap();
        assert!(as_int.in_removal);

        let as_bool: Container = serde_json::from_str(
            r#"{"container_id": "c2", "version": "v1", "entrypoint": "web",
                "env": "prod", "podname": "intra", "in_removal": false}"#,
        )
        .unwrap();
        assert!(!as_bool.in_removal);
    }

    #[test]
    fn test_container_defaults() {
        let c: Container = serde_json::from_str(
            r#"{"container_id": "c1", "version": "v1", "entrypoint": "web",
                "env": "prod", "podname": "intra"}"#,
        )
        .unwrap();
        assert!(!c.in_removal);
        assert!(c.networks.is_empty());
        assert!(c.cores.full.is_empty());
        assert_eq!(c.created, "");
    }

    #[test]
    fn test_deploy_result_status() {
        let ok: DeployResult =
            serde_json::from_str(r#"{"r": 0, "msg": "ok", "tasks": [1, 2]}"#).unwrap();
        assert!(ok.is_ok());
        assert_eq!(ok.tasks, vec![1, 2]);

        let failed: DeployResult = serde_json::from_str(r#"{"r": 1, "msg": "no hosts"}"#).unwrap();
        assert!(!failed.is_ok());
        assert!(failed.watch_keys.is_empty());
    }
}
