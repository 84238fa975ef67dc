//! Fleet and node inventory loading.
//!
//! A fleet file lists charts with their normalized resource figures and the
//! per-container values records the rules run against:
//!
//! ```yaml
//! charts:
//!   - name: payments
//!     team: core
//!     values_file: charts/payments/values.yaml
//!     replicas: 2
//!     containers:
//!       - resources:
//!           requests: {cpu: 100m, memory: 128Mi}
//! ```
//!
//! YAML and JSON are both accepted. Node inventories are either a plain list
//! of [`ClusterNode`] entries or `kubectl get nodes -o json` output.

use super::parser::{cpu_from_value, memory_from_value};
use super::record::ResourceRecord;
use super::types::{ChartInfo, ClusterNode};
use crate::error::{OptimizerError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Node label carrying the cloud instance type.
const INSTANCE_TYPE_LABELS: [&str; 2] = [
    "node.kubernetes.io/instance-type",
    "beta.kubernetes.io/instance-type",
];

/// One chart of a fleet file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetEntry {
    #[serde(flatten)]
    pub chart: ChartInfo,
    #[serde(default)]
    pub containers: Vec<ResourceRecord>,
}

impl FleetEntry {
    /// Fill resource figures from the containers when none were given.
    ///
    /// Requests and limits are summed across containers; the replica count
    /// comes from the first container that declares one. A chart-level count
    /// is copied into every container that declares none.
    fn normalize(mut self) -> Self {
        let chart = &mut self.chart;
        let unset = [chart.cpu_request, chart.cpu_limit, chart.memory_request, chart.memory_limit]
            .iter()
            .all(|v| *v == 0.0);

        if unset {
            for record in &self.containers {
                chart.cpu_request += record.cpu_request().unwrap_or(0.0);
                chart.cpu_limit += record.cpu_limit().unwrap_or(0.0);
                chart.memory_request += record
                    .resource("requests", "memory")
                    .and_then(memory_from_value)
                    .unwrap_or(0.0);
                chart.memory_limit += record
                    .resource("limits", "memory")
                    .and_then(memory_from_value)
                    .unwrap_or(0.0);
            }
        }
        if chart.replicas.is_none() {
            chart.replicas = self
                .containers
                .iter()
                .find_map(|r| r.replicas())
                .and_then(|r| u32::try_from(r).ok());
        }
        if let Some(replicas) = chart.replicas {
            for record in &mut self.containers {
                if !record.contains_key("replicas") {
                    record.set("replicas", u64::from(replicas));
                }
            }
        }
        self
    }
}

/// A fleet of charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetFile {
    #[serde(default)]
    pub charts: Vec<FleetEntry>,
}

impl FleetFile {
    /// Parse fleet text; `json` selects the JSON parser.
    pub fn parse(content: &str, json: bool) -> Result<Self> {
        let fleet: FleetFile = if json {
            serde_json::from_str(content)?
        } else {
            serde_yaml::from_str(content)?
        };
        Ok(FleetFile {
            charts: fleet.charts.into_iter().map(FleetEntry::normalize).collect(),
        })
    }

    /// Load a fleet file, resolving relative values paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut fleet = Self::parse(&content, is_json(path)).map_err(|e| OptimizerError::InvalidInput {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(base) = path.parent() {
            for entry in &mut fleet.charts {
                if let Some(values) = entry.chart.values_file.local_path()
                    && values.is_relative()
                {
                    let resolved: PathBuf = base.join(values);
                    entry.chart.values_file = Some(resolved.to_string_lossy().into_owned()).into();
                }
            }
        }

        log::info!("Loaded {} chart(s) from {}", fleet.charts.len(), path.display());
        Ok(fleet)
    }

    pub fn charts(&self) -> Vec<ChartInfo> {
        self.charts.iter().map(|e| e.chart.clone()).collect()
    }

    /// Detector input: (chart name, container records) per chart.
    pub fn detector_inputs(&self) -> Vec<(&str, &[ResourceRecord])> {
        self.charts
            .iter()
            .map(|e| (e.chart.name.as_str(), e.containers.as_slice()))
            .collect()
    }

    pub fn find(&self, chart_name: &str) -> Option<&FleetEntry> {
        self.charts.iter().find(|e| e.chart.name == chart_name)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Load a node inventory.
pub fn load_nodes(path: &Path) -> Result<Vec<ClusterNode>> {
    let content = fs::read_to_string(path)?;
    parse_nodes(&content).map_err(|message| OptimizerError::InvalidInput {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse a node inventory from YAML or JSON text.
///
/// Accepts a list of nodes, a `{nodes: [...]}` mapping, or a Kubernetes
/// `NodeList`.
pub fn parse_nodes(content: &str) -> std::result::Result<Vec<ClusterNode>, String> {
    let value: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;

    if let Some(items) = value.get("items").and_then(Value::as_sequence) {
        return items.iter().map(node_from_manifest).collect();
    }

    let list = value.get("nodes").cloned().unwrap_or(value);
    serde_yaml::from_value(list).map_err(|e| e.to_string())
}

/// Convert one `v1/Node` object.
fn node_from_manifest(node: &Value) -> std::result::Result<ClusterNode, String> {
    let metadata = node.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let instance_type = metadata
        .and_then(|m| m.get("labels"))
        .and_then(|labels| {
            INSTANCE_TYPE_LABELS
                .iter()
                .find_map(|key| labels.get(*key).and_then(Value::as_str))
        })
        .map(str::to_string);

    let allocatable = node.get("status").and_then(|s| s.get("allocatable"));
    let cpu = allocatable
        .and_then(|a| a.get("cpu"))
        .and_then(cpu_from_value)
        .ok_or_else(|| format!("node {} has no allocatable cpu", name))?;
    let memory = allocatable
        .and_then(|a| a.get("memory"))
        .and_then(memory_from_value)
        .ok_or_else(|| format!("node {} has no allocatable memory", name))?;

    Ok(ClusterNode {
        name,
        instance_type,
        cpu_allocatable: cpu,
        memory_allocatable: memory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::parser::{GIB, MIB};
    use std::io::Write;

    #[test]
    fn test_parse_fleet_derives_totals() {
        let fleet = FleetFile::parse(
            r#"
charts:
  - name: payments
    team: core
    containers:
      - replicas: 3
        resources:
          requests: {cpu: 100m, memory: 128Mi}
          limits: {cpu: 500m}
      - resources:
          requests: {cpu: 50m}
  - name: search
    cpu_request: 250
    memory_request: 1073741824
    replicas: 2
"#,
            false,
        )
        .unwrap();

        let payments = &fleet.charts[0].chart;
        assert_eq!(payments.cpu_request, 150.0);
        assert_eq!(payments.cpu_limit, 500.0);
        assert_eq!(payments.memory_request, 128.0 * MIB);
        assert_eq!(payments.replicas, Some(3));

        let search = &fleet.charts[1].chart;
        assert_eq!(search.cpu_request, 250.0);
        assert_eq!(search.memory_request, GIB);
        assert!(fleet.charts[1].containers.is_empty());

        let inputs = fleet.detector_inputs();
        assert_eq!(inputs[0].0, "payments");
        assert_eq!(inputs[0].1.len(), 2);
    }

    #[test]
    fn test_chart_replicas_reach_container_records() {
        let fleet = FleetFile::parse(
            "charts:\n  - name: worker\n    replicas: 3\n    containers:\n      - resources: {}\n      - replicas: 2\n",
            false,
        )
        .unwrap();
        let containers = &fleet.charts[0].containers;
        assert_eq!(containers[0].replicas(), Some(3));
        assert_eq!(containers[1].replicas(), Some(2));
    }

    #[test]
    fn test_json_fleet() {
        let fleet = FleetFile::parse(r#"{"charts": [{"name": "api", "replicas": 1}]}"#, true).unwrap();
        assert_eq!(fleet.charts[0].chart.effective_replicas(), 1);
    }

    #[test]
    fn test_load_resolves_values_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.yaml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "charts:\n  - name: api\n    values_file: api/values.yaml\n  - name: live\n    values_file: 'cluster:live'").unwrap();

        let fleet = FleetFile::load(&path).unwrap();
        assert_eq!(
            fleet.charts[0].chart.values_file.local_path(),
            Some(dir.path().join("api/values.yaml").as_path())
        );
        assert!(fleet.charts[1].chart.values_file.local_path().is_none());
    }

    #[test]
    fn test_load_reports_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.yaml");
        fs::write(&path, "charts: 7\n").unwrap();
        assert!(matches!(FleetFile::load(&path), Err(OptimizerError::InvalidInput { .. })));
    }

    #[test]
    fn test_parse_node_list_forms() {
        let plain = parse_nodes("- name: a\n  instance_type: m5.large\n  cpu_allocatable: 1930m\n  memory_allocatable: 7Gi\n").unwrap();
        assert_eq!(plain[0].cpu_allocatable, 1930.0);

        let wrapped = parse_nodes("nodes:\n  - cpu_allocatable: 2\n    memory_allocatable: 1Gi\n").unwrap();
        assert_eq!(wrapped[0].cpu_allocatable, 2.0);

        let kubectl = parse_nodes(
            r#"{"kind": "NodeList", "items": [{"metadata": {"name": "ip-1", "labels": {"node.kubernetes.io/instance-type": "m6i.xlarge"}}, "status": {"allocatable": {"cpu": "3920m", "memory": "15Gi"}}}]}"#,
        )
        .unwrap();
        assert_eq!(kubectl[0].name, "ip-1");
        assert_eq!(kubectl[0].instance_type.as_deref(), Some("m6i.xlarge"));
        assert_eq!(kubectl[0].cpu_allocatable, 3920.0);
        assert_eq!(kubectl[0].memory_allocatable, 15.0 * GIB);

        assert!(parse_nodes(r#"{"items": [{"metadata": {"name": "bad"}}]}"#).is_err());
    }
}
