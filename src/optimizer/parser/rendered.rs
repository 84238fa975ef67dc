//! Rule inputs from rendered manifests.
//!
//! Converts `helm template` output into one [`ResourceRecord`] per workload
//! container, shaped like chart values so the same rule checks apply to both.

use crate::optimizer::record::ResourceRecord;
use serde_yaml::{Mapping, Value};

/// Labels that tie a rendered object to its chart.
const CHART_LABELS: [&str; 4] = [
    "app.kubernetes.io/name",
    "app.kubernetes.io/instance",
    "app",
    "helm.sh/chart",
];

/// Check if a kind is a workload that has containers.
fn is_workload_kind(kind: &str) -> bool {
    matches!(
        kind,
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Job" | "CronJob" | "Pod"
    )
}

fn kind_of(doc: &Value) -> &str {
    doc.get("kind").and_then(Value::as_str).unwrap_or("")
}

fn metadata_name(doc: &Value) -> &str {
    doc.get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("")
}

fn labels(doc: &Value) -> Option<&Mapping> {
    doc.get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(Value::as_mapping)
}

/// Pod template of a workload: (template metadata, pod spec).
fn pod_template<'a>(doc: &'a Value, kind: &str) -> Option<(Option<&'a Value>, &'a Value)> {
    match kind {
        "Pod" => Some((doc.get("metadata"), doc.get("spec")?)),
        "CronJob" => {
            let template = doc
                .get("spec")?
                .get("jobTemplate")?
                .get("spec")?
                .get("template")?;
            Some((template.get("metadata"), template.get("spec")?))
        }
        _ => {
            let template = doc.get("spec")?.get("template")?;
            Some((template.get("metadata"), template.get("spec")?))
        }
    }
}

/// True when the object's name or chart labels point at `chart_name`.
fn belongs_to_chart(doc: &Value, chart_name: &str) -> bool {
    let name = metadata_name(doc);
    if name == chart_name
        || name.starts_with(&format!("{}-", chart_name))
        || name.ends_with(&format!("-{}", chart_name))
    {
        return true;
    }

    labels(doc).is_some_and(|labels| {
        CHART_LABELS.iter().any(|key| {
            labels.get(*key).and_then(Value::as_str).is_some_and(|v| {
                // helm.sh/chart carries "<name>-<version>"
                v == chart_name || (*key == "helm.sh/chart" && v.starts_with(&format!("{}-", chart_name)))
            })
        })
    })
}

/// True when every `matchLabels` entry of the PDB is present on the pod.
fn pdb_selects(pdb: &Value, pod_labels: Option<&Mapping>) -> bool {
    let Some(selector) = pdb
        .get("spec")
        .and_then(|s| s.get("selector"))
        .and_then(|s| s.get("matchLabels"))
        .and_then(Value::as_mapping)
    else {
        return false;
    };
    if selector.is_empty() {
        return false;
    }
    let Some(pod_labels) = pod_labels else {
        return false;
    };
    selector.iter().all(|(k, v)| pod_labels.get(k) == Some(v))
}

/// Values-shaped PDB settings from a rendered PodDisruptionBudget.
fn pdb_settings(pdb: &Value) -> Value {
    let mut settings = Mapping::new();
    settings.insert("enabled".into(), true.into());
    if let Some(spec) = pdb.get("spec") {
        for key in ["maxUnavailable", "minAvailable"] {
            if let Some(v) = spec.get(key) {
                settings.insert(key.into(), v.clone());
            }
        }
    }
    Value::Mapping(settings)
}

/// Merge pod and container security contexts; container keys win.
fn merged_security_context(pod_spec: &Value, container: &Value) -> Option<Value> {
    let mut merged = Mapping::new();
    for source in [pod_spec.get("securityContext"), container.get("securityContext")] {
        if let Some(Value::Mapping(map)) = source {
            for (k, v) in map {
                merged.insert(k.clone(), v.clone());
            }
        }
    }
    (!merged.is_empty()).then_some(Value::Mapping(merged))
}

fn has_pod_anti_affinity(pod_spec: &Value) -> bool {
    pod_spec
        .get("affinity")
        .and_then(|a| a.get("podAntiAffinity"))
        .and_then(Value::as_mapping)
        .is_some_and(|m| !m.is_empty())
}

fn has_topology_spread(pod_spec: &Value) -> bool {
    pod_spec
        .get("topologySpreadConstraints")
        .and_then(Value::as_sequence)
        .is_some_and(|s| !s.is_empty())
}

/// Build one record per container of one workload.
fn workload_records(doc: &Value, kind: &str, pdbs: &[&Value]) -> Vec<ResourceRecord> {
    let Some((template_meta, pod_spec)) = pod_template(doc, kind) else {
        return Vec::new();
    };
    let Some(containers) = pod_spec.get("containers").and_then(Value::as_sequence) else {
        return Vec::new();
    };

    let pod_labels = template_meta
        .and_then(|m| m.get("labels"))
        .and_then(Value::as_mapping);
    let replicas = match kind {
        "Deployment" | "StatefulSet" | "ReplicaSet" => {
            doc.get("spec").and_then(|s| s.get("replicas")).cloned()
        }
        _ => None,
    };
    let pdb = pdbs.iter().find(|pdb| pdb_selects(pdb, pod_labels));
    let anti_affinity = has_pod_anti_affinity(pod_spec);
    let topology_spread = has_topology_spread(pod_spec);

    containers
        .iter()
        .map(|container| {
            let mut record = ResourceRecord::new()
                .with("kind", kind)
                .with("name", metadata_name(doc))
                .with("has_anti_affinity", anti_affinity)
                .with("has_topology_spread", topology_spread);

            if let Some(name) = container.get("name") {
                record.set("container", name.clone());
            }
            for key in ["resources", "livenessProbe", "readinessProbe", "startupProbe"] {
                if let Some(v) = container.get(key) {
                    record.set(key, v.clone());
                }
            }
            for key in ["affinity", "topologySpreadConstraints"] {
                if let Some(v) = pod_spec.get(key) {
                    record.set(key, v.clone());
                }
            }
            if let Some(replicas) = &replicas {
                record.set("replicas", replicas.clone());
            }
            if let Some(security_context) = merged_security_context(pod_spec, container) {
                record.set("securityContext", security_context);
            }
            if let Some(pdb) = pdb {
                record.set("podDisruptionBudget", pdb_settings(pdb));
            }
            record
        })
        .collect()
}

/// Convert rendered manifests into rule inputs for one chart.
///
/// Workloads are scoped to the chart by name or label. When nothing matches,
/// every workload in the render is used.
pub fn build_rule_inputs_from_rendered(documents: &[Value], chart_name: &str) -> Vec<ResourceRecord> {
    let workloads: Vec<(&Value, &str)> = documents
        .iter()
        .map(|doc| (doc, kind_of(doc)))
        .filter(|(_, kind)| is_workload_kind(kind))
        .collect();
    let pdbs: Vec<&Value> = documents
        .iter()
        .filter(|doc| kind_of(doc) == "PodDisruptionBudget")
        .collect();

    let scoped: Vec<(&Value, &str)> = workloads
        .iter()
        .filter(|(doc, _)| belongs_to_chart(doc, chart_name))
        .copied()
        .collect();
    let selected = if scoped.is_empty() {
        log::debug!(
            "No rendered workload matched chart {}; using all {} workload(s)",
            chart_name,
            workloads.len()
        );
        workloads
    } else {
        scoped
    };

    selected
        .into_iter()
        .flat_map(|(doc, kind)| workload_records(doc, kind, &pdbs))
        .collect()
}
