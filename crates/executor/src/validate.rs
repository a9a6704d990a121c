//! Structural validation of submitted node graphs.
//!
//! Checks the shape of a payload against the node registry: every node
//! must name a known type and carry an inputs object, and the graph
//! must contain at least one output node. Failures produce both a
//! human-readable summary and a structured per-node error map; a
//! payload that fails here is never enqueued.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::registry::NodeRegistry;

/// Result of validating one payload.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    /// Present iff `valid` is false.
    pub error: Option<ValidationError>,
    /// Output-node ids to execute, in graph order.
    pub outputs: Vec<String>,
    /// Node id → structured error detail. Empty on success.
    pub node_errors: Map<String, Value>,
}

/// Human-readable validation failure summary.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub message: String,
    pub details: String,
}

impl ValidationOutcome {
    pub fn ok(outputs: Vec<String>) -> Self {
        Self {
            valid: true,
            error: None,
            outputs,
            node_errors: Map::new(),
        }
    }

    pub fn failed(
        message: impl Into<String>,
        details: impl Into<String>,
        node_errors: Map<String, Value>,
    ) -> Self {
        Self {
            valid: false,
            error: Some(ValidationError {
                message: message.into(),
                details: details.into(),
            }),
            outputs: Vec::new(),
            node_errors,
        }
    }

    /// The failure summary, or an empty string when valid.
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| {
                if e.details.is_empty() {
                    e.message.clone()
                } else {
                    format!("{}: {}", e.message, e.details)
                }
            })
            .unwrap_or_default()
    }
}

/// Validate a payload's structure against the registry.
pub fn validate_structure(payload: &Value, registry: &NodeRegistry) -> ValidationOutcome {
    let graph = match payload.as_object() {
        Some(graph) if !graph.is_empty() => graph,
        _ => {
            return ValidationOutcome::failed(
                "Prompt is empty or not a graph",
                "expected a non-empty object mapping node ids to nodes",
                Map::new(),
            );
        }
    };

    let mut node_errors = Map::new();
    let mut outputs = Vec::new();

    for (node_id, node) in graph {
        match check_node(node, registry) {
            Ok(is_output) => {
                if is_output {
                    outputs.push(node_id.clone());
                }
            }
            Err(detail) => {
                node_errors.insert(node_id.clone(), detail);
            }
        }
    }

    if !node_errors.is_empty() {
        let details = node_errors
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        return ValidationOutcome::failed(
            "Prompt has invalid nodes",
            format!("nodes {details}"),
            node_errors,
        );
    }

    if outputs.is_empty() {
        return ValidationOutcome::failed(
            "Prompt has no outputs",
            "no node in the graph is an output node",
            Map::new(),
        );
    }

    ValidationOutcome::ok(outputs)
}

/// Check one node; `Ok(true)` marks an output node.
fn check_node(node: &Value, registry: &NodeRegistry) -> Result<bool, Value> {
    let node = node.as_object().ok_or_else(|| {
        json!({
            "type": "invalid_node",
            "message": "node is not an object",
        })
    })?;

    let class_type = node
        .get("class_type")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            json!({
                "type": "missing_class_type",
                "message": "node has no class_type",
            })
        })?;

    let descriptor = registry.get(class_type).ok_or_else(|| {
        json!({
            "type": "unknown_class_type",
            "message": format!("unknown node type '{class_type}'"),
            "class_type": class_type,
        })
    })?;

    if !node.get("inputs").map(Value::is_object).unwrap_or(false) {
        return Err(json!({
            "type": "missing_inputs",
            "message": "node has no inputs object",
            "class_type": class_type,
        }));
    }

    Ok(descriptor.output_node)
}
