//! Node-type registry.
//!
//! Maps node-type names to their descriptors. Sources are enumerated in
//! an explicit, ordered list at startup: base sources register first,
//! and later sources cannot overwrite earlier entries (first-writer-wins
//! with a logged conflict). A source that fails to load is skipped with
//! a log line; it never aborts the registry build.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;

/// Metadata for one node type. Implementations live in the executor
/// proper; the gateway only needs enough structure for validation and
/// introspection.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDescriptor {
    pub name: String,
    pub display_name: String,
    pub category: String,
    /// Declared input slot names.
    pub inputs: Vec<String>,
    /// Declared output type names.
    pub outputs: Vec<String>,
    /// True when this node terminates a graph (its results are the
    /// job's outputs).
    pub output_node: bool,
}

/// A provider of node descriptors, enumerated at startup.
pub trait NodeSource: Send + Sync {
    /// Name used in load logs and conflict reports.
    fn name(&self) -> &str;

    /// Produce this source's descriptors. An `Err` skips the source.
    fn descriptors(&self) -> Result<Vec<NodeDescriptor>, SourceError>;
}

/// Why a node source failed to enumerate.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SourceError(pub String);

/// Registry of known node types.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, NodeDescriptor>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load descriptors from each source in order.
    ///
    /// Each source is timed and logged individually; a failing source is
    /// swallowed so the rest of the registry still builds.
    pub fn load(sources: &[Box<dyn NodeSource>]) -> Self {
        let mut registry = Self::new();
        for source in sources {
            let started = Instant::now();
            match source.descriptors() {
                Ok(descriptors) => {
                    let mut registered = 0usize;
                    for descriptor in descriptors {
                        if registry.register(descriptor) {
                            registered += 1;
                        }
                    }
                    tracing::info!(
                        source = source.name(),
                        registered,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Node source loaded",
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        source = source.name(),
                        error = %e,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Node source failed to load, skipping",
                    );
                }
            }
        }
        registry
    }

    /// Register one descriptor. First writer wins: a name that is
    /// already taken is rejected and logged, never replaced.
    pub fn register(&mut self, descriptor: NodeDescriptor) -> bool {
        match self.nodes.entry(descriptor.name.clone()) {
            std::collections::hash_map::Entry::Occupied(_) => {
                tracing::warn!(
                    node = %descriptor.name,
                    "Ignoring conflicting node registration",
                );
                false
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(descriptor);
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&NodeDescriptor> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
