use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};

/// A node in a workflow document. `config` is opaque to the
/// orchestrator except for the optional port-type declarations used
/// by the structural validator below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: serde_json::Value,
    #[serde(default)]
    pub config: NodeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub input_ports: HashMap<String, String>,
    #[serde(default)]
    pub output_ports: HashMap<String, String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConnection {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
}

/// The workflow interchange format (§6): opaque bytes to the
/// orchestrator beyond this structural shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub nodes: Vec<WorkflowNode>,
    pub connections: Vec<WorkflowConnection>,
}

const START_NODE_TYPE: &str = "Start";

impl WorkflowDocument {
    pub fn parse(payload: &[u8]) -> OrchestratorResult<Self> {
        serde_json::from_slice(payload).map_err(OrchestratorError::from)
    }

    /// Structural validity check performed at `submit` (§6): exactly
    /// one `Start` node; every referenced node id exists; no cycles;
    /// every connection's ports are type-compatible where declared.
    pub fn validate(&self) -> OrchestratorResult<()> {
        self.check_single_start()?;
        self.check_node_references_exist()?;
        self.check_acyclic()?;
        self.check_port_compatibility()?;
        Ok(())
    }

    fn check_single_start(&self) -> OrchestratorResult<()> {
        let start_count = self.nodes.iter().filter(|n| n.node_type == START_NODE_TYPE).count();
        if start_count != 1 {
            return Err(OrchestratorError::InvalidArgument(format!(
                "workflow must have exactly one Start node, found {start_count}"
            )));
        }
        Ok(())
    }

    fn check_node_references_exist(&self) -> OrchestratorResult<()> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for conn in &self.connections {
            if !ids.contains(conn.from_node.as_str()) {
                return Err(OrchestratorError::InvalidArgument(format!(
                    "connection references unknown node {}",
                    conn.from_node
                )));
            }
            if !ids.contains(conn.to_node.as_str()) {
                return Err(OrchestratorError::InvalidArgument(format!(
                    "connection references unknown node {}",
                    conn.to_node
                )));
            }
        }
        Ok(())
    }

    /// Kahn's algorithm: repeatedly remove nodes with in-degree zero.
    /// If any node remains once no more can be removed, a cycle exists.
    fn check_acyclic(&self) -> OrchestratorResult<()> {
        let mut in_degree: HashMap<&str, usize> = self.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for conn in &self.connections {
            *in_degree.entry(conn.to_node.as_str()).or_insert(0) += 1;
            adjacency.entry(conn.from_node.as_str()).or_default().push(conn.to_node.as_str());
        }

        let mut queue: Vec<&str> = in_degree.iter().filter(|(_, &deg)| deg == 0).map(|(&id, _)| id).collect();
        queue.sort_unstable();
        let mut visited = 0usize;

        while let Some(id) = queue.pop() {
            visited += 1;
            if let Some(successors) = adjacency.get(id) {
                for &next in successors {
                    let deg = in_degree.get_mut(next).expect("target collected above");
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push(next);
                    }
                }
            }
        }

        if visited != self.nodes.len() {
            return Err(OrchestratorError::InvalidArgument("workflow graph contains a cycle".to_string()));
        }
        Ok(())
    }

    fn check_port_compatibility(&self) -> OrchestratorResult<()> {
        let nodes: HashMap<&str, &WorkflowNode> = self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        for conn in &self.connections {
            let from = nodes[conn.from_node.as_str()];
            let to = nodes[conn.to_node.as_str()];
            let from_type = from.config.output_ports.get(&conn.from_port);
            let to_type = to.config.input_ports.get(&conn.to_port);
            if let (Some(from_type), Some(to_type)) = (from_type, to_type) {
                if from_type != to_type {
                    return Err(OrchestratorError::InvalidArgument(format!(
                        "port type mismatch on {}:{} -> {}:{} ({from_type} != {to_type})",
                        conn.from_node, conn.from_port, conn.to_node, conn.to_port
                    )));
                }
            }
        }
        Ok(())
    }
}
