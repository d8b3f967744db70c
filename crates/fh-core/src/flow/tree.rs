//! Process tree collection and text rendering.

use std::collections::HashMap;

use fh_common::{format_duration_ms, FlowId, ProcessFlow};
use serde::{Deserialize, Serialize};

/// A root process and all of its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTree {
    pub root: FlowId,
    /// Depth-first, children in insertion order.
    pub nodes: Vec<ProcessFlow>,
    /// Deepest `depth` in the tree.
    pub max_depth: u32,
    /// Sum of durations over nodes that have finished.
    pub total_duration: f64,
}

impl ProcessTree {
    pub(crate) fn collect(processes: &HashMap<FlowId, ProcessFlow>, root: &FlowId) -> Option<Self> {
        let root_node = processes.get(root)?;
        let mut tree = ProcessTree {
            root: root.clone(),
            nodes: Vec::new(),
            max_depth: root_node.depth,
            total_duration: 0.0,
        };
        let mut pending = vec![root_node];
        while let Some(node) = pending.pop() {
            tree.max_depth = tree.max_depth.max(node.depth);
            tree.total_duration += node.duration.unwrap_or(0.0);
            tree.nodes.push(node.clone());
            pending.extend(
                node.children
                    .iter()
                    .rev()
                    .filter_map(|child| processes.get(child)),
            );
        }
        Some(tree)
    }

    pub fn get(&self, id: &FlowId) -> Option<&ProcessFlow> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn node_label(node: &ProcessFlow) -> String {
    let mut label = format!("{} {} ({})", node.status.icon(), node.name, node.duration_label());
    if let Some(error) = &node.error {
        label.push_str(&format!(" - {}", error.message));
    }
    label
}

pub(crate) fn render_tree(processes: &HashMap<FlowId, ProcessFlow>, root: &FlowId) -> String {
    let Some(root_node) = processes.get(root) else {
        return format!("Process {} not found", root);
    };
    let mut out = node_label(root_node);
    render_children(processes, root_node, "", &mut out);
    out
}

fn render_children(
    processes: &HashMap<FlowId, ProcessFlow>,
    node: &ProcessFlow,
    prefix: &str,
    out: &mut String,
) {
    let children: Vec<&ProcessFlow> = node
        .children
        .iter()
        .filter_map(|id| processes.get(id))
        .collect();
    let count = children.len();
    for (i, child) in children.into_iter().enumerate() {
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        out.push('\n');
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(&node_label(child));
        let next_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_children(processes, child, &next_prefix, out);
    }
}

pub(crate) fn render_summary(history: &[ProcessFlow]) -> String {
    if history.is_empty() {
        return "No processes recorded".to_string();
    }
    let mut lines = Vec::with_capacity(history.len());
    for node in history {
        let indent = "  ".repeat(node.depth as usize);
        let duration = node
            .duration
            .map(format_duration_ms)
            .unwrap_or_else(|| "running".to_string());
        let mut line = format!("{}{} {} ({})", indent, node.status.icon(), node.name, duration);
        if let Some(error) = &node.error {
            line.push_str(&format!(" - Error: {}", error.message));
        }
        lines.push(line);
    }
    lines.join("\n")
}
