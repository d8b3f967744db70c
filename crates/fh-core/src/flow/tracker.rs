//! Hierarchical process-flow tracking.
//!
//! Nodes started with [`ProcessFlowTracker::start_process`] are parented
//! to whatever process is on top of the tracker's context stack. Ending or
//! cancelling removes a node from the stack wherever it sits, so
//! out-of-order ends are tolerated. Two unrelated chains that overlap in
//! time on the same tracker will misattribute parentage; use
//! [`ProcessFlowTracker::start_child`] to pass the parent explicitly.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use fh_common::{CapturedError, FlowId, FlowStats, FlowStatus, Metadata, ProcessFlow};
use fh_config::ProcessesConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::logging::targets;

use super::tree::{self, ProcessTree};

/// Completed and cancelled processes kept in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// Metadata key recording why a process was cancelled.
pub const CANCEL_REASON_KEY: &str = "cancel_reason";

/// Snapshot returned by [`ProcessFlowTracker::export_data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowExport {
    pub export_timestamp: i64,
    pub active: Vec<ProcessFlow>,
    /// Newest first.
    pub history: Vec<ProcessFlow>,
    pub stats: FlowStats,
}

#[derive(Debug, Default)]
struct TrackerState {
    processes: HashMap<FlowId, ProcessFlow>,
    /// Running ids in start order.
    active: Vec<FlowId>,
    /// Terminal ids, newest first.
    history: VecDeque<FlowId>,
    context_stack: Vec<FlowId>,
}

impl TrackerState {
    fn nodes<'a>(&'a self, ids: impl Iterator<Item = &'a FlowId>) -> Vec<ProcessFlow> {
        ids.filter_map(|id| self.processes.get(id)).cloned().collect()
    }

    fn detach(&mut self, id: &FlowId) {
        self.active.retain(|a| a != id);
        self.context_stack.retain(|c| c != id);
    }

    /// Drop a node from the table and unlink it from its parent's children.
    fn forget(&mut self, id: &FlowId) {
        let Some(node) = self.processes.remove(id) else {
            return;
        };
        if let Some(parent) = node
            .parent_id
            .as_ref()
            .and_then(|pid| self.processes.get_mut(pid))
        {
            parent.children.retain(|c| c != id);
        }
    }

    fn push_history(&mut self, id: FlowId, capacity: usize) {
        self.history.push_front(id);
        while self.history.len() > capacity {
            if let Some(evicted) = self.history.pop_back() {
                self.forget(&evicted);
            }
        }
    }
}

/// Tracker of nested logical operations.
#[derive(Debug)]
pub struct ProcessFlowTracker {
    origin: Instant,
    history_capacity: usize,
    state: Mutex<TrackerState>,
}

impl Default for ProcessFlowTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ProcessFlowTracker {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            origin: Instant::now(),
            history_capacity: history_capacity.max(1),
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn from_config(config: &ProcessesConfig) -> Self {
        Self::new(config.history_capacity)
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Milliseconds since the tracker clock origin.
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    /// Start a process nested under the current context, and make it current.
    pub fn start_process(&self, name: &str, metadata: Metadata, tags: Vec<String>) -> FlowId {
        let mut state = self.lock();
        let parent = state.context_stack.last().cloned();
        let id = self.register(&mut state, name, parent, metadata, tags);
        state.context_stack.push(id.clone());
        id
    }

    /// Start a process under an explicit parent.
    ///
    /// The context stack is neither consulted nor changed. An unknown
    /// parent makes the new process a root.
    pub fn start_child(
        &self,
        parent: &FlowId,
        name: &str,
        metadata: Metadata,
        tags: Vec<String>,
    ) -> FlowId {
        let mut state = self.lock();
        let parent = if state.processes.contains_key(parent) {
            Some(parent.clone())
        } else {
            warn!(
                target: targets::FLOW,
                parent = %parent,
                name,
                "unknown parent process; starting as root"
            );
            None
        };
        self.register(&mut state, name, parent, metadata, tags)
    }

    fn register(
        &self,
        state: &mut TrackerState,
        name: &str,
        parent: Option<FlowId>,
        metadata: Metadata,
        tags: Vec<String>,
    ) -> FlowId {
        let id = FlowId::new();
        let depth = match parent.as_ref().and_then(|p| state.processes.get_mut(p)) {
            Some(parent_node) => {
                parent_node.children.push(id.clone());
                parent_node.depth + 1
            }
            None => 0,
        };
        let node = ProcessFlow {
            id: id.clone(),
            name: name.to_string(),
            start_time: self.now_ms(),
            end_time: None,
            duration: None,
            started_at: Utc::now(),
            parent_id: parent,
            children: Vec::new(),
            status: FlowStatus::Running,
            error: None,
            metadata,
            tags,
            depth,
        };
        info!(
            target: targets::FLOW,
            flow_id = %id,
            name,
            depth,
            parent = node.parent_id.as_ref().map(|p| p.as_str()).unwrap_or("-"),
            "process started"
        );
        state.processes.insert(id.clone(), node);
        state.active.push(id.clone());
        id
    }

    /// End a running process, with `error` marking it failed.
    ///
    /// Unknown or already finished ids are a logged no-op returning `None`.
    pub fn end_process(&self, id: &FlowId, error: Option<CapturedError>) -> Option<ProcessFlow> {
        let status = if error.is_some() {
            FlowStatus::Error
        } else {
            FlowStatus::Success
        };
        self.finish(id, status, |node| node.error = error)
    }

    /// Cancel a running process, recording `reason` in its metadata.
    ///
    /// Cancelled processes go to history like ended ones. Children are not
    /// cancelled.
    pub fn cancel_process(&self, id: &FlowId, reason: Option<&str>) -> Option<ProcessFlow> {
        self.finish(id, FlowStatus::Cancelled, |node| {
            node.metadata.insert(
                CANCEL_REASON_KEY.to_string(),
                serde_json::Value::String(reason.unwrap_or("cancelled").to_string()),
            );
        })
    }

    fn finish(
        &self,
        id: &FlowId,
        status: FlowStatus,
        apply: impl FnOnce(&mut ProcessFlow),
    ) -> Option<ProcessFlow> {
        let end_time = self.now_ms();
        let mut state = self.lock();
        let node = match state.processes.get_mut(id) {
            Some(node) if node.is_running() => node,
            Some(node) => {
                warn!(
                    target: targets::FLOW,
                    flow_id = %id,
                    status = %node.status,
                    requested = %status,
                    "process already finished"
                );
                return None;
            }
            None => {
                warn!(target: targets::FLOW, flow_id = %id, "unknown process");
                return None;
            }
        };

        node.end_time = Some(end_time);
        node.duration = Some(end_time - node.start_time);
        node.status = status;
        apply(node);
        let finished = node.clone();

        state.detach(id);
        state.push_history(id.clone(), self.history_capacity);
        drop(state);

        let duration_ms = finished.duration.unwrap_or_default();
        match &finished.error {
            Some(error) => warn!(
                target: targets::FLOW,
                flow_id = %id,
                name = %finished.name,
                status = %finished.status,
                duration_ms,
                error = %error,
                "process ended"
            ),
            None => info!(
                target: targets::FLOW,
                flow_id = %id,
                name = %finished.name,
                status = %finished.status,
                duration_ms,
                "process ended"
            ),
        }
        Some(finished)
    }

    /// Run `f` inside a process ended with its outcome.
    ///
    /// A panic inside `f` cancels the process before unwinding further.
    pub fn run<T, E, F>(&self, name: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error,
    {
        let id = self.start_process(name, Metadata::new(), Vec::new());
        let mut guard = RunGuard {
            tracker: self,
            id: Some(id),
        };
        let result = f();
        if let Some(id) = guard.id.take() {
            let error = result.as_ref().err().map(CapturedError::from_error);
            self.end_process(&id, error);
        }
        result
    }

    pub fn get_process(&self, id: &FlowId) -> Option<ProcessFlow> {
        self.lock().processes.get(id).cloned()
    }

    /// Collect `root` and all its descendants.
    pub fn build_process_tree(&self, root: &FlowId) -> Option<ProcessTree> {
        let state = self.lock();
        ProcessTree::collect(&state.processes, root)
    }

    /// Running processes in start order.
    pub fn get_active_processes(&self) -> Vec<ProcessFlow> {
        let state = self.lock();
        state.nodes(state.active.iter())
    }

    /// Finished processes, newest first, at most `limit`.
    pub fn get_process_history(&self, limit: usize) -> Vec<ProcessFlow> {
        let state = self.lock();
        state.nodes(state.history.iter().take(limit))
    }

    /// Root-to-leaf chain ending at the most recent failed process.
    pub fn get_error_flow_chain(&self) -> Vec<ProcessFlow> {
        let state = self.lock();
        let Some(failed) = state
            .history
            .iter()
            .filter_map(|id| state.processes.get(id))
            .find(|node| node.status == FlowStatus::Error)
        else {
            return Vec::new();
        };

        let mut chain = vec![failed.clone()];
        let mut parent = failed.parent_id.clone();
        while let Some(parent_id) = parent {
            let Some(node) = state.processes.get(&parent_id) else {
                break;
            };
            parent = node.parent_id.clone();
            chain.push(node.clone());
        }
        chain.reverse();
        chain
    }

    /// Box-drawing tree of `root` and its descendants.
    pub fn visualize_process_tree(&self, root: &FlowId) -> String {
        let state = self.lock();
        tree::render_tree(&state.processes, root)
    }

    /// Flat summary of the last `limit` finished processes.
    pub fn generate_flow_summary(&self, limit: usize) -> String {
        tree::render_summary(&self.get_process_history(limit))
    }

    pub fn export_data(&self) -> FlowExport {
        let state = self.lock();
        let active = state.nodes(state.active.iter());
        let history = state.nodes(state.history.iter());
        let stats = FlowStats::compute(&history, &active);
        FlowExport {
            export_timestamp: fh_common::now_millis(),
            active,
            history,
            stats,
        }
    }

    /// Drop finished processes that started more than `older_than_ms` ago.
    ///
    /// Running processes are kept regardless of age. Returns the number
    /// removed.
    pub fn cleanup(&self, older_than_ms: i64) -> usize {
        let cutoff = Utc::now() - ChronoDuration::milliseconds(older_than_ms);
        let mut state = self.lock();
        let stale: Vec<FlowId> = state
            .processes
            .values()
            .filter(|node| node.status.is_terminal() && node.started_at < cutoff)
            .map(|node| node.id.clone())
            .collect();
        for id in &stale {
            state.forget(id);
        }
        state.history.retain(|id| !stale.contains(id));
        if !stale.is_empty() {
            info!(
                target: targets::FLOW,
                removed = stale.len(),
                older_than_ms,
                "cleaned up finished processes"
            );
        }
        stale.len()
    }

    /// Forget every process, running or not.
    pub fn reset(&self) {
        *self.lock() = TrackerState::default();
    }
}

/// Cancels the running process when `run` unwinds.
struct RunGuard<'a> {
    tracker: &'a ProcessFlowTracker,
    id: Option<FlowId>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.tracker.cancel_process(&id, Some("panicked"));
        }
    }
}
