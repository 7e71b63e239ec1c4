//! Arena-backed task forest.
//!
//! Nodes live in a flat table in pre-order with parent/children links as
//! indices and an id index for lookup. Applying an update is an index lookup
//! plus a field write; nothing else in the tree is touched or copied.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::stats::WorkflowStatistics;
use crate::{Task, TaskId, TaskUpdate};

#[derive(Debug, Clone)]
struct Node {
    /// Task fields; `children` is always empty here, nesting lives in `children`.
    task: Task,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Task forest stored as an arena.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Task>", into = "Vec<Task>")]
pub struct TaskTree {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    index: HashMap<TaskId, usize>,
    version: u64,
}

impl TaskTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an arena from a nested forest.
    ///
    /// When ids repeat, lookups resolve to the first node in pre-order.
    pub fn from_forest(forest: &[Task]) -> Self {
        let mut tree = Self::default();
        for task in forest {
            let idx = tree.insert(task, None);
            tree.roots.push(idx);
        }
        tree
    }

    fn insert(&mut self, task: &Task, parent: Option<usize>) -> usize {
        let idx = self.nodes.len();
        let mut flat = task.clone();
        flat.children = Vec::new();
        self.index.entry(flat.id.clone()).or_insert(idx);
        self.nodes.push(Node {
            task: flat,
            parent,
            children: Vec::with_capacity(task.children.len()),
        });
        for child in &task.children {
            let child_idx = self.insert(child, Some(idx));
            self.nodes[idx].children.push(child_idx);
        }
        idx
    }

    /// Rebuild the nested forest.
    pub fn to_forest(&self) -> Vec<Task> {
        self.roots.iter().map(|&idx| self.materialize(idx)).collect()
    }

    fn materialize(&self, idx: usize) -> Task {
        let node = &self.nodes[idx];
        let mut task = node.task.clone();
        task.children = node.children.iter().map(|&c| self.materialize(c)).collect();
        task
    }

    /// Apply an update to the node it targets.
    ///
    /// Returns `false` (and leaves the tree untouched) when no node has the
    /// target id.
    pub fn apply(&mut self, update: &TaskUpdate) -> bool {
        let Some(&idx) = self.index.get(update.task_id()) else {
            return false;
        };
        update.apply_to(&mut self.nodes[idx].task);
        self.version += 1;
        true
    }

    /// Look up a node by id. The returned task has no children attached.
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&idx| &self.nodes[idx].task)
    }

    /// Id of the parent of a node, if it has one.
    pub fn parent_of(&self, id: &TaskId) -> Option<&TaskId> {
        let idx = *self.index.get(id)?;
        let parent = self.nodes[idx].parent?;
        Some(&self.nodes[parent].task.id)
    }

    /// Ids of the direct children of a node, in order.
    pub fn children_of(&self, id: &TaskId) -> Vec<&TaskId> {
        self.index
            .get(id)
            .map(|&idx| {
                self.nodes[idx]
                    .children
                    .iter()
                    .map(|&c| &self.nodes[c].task.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every node in pre-order, without children attached.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.nodes.iter().map(|node| &node.task)
    }

    /// Number of nodes (roots and descendants).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of root tasks.
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Bumped once per applied update.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Aggregate statistics over every node.
    pub fn statistics(&self) -> WorkflowStatistics {
        WorkflowStatistics::from_tasks(self.iter())
    }
}

impl PartialEq for TaskTree {
    fn eq(&self, other: &Self) -> bool {
        self.to_forest() == other.to_forest()
    }
}

impl From<Vec<Task>> for TaskTree {
    fn from(forest: Vec<Task>) -> Self {
        Self::from_forest(&forest)
    }
}

impl From<TaskTree> for Vec<Task> {
    fn from(tree: TaskTree) -> Self {
        tree.to_forest()
    }
}
