//! The contextual command tree.
//!
//! Each command instance owns a tree mirroring the application's
//! command/group nesting, rebuilt at construction time. Nodes live in a flat
//! arena and reference each other by index, so the structure is trivially
//! acyclic and never extends the owning instance's lifetime. Parsing fills
//! each node's value map; the shell-completion collaborator reads node
//! structure and parameter metadata from here.

use serde_json::{Map, Value};
use tracing::trace;

use crate::app::{App, BaseCommand};
use crate::common;
use crate::error::{CommandError, Result};
use crate::params::ParamSpec;
use crate::register::{Registration, RegistrationKind};

/// Arena index of one tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Command,
    Group,
}

/// One command or group in the resolved tree
#[derive(Debug)]
pub struct ContextNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Child indices in lexicographic name order
    pub children: Vec<NodeId>,
    /// Parameters this node declared itself
    pub params: Vec<ParamSpec>,
    /// Common options injected at this node
    pub injected: Vec<ParamSpec>,
    /// Resolved parameter values, filled by parsing
    pub values: Map<String, Value>,
}

/// Flat arena of context nodes rooted at the application
pub struct CommandTree {
    nodes: Vec<ContextNode>,
}

impl CommandTree {
    /// Build the tree by depth-first traversal of the application's
    /// registration structure
    pub fn build<C: BaseCommand>(app: &App<C>) -> Self {
        let mut tree = CommandTree { nodes: Vec::new() };
        tree.add_node(app.root(), None, NodeKind::Root);
        trace!(command = app.name(), nodes = tree.nodes.len(), "built command tree");
        tree
    }

    fn add_node<C>(
        &mut self,
        registration: &Registration<C>,
        parent: Option<NodeId>,
        kind: NodeKind,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let injected = common::injected_for(&registration.params, &registration.opts.suppressed);
        self.nodes.push(ContextNode {
            id,
            name: registration.name.clone(),
            kind,
            parent,
            children: Vec::new(),
            params: registration.params.clone(),
            injected,
            values: Map::new(),
        });
        for child in &registration.children {
            let child_kind = match child.kind {
                RegistrationKind::Group => NodeKind::Group,
                _ => NodeKind::Command,
            };
            let child_id = self.add_node(child, Some(id), child_kind);
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &ContextNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ContextNode {
        &mut self.nodes[id.0]
    }

    /// Child of `id` with the given CLI name
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].name == name)
    }

    /// Resolve a subcommand path, failing with the first unknown segment
    pub fn lookup(&self, path: &[&str]) -> Result<NodeId> {
        let mut current = self.root_id();
        for segment in path {
            current = self
                .child(current, segment)
                .ok_or_else(|| CommandError::NoSuchCommand(segment.to_string()))?;
        }
        Ok(current)
    }

    /// Descend along tokens as far as they name subcommands; returns the
    /// deepest matched node and the unconsumed tokens. This is the structure
    /// the external completer enumerates candidates from.
    pub fn descend<'t>(&self, tokens: &'t [String]) -> (NodeId, &'t [String]) {
        let mut current = self.root_id();
        let mut index = 0;
        while index < tokens.len() {
            match self.child(current, &tokens[index]) {
                Some(next) => {
                    current = next;
                    index += 1;
                }
                None => break,
            }
        }
        (current, &tokens[index..])
    }

    /// Names of `id`'s subcommands, already in lexicographic order
    pub fn subcommand_names(&self, id: NodeId) -> Vec<&str> {
        self.nodes[id.0]
            .children
            .iter()
            .map(|&c| self.nodes[c.0].name.as_str())
            .collect()
    }

    /// CLI names from the root (exclusive) down to `id`
    pub fn path_names(&self, id: NodeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            if node.parent.is_some() {
                names.push(node.name.clone());
            }
            current = node.parent;
        }
        names.reverse();
        names
    }
}
