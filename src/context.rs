//! Invocation contexts and the active-instance stack.
//!
//! Handlers receive the owning instance explicitly (`&mut self`) plus a
//! [`CommandContext`] carrying the merged parameter mapping, the node-scoped
//! view of it, and the typed common options. Alongside that explicit flow, a
//! thread-local token stack records which command instance is currently
//! executing; nested invocations push and pop re-entrantly and the stack is
//! restored even when a dispatch fails.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};

use crate::common::CommonOptions;
use crate::params::ParamSpec;

/// Context handed to every command, group callback, and initializer
#[derive(Debug, Clone)]
pub struct CommandContext {
    command: String,
    path: Vec<String>,
    options: Map<String, Value>,
    view: Map<String, Value>,
    common: CommonOptions,
}

impl CommandContext {
    pub(crate) fn new(
        command: impl Into<String>,
        path: Vec<String>,
        options: Map<String, Value>,
        params: &[ParamSpec],
        common: CommonOptions,
    ) -> Self {
        let mut view = Map::new();
        for spec in params {
            if let Some(value) = options.get(&spec.name) {
                view.insert(spec.name.clone(), value.clone());
            } else if let Some(default) = &spec.default {
                view.insert(spec.name.clone(), default.clone());
            }
        }
        CommandContext {
            command: command.into(),
            path,
            options,
            view,
            common,
        }
    }

    /// Name of the owning top-level command
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Subcommand path below the root for the node being invoked
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The node-scoped parameter view: exactly the parameters this node
    /// declared, nothing injected.
    pub fn params(&self) -> &Map<String, Value> {
        &self.view
    }

    /// One declared parameter value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.view.get(name)
    }

    /// The full merged mapping across the invoked path, common options
    /// included
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Typed common options for this invocation
    pub fn common(&self) -> &CommonOptions {
        &self.common
    }
}

/// Identity of a live command instance, for "who is currently executing"
/// queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceToken {
    pub command: String,
    pub serial: u64,
}

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

impl InstanceToken {
    pub(crate) fn issue(command: &str) -> Self {
        InstanceToken {
            command: command.to_string(),
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
        }
    }
}

thread_local! {
    static ACTIVE: RefCell<Vec<InstanceToken>> = const { RefCell::new(Vec::new()) };
}

/// Token of the innermost instance currently dispatching on this thread
pub fn current_command() -> Option<InstanceToken> {
    ACTIVE.with(|stack| stack.borrow().last().cloned())
}

/// Depth of the active-instance stack (0 outside any dispatch)
pub fn active_depth() -> usize {
    ACTIVE.with(|stack| stack.borrow().len())
}

/// Scoped push onto the active-instance stack; pops on drop, so the prior
/// top is restored on both normal and error returns.
pub(crate) struct ActiveGuard {
    depth: usize,
}

impl ActiveGuard {
    pub(crate) fn enter(token: InstanceToken) -> Self {
        let depth = ACTIVE.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(token);
            stack.len()
        });
        ActiveGuard { depth }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth);
            stack.pop();
        });
    }
}
