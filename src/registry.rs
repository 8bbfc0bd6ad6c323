//! Command lookup.
//!
//! The host resolves registered command names through an explicit registry:
//! command types are registered by name, instantiated on demand with caller
//! supplied streams and color flags, and optionally bound to a subcommand
//! path. Binding a path that addresses a group or callback fails, since those
//! are not independently invocable commands.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::app::BaseCommand;
use crate::command::{CommandInstance, DynCommand, IoStreams};
use crate::error::{CommandError, Result};
use crate::register::{cli_name, RegistrationKind};

type Factory = fn(IoStreams) -> Box<dyn DynCommand>;

fn instantiate<C: BaseCommand>(io: IoStreams) -> Box<dyn DynCommand> {
    Box::new(CommandInstance::<C>::with_io(io))
}

/// Name-keyed table of registered command types
#[derive(Default)]
pub struct CommandRegistry {
    factories: BTreeMap<String, Factory>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        CommandRegistry::default()
    }

    /// Register a command type under its declared name
    pub fn register<C: BaseCommand>(&mut self) -> &mut Self {
        self.factories.insert(cli_name(C::NAME), instantiate::<C>);
        self
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    /// Instantiate a registered command with the given streams
    pub fn get_command(&self, name: &str, io: IoStreams) -> Result<Box<dyn DynCommand>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
        Ok(factory(io))
    }

    /// Instantiate a command and bind it to a leaf subcommand path
    pub fn get_subcommand(
        &self,
        name: &str,
        path: &[&str],
        io: IoStreams,
    ) -> Result<BoundCommand> {
        let command = self.get_command(name, io)?;
        match command.registration_kind(path)? {
            RegistrationKind::Command => Ok(BoundCommand {
                command,
                path: path.iter().map(|s| s.to_string()).collect(),
            }),
            _ => Err(CommandError::NotACommand(if path.is_empty() {
                name.to_string()
            } else {
                path.join(" ")
            })),
        }
    }

    /// The host's command-call shortcut: instantiate, parse, dispatch
    pub fn call_command(&self, name: &str, argv: &[&str]) -> Result<Option<String>> {
        let mut command = self.get_command(name, IoStreams::captured())?;
        command.execute(argv)
    }
}

/// A command instance pre-bound to one leaf subcommand
pub struct BoundCommand {
    command: Box<dyn DynCommand>,
    path: Vec<String>,
}

impl BoundCommand {
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Invoke the bound subcommand with native keyword arguments
    pub fn call(&mut self, kwargs: Map<String, Value>) -> Result<Option<String>> {
        let path: Vec<&str> = self.path.iter().map(|s| s.as_str()).collect();
        self.command.call(&path, kwargs)
    }
}
