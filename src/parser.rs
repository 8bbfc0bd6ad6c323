//! The parser facade.
//!
//! Implements the interface the host's command-execution machinery expects
//! (`parse_args`, `print_help`, `add_argument`) on top of the contextual
//! command tree and the parser library's own matching. `parse_args` flattens
//! every node on the invoked subcommand path into one merged parameter
//! mapping; help and version requests coming out of the parser library are
//! normalized into the host's clean-exit convention instead of being treated
//! as errors.

use clap::error::ErrorKind;
use serde_json::{Map, Value};
use tracing::debug;

use crate::command::OutputStream;
use crate::common::CommonOptions;
use crate::error::{CommandError, Result};
use crate::params::ParamSpec;
use crate::tree::CommandTree;

/// Result of parsing a full argument vector: the merged option mapping, the
/// raw argument vector, and the invoked subcommand path
#[derive(Debug, Clone)]
pub struct ParsedArgs {
    pub args: Vec<String>,
    pub options: Map<String, Value>,
    pub path: Vec<String>,
}

/// Facade over the parser library scoped to one command instance's tree
pub struct Parser<'a> {
    clap: clap::Command,
    tree: &'a mut CommandTree,
    stdout: OutputStream,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(
        clap: clap::Command,
        tree: &'a mut CommandTree,
        stdout: OutputStream,
    ) -> Self {
        Parser { clap, tree, stdout }
    }

    /// Parse an argument vector against the root application.
    ///
    /// Walks the matched subcommand chain, filling each tree node's value
    /// map, and merges every node's resolved parameters into one flat
    /// mapping seeded with the common-option defaults. On name collision a
    /// deeper node's explicitly supplied value wins; defaults never clobber
    /// an explicit value from a shallower node.
    pub fn parse_args(&mut self, argv: &[&str]) -> Result<ParsedArgs> {
        let matches = match self.clap.clone().try_get_matches_from(argv.iter().copied()) {
            Ok(matches) => matches,
            Err(err) => return Err(self.translate(err)),
        };

        let mut options = Map::new();
        let mut explicit_keys = std::collections::BTreeSet::new();
        let mut path = Vec::new();
        let mut node_id = self.tree.root_id();
        let mut current = &matches;
        loop {
            let specs: Vec<ParamSpec> = {
                let node = self.tree.node(node_id);
                node.params.iter().chain(node.injected.iter()).cloned().collect()
            };
            for spec in &specs {
                if let Some((value, explicit)) = spec.extract(current) {
                    self.tree
                        .node_mut(node_id)
                        .values
                        .insert(spec.name.clone(), value.clone());
                    // deeper nodes win on collision, but a default from a
                    // deeper node never clobbers an explicit value
                    if explicit {
                        explicit_keys.insert(spec.name.clone());
                        options.insert(spec.name.clone(), value);
                    } else if !explicit_keys.contains(&spec.name) {
                        options.insert(spec.name.clone(), value);
                    }
                }
            }
            match current.subcommand() {
                Some((name, sub)) => {
                    node_id = self
                        .tree
                        .child(node_id, name)
                        .ok_or_else(|| CommandError::NoSuchCommand(name.to_string()))?;
                    path.push(name.to_string());
                    current = sub;
                }
                None => break,
            }
        }

        // the host expects the full common option set to be present even
        // when every node suppressed it
        for (name, value) in CommonOptions::defaults_map() {
            options.entry(name).or_insert(value);
        }

        // Mutually exclusive color flags fail here, before any command
        // logic, even when they were split across tree levels.
        CommonOptions::from_map(&options)?;

        debug!(path = path.join(" "), options = options.len(), "parsed arguments");
        Ok(ParsedArgs {
            args: argv.iter().map(|s| s.to_string()).collect(),
            options,
            path,
        })
    }

    /// Render help scoped to a subcommand path onto the instance's output
    /// stream. Matches the `--help` output for the same path.
    pub fn print_help(&mut self, path: &[&str]) -> Result<()> {
        self.tree.lookup(path)?;
        let mut cmd = self.clap.clone();
        let mut scoped = &mut cmd;
        for segment in path {
            scoped = scoped
                .find_subcommand_mut(*segment)
                .ok_or_else(|| CommandError::NoSuchCommand(segment.to_string()))?;
        }
        // parsing derives the subcommand's bin name from the invoked chain
        // (the root contributes nothing under no_binary_name); reproduce it
        // so the usage line matches `--help` output
        let mut owned = scoped.clone();
        if !path.is_empty() {
            owned = owned.bin_name(path.join(" "));
        }
        let help = owned.render_help().to_string();
        self.stdout.write_str(&help)?;
        Ok(())
    }

    /// Imperative parameter registration is deliberately unsupported:
    /// parameters come entirely from declared specs.
    pub fn add_argument(&mut self, _name: &str) -> Result<()> {
        Err(CommandError::NotSupported("add_argument"))
    }

    fn translate(&self, err: clap::Error) -> CommandError {
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                let rendered = err.render().to_string();
                match self.stdout.write_str(&rendered) {
                    Ok(()) => CommandError::Exit(0),
                    Err(io) => io,
                }
            }
            ErrorKind::DisplayVersion => CommandError::Exit(0),
            _ => CommandError::Usage(err.render().to_string()),
        }
    }
}
