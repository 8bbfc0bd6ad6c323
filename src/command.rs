//! Command instances and dispatch.
//!
//! A [`CommandInstance`] is one live instantiation of a command type: it
//! owns the I/O streams, the color flags, and a freshly built contextual
//! command tree. Dispatch parses an argument vector through the parser
//! facade, pushes the instance onto the active-instance stack, runs the
//! initializer and group callbacks along the invoked path, and finally the
//! leaf handler. Each handler sees only the parameters its node declared;
//! injected common options it did not ask for stay out of its view.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::debug;

use crate::app::{App, BaseCommand};
use crate::common::CommonOptions;
use crate::context::{ActiveGuard, CommandContext, InstanceToken};
use crate::error::{CommandError, Result};
use crate::parser::{ParsedArgs, Parser};
use crate::register::{Registration, RegistrationKind};
use crate::tree::CommandTree;

/// Where a command writes. `Buffer` supports output capture in tests and
/// programmatic callers.
#[derive(Debug, Clone)]
pub enum OutputStream {
    Stdout,
    Stderr,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl OutputStream {
    /// A fresh capturing stream
    pub fn buffer() -> Self {
        OutputStream::Buffer(Arc::new(Mutex::new(Vec::new())))
    }

    /// Captured contents; empty for the process streams
    pub fn contents(&self) -> String {
        match self {
            OutputStream::Buffer(buf) => buf
                .lock()
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    pub fn write_str(&self, text: &str) -> Result<()> {
        match self {
            OutputStream::Stdout => {
                std::io::stdout().write_all(text.as_bytes())?;
            }
            OutputStream::Stderr => {
                std::io::stderr().write_all(text.as_bytes())?;
            }
            OutputStream::Buffer(buf) => {
                let mut buf = buf.lock().map_err(|_| {
                    std::io::Error::other("output buffer poisoned")
                })?;
                buf.extend_from_slice(text.as_bytes());
            }
        }
        Ok(())
    }

    pub fn write_line(&self, text: &str) -> Result<()> {
        self.write_str(text)?;
        self.write_str("\n")
    }
}

/// Streams and color flags a command instance is constructed with
#[derive(Debug, Clone)]
pub struct IoStreams {
    pub stdout: OutputStream,
    pub stderr: OutputStream,
    pub no_color: bool,
    pub force_color: bool,
}

impl Default for IoStreams {
    fn default() -> Self {
        IoStreams {
            stdout: OutputStream::Stdout,
            stderr: OutputStream::Stderr,
            no_color: false,
            force_color: false,
        }
    }
}

impl IoStreams {
    /// Streams that capture everything, for tests and programmatic callers
    pub fn captured() -> Self {
        IoStreams {
            stdout: OutputStream::buffer(),
            stderr: OutputStream::buffer(),
            no_color: false,
            force_color: false,
        }
    }
}

/// One live instantiation of a command type
pub struct CommandInstance<C: BaseCommand> {
    app: Arc<App<C>>,
    pub inner: C,
    tree: CommandTree,
    stdout: OutputStream,
    stderr: OutputStream,
    no_color: bool,
    force_color: bool,
    token: InstanceToken,
}

impl<C: BaseCommand> Default for CommandInstance<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: BaseCommand> CommandInstance<C> {
    pub fn new() -> Self {
        Self::with_io(IoStreams::default())
    }

    pub fn with_io(io: IoStreams) -> Self {
        if io.no_color && io.force_color {
            // surfaced again as a usage error on dispatch; constructing is
            // allowed so the error can carry through the normal path
            debug!("instance constructed with both color flags set");
        }
        let app = App::<C>::shared();
        let tree = CommandTree::build(&app);
        let token = InstanceToken::issue(app.name());
        CommandInstance {
            inner: C::default(),
            tree,
            stdout: io.stdout,
            stderr: io.stderr,
            no_color: io.no_color,
            force_color: io.force_color,
            token,
            app,
        }
    }

    pub fn name(&self) -> &str {
        self.app.name()
    }

    pub fn app(&self) -> &App<C> {
        &self.app
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn stdout(&self) -> &OutputStream {
        &self.stdout
    }

    pub fn stderr(&self) -> &OutputStream {
        &self.stderr
    }

    /// Identity token for active-instance queries
    pub fn token(&self) -> &InstanceToken {
        &self.token
    }

    /// The host-facing parser for this instance
    pub fn create_parser(&mut self) -> Parser<'_> {
        let clap = self.app.clap_command().clone();
        Parser::new(clap, &mut self.tree, self.stdout.clone())
    }

    /// Parse and dispatch one argument vector, the CLI entry point
    pub fn execute_from_argv(&mut self, argv: &[&str]) -> Result<Option<String>> {
        let parsed = {
            let mut parser = self.create_parser();
            parser.parse_args(argv)?
        };
        self.run_parsed(parsed)
    }

    /// Dispatch an already-parsed invocation; this is what the host's
    /// execution machinery calls with the merged option mapping.
    pub fn run_parsed(&mut self, parsed: ParsedArgs) -> Result<Option<String>> {
        let mut options = parsed.options;
        if self.no_color {
            options.insert("no_color".to_string(), Value::Bool(true));
        }
        if self.force_color {
            options.insert("force_color".to_string(), Value::Bool(true));
        }
        let common = CommonOptions::from_map(&options)?;
        common.apply_colors();

        if common.version {
            let version = self.inner.get_version();
            self.stdout.write_line(&version)?;
            return Err(CommandError::Exit(0));
        }

        let _active = ActiveGuard::enter(self.token.clone());
        self.dispatch(&parsed.path, &options, &common)
    }

    fn dispatch(
        &mut self,
        path: &[String],
        options: &Map<String, Value>,
        common: &CommonOptions,
    ) -> Result<Option<String>> {
        let app = Arc::clone(&self.app);
        let root = app.root();
        debug!(command = app.name(), path = path.join(" "), "dispatching");

        let mut result = None;
        if let Some(callback) = root.handler {
            let run_root = !path.is_empty()
                || app.handle_only()
                || root.opts.invoke_without_command;
            if run_root {
                let ctx = CommandContext::new(
                    app.name(),
                    Vec::new(),
                    options.clone(),
                    &root.params,
                    common.clone(),
                );
                result = callback(&mut self.inner, &ctx)?;
            }
        }

        let mut current = root;
        let mut walked = Vec::new();
        for segment in path {
            current = current
                .child(segment)
                .ok_or_else(|| CommandError::NoSuchCommand(segment.clone()))?;
            walked.push(segment.clone());
            if let Some(handler) = current.handler {
                let ctx = CommandContext::new(
                    app.name(),
                    walked.clone(),
                    options.clone(),
                    &current.params,
                    common.clone(),
                );
                result = handler(&mut self.inner, &ctx)?;
            }
        }
        Ok(result)
    }

    /// Invoke a leaf command directly with native keyword arguments,
    /// bypassing the parser. This is the bound-method form of invocation.
    ///
    /// The mapping handed to the handler is assembled from the declared
    /// defaults of every node on the path and the supplied kwargs; when a
    /// name is declared at several levels the innermost command's binding
    /// wins. Missing required parameters and unknown names are usage
    /// errors. The color-flag conflict fails here too.
    pub fn call_path(
        &mut self,
        path: &[&str],
        kwargs: Map<String, Value>,
    ) -> Result<Option<String>> {
        let app = Arc::clone(&self.app);
        let mut chain: Vec<&Registration<C>> = vec![app.root()];
        for segment in path {
            let next = chain
                .last()
                .and_then(|reg| reg.child(segment))
                .ok_or_else(|| CommandError::NoSuchCommand(segment.to_string()))?;
            chain.push(next);
        }
        let leaf = chain[chain.len() - 1];
        let invocable = match leaf.kind {
            RegistrationKind::Command => true,
            RegistrationKind::Callback => app.handle_only(),
            RegistrationKind::Group => false,
        };
        if !invocable {
            let shown = if path.is_empty() {
                app.name().to_string()
            } else {
                path.join(" ")
            };
            return Err(CommandError::NotACommand(shown));
        }

        let mut options = CommonOptions::defaults_map();
        let mut known: Vec<&str> = Vec::new();
        for reg in &chain {
            for spec in &reg.params {
                known.push(spec.name.as_str());
                if let Some(value) = kwargs.get(&spec.name) {
                    options.insert(spec.name.clone(), value.clone());
                } else if let Some(default) = &spec.default {
                    options
                        .entry(spec.name.clone())
                        .or_insert_with(|| default.clone());
                } else if spec.required {
                    return Err(CommandError::Usage(format!(
                        "missing required argument: {}",
                        spec.name
                    )));
                }
            }
        }
        for key in kwargs.keys() {
            let is_known =
                known.iter().any(|name| *name == key.as_str()) || options.contains_key(key);
            if !is_known {
                return Err(CommandError::Usage(format!("unknown argument: {key}")));
            }
        }
        for (key, value) in &kwargs {
            if crate::common::COMMON_OPTION_NAMES.contains(&key.as_str()) {
                options.insert(key.clone(), value.clone());
            }
        }

        let common = CommonOptions::from_map(&options)?;
        common.apply_colors();

        let handler = leaf
            .handler
            .ok_or_else(|| CommandError::NotACommand(leaf.name.clone()))?;
        let ctx = CommandContext::new(
            app.name(),
            path.iter().map(|s| s.to_string()).collect(),
            options,
            &leaf.params,
            common,
        );
        let _active = ActiveGuard::enter(self.token.clone());
        handler(&mut self.inner, &ctx)
    }

    /// Render help for a subcommand path onto this instance's stdout
    pub fn print_help(&mut self, path: &[&str]) -> Result<()> {
        let mut parser = self.create_parser();
        parser.print_help(path)
    }
}

/// Object-safe surface over any command instance, used by the registry and
/// by host tooling that works across command types
pub trait DynCommand {
    fn name(&self) -> &str;

    /// Parse and dispatch an argument vector
    fn execute(&mut self, argv: &[&str]) -> Result<Option<String>>;

    /// Invoke a leaf command with native keyword arguments
    fn call(&mut self, path: &[&str], kwargs: Map<String, Value>) -> Result<Option<String>>;

    fn print_help(&mut self, path: &[&str]) -> Result<()>;

    /// What a subcommand path addresses, for lookup validation
    fn registration_kind(&self, path: &[&str]) -> Result<RegistrationKind>;

    /// Subcommand names under a path, in display order
    fn subcommands(&self, path: &[&str]) -> Result<Vec<String>>;
}

impl<C: BaseCommand> DynCommand for CommandInstance<C> {
    fn name(&self) -> &str {
        self.app.name()
    }

    fn execute(&mut self, argv: &[&str]) -> Result<Option<String>> {
        self.execute_from_argv(argv)
    }

    fn call(&mut self, path: &[&str], kwargs: Map<String, Value>) -> Result<Option<String>> {
        self.call_path(path, kwargs)
    }

    fn print_help(&mut self, path: &[&str]) -> Result<()> {
        CommandInstance::print_help(self, path)
    }

    fn registration_kind(&self, path: &[&str]) -> Result<RegistrationKind> {
        match self.app.registration(path) {
            Some(_) if path.is_empty() && self.app.handle_only() => {
                Ok(RegistrationKind::Command)
            }
            Some(reg) => Ok(reg.kind),
            None => Err(CommandError::NoSuchCommand(path.join(" "))),
        }
    }

    fn subcommands(&self, path: &[&str]) -> Result<Vec<String>> {
        let node = self.tree.lookup(path)?;
        Ok(self
            .tree
            .subcommand_names(node)
            .into_iter()
            .map(|s| s.to_string())
            .collect())
    }
}
