//! Application construction.
//!
//! This is the class-builder step: a command type describes itself through
//! [`BaseCommand::define`], and [`App::build`] consumes the resulting
//! registration table exactly once to produce the immutable application
//! object: the parser library's command tree with the common option set
//! injected at every node, plus the handler table dispatch walks at
//! invocation time. One application object exists per command type; it is
//! built on first use and shared read-only afterwards.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use clap::Command;
use tracing::debug;

use crate::common;
use crate::context::CommandContext;
use crate::error::{CommandError, Result};
use crate::params::ParamSpec;
use crate::register::{cli_name, AppBuilder, GroupOpts, Handler, Registration, RegistrationKind};

/// Type-level declarative options, the equivalent of class-level keyword
/// arguments on a command definition
#[derive(Debug, Clone, Default)]
pub struct AppOpts {
    pub help: Option<String>,
    pub invoke_without_command: bool,
    pub no_args_is_help: bool,
    pub subcommand_metavar: Option<String>,
    pub chain: bool,
    pub hidden: bool,
    pub deprecated: bool,
}

/// A command type: one CLI entry point built from registered methods.
///
/// Implementors register commands, groups, and an optional initializer in
/// [`define`](BaseCommand::define). A type that registers nothing falls back
/// to [`handle`](BaseCommand::handle); if that is not overridden either,
/// dispatch fails with a configuration error naming the command.
pub trait BaseCommand: Default + 'static {
    /// Command name, the equivalent of the defining module's name
    const NAME: &'static str;

    /// Type-level declarative options
    fn app_opts() -> AppOpts {
        AppOpts::default()
    }

    /// Fallback help text, the equivalent of the defining type's docstring.
    /// Layered definitions can forward to another type's `help()` to inherit
    /// it.
    fn help() -> Option<&'static str> {
        None
    }

    /// Register commands, groups, and the initializer. Layered definitions
    /// call another type's `define` first and then add or replace
    /// registrations; same-name registrations are last-writer-wins.
    fn define(app: &mut AppBuilder<Self>);

    /// Parameters of the implicit `handle` command, when one is used
    fn handle_params() -> Vec<ParamSpec> {
        Vec::new()
    }

    /// Implicit top-level command body for types that register nothing
    /// else. The default is deliberately a configuration error: a command
    /// type that registers nothing is a mistake, not a no-op.
    fn handle(&mut self, _ctx: &CommandContext) -> Result<Option<String>> {
        Err(CommandError::NotImplemented(format!(
            "the command {} registered no commands, groups, or handle() implementation",
            Self::NAME
        )))
    }

    /// Version string reported by `--version`. Runs on the live instance so
    /// implementations can consult instance state.
    fn get_version(&self) -> String {
        crate::VERSION.to_string()
    }
}

/// The finalized application object for one command type
pub struct App<C> {
    name: String,
    help: Option<String>,
    root: Registration<C>,
    clap: Command,
    handle_only: bool,
}

impl<C: BaseCommand> App<C> {
    /// Build the application object from the type's definition. Prefer
    /// [`App::shared`], which builds once per type.
    pub fn build() -> Self {
        let mut builder = AppBuilder::new(C::NAME);
        C::define(&mut builder);
        Self::finish(builder)
    }

    /// The per-type shared application object, built on first use
    pub fn shared() -> Arc<App<C>> {
        let mut cache = app_cache().lock().expect("application cache poisoned");
        let entry = cache
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Arc::new(App::<C>::build()) as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry)
            .downcast::<App<C>>()
            .expect("application cache holds a mismatched type")
    }

    fn finish(builder: AppBuilder<C>) -> Self {
        let opts = C::app_opts();
        let help = opts.help.clone().or_else(|| C::help().map(String::from));

        let mut callback = builder.callback;
        let mut registrations = builder.registrations;
        let mut handle_only = false;
        if registrations.is_empty() {
            if callback.is_some() {
                // A bare handle() next to an initializer becomes the
                // implicit subcommand named after the command itself.
                registrations.push(Registration {
                    kind: RegistrationKind::Command,
                    name: cli_name(C::NAME),
                    opts: GroupOpts::default(),
                    params: C::handle_params(),
                    handler: Some(C::handle as Handler<C>),
                    children: Vec::new(),
                });
            } else {
                handle_only = true;
            }
        }

        let callback_opts = callback.as_ref().map(|cb| cb.opts.clone());
        let (root_params, root_handler) = if handle_only {
            (C::handle_params(), Some(C::handle as Handler<C>))
        } else {
            match callback.take() {
                Some(cb) => (cb.params, cb.handler),
                None => (Vec::new(), None),
            }
        };

        let root_opts = GroupOpts {
            help: help.clone(),
            epilog: callback_opts.as_ref().and_then(|o| o.epilog.clone()),
            short_help: callback_opts.as_ref().and_then(|o| o.short_help.clone()),
            hidden: opts.hidden,
            deprecated: opts.deprecated
                || callback_opts.as_ref().is_some_and(|o| o.deprecated),
            no_args_is_help: opts.no_args_is_help
                || callback_opts.as_ref().is_some_and(|o| o.no_args_is_help),
            suppressed: callback_opts
                .as_ref()
                .map(|o| o.suppressed.clone())
                .unwrap_or_default(),
            invoke_without_command: handle_only
                || opts.invoke_without_command
                || callback_opts
                    .as_ref()
                    .is_some_and(|o| o.invoke_without_command),
            subcommand_metavar: opts.subcommand_metavar.clone().or_else(|| {
                callback_opts
                    .as_ref()
                    .and_then(|o| o.subcommand_metavar.clone())
            }),
            chain: opts.chain || callback_opts.as_ref().is_some_and(|o| o.chain),
        };

        let mut root = Registration {
            kind: RegistrationKind::Callback,
            name: cli_name(C::NAME),
            opts: root_opts,
            params: root_params,
            handler: root_handler,
            children: registrations,
        };
        sort_children(&mut root);

        let clap = to_clap(&root, true);
        debug!(
            command = root.name,
            subcommands = root.children.len(),
            handle_only,
            "built application object"
        );

        App {
            name: root.name.clone(),
            help,
            root,
            clap,
            handle_only,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// True when the type registered nothing and dispatch routes straight
    /// to `handle`
    pub fn handle_only(&self) -> bool {
        self.handle_only
    }

    pub fn root(&self) -> &Registration<C> {
        &self.root
    }

    /// The parser library's view of this application
    pub fn clap_command(&self) -> &Command {
        &self.clap
    }

    /// Resolve a subcommand path to its registration
    pub fn registration(&self, path: &[&str]) -> Option<&Registration<C>> {
        let mut current = &self.root;
        for segment in path {
            current = current.child(segment)?;
        }
        Some(current)
    }
}

fn sort_children<C>(registration: &mut Registration<C>) {
    registration.children.sort_by(|a, b| a.name.cmp(&b.name));
    for child in &mut registration.children {
        sort_children(child);
    }
}

fn to_clap<C>(registration: &Registration<C>, is_root: bool) -> Command {
    let mut cmd = Command::new(registration.name.clone());
    if is_root {
        cmd = cmd.no_binary_name(true);
    }
    let about = registration
        .opts
        .help
        .as_ref()
        .or(registration.opts.short_help.as_ref());
    match (about, registration.opts.deprecated) {
        (Some(text), true) => cmd = cmd.about(format!("(deprecated) {text}")),
        (Some(text), false) => cmd = cmd.about(text.clone()),
        (None, true) => cmd = cmd.about("(deprecated)"),
        (None, false) => {}
    }
    if let Some(epilog) = &registration.opts.epilog {
        cmd = cmd.after_help(epilog.clone());
    }
    if registration.opts.hidden {
        cmd = cmd.hide(true);
    }

    for spec in &registration.params {
        for arg in spec.to_args() {
            cmd = cmd.arg(arg);
        }
    }
    let (mut cmd, _) = common::attach(cmd, &registration.params, &registration.opts.suppressed);

    if !registration.children.is_empty() {
        cmd = cmd.subcommand_required(!registration.opts.invoke_without_command);
        if let Some(metavar) = &registration.opts.subcommand_metavar {
            cmd = cmd.subcommand_value_name(metavar.clone());
        }
        if registration.opts.chain {
            cmd = cmd.args_conflicts_with_subcommands(false);
        }
        for child in &registration.children {
            cmd = cmd.subcommand(to_clap(child, false));
        }
    }
    if registration.opts.no_args_is_help {
        cmd = cmd.arg_required_else_help(true);
    }
    cmd
}

fn app_cache() -> &'static Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>> {
    static APPS: OnceLock<Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> = OnceLock::new();
    APPS.get_or_init(Mutex::default)
}
