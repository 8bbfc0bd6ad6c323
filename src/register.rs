//! Command registration.
//!
//! Commands, groups, and the top-level initializer are declared against an
//! [`AppBuilder`] as plain descriptor records: kind, name, options, typed
//! parameter specs, and a handler function. The builder is consumed exactly
//! once when the application is finalized, so re-running a definition can
//! never double-register. Registering a name that already exists replaces
//! the earlier registration (last-writer-wins), which is what gives layered
//! definitions their override semantics.

use serde::Serialize;

use crate::context::CommandContext;
use crate::error::Result;
use crate::params::ParamSpec;

/// Handler signature shared by commands, group callbacks, and initializers.
/// The owning instance arrives as the explicit first argument.
pub type Handler<C> = fn(&mut C, &CommandContext) -> Result<Option<String>>;

/// What a registration record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    Command,
    Group,
    Callback,
}

/// Options for a leaf command. Mirrors the parser library's command surface;
/// the mirror is verified structurally by the interface tests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandOpts {
    pub help: Option<String>,
    pub epilog: Option<String>,
    pub short_help: Option<String>,
    pub hidden: bool,
    pub deprecated: bool,
    pub no_args_is_help: bool,
    /// Common options this command has no use for
    pub suppressed: Vec<String>,
}

/// Options for a nested group. Extends the command surface with the group
/// policy fields of the parser library's sub-application surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupOpts {
    pub help: Option<String>,
    pub epilog: Option<String>,
    pub short_help: Option<String>,
    pub hidden: bool,
    pub deprecated: bool,
    pub no_args_is_help: bool,
    pub suppressed: Vec<String>,
    pub invoke_without_command: bool,
    pub subcommand_metavar: Option<String>,
    pub chain: bool,
}

/// Options for the top-level initializer. Field-for-field the group surface:
/// the initializer is the root group's callback.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InitOpts {
    pub help: Option<String>,
    pub epilog: Option<String>,
    pub short_help: Option<String>,
    pub hidden: bool,
    pub deprecated: bool,
    pub no_args_is_help: bool,
    pub suppressed: Vec<String>,
    pub invoke_without_command: bool,
    pub subcommand_metavar: Option<String>,
    pub chain: bool,
}

impl From<CommandOpts> for GroupOpts {
    fn from(opts: CommandOpts) -> Self {
        GroupOpts {
            help: opts.help,
            epilog: opts.epilog,
            short_help: opts.short_help,
            hidden: opts.hidden,
            deprecated: opts.deprecated,
            no_args_is_help: opts.no_args_is_help,
            suppressed: opts.suppressed,
            ..GroupOpts::default()
        }
    }
}

impl From<InitOpts> for GroupOpts {
    fn from(opts: InitOpts) -> Self {
        GroupOpts {
            help: opts.help,
            epilog: opts.epilog,
            short_help: opts.short_help,
            hidden: opts.hidden,
            deprecated: opts.deprecated,
            no_args_is_help: opts.no_args_is_help,
            suppressed: opts.suppressed,
            invoke_without_command: opts.invoke_without_command,
            subcommand_metavar: opts.subcommand_metavar,
            chain: opts.chain,
        }
    }
}

/// One registered command, group, or callback
pub struct Registration<C> {
    pub kind: RegistrationKind,
    /// CLI name (underscores already mapped to hyphens)
    pub name: String,
    pub opts: GroupOpts,
    pub params: Vec<ParamSpec>,
    pub handler: Option<Handler<C>>,
    pub children: Vec<Registration<C>>,
}

impl<C> Registration<C> {
    pub fn child(&self, name: &str) -> Option<&Registration<C>> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Registration table for one command type, consumed once by the app build
/// step.
pub struct AppBuilder<C> {
    pub(crate) name: String,
    pub(crate) callback: Option<Registration<C>>,
    pub(crate) registrations: Vec<Registration<C>>,
}

/// Turn a method-style name into its CLI spelling
pub fn cli_name(name: &str) -> String {
    name.replace('_', "-")
}

impl<C> AppBuilder<C> {
    pub fn new(name: impl Into<String>) -> Self {
        AppBuilder {
            name: cli_name(&name.into()),
            callback: None,
            registrations: Vec::new(),
        }
    }

    /// Register the top-level initializer: runs before any subcommand, may
    /// take parameters, and may be invoked without a subcommand when
    /// `invoke_without_command` is set.
    pub fn initialize(
        &mut self,
        opts: InitOpts,
        params: Vec<ParamSpec>,
        handler: Handler<C>,
    ) -> &mut Self {
        self.callback = Some(Registration {
            kind: RegistrationKind::Callback,
            name: self.name.clone(),
            opts: opts.into(),
            params,
            handler: Some(handler),
            children: Vec::new(),
        });
        self
    }

    /// Register a leaf command. A same-named earlier registration is
    /// replaced.
    pub fn command(
        &mut self,
        name: &str,
        opts: CommandOpts,
        params: Vec<ParamSpec>,
        handler: Handler<C>,
    ) -> &mut Self {
        upsert(
            &mut self.registrations,
            Registration {
                kind: RegistrationKind::Command,
                name: cli_name(name),
                opts: opts.into(),
                params,
                handler: Some(handler),
                children: Vec::new(),
            },
        );
        self
    }

    /// Register a nested group and return a builder for its children. The
    /// defining handler, when given, is the group's callback; a group with
    /// no handler is a pure namespace.
    pub fn group(
        &mut self,
        name: &str,
        opts: GroupOpts,
        params: Vec<ParamSpec>,
        callback: Option<Handler<C>>,
    ) -> GroupBuilder<'_, C> {
        let index = upsert(
            &mut self.registrations,
            Registration {
                kind: RegistrationKind::Group,
                name: cli_name(name),
                opts,
                params,
                handler: callback,
                children: Vec::new(),
            },
        );
        GroupBuilder {
            registration: &mut self.registrations[index],
        }
    }

    /// Reopen an already-registered group, e.g. to override one of its
    /// subcommands from a layered definition.
    ///
    /// # Panics
    ///
    /// Panics when no group with that name exists; reopening a group that
    /// was never registered is a definition mistake.
    pub fn group_mut(&mut self, name: &str) -> GroupBuilder<'_, C> {
        let cli = cli_name(name);
        let index = self
            .registrations
            .iter()
            .position(|r| r.name == cli && r.kind == RegistrationKind::Group)
            .unwrap_or_else(|| panic!("no group named \"{cli}\" has been registered"));
        GroupBuilder {
            registration: &mut self.registrations[index],
        }
    }
}

/// Builder over one group's children; supports arbitrary nesting depth
pub struct GroupBuilder<'a, C> {
    registration: &'a mut Registration<C>,
}

impl<'a, C> GroupBuilder<'a, C> {
    pub fn command(
        &mut self,
        name: &str,
        opts: CommandOpts,
        params: Vec<ParamSpec>,
        handler: Handler<C>,
    ) -> &mut Self {
        upsert(
            &mut self.registration.children,
            Registration {
                kind: RegistrationKind::Command,
                name: cli_name(name),
                opts: opts.into(),
                params,
                handler: Some(handler),
                children: Vec::new(),
            },
        );
        self
    }

    pub fn group(
        &mut self,
        name: &str,
        opts: GroupOpts,
        params: Vec<ParamSpec>,
        callback: Option<Handler<C>>,
    ) -> GroupBuilder<'_, C> {
        let index = upsert(
            &mut self.registration.children,
            Registration {
                kind: RegistrationKind::Group,
                name: cli_name(name),
                opts,
                params,
                handler: callback,
                children: Vec::new(),
            },
        );
        GroupBuilder {
            registration: &mut self.registration.children[index],
        }
    }

    /// Reopen a nested group; panics when absent, like
    /// [`AppBuilder::group_mut`].
    pub fn group_mut(&mut self, name: &str) -> GroupBuilder<'_, C> {
        let cli = cli_name(name);
        let index = self
            .registration
            .children
            .iter()
            .position(|r| r.name == cli && r.kind == RegistrationKind::Group)
            .unwrap_or_else(|| panic!("no group named \"{cli}\" has been registered"));
        GroupBuilder {
            registration: &mut self.registration.children[index],
        }
    }

    /// A group's defining handler already is its callback; redefining it is
    /// a contradiction, so this fails unconditionally.
    pub fn callback(&mut self, _handler: Handler<C>) -> ! {
        panic!(
            "the group \"{}\" already defines its callback; groups cannot redefine it",
            self.registration.name
        )
    }
}

fn upsert<C>(list: &mut Vec<Registration<C>>, registration: Registration<C>) -> usize {
    match list.iter().position(|r| r.name == registration.name) {
        Some(index) => {
            list[index] = registration;
            index
        }
        None => {
            list.push(registration);
            list.len() - 1
        }
    }
}
