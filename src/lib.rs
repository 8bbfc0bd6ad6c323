#![forbid(unsafe_code)]

//! # Commandeer
//!
//! Declarative management commands on top of [clap]'s builder API.
//!
//! A command type registers its commands, groups, and initializer once;
//! commandeer builds the parser library's command tree from those
//! registrations, injects the host's common option set at every node, and
//! adapts between the host's fixed dispatch contract (merged option
//! mappings, test-capturable streams, process-exit signaling) and clap's
//! own invocation model.
//!
//! ## Example
//!
//! ```rust,no_run
//! use commandeer::{
//!     AppBuilder, BaseCommand, CommandInstance, CommandOpts, ParamKind, ParamSpec,
//! };
//!
//! #[derive(Default)]
//! struct ClosePoll;
//!
//! impl BaseCommand for ClosePoll {
//!     const NAME: &'static str = "closepoll";
//!
//!     fn define(app: &mut AppBuilder<Self>) {
//!         app.command(
//!             "close",
//!             CommandOpts::default(),
//!             vec![ParamSpec::arg("poll_id", ParamKind::Int)],
//!             |_cmd, ctx| Ok(Some(format!("closed poll {}", ctx.get("poll_id").unwrap()))),
//!         );
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut cmd = CommandInstance::<ClosePoll>::new();
//!     let output = cmd.execute_from_argv(&["close", "42"])?;
//!     println!("{}", output.unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod command;
pub mod common;
pub mod context;
pub mod error;
pub mod params;
pub mod parser;
pub mod register;
pub mod registry;
pub mod tree;

// Re-exports
pub use app::{App, AppOpts, BaseCommand};
pub use command::{CommandInstance, DynCommand, IoStreams, OutputStream};
pub use common::{common_params, CommonOptions, COMMON_OPTION_NAMES};
pub use context::{active_depth, current_command, CommandContext, InstanceToken};
pub use error::{CommandError, Result};
pub use params::{ParamKind, ParamSpec};
pub use parser::{ParsedArgs, Parser};
pub use register::{
    cli_name, AppBuilder, CommandOpts, GroupBuilder, GroupOpts, Handler, InitOpts,
    Registration, RegistrationKind,
};
pub use registry::{BoundCommand, CommandRegistry};
pub use tree::{CommandTree, ContextNode, NodeId, NodeKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
