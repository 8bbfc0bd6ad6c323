//! The common option set.
//!
//! Every generated command and group carries a fixed bundle of host-level
//! options (verbosity, settings path, traceback, color control, skip-checks,
//! version) so the host's execution engine can rely on them being present no
//! matter how a command was declared. The bundle is an explicit parameter
//! group merged into each node at build time; a node escapes an option only
//! by declaring a same-named parameter of its own (the declaration wins) or
//! by listing the name in its suppression list.

use std::path::PathBuf;

use clap::Command;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CommandError, Result};
use crate::params::{ParamKind, ParamSpec};

/// Mapping keys of the common option set, in canonical order
pub const COMMON_OPTION_NAMES: &[&str] = &[
    "version",
    "verbosity",
    "settings",
    "pythonpath",
    "traceback",
    "no_color",
    "force_color",
    "skip_checks",
];

/// Canonical parameter specs for the common option set
pub fn common_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec::opt("version", ParamKind::Bool)
            .help("Show the command's version and exit."),
        ParamSpec::opt("verbosity", ParamKind::Int)
            .ranged(0, 3)
            .default_value(Value::from(1))
            .help("Verbosity level; 0=minimal output, 1=normal output, 2=verbose output, 3=very verbose output."),
        ParamSpec::opt("settings", ParamKind::Str)
            .default_value(Value::String(String::new()))
            .help("The path to a settings module. If this isn't provided, the host's default settings discovery is used."),
        ParamSpec::opt("pythonpath", ParamKind::Path)
            .help("A directory to add to the module search path."),
        ParamSpec::opt("traceback", ParamKind::Bool)
            .negatable()
            .help("Raise on command errors instead of printing a short message."),
        ParamSpec::opt("no_color", ParamKind::Bool)
            .help("Don't colorize the command output."),
        ParamSpec::opt("force_color", ParamKind::Bool)
            .help("Force colorization of the command output."),
        ParamSpec::opt("skip_checks", ParamKind::Bool)
            .help("Skip system checks."),
    ]
}

/// The common options a node actually receives: everything the node did not
/// declare itself and did not suppress
pub fn injected_for(declared: &[ParamSpec], suppressed: &[String]) -> Vec<ParamSpec> {
    common_params()
        .into_iter()
        .filter(|spec| {
            !declared.iter().any(|d| d.name == spec.name)
                && !suppressed.iter().any(|s| s == &spec.name)
        })
        .collect()
}

/// Inject the common options into `cmd`, skipping names the node already
/// declares and names on its suppression list. Returns the command plus the
/// specs that were actually injected (needed later for extraction).
pub fn attach(
    mut cmd: Command,
    declared: &[ParamSpec],
    suppressed: &[String],
) -> (Command, Vec<ParamSpec>) {
    let injected = injected_for(declared, suppressed);
    let both_colors = injected.iter().any(|s| s.name == "no_color")
        && injected.iter().any(|s| s.name == "force_color");
    for spec in &injected {
        for mut arg in spec.to_args() {
            if both_colors && spec.name == "force_color" {
                arg = arg.conflicts_with("no_color");
            }
            cmd = cmd.arg(arg);
        }
    }
    (cmd, injected)
}

/// Typed view of the common option set after parsing
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommonOptions {
    pub version: bool,
    pub verbosity: u8,
    pub settings: String,
    pub pythonpath: Option<PathBuf>,
    pub traceback: bool,
    pub no_color: bool,
    pub force_color: bool,
    pub skip_checks: bool,
}

impl Default for CommonOptions {
    fn default() -> Self {
        CommonOptions {
            version: false,
            verbosity: 1,
            settings: String::new(),
            pythonpath: None,
            traceback: false,
            no_color: false,
            force_color: false,
            skip_checks: false,
        }
    }
}

impl CommonOptions {
    /// The defaults as a mapping, used to seed every merged parameter
    /// mapping so the host always sees the full option set.
    pub fn defaults_map() -> Map<String, Value> {
        match serde_json::to_value(CommonOptions::default()) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Read the common options back out of a merged parameter mapping,
    /// falling back to defaults for absent keys.
    ///
    /// Fails with a usage error when both color flags are set; this runs
    /// before any command logic on every entry point.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let defaults = CommonOptions::default();
        let get_bool = |name: &str, fallback: bool| {
            map.get(name).and_then(Value::as_bool).unwrap_or(fallback)
        };
        let options = CommonOptions {
            version: get_bool("version", defaults.version),
            verbosity: map
                .get("verbosity")
                .and_then(Value::as_u64)
                .map(|v| v.min(3) as u8)
                .unwrap_or(defaults.verbosity),
            settings: map
                .get("settings")
                .and_then(Value::as_str)
                .unwrap_or(&defaults.settings)
                .to_string(),
            pythonpath: map
                .get("pythonpath")
                .and_then(Value::as_str)
                .map(PathBuf::from),
            traceback: get_bool("traceback", defaults.traceback),
            no_color: get_bool("no_color", defaults.no_color),
            force_color: get_bool("force_color", defaults.force_color),
            skip_checks: get_bool("skip_checks", defaults.skip_checks),
        };
        options.validate()?;
        Ok(options)
    }

    /// Reject the mutually exclusive color flags
    pub fn validate(&self) -> Result<()> {
        if self.no_color && self.force_color {
            return Err(CommandError::Usage(
                "The --no-color and --force-color options can't be used together.".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the color flags to the terminal layer
    pub fn apply_colors(&self) {
        if self.no_color {
            console::set_colors_enabled(false);
        } else if self.force_color {
            console::set_colors_enabled(true);
        }
    }
}
