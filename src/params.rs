//! Declarative parameter metadata.
//!
//! Every command, group, and callback declares its parameters as a list of
//! [`ParamSpec`] records. Specs are lowered onto the parser library as
//! [`clap::Arg`] definitions when the application tree is built, and read
//! back out of [`clap::ArgMatches`] as [`serde_json::Value`]s when a command
//! line is parsed. This replaces any reflective inspection of handler
//! signatures: what a handler receives is exactly what it declared.

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};
use serde::Serialize;
use serde_json::{Number, Value};
use std::path::PathBuf;

/// Value type of a declared parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Bool,
    Path,
    StrList,
    FloatList,
}

/// One declared parameter: either a positional argument or a `--long` option
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    /// Key in the merged parameter mapping; also the clap id. Long flags are
    /// derived by mapping underscores to hyphens.
    pub name: String,
    pub kind: ParamKind,
    pub positional: bool,
    pub required: bool,
    /// When set, a `--no-<name>` companion flag is generated
    pub negatable: bool,
    /// Inclusive bounds for `Int` parameters
    pub range: Option<(i64, i64)>,
    pub default: Option<Value>,
    pub help: Option<String>,
}

impl ParamSpec {
    /// A required positional argument
    pub fn arg(name: impl Into<String>, kind: ParamKind) -> Self {
        ParamSpec {
            name: name.into(),
            kind,
            positional: true,
            required: true,
            negatable: false,
            range: None,
            default: None,
            help: None,
        }
    }

    /// An optional `--long` option
    pub fn opt(name: impl Into<String>, kind: ParamKind) -> Self {
        ParamSpec {
            name: name.into(),
            kind,
            positional: false,
            required: false,
            negatable: false,
            range: None,
            default: None,
            help: None,
        }
    }

    /// Attach a default value; the parameter becomes optional
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self.required = false;
        self
    }

    /// Generate a `--no-<name>` companion that resets the flag to false
    pub fn negatable(mut self) -> Self {
        self.negatable = true;
        self
    }

    /// Inclusive value bounds, `Int` only
    pub fn ranged(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    /// Long flag name (`snake_case` name mapped to `kebab-case`)
    pub fn long(&self) -> String {
        self.name.replace('_', "-")
    }

    /// clap id of the generated negation flag
    pub fn negation_id(&self) -> String {
        format!("no_{}", self.name)
    }

    /// Lower this spec onto clap `Arg` definitions. Negatable flags produce
    /// two args; everything else produces one.
    pub fn to_args(&self) -> Vec<Arg> {
        let mut arg = Arg::new(self.name.clone());
        if !self.positional {
            arg = arg.long(self.long());
        }
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }

        arg = match self.kind {
            ParamKind::Bool => arg.action(ArgAction::SetTrue),
            ParamKind::Str => arg.action(ArgAction::Set).value_parser(clap::value_parser!(String)),
            ParamKind::Path => arg.action(ArgAction::Set).value_parser(clap::value_parser!(PathBuf)),
            ParamKind::Int => {
                let parser = match self.range {
                    Some((min, max)) => clap::value_parser!(i64).range(min..=max),
                    None => clap::value_parser!(i64),
                };
                arg.action(ArgAction::Set).value_parser(parser)
            }
            ParamKind::Float => arg.action(ArgAction::Set).value_parser(clap::value_parser!(f64)),
            ParamKind::StrList => {
                let arg = arg.value_parser(clap::value_parser!(String));
                if self.positional {
                    arg.action(ArgAction::Set).num_args(1..)
                } else {
                    arg.action(ArgAction::Append)
                }
            }
            ParamKind::FloatList => {
                let arg = arg.value_parser(clap::value_parser!(f64));
                if self.positional {
                    arg.action(ArgAction::Set).num_args(1..)
                } else {
                    arg.action(ArgAction::Append)
                }
            }
        };

        if self.kind != ParamKind::Bool {
            arg = arg.required(self.required);
            if let Some(text) = self.default.as_ref().and_then(default_text) {
                arg = arg.default_value(text);
            }
        }

        let mut args = vec![arg];
        if self.negatable && self.kind == ParamKind::Bool {
            let mut no = Arg::new(self.negation_id())
                .long(format!("no-{}", self.long()))
                .action(ArgAction::SetTrue)
                .overrides_with(self.name.clone());
            if let Some(help) = &self.help {
                no = no.help(format!("Negate: {help}"));
            }
            args.push(no);
        }
        args
    }

    /// Read this parameter back out of parsed matches.
    ///
    /// Returns the value alongside a flag saying whether it was explicitly
    /// supplied on the command line (as opposed to filled from a default).
    /// Returns `None` when the parameter is absent and has no default.
    pub fn extract(&self, matches: &ArgMatches) -> Option<(Value, bool)> {
        let explicit = matches!(
            matches.value_source(&self.name),
            Some(ValueSource::CommandLine)
        );
        match self.kind {
            ParamKind::Bool => {
                if self.negatable && matches.get_flag(&self.negation_id()) {
                    return Some((Value::Bool(false), true));
                }
                if matches.get_flag(&self.name) {
                    return Some((Value::Bool(true), true));
                }
                Some((self.default.clone().unwrap_or(Value::Bool(false)), false))
            }
            ParamKind::Str => matches
                .get_one::<String>(&self.name)
                .map(|v| (Value::String(v.clone()), explicit))
                .or_else(|| self.default_pair()),
            ParamKind::Path => matches
                .get_one::<PathBuf>(&self.name)
                .map(|v| (Value::String(v.to_string_lossy().into_owned()), explicit))
                .or_else(|| self.default_pair()),
            ParamKind::Int => matches
                .get_one::<i64>(&self.name)
                .map(|v| (Value::from(*v), explicit))
                .or_else(|| self.default_pair()),
            ParamKind::Float => matches
                .get_one::<f64>(&self.name)
                .map(|v| (float_value(*v), explicit))
                .or_else(|| self.default_pair()),
            ParamKind::StrList => matches
                .get_many::<String>(&self.name)
                .map(|vs| {
                    let list: Vec<Value> =
                        vs.map(|v| Value::String(v.clone())).collect();
                    (Value::Array(list), explicit)
                })
                .or_else(|| self.default_pair()),
            ParamKind::FloatList => matches
                .get_many::<f64>(&self.name)
                .map(|vs| {
                    let list: Vec<Value> = vs.map(|v| float_value(*v)).collect();
                    (Value::Array(list), explicit)
                })
                .or_else(|| self.default_pair()),
        }
    }

    fn default_pair(&self) -> Option<(Value, bool)> {
        self.default.clone().map(|d| (d, false))
    }
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

fn default_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(specs: &[ParamSpec], argv: &[&str]) -> ArgMatches {
        let mut cmd = clap::Command::new("t").no_binary_name(true);
        for spec in specs {
            for arg in spec.to_args() {
                cmd = cmd.arg(arg);
            }
        }
        cmd.try_get_matches_from(argv.iter().copied())
            .expect("parse failed")
    }

    #[test]
    fn positional_with_default_is_optional() {
        let specs = [
            ParamSpec::arg("arg1", ParamKind::Str),
            ParamSpec::arg("arg3", ParamKind::Float).default_value(json!(0.5)),
        ];
        let m = parse(&specs, &["hello"]);
        assert_eq!(specs[0].extract(&m), Some((json!("hello"), true)));
        assert_eq!(specs[1].extract(&m), Some((json!(0.5), false)));
    }

    #[test]
    fn negatable_flag_resolves_last_writer() {
        let spec = ParamSpec::opt("traceback", ParamKind::Bool).negatable();
        let m = parse(std::slice::from_ref(&spec), &["--traceback", "--no-traceback"]);
        assert_eq!(spec.extract(&m), Some((json!(false), true)));

        let m = parse(std::slice::from_ref(&spec), &["--traceback"]);
        assert_eq!(spec.extract(&m), Some((json!(true), true)));

        let m = parse(std::slice::from_ref(&spec), &[]);
        assert_eq!(spec.extract(&m), Some((json!(false), false)));
    }

    #[test]
    fn ranged_int_rejects_out_of_bounds() {
        let spec = ParamSpec::opt("verbosity", ParamKind::Int)
            .ranged(0, 3)
            .default_value(json!(1));
        let mut cmd = clap::Command::new("t").no_binary_name(true);
        for arg in spec.to_args() {
            cmd = cmd.arg(arg);
        }
        assert!(cmd.try_get_matches_from(["--verbosity", "9"]).is_err());
    }

    #[test]
    fn list_params_collect_all_values() {
        let spec = ParamSpec::arg("numbers", ParamKind::FloatList);
        let m = parse(std::slice::from_ref(&spec), &["1.5", "2.5"]);
        assert_eq!(spec.extract(&m), Some((json!([1.5, 2.5]), true)));
    }
}
