//! Command types shared across the integration suites.
#![allow(dead_code)]

use commandeer::{
    active_depth, current_command, AppBuilder, AppOpts, BaseCommand, CommandContext,
    CommandError, CommandInstance, CommandOpts, GroupOpts, InitOpts, IoStreams, ParamKind,
    ParamSpec, Result, COMMON_OPTION_NAMES,
};
use serde_json::{json, Map, Value};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Route crate diagnostics to the test output when `RUST_LOG` asks for them.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Handle-only: no registrations, everything flows through `handle`.
#[derive(Default)]
pub struct Basic;

impl BaseCommand for Basic {
    const NAME: &'static str = "basic";

    fn define(_app: &mut AppBuilder<Self>) {}

    fn handle_params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::arg("arg1", ParamKind::Str),
            ParamSpec::arg("arg2", ParamKind::Str),
            ParamSpec::arg("arg3", ParamKind::Float).default_value(json!(0.5)),
            ParamSpec::arg("arg4", ParamKind::Int).default_value(json!(1)),
        ]
    }

    fn handle(&mut self, ctx: &CommandContext) -> Result<Option<String>> {
        Ok(Some(serde_json::to_string(ctx.params())?))
    }
}

/// Registers nothing and overrides nothing; dispatching it is a
/// configuration error.
#[derive(Default)]
pub struct NoOp;

impl BaseCommand for NoOp {
    const NAME: &'static str = "noop";

    fn define(_app: &mut AppBuilder<Self>) {}
}

/// Overrides the reported version.
#[derive(Default)]
pub struct Versioned;

impl BaseCommand for Versioned {
    const NAME: &'static str = "versioned";

    fn define(_app: &mut AppBuilder<Self>) {}

    fn handle(&mut self, _ctx: &CommandContext) -> Result<Option<String>> {
        Ok(Some("versioned ran".to_string()))
    }

    fn get_version(&self) -> String {
        "1.2.3".to_string()
    }
}

/// Declares its own `verbosity`, shadowing the injected common option.
#[derive(Default)]
pub struct CustomVerbosity;

impl BaseCommand for CustomVerbosity {
    const NAME: &'static str = "custom_verbosity";

    fn define(_app: &mut AppBuilder<Self>) {}

    fn handle_params() -> Vec<ParamSpec> {
        vec![ParamSpec::opt("verbosity", ParamKind::Int).default_value(json!(3))]
    }

    fn handle(&mut self, ctx: &CommandContext) -> Result<Option<String>> {
        Ok(Some(
            ctx.get("verbosity").cloned().unwrap_or_default().to_string(),
        ))
    }
}

/// Several independent top-level commands.
#[derive(Default)]
pub struct Multi;

fn multi_cmd1(_cmd: &mut Multi, ctx: &CommandContext) -> Result<Option<String>> {
    Ok(Some(serde_json::to_string(ctx.params())?))
}

fn multi_sum(_cmd: &mut Multi, ctx: &CommandContext) -> Result<Option<String>> {
    let total: f64 = ctx
        .get("numbers")
        .and_then(Value::as_array)
        .map(|ns| ns.iter().filter_map(Value::as_f64).sum())
        .unwrap_or(0.0);
    Ok(Some(total.to_string()))
}

fn multi_cmd3(_cmd: &mut Multi, _ctx: &CommandContext) -> Result<Option<String>> {
    Ok(Some("cmd3".to_string()))
}

impl BaseCommand for Multi {
    const NAME: &'static str = "multi";

    fn help() -> Option<&'static str> {
        Some("A command with several subcommands.")
    }

    fn define(app: &mut AppBuilder<Self>) {
        app.command(
            "cmd1",
            CommandOpts::default(),
            vec![
                ParamSpec::arg("files", ParamKind::StrList),
                ParamSpec::opt("flag1", ParamKind::Bool),
            ],
            multi_cmd1,
        );
        app.command(
            "sum",
            CommandOpts::default(),
            vec![ParamSpec::arg("numbers", ParamKind::FloatList)],
            multi_sum,
        );
        app.command(
            "cmd3",
            CommandOpts {
                help: Some("The third command.".to_string()),
                deprecated: true,
                ..CommandOpts::default()
            },
            vec![],
            multi_cmd3,
        );
    }
}

/// An initializer that stashes its parameters on the instance for the leaf
/// to pick up.
#[derive(Default)]
pub struct Callback1 {
    pub parameters: Map<String, Value>,
}

fn cb1_init(cmd: &mut Callback1, ctx: &CommandContext) -> Result<Option<String>> {
    cmd.parameters = ctx.params().clone();
    Ok(None)
}

fn cb1_cmd1(cmd: &mut Callback1, ctx: &CommandContext) -> Result<Option<String>> {
    let mut merged = cmd.parameters.clone();
    for (name, value) in ctx.params() {
        merged.insert(name.clone(), value.clone());
    }
    Ok(Some(serde_json::to_string(&merged)?))
}

impl BaseCommand for Callback1 {
    const NAME: &'static str = "callback1";

    fn define(app: &mut AppBuilder<Self>) {
        app.initialize(
            InitOpts::default(),
            vec![
                ParamSpec::opt("p1", ParamKind::Str).default_value(json!("p1_default")),
                ParamSpec::opt("flag1", ParamKind::Bool),
                ParamSpec::opt("flag2", ParamKind::Bool)
                    .default_value(json!(true))
                    .negatable(),
            ],
            cb1_init,
        );
        app.command(
            "cmd1",
            CommandOpts::default(),
            vec![
                ParamSpec::arg("arg1", ParamKind::Str),
                ParamSpec::arg("arg2", ParamKind::Str),
            ],
            cb1_cmd1,
        );
    }
}

/// Groups with a callback, a group-level option, and a namespace group.
#[derive(Default)]
pub struct Hierarchy {
    pub callback_ran: bool,
}

fn hier_echo(_cmd: &mut Hierarchy, ctx: &CommandContext) -> Result<Option<String>> {
    Ok(Some(
        ctx.get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    ))
}

fn hier_math_cb(cmd: &mut Hierarchy, _ctx: &CommandContext) -> Result<Option<String>> {
    cmd.callback_ran = true;
    Ok(None)
}

fn numbers_of(ctx: &CommandContext) -> Vec<f64> {
    ctx.get("numbers")
        .and_then(Value::as_array)
        .map(|ns| ns.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

fn hier_add(_cmd: &mut Hierarchy, ctx: &CommandContext) -> Result<Option<String>> {
    let total: f64 = numbers_of(ctx).iter().sum();
    // "precision" belongs to the enclosing group, so it arrives through the
    // merged mapping rather than this node's own view
    let precision = ctx
        .options()
        .get("precision")
        .and_then(Value::as_i64)
        .unwrap_or(2) as usize;
    Ok(Some(format!("{total:.precision$}")))
}

fn hier_multiply(_cmd: &mut Hierarchy, ctx: &CommandContext) -> Result<Option<String>> {
    let product: f64 = numbers_of(ctx).iter().product();
    let precision = ctx.get("precision").and_then(Value::as_i64).unwrap_or(4) as usize;
    Ok(Some(format!("{product:.precision$}")))
}

fn hier_ping(_cmd: &mut Hierarchy, _ctx: &CommandContext) -> Result<Option<String>> {
    Ok(Some("pong".to_string()))
}

impl BaseCommand for Hierarchy {
    const NAME: &'static str = "hierarchy";

    fn define(app: &mut AppBuilder<Self>) {
        let mut math = app.group(
            "math",
            GroupOpts {
                help: Some("Do math at the configured precision.".to_string()),
                ..GroupOpts::default()
            },
            vec![ParamSpec::opt("precision", ParamKind::Int).default_value(json!(2))],
            Some(hier_math_cb),
        );
        math.command(
            "multiply",
            CommandOpts::default(),
            vec![
                ParamSpec::arg("numbers", ParamKind::FloatList),
                ParamSpec::opt("precision", ParamKind::Int).default_value(json!(4)),
            ],
            hier_multiply,
        );
        math.command(
            "add",
            CommandOpts::default(),
            vec![ParamSpec::arg("numbers", ParamKind::FloatList)],
            hier_add,
        );
        let mut util = app.group("util", GroupOpts::default(), vec![], None);
        util.command("ping", CommandOpts::default(), vec![], hier_ping);
        app.command(
            "echo",
            CommandOpts::default(),
            vec![ParamSpec::arg("message", ParamKind::Str)],
            hier_echo,
        );
    }
}

/// A handler that fails, for error-propagation and stack-restore tests.
#[derive(Default)]
pub struct Erroring;

fn boom(_cmd: &mut Erroring, _ctx: &CommandContext) -> Result<Option<String>> {
    Err(CommandError::Usage("deliberate failure".to_string()))
}

impl BaseCommand for Erroring {
    const NAME: &'static str = "erroring";

    fn define(app: &mut AppBuilder<Self>) {
        app.command("boom", CommandOpts::default(), vec![], boom);
    }
}

/// Suppresses the entire common option set on its only command.
#[derive(Default)]
pub struct Quiet;

fn quiet_noargs(_cmd: &mut Quiet, _ctx: &CommandContext) -> Result<Option<String>> {
    Ok(Some("quiet ran".to_string()))
}

impl BaseCommand for Quiet {
    const NAME: &'static str = "quiet";

    fn define(app: &mut AppBuilder<Self>) {
        app.command(
            "noargs",
            CommandOpts {
                suppressed: COMMON_OPTION_NAMES.iter().map(|s| s.to_string()).collect(),
                ..CommandOpts::default()
            },
            vec![],
            quiet_noargs,
        );
    }
}

/// Runs a second command instance from inside its own handler.
#[derive(Default)]
pub struct Nest;

fn nest_run(_cmd: &mut Nest, _ctx: &CommandContext) -> Result<Option<String>> {
    if current_command().map(|t| t.command) != Some("nest".to_string()) {
        return Err(CommandError::Usage("wrong active command".to_string()));
    }
    let depth = active_depth();
    let mut inner = CommandInstance::<Hierarchy>::with_io(IoStreams::captured());
    let echoed = inner.execute_from_argv(&["echo", "hello"])?;
    if active_depth() != depth {
        return Err(CommandError::Usage("active stack not restored".to_string()));
    }
    Ok(echoed)
}

impl BaseCommand for Nest {
    const NAME: &'static str = "nest";

    fn define(app: &mut AppBuilder<Self>) {
        app.command("run", CommandOpts::default(), vec![], nest_run);
    }
}

/// Declares help both ways; the keyword form must win.
#[derive(Default)]
pub struct BothHelp;

impl BaseCommand for BothHelp {
    const NAME: &'static str = "bothhelp";

    fn app_opts() -> AppOpts {
        AppOpts {
            help: Some("Keyword help wins.".to_string()),
            ..AppOpts::default()
        }
    }

    fn help() -> Option<&'static str> {
        Some("Docstring help loses.")
    }

    fn define(_app: &mut AppBuilder<Self>) {}

    fn handle(&mut self, _ctx: &CommandContext) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Instance-side log the shared definition below writes into.
pub trait SeedLog {
    fn log(&mut self, entry: &str);
}

fn up_init<C: SeedLog>(cmd: &mut C, _ctx: &CommandContext) -> Result<Option<String>> {
    cmd.log("init");
    Ok(Some("upstream:init".to_string()))
}

fn up_sub1<C: SeedLog>(cmd: &mut C, _ctx: &CommandContext) -> Result<Option<String>> {
    cmd.log("sub1");
    Ok(Some("upstream:sub1".to_string()))
}

fn up_sub2<C: SeedLog>(cmd: &mut C, _ctx: &CommandContext) -> Result<Option<String>> {
    cmd.log("sub2");
    Ok(Some("upstream:sub2".to_string()))
}

fn up_grp1_cmd1<C: SeedLog>(cmd: &mut C, _ctx: &CommandContext) -> Result<Option<String>> {
    cmd.log("grp1:cmd1");
    Ok(Some("upstream:grp1:cmd1".to_string()))
}

fn up_grp1_cmd2<C: SeedLog>(cmd: &mut C, _ctx: &CommandContext) -> Result<Option<String>> {
    cmd.log("grp1:cmd2");
    Ok(Some("upstream:grp1:cmd2".to_string()))
}

/// The shared base definition: layered command types call this first and
/// then add or replace registrations.
pub fn def_upstream<C: BaseCommand + SeedLog>(app: &mut AppBuilder<C>) {
    app.initialize(InitOpts::default(), vec![], up_init::<C>);
    app.command("sub1", CommandOpts::default(), vec![], up_sub1::<C>);
    app.command("sub2", CommandOpts::default(), vec![], up_sub2::<C>);
    let mut grp = app.group("grp1", GroupOpts::default(), vec![], None);
    grp.command("cmd1", CommandOpts::default(), vec![], up_grp1_cmd1::<C>);
    grp.command("cmd2", CommandOpts::default(), vec![], up_grp1_cmd2::<C>);
}

#[derive(Default)]
pub struct Upstream {
    pub log: Vec<String>,
}

impl SeedLog for Upstream {
    fn log(&mut self, entry: &str) {
        self.log.push(entry.to_string());
    }
}

impl BaseCommand for Upstream {
    const NAME: &'static str = "upstream";

    fn help() -> Option<&'static str> {
        Some("The upstream command definition.")
    }

    fn define(app: &mut AppBuilder<Self>) {
        def_upstream(app);
    }
}

#[derive(Default)]
pub struct Downstream {
    pub log: Vec<String>,
}

impl SeedLog for Downstream {
    fn log(&mut self, entry: &str) {
        self.log.push(entry.to_string());
    }
}

fn down_sub2(cmd: &mut Downstream, _ctx: &CommandContext) -> Result<Option<String>> {
    cmd.log("sub2");
    Ok(Some("downstream:sub2".to_string()))
}

fn down_sub3(cmd: &mut Downstream, _ctx: &CommandContext) -> Result<Option<String>> {
    cmd.log("sub3");
    Ok(Some("downstream:sub3".to_string()))
}

fn down_grp1_cmd1(cmd: &mut Downstream, _ctx: &CommandContext) -> Result<Option<String>> {
    cmd.log("grp1:cmd1");
    Ok(Some("downstream:grp1:cmd1".to_string()))
}

impl BaseCommand for Downstream {
    const NAME: &'static str = "downstream";

    fn help() -> Option<&'static str> {
        Upstream::help()
    }

    fn define(app: &mut AppBuilder<Self>) {
        def_upstream(app);
        app.command("sub2", CommandOpts::default(), vec![], down_sub2);
        app.command("sub3", CommandOpts::default(), vec![], down_sub3);
        app.group_mut("grp1")
            .command("cmd1", CommandOpts::default(), vec![], down_grp1_cmd1);
    }
}
