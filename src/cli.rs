//! # Command Line Interface / 命令行接口
//!
//! Builds the clap command tree and dispatches to the subcommands.
//!
//! 构建 clap 命令树并分派到各个子命令。

use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::core::hooks::HookRegistry;
use crate::infra::logging;
use crate::reporting::console;

pub mod commands;

use commands::run::RunArgs;

pub const DEFAULT_JSON_REPORT: &str = "moltest_report.json";
pub const DEFAULT_MD_REPORT: &str = "moltest_report.md";
pub const DEFAULT_JUNIT_REPORT: &str = "moltest_report.xml";

/// Process exit codes.
/// 进程退出码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoltestExit {
    Success = 0,
    TestsFailed = 1,
    /// Nothing discovered, or an explicit selection matched nothing.
    Selection = 2,
    Internal = 3,
    Dependency = 4,
    CacheUnreadable = 5,
    Interrupted = 130,
}

impl MoltestExit {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<MoltestExit> for ExitCode {
    fn from(exit: MoltestExit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Report paths must carry the extension of their format.
fn report_path(
    extension: &'static str,
) -> impl Fn(&str) -> Result<PathBuf, String> + Clone + Send + Sync + 'static {
    move |raw: &str| {
        let path = PathBuf::from(raw);
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case(extension)) {
            Ok(path)
        } else {
            Err(format!("report path must end with .{extension}"))
        }
    }
}

pub fn build_cli() -> Command {
    Command::new("moltest")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run Ansible Molecule scenarios in parallel, with caching and reports.")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("root")
                .long("root")
                .help("Project root to discover scenarios in and keep the cache at")
                .value_name("DIR")
                .default_value(".")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase output verbosity (repeatable); streams scenario output")
                .global(true)
                .action(ArgAction::Count),
        )
        .subcommand(
            Command::new("run")
                .about("Discover and run Molecule scenarios")
                .arg(
                    Arg::new("rerun-failed")
                        .short('f')
                        .long("rerun-failed")
                        .visible_alias("lf")
                        .help("Only run scenarios that failed in the previous run")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("json-report")
                        .short('j')
                        .long("json-report")
                        .help(format!("Write a JSON report [default: {DEFAULT_JSON_REPORT}]"))
                        .value_name("PATH")
                        .num_args(0..=1)
                        .require_equals(true)
                        .default_missing_value(DEFAULT_JSON_REPORT)
                        .value_parser(report_path("json"))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("md-report")
                        .short('m')
                        .long("md-report")
                        .help(format!("Write a Markdown report [default: {DEFAULT_MD_REPORT}]"))
                        .value_name("PATH")
                        .num_args(0..=1)
                        .require_equals(true)
                        .default_missing_value(DEFAULT_MD_REPORT)
                        .value_parser(report_path("md"))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("junit-xml")
                        .short('x')
                        .long("junit-xml")
                        .help(format!("Write a JUnit XML report [default: {DEFAULT_JUNIT_REPORT}]"))
                        .value_name("PATH")
                        .num_args(0..=1)
                        .require_equals(true)
                        .default_missing_value(DEFAULT_JUNIT_REPORT)
                        .value_parser(report_path("xml"))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("no-color")
                        .long("no-color")
                        .help("Disable colored output")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("scenario")
                        .short('s')
                        .long("scenario")
                        .help("Comma-separated scenario ids to run, or 'all'")
                        .value_name("IDS")
                        .default_value("all")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("expression")
                        .short('k')
                        .help("Only run ids matching the expression, e.g. 'web and not slow'")
                        .value_name("EXPR")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("skip")
                        .long("skip")
                        .help("Skip scenarios carrying this tag (repeatable)")
                        .value_name("TAG")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("xfail")
                        .long("xfail")
                        .help("Expect scenarios carrying this tag to fail (repeatable)")
                        .value_name("TAG")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("parallel")
                        .short('p')
                        .long("parallel")
                        .help("Number of scenarios to run at the same time [default: 1]")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("fail-fast")
                        .long("fail-fast")
                        .help("Stop after the first failure")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("maxfail")
                        .long("maxfail")
                        .help("Stop after N failures (0 = unlimited)")
                        .value_name("N")
                        .default_value("0")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("roles-path")
                        .short('r')
                        .long("roles-path")
                        .help("Ansible roles directory, exported as ANSIBLE_ROLES_PATH")
                        .value_name("DIR")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("skip-dependency-check")
                        .long("skip-dependency-check")
                        .help("Do not verify molecule and ansible versions before running")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("show-cache").about("Show the cached status of every scenario"))
        .subcommand(Command::new("clear-cache").about("Delete the scenario status cache"))
}

fn root_dir(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>("root")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."))
}

fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn run_args(matches: &ArgMatches) -> RunArgs {
    RunArgs {
        root: root_dir(matches),
        rerun_failed: matches.get_flag("rerun-failed"),
        json_report: matches.get_one::<PathBuf>("json-report").cloned(),
        md_report: matches.get_one::<PathBuf>("md-report").cloned(),
        junit_xml: matches.get_one::<PathBuf>("junit-xml").cloned(),
        no_color: matches.get_flag("no-color"),
        verbose: matches.get_count("verbose"),
        scenario: matches
            .get_one::<String>("scenario")
            .cloned()
            .unwrap_or_else(|| "all".to_string()),
        id_expression: matches.get_one::<String>("expression").cloned(),
        skip_tags: strings(matches, "skip"),
        xfail_tags: strings(matches, "xfail"),
        parallel: matches.get_one::<usize>("parallel").copied(),
        fail_fast: matches.get_flag("fail-fast"),
        maxfail: matches.get_one::<usize>("maxfail").copied().unwrap_or(0),
        roles_path: matches.get_one::<String>("roles-path").cloned(),
        skip_dependency_check: matches.get_flag("skip-dependency-check"),
    }
}

/// Parses the command line, runs the chosen subcommand and returns the exit code.
///
/// 解析命令行，运行所选子命令并返回退出码。
pub async fn run() -> MoltestExit {
    let matches = build_cli().get_matches();
    logging::init_logging(matches.get_count("verbose"));
    console::configure_color(false);

    let result = match matches.subcommand() {
        Some(("run", run_matches)) => {
            let hooks = HookRegistry::new();
            return commands::run::execute(run_args(run_matches), &hooks).await;
        }
        Some(("show-cache", sub)) => commands::cache::show_cache(&root_dir(sub)),
        Some(("clear-cache", sub)) => commands::cache::clear_cache(&root_dir(sub)),
        // `subcommand_required` makes clap print help and exit before this.
        _ => Ok(()),
    };

    match result {
        Ok(()) => MoltestExit::Success,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            MoltestExit::Internal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<RunArgs, clap::Error> {
        let matches = build_cli().try_get_matches_from(args)?;
        let (_, sub) = matches.subcommand().expect("subcommand");
        Ok(run_args(sub))
    }

    #[test]
    fn run_defaults() {
        let args = parse(&["moltest", "run"]).unwrap();
        assert_eq!(args.scenario, "all");
        assert_eq!(args.maxfail, 0);
        assert_eq!(args.parallel, None);
        assert!(args.json_report.is_none());
        assert_eq!(args.root, PathBuf::from("."));
    }

    #[test]
    fn report_flags_take_optional_paths() {
        let args = parse(&["moltest", "run", "--json-report", "--md-report=out/r.md", "-x"]).unwrap();
        assert_eq!(args.json_report, Some(PathBuf::from(DEFAULT_JSON_REPORT)));
        assert_eq!(args.md_report, Some(PathBuf::from("out/r.md")));
        assert_eq!(args.junit_xml, Some(PathBuf::from(DEFAULT_JUNIT_REPORT)));
        assert!(parse(&["moltest", "run", "--json-report=report.txt"]).is_err());
    }

    #[test]
    fn repeated_tags_and_aliases() {
        let args = parse(&[
            "moltest", "-vv", "run", "--lf", "--skip", "slow", "--skip", "net", "--xfail", "flaky",
            "-p", "4", "--root", "/tmp/project",
        ])
        .unwrap();
        assert!(args.rerun_failed);
        assert_eq!(args.skip_tags, vec!["slow", "net"]);
        assert_eq!(args.xfail_tags, vec!["flaky"]);
        assert_eq!(args.parallel, Some(4));
        assert_eq!(args.verbose, 2);
        assert_eq!(args.root, PathBuf::from("/tmp/project"));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(MoltestExit::Interrupted.code(), 130);
        assert_eq!(MoltestExit::CacheUnreadable.code(), 5);
    }
}
