//! Command line surface
//!
//! Global options are a derived [`Args`] struct; the verb/noun tree is built
//! from the kinds so every record flag shows up under the nouns that take it.

use std::ffi::OsString;

use apppack_core::params::FieldKind;
use apppack_core::{FlagInput, FlagValues, Release, StackType};
use apppack_stacks::{Context, Verb, extra_flags, field_specs};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Args, Command, FromArgMatches};

const VERBS: [Verb; 4] = [Verb::Create, Verb::Modify, Verb::Upgrade, Verb::Destroy];

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalArgs {
    /// AWS region to operate in (defaults to the AWS configuration)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Account id the credentials are expected to belong to
    #[arg(long, global = true)]
    pub account: Option<String>,

    /// Template release, e.g. v4.6.1 (defaults to latest)
    #[arg(long, global = true)]
    pub release: Option<String>,

    /// Create a changeset to review instead of applying changes
    #[arg(long, global = true)]
    pub check: bool,

    /// Never prompt; fail when an answer is needed
    #[arg(long, global = true)]
    pub non_interactive: bool,

    /// Use AWS credentials from the environment
    #[arg(long, global = true)]
    pub aws_credentials: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn context(&self) -> Context {
        Context {
            region: self.region.clone(),
            account: self.account.clone(),
            release: Release::parse(self.release.as_deref()),
            check: self.check,
            non_interactive: self.non_interactive,
            aws_credentials: self.aws_credentials,
            verbose: self.verbose,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Apply {
        verb: Verb,
        stack_type: StackType,
        name: String,
        flags: FlagValues,
    },
    Stacks,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub globals: GlobalArgs,
    pub action: Action,
}

pub fn command() -> Command {
    let mut cmd = Command::new("apppack")
        .about("Create and maintain AppPack infrastructure")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true);
    cmd = GlobalArgs::augment_args(cmd);
    for verb in VERBS {
        cmd = cmd.subcommand(verb_command(verb));
    }
    cmd.subcommand(Command::new("stacks").about("List AppPack stacks in the region"))
}

fn verb_about(verb: Verb) -> &'static str {
    match verb {
        Verb::Create => "Create AppPack resources",
        Verb::Modify => "Change parameters of AppPack resources",
        Verb::Upgrade => "Move AppPack resources to a new template release",
        Verb::Destroy => "Delete AppPack resources",
    }
}

fn verb_command(verb: Verb) -> Command {
    let mut cmd = Command::new(verb.as_str())
        .about(verb_about(verb))
        .subcommand_required(true)
        .arg_required_else_help(true);
    for &stack_type in verb.nouns() {
        cmd = cmd.subcommand(noun_command(verb, stack_type));
    }
    cmd
}

fn takes_flags(verb: Verb) -> bool {
    matches!(verb, Verb::Create | Verb::Modify)
}

/// Every flag a kind accepts, record-bound first
fn kind_flags(stack_type: StackType) -> Vec<(&'static str, FieldKind, String)> {
    let mut flags: Vec<_> = field_specs(stack_type)
        .into_iter()
        .filter_map(|spec| {
            let binding = spec.flag?;
            Some((binding.flag, spec.kind, format!("value for {}", spec.key)))
        })
        .collect();
    flags.extend(
        extra_flags(stack_type)
            .into_iter()
            .map(|extra| (extra.flag, extra.kind, extra.help.to_string())),
    );
    flags
}

/// App-like kinds also take their name through `-a/--app-name`
fn takes_app_name(stack_type: StackType) -> bool {
    matches!(
        stack_type,
        StackType::App | StackType::Pipeline | StackType::ReviewApp
    )
}

fn name_arg(stack_type: StackType) -> Option<Arg> {
    let arg = Arg::new("name").value_name("NAME");
    match stack_type {
        StackType::Account | StackType::Region => None,
        StackType::Cluster | StackType::Database | StackType::Redis => {
            Some(arg.help("resource name (defaults to apppack)"))
        }
        StackType::CustomDomain => Some(arg.required(true).help("primary domain")),
        StackType::ReviewApp => Some(arg.help("pipeline:pr-number")),
        StackType::App | StackType::Pipeline => Some(arg.help("resource name")),
    }
}

fn app_name_arg() -> Arg {
    Arg::new("app-name")
        .short('a')
        .long("app-name")
        .value_name("NAME")
        .help("resource name, instead of the positional NAME")
        .action(ArgAction::Set)
}

fn flag_arg(flag: &'static str, kind: FieldKind, help: String) -> Arg {
    let arg = Arg::new(flag).long(flag).help(help);
    match kind {
        // `--flag` alone means true; `--flag=false` turns a setting off
        FieldKind::Bool => arg
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(clap::value_parser!(bool))
            .action(ArgAction::Set),
        FieldKind::List => arg.value_name("A,B,...").action(ArgAction::Set),
        FieldKind::Int => arg.value_name("N").action(ArgAction::Set),
        FieldKind::String => arg.value_name("VALUE").action(ArgAction::Set),
    }
}

fn noun_command(verb: Verb, stack_type: StackType) -> Command {
    let mut cmd = Command::new(stack_type.as_str())
        .about(format!("{} an AppPack {}", verb, stack_type));
    if let Some(arg) = name_arg(stack_type) {
        cmd = cmd.arg(arg);
    }
    if takes_app_name(stack_type) {
        cmd = cmd.arg(app_name_arg()).group(
            ArgGroup::new("target")
                .args(["name", "app-name"])
                .required(true),
        );
    }
    if takes_flags(verb) {
        for (flag, kind, help) in kind_flags(stack_type) {
            cmd = cmd.arg(flag_arg(flag, kind, help));
        }
    }
    cmd
}

/// Flags the user actually passed; absent flags stay unbound
fn collect_flags(stack_type: StackType, matches: &ArgMatches) -> FlagValues {
    let mut flags = FlagValues::new();
    for (flag, kind, _) in kind_flags(stack_type) {
        match kind {
            FieldKind::Bool => {
                if let Ok(Some(value)) = matches.try_get_one::<bool>(flag) {
                    flags.insert(flag, FlagInput::Bool(*value));
                }
            }
            _ => {
                if let Ok(Some(value)) = matches.try_get_one::<String>(flag) {
                    flags.insert(flag, FlagInput::Str(value.clone()));
                }
            }
        }
    }
    flags
}

fn verb_named(name: &str) -> Option<Verb> {
    VERBS.into_iter().find(|verb| verb.as_str() == name)
}

pub fn parse() -> Result<Invocation, clap::Error> {
    parse_from(std::env::args_os())
}

pub fn parse_from<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut cmd = command();
    let matches = cmd.try_get_matches_from_mut(args)?;
    let unknown = |cmd: &mut Command, what: &str| {
        cmd.error(
            clap::error::ErrorKind::InvalidSubcommand,
            format!("unknown command {}", what),
        )
    };

    match matches.subcommand() {
        Some(("stacks", leaf)) => Ok(Invocation {
            globals: GlobalArgs::from_arg_matches(leaf)?,
            action: Action::Stacks,
        }),
        Some((verb_name, verb_matches)) => {
            let Some(verb) = verb_named(verb_name) else {
                return Err(unknown(&mut cmd, verb_name));
            };
            let Some((noun, leaf)) = verb_matches.subcommand() else {
                return Err(unknown(&mut cmd, verb_name));
            };
            let Ok(stack_type) = noun.parse::<StackType>() else {
                return Err(unknown(&mut cmd, noun));
            };
            let name = ["name", "app-name"]
                .into_iter()
                .find_map(|id| leaf.try_get_one::<String>(id).ok().flatten())
                .cloned()
                .unwrap_or_default();
            let flags = if takes_flags(verb) {
                collect_flags(stack_type, leaf)
            } else {
                FlagValues::new()
            };
            Ok(Invocation {
                globals: GlobalArgs::from_arg_matches(leaf)?,
                action: Action::Apply {
                    verb,
                    stack_type,
                    name,
                    flags,
                },
            })
        }
        None => Err(cmd.error(
            clap::error::ErrorKind::MissingSubcommand,
            "a command is required",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(args: &[&str]) -> (GlobalArgs, Verb, StackType, String, FlagValues) {
        let invocation = parse_from(args).unwrap();
        match invocation.action {
            Action::Apply {
                verb,
                stack_type,
                name,
                flags,
            } => (invocation.globals, verb, stack_type, name, flags),
            Action::Stacks => panic!("expected a verb"),
        }
    }

    #[test]
    fn test_command_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn test_create_app_collects_only_given_flags() {
        let (_, verb, stack_type, name, flags) = apply(&[
            "apppack",
            "create",
            "app",
            "web",
            "--cluster",
            "prod",
            "--addon-sqs",
            "--domains",
            "a.example.com,b.example.com",
        ]);
        assert_eq!(verb, Verb::Create);
        assert_eq!(stack_type, StackType::App);
        assert_eq!(name, "web");
        assert_eq!(flags.get_str("cluster"), Some("prod"));
        assert_eq!(flags.get_bool("addon-sqs"), Some(true));
        assert_eq!(flags.get_str("domains"), Some("a.example.com,b.example.com"));
        assert!(!flags.contains("branch"));
        assert!(!flags.contains("addon-private-s3"));
    }

    #[test]
    fn test_bool_flag_accepts_explicit_false() {
        let (_, _, _, _, flags) = apply(&[
            "apppack",
            "modify",
            "app",
            "web",
            "--addon-private-s3=false",
        ]);
        assert_eq!(flags.get_bool("addon-private-s3"), Some(false));
    }

    #[test]
    fn test_globals_after_noun() {
        let (globals, _, stack_type, name, _) = apply(&[
            "apppack",
            "upgrade",
            "cluster",
            "--region",
            "eu-west-1",
            "--check",
            "--non-interactive",
        ]);
        assert_eq!(stack_type, StackType::Cluster);
        assert_eq!(name, "");
        let context = globals.context();
        assert_eq!(context.region.as_deref(), Some("eu-west-1"));
        assert!(context.check);
        assert!(context.non_interactive);
        assert_eq!(context.release, Release::Latest);
    }

    #[test]
    fn test_globals_before_verb() {
        let (globals, verb, _, _, _) = apply(&[
            "apppack",
            "--release",
            "v4.6.1",
            "-v",
            "destroy",
            "redis",
            "cache",
        ]);
        assert_eq!(verb, Verb::Destroy);
        assert!(globals.verbose);
        assert_eq!(
            globals.context().release,
            Release::Version("v4.6.1".to_string())
        );
    }

    #[test]
    fn test_upgrade_rejects_record_flags() {
        let result = parse_from(["apppack", "upgrade", "app", "web", "--branch", "main"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_modify_has_no_account_noun() {
        assert!(parse_from(["apppack", "modify", "account"]).is_err());
        assert!(parse_from(["apppack", "create", "account"]).is_ok());
    }

    #[test]
    fn test_upgrade_account_and_region() {
        let (_, verb, stack_type, _, _) = apply(&["apppack", "upgrade", "account"]);
        assert_eq!((verb, stack_type), (Verb::Upgrade, StackType::Account));
        let (_, _, stack_type, _, _) = apply(&["apppack", "upgrade", "region"]);
        assert_eq!(stack_type, StackType::Region);
        assert!(parse_from(["apppack", "upgrade", "review-app", "web:1"]).is_err());
    }

    #[test]
    fn test_app_requires_name() {
        assert!(parse_from(["apppack", "create", "app"]).is_err());
        assert!(parse_from(["apppack", "create", "app", "web", "-a", "api"]).is_err());
    }

    #[test]
    fn test_app_name_option() {
        let (globals, verb, stack_type, name, _) =
            apply(&["apppack", "modify", "app", "-a", "myapp", "--check"]);
        assert_eq!(verb, Verb::Modify);
        assert_eq!(stack_type, StackType::App);
        assert_eq!(name, "myapp");
        assert!(globals.check);

        let (_, _, _, name, flags) = apply(&[
            "apppack",
            "create",
            "pipeline",
            "--app-name",
            "web",
            "--cluster=apppack",
        ]);
        assert_eq!(name, "web");
        assert_eq!(flags.get_str("cluster"), Some("apppack"));
    }

    #[test]
    fn test_upgrade_app_name_option() {
        let (_, verb, _, name, flags) = apply(&["apppack", "upgrade", "app", "-a", "myapp"]);
        assert_eq!(verb, Verb::Upgrade);
        assert_eq!(name, "myapp");
        assert!(flags.is_empty());
    }

    #[test]
    fn test_database_extra_flags() {
        let (_, _, stack_type, name, flags) = apply(&[
            "apppack",
            "create",
            "database",
            "--engine",
            "postgres",
            "--aurora",
        ]);
        assert_eq!(stack_type, StackType::Database);
        assert_eq!(name, "");
        assert_eq!(flags.get_str("engine"), Some("postgres"));
        assert_eq!(flags.get_bool("aurora"), Some(true));
    }

    #[test]
    fn test_stacks_listing() {
        let invocation = parse_from(["apppack", "stacks", "--region", "us-east-2"]).unwrap();
        assert_eq!(invocation.action, Action::Stacks);
        assert_eq!(invocation.globals.region.as_deref(), Some("us-east-2"));
    }
}
