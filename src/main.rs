mod commands;
mod composer;
mod config;
mod error;
mod kinds;
mod logs;
mod models;
mod params;
mod resolver;
mod runtime_api;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{ListArgs, LogsArgs};
use crate::composer::ComposeFlags;
use crate::models::Operation;
use crate::resolver::SourceFlags;

#[derive(Parser, Debug)]
#[command(name = "rt", version, about = "Serverless runtime CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Verbose logs
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Runtime API host (overrides APIHOST)
    #[arg(long, global = true)]
    apihost: Option<String>,
    /// Authorization key (overrides AUTH)
    #[arg(long, global = true)]
    auth: Option<String>,
    /// Namespace (overrides NAMESPACE)
    #[arg(long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage actions
    Action {
        #[command(subcommand)]
        cmd: ActionCmd,
    },
    /// Manage packages
    #[command(visible_alias = "pkg")]
    Package {
        #[command(subcommand)]
        cmd: PackageCmd,
    },
    /// Manage triggers
    Trigger {
        #[command(subcommand)]
        cmd: TriggerCmd,
    },
    /// Inspect activations
    Activation {
        #[command(subcommand)]
        cmd: ActivationCmd,
    },
    /// Retrieves the Logs for an Activation (shortcut for `activation logs`)
    #[command(alias = "log")]
    Logs(LogsFlags),
}

#[derive(Subcommand, Debug)]
enum ActionCmd {
    /// Creates an Action
    Create(ActionArgs),
    /// Updates an Action
    Update(ActionArgs),
}

#[derive(Args, Debug)]
struct ActionArgs {
    action_name: String,
    action_path: Option<PathBuf>,
    /// parameter values in KEY VALUE format
    #[arg(short = 'p', long = "param", num_args = 2, value_names = ["KEY", "VALUE"], action = ArgAction::Append)]
    param: Vec<String>,
    /// FILE containing parameter values in JSON format
    #[arg(short = 'P', long = "param-file")]
    param_file: Option<PathBuf>,
    /// environment values in KEY VALUE format
    #[arg(short = 'e', long = "env", num_args = 2, value_names = ["KEY", "VALUE"], action = ArgAction::Append)]
    env: Vec<String>,
    /// FILE containing environment variables in JSON format
    #[arg(short = 'E', long = "env-file")]
    env_file: Option<PathBuf>,
    /// annotation values in KEY VALUE format
    #[arg(short = 'a', long = "annotation", num_args = 2, value_names = ["KEY", "VALUE"], action = ArgAction::Append)]
    annotation: Vec<String>,
    /// FILE containing annotation values in JSON format
    #[arg(short = 'A', long = "annotation-file")]
    annotation_file: Option<PathBuf>,
    /// treat ACTION as a web action or as a raw HTTP web action
    #[arg(long, value_parser = ["true", "yes", "false", "no", "raw"], ignore_case = true)]
    web: Option<String>,
    /// secure the web action (valid values are true, false, or any string)
    #[arg(long = "web-secure")]
    web_secure: Option<String>,
    /// the timeout LIMIT in milliseconds after which the action is terminated
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,
    /// the maximum memory LIMIT in MB for the action
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    memory: Option<u64>,
    /// the maximum log size LIMIT in MB for the action
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    logsize: Option<u64>,
    /// the KIND of the action runtime (example: swift:default, nodejs:default)
    #[arg(long)]
    kind: Option<String>,
    /// treat ACTION as comma separated sequence of actions to invoke
    #[arg(long)]
    sequence: Option<String>,
    /// use provided Docker image (a path on DockerHub) to run the action
    #[arg(long)]
    docker: Option<String>,
    /// use default skeleton runtime where code artifact provides actual executable for the action
    #[arg(long)]
    native: bool,
    /// the name of the action entry point
    #[arg(long)]
    main: Option<String>,
    /// treat code artifact as binary
    #[arg(long)]
    binary: bool,
    /// output raw json
    #[arg(long)]
    json: bool,
}

impl From<ActionArgs> for ComposeFlags {
    fn from(a: ActionArgs) -> Self {
        ComposeFlags {
            source: SourceFlags {
                name: a.action_name,
                action_path: a.action_path,
                sequence: a.sequence,
                docker: a.docker,
                native: a.native,
                kind: a.kind,
                main: a.main,
                binary: a.binary,
            },
            params: a.param,
            param_file: a.param_file,
            env: a.env,
            env_file: a.env_file,
            annotations: a.annotation,
            annotation_file: a.annotation_file,
            web: a.web,
            web_secure: a.web_secure,
            timeout: a.timeout,
            memory: a.memory,
            logsize: a.logsize,
        }
    }
}

#[derive(Args, Debug)]
struct ListFlags {
    /// only return LIMIT number of entities from the collection
    #[arg(short, long)]
    limit: Option<u32>,
    /// exclude the first SKIP number of entities from the result
    #[arg(short, long)]
    skip: Option<u32>,
    /// output raw json
    #[arg(long)]
    json: bool,
    /// sort results by name
    #[arg(long = "name-sort")]
    name_sort: bool,
    /// sort results by name
    #[arg(short = 'n', long = "name")]
    name: bool,
}

impl ListFlags {
    fn into_args(self, default_limit: Option<u32>) -> ListArgs {
        ListArgs {
            limit: self.limit.or(default_limit),
            skip: self.skip,
            name_sort: self.name_sort || self.name,
            json: self.json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum PackageCmd {
    /// Lists all the Packages
    #[command(visible_alias = "ls")]
    List {
        #[arg(value_name = "NAMESPACE")]
        package_namespace: Option<String>,
        #[command(flatten)]
        flags: ListFlags,
    },
}

#[derive(Subcommand, Debug)]
enum TriggerCmd {
    /// Lists all of your triggers
    #[command(visible_alias = "ls")]
    List {
        #[command(flatten)]
        flags: ListFlags,
    },
}

#[derive(Subcommand, Debug)]
enum ActivationCmd {
    /// Retrieves the Logs for an Activation
    #[command(alias = "log")]
    Logs(LogsFlags),
}

#[derive(Args, Debug)]
struct LogsFlags {
    activation_id: Option<String>,
    /// retrieves the most recent activation logs
    #[arg(short, long)]
    last: bool,
    /// strip the timestamp and stream prefix from each log line
    #[arg(short = 'r', long)]
    strip: bool,
    /// used with --last, return the last `count` activation logs
    #[arg(short, long, default_value_t = 1)]
    count: u32,
    /// the name of the activations to filter on (this flag may only be used with --last)
    #[arg(short, long)]
    filter: Option<String>,
    /// accepts "start[:count]" to slice log lines from "start" to end or up to "count" lines
    #[arg(short, long, allow_hyphen_values = true)]
    slice: Option<String>,
    /// attempt to interpret each log line as JSON and pretty print it
    #[arg(long)]
    json: bool,
    /// silence header which is printed before the log lines
    #[arg(short, long)]
    quiet: bool,
}

impl From<LogsFlags> for LogsArgs {
    fn from(f: LogsFlags) -> Self {
        LogsArgs {
            activation_id: f.activation_id,
            last: f.last,
            count: f.count,
            filter: f.filter,
            slice: f.slice,
            strip: f.strip,
            json: f.json,
            quiet: f.quiet,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUNTIME_LOG").unwrap_or_else(|_| filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let props = config::load(&config::PropOverrides {
        apihost: cli.apihost,
        auth: cli.auth,
        namespace: cli.namespace,
    })?;

    match cli.command {
        Commands::Action { cmd } => {
            let (op, args) = match cmd {
                ActionCmd::Create(a) => (Operation::Create, a),
                ActionCmd::Update(a) => (Operation::Update, a),
            };
            let json = args.json;
            let client = runtime_api::Client::from_props(&props)?;
            commands::cmd_action_write(&client, &kinds::ExtensionKinds, &args.into(), op, json).await?
        }
        Commands::Package { cmd: PackageCmd::List { package_namespace, flags } } => {
            let client = runtime_api::Client::from_props(&props)?;
            commands::cmd_package_list(&client, package_namespace.as_deref(), &flags.into_args(None)).await?
        }
        Commands::Trigger { cmd: TriggerCmd::List { flags } } => {
            let client = runtime_api::Client::from_props(&props)?;
            let args = flags.into_args(Some(config::DEFAULT_LIST_LIMIT));
            commands::cmd_trigger_list(&client, &args).await?
        }
        Commands::Activation { cmd: ActivationCmd::Logs(flags) } | Commands::Logs(flags) => {
            let client = runtime_api::Client::from_props(&props)?;
            commands::cmd_activation_logs(&client, &flags.into()).await?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_action_create_flags() {
        let cli = Cli::try_parse_from([
            "rt", "action", "create", "hello", "hello.js",
            "-p", "a", "1", "--param", "b", "two",
            "-e", "API", "x",
            "--web", "RAW", "--web-secure", "Secret",
            "--timeout", "1000",
        ])
        .unwrap();
        let Commands::Action { cmd: ActionCmd::Create(args) } = cli.command else {
            panic!("expected action create");
        };
        let flags: ComposeFlags = args.into();
        assert_eq!(flags.source.name, "hello");
        assert_eq!(flags.source.action_path, Some(PathBuf::from("hello.js")));
        assert_eq!(flags.params, vec!["a", "1", "b", "two"]);
        assert_eq!(flags.env, vec!["API", "x"]);
        assert_eq!(flags.web.as_deref(), Some("RAW"));
        assert_eq!(flags.web_secure.as_deref(), Some("Secret"));
        assert_eq!(flags.timeout, Some(1000));
    }

    #[test]
    fn test_invalid_flag_values_rejected() {
        assert!(Cli::try_parse_from(["rt", "action", "create", "x", "--web", "maybe"]).is_err());
        assert!(Cli::try_parse_from(["rt", "action", "create", "x", "--memory", "0"]).is_err());
        assert!(Cli::try_parse_from(["rt", "action", "create", "x", "-p", "only-key"]).is_err());
    }

    #[test]
    fn test_list_flags() {
        let cli = Cli::try_parse_from(["rt", "trigger", "list", "-n", "--skip", "2"]).unwrap();
        let Commands::Trigger { cmd: TriggerCmd::List { flags } } = cli.command else {
            panic!("expected trigger list");
        };
        let args = flags.into_args(Some(config::DEFAULT_LIST_LIMIT));
        assert_eq!(args.limit, Some(30));
        assert_eq!(args.skip, Some(2));
        assert!(args.name_sort);
    }

    #[test]
    fn test_negative_slice_parses() {
        let cli = Cli::try_parse_from(["rt", "activation", "logs", "abc", "--slice", "-2:1"]).unwrap();
        let Commands::Activation { cmd: ActivationCmd::Logs(flags) } = cli.command else {
            panic!("expected activation logs");
        };
        assert_eq!(flags.slice.as_deref(), Some("-2:1"));
    }

    #[test]
    fn test_list_aliases() {
        for argv in [
            &["rt", "package", "ls"][..],
            &["rt", "pkg", "list"],
            &["rt", "pkg", "ls", "team", "--limit", "5"],
        ] {
            let cli = Cli::try_parse_from(argv.iter().copied()).unwrap();
            assert!(matches!(cli.command, Commands::Package { cmd: PackageCmd::List { .. } }), "{argv:?}");
        }
        let cli = Cli::try_parse_from(["rt", "trigger", "ls"]).unwrap();
        assert!(matches!(cli.command, Commands::Trigger { cmd: TriggerCmd::List { .. } }));
    }

    #[test]
    fn test_logs_aliases() {
        let cli = Cli::try_parse_from(["rt", "activation", "log", "abc"]).unwrap();
        let Commands::Activation { cmd: ActivationCmd::Logs(flags) } = cli.command else {
            panic!("expected activation logs");
        };
        assert_eq!(flags.activation_id.as_deref(), Some("abc"));

        for name in ["logs", "log"] {
            let cli = Cli::try_parse_from(["rt", name, "--last", "-c", "3", "-r"]).unwrap();
            let Commands::Logs(flags) = cli.command else {
                panic!("expected logs shortcut for {name}");
            };
            let args: LogsArgs = flags.into();
            assert!(args.last && args.strip);
            assert_eq!(args.count, 3);
            assert_eq!(args.activation_id, None);
        }
    }
}
