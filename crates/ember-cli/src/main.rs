#![forbid(unsafe_code)]

mod cmd;
mod identity;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use std::env;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use output::{CliError, OutputMode, render_error};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "em: incident-response lifecycle engine",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this user (id or username).
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize an ember project",
        after_help = "EXAMPLES:\n    # Create .ember/ with config and store\n    em init\n\n    # Allow bulk-data and nuke\n    em init --enable-testing"
    )]
    Init(cmd::init::InitArgs),

    #[command(next_help_heading = "Setup", about = "Manage users")]
    User {
        #[command(subcommand)]
        command: cmd::user::UserCommand,
    },

    #[command(next_help_heading = "Setup", about = "Manage channels")]
    Channel {
        #[command(subcommand)]
        command: cmd::channel::ChannelCommand,
    },

    #[command(
        next_help_heading = "Setup",
        about = "Manage playbooks",
        after_help = "EXAMPLES:\n    # Playbook with two checklists\n    em playbook create --title Outage --team ops \\\n        --checklist \"Triage=Page on-call;Open bridge\" --checklist \"Comms=Status page\""
    )]
    Playbook {
        #[command(subcommand)]
        command: cmd::playbook::PlaybookCommand,
    },

    #[command(
        next_help_heading = "Lifecycle",
        about = "Open a new incident",
        after_help = "EXAMPLES:\n    # Open an incident from a playbook\n    em create \"Database replica lag\" --team ops --playbook <id>"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Read",
        about = "List incidents",
        after_help = "EXAMPLES:\n    # In-progress incidents owned by alice\n    em list --status reported --status active --owner alice\n\n    # Search by name\n    em list -q replica --json"
    )]
    List(cmd::list::ListArgs),

    #[command(next_help_heading = "Read", about = "Show one incident")]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Post a status update",
        after_help = "EXAMPLES:\n    em status <id> active -m \"Mitigation in progress\"\n    em status <id> resolved -m \"Replica caught up\""
    )]
    Status(cmd::status::StatusArgs),

    #[command(next_help_heading = "Lifecycle", about = "Change the incident owner")]
    Owner(cmd::owner::OwnerArgs),

    #[command(
        next_help_heading = "Checklists",
        about = "Edit checklist items",
        after_help = "EXAMPLES:\n    # Toggle item 2 of checklist 0\n    em item check <id> 0 2\n\n    # Move item 3 to the top\n    em item move <id> 0 3 0"
    )]
    Item {
        #[command(subcommand)]
        command: cmd::item::ItemCommand,
    },

    #[command(next_help_heading = "Checklists", about = "Add or rename checklists")]
    Checklist {
        #[command(subcommand)]
        command: cmd::checklist::ChecklistCommand,
    },

    #[command(
        next_help_heading = "Timeline",
        about = "Read or edit the incident timeline",
        after_help = "EXAMPLES:\n    em timeline <id> --hide-task-noise\n    em timeline add <id> \"Customer report\" --at 2024-03-01T09:30:00Z"
    )]
    Timeline(cmd::timeline::TimelineArgs),

    #[command(next_help_heading = "Timeline", about = "Draft, publish or cancel the retrospective")]
    Retro {
        #[command(subcommand)]
        command: cmd::retro::RetroCommand,
    },

    #[command(next_help_heading = "Read", about = "Incident statistics")]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Testing",
        about = "Generate test incidents",
        after_help = "EXAMPLES:\n    # 10 ongoing, 5 ended, over the last 30 days\n    em bulk-data 10 5 30 --team ops"
    )]
    BulkData(cmd::bulk::BulkArgs),

    #[command(next_help_heading = "Testing", about = "Wipe all incident data")]
    Nuke(cmd::nuke::NukeArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    em completions bash\n    em completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("EMBER_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "ember=debug,info"
        } else {
            "ember=info,warn"
        })
    });

    let format = env::var("EMBER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, ctx: &cmd::Ctx) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, ctx),
        Commands::User { ref command } => cmd::user::run_user(command, ctx),
        Commands::Channel { ref command } => cmd::channel::run_channel(command, ctx),
        Commands::Playbook { ref command } => cmd::playbook::run_playbook(command, ctx),
        Commands::Create(ref args) => cmd::create::run_create(args, ctx),
        Commands::List(ref args) => cmd::list::run_list(args, ctx),
        Commands::Show(ref args) => cmd::show::run_show(args, ctx),
        Commands::Status(ref args) => cmd::status::run_status(args, ctx),
        Commands::Owner(ref args) => cmd::owner::run_owner(args, ctx),
        Commands::Item { ref command } => cmd::item::run_item(command, ctx),
        Commands::Checklist { ref command } => cmd::checklist::run_checklist(command, ctx),
        Commands::Timeline(ref args) => cmd::timeline::run_timeline(args, ctx),
        Commands::Retro { ref command } => cmd::retro::run_retro(command, ctx),
        Commands::Stats(ref args) => cmd::stats::run_stats(args, ctx),
        Commands::BulkData(ref args) => cmd::bulk::run_bulk(args, ctx),
        Commands::Nuke(ref args) => cmd::nuke::run_nuke(args, ctx),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

/// Report `err` on stderr in `mode` and pick the failure exit code.
fn fail(mode: OutputMode, err: &anyhow::Error) -> ExitCode {
    tracing::debug!(error = %format!("{err:#}"), "command failed");
    if render_error(mode, &CliError::from_anyhow(err)).is_err() {
        eprintln!("error: {err:#}");
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let fallback = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let ctx = match env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|root| cmd::Ctx::load(&root, cli.json, cli.user.clone()))
    {
        Ok(ctx) => ctx,
        Err(err) => return fail(fallback, &err),
    };

    match run(&cli, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(ctx.output, &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_before_and_after_subcommand() {
        assert!(Cli::parse_from(["em", "--json", "stats"]).json);
        assert!(Cli::parse_from(["em", "stats", "--json"]).json);
        assert!(!Cli::parse_from(["em", "stats"]).json);
    }

    #[test]
    fn user_flag_is_global() {
        let cli = Cli::parse_from(["em", "owner", "inc1", "bob", "--user", "alice"]);
        assert_eq!(cli.user.as_deref(), Some("alice"));
        assert!(matches!(cli.command, Commands::Owner(_)));
    }

    #[test]
    fn status_argument_parses_case_insensitively() {
        let cli = Cli::parse_from(["em", "status", "inc1", "ACTIVE", "-m", "go"]);
        let Commands::Status(args) = cli.command else {
            panic!("expected status");
        };
        assert_eq!(args.status, ember_core::model::Status::Active);
    }

    #[test]
    fn timeline_query_and_subcommands_parse() {
        let cli = Cli::parse_from(["em", "timeline", "inc1", "--hide-task-noise"]);
        let Commands::Timeline(args) = cli.command else {
            panic!("expected timeline");
        };
        assert!(args.command.is_none());
        assert_eq!(args.query.id.as_deref(), Some("inc1"));

        let cli = Cli::parse_from(["em", "timeline", "add", "inc1", "First report"]);
        let Commands::Timeline(args) = cli.command else {
            panic!("expected timeline");
        };
        assert!(matches!(
            args.command,
            Some(cmd::timeline::TimelineCommand::Add { .. })
        ));
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["em", "init"],
            vec!["em", "user", "add", "alice", "--team", "ops"],
            vec!["em", "channel", "add", "war-room", "--team", "ops"],
            vec!["em", "channel", "join", "c1", "alice"],
            vec!["em", "playbook", "create", "--title", "Outage", "--team", "ops"],
            vec!["em", "playbook", "list", "--team", "ops"],
            vec!["em", "playbook", "show", "p1"],
            vec!["em", "playbook", "delete", "p1"],
            vec!["em", "create", "DB down", "--team", "ops"],
            vec!["em", "list", "--status", "active", "--sort", "name"],
            vec!["em", "show", "i1"],
            vec!["em", "status", "i1", "resolved", "-m", "done"],
            vec!["em", "owner", "i1", "bob"],
            vec!["em", "item", "add", "i1", "0", "Page on-call"],
            vec!["em", "item", "remove", "i1", "0", "1"],
            vec!["em", "item", "edit", "i1", "0", "1", "--title", "x"],
            vec!["em", "item", "move", "i1", "0", "1", "0"],
            vec!["em", "item", "check", "i1", "0", "1", "--state", "in_progress"],
            vec!["em", "item", "assign", "i1", "0", "1", "bob"],
            vec!["em", "item", "run", "i1", "0", "1"],
            vec!["em", "checklist", "add", "i1", "Comms"],
            vec!["em", "checklist", "rename", "i1", "0", "Triage"],
            vec!["em", "timeline", "i1"],
            vec!["em", "timeline", "remove", "i1", "e1"],
            vec!["em", "retro", "publish", "i1", "notes"],
            vec!["em", "stats", "--team", "ops"],
            vec!["em", "bulk-data", "3", "2", "7", "--team", "ops"],
            vec!["em", "nuke", "--yes"],
            vec!["em", "completions", "bash"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn bad_enum_values_are_rejected() {
        assert!(Cli::try_parse_from(["em", "status", "i1", "closed", "-m", "x"]).is_err());
        assert!(Cli::try_parse_from(["em", "list", "--sort", "colour"]).is_err());
    }
}
