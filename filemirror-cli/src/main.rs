//! filemirror: keep local copies of remote repository files up to date.
//!
//! # Usage
//!
//! ```text
//! filemirror login <token>
//! filemirror whoami
//! filemirror track <link> [--location <dir>]
//! filemirror download <link> [--location <dir>]
//! filemirror list [--json]
//! filemirror status [--json]
//! filemirror sync [<link> | --all]
//! filemirror update <link>
//! filemirror untrack [<link> | --all]
//! filemirror daemon start [--interval <secs>] | stop | status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    auth::LoginArgs,
    daemon::DaemonCommand,
    list::{ListArgs, StatusArgs},
    sync::{SyncArgs, UpdateArgs},
    track::{DownloadArgs, TrackArgs},
    untrack::UntrackArgs,
    Session,
};

#[derive(Parser, Debug)]
#[command(
    name = "filemirror",
    version,
    about = "Track files in remote repositories and keep local copies in sync",
    long_about = None,
)]
struct Cli {
    /// Access token; overrides the stored credential.
    #[arg(long, global = true, env = "FILEMIRROR_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify an access token and store it.
    Login(LoginArgs),

    /// Show the account the stored token belongs to.
    Whoami,

    /// Start tracking a file and fetch it once.
    Track(TrackArgs),

    /// Fetch a file once without tracking it.
    Download(DownloadArgs),

    /// List tracked files.
    List(ListArgs),

    /// Show whether each tracked file is stale, without fetching.
    Status(StatusArgs),

    /// Re-fetch tracked files whose upstream copy changed.
    Sync(SyncArgs),

    /// Re-fetch one tracked file unconditionally.
    Update(UpdateArgs),

    /// Stop tracking files.
    Untrack(UntrackArgs),

    /// Run or control the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let session = Session::load(cli.token)?;
    match cli.command {
        Commands::Login(args) => args.run(&session),
        Commands::Whoami => commands::auth::whoami(&session),
        Commands::Track(args) => args.run(&session),
        Commands::Download(args) => args.run(&session),
        Commands::List(args) => args.run(&session),
        Commands::Status(args) => args.run(&session),
        Commands::Sync(args) => args.run(&session),
        Commands::Update(args) => args.run(&session),
        Commands::Untrack(args) => args.run(&session),
        Commands::Daemon { command } => commands::daemon::run(command, &session),
    }
}
