use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use stillwater_core::models::{BackgroundSyncConfigUpdate, RecordDomain, ResolutionKind};

#[derive(Parser)]
#[command(name = "stillwater")]
#[command(about = "Log meditation practice offline and sync it when a connection is available")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// User whose records are logged and synced
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// Current connection: wifi, ethernet, 5g, 4g, 3g, 2g, unknown or offline
    #[arg(long, global = true, value_name = "CLASS")]
    pub network: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a session, mood or journal entry
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// List recent records of one domain
    List {
        #[arg(value_enum)]
        domain: DomainArg,
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a sync pass now
    Sync {
        /// Cancel a running pass and start over
        #[arg(long)]
        force: bool,
        /// Resolve every conflict this way instead of by latest timestamp
        #[arg(long, value_enum, conflicts_with = "manual")]
        resolve: Option<ResolutionArg>,
        /// Queue conflicts for `stillwater resolve` instead of resolving them
        #[arg(long)]
        manual: bool,
        /// Output the pass result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show last sync, pending records and data usage
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List conflicts waiting for a decision
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a queued conflict
    Resolve {
        /// Record id of the conflict
        id: String,
        #[arg(value_enum)]
        resolution: ResolutionArg,
    },
    /// Show or change background sync settings
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Run one background sync check
    Schedule {
        /// Event that triggers the check
        #[arg(long, value_enum, default_value_t = TriggerArg::Interval)]
        trigger: TriggerArg,
    },
    /// Keep running background sync checks until interrupted
    Watch {
        /// Seconds between checks
        #[arg(long, default_value = "60", value_name = "SECONDS")]
        tick: u64,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
        /// Output file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum LogCommands {
    /// Log meditation session progress
    Session {
        /// Meditation being practiced
        meditation_id: String,
        /// Planned length
        #[arg(long, value_name = "SECONDS")]
        duration: u32,
        /// Time actually practiced
        #[arg(long, value_name = "SECONDS")]
        completed: Option<u32>,
        /// Self-rated quality, 1-5
        #[arg(long)]
        quality: Option<u8>,
        #[arg(long, default_value = "")]
        notes: String,
        /// Tag to attach (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Log a mood check-in; scores are 1-10
    Mood {
        mood: u8,
        energy: u8,
        stress: u8,
        #[arg(long, default_value = "")]
        notes: String,
        /// Tag to attach (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Write a journal entry; #hashtags in the content become tags
    Journal {
        #[arg(long)]
        title: String,
        /// Entry content
        content: Vec<String>,
        /// Mood while writing, 1-10
        #[arg(long)]
        mood: Option<u8>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current background sync settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change background sync settings
    Set(ConfigSetArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    #[arg(long)]
    pub enabled: Option<bool>,
    /// Minutes between background passes
    #[arg(long, value_name = "MINUTES")]
    pub interval: Option<u32>,
    #[arg(long)]
    pub wifi_only: Option<bool>,
    #[arg(long)]
    pub max_retries: Option<u32>,
    #[arg(long)]
    pub exponential_backoff: Option<bool>,
    #[arg(long)]
    pub on_app_start: Option<bool>,
    #[arg(long)]
    pub on_app_background: Option<bool>,
    /// Records uploaded per domain per pass
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl From<ConfigSetArgs> for BackgroundSyncConfigUpdate {
    fn from(args: ConfigSetArgs) -> Self {
        Self {
            enabled: args.enabled,
            sync_interval: args.interval,
            wifi_only: args.wifi_only,
            max_retries: args.max_retries,
            exponential_backoff: args.exponential_backoff,
            sync_on_app_start: args.on_app_start,
            sync_on_app_background: args.on_app_background,
            batch_size: args.batch_size,
            priority: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DomainArg {
    Sessions,
    Moods,
    Journals,
}

impl From<DomainArg> for RecordDomain {
    fn from(domain: DomainArg) -> Self {
        match domain {
            DomainArg::Sessions => Self::Sessions,
            DomainArg::Moods => Self::Moods,
            DomainArg::Journals => Self::Journals,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolutionArg {
    /// Keep this device's copy
    Local,
    /// Take the remote copy
    Remote,
    /// Combine both copies field by field
    Merge,
}

impl From<ResolutionArg> for ResolutionKind {
    fn from(resolution: ResolutionArg) -> Self {
        match resolution {
            ResolutionArg::Local => Self::LocalWins,
            ResolutionArg::Remote => Self::RemoteWins,
            ResolutionArg::Merge => Self::Merge,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum TriggerArg {
    /// Periodic check honoring the sync interval
    Interval,
    AppStart,
    AppBackground,
}
