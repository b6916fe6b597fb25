//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use eatadaki_types::Coordinate;
use uuid::Uuid;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Spot listing order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SpotSortKey {
    #[default]
    Name,
    Distance,
}

#[derive(Parser)]
#[command(name = "eatadaki")]
#[command(author, version, about = "Keep track of places worth eating at", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format (overrides config)
    #[arg(short, long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Directory holding the databases (overrides config)
    #[arg(long, global = true, env = "EATADAKI_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true, env = "EATADAKI_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Store(StoreCommand),

    /// Manage the CLI configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Commands that work on the local stores.
#[derive(Subcommand)]
pub enum StoreCommand {
    /// Manage saved spots
    Spot {
        #[command(subcommand)]
        action: SpotAction,
    },

    /// Log and rate experiences at spots
    Experience {
        #[command(subcommand)]
        action: ExperienceAction,
    },

    /// Show or change the signed-in user
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Per-device settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

/// Reusable spot listing arguments
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Sort key
    #[arg(short, long, value_enum, default_value = "name")]
    pub sort: SpotSortKey,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,

    /// Reference point for distance sorting as "lat,lon" (defaults to [home] in config)
    #[arg(long)]
    pub from: Option<Coordinate>,

    /// Only show spots whose name contains this text (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum SpotAction {
    /// Add a spot by hand
    Add {
        /// Display name
        name: String,

        /// Location as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        at: Coordinate,

        /// Map provider identifier
        #[arg(long)]
        map_provider_id: Option<String>,

        /// Remote service identifier
        #[arg(long)]
        remote_id: Option<String>,
    },

    /// List spots
    List {
        #[command(flatten)]
        list: ListArgs,
    },

    /// Show one spot
    Show {
        /// Spot id
        #[arg(required_unless_present = "map_provider_id")]
        id: Option<Uuid>,

        /// Look up by map provider identifier instead
        #[arg(long, conflicts_with = "id")]
        map_provider_id: Option<String>,
    },

    /// Delete a spot and everything logged at it
    Delete {
        /// Spot id
        id: Uuid,
    },

    /// List spots inside a box around a point
    Near {
        /// Center as "lat,lon" (defaults to [home] in config)
        #[arg(long, allow_hyphen_values = true)]
        at: Option<Coordinate>,

        /// Half-size of the box in degrees
        #[arg(long, default_value = "0.01")]
        span: f64,
    },

    /// Print the spot list every time it changes
    Watch {
        #[command(flatten)]
        list: ListArgs,

        /// Stop after this many updates (including the first)
        #[arg(long)]
        count: Option<usize>,
    },

    /// Search saved map results and cache the hits as spots
    Search {
        /// Text to look for
        query: String,

        /// JSON file with map search results
        #[arg(long)]
        from: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum ExperienceAction {
    /// Log an experience at a spot
    Add {
        /// Spot id
        #[arg(long)]
        spot: Uuid,

        /// Short title
        name: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Rating in half stars (1-10)
        #[arg(short, long)]
        rating: Option<i64>,

        /// Note stored with the rating
        #[arg(long, requires = "rating")]
        notes: Option<String>,
    },

    /// List experiences
    List {
        /// Sort descending by name
        #[arg(long)]
        desc: bool,
    },

    /// Show an experience with its rating history
    Show {
        /// Experience id
        id: Uuid,
    },

    /// Add a rating to an experience
    Rate {
        /// Experience id
        id: Uuid,

        /// Rating in half stars (1-10)
        rating: i64,

        /// Note stored with the rating
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete an experience and its ratings
    Delete {
        /// Experience id
        id: Uuid,
    },
}

#[derive(Debug, Subcommand)]
pub enum UserAction {
    /// Show the signed-in user
    Show,

    /// Sign in, replacing any previous user
    Login {
        /// Account email
        email: String,
    },

    /// Sign out
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Show all stored settings
    Show,

    /// Show or change the location services opt-in
    Location {
        /// New value
        #[arg(value_enum)]
        value: Option<Toggle>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the config file path
    Path,

    /// Print the effective configuration
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
