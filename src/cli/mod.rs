pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "SalatReminder",
    about = "Prayer time, Quran and Dhikr reminders with a notification history"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Location {
        #[command(subcommand)]
        command: LocationCommands,
    },
    /// Fetch today's prayer times for the saved location
    Refresh,
    /// Show stored prayer times and the next prayer
    Times,
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    History {
        #[arg(long, default_value_t = false)]
        favorites: bool,
    },
    /// Toggle a notification in and out of favorites
    Favorite { id: String },
    Delete {
        id: String,
        #[arg(long, default_value_t = false)]
        favorites: bool,
    },
    /// Drop every history entry that is not a favorite
    Sweep,
    /// Run one timer handler now
    Fire { timer: String },
    Ayah,
    Dhikr,
    Mosque,
    Status,
    Doctor,
    Service,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum LocationCommands {
    Set { city: String },
    Coordinates { latitude: f64, longitude: f64 },
    Show,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommands {
    Set { key: String, value: String },
    Show,
}
