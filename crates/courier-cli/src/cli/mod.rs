//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "courier")]
#[command(version)]
#[command(about = "Courier marketplace client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password
        #[arg(long, env = "COURIER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out (clear the stored session)
    Logout,
    /// Show the stored session
    Status,
    /// Rotate stored tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Manage deliveries
    Deliveries {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// Manage couriers
    Couriers {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// Manage packages
    Packages {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// Manage addresses
    Addresses {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// Poll live tracking for a delivery
    Track {
        /// Delivery to follow
        #[arg(value_name = "DELIVERY_ID")]
        delivery_id: i64,
        /// Stop after this many polls (default: until Ctrl+C)
        #[arg(long)]
        ticks: Option<usize>,
        /// Seconds between polls (default: tracking.poll_interval_secs)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
    /// Plan a route between two points
    Route {
        #[arg(long, allow_hyphen_values = true)]
        from_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        from_lng: f64,
        #[arg(long, allow_hyphen_values = true)]
        to_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        to_lng: f64,
        /// Intermediate stop as LAT,LNG (repeatable)
        #[arg(long = "via", value_name = "LAT,LNG", allow_hyphen_values = true)]
        via: Vec<String>,
    },
    /// Encode or decode route geometry
    Polyline {
        #[command(subcommand)]
        command: PolylineCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum TokenCommands {
    /// Replace the stored access token
    SetAccess {
        #[arg(value_name = "TOKEN")]
        token: String,
    },
    /// Replace the stored refresh token
    SetRefresh {
        #[arg(value_name = "TOKEN")]
        token: String,
    },
    /// Exchange the stored refresh token for new tokens
    Refresh,
}

#[derive(clap::Subcommand)]
pub(crate) enum ResourceCommands {
    /// List all records
    List,
    /// Show one record
    Get {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Create a record from JSON (file path or - for stdin)
    Create {
        #[arg(long, value_name = "FILE")]
        json: String,
    },
    /// Replace a record from JSON (file path or - for stdin)
    Update {
        #[arg(value_name = "ID")]
        id: i64,
        #[arg(long, value_name = "FILE")]
        json: String,
    },
    /// Delete a record
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
    },
}

#[derive(clap::Subcommand)]
enum PolylineCommands {
    /// Decode an encoded polyline into LAT,LNG lines
    Decode {
        #[arg(value_name = "ENCODED", allow_hyphen_values = true)]
        encoded: String,
    },
    /// Encode LAT,LNG points into a polyline
    Encode {
        #[arg(value_name = "LAT,LNG", required = true, allow_hyphen_values = true)]
        points: Vec<String>,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = crate::logging::init();

    // Offline commands skip the runtime and the session store.
    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
        Commands::Polyline { command } => match command {
            PolylineCommands::Decode { encoded } => {
                commands::polyline::decode(&encoded);
                Ok(())
            }
            PolylineCommands::Encode { points } => commands::polyline::encode(&points),
        },
        command => {
            // one tokio runtime for everything
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(dispatch(command))
        }
    }
}

async fn dispatch(command: Commands) -> Result<()> {
    let ctx = commands::Context::load()?;

    match command {
        Commands::Login { email, password } => commands::auth::login(&ctx, email, password).await,
        Commands::Logout => commands::auth::logout(&ctx),
        Commands::Status => {
            commands::auth::status(&ctx);
            Ok(())
        }
        Commands::Token { command } => match command {
            TokenCommands::SetAccess { token } => commands::auth::set_access(&ctx, &token),
            TokenCommands::SetRefresh { token } => commands::auth::set_refresh(&ctx, &token),
            TokenCommands::Refresh => commands::auth::refresh(&ctx).await,
        },
        Commands::Deliveries { command } => {
            commands::resources::run::<courier_types::Delivery>(&ctx, command).await
        }
        Commands::Couriers { command } => {
            commands::resources::run::<courier_types::Courier>(&ctx, command).await
        }
        Commands::Packages { command } => {
            commands::resources::run::<courier_types::Package>(&ctx, command).await
        }
        Commands::Addresses { command } => {
            commands::resources::run::<courier_types::Address>(&ctx, command).await
        }
        Commands::Track {
            delivery_id,
            ticks,
            interval,
        } => commands::track::run(&ctx, delivery_id, ticks, interval).await,
        Commands::Route {
            from_lat,
            from_lng,
            to_lat,
            to_lng,
            via,
        } => commands::route::run(&ctx, (from_lat, from_lng), (to_lat, to_lng), &via).await,
        Commands::Config { .. } | Commands::Polyline { .. } => {
            unreachable!("offline commands are handled before the runtime starts")
        }
    }
}
