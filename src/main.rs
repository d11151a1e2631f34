mod analysis;
mod api;
mod config;
mod display;
mod error;
mod scan;
mod store;

use analysis::synergy::Role;
use api::client::RiotApiClient;
use clap::Parser;
use config::Config;
use display::output::{
    display_champion_detail, display_error, display_full_table, display_info,
    display_scan_summary, display_success, display_tops_and_flops, RowFilter,
};
use error::AppError;
use scan::{run_scan, split_riot_id, ScanOptions};
use store::CacheStore;

#[derive(Parser, Debug)]
#[command(name = "Synergy Scan")]
#[command(about = "Aggregate ally synergy winrates from your ranked history", long_about = None)]
struct Args {
    /// Riot ID in Name#TAG form
    riot_id: String,

    /// Re-scan the full history instead of syncing since the last match
    #[arg(long)]
    full: bool,

    /// Compute but do not persist the updated cache
    #[arg(long)]
    no_save: bool,

    /// Minimum shared games for a synergy to be shown
    #[arg(long, default_value = "2")]
    min_games: u32,

    /// Only show one role (TOP, JUNGLE, MIDDLE, BOTTOM, SUPPORT)
    #[arg(long)]
    role: Option<String>,

    /// Rows in the best/worst tables
    #[arg(long, default_value = "10")]
    top: usize,

    /// Show detailed stats for one champion
    #[arg(long)]
    champion: Option<String>,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        display_error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), AppError> {
    let config = Config::from_env()?;

    // Fail on bad input before any network traffic.
    split_riot_id(&args.riot_id)?;

    let role_filter = match &args.role {
        Some(tag) => {
            let role = Role::from_api(tag);
            if role == Role::Unknown {
                return Err(AppError::ConfigError(format!(
                    "Unknown role '{}' (use TOP, JUNGLE, MIDDLE, BOTTOM or SUPPORT)",
                    tag
                )));
            }
            Some(role)
        }
        None => None,
    };

    let client = RiotApiClient::new(&config);
    let store = CacheStore::from_config(&config);

    display_info(&format!(
        "Scanning ranked history for {} (cache: {})",
        args.riot_id,
        store.describe()
    ));

    let opts = ScanOptions {
        full: args.full,
        persist: !args.no_save,
    };
    let outcome = run_scan(&client, &store, &args.riot_id, &opts)?;

    if outcome.new_matches > 0 {
        display_success(&format!(
            "Folded {} new matches into the cache",
            outcome.new_matches
        ));
    } else {
        display_success("Cache is up-to-date (no new matches)");
    }

    display_scan_summary(&outcome);

    if let Some(champion) = &args.champion {
        display_champion_detail(&outcome.rows, champion);
        return Ok(());
    }

    let filter = RowFilter {
        min_games: args.min_games,
        role: role_filter,
    };
    display_tops_and_flops(&outcome.rows, &filter, args.top);
    display_full_table(&outcome.rows, &filter);

    Ok(())
}
