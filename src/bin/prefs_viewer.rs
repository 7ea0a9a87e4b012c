//! # Preference Viewer CLI
//!
//! Command-line tool for inspecting stored player preferences.
//!
//! Usage:
//!   prefs_viewer show <player_id> [--json]
//!   prefs_viewer list [--limit N]
//!   prefs_viewer stats
//!   prefs_viewer find <name>

use allocator::storage::{PreferenceRecord, PreferenceStore, SqliteStore, TeamPreferences, WeaponPreference};
use allocator::types::{AllocationType, PlayerId, Team};
use allocator::weapons::WeaponItem;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prefs_viewer")]
#[command(about = "Inspect stored round allocator player preferences", long_about = None)]
struct Cli {
    /// Path to the preference database
    #[arg(short, long, default_value = "./var/data/preferences.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one player's preferences
    Show {
        /// Player identity
        player_id: u64,

        /// Print the raw stored JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the most recently updated players
    List {
        /// Maximum number of players to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show aggregate statistics
    Stats,

    /// Look up weapons by (partial) name
    Find {
        /// Name fragment, e.g. "m4" or "weapon_awp"
        name: String,
    },
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();

    if let Commands::Find { name } = &cli.command {
        let matches = WeaponItem::find_by_name(name);
        if matches.is_empty() {
            println!("No weapon matches '{}'", name);
        }
        for item in matches {
            println!("{:<16} {}", item.name(), item.entity_name());
        }
        return Ok(());
    }

    let store = SqliteStore::open(&cli.db)?;

    match cli.command {
        Commands::Show { player_id, json } => {
            let id = PlayerId(player_id);
            match store.get_one(id)? {
                Some(record) if json => {
                    let pretty = serde_json::to_string_pretty(&record)
                        .map_err(|e| format!("Encode failed: {}", e))?;
                    println!("{}", pretty);
                }
                Some(record) => print_record_detail(&record),
                None => println!("Player {} has no stored preferences", id),
            }
        }

        Commands::List { limit } => {
            println!("Recent {} players:\n", limit);
            for (record, updated_at) in store.list_recent(limit)? {
                print_record_summary(&record, updated_at);
            }
        }

        Commands::Stats => {
            let total = store.count()?;
            let records = store.list_recent(total)?;
            let with_preferred = records
                .iter()
                .filter(|(record, _)| {
                    Team::PLAYING
                        .iter()
                        .any(|team| record.weapon_preference(*team, AllocationType::Preferred).is_some())
                })
                .count();
            let random_sniper = records
                .iter()
                .filter(|(record, _)| {
                    record.weapon_preference(Team::TeamA, AllocationType::Preferred)
                        == Some(WeaponPreference::RandomFromPool)
                })
                .count();
            let special = records.iter().filter(|(record, _)| record.special_item_enabled).count();
            let cross_team = records
                .iter()
                .filter(|(record, _)| Team::PLAYING.iter().any(|team| record.is_cross_team_enabled_for(*team)))
                .count();

            println!("Preference Statistics\n");
            println!("Database:          {}", store.path().display());
            println!("Stored Players:    {}", total);
            println!("Preferred Weapon:  {} ({} random sniper)", with_preferred, random_sniper);
            println!("Special Item On:   {}", special);
            println!("Cross-team On:     {}", cross_team);
        }

        Commands::Find { .. } => {}
    }

    Ok(())
}

fn describe(preference: Option<WeaponPreference>) -> String {
    match preference {
        Some(WeaponPreference::Fixed(item)) => item.name().to_string(),
        Some(WeaponPreference::RandomFromPool) => "Random sniper".to_string(),
        None => "-".to_string(),
    }
}

fn print_record_summary(record: &PreferenceRecord, updated_at: u64) {
    println!(
        "{} | updated {} | T: {} / {} | CT: {} / {}",
        record.user_id,
        updated_at,
        describe(record.team_a.full_buy_primary),
        describe(record.team_a.preferred),
        describe(record.team_b.full_buy_primary),
        describe(record.team_b.preferred),
    );
}

fn print_team(label: &str, prefs: &TeamPreferences) {
    println!("{}", label);
    println!("  Pistol round:  {}", describe(prefs.pistol));
    println!("  Secondary:     {}", describe(prefs.secondary));
    println!("  Half buy:      {}", describe(prefs.half_buy_primary));
    println!("  Full buy:      {}", describe(prefs.full_buy_primary));
    println!("  Preferred:     {}", describe(prefs.preferred));
}

fn print_record_detail(record: &PreferenceRecord) {
    println!("═══════════════════════════════════════════════════════════");
    println!("Player {}", record.user_id);
    println!("═══════════════════════════════════════════════════════════\n");

    print_team("Team A (T)", &record.team_a);
    println!();
    print_team("Team B (CT)", &record.team_b);
    println!();

    println!("Special item:  {}", if record.special_item_enabled { "on" } else { "off" });
    println!("Cross-team:    {:?}", record.cross_team);
}
