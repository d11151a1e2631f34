use crate::analysis::synergy::{Role, SynergyRow};
use crate::scan::ScanOutcome;
use colored::*;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct SynergyTableRow {
    #[tabled(rename = "Champion")]
    champion: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Games")]
    games: String,
    #[tabled(rename = "W/L")]
    record: String,
    #[tabled(rename = "Winrate")]
    winrate: String,
}

impl SynergyTableRow {
    fn from_row(row: &SynergyRow) -> Self {
        SynergyTableRow {
            champion: row.champion.clone(),
            role: row.role.to_string(),
            games: row.games.to_string(),
            record: format!("{}W {}L", row.wins, row.losses),
            winrate: colorize_winrate(row.winrate),
        }
    }
}

/// Original dashboard thresholds: >=55 green, <=45 red, in between yellow.
fn colorize_winrate(winrate: f64) -> String {
    let text = format!("{:.1}%", winrate);
    if winrate >= 55.0 {
        text.green().to_string()
    } else if winrate <= 45.0 {
        text.red().to_string()
    } else {
        text.yellow().to_string()
    }
}

fn print_table(rows: &[&SynergyRow]) {
    let table_rows: Vec<SynergyTableRow> =
        rows.iter().map(|r| SynergyTableRow::from_row(r)).collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{}", table);
}

/// Display-time filters, applied to derived rows only - the cache keeps
/// every counter regardless.
pub struct RowFilter {
    pub min_games: u32,
    pub role: Option<Role>,
}

impl RowFilter {
    fn keep(&self, row: &SynergyRow) -> bool {
        row.games >= self.min_games && self.role.map_or(true, |r| r == row.role)
    }
}

pub fn display_scan_summary(outcome: &ScanOutcome) {
    let losses = outcome.total_matches - outcome.total_wins;
    let winrate = if outcome.total_matches > 0 {
        outcome.total_wins as f64 / outcome.total_matches as f64 * 100.0
    } else {
        0.0
    };

    println!(
        "\n{}",
        format!("📊 SYNERGY SCAN - {}", outcome.player_key)
            .bold()
            .cyan()
    );
    println!("{}\n", "=".repeat(60).cyan());
    println!(
        "{} {} matches ({} new this run, {} skipped)",
        "📈 Analyzed:".bold(),
        outcome.total_matches,
        outcome.new_matches,
        outcome.skipped
    );
    println!(
        "{} {} W / {} L ({:.1}% WR)\n",
        "🏆 Overall:".bold(),
        outcome.total_wins.to_string().green(),
        losses.to_string().red(),
        winrate
    );
}

pub fn display_tops_and_flops(rows: &[SynergyRow], filter: &RowFilter, top_n: usize) {
    let mut kept: Vec<&SynergyRow> = rows.iter().filter(|r| filter.keep(r)).collect();
    if kept.is_empty() {
        println!(
            "{}",
            "No synergies match the current filters (try --min-games 1)".yellow()
        );
        return;
    }

    // Winrate first, shared games as the tie-breaker.
    kept.sort_by(|a, b| {
        b.winrate
            .partial_cmp(&a.winrate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.games.cmp(&a.games))
    });

    println!("{}", "🔥 Best synergies".bold().green());
    print_table(&kept[..kept.len().min(top_n)]);

    kept.sort_by(|a, b| {
        a.winrate
            .partial_cmp(&b.winrate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.games.cmp(&a.games))
    });

    println!("\n{}", "💀 Worst synergies".bold().red());
    print_table(&kept[..kept.len().min(top_n)]);
}

pub fn display_full_table(rows: &[SynergyRow], filter: &RowFilter) {
    let mut kept: Vec<&SynergyRow> = rows.iter().filter(|r| filter.keep(r)).collect();
    if kept.is_empty() {
        return;
    }
    kept.sort_by(|a, b| b.games.cmp(&a.games));

    println!("\n{}", "📂 All synergies".bold().cyan());
    print_table(&kept);
}

/// Per-champion view: each role separately, plus the merged line.
pub fn display_champion_detail(rows: &[SynergyRow], champion: &str) {
    let matching: Vec<&SynergyRow> = rows
        .iter()
        .filter(|r| r.champion.eq_ignore_ascii_case(champion))
        .collect();

    if matching.is_empty() {
        println!(
            "{}",
            format!("No games recorded with {}", champion).yellow()
        );
        return;
    }

    let games: u32 = matching.iter().map(|r| r.games).sum();
    let wins: u32 = matching.iter().map(|r| r.wins).sum();
    let winrate = crate::analysis::synergy::round_winrate(wins, games);

    println!(
        "\n{}",
        format!("🔍 {} - {} games together, {} overall",
            matching[0].champion,
            games,
            colorize_winrate(winrate)
        )
        .bold()
    );
    print_table(&matching);
}

pub fn display_error(error: &str) {
    eprintln!("{} {}", "❌ Error:".red().bold(), error);
}

pub fn display_info(message: &str) {
    println!("{} {}", "ℹ️".cyan(), message);
}

pub fn display_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}
