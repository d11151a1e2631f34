use chrono::Utc;
use indicatif::ProgressBar;

use crate::analysis::synergy::{MatchRecord, SynergyRow};
use crate::api::client::{RiotApiClient, Sleeper, Transport};
use crate::error::AppError;
use crate::store::CacheStore;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Ignore the incremental sentinel and re-list the whole history.
    pub full: bool,
    pub persist: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            full: false,
            persist: true,
        }
    }
}

/// Everything one scan produced. Callers keep this across re-renders
/// instead of any ambient session state.
#[derive(Debug)]
pub struct ScanOutcome {
    pub player_key: String,
    pub rows: Vec<SynergyRow>,
    pub new_matches: usize,
    pub skipped: usize,
    pub total_matches: usize,
    pub total_wins: usize,
}

/// Rejects malformed ids before anything touches the network.
pub fn split_riot_id(riot_id: &str) -> Result<(&str, &str), AppError> {
    match riot_id.split_once('#') {
        Some((name, tag)) if !name.is_empty() && !tag.is_empty() => Ok((name, tag)),
        _ => Err(AppError::InvalidRiotId),
    }
}

/// One scan invocation: resolve player, diff the remote history against the
/// cache, fetch and fold the new matches one at a time, persist, report.
/// Fatal errors (403, player not found, empty history) abort with nothing
/// written; per-match failures are skipped.
pub fn run_scan<T: Transport, S: Sleeper>(
    client: &RiotApiClient<T, S>,
    store: &CacheStore,
    riot_id: &str,
    opts: &ScanOptions,
) -> Result<ScanOutcome, AppError> {
    let (name, tag) = split_riot_id(riot_id)?;
    let player_key = format!("{}#{}", name, tag).to_lowercase();

    let account = client
        .get_account(name, tag)?
        .ok_or_else(|| AppError::PlayerNotFound(riot_id.to_string()))?;

    let mut entry = store.load(&player_key);

    let newest_seen;
    let listed = match entry.last_match_id.clone().filter(|_| !opts.full) {
        Some(last) => {
            // Oldest-first already; the newest id lands at the end.
            let ids = client.list_new_match_ids(&account.puuid, &last)?;
            newest_seen = ids.last().cloned();
            ids
        }
        None => {
            let all = client.list_match_ids(&account.puuid)?;
            if all.is_empty() && entry.matches.is_empty() {
                return Err(AppError::NoRankedGames);
            }
            newest_seen = all.first().cloned();
            let mut chronological = all;
            chronological.reverse();
            chronological
        }
    };

    // A vanished sentinel degrades the incremental listing to a full
    // re-scan, so both branches must drop ids that are already cached -
    // folding a record twice would corrupt the counters.
    let new_ids: Vec<String> = listed
        .into_iter()
        .filter(|id| !entry.matches.contains_key(id))
        .collect();

    let pb = ProgressBar::new(new_ids.len() as u64);
    pb.set_message("Fetching match details");
    let mut skipped = 0;
    for id in &new_ids {
        let fetched = client.get_match(id)?;
        pb.inc(1);
        let Some(detail) = fetched else {
            skipped += 1;
            continue;
        };
        match MatchRecord::from_match(&detail, &account.puuid) {
            Some(record) => {
                entry.stats.fold_record(&record);
                entry.matches.insert(detail.metadata.match_id.clone(), record);
            }
            None => skipped += 1,
        }
    }
    pb.finish_and_clear();

    // Advance the high-water mark to the newest listed id, whether or not
    // its detail fetch succeeded: failed matches are dropped, not retried.
    if let Some(newest) = newest_seen {
        entry.last_match_id = Some(newest);
    }
    entry.last_updated = Some(Utc::now());

    if opts.persist && !new_ids.is_empty() {
        store.save(&player_key, &entry)?;
    }

    let total_wins = entry.matches.values().filter(|m| m.win).count();
    Ok(ScanOutcome {
        player_key,
        rows: entry.stats.rows(),
        new_matches: new_ids.len() - skipped,
        skipped,
        total_matches: entry.matches.len(),
        total_wins,
    })
}
