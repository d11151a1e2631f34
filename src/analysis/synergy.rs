use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::api::models::MatchDto;

/// Team position, normalized. The API reports the support slot as UTILITY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Top,
    Jungle,
    Middle,
    Bottom,
    Support,
    Unknown,
}

impl Role {
    pub fn from_api(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "TOP" => Role::Top,
            "JUNGLE" => Role::Jungle,
            "MIDDLE" => Role::Middle,
            "BOTTOM" => Role::Bottom,
            "UTILITY" | "SUPPORT" => Role::Support,
            _ => Role::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Top => "TOP",
            Role::Jungle => "JUNGLE",
            Role::Middle => "MIDDLE",
            Role::Bottom => "BOTTOM",
            Role::Support => "SUPPORT",
            Role::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One teammate in one match. Lives only inside a MatchRecord.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllyEntry {
    pub champion: String,
    pub role: Role,
}

/// Outcome of one match from the tracked player's side. Written once when
/// the detail is first fetched, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub win: bool,
    pub allies: Vec<AllyEntry>,
}

impl MatchRecord {
    /// The one place raw match JSON becomes typed data. Returns None when
    /// the tracked player is missing from the participant list, which the
    /// caller treats as a skipped match.
    pub fn from_match(detail: &MatchDto, puuid: &str) -> Option<MatchRecord> {
        let me = detail.info.participants.iter().find(|p| p.puuid == puuid)?;
        let allies = detail
            .info
            .participants
            .iter()
            .filter(|p| p.team_id == me.team_id && p.puuid != puuid)
            .map(|p| AllyEntry {
                champion: p.champion_name.clone(),
                role: Role::from_api(&p.team_position),
            })
            .collect();
        Some(MatchRecord {
            win: me.win,
            allies,
        })
    }
}

/// Running win/loss tally for one (champion, role) ally. Only ever created
/// on its first increment, so games is always >= 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynergyCounter {
    pub champion: String,
    pub role: Role,
    pub games: u32,
    pub wins: u32,
}

/// Counters keyed by "Champion_ROLE", the cache document's key format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SynergyStats {
    counters: BTreeMap<String, SynergyCounter>,
}

impl SynergyStats {
    pub fn fold_record(&mut self, record: &MatchRecord) {
        for ally in &record.allies {
            let key = format!("{}_{}", ally.champion, ally.role);
            let counter = self.counters.entry(key).or_insert_with(|| SynergyCounter {
                champion: ally.champion.clone(),
                role: ally.role,
                games: 0,
                wins: 0,
            });
            counter.games += 1;
            if record.win {
                counter.wins += 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Derive the presentation table. Recomputed on every call, never stored.
    pub fn rows(&self) -> Vec<SynergyRow> {
        self.counters.values().map(SynergyRow::from_counter).collect()
    }
}

/// Presentation-facing view of one counter.
#[derive(Debug, Clone)]
pub struct SynergyRow {
    pub champion: String,
    pub role: Role,
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub winrate: f64,
}

impl SynergyRow {
    fn from_counter(counter: &SynergyCounter) -> Self {
        SynergyRow {
            champion: counter.champion.clone(),
            role: counter.role,
            games: counter.games,
            wins: counter.wins,
            losses: counter.games - counter.wins,
            winrate: round_winrate(counter.wins, counter.games),
        }
    }
}

/// 100 * wins / games, to one decimal place.
pub(crate) fn round_winrate(wins: u32, games: u32) -> f64 {
    (wins as f64 / games as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::MatchDto;
    use serde_json::json;

    fn participant(puuid: &str, team: i32, champ: &str, position: &str, win: bool) -> serde_json::Value {
        json!({
            "puuid": puuid,
            "championName": champ,
            "teamId": team,
            "win": win,
            "teamPosition": position,
        })
    }

    fn full_match(me_wins: bool) -> MatchDto {
        let mut participants = vec![participant("me", 100, "Jinx", "BOTTOM", me_wins)];
        for (i, pos) in ["TOP", "JUNGLE", "MIDDLE", "UTILITY"].iter().enumerate() {
            participants.push(participant(&format!("ally{i}"), 100, "Ally", pos, me_wins));
        }
        for i in 0..5 {
            participants.push(participant(&format!("enemy{i}"), 200, "Enemy", "TOP", !me_wins));
        }
        serde_json::from_value(json!({
            "metadata": { "matchId": "EUW1_1" },
            "info": { "participants": participants },
        }))
        .unwrap()
    }

    #[test]
    fn utility_normalizes_to_support() {
        assert_eq!(Role::from_api("UTILITY"), Role::Support);
        assert_eq!(Role::from_api("SUPPORT"), Role::Support);
        assert_eq!(Role::from_api("BOTTOM"), Role::Bottom);
        assert_eq!(Role::from_api(""), Role::Unknown);
        assert_eq!(Role::from_api("Invalid"), Role::Unknown);
    }

    #[test]
    fn ten_participants_yield_four_allies() {
        let record = MatchRecord::from_match(&full_match(true), "me").unwrap();
        assert_eq!(record.allies.len(), 4);
        assert!(record.win);
        assert!(record
            .allies
            .iter()
            .any(|a| a.role == Role::Support));
        assert!(record.allies.iter().all(|a| a.champion == "Ally"));
    }

    #[test]
    fn missing_self_skips_the_match() {
        assert!(MatchRecord::from_match(&full_match(true), "stale-puuid").is_none());
    }

    #[test]
    fn counters_track_wins_against_own_outcome() {
        let mut stats = SynergyStats::default();
        stats.fold_record(&MatchRecord::from_match(&full_match(true), "me").unwrap());
        stats.fold_record(&MatchRecord::from_match(&full_match(false), "me").unwrap());
        stats.fold_record(&MatchRecord::from_match(&full_match(false), "me").unwrap());

        for row in stats.rows() {
            assert_eq!(row.games, 3);
            assert_eq!(row.wins, 1);
            assert_eq!(row.losses, row.games - row.wins);
            assert_eq!(row.winrate, 33.3);
        }
    }

    #[test]
    fn winrate_rounds_to_one_decimal() {
        assert_eq!(round_winrate(1, 3), 33.3);
        assert_eq!(round_winrate(2, 3), 66.7);
        assert_eq!(round_winrate(1, 1), 100.0);
        assert_eq!(round_winrate(0, 7), 0.0);
        assert_eq!(round_winrate(1, 8), 12.5);
    }

    #[test]
    fn rows_bound_winrate_between_0_and_100() {
        let mut stats = SynergyStats::default();
        for _ in 0..5 {
            stats.fold_record(&MatchRecord::from_match(&full_match(true), "me").unwrap());
        }
        for row in stats.rows() {
            assert!(row.winrate >= 0.0 && row.winrate <= 100.0);
        }
    }

    #[test]
    fn cache_key_format_is_champion_underscore_role() {
        let mut stats = SynergyStats::default();
        stats.fold_record(&MatchRecord::from_match(&full_match(true), "me").unwrap());
        let doc = serde_json::to_value(&stats).unwrap();
        assert!(doc.get("Ally_SUPPORT").is_some());
        assert!(doc.get("Ally_UTILITY").is_none());
    }
}
