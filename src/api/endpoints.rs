// Riot API URL builders. Authentication goes in the X-Riot-Token header,
// never in the query string.

/// Ranked solo/duo queue filter for the match-id listing endpoint.
pub const QUEUE_RANKED_SOLO: u32 = 420;

/// Maximum ids per page accepted by the match-id listing endpoint.
pub const PAGE_SIZE: usize = 100;

pub fn account_url(routing: &str, game_name: &str, tag_line: &str) -> String {
    format!(
        "https://{}.api.riotgames.com/riot/account/v1/accounts/by-riot-id/{}/{}",
        routing, game_name, tag_line
    )
}

pub fn match_ids_url(routing: &str, puuid: &str, start: usize) -> String {
    format!(
        "https://{}.api.riotgames.com/lol/match/v5/matches/by-puuid/{}/ids?queue={}&start={}&count={}",
        routing, puuid, QUEUE_RANKED_SOLO, start, PAGE_SIZE
    )
}

pub fn match_url(routing: &str, match_id: &str) -> String {
    format!(
        "https://{}.api.riotgames.com/lol/match/v5/matches/{}",
        routing, match_id
    )
}
