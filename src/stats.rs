// src/stats.rs
// Summary views over a parsed or loaded dataset: per-run ingest counters and
// the loader's time-control/year breakdown.

use std::collections::HashMap;

use crate::model::{LoaderStats, ParsedGame};

pub fn loader_stats(games: &[ParsedGame]) -> LoaderStats {
    let mut by_time_control: HashMap<String, u64> = HashMap::new();
    let mut by_year: HashMap<String, u64> = HashMap::new();

    for game in games {
        *by_time_control
            .entry(game.header.time_control_bucket.clone())
            .or_insert(0) += 1;

        if let Some(ts) = game.header.ts_ms {
            if let Some(dt) = chrono::DateTime::from_timestamp_millis(ts) {
                let year = dt.format("%Y").to_string();
                *by_year.entry(year).or_insert(0) += 1;
            }
        }
    }

    LoaderStats {
        total_games: games.len() as u64,
        by_time_control,
        by_year,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccuracyBundle, GameHeader};

    fn dummy_game(tc: &str, ts_ms: Option<i64>) -> ParsedGame {
        ParsedGame {
            header: GameHeader {
                event: None,
                site: None,
                white: None,
                black: None,
                white_elo: None,
                black_elo: None,
                white_title: None,
                black_title: None,
                white_rating_diff: None,
                black_rating_diff: None,
                result: "1-0".into(),
                termination: None,
                eco: None,
                opening: None,
                time_control_raw: String::new(),
                time_control_bucket: tc.into(),
                utc_date: None,
                ts_ms,
                variant: None,
                has_eval: false,
            },
            moves: Vec::new(),
            accuracy: AccuracyBundle::default(),
            source_pgn: String::new(),
        }
    }

    #[test]
    fn counts_games_by_bucket_and_year() {
        let games = vec![
            dummy_game("BLITZ", Some(1_700_000_000_000)),
            dummy_game("BLITZ", Some(1_700_000_000_000)),
            dummy_game("RAPID", Some(1_600_000_000_000)),
        ];
        let stats = loader_stats(&games);
        assert_eq!(stats.total_games, 3);
        assert_eq!(stats.by_time_control.get("BLITZ"), Some(&2));
        assert_eq!(stats.by_time_control.get("RAPID"), Some(&1));
    }
}
