// src/builders/popularity.rs
// Opening-family x rating-bracket x time-control popularity and win/draw/
// loss aggregation. Ported 1:1 from the distilled contract: the `win_rate`
// triplet duplicates `wr_white` in its first two slots -- an odd but
// observable part of the original output, preserved here on purpose.

use std::collections::HashMap;

use rayon::prelude::*;
use serde_json::{json, Value};

use crate::config;
use crate::model::ColumnarRow;
use crate::openings;

use super::Builder;

pub struct PopularityBuilder;

#[derive(Default)]
struct Agg {
    count: u64,
    white_wins: u64,
    black_wins: u64,
    draws: u64,
}

impl Builder for PopularityBuilder {
    fn name(&self) -> &'static str {
        "popularity"
    }

    fn build(&self, rows: &[ColumnarRow]) -> Value {
        let mut totals: HashMap<(String, &'static str), u64> = HashMap::new();
        let mut cells: HashMap<(String, &'static str, String, &'static str), Agg> = HashMap::new();

        for row in rows {
            if !config::ALLOWED_TIME_CONTROLS.contains(&row.time_control_bucket.as_str()) {
                continue;
            }
            let Some(bracket) = openings::rating_bracket(row.average_elo(), &config::ELO_BRACKETS) else {
                continue;
            };
            let Some(opening) = row.opening.as_deref() else {
                continue;
            };
            let Some(result_value) = row.result_value() else {
                continue;
            };

            let root = openings::opening_root(opening);
            let name = if openings::is_whitelisted(&root) {
                root
            } else if config::POPULARITY_GROUP_OTHER {
                config::OTHER_LABEL.to_string()
            } else {
                root
            };
            if name == config::OTHER_LABEL && config::POPULARITY_DROP_OTHER {
                continue;
            }
            let color = if openings::is_black_opening(&name) { "black" } else { "white" };

            *totals.entry((row.time_control_bucket.clone(), bracket)).or_insert(0) += 1;
            let cell = cells
                .entry((row.time_control_bucket.clone(), bracket, name, color))
                .or_default();
            cell.count += 1;
            match result_value {
                1 => cell.white_wins += 1,
                -1 => cell.black_wins += 1,
                _ => cell.draws += 1,
            }
        }

        let mut by_tc: HashMap<String, HashMap<&'static str, Vec<Value>>> = HashMap::new();
        for ((tc, bracket, name, color), agg) in cells {
            let total_in_group = *totals.get(&(tc.clone(), bracket)).unwrap_or(&0);
            if total_in_group == 0 {
                continue;
            }
            let popularity = round4(agg.count as f64 / total_in_group as f64);
            let wr_white = round4((agg.white_wins as f64 + 0.5 * agg.draws as f64) / agg.count as f64);
            let wr_black = round4((agg.black_wins as f64 + 0.5 * agg.draws as f64) / agg.count as f64);

            let entry = json!({
                "name": name,
                "popularity": popularity,
                "color": color,
                "count": agg.count,
                "win_rate": [wr_white, wr_white, wr_black],
            });
            by_tc.entry(tc.to_lowercase()).or_default().entry(bracket).or_default().push(entry);
        }

        // Each time-control's bracket map sorts and truncates independently of
        // every other one, so this fans out across the partitions rather than
        // walking them one at a time.
        let rendered: Vec<(String, Value)> = by_tc
            .into_par_iter()
            .map(|(tc, brackets)| {
                let mut bmap = serde_json::Map::new();
                for (bracket, mut entries) in brackets {
                    entries.sort_by(|a, b| {
                        let pa = a["popularity"].as_f64().unwrap_or(0.0);
                        let pb = b["popularity"].as_f64().unwrap_or(0.0);
                        pb.partial_cmp(&pa).unwrap_or(std::cmp::Ordering::Equal)
                    });
                    if let Some(max) = config::POPULARITY_MAX_OPENINGS_PER_BUCKET {
                        entries.truncate(max);
                    }
                    bmap.insert(bracket.to_string(), Value::Array(entries));
                }
                (tc, Value::Object(bmap))
            })
            .collect();

        let mut out = serde_json::Map::new();
        for (tc, value) in rendered {
            out.insert(tc, value);
        }
        Value::Object(out)
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnarRow;

    fn row(tc: &str, opening: &str, elo: u32, result: &str) -> ColumnarRow {
        ColumnarRow {
            event: None,
            site: None,
            white: None,
            black: None,
            white_elo: Some(elo),
            black_elo: Some(elo),
            white_title: None,
            black_title: None,
            white_rating_diff: None,
            black_rating_diff: None,
            result: result.to_string(),
            termination: None,
            eco: None,
            opening: Some(opening.to_string()),
            time_control_raw: String::new(),
            time_control_bucket: tc.to_string(),
            utc_date: None,
            year: None,
            ts_ms: None,
            has_eval: false,
            moves_json: "[]".into(),
            white_cp_loss_json: "[]".into(),
            black_cp_loss_json: "[]".into(),
            average_accuracy_per_move_json: "[]".into(),
            white_running_accuracy_json: "[]".into(),
            black_running_accuracy_json: "[]".into(),
            average_accuracy: None,
            white_accuracy: None,
            black_accuracy: None,
            source_file: "t.pgn.zst".into(),
        }
    }

    #[test]
    fn popularity_sums_to_one_within_a_bucket() {
        let rows = vec![
            row("BLITZ", "Ruy Lopez: Berlin Defense", 1600, "1-0"),
            row("BLITZ", "Ruy Lopez: Berlin Defense", 1600, "0-1"),
            row("BLITZ", "Sicilian Defense: Najdorf Variation", 1600, "1/2-1/2"),
        ];
        let payload = PopularityBuilder.build(&rows);
        let bucket = &payload["blitz"]["1500-2000"];
        let entries = bucket.as_array().unwrap();
        let total: f64 = entries.iter().map(|e| e["popularity"].as_f64().unwrap()).sum();
        assert!((total - 1.0).abs() < 4e-4);
    }

    #[test]
    fn win_rate_triplet_duplicates_white_rate() {
        let rows = vec![row("BLITZ", "Italian Game", 1600, "1-0")];
        let payload = PopularityBuilder.build(&rows);
        let entry = &payload["blitz"]["1500-2000"][0];
        let wr = entry["win_rate"].as_array().unwrap();
        assert_eq!(wr[0], wr[1]);
    }

    #[test]
    fn black_defense_gets_black_color_label() {
        let rows = vec![row("RAPID", "Sicilian Defense: Najdorf Variation", 1200, "1-0")];
        let payload = PopularityBuilder.build(&rows);
        let entry = &payload["rapid"]["1000-1500"][0];
        assert_eq!(entry["color"], "black");
        assert_eq!(entry["name"], "Sicilian Defense");
    }

    #[test]
    fn non_whitelisted_opening_is_dropped_from_output() {
        let rows = vec![
            row("RAPID", "Some Made Up Gambit", 1200, "1-0"),
            row("RAPID", "Italian Game", 1200, "1-0"),
        ];
        let payload = PopularityBuilder.build(&rows);
        let entries = payload["rapid"]["1000-1500"].as_array().unwrap();
        assert!(entries.iter().all(|e| e["name"] != "Other"));
        assert_eq!(entries.len(), 1);
    }
}
