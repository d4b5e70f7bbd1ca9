// src/builders/explorer.rs
// Recursive opening-move-prefix tree per (time control, rating bracket),
// with depth-dependent top-K branching. Note the rating brackets here
// deliberately omit "0-500" -- a carry-over from the source aggregation,
// not an oversight.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::config;
use crate::model::{ColumnarRow, Move};
use crate::openings;

use super::Builder;

pub struct ExplorerBuilder;

struct GameRow {
    moves: Vec<Move>,
    result_value: i32,
    opening: Option<String>,
}

impl Builder for ExplorerBuilder {
    fn name(&self) -> &'static str {
        "opening_explorer"
    }

    fn build(&self, rows: &[ColumnarRow]) -> Value {
        let mut partitions: HashMap<(String, &'static str), Vec<GameRow>> = HashMap::new();

        for row in rows {
            if !config::ALLOWED_TIME_CONTROLS.contains(&row.time_control_bucket.as_str()) {
                continue;
            }
            let Some(bracket) =
                openings::rating_bracket(row.average_elo(), &config::ELO_BRACKETS_EXPLORER)
            else {
                continue;
            };
            let Some(result_value) = row.result_value() else {
                continue;
            };
            let moves = row.to_moves();
            if moves.is_empty() {
                continue;
            }
            partitions
                .entry((row.time_control_bucket.clone(), bracket))
                .or_default()
                .push(GameRow {
                    moves,
                    result_value,
                    opening: row.opening.clone(),
                });
        }

        let mut out = serde_json::Map::new();
        for tc in config::ALLOWED_TIME_CONTROLS {
            let mut bmap = serde_json::Map::new();
            for (bracket, _) in config::ELO_BRACKETS_EXPLORER {
                let games = partitions.remove(&(tc.to_string(), bracket)).unwrap_or_default();
                let refs: Vec<&GameRow> = games.iter().collect();
                let forest = build_forest(&refs, 0);
                bmap.insert(bracket.to_string(), Value::Array(forest));
            }
            out.insert(tc.to_lowercase(), Value::Object(bmap));
        }
        json!({ "opening_explorer": Value::Object(out) })
    }
}

fn build_forest(games: &[&GameRow], depth: usize) -> Vec<Value> {
    if depth >= config::EXPLORER_MAX_DEPTH || games.is_empty() {
        return Vec::new();
    }
    let top_k = if depth < config::EXPLORER_SHALLOW_DEPTH {
        config::EXPLORER_TOP_K_SHALLOW
    } else {
        config::EXPLORER_TOP_K_DEEP
    };

    let mut groups: HashMap<String, Vec<&GameRow>> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for g in games {
        if let Some(mv) = g.moves.get(depth) {
            if !groups.contains_key(&mv.san) {
                first_seen.push(mv.san.clone());
            }
            groups.entry(mv.san.clone()).or_default().push(g);
        }
    }

    let mut entries: Vec<(String, Vec<&GameRow>)> = first_seen
        .into_iter()
        .map(|san| {
            let subset = groups.remove(&san).unwrap();
            (san, subset)
        })
        .collect();
    entries.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    entries.truncate(top_k);

    let mut nodes = Vec::new();
    for (san, subset) in entries {
        let count = subset.len() as u64;
        if count < config::EXPLORER_MIN_GAMES {
            continue;
        }
        let w = round3(count_where(&subset, |rv| rv == 1) as f64 / count as f64);
        let d_rate = round3(count_where(&subset, |rv| rv == 0) as f64 / count as f64);
        let b = round3(count_where(&subset, |rv| rv == -1) as f64 / count as f64);

        let families: Vec<String> = subset
            .iter()
            .map(|g| openings::opening_root(g.opening.as_deref().unwrap_or("")))
            .collect();
        let fullnames: Vec<String> = subset
            .iter()
            .map(|g| g.opening.as_deref().unwrap_or("").to_string())
            .collect();
        let top_family = mode(&families);
        let most_freq_fullname = mode(&fullnames);
        let variant = openings::opening_variant(&most_freq_fullname).unwrap_or_default();

        let children = build_forest(&subset, depth + 1);

        let mut node = json!({
            "move": san,
            "name": top_family,
            "variant": variant,
            "count": count,
            "stats": [w, d_rate, b],
        });
        if !children.is_empty() {
            node["children"] = Value::Array(children);
        }
        nodes.push(node);
    }
    nodes
}

fn count_where(games: &[&GameRow], pred: impl Fn(i32) -> bool) -> u64 {
    games.iter().filter(|g| pred(g.result_value)).count() as u64
}

/// Statistical mode, first-occurrence wins on ties so output is
/// deterministic regardless of hash-map iteration order.
fn mode(values: &[String]) -> String {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    let mut best: Option<(&str, u64)> = None;
    for v in values {
        let c = counts[v.as_str()];
        match best {
            Some((_, bc)) if bc >= c => {}
            _ => best = Some((v.as_str(), c)),
        }
    }
    best.map(|(s, _)| s.to_string()).unwrap_or_default()
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tc: &str, elo: u32, result: &str, sans: &[&str], opening: &str) -> ColumnarRow {
        let moves: Vec<Move> = sans
            .iter()
            .map(|s| Move { san: s.to_string(), eval_pawns: None, tag: None })
            .collect();
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
            moves_json: serde_json::to_string(&moves).unwrap(),
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
    fn depth_zero_lists_up_to_ten_children() {
        let mut rows = Vec::new();
        for i in 0..5 {
            for _ in 0..(config::EXPLORER_MIN_GAMES + 1) {
                rows.push(row(
                    "BLITZ",
                    1600,
                    "1-0",
                    &[&format!("Move{i}"), "e5"],
                    "Italian Game",
                ));
            }
        }
        let payload = ExplorerBuilder.build(&rows);
        let top = payload["opening_explorer"]["blitz"]["1500-2000"].as_array().unwrap();
        assert!(top.len() <= config::EXPLORER_TOP_K_SHALLOW);
        assert_eq!(top.len(), 5);
    }

    #[test]
    fn stats_triplet_sums_to_one() {
        let mut rows = Vec::new();
        for _ in 0..3 {
            rows.push(row("BLITZ", 1600, "1-0", &["e4", "e5"], "Italian Game"));
        }
        for _ in 0..2 {
            rows.push(row("BLITZ", 1600, "0-1", &["e4", "e5"], "Italian Game"));
        }
        for _ in 0..config::EXPLORER_MIN_GAMES {
            rows.push(row("BLITZ", 1600, "1/2-1/2", &["e4", "e5"], "Italian Game"));
        }
        let payload = ExplorerBuilder.build(&rows);
        let node = &payload["opening_explorer"]["blitz"]["1500-2000"][0];
        let stats = node["stats"].as_array().unwrap();
        let total: f64 = stats.iter().map(|v| v.as_f64().unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn no_bucket_below_500_1000() {
        let rows = vec![row("BLITZ", 200, "1-0", &["e4", "e5"], "Italian Game")];
        let payload = ExplorerBuilder.build(&rows);
        assert!(payload["opening_explorer"]["blitz"].get("0-500").is_none());
    }
}
