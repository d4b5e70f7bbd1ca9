// src/builders/heatmap.rs
// 10x10 accuracy-heatmap aggregation: opening-phase accuracy bin x
// after-opening accuracy bin, per (time control, rating bracket, opening
// group), with combined-and-per-color winrate and sample-count triplets.
// The "All" pseudo-group is always kept, even after top-N truncation of the
// other groups -- truncation only ever applies to the non-"All" entries.

use std::collections::HashMap;

use rayon::prelude::*;
use serde_json::{json, Value};

use crate::accuracy;
use crate::config;
use crate::model::ColumnarRow;
use crate::openings;

use super::Builder;

pub struct HeatmapBuilder;

#[derive(Clone)]
struct Cell {
    counts: [[u64; config::HEATMAP_BINS]; config::HEATMAP_BINS],
    win_sums: [[f64; config::HEATMAP_BINS]; config::HEATMAP_BINS],
    white_counts: [[u64; config::HEATMAP_BINS]; config::HEATMAP_BINS],
    white_win_sums: [[f64; config::HEATMAP_BINS]; config::HEATMAP_BINS],
    black_counts: [[u64; config::HEATMAP_BINS]; config::HEATMAP_BINS],
    black_win_sums: [[f64; config::HEATMAP_BINS]; config::HEATMAP_BINS],
    total: u64,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            counts: [[0; config::HEATMAP_BINS]; config::HEATMAP_BINS],
            win_sums: [[0.0; config::HEATMAP_BINS]; config::HEATMAP_BINS],
            white_counts: [[0; config::HEATMAP_BINS]; config::HEATMAP_BINS],
            white_win_sums: [[0.0; config::HEATMAP_BINS]; config::HEATMAP_BINS],
            black_counts: [[0; config::HEATMAP_BINS]; config::HEATMAP_BINS],
            black_win_sums: [[0.0; config::HEATMAP_BINS]; config::HEATMAP_BINS],
            total: 0,
        }
    }
}

impl Cell {
    fn add(&mut self, y: usize, x: usize, win_score: f64, is_white: bool) {
        self.counts[y][x] += 1;
        self.win_sums[y][x] += win_score;
        self.total += 1;
        if is_white {
            self.white_counts[y][x] += 1;
            self.white_win_sums[y][x] += win_score;
        } else {
            self.black_counts[y][x] += 1;
            self.black_win_sums[y][x] += win_score;
        }
    }
}

impl Builder for HeatmapBuilder {
    fn name(&self) -> &'static str {
        "accuracy_heatmap"
    }

    fn build(&self, rows: &[ColumnarRow]) -> Value {
        let mut cells: HashMap<(String, &'static str, String), Cell> = HashMap::new();

        for row in rows {
            if !config::ALLOWED_TIME_CONTROLS.contains(&row.time_control_bucket.as_str()) {
                continue;
            }
            let Some(result_value) = row.result_value() else {
                continue;
            };
            let opening_group = row
                .opening
                .as_deref()
                .map(|o| openings::normalize_family(&openings::opening_root(o)))
                .unwrap_or_else(|| config::OTHER_LABEL.to_string());

            for is_white in [true, false] {
                let elo = if is_white { row.white_elo } else { row.black_elo };
                let Some(elo) = elo else { continue };
                let trajectory = if is_white {
                    row.white_running_accuracy()
                } else {
                    row.black_running_accuracy()
                };
                let Some((opening_acc, after_acc)) =
                    accuracy::opening_and_after_accuracy(&trajectory, config::OPENING_PLIES)
                else {
                    continue;
                };
                let Some(bracket) = openings::rating_bracket(Some(elo as f64), &config::ELO_BRACKETS) else {
                    continue;
                };
                let win_score = if result_value == 0 {
                    0.5
                } else if (is_white && result_value == 1) || (!is_white && result_value == -1) {
                    1.0
                } else {
                    0.0
                };
                let x = accuracy::bin_index_10(opening_acc);
                let y = accuracy::bin_index_10(after_acc);

                cells
                    .entry((row.time_control_bucket.clone(), bracket, "All".to_string()))
                    .or_default()
                    .add(y, x, win_score, is_white);
                cells
                    .entry((row.time_control_bucket.clone(), bracket, opening_group.clone()))
                    .or_default()
                    .add(y, x, win_score, is_white);
            }
        }

        let mut by_tc_bracket: HashMap<(String, &'static str), HashMap<String, Cell>> = HashMap::new();
        for ((tc, bracket, group), cell) in cells {
            by_tc_bracket.entry((tc, bracket)).or_default().insert(group, cell);
        }

        // Every (time control, bracket) cell renders independently of its
        // siblings -- the truncation and per-bin ratio work fans out here
        // instead of walking the grid one bucket at a time.
        let mut buckets: Vec<((&'static str, &'static str), HashMap<String, Cell>)> = Vec::new();
        for tc in config::ALLOWED_TIME_CONTROLS {
            for (bracket, _) in config::ELO_BRACKETS {
                let groups = by_tc_bracket.remove(&(tc.to_string(), bracket)).unwrap_or_default();
                buckets.push(((tc, bracket), groups));
            }
        }

        // Ordering is preserved across the rayon boundary (it's an indexed
        // Vec in, Vec out), so the grid can be re-chunked back into
        // [time control][bracket] by position instead of re-keying.
        let rendered: Vec<Value> = buckets
            .into_par_iter()
            .map(|((_tc, _bracket), mut groups)| {
                let all_cell = groups.remove("All").unwrap_or_default();
                let mut others: Vec<(String, Cell)> = groups
                    .into_iter()
                    .filter(|(_, c)| c.total >= config::HEATMAP_MIN_SAMPLES_PER_OPENING)
                    .collect();
                others.sort_by(|a, b| b.1.total.cmp(&a.1.total));
                if let Some(max) = config::HEATMAP_MAX_OPENINGS_PER_BUCKET {
                    others.truncate(max);
                }

                let mut gmap = serde_json::Map::new();
                gmap.insert("All".to_string(), cell_to_json(&all_cell));
                for (name, cell) in others {
                    gmap.insert(name, cell_to_json(&cell));
                }
                Value::Object(gmap)
            })
            .collect();

        let mut out = serde_json::Map::new();
        for (tc_values, tc) in rendered.chunks(config::ELO_BRACKETS.len()).zip(config::ALLOWED_TIME_CONTROLS) {
            let mut bmap = serde_json::Map::new();
            for ((bracket, _), value) in config::ELO_BRACKETS.iter().zip(tc_values) {
                bmap.insert(bracket.to_string(), value.clone());
            }
            out.insert(tc.to_lowercase(), Value::Object(bmap));
        }
        Value::Object(out)
    }
}

fn cell_to_json(cell: &Cell) -> Value {
    let mut heatmap = Vec::with_capacity(config::HEATMAP_BINS);
    let mut cell_samples = Vec::with_capacity(config::HEATMAP_BINS);
    for y in 0..config::HEATMAP_BINS {
        let mut hrow = Vec::with_capacity(config::HEATMAP_BINS);
        let mut srow = Vec::with_capacity(config::HEATMAP_BINS);
        for x in 0..config::HEATMAP_BINS {
            let avg = ratio(cell.win_sums[y][x], cell.counts[y][x]);
            let white = ratio(cell.white_win_sums[y][x], cell.white_counts[y][x]);
            let black = ratio(cell.black_win_sums[y][x], cell.black_counts[y][x]);
            hrow.push(json!([avg, white, black]));
            srow.push(json!([cell.counts[y][x], cell.white_counts[y][x], cell.black_counts[y][x]]));
        }
        heatmap.push(Value::Array(hrow));
        cell_samples.push(Value::Array(srow));
    }
    json!({
        "samples": cell.total,
        "heatmap": heatmap,
        "cell_samples": cell_samples,
    })
}

fn ratio(sum: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        round6(sum / count as f64)
    }
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tc: &str, white_elo: u32, result: &str, white_traj: Vec<f64>, black_traj: Vec<f64>) -> ColumnarRow {
        ColumnarRow {
            event: None,
            site: None,
            white: None,
            black: None,
            white_elo: Some(white_elo),
            black_elo: Some(white_elo),
            white_title: None,
            black_title: None,
            white_rating_diff: None,
            black_rating_diff: None,
            result: result.to_string(),
            termination: None,
            eco: None,
            opening: Some("Italian Game".to_string()),
            time_control_raw: String::new(),
            time_control_bucket: tc.to_string(),
            utc_date: None,
            year: None,
            ts_ms: None,
            has_eval: true,
            moves_json: "[]".into(),
            white_cp_loss_json: "[]".into(),
            black_cp_loss_json: "[]".into(),
            average_accuracy_per_move_json: "[]".into(),
            white_running_accuracy_json: serde_json::to_string(&white_traj).unwrap(),
            black_running_accuracy_json: serde_json::to_string(&black_traj).unwrap(),
            average_accuracy: None,
            white_accuracy: white_traj.last().copied(),
            black_accuracy: black_traj.last().copied(),
            source_file: "t.pgn.zst".into(),
        }
    }

    #[test]
    fn all_five_brackets_always_present() {
        let payload = HeatmapBuilder.build(&[]);
        for bracket in ["0-500", "500-1000", "1000-1500", "1500-2000", "2000+"] {
            assert!(payload["blitz"][bracket]["All"].is_object(), "missing {bracket}");
        }
    }

    #[test]
    fn cell_samples_conserve_total() {
        let traj: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let rows = vec![row("BLITZ", 1600, "1-0", traj.clone(), traj)];
        let payload = HeatmapBuilder.build(&rows);
        let all = &payload["blitz"]["1500-2000"]["All"];
        let samples = all["samples"].as_u64().unwrap();
        let mut total = 0u64;
        let mut white_total = 0u64;
        let mut black_total = 0u64;
        for row in all["cell_samples"].as_array().unwrap() {
            for cell in row.as_array().unwrap() {
                let triplet = cell.as_array().unwrap();
                total += triplet[0].as_u64().unwrap();
                white_total += triplet[1].as_u64().unwrap();
                black_total += triplet[2].as_u64().unwrap();
            }
        }
        assert_eq!(total, samples);
        assert_eq!(white_total + black_total, samples);
    }

    #[test]
    fn exactly_k_plies_yields_no_sample() {
        let traj: Vec<f64> = vec![90.0; config::OPENING_PLIES];
        let rows = vec![row("BLITZ", 1600, "1-0", traj.clone(), traj)];
        let payload = HeatmapBuilder.build(&rows);
        let all = &payload["blitz"]["1500-2000"]["All"];
        assert_eq!(all["samples"].as_u64().unwrap(), 0);
    }
}
