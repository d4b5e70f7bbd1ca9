// src/model.rs
// Core data types shared across every pipeline stage.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The raw `[Key "Value"]` tag pairs for one game, in file order. Backed by
/// an `IndexMap` rather than a `HashMap` so a reconstructed PGN header block
/// comes out in the order the source actually wrote it, not hash order.
#[derive(Debug, Clone, Default)]
pub struct TagMap(pub IndexMap<String, String>);

impl TagMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.0.insert(key, value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Re-renders the tags as `[Key "Value"]` lines in their original order.
    pub fn to_pgn_header(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("[{k} \"{v}\"]"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single half-move with its optional engine evaluation, in pawns from the
/// side-to-move's perspective at the position *before* the move was played.
/// `tag` is the trailing annotation glyph (`!`, `??`, `!?`, ...) split off of
/// the SAN token, if the source PGN carried one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Move {
    pub san: String,
    pub eval_pawns: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tag: Option<String>,
}

/// Maps a game's `Result` tag to the signed scalar used throughout the
/// aggregation builders. Returns `None` for anything outside the three
/// recognized outcomes (callers only see this after admission filtering, so
/// in practice it is always `Some`).
pub fn result_value(result: &str) -> Option<i32> {
    match result {
        "1-0" => Some(1),
        "0-1" => Some(-1),
        "1/2-1/2" => Some(0),
        _ => None,
    }
}

/// Normalized per-game header, after tag parsing and time-control bucketing.
#[derive(Debug, Clone)]
pub struct GameHeader {
    pub event: Option<String>,
    pub site: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub white_elo: Option<u32>,
    pub black_elo: Option<u32>,
    pub white_title: Option<String>,
    pub black_title: Option<String>,
    pub white_rating_diff: Option<i32>,
    pub black_rating_diff: Option<i32>,
    pub result: String,
    pub termination: Option<String>,
    pub eco: Option<String>,
    pub opening: Option<String>,
    /// The raw `TimeControl` tag value, e.g. `"300+3"`, kept alongside the
    /// derived bucket so both survive the columnar round trip.
    pub time_control_raw: String,
    pub time_control_bucket: String,
    /// The raw `UTCDate` tag value, e.g. `"2024.01.01"`, kept alongside the
    /// derived millisecond timestamp.
    pub utc_date: Option<String>,
    pub ts_ms: Option<i64>,
    pub variant: Option<String>,
    /// Whether at least one Move in the game carried a numeric `[%eval ...]`.
    /// Set once movetext has been tokenized; `parse_header` alone can't know
    /// it, since tags and movetext are parsed in separate steps.
    pub has_eval: bool,
}

/// Combined and per-side running accuracy trajectories plus the centipawn-loss
/// series each was built from. The combined series interleaves both sides'
/// evaluated plies in ply order, so it advances whenever either per-side
/// series does; lengths of a `*_cp_loss`/`*_running_accuracy` pair always
/// match the number of that series' evaluation transitions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccuracyBundle {
    pub cp_loss: Vec<f64>,
    pub white_cp_loss: Vec<f64>,
    pub black_cp_loss: Vec<f64>,
    pub running_accuracy: Vec<f64>,
    pub white_running_accuracy: Vec<f64>,
    pub black_running_accuracy: Vec<f64>,
    pub accuracy: Option<f64>,
    pub white_accuracy: Option<f64>,
    pub black_accuracy: Option<f64>,
}

/// Everything known about a single game once parsing and accuracy
/// reconstruction have run.
#[derive(Debug, Clone)]
pub struct ParsedGame {
    pub header: GameHeader,
    pub moves: Vec<Move>,
    pub accuracy: AccuracyBundle,
    /// The game re-rendered as PGN text: tag block (original order) followed
    /// by a blank line and the movetext as it appeared in the source.
    pub source_pgn: String,
}

impl ParsedGame {
    pub fn average_elo(&self) -> Option<f64> {
        match (self.header.white_elo, self.header.black_elo) {
            (Some(w), Some(b)) => Some((w as f64 + b as f64) / 2.0),
            (Some(w), None) => Some(w as f64),
            (None, Some(b)) => Some(b as f64),
            (None, None) => None,
        }
    }
}

/// One flattened row as written to / read from a columnar shard. Nested
/// sequences are stored JSON-encoded in `Utf8` columns so the schema never
/// has to change shape when move counts vary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnarRow {
    pub event: Option<String>,
    pub site: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub white_elo: Option<u32>,
    pub black_elo: Option<u32>,
    pub white_title: Option<String>,
    pub black_title: Option<String>,
    pub white_rating_diff: Option<i32>,
    pub black_rating_diff: Option<i32>,
    pub result: String,
    pub termination: Option<String>,
    pub eco: Option<String>,
    pub opening: Option<String>,
    pub time_control_raw: String,
    pub time_control_bucket: String,
    pub utc_date: Option<String>,
    /// The calendar year, derived from `utc_date`'s leading `YYYY` component.
    pub year: Option<i32>,
    pub ts_ms: Option<i64>,
    pub has_eval: bool,
    pub moves_json: String,
    pub average_accuracy_per_move_json: String,
    pub white_cp_loss_json: String,
    pub black_cp_loss_json: String,
    pub white_running_accuracy_json: String,
    pub black_running_accuracy_json: String,
    pub average_accuracy: Option<f64>,
    pub white_accuracy: Option<f64>,
    pub black_accuracy: Option<f64>,
    pub source_file: String,
}

/// `"2024.01.01"` -> `Some(2024)`. Mirrors the original's lenient
/// `_safe_year_from_utc_date`: anything that doesn't start with a parseable
/// integer year yields `None` rather than failing the row.
pub fn year_from_utc_date(utc_date: Option<&str>) -> Option<i32> {
    utc_date?.split('.').next()?.parse().ok()
}

impl ColumnarRow {
    pub fn from_parsed(game: &ParsedGame, source_file: &str) -> Self {
        let h = &game.header;
        let a = &game.accuracy;
        ColumnarRow {
            event: h.event.clone(),
            site: h.site.clone(),
            white: h.white.clone(),
            black: h.black.clone(),
            white_elo: h.white_elo,
            black_elo: h.black_elo,
            white_title: h.white_title.clone(),
            black_title: h.black_title.clone(),
            white_rating_diff: h.white_rating_diff,
            black_rating_diff: h.black_rating_diff,
            result: h.result.clone(),
            termination: h.termination.clone(),
            eco: h.eco.clone(),
            opening: h.opening.clone(),
            time_control_raw: h.time_control_raw.clone(),
            time_control_bucket: h.time_control_bucket.clone(),
            utc_date: h.utc_date.clone(),
            year: year_from_utc_date(h.utc_date.as_deref()),
            ts_ms: h.ts_ms,
            has_eval: h.has_eval,
            moves_json: serde_json::to_string(&game.moves).unwrap_or_else(|_| "[]".into()),
            average_accuracy_per_move_json: serde_json::to_string(&a.running_accuracy)
                .unwrap_or_else(|_| "[]".into()),
            white_cp_loss_json: serde_json::to_string(&a.white_cp_loss).unwrap_or_else(|_| "[]".into()),
            black_cp_loss_json: serde_json::to_string(&a.black_cp_loss).unwrap_or_else(|_| "[]".into()),
            white_running_accuracy_json: serde_json::to_string(&a.white_running_accuracy)
                .unwrap_or_else(|_| "[]".into()),
            black_running_accuracy_json: serde_json::to_string(&a.black_running_accuracy)
                .unwrap_or_else(|_| "[]".into()),
            average_accuracy: a.accuracy,
            white_accuracy: a.white_accuracy,
            black_accuracy: a.black_accuracy,
            source_file: source_file.to_string(),
        }
    }

    pub fn to_moves(&self) -> Vec<Move> {
        serde_json::from_str(&self.moves_json).unwrap_or_default()
    }

    pub fn average_elo(&self) -> Option<f64> {
        match (self.white_elo, self.black_elo) {
            (Some(w), Some(b)) => Some((w as f64 + b as f64) / 2.0),
            (Some(w), None) => Some(w as f64),
            (None, Some(b)) => Some(b as f64),
            (None, None) => None,
        }
    }

    pub fn result_value(&self) -> Option<i32> {
        result_value(&self.result)
    }

    pub fn running_accuracy(&self) -> Vec<f64> {
        serde_json::from_str(&self.average_accuracy_per_move_json).unwrap_or_default()
    }

    pub fn white_running_accuracy(&self) -> Vec<f64> {
        serde_json::from_str(&self.white_running_accuracy_json).unwrap_or_default()
    }

    pub fn black_running_accuracy(&self) -> Vec<f64> {
        serde_json::from_str(&self.black_running_accuracy_json).unwrap_or_default()
    }

    /// Re-renders a PGN source string from the scalar columns and the move
    /// list. Only the tags this row kept survive the round trip through
    /// Parquet, so this is an approximation of the original text, not a
    /// byte-for-byte reconstruction -- good enough for the loader's
    /// rematerialized `ParsedGame`s.
    pub fn reconstructed_pgn(&self) -> String {
        let mut tags: IndexMap<String, String> = IndexMap::new();
        let mut set = |k: &str, v: &Option<String>| {
            if let Some(v) = v {
                tags.insert(k.to_string(), v.clone());
            }
        };
        set("Event", &self.event);
        set("Site", &self.site);
        set("White", &self.white);
        set("Black", &self.black);
        if let Some(e) = self.white_elo {
            tags.insert("WhiteElo".into(), e.to_string());
        }
        if let Some(e) = self.black_elo {
            tags.insert("BlackElo".into(), e.to_string());
        }
        tags.insert("Result".into(), self.result.clone());
        set("Termination", &self.termination);
        set("ECO", &self.eco);
        set("Opening", &self.opening);
        set("UTCDate", &self.utc_date);
        if !self.time_control_raw.is_empty() {
            tags.insert("TimeControl".into(), self.time_control_raw.clone());
        }

        let header = tags
            .iter()
            .map(|(k, v)| format!("[{k} \"{v}\"]"))
            .collect::<Vec<_>>()
            .join("\n");
        let movetext = self
            .to_moves()
            .iter()
            .map(|m| m.san.clone())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{header}\n\n{movetext} {}", self.result)
    }
}

/// Running counters for a single export run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub games_seen: u64,
    pub games_kept: u64,
    pub games_rejected: u64,
    pub rejection_reasons: HashMap<String, u64>,
}

impl PipelineStats {
    pub fn reject(&mut self, reason: &str) {
        self.games_rejected += 1;
        *self.rejection_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }
}

/// Summary produced by the loader over a set of concatenated shards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderStats {
    pub total_games: u64,
    pub by_time_control: HashMap<String, u64>,
    pub by_year: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_map_preserves_insertion_order_not_hash_order() {
        let mut tags = TagMap::default();
        tags.insert("Black".to_string(), "Carlsen".to_string());
        tags.insert("Event".to_string(), "World Ch".to_string());
        tags.insert("Apple".to_string(), "Z".to_string());
        let rendered = tags.to_pgn_header();
        let black_pos = rendered.find("[Black").unwrap();
        let event_pos = rendered.find("[Event").unwrap();
        let apple_pos = rendered.find("[Apple").unwrap();
        assert!(black_pos < event_pos && event_pos < apple_pos);
    }

    #[test]
    fn result_value_maps_known_outcomes() {
        assert_eq!(result_value("1-0"), Some(1));
        assert_eq!(result_value("0-1"), Some(-1));
        assert_eq!(result_value("1/2-1/2"), Some(0));
        assert_eq!(result_value("*"), None);
    }

    fn sample_row() -> ColumnarRow {
        ColumnarRow {
            event: Some("Test".into()),
            site: None,
            white: Some("A".into()),
            black: Some("B".into()),
            white_elo: Some(1500),
            black_elo: Some(1510),
            white_title: None,
            black_title: None,
            white_rating_diff: None,
            black_rating_diff: None,
            result: "1-0".into(),
            termination: None,
            eco: None,
            opening: Some("Italian Game".into()),
            time_control_raw: "300+3".into(),
            time_control_bucket: "BLITZ".into(),
            utc_date: Some("2024.01.01".into()),
            year: Some(2024),
            ts_ms: None,
            has_eval: true,
            moves_json: serde_json::to_string(&vec![
                Move { san: "e4".into(), eval_pawns: Some(0.2), tag: None },
                Move { san: "e5".into(), eval_pawns: Some(0.1), tag: None },
            ])
            .unwrap(),
            average_accuracy_per_move_json: "[]".into(),
            white_cp_loss_json: "[]".into(),
            black_cp_loss_json: "[]".into(),
            white_running_accuracy_json: "[]".into(),
            black_running_accuracy_json: "[]".into(),
            average_accuracy: Some(96.0),
            white_accuracy: Some(98.0),
            black_accuracy: Some(95.0),
            source_file: "games.pgn.zst".into(),
        }
    }

    #[test]
    fn reconstructed_pgn_includes_header_and_moves() {
        let row = sample_row();
        let pgn = row.reconstructed_pgn();
        assert!(pgn.contains("[Event \"Test\"]"));
        assert!(pgn.contains("[WhiteElo \"1500\"]"));
        assert!(pgn.contains("[UTCDate \"2024.01.01\"]"));
        assert!(pgn.contains("[TimeControl \"300+3\"]"));
        assert!(pgn.contains("e4 e5"));
        assert!(pgn.contains("1-0"));
    }

    #[test]
    fn year_is_derived_from_utc_date_leading_component() {
        assert_eq!(year_from_utc_date(Some("2024.01.01")), Some(2024));
        assert_eq!(year_from_utc_date(Some("????.??.??")), None);
        assert_eq!(year_from_utc_date(None), None);
    }

    #[test]
    fn average_elo_falls_back_to_whichever_side_is_known() {
        let row = sample_row();
        assert_eq!(row.average_elo(), Some(1505.0));
    }
}
